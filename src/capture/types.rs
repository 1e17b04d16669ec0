// Core types for the capture stage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{PageSpec, Viewports};

/// Configuration for a capture run
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Base URL each page path is appended to
    pub base_url: String,

    /// Directory where screenshots and the manifest are written
    pub output_dir: PathBuf,

    /// Free-form label recorded in the manifest (e.g. "wordpress", "eleventy")
    pub source: String,

    /// Pages to render
    pub pages: Vec<PageSpec>,

    /// Viewports every page is rendered at
    pub viewports: Viewports,

    /// Upper bound on navigation before the pair fails with a timeout
    pub navigation_timeout: Duration,

    /// Extra wait after navigation for fonts and late layout
    pub settle_delay: Duration,
}

impl CaptureConfig {
    /// Number of screenshots a run will attempt
    pub fn total_pairs(&self) -> usize {
        self.pages.len() * self.viewports.len()
    }
}

/// Outcome of capturing one page at one viewport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRecord {
    /// Page identifier
    pub name: String,

    /// Viewport identifier
    pub viewport: String,

    /// `<name>-<viewport>.png`
    pub filename: String,

    /// Fully resolved URL that was rendered
    pub url: String,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScreenshotRecord {
    /// Filename a page/viewport pair is stored under
    pub fn filename_for(name: &str, viewport: &str) -> String {
        format!("{}-{}.png", name, viewport)
    }
}

/// Index of a capture run, written as `manifest.json` next to the screenshots
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureManifest {
    pub source: String,
    pub base_url: String,
    pub timestamp: DateTime<Utc>,
    pub screenshots: Vec<ScreenshotRecord>,
}

impl CaptureManifest {
    pub fn new(source: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            base_url: base_url.into(),
            timestamp: Utc::now(),
            screenshots: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.screenshots.iter().filter(|s| s.success).count()
    }

    pub fn failed(&self) -> usize {
        self.screenshots.len() - self.succeeded()
    }
}

/// Result type for capture operations
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Error types for capture operations
#[derive(Debug)]
pub enum CaptureError {
    /// The rendering engine could not be started
    Launch(String),

    /// Navigation did not settle within the allowed time
    NavigationTimeout { url: String, timeout: Duration },

    /// Navigation failed for another reason
    Navigation(String),

    /// Error reported by the rendering engine during evaluation or capture
    Browser(String),

    /// I/O error
    Io(std::io::Error),

    /// Serialization error
    Serialization(serde_json::Error),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::Launch(msg) => write!(f, "Failed to launch browser: {}", msg),
            CaptureError::NavigationTimeout { url, timeout } => {
                write!(f, "Navigation to {} timed out after {}ms", url, timeout.as_millis())
            }
            CaptureError::Navigation(msg) => write!(f, "Navigation error: {}", msg),
            CaptureError::Browser(msg) => write!(f, "Browser error: {}", msg),
            CaptureError::Io(err) => write!(f, "I/O error: {}", err),
            CaptureError::Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Io(err) => Some(err),
            CaptureError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err)
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        CaptureError::Serialization(err)
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(err: image::ImageError) -> Self {
        CaptureError::Io(std::io::Error::other(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filename_for() {
        assert_eq!(ScreenshotRecord::filename_for("home", "mobile"), "home-mobile.png");
    }

    #[test]
    fn test_record_omits_absent_error() {
        let record = ScreenshotRecord {
            name: "home".to_string(),
            viewport: "mobile".to_string(),
            filename: "home-mobile.png".to_string(),
            url: "http://localhost:8080/".to_string(),
            success: true,
            error: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["success"], serde_json::Value::Bool(true));
    }

    #[test]
    fn test_manifest_uses_camel_case() {
        let manifest = CaptureManifest::new("wordpress", "http://localhost:8080");
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["baseUrl"], "http://localhost:8080");
        assert_eq!(json["source"], "wordpress");
        assert!(json["timestamp"].is_string());
        assert_eq!(json["screenshots"], serde_json::json!([]));
    }

    #[test]
    fn test_navigation_timeout_message() {
        let err = CaptureError::NavigationTimeout {
            url: "http://localhost:8080/".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(
            err.to_string(),
            "Navigation to http://localhost:8080/ timed out after 30000ms"
        );
    }
}
