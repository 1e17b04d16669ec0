//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for Site Vision, supporting:
//! - Environment variables for the capture defaults
//! - Sensible defaults that match the documented CLI flag defaults
//! - Loading of the optional `viewports.json` and `urls.json` collaborators
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SITE_VISION_BASE_URL` | Base URL the capture stage renders | `http://localhost:8080` |
//! | `SITE_VISION_OUTPUT_DIR` | Directory for captured screenshots | `comparison/screenshots` |
//! | `SITE_VISION_CHROME` | Path to a Chrome/Chromium binary | auto-detected |
//! | `SITE_VISION_NAVIGATION_TIMEOUT` | Navigation timeout per page (seconds) | `30` |
//! | `SITE_VISION_SETTLE_DELAY` | Settle delay after navigation (milliseconds) | `1000` |
//!
//! The first three are read by the command-line flags; the timing values are
//! read here.
//!
//! # Example
//!
//! ```bash
//! export SITE_VISION_BASE_URL="http://localhost:4000"
//! site-vision capture --output-dir=comparison/current --source=eleventy
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Default Values
// ============================================================================

/// Default base URL for the capture stage
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Default screenshot output directory
pub const DEFAULT_OUTPUT_DIR: &str = "comparison/screenshots";

/// Default manifest source label
pub const DEFAULT_SOURCE: &str = "unknown";

/// Default viewport configuration file
pub const DEFAULT_VIEWPORTS_FILE: &str = "viewports.json";

/// Default page list configuration file
pub const DEFAULT_URLS_FILE: &str = "urls.json";

/// Default baseline screenshot directory
pub const DEFAULT_BASELINE_DIR: &str = "comparison/baseline";

/// Default current screenshot directory
pub const DEFAULT_CURRENT_DIR: &str = "comparison/current";

/// Default diff image directory
pub const DEFAULT_DIFF_DIR: &str = "comparison/diffs";

/// Default comparison results path
pub const DEFAULT_RESULTS_JSON: &str = "comparison/results.json";

/// Default report output path
pub const DEFAULT_REPORT_HTML: &str = "comparison/report.html";

/// Navigation timeout for a single page (seconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 30;

/// Settle delay after navigation for fonts and late layout (milliseconds)
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;

/// Name of the manifest written next to captured screenshots
pub const MANIFEST_FILENAME: &str = "manifest.json";

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the capture base URL
pub const ENV_BASE_URL: &str = "SITE_VISION_BASE_URL";

/// Environment variable for the capture output directory
pub const ENV_OUTPUT_DIR: &str = "SITE_VISION_OUTPUT_DIR";

/// Environment variable for the browser binary
pub const ENV_CHROME_PATH: &str = "SITE_VISION_CHROME";

/// Environment variable for the navigation timeout (seconds)
pub const ENV_NAVIGATION_TIMEOUT: &str = "SITE_VISION_NAVIGATION_TIMEOUT";

/// Environment variable for the settle delay (milliseconds)
pub const ENV_SETTLE_DELAY: &str = "SITE_VISION_SETTLE_DELAY";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for Site Vision
#[derive(Debug, Clone)]
pub struct Config {
    /// Capture stage settings
    pub capture: CaptureSettings,
}

/// Capture timing settings
///
/// Base URL, output directory and browser binary are command-line flags
/// (with their own env fallbacks) and are not duplicated here.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Upper bound on page navigation
    pub navigation_timeout: Duration,
    /// Extra wait after navigation
    pub settle_delay: Duration,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            capture: CaptureSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            capture: CaptureSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl CaptureSettings {
    /// Create capture settings from environment variables
    pub fn from_env() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(
                env::var(ENV_NAVIGATION_TIMEOUT)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_NAVIGATION_TIMEOUT_SECS),
            ),
            settle_delay: Duration::from_millis(
                env::var(ENV_SETTLE_DELAY)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SETTLE_DELAY_MS),
            ),
        }
    }

    /// Create capture settings with defaults
    pub fn defaults() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(DEFAULT_NAVIGATION_TIMEOUT_SECS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
        }
    }
}

// ============================================================================
// Viewports and pages
// ============================================================================

/// Size of the rendering context a page is captured at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSpec {
    pub width: u32,
    pub height: u32,
}

impl ViewportSpec {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A page of the site, addressed relative to the base URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpec {
    /// URL path appended to the base URL (e.g. "/contact/")
    pub path: String,
    /// Stable identifier used in screenshot filenames
    pub name: String,
}

impl PageSpec {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }
}

/// Viewports keyed by identifier ("mobile", "desktop", ...)
pub type Viewports = BTreeMap<String, ViewportSpec>;

/// Built-in viewports used when no `viewports.json` exists
pub fn default_viewports() -> Viewports {
    [
        ("mobile", ViewportSpec::new(375, 812)),
        ("tablet", ViewportSpec::new(768, 1024)),
        ("desktop", ViewportSpec::new(1024, 768)),
        ("wide", ViewportSpec::new(1440, 900)),
        ("ultrawide", ViewportSpec::new(1920, 1080)),
    ]
    .into_iter()
    .map(|(name, spec)| (name.to_string(), spec))
    .collect()
}

/// Built-in page list used when no `urls.json` exists
pub fn default_pages() -> Vec<PageSpec> {
    [
        ("/", "home"),
        ("/over-mij/", "over-mij"),
        ("/behandeling/", "behandeling"),
        ("/aanmelding/", "aanmelding"),
        ("/tarieven-en-vergoeding/", "tarieven"),
        ("/cursussen/", "cursussen"),
        ("/werkwijze/", "werkwijze"),
        ("/werk/", "werk"),
        ("/sport/", "sport"),
        ("/gezondheid/", "gezondheid"),
        ("/running-therapie/", "running-therapie"),
        ("/contact/", "contact"),
        ("/privacy/", "privacy"),
        ("/disclaimer/", "disclaimer"),
    ]
    .into_iter()
    .map(|(path, name)| PageSpec::new(path, name))
    .collect()
}

/// Load viewports from `path`, or the built-in set if the file does not exist
pub fn load_viewports(path: &Path) -> ConfigResult<Viewports> {
    let Some(viewports) = read_optional_json::<Viewports>(path)? else {
        return Ok(default_viewports());
    };

    for (name, spec) in &viewports {
        if spec.width == 0 || spec.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "viewport '{}' in {} must have positive dimensions, got {}x{}",
                name,
                path.display(),
                spec.width,
                spec.height
            )));
        }
    }
    Ok(viewports)
}

/// Load the page list from `path`, or the built-in list if the file does not exist
pub fn load_pages(path: &Path) -> ConfigResult<Vec<PageSpec>> {
    let Some(pages) = read_optional_json::<Vec<PageSpec>>(path)? else {
        return Ok(default_pages());
    };

    if let Some(page) = pages.iter().find(|p| p.name.trim().is_empty()) {
        return Err(ConfigError::Invalid(format!(
            "page '{}' in {} has an empty name",
            page.path,
            path.display()
        )));
    }
    Ok(pages)
}

fn read_optional_json<T: serde::de::DeserializeOwned>(path: &Path) -> ConfigResult<Option<T>> {
    if !path.exists() {
        log::debug!("{} not found, using built-in defaults", path.display());
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

// ============================================================================
// Errors
// ============================================================================

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Error types for configuration loading
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a configuration file
    Io(std::io::Error),

    /// Configuration file is not valid JSON for its schema
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Configuration parsed but violates a constraint
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "I/O error: {}", err),
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse {}: {}", path.display(), source)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}
