use std::fs;
use std::path::Path;

use crate::capture::backend::{OVERLAY_SELECTORS, RenderEngine};
use crate::capture::types::{CaptureConfig, CaptureManifest, CaptureResult, ScreenshotRecord};
use crate::config::{MANIFEST_FILENAME, PageSpec, ViewportSpec};

/// Captures every page at every viewport and writes `manifest.json`.
///
/// Pairs run one at a time; each page is closed before the next opens. A
/// failing pair is recorded with `success: false` and the batch continues.
/// Only setup and manifest I/O errors are returned.
pub fn run_capture(engine: &dyn RenderEngine, config: &CaptureConfig) -> CaptureResult<CaptureManifest> {
    fs::create_dir_all(&config.output_dir)?;

    log::info!(
        "Capturing {} pages x {} viewports = {} screenshots from {} ({} engine)",
        config.pages.len(),
        config.viewports.len(),
        config.total_pairs(),
        config.base_url,
        engine.name()
    );

    let mut manifest = CaptureManifest::new(&config.source, &config.base_url);

    for page in &config.pages {
        for (viewport_name, viewport) in &config.viewports {
            let filename = ScreenshotRecord::filename_for(&page.name, viewport_name);
            let url = format!("{}{}", config.base_url, page.path);
            let path = config.output_dir.join(&filename);

            let error = match capture_pair(engine, config, page, viewport, &url, &path) {
                Ok(()) => {
                    log::info!("captured {}", filename);
                    None
                }
                Err(e) => {
                    log::warn!("failed {}: {}", filename, e);
                    Some(e.to_string())
                }
            };

            manifest.screenshots.push(ScreenshotRecord {
                name: page.name.clone(),
                viewport: viewport_name.clone(),
                filename,
                url,
                success: error.is_none(),
                error,
            });
        }
    }

    write_manifest(&manifest, &config.output_dir.join(MANIFEST_FILENAME))?;
    Ok(manifest)
}

/// Render one page at one viewport and store the PNG at `path`
fn capture_pair(
    engine: &dyn RenderEngine,
    config: &CaptureConfig,
    page: &PageSpec,
    viewport: &ViewportSpec,
    url: &str,
    path: &Path,
) -> CaptureResult<()> {
    let mut render_page = engine.open_page(viewport)?;

    let captured = (|| -> CaptureResult<Vec<u8>> {
        render_page.navigate(url, config.navigation_timeout)?;
        render_page.settle(config.settle_delay);
        // Cosmetic only; a failure here never fails the pair
        match render_page.hide_overlays(OVERLAY_SELECTORS) {
            Ok(0) => {}
            Ok(hidden) => log::debug!("hid {} overlay elements on {}", hidden, page.name),
            Err(e) => log::warn!("could not hide overlays on {}: {}", url, e),
        }
        render_page.capture_full_page()
    })();

    // Closed on both paths
    let closed = render_page.close();

    let png = captured?;
    closed?;
    fs::write(path, png)?;
    Ok(())
}

/// Write the manifest as pretty-printed JSON
pub fn write_manifest(manifest: &CaptureManifest, path: &Path) -> CaptureResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(manifest)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::backend::{MockEngine, MockFramebuffer};
    use crate::config::Viewports;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn test_config(output_dir: &Path) -> CaptureConfig {
        let mut viewports = Viewports::new();
        viewports.insert("mobile".to_string(), ViewportSpec::new(20, 40));
        viewports.insert("desktop".to_string(), ViewportSpec::new(60, 30));
        CaptureConfig {
            base_url: "http://site".to_string(),
            output_dir: output_dir.to_path_buf(),
            source: "test".to_string(),
            pages: vec![PageSpec::new("/", "home"), PageSpec::new("/contact/", "contact")],
            viewports,
            navigation_timeout: Duration::from_secs(30),
            settle_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_capture_writes_every_pair() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let engine = MockEngine::new();

        let manifest = run_capture(&engine, &config).unwrap();

        assert_eq!(manifest.screenshots.len(), 4);
        assert_eq!(manifest.succeeded(), 4);
        let filenames: Vec<_> = manifest.screenshots.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(
            filenames,
            vec![
                "home-desktop.png",
                "home-mobile.png",
                "contact-desktop.png",
                "contact-mobile.png"
            ]
        );
        assert_eq!(manifest.screenshots[2].url, "http://site/contact/");

        let png = fs::read(dir.path().join("home-mobile.png")).unwrap();
        let fb = MockFramebuffer::from_png_bytes(&png).unwrap();
        assert_eq!((fb.width(), fb.height()), (20, 40));
        assert!(dir.path().join(MANIFEST_FILENAME).exists());
    }

    #[test]
    fn test_failures_are_recorded_and_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let engine = MockEngine::new()
            .failing("http://site/", "net::ERR_CONNECTION_REFUSED")
            .timing_out("http://site/contact/");

        let manifest = run_capture(&engine, &config).unwrap();

        assert_eq!(manifest.screenshots.len(), 4);
        assert_eq!(manifest.failed(), 4);
        let first = &manifest.screenshots[0];
        assert!(!first.success);
        assert_eq!(
            first.error.as_deref(),
            Some("Navigation error: net::ERR_CONNECTION_REFUSED")
        );
        let timeout = &manifest.screenshots[3];
        assert_eq!(
            timeout.error.as_deref(),
            Some("Navigation to http://site/contact/ timed out after 30000ms")
        );
        assert!(!dir.path().join("home-mobile.png").exists());
    }

    #[test]
    fn test_pages_are_closed_before_next_opens() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.pages.truncate(1);
        let engine = MockEngine::new().failing("http://site/", "boom");

        run_capture(&engine, &config).unwrap();

        assert_eq!(
            engine.events(),
            vec![
                "open 60x30",
                "navigate http://site/",
                "close",
                "open 20x40",
                "navigate http://site/",
                "close",
            ]
        );
    }

    #[test]
    fn test_capture_sequence_per_pair() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.pages.truncate(1);
        config.viewports.remove("desktop");
        let engine = MockEngine::new();

        run_capture(&engine, &config).unwrap();

        assert_eq!(
            engine.events(),
            vec!["open 20x40", "navigate http://site/", "settle", "hide 8", "capture", "close"]
        );
    }

    #[test]
    fn test_overlay_failure_does_not_fail_pair() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.pages.truncate(1);
        config.viewports.remove("desktop");
        let engine = MockEngine::new().failing_overlays("evaluate failed");

        let manifest = run_capture(&engine, &config).unwrap();

        let record = &manifest.screenshots[0];
        assert!(record.success);
        assert_eq!(record.error, None);
        assert!(dir.path().join("home-mobile.png").exists());
        assert_eq!(
            engine.events(),
            vec!["open 20x40", "navigate http://site/", "settle", "hide 8", "capture", "close"]
        );
    }

    #[test]
    fn test_manifest_round_trips_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let engine = MockEngine::new().failing("http://site/contact/", "boom");

        let manifest = run_capture(&engine, &config).unwrap();
        let raw = fs::read_to_string(dir.path().join(MANIFEST_FILENAME)).unwrap();
        let loaded: CaptureManifest = serde_json::from_str(&raw).unwrap();

        assert_eq!(loaded.source, "test");
        assert_eq!(loaded.base_url, "http://site");
        assert_eq!(loaded.screenshots, manifest.screenshots);
    }
}
