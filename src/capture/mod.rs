pub mod backend;
pub mod runner;
pub mod types;

pub use backend::{ChromeEngine, MockEngine, MockFramebuffer, OVERLAY_SELECTORS, RenderEngine, RenderPage};
pub use runner::{run_capture, write_manifest};
pub use types::{CaptureConfig, CaptureError, CaptureManifest, CaptureResult, ScreenshotRecord};
