//! Site Vision - visual regression testing for site migrations.
//!
//! This crate provides:
//! - Full-page screenshot capture across pages and viewports
//! - Perceptual pixel diffing with dimension normalization
//! - Threshold categorization and a results JSON
//! - A static HTML report over those results
//! - MockEngine and MockFramebuffer for testing without a browser
//!
//! # Example
//!
//! ```rust,no_run
//! use site_vision::compare::{CompareConfig, run_comparison};
//!
//! let report = run_comparison(&CompareConfig::default()).unwrap();
//! println!("{} screenshots compared", report.summary.total);
//! ```

pub mod capture;
pub mod compare;
pub mod config;
pub mod report;

// Re-export capture stage
pub use capture::{
    CaptureConfig, CaptureError, CaptureManifest, CaptureResult, ChromeEngine, MockEngine, MockFramebuffer,
    RenderEngine, RenderPage, ScreenshotRecord, run_capture,
};

// Re-export comparison engine
pub use compare::{
    Category, CompareConfig, CompareError, CompareResult, ComparisonReport, ComparisonSummary, DiffEntry,
    DiffOptions, Thresholds, run_comparison,
};

// Re-export report generator
pub use report::{ReportConfig, ReportError, ReportResult, generate_report};

// Re-export configuration types
pub use config::{ConfigError, ConfigResult, PageSpec, ViewportSpec, Viewports};
