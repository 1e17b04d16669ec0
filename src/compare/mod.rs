pub mod engine;
pub mod normalize;
pub mod pixelmatch;
pub mod types;

pub use engine::{
    CompareConfig, compare_directories, compare_pair, diff_images, discover_screenshots, run_comparison,
    write_results,
};
pub use pixelmatch::{DiffOptions, pixelmatch};
pub use types::{
    Category, CompareError, CompareResult, ComparisonFailure, ComparisonReport, ComparisonSummary, DiffEntry,
    DiffOutcome, ImageSize, PixelComparison, Thresholds,
};
