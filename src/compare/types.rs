//! Result records for the comparison engine and their JSON shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Exclusive upper bounds (in percent) for each passing category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub excellent: f64,
    pub good: f64,
    pub acceptable: f64,
    pub needs_work: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            excellent: 1.0,
            good: 2.0,
            acceptable: 5.0,
            needs_work: 10.0,
        }
    }
}

impl Thresholds {
    /// Classify a diff percentage; `None` (a failed comparison) is `Error`
    pub fn categorize(&self, percentage: Option<f64>) -> Category {
        let Some(pct) = percentage else {
            return Category::Error;
        };
        if pct < self.excellent {
            Category::Excellent
        } else if pct < self.good {
            Category::Good
        } else if pct < self.acceptable {
            Category::Acceptable
        } else if pct < self.needs_work {
            Category::NeedsWork
        } else {
            Category::Significant
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Excellent,
    Good,
    Acceptable,
    NeedsWork,
    Significant,
    Error,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Excellent,
        Category::Good,
        Category::Acceptable,
        Category::NeedsWork,
        Category::Significant,
        Category::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Excellent => "excellent",
            Category::Good => "good",
            Category::Acceptable => "acceptable",
            Category::NeedsWork => "needs_work",
            Category::Significant => "significant",
            Category::Error => "error",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Pixel statistics for a pair that was decoded and diffed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelComparison {
    pub diff_pixels: u64,
    pub total_pixels: u64,
    /// `100 * diff_pixels / total_pixels`, rounded to 2 decimals
    pub percentage: f64,
    /// Canvas width, the larger of the two inputs
    pub width: u32,
    /// Canvas height, the larger of the two inputs
    pub height: u32,
    pub baseline_size: ImageSize,
    pub current_size: ImageSize,
    pub size_match: bool,
}

/// Why a pair produced no pixel statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComparisonFailure {
    BaselineMissing,
    CurrentMissing,
    /// Decoding or writing failed for this pair
    Unexpected(String),
}

impl From<String> for ComparisonFailure {
    fn from(s: String) -> Self {
        match s.as_str() {
            "baseline_missing" => ComparisonFailure::BaselineMissing,
            "current_missing" => ComparisonFailure::CurrentMissing,
            _ => ComparisonFailure::Unexpected(s),
        }
    }
}

impl From<ComparisonFailure> for String {
    fn from(failure: ComparisonFailure) -> Self {
        failure.to_string()
    }
}

impl fmt::Display for ComparisonFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonFailure::BaselineMissing => f.write_str("baseline_missing"),
            ComparisonFailure::CurrentMissing => f.write_str("current_missing"),
            ComparisonFailure::Unexpected(msg) => f.write_str(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedComparison {
    pub error: ComparisonFailure,
    /// Always null; kept so every record carries a `percentage` key
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiffOutcome {
    Compared(PixelComparison),
    Failed(FailedComparison),
}

/// Result for one filename, as stored under `diffs` in the results JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffEntry {
    #[serde(flatten)]
    pub outcome: DiffOutcome,
    pub category: Category,
    /// Diff image filename relative to the diff directory
    pub diff_image: Option<String>,
}

impl DiffEntry {
    pub fn compared(comparison: PixelComparison, diff_image: String, thresholds: &Thresholds) -> Self {
        let category = thresholds.categorize(Some(comparison.percentage));
        Self {
            outcome: DiffOutcome::Compared(comparison),
            category,
            diff_image: Some(diff_image),
        }
    }

    pub fn failed(error: ComparisonFailure) -> Self {
        Self {
            outcome: DiffOutcome::Failed(FailedComparison {
                error,
                percentage: None,
            }),
            category: Category::Error,
            diff_image: None,
        }
    }

    pub fn percentage(&self) -> Option<f64> {
        match &self.outcome {
            DiffOutcome::Compared(c) => Some(c.percentage),
            DiffOutcome::Failed(f) => f.percentage,
        }
    }

    pub fn error(&self) -> Option<&ComparisonFailure> {
        match &self.outcome {
            DiffOutcome::Compared(_) => None,
            DiffOutcome::Failed(f) => Some(&f.error),
        }
    }

    pub fn comparison(&self) -> Option<&PixelComparison> {
        match &self.outcome {
            DiffOutcome::Compared(c) => Some(c),
            DiffOutcome::Failed(_) => None,
        }
    }
}

/// Aggregate counts over every `DiffEntry` of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub total: usize,
    #[serde(default)]
    pub excellent: usize,
    #[serde(default)]
    pub good: usize,
    #[serde(default)]
    pub acceptable: usize,
    #[serde(default)]
    pub needs_work: usize,
    #[serde(default)]
    pub significant: usize,
    #[serde(default)]
    pub error: usize,
    /// Mean of all non-null percentages, rounded to 2 decimals
    #[serde(rename = "averagePercentage", default)]
    pub average_percentage: Option<f64>,
}

impl ComparisonSummary {
    /// Derive the summary from a set of entries
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a DiffEntry>) -> Self {
        let mut summary = Self::default();
        let mut percentage_sum = 0.0;
        let mut valid = 0usize;

        for entry in entries {
            summary.total += 1;
            *summary.count_mut(entry.category) += 1;
            if let Some(pct) = entry.percentage() {
                percentage_sum += pct;
                valid += 1;
            }
        }

        summary.average_percentage = (valid > 0).then(|| round2(percentage_sum / valid as f64));
        summary
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Excellent => self.excellent,
            Category::Good => self.good,
            Category::Acceptable => self.acceptable,
            Category::NeedsWork => self.needs_work,
            Category::Significant => self.significant,
            Category::Error => self.error,
        }
    }

    fn count_mut(&mut self, category: Category) -> &mut usize {
        match category {
            Category::Excellent => &mut self.excellent,
            Category::Good => &mut self.good,
            Category::Acceptable => &mut self.acceptable,
            Category::NeedsWork => &mut self.needs_work,
            Category::Significant => &mut self.significant,
            Category::Error => &mut self.error,
        }
    }
}

/// Contents of the results JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub thresholds: Thresholds,
    pub summary: ComparisonSummary,
    #[serde(default)]
    pub diffs: BTreeMap<String, DiffEntry>,
}

impl ComparisonReport {
    pub fn new(thresholds: Thresholds, diffs: BTreeMap<String, DiffEntry>) -> Self {
        Self {
            timestamp: Utc::now(),
            thresholds,
            summary: ComparisonSummary::from_entries(diffs.values()),
            diffs,
        }
    }
}

/// Round to two decimal places, halves away from zero
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Result type for comparison operations
pub type CompareResult<T> = Result<T, CompareError>;

/// Error types for comparison operations
#[derive(Debug)]
pub enum CompareError {
    /// I/O error
    Io(std::io::Error),

    /// PNG decoding or encoding error
    Image(image::ImageError),

    /// Two buffers handed to the diff do not describe the same canvas
    Dimensions(String),

    /// Serialization error
    Serialization(serde_json::Error),
}

impl fmt::Display for CompareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareError::Io(err) => write!(f, "I/O error: {}", err),
            CompareError::Image(err) => write!(f, "Image error: {}", err),
            CompareError::Dimensions(msg) => write!(f, "Dimension mismatch: {}", msg),
            CompareError::Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for CompareError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompareError::Io(err) => Some(err),
            CompareError::Image(err) => Some(err),
            CompareError::Dimensions(_) => None,
            CompareError::Serialization(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for CompareError {
    fn from(err: std::io::Error) -> Self {
        CompareError::Io(err)
    }
}

impl From<image::ImageError> for CompareError {
    fn from(err: image::ImageError) -> Self {
        CompareError::Image(err)
    }
}

impl From<serde_json::Error> for CompareError {
    fn from(err: serde_json::Error) -> Self {
        CompareError::Serialization(err)
    }
}
