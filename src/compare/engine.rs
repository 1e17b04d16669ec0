use image::{ImageFormat, RgbaImage};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use super::normalize::{canvas_size, pad_to_canvas};
use super::pixelmatch::{DiffOptions, pixelmatch};
use super::types::{
    CompareError, CompareResult, ComparisonFailure, ComparisonReport, DiffEntry, ImageSize,
    PixelComparison, Thresholds, round2,
};
use crate::config::{self, MANIFEST_FILENAME};

/// Configuration for a comparison run
#[derive(Debug, Clone)]
pub struct CompareConfig {
    /// Reference screenshots
    pub baseline_dir: PathBuf,
    /// Screenshots of the candidate site
    pub current_dir: PathBuf,
    /// Where `diff-<filename>` images are written
    pub diff_dir: PathBuf,
    /// Where the results JSON is written
    pub output_json: PathBuf,
    pub options: DiffOptions,
    pub thresholds: Thresholds,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            baseline_dir: PathBuf::from(config::DEFAULT_BASELINE_DIR),
            current_dir: PathBuf::from(config::DEFAULT_CURRENT_DIR),
            diff_dir: PathBuf::from(config::DEFAULT_DIFF_DIR),
            output_json: PathBuf::from(config::DEFAULT_RESULTS_JSON),
            options: DiffOptions::default(),
            thresholds: Thresholds::default(),
        }
    }
}

/// Compare both directories and write the results JSON.
pub fn run_comparison(config: &CompareConfig) -> CompareResult<ComparisonReport> {
    let report = compare_directories(config)?;
    write_results(&report, &config.output_json)?;
    Ok(report)
}

/// Compare every screenshot found in either directory.
///
/// Files are diffed in parallel; each one only touches its own inputs and
/// its own diff image. Per-file failures become error entries. Only a
/// directory that exists but cannot be listed is returned as an error.
pub fn compare_directories(config: &CompareConfig) -> CompareResult<ComparisonReport> {
    let baseline = discover_screenshots(&config.baseline_dir)?;
    let current = discover_screenshots(&config.current_dir)?;
    let filenames: Vec<String> = baseline.union(&current).cloned().collect();

    if filenames.is_empty() {
        log::warn!(
            "No screenshots found in {} or {}",
            config.baseline_dir.display(),
            config.current_dir.display()
        );
        return Ok(ComparisonReport::new(config.thresholds, BTreeMap::new()));
    }

    log::info!(
        "Comparing {} screenshots ({} baseline, {} current)",
        filenames.len(),
        baseline.len(),
        current.len()
    );

    let diffs: BTreeMap<String, DiffEntry> = filenames
        .into_par_iter()
        .map(|filename| {
            let entry = compare_entry(&filename, config);
            match (entry.percentage(), entry.error()) {
                (Some(pct), _) => log::info!("{} {}: {:.2}%", entry.category, filename, pct),
                (None, Some(err)) => log::warn!("{} {}: {}", entry.category, filename, err),
                (None, None) => {}
            }
            (filename, entry)
        })
        .collect();

    Ok(ComparisonReport::new(config.thresholds, diffs))
}

/// Names of the `.png` files directly inside `dir`; a missing directory is empty
pub fn discover_screenshots(dir: &Path) -> CompareResult<BTreeSet<String>> {
    let mut files = BTreeSet::new();
    if !dir.is_dir() {
        return Ok(files);
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        // Follows symlinks; dangling links are not screenshots
        let is_file = fs::metadata(entry.path()).map(|m| m.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            log::warn!("skipping non UTF-8 filename {:?} in {}", file_name, dir.display());
            continue;
        };
        if name.ends_with(".png") && name != MANIFEST_FILENAME {
            files.insert(name.to_string());
        }
    }
    Ok(files)
}

/// Produce the entry for one filename of the union
fn compare_entry(filename: &str, config: &CompareConfig) -> DiffEntry {
    let baseline_path = config.baseline_dir.join(filename);
    let current_path = config.current_dir.join(filename);

    if !baseline_path.exists() {
        return DiffEntry::failed(ComparisonFailure::BaselineMissing);
    }
    if !current_path.exists() {
        return DiffEntry::failed(ComparisonFailure::CurrentMissing);
    }

    let diff_name = format!("diff-{}", filename);
    let diff_path = config.diff_dir.join(&diff_name);

    match compare_pair(&baseline_path, &current_path, &diff_path, &config.options) {
        Ok(comparison) => DiffEntry::compared(comparison, diff_name, &config.thresholds),
        Err(e) => DiffEntry::failed(ComparisonFailure::Unexpected(e.to_string())),
    }
}

/// Decode, normalize and diff one pair, writing the diff image to `diff_path`
pub fn compare_pair(
    baseline_path: &Path,
    current_path: &Path,
    diff_path: &Path,
    options: &DiffOptions,
) -> CompareResult<PixelComparison> {
    let baseline = image::open(baseline_path)?.to_rgba8();
    let current = image::open(current_path)?.to_rgba8();
    let (output, comparison) = diff_images(&baseline, &current, options)?;

    if let Some(parent) = diff_path.parent() {
        fs::create_dir_all(parent)?;
    }
    output.save_with_format(diff_path, ImageFormat::Png)?;

    Ok(comparison)
}

/// Diff two decoded images on their shared canvas
pub fn diff_images(
    baseline: &RgbaImage,
    current: &RgbaImage,
    options: &DiffOptions,
) -> CompareResult<(RgbaImage, PixelComparison)> {
    let canvas = canvas_size(baseline, current);
    let total_pixels = u64::from(canvas.width) * u64::from(canvas.height);
    if total_pixels == 0 {
        return Err(CompareError::Dimensions("both images are empty".to_string()));
    }

    let padded_baseline = pad_to_canvas(baseline, canvas);
    let padded_current = pad_to_canvas(current, canvas);

    let mut output = RgbaImage::new(canvas.width, canvas.height);
    let diff_pixels = pixelmatch(
        padded_baseline.as_raw(),
        padded_current.as_raw(),
        &mut output,
        canvas.width,
        canvas.height,
        options,
    )?;

    let baseline_size = ImageSize {
        width: baseline.width(),
        height: baseline.height(),
    };
    let current_size = ImageSize {
        width: current.width(),
        height: current.height(),
    };

    Ok((
        output,
        PixelComparison {
            diff_pixels,
            total_pixels,
            percentage: round2(100.0 * diff_pixels as f64 / total_pixels as f64),
            width: canvas.width,
            height: canvas.height,
            baseline_size,
            current_size,
            size_match: baseline_size == current_size,
        },
    ))
}

/// Write the results JSON, creating parent directories as needed
pub fn write_results(report: &ComparisonReport, path: &Path) -> CompareResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}
