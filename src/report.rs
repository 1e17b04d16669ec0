//! HTML report over a comparison results file.
//!
//! Rendering is a pure function of the loaded [`ComparisonReport`]; entries
//! are listed worst first with failures at the end.

use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::compare::{Category, ComparisonReport, DiffEntry};
use crate::config;

/// Result type for report generation
pub type ReportResult<T> = Result<T, ReportError>;

/// Error types for report generation
#[derive(Debug)]
pub enum ReportError {
    /// The results JSON does not exist
    ResultsMissing(PathBuf),

    /// I/O error
    Io(std::io::Error),

    /// The results JSON could not be parsed
    Serialization(serde_json::Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::ResultsMissing(path) => write!(f, "Results file not found: {}", path.display()),
            ReportError::Io(err) => write!(f, "I/O error: {}", err),
            ReportError::Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::ResultsMissing(_) => None,
            ReportError::Io(err) => Some(err),
            ReportError::Serialization(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ReportError {
    fn from(err: std::io::Error) -> Self {
        ReportError::Io(err)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Serialization(err)
    }
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub results: PathBuf,
    pub output: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            results: PathBuf::from(config::DEFAULT_RESULTS_JSON),
            output: PathBuf::from(config::DEFAULT_REPORT_HTML),
        }
    }
}

/// Load the results JSON, render it and write the HTML document.
///
/// Returns the loaded results so callers can summarise them.
pub fn generate_report(config: &ReportConfig) -> ReportResult<ComparisonReport> {
    let report = load_results(&config.results)?;
    let html = render_report(&report);

    if let Some(parent) = config.output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config.output, html)?;

    log::info!(
        "Wrote report for {} comparisons to {}",
        report.diffs.len(),
        config.output.display()
    );
    Ok(report)
}

pub fn load_results(path: &Path) -> ReportResult<ComparisonReport> {
    if !path.exists() {
        return Err(ReportError::ResultsMissing(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Entries by descending percentage; null percentages last, ties by filename
pub fn sorted_entries(report: &ComparisonReport) -> Vec<(&String, &DiffEntry)> {
    let mut entries: Vec<_> = report.diffs.iter().collect();
    entries.sort_by(|(a_name, a), (b_name, b)| {
        let by_pct = match (a.percentage(), b.percentage()) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_pct.then_with(|| a_name.cmp(b_name))
    });
    entries
}

/// Render the full HTML document
pub fn render_report(report: &ComparisonReport) -> String {
    let mut html = String::with_capacity(16 * 1024);
    html.push_str(HEAD);

    html.push_str("<body>\n  <div class=\"container\">\n    <h1>Visual Comparison Report</h1>\n");
    html.push_str(&format!(
        "    <p class=\"timestamp\">Generated: {}</p>\n",
        report.timestamp.to_rfc3339()
    ));

    render_summary(&mut html, report);

    html.push_str("    <div class=\"results\">\n");
    for (filename, entry) in sorted_entries(report) {
        render_entry(&mut html, filename, entry);
    }
    html.push_str("    </div>\n  </div>\n</body>\n</html>\n");
    html
}

fn render_summary(html: &mut String, report: &ComparisonReport) {
    let summary = &report.summary;
    let t = &report.thresholds;
    let cards = [
        ("", summary.total, "Total".to_string()),
        ("excellent", summary.excellent, format!("Excellent (&lt;{}%)", t.excellent)),
        ("good", summary.good, format!("Good (&lt;{}%)", t.good)),
        ("acceptable", summary.acceptable, format!("Acceptable (&lt;{}%)", t.acceptable)),
        ("needs-work", summary.needs_work, "Needs Work".to_string()),
        ("significant", summary.significant, "Significant".to_string()),
    ];

    html.push_str("    <div class=\"summary\">\n");
    for (class, count, label) in cards {
        let class_attr = if class.is_empty() {
            "summary-card".to_string()
        } else {
            format!("summary-card {}", class)
        };
        html.push_str(&format!(
            "      <div class=\"{}\">\n        <div class=\"count\">{}</div>\n        <div class=\"label\">{}</div>\n      </div>\n",
            class_attr, count, label
        ));
    }
    html.push_str("    </div>\n");
}

fn render_entry(html: &mut String, filename: &str, entry: &DiffEntry) {
    let name = escape_html(filename);
    let badge = match (entry.percentage(), entry.error()) {
        (Some(pct), _) => format!("{:.2}%", pct),
        (None, Some(err)) => escape_html(&err.to_string()),
        (None, None) => "Error".to_string(),
    };

    html.push_str("      <div class=\"result-row\" onclick=\"this.classList.toggle('expanded')\">\n");
    html.push_str("        <div class=\"result-header\">\n");
    html.push_str(&format!("          <span class=\"result-name\">{}</span>\n", name));
    html.push_str(&format!(
        "          <span class=\"result-status\"><span class=\"result-percentage {}\">{}</span><span class=\"expand-icon\">&#9660;</span></span>\n",
        css_class(entry.category),
        badge
    ));
    html.push_str("        </div>\n        <div class=\"result-details\">\n");

    match (entry.error(), entry.comparison()) {
        (Some(err), _) => {
            html.push_str(&format!(
                "          <p class=\"error-text\">Error: {}</p>\n",
                escape_html(&err.to_string())
            ));
        }
        (None, Some(c)) => {
            html.push_str(&format!(
                "          <div class=\"meta\"><span>Diff pixels: {}</span><span>Total pixels: {}</span><span>Size match: {}</span></div>\n",
                group_thousands(c.diff_pixels),
                group_thousands(c.total_pixels),
                if c.size_match { "Yes" } else { "No" }
            ));
            html.push_str("          <div class=\"result-images\">\n");
            for (src, alt, label) in [
                (format!("./baseline/{}", name), "Baseline", "Baseline (Original)"),
                (format!("./current/{}", name), "Current", "Current"),
                (format!("./diffs/diff-{}", name), "Diff", "Difference"),
            ] {
                html.push_str(&format!(
                    "            <div class=\"image-container\"><img src=\"{}\" alt=\"{}\" loading=\"lazy\" onerror=\"this.src='{}'\"><div class=\"label\">{}</div></div>\n",
                    src, alt, MISSING_IMAGE, label
                ));
            }
            html.push_str("          </div>\n");
        }
        (None, None) => {}
    }

    html.push_str("        </div>\n      </div>\n");
}

fn css_class(category: Category) -> &'static str {
    match category {
        Category::NeedsWork => "needs-work",
        other => other.as_str(),
    }
}

/// Escape text for use in HTML content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

const MISSING_IMAGE: &str = "data:image/svg+xml,%3Csvg xmlns=%22http://www.w3.org/2000/svg%22 width=%22200%22 height=%22100%22%3E%3Ctext x=%2250%25%22 y=%2250%25%22 text-anchor=%22middle%22 fill=%22%23999%22%3ENot found%3C/text%3E%3C/svg%3E";

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Visual Comparison Report</title>
  <style>
    :root {
      --excellent: #22c55e;
      --good: #eab308;
      --acceptable: #f97316;
      --needs-work: #ef4444;
      --significant: #dc2626;
      --error: #6b7280;
    }
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body {
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
      background: #f3f4f6;
      color: #1f2937;
      line-height: 1.5;
    }
    .container { max-width: 1400px; margin: 0 auto; padding: 2rem; }
    h1 { font-size: 1.875rem; font-weight: 700; margin-bottom: 0.5rem; }
    .timestamp { color: #6b7280; margin-bottom: 2rem; }
    .summary {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(150px, 1fr));
      gap: 1rem;
      margin-bottom: 2rem;
    }
    .summary-card {
      background: white;
      border-radius: 0.5rem;
      padding: 1rem;
      text-align: center;
      box-shadow: 0 1px 3px rgba(0,0,0,0.1);
    }
    .summary-card .count { font-size: 2rem; font-weight: 700; }
    .summary-card .label { font-size: 0.875rem; color: #6b7280; }
    .summary-card.excellent .count { color: var(--excellent); }
    .summary-card.good .count { color: var(--good); }
    .summary-card.acceptable .count { color: var(--acceptable); }
    .summary-card.needs-work .count { color: var(--needs-work); }
    .summary-card.significant .count { color: var(--significant); }
    .results { display: flex; flex-direction: column; gap: 1rem; }
    .result-row {
      background: white;
      border-radius: 0.5rem;
      padding: 1rem;
      box-shadow: 0 1px 3px rgba(0,0,0,0.1);
    }
    .result-header {
      display: flex;
      justify-content: space-between;
      align-items: center;
      cursor: pointer;
    }
    .result-name { font-weight: 600; }
    .result-status { display: flex; align-items: center; gap: 0.5rem; }
    .result-percentage {
      font-weight: 700;
      padding: 0.25rem 0.75rem;
      border-radius: 9999px;
      font-size: 0.875rem;
    }
    .result-percentage.excellent { background: #dcfce7; color: var(--excellent); }
    .result-percentage.good { background: #fef9c3; color: #a16207; }
    .result-percentage.acceptable { background: #ffedd5; color: #c2410c; }
    .result-percentage.needs-work { background: #fee2e2; color: var(--needs-work); }
    .result-percentage.significant { background: #fee2e2; color: var(--significant); }
    .result-percentage.error { background: #f3f4f6; color: var(--error); }
    .result-details {
      display: none;
      margin-top: 1rem;
      padding-top: 1rem;
      border-top: 1px solid #e5e7eb;
    }
    .result-row.expanded .result-details { display: block; }
    .result-images { display: grid; grid-template-columns: repeat(3, 1fr); gap: 1rem; }
    .image-container { text-align: center; }
    .image-container img { max-width: 100%; border: 1px solid #e5e7eb; border-radius: 0.25rem; }
    .image-container .label { font-size: 0.75rem; color: #6b7280; margin-top: 0.5rem; }
    .meta { display: flex; gap: 2rem; font-size: 0.875rem; color: #6b7280; margin: 0.5rem 0; }
    .error-text { color: var(--error); }
    .expand-icon { transition: transform 0.2s; }
    .result-row.expanded .expand-icon { transform: rotate(180deg); }
    @media (max-width: 768px) {
      .result-images { grid-template-columns: 1fr; }
    }
  </style>
</head>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{ComparisonFailure, ImageSize, PixelComparison, Thresholds};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn compared(percentage: f64, diff_pixels: u64) -> DiffEntry {
        let size = ImageSize {
            width: 1000,
            height: 2000,
        };
        DiffEntry::compared(
            PixelComparison {
                diff_pixels,
                total_pixels: 2_000_000,
                percentage,
                width: 1000,
                height: 2000,
                baseline_size: size,
                current_size: size,
                size_match: true,
            },
            "unused".to_string(),
            &Thresholds::default(),
        )
    }

    fn report_with(entries: Vec<(&str, DiffEntry)>) -> ComparisonReport {
        let diffs: BTreeMap<String, DiffEntry> =
            entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        ComparisonReport::new(Thresholds::default(), diffs)
    }

    #[test]
    fn test_sort_puts_null_percentages_last() {
        let report = report_with(vec![
            ("a-missing.png", DiffEntry::failed(ComparisonFailure::CurrentMissing)),
            ("b-close.png", compared(3.5, 70_000)),
            ("c-far.png", compared(12.0, 240_000)),
            ("d-same.png", compared(3.5, 70_000)),
        ]);

        let order: Vec<&str> = sorted_entries(&report).iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["c-far.png", "b-close.png", "d-same.png", "a-missing.png"]);
    }

    #[test]
    fn test_rendered_order_follows_percentage() {
        let report = report_with(vec![
            ("home-mobile.png", DiffEntry::failed(ComparisonFailure::BaselineMissing)),
            ("about-desktop.png", compared(3.5, 70_000)),
        ]);
        let html = render_report(&report);

        let first = html.find("about-desktop.png").unwrap();
        let second = html.find("home-mobile.png").unwrap();
        assert!(first < second);
        assert!(html.contains("3.50%"));
        assert!(html.contains("Error: baseline_missing"));
    }

    #[test]
    fn test_entry_details() {
        let report = report_with(vec![("home-wide.png", compared(3.5, 70_000))]);
        let html = render_report(&report);

        assert!(html.contains("Diff pixels: 70,000"));
        assert!(html.contains("Total pixels: 2,000,000"));
        assert!(html.contains("Size match: Yes"));
        assert!(html.contains("src=\"./baseline/home-wide.png\""));
        assert!(html.contains("src=\"./current/home-wide.png\""));
        assert!(html.contains("src=\"./diffs/diff-home-wide.png\""));
        assert!(html.contains("result-percentage acceptable"));
        assert!(html.contains("classList.toggle('expanded')"));
    }

    #[test]
    fn test_summary_cards() {
        let report = report_with(vec![
            ("a.png", compared(0.2, 10)),
            ("b.png", compared(7.0, 10)),
            ("c.png", DiffEntry::failed(ComparisonFailure::CurrentMissing)),
        ]);
        let html = render_report(&report);

        assert!(html.contains("<div class=\"count\">3</div>\n        <div class=\"label\">Total</div>"));
        assert!(html.contains("Excellent (&lt;1%)"));
        assert!(html.contains("<div class=\"summary-card needs-work\">\n        <div class=\"count\">1</div>"));
    }

    #[test]
    fn test_text_is_escaped() {
        let report = report_with(vec![(
            "<script>.png",
            DiffEntry::failed(ComparisonFailure::Unexpected("bad \"png\" & more".to_string())),
        )]);
        let html = render_report(&report);

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;.png"));
        assert!(html.contains("bad &quot;png&quot; &amp; more"));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_missing_results_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig {
            results: dir.path().join("nope.json"),
            output: dir.path().join("report.html"),
        };
        let err = generate_report(&config).unwrap_err();
        assert!(matches!(err, ReportError::ResultsMissing(_)));
        assert!(err.to_string().starts_with("Results file not found"));
        assert!(!config.output.exists());
    }

    #[test]
    fn test_generate_from_results_file() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results.json");
        fs::write(
            &results,
            r#"{
              "timestamp": "2026-01-02T03:04:05Z",
              "thresholds": {"excellent": 1, "good": 2, "acceptable": 5, "needsWork": 10},
              "summary": {"total": 2, "excellent": 0, "good": 0, "acceptable": 1, "needs_work": 0,
                          "significant": 0, "error": 1, "averagePercentage": 3.5},
              "diffs": {
                "a.png": {"error": "current_missing", "percentage": null, "category": "error", "diffImage": null},
                "b.png": {"diffPixels": 35, "totalPixels": 1000, "percentage": 3.5, "width": 10,
                          "height": 100, "baselineSize": {"width": 10, "height": 100},
                          "currentSize": {"width": 10, "height": 100}, "sizeMatch": true,
                          "category": "acceptable", "diffImage": "diff-b.png"}
              }
            }"#,
        )
        .unwrap();
        let config = ReportConfig {
            results,
            output: dir.path().join("nested/report.html"),
        };

        let report = generate_report(&config).unwrap();
        assert_eq!(report.diffs.len(), 2);

        let html = fs::read_to_string(&config.output).unwrap();
        assert!(html.find("b.png").unwrap() < html.find("a.png").unwrap());
        assert!(html.contains("Generated: 2026-01-02T03:04:05+00:00"));
    }
}
