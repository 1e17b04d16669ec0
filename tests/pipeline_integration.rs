//! End-to-end run of capture, compare and report against the mock engine.

use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::time::Duration;

use site_vision::capture::{CaptureConfig, CaptureManifest, MockEngine, run_capture};
use site_vision::compare::{Category, CompareConfig, ComparisonFailure, ComparisonReport, run_comparison};
use site_vision::config::{PageSpec, ViewportSpec, Viewports};
use site_vision::report::{ReportConfig, generate_report};

const BLACK: [u8; 4] = [0, 0, 0, 255];

fn capture_config(output_dir: &Path, source: &str) -> CaptureConfig {
    let mut viewports = Viewports::new();
    viewports.insert("mobile".to_string(), ViewportSpec::new(20, 40));
    viewports.insert("desktop".to_string(), ViewportSpec::new(60, 30));
    CaptureConfig {
        base_url: "http://site".to_string(),
        output_dir: output_dir.to_path_buf(),
        source: source.to_string(),
        pages: vec![
            PageSpec::new("/", "home"),
            PageSpec::new("/about/", "about"),
            PageSpec::new("/contact/", "contact"),
        ],
        viewports,
        navigation_timeout: Duration::from_secs(30),
        settle_delay: Duration::ZERO,
    }
}

#[test]
fn test_capture_compare_report() {
    let _ = env_logger::builder().is_test(true).try_init();
    let root = tempfile::tempdir().unwrap();
    let baseline_dir = root.path().join("baseline");
    let current_dir = root.path().join("current");

    let baseline = run_capture(&MockEngine::new(), &capture_config(&baseline_dir, "wordpress")).unwrap();
    assert_eq!(baseline.succeeded(), 6);

    let current_engine = MockEngine::new()
        .page("http://site/about/", BLACK, 100)
        .failing("http://site/contact/", "net::ERR_CONNECTION_REFUSED");
    let current = run_capture(&current_engine, &capture_config(&current_dir, "eleventy")).unwrap();
    assert_eq!(current.succeeded(), 4);
    assert_eq!(current.failed(), 2);

    let raw = fs::read_to_string(current_dir.join("manifest.json")).unwrap();
    let manifest: CaptureManifest = serde_json::from_str(&raw).unwrap();
    assert_eq!(manifest.source, "eleventy");

    let compare_config = CompareConfig {
        baseline_dir: baseline_dir.clone(),
        current_dir: current_dir.clone(),
        diff_dir: root.path().join("diffs"),
        output_json: root.path().join("results.json"),
        ..CompareConfig::default()
    };
    let report = run_comparison(&compare_config).unwrap();

    let summary = &report.summary;
    assert_eq!(summary.total, 6);
    assert_eq!(summary.excellent, 2);
    assert_eq!(summary.significant, 2);
    assert_eq!(summary.error, 2);
    assert_eq!(summary.average_percentage, Some(50.0));

    let about = report.diffs["about-mobile.png"].comparison().unwrap();
    assert_eq!((about.width, about.height), (20, 100));
    assert_eq!(about.percentage, 100.0);
    assert!(!about.size_match);
    assert_eq!(report.diffs["home-desktop.png"].category, Category::Excellent);
    assert_eq!(
        report.diffs["contact-mobile.png"].error(),
        Some(&ComparisonFailure::CurrentMissing)
    );
    assert!(!report.diffs.contains_key("manifest.json"));

    let diff = image::open(root.path().join("diffs/diff-about-mobile.png"))
        .unwrap()
        .to_rgba8();
    assert_eq!(diff.dimensions(), (20, 100));

    let on_disk: ComparisonReport =
        serde_json::from_str(&fs::read_to_string(&compare_config.output_json).unwrap()).unwrap();
    assert_eq!(on_disk.summary, report.summary);

    let report_config = ReportConfig {
        results: compare_config.output_json.clone(),
        output: root.path().join("report.html"),
    };
    generate_report(&report_config).unwrap();

    let html = fs::read_to_string(&report_config.output).unwrap();
    let position = |name: &str| html.find(&format!("result-name\">{}<", name)).unwrap();
    assert!(position("about-desktop.png") < position("about-mobile.png"));
    assert!(position("about-mobile.png") < position("home-desktop.png"));
    assert!(position("home-mobile.png") < position("contact-desktop.png"));
    assert!(html.contains("100.00%"));
    assert!(html.contains("current_missing"));
}
