use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;

use site_vision::capture::{CaptureConfig, ChromeEngine, run_capture};
use site_vision::compare::{Category, CompareConfig, run_comparison};
use site_vision::config::{self, load_pages, load_viewports};
use site_vision::report::{ReportConfig, generate_report};

/// Site Vision - visual regression testing for site migrations
#[derive(Parser, Debug)]
#[command(
    name = "site-vision",
    about = "Capture full-page screenshots, diff them against a baseline and report the differences",
    after_help = "ENVIRONMENT VARIABLES:\n\
        SITE_VISION_BASE_URL      Base URL for capture\n\
        SITE_VISION_OUTPUT_DIR    Screenshot output directory\n\
        SITE_VISION_CHROME        Chrome/Chromium binary\n\
        SITE_VISION_NAVIGATION_TIMEOUT  Navigation timeout (s)\n\
        SITE_VISION_SETTLE_DELAY  Settle delay (ms)\n\
        RUST_LOG                  Log filter (default: info)"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Capture every page at every viewport and write manifest.json
    Capture {
        /// Base URL page paths are appended to
        #[arg(long, env = config::ENV_BASE_URL, default_value = config::DEFAULT_BASE_URL)]
        base_url: String,

        /// Directory for screenshots and the manifest
        #[arg(long, env = config::ENV_OUTPUT_DIR, default_value = config::DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// Label recorded in the manifest (e.g. "wordpress", "eleventy")
        #[arg(long, default_value = config::DEFAULT_SOURCE)]
        source: String,

        /// Viewport definitions; built-in defaults when the file is absent
        #[arg(long, default_value = config::DEFAULT_VIEWPORTS_FILE)]
        viewports: PathBuf,

        /// Page list; built-in defaults when the file is absent
        #[arg(long, default_value = config::DEFAULT_URLS_FILE)]
        urls: PathBuf,

        /// Chrome/Chromium binary (default: auto-detected)
        #[arg(long, env = config::ENV_CHROME_PATH)]
        chrome_path: Option<PathBuf>,
    },

    /// Diff baseline and current screenshots and write the results JSON
    Compare {
        /// Reference screenshots
        #[arg(long, default_value = config::DEFAULT_BASELINE_DIR)]
        baseline_dir: PathBuf,

        /// Screenshots to check against the baseline
        #[arg(long, default_value = config::DEFAULT_CURRENT_DIR)]
        current_dir: PathBuf,

        /// Directory for diff images
        #[arg(long, default_value = config::DEFAULT_DIFF_DIR)]
        diff_dir: PathBuf,

        /// Results JSON path
        #[arg(long, default_value = config::DEFAULT_RESULTS_JSON)]
        output_json: PathBuf,
    },

    /// Render the results JSON as an HTML report
    Report {
        /// Results JSON written by `compare`
        #[arg(long, default_value = config::DEFAULT_RESULTS_JSON)]
        results: PathBuf,

        /// HTML output path
        #[arg(long, default_value = config::DEFAULT_REPORT_HTML)]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let outcome = match args.command {
        Some(Commands::Capture {
            base_url,
            output_dir,
            source,
            viewports,
            urls,
            chrome_path,
        }) => capture(base_url, output_dir, source, viewports, urls, chrome_path),
        Some(Commands::Compare {
            baseline_dir,
            current_dir,
            diff_dir,
            output_json,
        }) => compare(CompareConfig {
            baseline_dir,
            current_dir,
            diff_dir,
            output_json,
            ..CompareConfig::default()
        }),
        Some(Commands::Report { results, output }) => report(ReportConfig { results, output }),
        None => {
            println!("Site Vision - visual regression testing for site migrations");
            println!();
            println!("Usage: site-vision <COMMAND> [--key=value ...]");
            println!();
            println!("Commands:");
            println!("  capture  Capture full-page screenshots for every page and viewport");
            println!("  compare  Diff baseline and current screenshots");
            println!("  report   Generate the HTML report from comparison results");
            println!();
            println!("Run with --help for more information.");
            Ok(())
        }
    };

    if let Err(e) = &outcome {
        log::error!("{}", e);
    }
    outcome
}

fn capture(
    base_url: String,
    output_dir: PathBuf,
    source: String,
    viewports: PathBuf,
    urls: PathBuf,
    chrome_path: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let settings = &config::get().capture;
    let capture_config = CaptureConfig {
        base_url,
        output_dir,
        source,
        pages: load_pages(&urls)?,
        viewports: load_viewports(&viewports)?,
        navigation_timeout: settings.navigation_timeout,
        settle_delay: settings.settle_delay,
    };

    let engine = ChromeEngine::launch(chrome_path)?;
    let manifest = run_capture(&engine, &capture_config)?;

    println!(
        "Captured {} of {} screenshots ({} failed) into {}",
        manifest.succeeded(),
        manifest.screenshots.len(),
        manifest.failed(),
        capture_config.output_dir.display()
    );
    Ok(())
}

fn compare(compare_config: CompareConfig) -> Result<(), Box<dyn Error>> {
    let report = run_comparison(&compare_config)?;
    let summary = &report.summary;

    println!("Comparison summary ({} screenshots):", summary.total);
    for category in Category::ALL {
        println!("  {:<12} {}", category.as_str(), summary.count(category));
    }
    match summary.average_percentage {
        Some(avg) => println!("  average      {:.2}%", avg),
        None => println!("  average      n/a"),
    }
    println!("Results: {}", compare_config.output_json.display());
    Ok(())
}

fn report(report_config: ReportConfig) -> Result<(), Box<dyn Error>> {
    let loaded = generate_report(&report_config)?;
    println!(
        "Report generated for {} screenshots: {}",
        loaded.diffs.len(),
        report_config.output.display()
    );
    Ok(())
}
