//! Rendering backends for full-page screenshot capture.
//!
//! This module provides a unified interface for the capture stage:
//! - `ChromeEngine` drives a headless Chrome through the DevTools protocol
//! - `MockEngine` renders solid-colour pages from a `MockFramebuffer` for testing

use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::protocol::cdp::Target;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use image::{ImageBuffer, RgbaImage};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::types::{CaptureError, CaptureResult};
use crate::config::ViewportSpec;

/// Selectors for cookie and GDPR overlays hidden before capture
pub const OVERLAY_SELECTORS: &[&str] = &[
    ".cookie-consent",
    ".cookie-banner",
    "#cookie-notice",
    ".cmplz-cookiebanner",
    "[class*=\"cookie\"]",
    "[id*=\"cookie\"]",
    ".gdpr",
    "#gdpr",
];

/// A browser-like engine that can open isolated pages
///
/// Implementations provide different ways of rendering a URL:
/// - `ChromeEngine` for real pages via headless Chrome
/// - `MockEngine` for tests with programmatic page content
pub trait RenderEngine {
    /// Open a fresh, isolated page sized to the viewport
    fn open_page(&self, viewport: &ViewportSpec) -> CaptureResult<Box<dyn RenderPage + '_>>;

    /// Identifier for logs (e.g. "chrome", "mock")
    fn name(&self) -> &str;
}

/// One open rendering context
pub trait RenderPage {
    /// Navigate and wait for the page to load, bounded by `timeout`
    fn navigate(&mut self, url: &str, timeout: Duration) -> CaptureResult<()>;

    /// Wait for asynchronous font and layout effects
    fn settle(&mut self, delay: Duration) {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    /// Hide every element matching `selectors`, returning how many were hidden
    fn hide_overlays(&mut self, selectors: &[&str]) -> CaptureResult<usize>;

    /// Capture the whole scrollable page as PNG bytes
    fn capture_full_page(&mut self) -> CaptureResult<Vec<u8>>;

    /// Release the context
    fn close(self: Box<Self>) -> CaptureResult<()>;
}

// =============================================================================
// Headless Chrome
// =============================================================================

/// Headless Chrome rendering engine
///
/// Every page gets its own incognito browser context, disposed again in
/// [`RenderPage::close`] through the browser's initial tab.
pub struct ChromeEngine {
    browser: Browser,
    control: Arc<Tab>,
}

impl ChromeEngine {
    /// Launch a headless browser, optionally from an explicit binary
    pub fn launch(chrome_path: Option<PathBuf>) -> CaptureResult<Self> {
        let launch_opts = LaunchOptionsBuilder::default()
            .headless(true)
            .sandbox(false)
            .path(chrome_path)
            .idle_browser_timeout(Duration::from_secs(300))
            .args(vec![
                OsStr::new("--force-device-scale-factor=1"),
                OsStr::new("--hide-scrollbars"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--disable-sync"),
            ])
            .build()
            .map_err(|e| CaptureError::Launch(e.to_string()))?;

        let browser = Browser::new(launch_opts).map_err(|e| CaptureError::Launch(e.to_string()))?;
        let control = browser
            .wait_for_initial_tab()
            .map_err(|e| CaptureError::Launch(e.to_string()))?;
        Ok(Self { browser, control })
    }
}

impl RenderEngine for ChromeEngine {
    fn open_page(&self, viewport: &ViewportSpec) -> CaptureResult<Box<dyn RenderPage + '_>> {
        let context = self.browser.new_context().map_err(browser_error)?;
        let context_id = context.get_id().to_string();

        let tab = match context.new_tab() {
            Ok(tab) => tab,
            Err(e) => {
                if let Err(dispose) = self.control.call_method(dispose_context(&context_id)) {
                    log::warn!("failed to dispose browser context {}: {}", context_id, dispose);
                }
                return Err(browser_error(e));
            }
        };

        let page = ChromePage {
            tab,
            viewport: *viewport,
            context_id,
            control: Arc::clone(&self.control),
        };
        if let Err(e) = page.resize(viewport.height) {
            if let Err(close) = Box::new(page).close() {
                log::warn!("failed to release page after resize error: {}", close);
            }
            return Err(e);
        }
        Ok(Box::new(page))
    }

    fn name(&self) -> &str {
        "chrome"
    }
}

/// A tab inside its own browser context
struct ChromePage {
    tab: Arc<Tab>,
    viewport: ViewportSpec,
    context_id: String,
    /// Tab in the default context used to dispose `context_id`
    control: Arc<Tab>,
}

/// Total scrollable height of the document
const PAGE_HEIGHT_SCRIPT: &str = "Math.max(\
    document.documentElement.scrollHeight, \
    document.body ? document.body.scrollHeight : 0)";

/// `<readyState>:<finished resource count>`
const NETWORK_STATE_SCRIPT: &str =
    "document.readyState + ':' + performance.getEntriesByType('resource').length";

/// How long the resource count must stay unchanged to count as idle
const NETWORK_QUIET_WINDOW: Duration = Duration::from_millis(500);

const NETWORK_POLL_INTERVAL: Duration = Duration::from_millis(100);

impl ChromePage {
    /// Poll until the document is complete and no new resources have
    /// finished loading for [`NETWORK_QUIET_WINDOW`], within the navigation timeout
    fn wait_for_network_idle(&self, url: &str, started: Instant, timeout: Duration) -> CaptureResult<()> {
        let mut tracker = IdleTracker::new(NETWORK_QUIET_WINDOW);
        loop {
            let state = self
                .tab
                .evaluate(NETWORK_STATE_SCRIPT, false)
                .map_err(browser_error)?;
            let (complete, resources) = state
                .value
                .as_ref()
                .and_then(|v| v.as_str())
                .and_then(parse_network_state)
                .unwrap_or((false, 0));

            if tracker.observe(complete, resources, Instant::now()) {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(CaptureError::NavigationTimeout {
                    url: url.to_string(),
                    timeout,
                });
            }
            thread::sleep(NETWORK_POLL_INTERVAL);
        }
    }

    fn resize(&self, height: u32) -> CaptureResult<()> {
        self.tab
            .set_bounds(Bounds::Normal {
                left: Some(0),
                top: Some(0),
                width: Some(f64::from(self.viewport.width)),
                height: Some(f64::from(height)),
            })
            .map_err(browser_error)?;
        Ok(())
    }
}

impl RenderPage for ChromePage {
    fn navigate(&mut self, url: &str, timeout: Duration) -> CaptureResult<()> {
        self.tab.set_default_timeout(timeout);
        let started = Instant::now();

        let result = self
            .tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated());

        match result {
            Ok(_) => self.wait_for_network_idle(url, started, timeout),
            Err(_) if started.elapsed() >= timeout => Err(CaptureError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            }),
            Err(e) => Err(CaptureError::Navigation(format!("{}: {}", url, e))),
        }
    }

    fn hide_overlays(&mut self, selectors: &[&str]) -> CaptureResult<usize> {
        let script = overlay_script(selectors)?;
        let hidden = self.tab.evaluate(&script, false).map_err(browser_error)?;
        Ok(hidden
            .value
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(0))
    }

    fn capture_full_page(&mut self) -> CaptureResult<Vec<u8>> {
        let extent = self
            .tab
            .evaluate(PAGE_HEIGHT_SCRIPT, false)
            .map_err(browser_error)?;
        let height = extent
            .value
            .and_then(|v| v.as_f64())
            .map(|h| h.ceil() as u32)
            .unwrap_or(self.viewport.height)
            .max(self.viewport.height);

        // Grow the window to the document so the capture covers the whole page
        if height > self.viewport.height {
            self.resize(height)?;
            thread::sleep(Duration::from_millis(100));
        }

        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(browser_error)
    }

    fn close(self: Box<Self>) -> CaptureResult<()> {
        let closed = self.tab.close(true).map_err(browser_error);
        self.control
            .call_method(dispose_context(&self.context_id))
            .map_err(browser_error)?;
        closed?;
        Ok(())
    }
}

fn dispose_context(context_id: &str) -> Target::DisposeBrowserContext {
    Target::DisposeBrowserContext {
        browser_context_id: context_id.to_string(),
    }
}

/// Parse the output of [`NETWORK_STATE_SCRIPT`]
fn parse_network_state(raw: &str) -> Option<(bool, u64)> {
    let (ready_state, count) = raw.split_once(':')?;
    Some((ready_state == "complete", count.trim().parse().ok()?))
}

/// Decides when a page has stopped loading resources
#[derive(Debug)]
struct IdleTracker {
    quiet: Duration,
    last_count: Option<u64>,
    quiet_since: Option<Instant>,
}

impl IdleTracker {
    fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            last_count: None,
            quiet_since: None,
        }
    }

    /// Record one sample; true once the page is complete and the resource
    /// count has not changed for the quiet window
    fn observe(&mut self, complete: bool, resources: u64, now: Instant) -> bool {
        if !complete {
            self.last_count = None;
            self.quiet_since = None;
            return false;
        }
        if self.last_count != Some(resources) {
            self.last_count = Some(resources);
            self.quiet_since = Some(now);
            return false;
        }
        self.quiet_since
            .is_some_and(|since| now.duration_since(since) >= self.quiet)
    }
}

fn browser_error(err: impl std::fmt::Display) -> CaptureError {
    CaptureError::Browser(err.to_string())
}

/// Build the script that hides overlay elements by direct style mutation
fn overlay_script(selectors: &[&str]) -> CaptureResult<String> {
    let selectors = serde_json::to_string(selectors)?;
    Ok(format!(
        "(() => {{ let hidden = 0; for (const sel of {}) {{ \
         document.querySelectorAll(sel).forEach(el => {{ el.style.display = 'none'; hidden++; }}); \
         }} return hidden; }})()",
        selectors
    ))
}

// =============================================================================
// Mock framebuffer and engine
// =============================================================================

/// A virtual RGBA framebuffer for test fixtures and mock captures
///
/// - `fill()` - Fill entire buffer with a color
/// - `draw_rect()` - Draw a filled rectangle
/// - `get_pixel()` / `set_pixel()` - Direct pixel access
#[derive(Debug, Clone)]
pub struct MockFramebuffer {
    /// Width in pixels
    width: u32,
    /// Height in pixels
    height: u32,
    /// RGBA pixel buffer (row-major, 4 bytes per pixel)
    buffer: Vec<u8>,
}

impl MockFramebuffer {
    /// Create a new framebuffer with the given dimensions, initialized to transparent black
    pub fn new(width: u32, height: u32) -> Self {
        let buffer = vec![0u8; (width * height * 4) as usize];
        Self {
            width,
            height,
            buffer,
        }
    }

    /// Create a framebuffer initialized to a specific color
    pub fn with_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let mut fb = Self::new(width, height);
        fb.fill(color);
        fb
    }

    /// Load a framebuffer from PNG image bytes
    pub fn from_png_bytes(data: &[u8]) -> CaptureResult<Self> {
        let rgba = image::load_from_memory(data)?.to_rgba8();
        Ok(Self {
            width: rgba.width(),
            height: rgba.height(),
            buffer: rgba.into_raw(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Fill the entire framebuffer with a color
    pub fn fill(&mut self, color: [u8; 4]) {
        for chunk in self.buffer.chunks_exact_mut(4) {
            chunk.copy_from_slice(&color);
        }
    }

    /// Draw a filled rectangle, clipped to the framebuffer
    pub fn draw_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 4]) {
        for py in y..(y + h).min(self.height) {
            for px in x..(x + w).min(self.width) {
                self.set_pixel(px, py, color);
            }
        }
    }

    /// Get the color of a pixel (transparent black outside the buffer)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0, 0, 0, 0];
        }
        let idx = ((y * self.width + x) * 4) as usize;
        [
            self.buffer[idx],
            self.buffer[idx + 1],
            self.buffer[idx + 2],
            self.buffer[idx + 3],
        ]
    }

    /// Set the color of a pixel
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        self.buffer[idx..idx + 4].copy_from_slice(&color);
    }

    /// Convert to an image buffer
    pub fn to_image(&self) -> CaptureResult<RgbaImage> {
        ImageBuffer::from_raw(self.width, self.height, self.buffer.clone()).ok_or_else(|| {
            CaptureError::Browser(format!(
                "Buffer size mismatch for {}x{} framebuffer",
                self.width, self.height
            ))
        })
    }

    /// Encode the framebuffer as PNG bytes
    pub fn to_png(&self) -> CaptureResult<Vec<u8>> {
        let img = self.to_image()?;
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
        Ok(bytes)
    }

    /// Write the framebuffer to `path` as PNG
    pub fn save_png(&self, path: &Path) -> CaptureResult<()> {
        std::fs::write(path, self.to_png()?)?;
        Ok(())
    }
}

/// How the mock engine renders one URL
#[derive(Debug, Clone)]
enum MockPage {
    Render { color: [u8; 4], content_height: u32 },
    Fail(String),
    Timeout,
}

/// Test engine that renders each URL as a solid-colour page
///
/// Every call is appended to an event log so tests can assert ordering,
/// e.g. that each page is closed before the next one opens.
#[derive(Debug, Clone)]
pub struct MockEngine {
    default_color: [u8; 4],
    pages: HashMap<String, MockPage>,
    overlay_error: Option<String>,
    events: Rc<RefCell<Vec<String>>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Engine rendering every page opaque white at viewport size
    pub fn new() -> Self {
        Self {
            default_color: [255, 255, 255, 255],
            pages: HashMap::new(),
            overlay_error: None,
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Colour used for URLs without explicit content
    pub fn default_color(mut self, color: [u8; 4]) -> Self {
        self.default_color = color;
        self
    }

    /// Render `url` in `color`, `content_height` pixels tall (at least the viewport)
    pub fn page(mut self, url: impl Into<String>, color: [u8; 4], content_height: u32) -> Self {
        self.pages.insert(
            url.into(),
            MockPage::Render {
                color,
                content_height,
            },
        );
        self
    }

    /// Make navigation to `url` fail with `message`
    pub fn failing(mut self, url: impl Into<String>, message: impl Into<String>) -> Self {
        self.pages.insert(url.into(), MockPage::Fail(message.into()));
        self
    }

    /// Make navigation to `url` exceed its timeout
    pub fn timing_out(mut self, url: impl Into<String>) -> Self {
        self.pages.insert(url.into(), MockPage::Timeout);
        self
    }

    /// Make every overlay-hiding call fail with `message`
    pub fn failing_overlays(mut self, message: impl Into<String>) -> Self {
        self.overlay_error = Some(message.into());
        self
    }

    /// Calls made against this engine, in order
    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

impl RenderEngine for MockEngine {
    fn open_page(&self, viewport: &ViewportSpec) -> CaptureResult<Box<dyn RenderPage + '_>> {
        self.events
            .borrow_mut()
            .push(format!("open {}x{}", viewport.width, viewport.height));
        Ok(Box::new(MockRenderPage {
            engine: self,
            viewport: *viewport,
            current: None,
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockRenderPage<'a> {
    engine: &'a MockEngine,
    viewport: ViewportSpec,
    current: Option<([u8; 4], u32)>,
}

impl MockRenderPage<'_> {
    fn log(&self, event: String) {
        self.engine.events.borrow_mut().push(event);
    }
}

impl RenderPage for MockRenderPage<'_> {
    fn navigate(&mut self, url: &str, timeout: Duration) -> CaptureResult<()> {
        self.log(format!("navigate {}", url));
        match self.engine.pages.get(url) {
            Some(MockPage::Fail(message)) => Err(CaptureError::Navigation(message.clone())),
            Some(MockPage::Timeout) => Err(CaptureError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            }),
            Some(MockPage::Render {
                color,
                content_height,
            }) => {
                self.current = Some((*color, *content_height));
                Ok(())
            }
            None => {
                self.current = Some((self.engine.default_color, self.viewport.height));
                Ok(())
            }
        }
    }

    fn settle(&mut self, _delay: Duration) {
        self.log("settle".to_string());
    }

    fn hide_overlays(&mut self, selectors: &[&str]) -> CaptureResult<usize> {
        self.log(format!("hide {}", selectors.len()));
        match &self.engine.overlay_error {
            Some(message) => Err(CaptureError::Browser(message.clone())),
            None => Ok(0),
        }
    }

    fn capture_full_page(&mut self) -> CaptureResult<Vec<u8>> {
        self.log("capture".to_string());
        let (color, content_height) = self
            .current
            .ok_or_else(|| CaptureError::Browser("capture before navigation".to_string()))?;
        let height = content_height.max(self.viewport.height);
        MockFramebuffer::with_color(self.viewport.width, height, color).to_png()
    }

    fn close(self: Box<Self>) -> CaptureResult<()> {
        self.log("close".to_string());
        Ok(())
    }
}
