//! Chrome render engine.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};

use super::{READINESS_SCRIPT, RenderEngine, RenderSession};
use crate::error::{ConversionError, Result};
use crate::request::{ContentSource, PdfParams};
use crate::traits::Healthcheck;

/// How long the browser may sit without CDP traffic before
/// `headless_chrome` considers it dead.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24);

type LaunchOptionsFn = Box<dyn Fn() -> Result<LaunchOptions<'static>> + Send + Sync>;

/// Production engine: one Chrome process, one tab per session.
///
/// The browser is launched lazily on first use. When opening a tab fails,
/// the browser is relaunched only if it no longer answers CDP calls, so a
/// single bad tab never takes down the sessions sharing the process.
pub struct ChromeEngine {
    launch_options_fn: LaunchOptionsFn,
    browser: Mutex<Option<Arc<Browser>>>,
    next_session_id: AtomicU64,
}

impl ChromeEngine {
    /// Create an engine with custom launch options.
    pub fn new<F>(launch_options_fn: F) -> Self
    where
        F: Fn() -> Result<LaunchOptions<'static>> + Send + Sync + 'static,
    {
        Self {
            launch_options_fn: Box::new(launch_options_fn),
            browser: Mutex::new(None),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Create an engine that auto-detects Chrome.
    pub fn with_defaults() -> Self {
        log::debug!("🔧 Creating ChromeEngine with auto-detect");
        Self::new(|| create_chrome_options(None))
    }

    /// Create an engine for a specific Chrome binary.
    pub fn with_path(chrome_path: String) -> Self {
        log::debug!("🔧 Creating ChromeEngine with custom path: {}", chrome_path);
        Self::new(move || create_chrome_options(Some(&chrome_path)))
    }

    /// Launch the browser now instead of on the first conversion.
    pub fn start(&self) -> Result<()> {
        self.browser().map(|_| ())
    }

    fn browser(&self) -> Result<Arc<Browser>> {
        let mut guard = self.browser.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(browser) = guard.as_ref() {
            return Ok(Arc::clone(browser));
        }

        let options = (self.launch_options_fn)()?;
        log::info!("🚀 Launching Chrome browser...");
        let started = Instant::now();
        let browser = Browser::new(options).map_err(|e| {
            log::error!("❌ Chrome launch failed: {}", e);
            ConversionError::EngineUnavailable(e.to_string())
        })?;
        log::info!("✅ Chrome ready in {:?}", started.elapsed());

        let browser = Arc::new(browser);
        *guard = Some(Arc::clone(&browser));
        Ok(browser)
    }

    /// Forget `failed` unless another thread already replaced it.
    fn discard_browser(&self, failed: &Arc<Browser>) {
        if discard_if_current(&self.browser, failed) {
            log::warn!("⚠️ Discarding unresponsive Chrome instance");
        }
    }

    fn new_tab(&self) -> Result<Arc<Tab>> {
        let browser = self.browser()?;
        let first = match browser.new_tab() {
            Ok(tab) => return Ok(tab),
            Err(e) => e,
        };

        if browser.get_version().is_ok() {
            log::warn!("⚠️ Failed to open tab on a live browser: {}", first);
            return Err(ConversionError::EngineUnavailable(first.to_string()));
        }

        log::warn!("⚠️ Chrome stopped responding ({}), relaunching", first);
        self.discard_browser(&browser);
        self.browser()?.new_tab().map_err(|e| {
            log::error!("❌ Failed to open tab after relaunch: {}", e);
            ConversionError::EngineUnavailable(e.to_string())
        })
    }
}

impl RenderEngine for ChromeEngine {
    fn open_session(&self) -> Result<Arc<dyn RenderSession>> {
        let tab = self.new_tab()?;
        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        log::trace!("🗂️ Opened Chrome session #{}", id);

        Ok(Arc::new(ChromeSession {
            id,
            tab,
            closed: AtomicBool::new(false),
        }))
    }

    fn name(&self) -> &'static str {
        "chrome"
    }

    fn shutdown(&self) {
        let mut guard = self.browser.lock().unwrap_or_else(|e| e.into_inner());
        if guard.take().is_some() {
            log::info!("🛑 Chrome browser released");
        }
    }
}

impl Healthcheck for ChromeEngine {
    /// One `Browser.getVersion` round trip on the running browser. Never
    /// opens a tab and never relaunches; an unlaunched engine is unhealthy.
    fn ping(&self) -> Result<()> {
        let browser = self
            .browser
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| ConversionError::EngineUnavailable("browser not running".to_string()))?;

        browser
            .get_version()
            .map(|_| ())
            .map_err(|e| ConversionError::EngineUnavailable(e.to_string()))
    }
}

/// Clear `slot` if it still holds `failed`. Returns whether it did.
fn discard_if_current<T>(slot: &Mutex<Option<Arc<T>>>, failed: &Arc<T>) -> bool {
    let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
    if guard.as_ref().is_some_and(|current| Arc::ptr_eq(current, failed)) {
        guard.take();
        true
    } else {
        false
    }
}

impl std::fmt::Debug for ChromeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let running = self
            .browser
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false);
        f.debug_struct("ChromeEngine")
            .field("running", &running)
            .finish()
    }
}

struct ChromeSession {
    id: u64,
    tab: Arc<Tab>,
    closed: AtomicBool,
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

impl ChromeSession {
    fn load_source(&self, source: &ContentSource) -> std::result::Result<(), BoxError> {
        match source {
            ContentSource::Inline(html) => {
                self.tab.navigate_to("about:blank")?.wait_until_navigated()?;
                let tree = self.tab.call_method(Page::GetFrameTree(None))?;
                self.tab.call_method(Page::SetDocumentContent {
                    frame_id: tree.frame_tree.frame.id,
                    html: html.clone(),
                })?;
            }
            ContentSource::Remote(url) => {
                self.tab.navigate_to(url.as_str())?.wait_until_navigated()?;
            }
        }
        self.tab.wait_for_element("body")?;
        Ok(())
    }
}

impl RenderSession for ChromeSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn load(&self, source: &ContentSource, budget: Duration) -> Result<()> {
        self.tab.set_default_timeout(budget);
        let started = Instant::now();

        self.load_source(source).map_err(|e| {
            log::error!("❌ Session #{} failed to load {}: {}", self.id, source.describe(), e);
            ConversionError::ContentLoad {
                origin: source.origin(),
                message: e.to_string(),
            }
        })?;

        log::debug!("Session #{} loaded content in {:?}", self.id, started.elapsed());
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.tab
            .evaluate(READINESS_SCRIPT, false)
            .map(|result| result.value.and_then(|v| v.as_bool()).unwrap_or(false))
            .unwrap_or(false)
    }

    fn print_pdf(&self, params: &PdfParams) -> Result<Vec<u8>> {
        let options = PrintToPdfOptions {
            landscape: Some(false),
            display_header_footer: Some(false),
            print_background: Some(params.print_background),
            scale: Some(params.scale),
            paper_width: Some(params.paper_width),
            paper_height: Some(params.paper_height),
            margin_top: Some(params.margins.top),
            margin_bottom: Some(params.margins.bottom),
            margin_left: Some(params.margins.left),
            margin_right: Some(params.margins.right),
            ..Default::default()
        };

        self.tab.print_to_pdf(Some(options)).map_err(|e| {
            log::error!("❌ Session #{} failed to generate PDF: {}", self.id, e);
            ConversionError::Emission(e.to_string())
        })
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.tab.close(true) {
            log::warn!(
                "Failed to close tab #{} (continuing anyway, browser reclaims it): {}",
                self.id,
                e
            );
        } else {
            log::trace!("Tab #{} closed", self.id);
        }
    }

    fn abort(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        log::debug!("✂️ Aborting session #{}", self.id);
        let tab = Arc::clone(&self.tab);
        let id = self.id;
        std::thread::spawn(move || {
            if let Err(e) = tab.close(false) {
                log::debug!("Abort of tab #{} reported: {}", id, e);
            }
        });
    }
}

/// Build Chrome launch options tuned for headless PDF rendering in
/// containers.
///
/// # Errors
///
/// [`ConversionError::Configuration`] if the options builder rejects the
/// settings.
pub fn create_chrome_options(chrome_path: Option<&str>) -> Result<LaunchOptions<'static>> {
    match chrome_path {
        Some(path) => log::debug!("🔧 Creating Chrome options with custom path: {}", path),
        None => log::debug!("🔧 Creating Chrome options (auto-detect browser)"),
    }

    let mut builder = LaunchOptions::default_builder();

    if let Some(path) = chrome_path {
        builder.path(Some(path.to_string().into()));
    }

    builder
        .headless(true)
        .sandbox(false) // required in most containers
        .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
        .disable_default_args(true)
        .args(vec![
            // ===== Memory and Performance =====
            "--disable-dev-shm-usage".as_ref(),
            "--disable-crash-reporter".as_ref(),
            "--max_old_space_size=1024".as_ref(),
            // ===== GPU and Rendering =====
            "--disable-gpu".as_ref(),
            "--disable-software-rasterizer".as_ref(),
            "--disable-accelerated-2d-canvas".as_ref(),
            // ===== Unneeded Features =====
            "--disable-extensions".as_ref(),
            "--disable-plugins".as_ref(),
            "--disable-sync".as_ref(),
            "--disable-default-apps".as_ref(),
            "--no-first-run".as_ref(),
            "--mute-audio".as_ref(),
            // ===== Background Work =====
            "--disable-background-networking".as_ref(),
            "--disable-background-timer-throttling".as_ref(),
            "--disable-backgrounding-occluded-windows".as_ref(),
            "--disable-renderer-backgrounding".as_ref(),
            "--disable-hang-monitor".as_ref(),
            // ===== CDP Stability =====
            "--disable-ipc-flooding-protection".as_ref(),
            "--enable-automation".as_ref(),
        ])
        .build()
        .map_err(|e| {
            let path_msg = chrome_path.unwrap_or("auto-detect");
            log::error!(
                "❌ Failed to build Chrome launch options (path: {}): {}",
                path_msg,
                e
            );
            ConversionError::Configuration(e.to_string())
        })
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chrome_engine_creation_is_lazy() {
        let engine = ChromeEngine::with_defaults();
        let _with_path = ChromeEngine::with_path("/custom/chrome/path".to_string());

        // Nothing is launched until a session is requested.
        assert!(format!("{:?}", engine).contains("running: false"));
        assert_eq!(engine.name(), "chrome");
    }

    #[test]
    fn test_ping_without_browser_is_unavailable() {
        let engine = ChromeEngine::with_defaults();
        assert!(matches!(
            engine.ping(),
            Err(ConversionError::EngineUnavailable(_))
        ));
        // The ping must not have launched anything.
        assert!(format!("{:?}", engine).contains("running: false"));
    }

    #[test]
    fn test_stale_discard_keeps_relaunched_instance() {
        let slot = Mutex::new(None);
        let original = Arc::new(1);
        *slot.lock().unwrap() = Some(Arc::clone(&original));

        // First failing thread discards, then a relaunch installs a new one.
        assert!(discard_if_current(&slot, &original));
        let relaunched = Arc::new(2);
        *slot.lock().unwrap() = Some(Arc::clone(&relaunched));

        // A second thread that failed on the original must not evict it.
        assert!(!discard_if_current(&slot, &original));
        let current = slot.lock().unwrap().clone().unwrap();
        assert!(Arc::ptr_eq(&current, &relaunched));
    }

    #[test]
    fn test_create_chrome_options() {
        let result = create_chrome_options(None);
        assert!(
            result.is_ok(),
            "Auto-detect Chrome options should build successfully: {:?}",
            result.err()
        );

        let result = create_chrome_options(Some("/custom/chrome/path"));
        assert!(
            result.is_ok(),
            "Custom path Chrome options should build successfully: {:?}",
            result.err()
        );
    }
}
