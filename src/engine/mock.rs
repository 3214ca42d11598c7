//! In-memory render engine for tests.
//!
//! [`MockRenderEngine`] never launches a browser. Its behaviour is driven
//! by markers embedded in inline content, so a single engine can serve a
//! mix of succeeding and failing conversions:
//!
//! | Marker | Effect |
//! |--------|--------|
//! | [`FAIL_LOAD_MARKER`] | `load` returns `ContentLoad` |
//! | [`FAIL_EMIT_MARKER`] | `print_pdf` returns `Emission` |
//! | [`STALL_MARKER`] | `load` blocks until aborted, well past its budget |
//! | [`NOT_READY_MARKER`] | `is_ready` always reports false |
//!
//! The engine also records live and peak session counts and the last print
//! parameters it received.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdf_forge::engine::mock::MockRenderEngine;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(MockRenderEngine::new());
//! // hand `engine.clone()` to a Converter, then inspect:
//! assert_eq!(engine.stats().active, 0);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::{RenderEngine, RenderSession};
use crate::error::{ConversionError, Result};
use crate::request::{ContentSource, PdfParams};
use crate::traits::Healthcheck;

/// Inline content containing this fails to load.
pub const FAIL_LOAD_MARKER: &str = "<!--mock:fail-load-->";

/// Inline content containing this fails to print.
pub const FAIL_EMIT_MARKER: &str = "<!--mock:fail-emit-->";

/// Inline content containing this hangs in `load` until the session is
/// torn down.
pub const STALL_MARKER: &str = "<!--mock:stall-->";

/// Inline content containing this never reports ready.
pub const NOT_READY_MARKER: &str = "<!--mock:not-ready-->";

const STALL_POLL: Duration = Duration::from_millis(5);

/// How far a stalled load overruns its budget when nobody aborts it.
const STALL_OVERRUN: Duration = Duration::from_secs(5);

/// Counters observed by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockEngineStats {
    /// Sessions open right now.
    pub active: usize,
    /// Highest number of sessions ever open at once.
    pub peak: usize,
    /// Sessions opened since creation.
    pub opened: u64,
    /// Sessions torn down (closed or aborted).
    pub closed: u64,
    /// Sessions torn down through `abort`.
    pub aborted: u64,
    /// Health pings answered.
    pub pings: u64,
    /// Highest number of pings ever in flight at once.
    pub ping_peak: usize,
}

#[derive(Debug, Default)]
struct MockState {
    active: AtomicUsize,
    peak: AtomicUsize,
    opened: AtomicU64,
    closed: AtomicU64,
    aborted: AtomicU64,
    pings: AtomicU64,
    pings_active: AtomicUsize,
    ping_peak: AtomicUsize,
    last_params: Mutex<Option<PdfParams>>,
}

/// Test engine with configurable latency and failures.
#[derive(Debug, Clone)]
pub struct MockRenderEngine {
    state: Arc<MockState>,
    load_delay: Duration,
    ping_delay: Duration,
    unavailable: Option<String>,
    healthy: bool,
}

impl MockRenderEngine {
    /// Engine that succeeds immediately.
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
            load_delay: Duration::ZERO,
            ping_delay: Duration::ZERO,
            unavailable: None,
            healthy: true,
        }
    }

    /// Hold every load for `delay` before succeeding.
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Hold every health ping for `delay`.
    pub fn with_ping_delay(mut self, delay: Duration) -> Self {
        self.ping_delay = delay;
        self
    }

    /// Refuse to open sessions.
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self {
            unavailable: Some(message.into()),
            healthy: false,
            ..Self::new()
        }
    }

    /// Current counters.
    pub fn stats(&self) -> MockEngineStats {
        MockEngineStats {
            active: self.state.active.load(Ordering::SeqCst),
            peak: self.state.peak.load(Ordering::SeqCst),
            opened: self.state.opened.load(Ordering::SeqCst),
            closed: self.state.closed.load(Ordering::SeqCst),
            aborted: self.state.aborted.load(Ordering::SeqCst),
            pings: self.state.pings.load(Ordering::SeqCst),
            ping_peak: self.state.ping_peak.load(Ordering::SeqCst),
        }
    }

    /// Parameters of the most recent `print_pdf` call.
    pub fn last_params(&self) -> Option<PdfParams> {
        *self
            .state
            .last_params
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockRenderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderEngine for MockRenderEngine {
    fn open_session(&self) -> Result<Arc<dyn RenderSession>> {
        if let Some(message) = &self.unavailable {
            log::debug!("MockRenderEngine: refusing session");
            return Err(ConversionError::EngineUnavailable(message.clone()));
        }

        let id = self.state.opened.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(active, Ordering::SeqCst);
        log::trace!("MockRenderEngine: opened session #{} ({} active)", id, active);

        Ok(Arc::new(MockSession {
            id,
            state: Arc::clone(&self.state),
            load_delay: self.load_delay,
            closed: AtomicBool::new(false),
            not_ready: AtomicBool::new(false),
            fail_emit: AtomicBool::new(false),
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

impl Healthcheck for MockRenderEngine {
    fn ping(&self) -> Result<()> {
        let active = self.state.pings_active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.ping_peak.fetch_max(active, Ordering::SeqCst);
        std::thread::sleep(self.ping_delay);
        self.state.pings_active.fetch_sub(1, Ordering::SeqCst);
        self.state.pings.fetch_add(1, Ordering::SeqCst);

        if self.healthy {
            Ok(())
        } else {
            Err(ConversionError::EngineUnavailable(
                "mock engine is down".to_string(),
            ))
        }
    }
}

struct MockSession {
    id: u64,
    state: Arc<MockState>,
    load_delay: Duration,
    closed: AtomicBool,
    not_ready: AtomicBool,
    fail_emit: AtomicBool,
}

impl MockSession {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn teardown(&self, aborted: bool) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.active.fetch_sub(1, Ordering::SeqCst);
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        if aborted {
            self.state.aborted.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Sleep up to `duration`, waking early if the session is torn down.
    fn interruptible_sleep(&self, duration: Duration) -> bool {
        let started = Instant::now();
        while started.elapsed() < duration {
            if self.is_closed() {
                return false;
            }
            std::thread::sleep(STALL_POLL.min(duration.saturating_sub(started.elapsed())));
        }
        !self.is_closed()
    }
}

impl RenderSession for MockSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn load(&self, source: &ContentSource, budget: Duration) -> Result<()> {
        let fail = |message: &str| ConversionError::ContentLoad {
            origin: source.origin(),
            message: message.to_string(),
        };

        if let ContentSource::Inline(html) = source {
            if html.contains(FAIL_LOAD_MARKER) {
                return Err(fail("mock load failure"));
            }
            if html.contains(STALL_MARKER) {
                self.interruptible_sleep(budget + STALL_OVERRUN);
                return Err(fail("mock load stalled"));
            }
            self.not_ready
                .store(html.contains(NOT_READY_MARKER), Ordering::SeqCst);
            self.fail_emit
                .store(html.contains(FAIL_EMIT_MARKER), Ordering::SeqCst);
        }

        if !self.interruptible_sleep(self.load_delay.min(budget)) {
            return Err(fail("session closed during load"));
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        !self.not_ready.load(Ordering::SeqCst)
    }

    fn print_pdf(&self, params: &PdfParams) -> Result<Vec<u8>> {
        if self.fail_emit.load(Ordering::SeqCst) {
            return Err(ConversionError::Emission("mock emission failure".to_string()));
        }

        *self
            .state
            .last_params
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(*params);

        Ok(format!(
            "%PDF-1.4\n% mock session {} {}x{}in scale {}\n%%EOF\n",
            self.id, params.paper_width, params.paper_height, params.scale
        )
        .into_bytes())
    }

    fn close(&self) {
        self.teardown(false);
    }

    fn abort(&self) {
        self.teardown(true);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Margins;

    fn params() -> PdfParams {
        PdfParams {
            paper_width: 8.27,
            paper_height: 11.69,
            margins: Margins::none(),
            print_background: true,
            scale: 1.0,
        }
    }

    #[test]
    fn test_session_counting() {
        let engine = MockRenderEngine::new();

        let first = engine.open_session().unwrap();
        let second = engine.open_session().unwrap();
        assert_eq!(engine.stats().active, 2);
        assert_eq!(engine.stats().peak, 2);

        first.close();
        first.close();
        second.abort();

        let stats = engine.stats();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.closed, 2, "Double close must count once");
        assert_eq!(stats.aborted, 1);
        assert_eq!(stats.peak, 2);
    }

    #[test]
    fn test_markers_drive_failures() {
        let engine = MockRenderEngine::new();
        let session = engine.open_session().unwrap();

        let result = session.load(
            &ContentSource::Inline(format!("<p>x</p>{FAIL_LOAD_MARKER}")),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(ConversionError::ContentLoad { .. })));

        session
            .load(
                &ContentSource::Inline(format!("<p>x</p>{FAIL_EMIT_MARKER}")),
                Duration::from_secs(1),
            )
            .unwrap();
        assert!(matches!(
            session.print_pdf(&params()),
            Err(ConversionError::Emission(_))
        ));
    }

    #[test]
    fn test_stall_ends_on_abort() {
        let engine = MockRenderEngine::new();
        let session = engine.open_session().unwrap();

        let stalled = Arc::clone(&session);
        let handle = std::thread::spawn(move || {
            stalled.load(
                &ContentSource::Inline(STALL_MARKER.to_string()),
                Duration::from_secs(30),
            )
        });

        std::thread::sleep(Duration::from_millis(30));
        let started = Instant::now();
        session.abort();

        assert!(handle.join().unwrap().is_err());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_print_produces_pdf_bytes() {
        let engine = MockRenderEngine::new();
        let session = engine.open_session().unwrap();
        session
            .load(&ContentSource::Inline("<h1>Test</h1>".into()), Duration::from_secs(1))
            .unwrap();

        let pdf = session.print_pdf(&params()).unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
        assert_eq!(engine.last_params(), Some(params()));
    }

    #[test]
    fn test_unavailable_engine() {
        let engine = MockRenderEngine::unavailable("no browser");
        assert!(matches!(
            engine.open_session(),
            Err(ConversionError::EngineUnavailable(_))
        ));
        assert!(engine.ping().is_err());
    }
}
