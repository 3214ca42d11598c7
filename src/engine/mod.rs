//! Render engine abstraction.
//!
//! The converter talks to the headless browser through two traits:
//!
//! - [`RenderEngine`]: one long-lived browser process that opens sessions
//! - [`RenderSession`]: one isolated tab bound to a single conversion
//!
//! # Implementations
//!
//! - [`ChromeEngine`]: production engine driving Chrome through `headless_chrome`
//! - [`mock::MockRenderEngine`]: in-memory engine for tests (requires
//!   the `test-utils` feature)
//!
//! Session methods block. The converter always calls them from a blocking
//! worker thread, never from an async task.

mod chrome;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use chrome::{ChromeEngine, create_chrome_options};

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::request::{ContentSource, PdfParams};
use crate::traits::Healthcheck;

/// Expression a page must satisfy before it is printed early.
///
/// Pages that render asynchronously can set `window.isPageDone = false`
/// on load and flip it to `true` once finished.
pub const READINESS_SCRIPT: &str =
    "document.readyState === 'complete' && window.isPageDone !== false";

/// Source of render sessions.
pub trait RenderEngine: Healthcheck {
    /// Open a fresh, isolated session.
    ///
    /// # Errors
    ///
    /// [`ConversionError::EngineUnavailable`](crate::ConversionError::EngineUnavailable)
    /// when the browser cannot host another tab.
    fn open_session(&self) -> Result<Arc<dyn RenderSession>>;

    /// Short engine name for health output.
    fn name(&self) -> &'static str;

    /// Release the browser process. Further sessions may fail.
    fn shutdown(&self) {}
}

/// One isolated rendering context.
pub trait RenderSession: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> u64;

    /// Inject or navigate to `source` and wait for its body element.
    ///
    /// No single engine call may block longer than `budget`.
    fn load(&self, source: &ContentSource, budget: Duration) -> Result<()>;

    /// Evaluate [`READINESS_SCRIPT`]. Evaluation errors count as not ready.
    fn is_ready(&self) -> bool;

    /// Print the loaded document.
    fn print_pdf(&self, params: &PdfParams) -> Result<Vec<u8>>;

    /// Tear the session down. Idempotent and best effort.
    fn close(&self);

    /// Tear the session down from another thread without blocking, so
    /// that in-flight calls on this session return promptly.
    fn abort(&self);
}
