//! Per-request rendering context and cancellation.
//!
//! A [`TaskContext`] owns one render session for exactly one conversion and
//! closes it when dropped, whatever the exit path. A [`CancelToken`] lets
//! the async side abort that session from outside the blocking worker that
//! drives it.
//!
//! # Lifecycle
//!
//! ```text
//! AdmissionSlot ──▶ TaskContext::open ──▶ load / wait / print ──▶ drop(TaskContext) ──▶ drop(slot)
//!                          │                                            ▲
//!                          └──── attached to CancelToken ── cancel() ───┘ (abort)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::engine::{RenderEngine, RenderSession};
use crate::error::Result;

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    session: Mutex<Option<Arc<dyn RenderSession>>>,
}

/// Shared cancellation flag that also aborts the attached session.
///
/// Cloning shares the flag.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Set the flag and abort the attached session, if any.
    ///
    /// Only the first call has an effect.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let session = self
            .inner
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(session) = session {
            log::debug!("✂️ Cancelling session #{}", session.id());
            session.abort();
        }
    }

    /// Attach a session so that [`cancel`](Self::cancel) can abort it.
    ///
    /// Returns `false` (and aborts the session) if the token was already
    /// cancelled.
    fn attach(&self, session: Arc<dyn RenderSession>) -> bool {
        let mut slot = self.inner.session.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_cancelled() {
            drop(slot);
            session.abort();
            return false;
        }
        *slot = Some(session);
        true
    }

    fn detach(&self) {
        self.inner
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    /// Guard that cancels this token when dropped unless disarmed.
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            token: Some(self.clone()),
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Cancels its token on drop.
///
/// Held by the async side of a conversion so that dropping the conversion
/// future (client disconnect, outer timeout) also stops the blocking work.
#[derive(Debug)]
pub struct CancelOnDrop {
    token: Option<CancelToken>,
}

impl CancelOnDrop {
    /// Keep the token alive without cancelling it.
    pub fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

/// One render session bound to one conversion.
///
/// Never shared between requests. Dropping the context closes the session.
pub struct TaskContext {
    session: Arc<dyn RenderSession>,
    cancel: CancelToken,
    opened_at: Instant,
}

impl TaskContext {
    /// Open a session and attach it to `cancel`.
    ///
    /// If `cancel` has already fired the session is aborted straight away
    /// and later calls on it fail fast.
    pub fn open(engine: &dyn RenderEngine, cancel: &CancelToken) -> Result<Self> {
        let session = engine.open_session()?;
        if !cancel.attach(Arc::clone(&session)) {
            log::debug!("Session #{} opened after cancellation", session.id());
        }

        Ok(Self {
            session,
            cancel: cancel.clone(),
            opened_at: Instant::now(),
        })
    }

    pub fn session(&self) -> &dyn RenderSession {
        self.session.as_ref()
    }

    pub fn id(&self) -> u64 {
        self.session.id()
    }
}

impl Drop for TaskContext {
    fn drop(&mut self) {
        self.cancel.detach();
        self.session.close();
        log::trace!(
            "🧹 Task context #{} torn down after {:?}",
            self.session.id(),
            self.opened_at.elapsed()
        );
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockRenderEngine;

    #[test]
    fn test_context_closes_session_on_drop() {
        let engine = MockRenderEngine::new();
        let token = CancelToken::new();

        {
            let context = TaskContext::open(&engine, &token).unwrap();
            assert_eq!(context.id(), 1);
            assert_eq!(engine.stats().active, 1);
        }

        let stats = engine.stats();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.aborted, 0);
    }

    #[test]
    fn test_cancel_aborts_attached_session() {
        let engine = MockRenderEngine::new();
        let token = CancelToken::new();
        let context = TaskContext::open(&engine, &token).unwrap();

        token.cancel();
        assert!(token.is_cancelled());
        assert_eq!(engine.stats().aborted, 1);

        drop(context);
        assert_eq!(engine.stats().closed, 1, "Close after abort is a no-op");
    }

    #[test]
    fn test_open_after_cancel_aborts_immediately() {
        let engine = MockRenderEngine::new();
        let token = CancelToken::new();
        token.cancel();

        let context = TaskContext::open(&engine, &token).unwrap();
        assert_eq!(engine.stats().aborted, 1);
        drop(context);
        assert_eq!(engine.stats().active, 0);
    }

    #[test]
    fn test_drop_guard() {
        let token = CancelToken::new();
        drop(token.drop_guard());
        assert!(token.is_cancelled());

        let token = CancelToken::new();
        token.drop_guard().disarm();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_after_drop_does_not_touch_session() {
        let engine = MockRenderEngine::new();
        let token = CancelToken::new();
        drop(TaskContext::open(&engine, &token).unwrap());

        token.cancel();
        assert_eq!(engine.stats().aborted, 0);
    }
}
