//! The conversion core.
//!
//! [`Converter`] turns a [`RenderRequest`] into PDF bytes while enforcing
//! three guarantees:
//!
//! - **Bounded concurrency**: at most `max_workers` render sessions exist
//!   at once (see [`AdmissionGate`])
//! - **Hard deadlines**: each conversion is abandoned when its deadline
//!   passes and its session is aborted
//! - **Exact accounting**: metrics are incremented exactly once per attempt
//!
//! # Pipeline
//!
//! ```text
//! Pending ──▶ SlotAcquired ──▶ ContextCreated ──▶ ContentLoaded ──▶ ReadyWait ──▶ PdfEmitted ──▶ Done
//!    │             │                 │                  │               │
//!    └─────────────┴─────────────────┴──────────────────┴───────────────┴──▶ Failed / TimedOut
//! ```
//!
//! Engine calls block, so everything after admission runs on a
//! `spawn_blocking` worker that owns the slot. The async side only waits
//! for that worker or for the deadline, whichever comes first.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdf_forge::{ChromeEngine, Converter, ConverterConfig, PdfOptions, RenderRequest};
//! use std::sync::Arc;
//!
//! let converter = Converter::new(Arc::new(ChromeEngine::with_defaults()), ConverterConfig::default());
//! let request = RenderRequest::html("<h1>Hello</h1>", PdfOptions::default())?;
//! let pdf = converter.convert(request).await?;
//! std::fs::write("hello.pdf", pdf.bytes())?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{ConverterConfig, ReadinessMode};
use crate::context::{CancelToken, TaskContext};
use crate::engine::{RenderEngine, RenderSession};
use crate::error::{ConversionError, Result};
use crate::gate::{AdmissionGate, GateStatus};
use crate::metrics::{ConversionMetrics, MetricsSnapshot};
use crate::request::{ContentSource, ConversionKind, RenderRequest};

/// How long a timed-out conversion waits for its worker to unwind before
/// reporting the timeout anyway.
pub const ABORT_GRACE: Duration = Duration::from_secs(2);

/// Where a conversion is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStage {
    Pending,
    SlotAcquired,
    ContextCreated,
    ContentLoaded,
    ReadyWait,
    PdfEmitted,
    Done,
    Failed,
    TimedOut,
}

impl fmt::Display for ConversionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversionStage::Pending => "pending",
            ConversionStage::SlotAcquired => "slot-acquired",
            ConversionStage::ContextCreated => "context-created",
            ConversionStage::ContentLoaded => "content-loaded",
            ConversionStage::ReadyWait => "ready-wait",
            ConversionStage::PdfEmitted => "pdf-emitted",
            ConversionStage::Done => "done",
            ConversionStage::Failed => "failed",
            ConversionStage::TimedOut => "timed-out",
        };
        f.write_str(name)
    }
}

/// A finished PDF.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    bytes: Vec<u8>,
    kind: ConversionKind,
    elapsed: Duration,
}

impl PdfDocument {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn kind(&self) -> ConversionKind {
        self.kind
    }

    /// Wall time from admission request to emitted PDF.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Records exactly one metrics increment per conversion attempt.
///
/// A recorder dropped without [`finish`](Self::finish) (the caller
/// abandoned the conversion future) counts as a failure.
struct OutcomeRecorder<'a> {
    metrics: &'a ConversionMetrics,
    kind: ConversionKind,
    recorded: bool,
}

impl<'a> OutcomeRecorder<'a> {
    fn new(metrics: &'a ConversionMetrics, kind: ConversionKind) -> Self {
        Self {
            metrics,
            kind,
            recorded: false,
        }
    }

    fn finish(mut self, success: bool) {
        self.record(success);
    }

    fn record(&mut self, success: bool) {
        if !self.recorded {
            self.recorded = true;
            self.metrics.increment(self.kind.as_str(), success);
        }
    }
}

impl Drop for OutcomeRecorder<'_> {
    fn drop(&mut self) {
        if !self.recorded {
            log::debug!("Conversion ({}) abandoned by caller", self.kind);
            self.record(false);
        }
    }
}

/// Timing knobs the blocking worker needs, copied out of the config.
#[derive(Debug, Clone, Copy)]
struct PipelineSettings {
    budget: Duration,
    readiness: ReadinessMode,
    settle: Duration,
    poll_interval: Duration,
}

/// Bounded, deadline-enforcing PDF converter.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Converter {
    engine: Arc<dyn RenderEngine>,
    gate: AdmissionGate,
    metrics: Arc<ConversionMetrics>,
    config: ConverterConfig,
}

impl Converter {
    /// Create a converter with its own metrics.
    pub fn new(engine: Arc<dyn RenderEngine>, config: ConverterConfig) -> Self {
        Self::with_metrics(engine, config, Arc::new(ConversionMetrics::new()))
    }

    /// Create a converter that reports into existing metrics.
    pub fn with_metrics(
        engine: Arc<dyn RenderEngine>,
        config: ConverterConfig,
        metrics: Arc<ConversionMetrics>,
    ) -> Self {
        log::info!(
            "🏭 Converter ready: engine={} workers={} inline_timeout={:?} url_timeout={:?}",
            engine.name(),
            config.max_workers,
            config.inline_timeout,
            config.url_timeout
        );
        Self {
            gate: AdmissionGate::new(config.max_workers),
            engine,
            metrics,
            config,
        }
    }

    pub fn engine(&self) -> &Arc<dyn RenderEngine> {
        &self.engine
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn metrics_handle(&self) -> &Arc<ConversionMetrics> {
        &self.metrics
    }

    pub fn gate_status(&self) -> GateStatus {
        self.gate.status()
    }

    /// Deadline budget for a kind of content.
    pub fn timeout_for(&self, kind: ConversionKind) -> Duration {
        match kind {
            ConversionKind::Url => self.config.url_timeout,
            _ => self.config.inline_timeout,
        }
    }

    fn settle_for(&self, kind: ConversionKind) -> Duration {
        match kind {
            ConversionKind::Url => self.config.url_settle_delay,
            ConversionKind::Images => self.config.image_settle_delay,
            _ => self.config.inline_settle_delay,
        }
    }

    /// Convert with the configured deadline for the request's kind.
    pub async fn convert(&self, request: RenderRequest) -> Result<PdfDocument> {
        self.convert_until(request, None).await
    }

    /// Convert, finishing no later than `deadline` if one is given.
    ///
    /// The effective deadline is the earlier of `deadline` and the kind's
    /// configured budget measured from admission.
    ///
    /// # Errors
    ///
    /// - [`ConversionError::AdmissionTimeout`]: no slot freed in time
    /// - [`ConversionError::EngineUnavailable`]: the engine refused a session
    /// - [`ConversionError::ContentLoad`]: injection or navigation failed
    /// - [`ConversionError::Emission`]: printing failed
    /// - [`ConversionError::Timeout`]: the deadline passed
    pub async fn convert_until(
        &self,
        request: RenderRequest,
        deadline: Option<Instant>,
    ) -> Result<PdfDocument> {
        let kind = request.kind();
        let recorder = OutcomeRecorder::new(&self.metrics, kind);

        let result = self.run(request, deadline).await;

        recorder.finish(result.is_ok());
        result
    }

    async fn run(&self, request: RenderRequest, deadline: Option<Instant>) -> Result<PdfDocument> {
        let started = Instant::now();
        let kind = request.kind();

        log::debug!(
            "📥 Conversion ({}) stage={} source={}",
            kind,
            ConversionStage::Pending,
            request.source().describe()
        );

        let admission_deadline = earliest(started + self.config.admission_timeout, deadline);
        let slot = self.gate.acquire_until(admission_deadline).await?;

        let budget = self.timeout_for(kind);
        let deadline = earliest(Instant::now() + budget, deadline);
        let budget = deadline.saturating_duration_since(Instant::now());
        log::trace!(
            "Conversion ({}) stage={} budget={:?} ({})",
            kind,
            ConversionStage::SlotAcquired,
            budget,
            self.gate.status()
        );

        let cancel = CancelToken::new();
        let cancel_on_drop = cancel.drop_guard();
        let settings = PipelineSettings {
            budget,
            readiness: self.config.readiness,
            settle: self.settle_for(kind),
            poll_interval: self.config.poll_interval,
        };

        let engine = Arc::clone(&self.engine);
        let worker_cancel = cancel.clone();
        let mut worker = tokio::task::spawn_blocking(move || {
            // Declared first so it drops last, after the task context.
            let _slot = slot;
            render_blocking(engine.as_ref(), &request, settings, &worker_cancel, deadline)
        });

        let outcome = tokio::time::timeout_at(deadline.into(), &mut worker).await;
        cancel_on_drop.disarm();

        let bytes = match outcome {
            Ok(Ok(result)) => result?,
            Ok(Err(join_error)) => {
                log::error!("❌ Conversion ({}) worker failed: {}", kind, join_error);
                return Err(ConversionError::Internal(join_error.to_string()));
            }
            Err(_) => {
                log::warn!(
                    "⏰ Conversion ({}) stage={} after {:?}, aborting session",
                    kind,
                    ConversionStage::TimedOut,
                    started.elapsed()
                );
                cancel.cancel();
                if tokio::time::timeout(ABORT_GRACE, worker).await.is_err() {
                    log::warn!("⚠️ Conversion ({}) worker still unwinding after abort", kind);
                }
                return Err(ConversionError::Timeout(budget));
            }
        };

        log::info!(
            "✅ Conversion ({}) stage={} {} bytes in {:?}",
            kind,
            ConversionStage::Done,
            bytes.len(),
            started.elapsed()
        );

        Ok(PdfDocument {
            bytes,
            kind,
            elapsed: started.elapsed(),
        })
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("engine", &self.engine.name())
            .field("gate", &self.gate.status())
            .field("config", &self.config)
            .finish()
    }
}

fn earliest(a: Instant, b: Option<Instant>) -> Instant {
    match b {
        Some(b) if b < a => b,
        _ => a,
    }
}

/// The blocking half of a conversion. Runs while holding an admission slot.
fn render_blocking(
    engine: &dyn RenderEngine,
    request: &RenderRequest,
    settings: PipelineSettings,
    cancel: &CancelToken,
    deadline: Instant,
) -> Result<Vec<u8>> {
    let kind = request.kind();
    let remaining = || deadline.saturating_duration_since(Instant::now());
    let check = |stage: ConversionStage| -> Result<()> {
        if cancel.is_cancelled() || remaining().is_zero() {
            log::debug!("Conversion ({}) stopped before stage={}", kind, stage);
            return Err(ConversionError::Timeout(settings.budget));
        }
        Ok(())
    };

    let context = TaskContext::open(engine, cancel)?;
    let session = context.session();
    log::trace!(
        "Conversion ({}) stage={} session=#{}",
        kind,
        ConversionStage::ContextCreated,
        context.id()
    );

    check(ConversionStage::ContentLoaded)?;
    session.load(request.source(), remaining())?;

    check(ConversionStage::ReadyWait)?;
    wait_until_ready(session, request.source(), settings, cancel, deadline);

    check(ConversionStage::PdfEmitted)?;
    let bytes = session.print_pdf(&request.print_params())?;
    if bytes.is_empty() {
        return Err(ConversionError::Emission("engine returned an empty PDF".to_string()));
    }

    Ok(bytes)
}

/// Wait for the settle interval, or less if the page reports ready.
///
/// Always returns; a page that never reports ready is printed anyway once
/// the settle interval ends.
fn wait_until_ready(
    session: &dyn RenderSession,
    source: &ContentSource,
    settings: PipelineSettings,
    cancel: &CancelToken,
    deadline: Instant,
) {
    let started = Instant::now();
    let settle_until = earliest(started + settings.settle, Some(deadline));

    if settings.settle.is_zero() {
        return;
    }

    log::trace!(
        "Waiting up to {:?} for {} ({:?}, every {:?})",
        settings.settle,
        source.describe(),
        settings.readiness,
        settings.poll_interval
    );

    loop {
        if cancel.is_cancelled() {
            return;
        }

        if settings.readiness == ReadinessMode::Poll && session.is_ready() {
            log::debug!("Page signalled ready after {:?}", started.elapsed());
            return;
        }

        let left = settle_until.saturating_duration_since(Instant::now());
        if left.is_zero() {
            log::debug!(
                "Settle interval finished after {:?}, proceeding",
                started.elapsed()
            );
            return;
        }

        std::thread::sleep(settings.poll_interval.min(left));
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
