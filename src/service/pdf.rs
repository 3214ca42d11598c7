//! Core conversion service.
//!
//! [`PdfService`] ties the [`Converter`] to the [`PdfProcessor`] and exposes
//! one async method per API operation. It knows nothing about HTTP; the
//! integrations only translate requests and responses.
//!
//! Processor calls block on external tools, so they always run inside
//! `spawn_blocking`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};

use crate::converter::Converter;
use crate::error::{ConversionError, Result};
use crate::metrics::render_prometheus;
use crate::processor::{PdfProcessor, PdfSecurity};
use crate::request::content::decode_base64;
use crate::service::templates::{TemplateEngine, TemplateRequest};
use crate::service::types::*;
use crate::service::webhook::{WebhookNotifier, WebhookPayload};

/// Upper bound on items in one batch request.
pub const MAX_BATCH_SIZE: usize = 100;

/// How long `/health` waits for the engine ping.
pub const HEALTH_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a manipulation: either one PDF or a JSON report.
#[derive(Debug, Clone, PartialEq)]
pub enum ManipulateOutcome {
    Pdf(Vec<u8>),
    Report(ManipulateResult),
}

/// Framework-agnostic front end for every API operation.
pub struct PdfService {
    converter: Arc<Converter>,
    processor: PdfProcessor,
    templates: TemplateEngine,
    webhooks: WebhookNotifier,
    /// One engine ping at a time; health checks bypass the admission gate.
    ping_permit: Arc<Semaphore>,
    started_at: Instant,
    version: String,
}

impl PdfService {
    pub fn new(converter: Arc<Converter>, processor: PdfProcessor) -> Self {
        Self {
            converter,
            processor,
            templates: TemplateEngine::new(),
            webhooks: WebhookNotifier::new(),
            ping_permit: Arc::new(Semaphore::new(1)),
            started_at: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Replace the webhook notifier, e.g. to shorten retry backoff.
    pub fn with_webhooks(mut self, webhooks: WebhookNotifier) -> Self {
        self.webhooks = webhooks;
        self
    }

    pub fn converter(&self) -> &Arc<Converter> {
        &self.converter
    }

    pub fn processor(&self) -> &PdfProcessor {
        &self.processor
    }

    /// Run a processor operation on the blocking pool.
    async fn process<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&PdfProcessor) -> Result<T> + Send + 'static,
    {
        let processor = self.processor.clone();
        tokio::task::spawn_blocking(move || op(&processor))
            .await
            .map_err(|e| ConversionError::Internal(format!("processor task failed: {}", e)))?
    }

    async fn secure(&self, pdf: Vec<u8>, security: Option<PdfSecurity>) -> Result<Vec<u8>> {
        match security {
            Some(security) => {
                self.process(move |processor| processor.encrypt(&pdf, &security))
                    .await
            }
            None => Ok(pdf),
        }
    }

    /// Convert one request and apply its post-processing.
    ///
    /// `fallback` supplies the content type when the payload has no `type`.
    pub async fn convert(
        &self,
        request: ConversionRequest,
        fallback: Option<RequestType>,
    ) -> Result<Vec<u8>> {
        let (render, security) = request.into_render_request(fallback)?;
        let document = self.converter.convert(render).await?;
        self.secure(document.into_bytes(), security).await
    }

    /// Render a document template and convert the resulting HTML.
    pub async fn template(&self, request: TemplateRequest) -> Result<Vec<u8>> {
        let html = self.templates.render(&request)?;
        let conversion = ConversionRequest {
            options: request.options,
            ..ConversionRequest::html(html)
        };
        self.convert(conversion, None).await
    }

    /// Validate an asynchronous request and convert it in the background,
    /// reporting the outcome to its webhook.
    ///
    /// Validation failures are returned immediately; everything after that
    /// reaches the caller only through the webhook.
    pub fn submit_async(
        self: &Arc<Self>,
        request: AsyncRequest,
        request_id: &str,
    ) -> Result<JoinHandle<()>> {
        let webhook = request.webhook.ok_or_else(|| {
            ConversionError::InvalidRequest("'webhook' is required for async conversion".to_string())
        })?;
        webhook.validate()?;
        let kind = request.request.resolved_kind(None)?;

        let service = Arc::clone(self);
        let request_id = request_id.to_string();
        let conversion = request.request;
        log::info!("📨 Queued async conversion request_id={} type={}", request_id, kind.as_str());

        Ok(tokio::spawn(async move {
            let started = Instant::now();
            let payload = match service.convert(conversion, None).await {
                Ok(pdf) => WebhookPayload::completed(
                    &request_id,
                    kind.as_str(),
                    &pdf,
                    started.elapsed(),
                    webhook.include_pdf,
                ),
                Err(e) => {
                    log::warn!("⚠️ Async conversion request_id={} failed: {}", request_id, e);
                    WebhookPayload::failed(&request_id, kind.as_str(), &e, started.elapsed())
                }
            };

            if let Err(e) = service.webhooks.deliver(&webhook, &payload).await {
                log::error!("❌ Webhook for request_id={} not delivered: {}", request_id, e);
            }
        }))
    }

    /// Merge base64 PDFs, in order, into one document.
    pub async fn merge(&self, request: MergeRequest) -> Result<Vec<u8>> {
        if request.pdfs.len() < 2 {
            return Err(ConversionError::InvalidRequest(
                "at least two PDFs are required to merge".to_string(),
            ));
        }

        let pdfs = request
            .pdfs
            .iter()
            .map(|pdf| decode_base64(pdf))
            .collect::<Result<Vec<_>>>()?;

        let merged = self.process(move |processor| processor.merge(&pdfs)).await?;
        log::info!("📎 Merged {} PDFs into {} bytes", request.pdfs.len(), merged.len());

        self.secure(merged, request.security.filter(PdfSecurity::is_active))
            .await
    }

    /// Apply one manipulation to a base64 PDF.
    pub async fn manipulate(&self, request: ManipulateRequest) -> Result<ManipulateOutcome> {
        let pdf = decode_base64(&request.pdf)?;
        let operation = request.operation;
        let name = operation.name();
        log::debug!("🔧 Manipulating {} byte PDF: {}", pdf.len(), name);

        self.process(move |processor| {
            let outcome = match operation {
                ManipulateOperation::Split {
                    split_type,
                    pages,
                    every_n,
                } => {
                    let mode = ManipulateOperation::split_mode(split_type, pages, every_n)?;
                    let parts = processor.split(&pdf, &mode)?;
                    ManipulateOutcome::Report(ManipulateResult {
                        operation: name.to_string(),
                        page_count: None,
                        pdfs: parts.iter().map(|part| STANDARD.encode(part)).collect(),
                        savings_percent: None,
                    })
                }
                ManipulateOperation::Extract { pages } => {
                    ManipulateOutcome::Pdf(processor.extract(&pdf, &pages)?)
                }
                ManipulateOperation::Rotate { rotation, pages } => {
                    ManipulateOutcome::Pdf(processor.rotate(&pdf, rotation, pages.as_deref())?)
                }
                ManipulateOperation::Reorder { new_order } => {
                    ManipulateOutcome::Pdf(processor.reorder(&pdf, &new_order)?)
                }
                ManipulateOperation::Compress { level } => {
                    let compressed = processor.compress(&pdf, level)?;
                    ManipulateOutcome::Report(ManipulateResult {
                        operation: name.to_string(),
                        page_count: None,
                        pdfs: vec![STANDARD.encode(&compressed.bytes)],
                        savings_percent: Some(compressed.savings_percent),
                    })
                }
                ManipulateOperation::Info => ManipulateOutcome::Report(ManipulateResult {
                    operation: name.to_string(),
                    page_count: Some(processor.page_count(&pdf)?),
                    ..Default::default()
                }),
            };
            Ok(outcome)
        })
        .await
    }

    /// Convert every item concurrently.
    ///
    /// Items share the admission gate with all other traffic, so a batch
    /// never exceeds the worker bound. Item failures are reported per item;
    /// only an empty or oversized batch fails as a whole.
    pub async fn batch(
        self: &Arc<Self>,
        request: BatchRequest,
        request_id: &str,
    ) -> Result<BatchResult> {
        let total = request.requests.len();
        if total == 0 {
            return Err(ConversionError::InvalidRequest(
                "at least one request is required".to_string(),
            ));
        }
        if total > MAX_BATCH_SIZE {
            return Err(ConversionError::InvalidRequest(format!(
                "batch holds {} requests, the limit is {}",
                total, MAX_BATCH_SIZE
            )));
        }

        let mut tasks = JoinSet::new();
        for (index, item) in request.requests.into_iter().enumerate() {
            let service = Arc::clone(self);
            tasks.spawn(async move { (index, service.convert(item, None).await) });
        }

        let mut outcomes: Vec<(usize, Result<Vec<u8>>)> = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => log::error!("❌ Batch item task failed: {}", e),
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);

        let mut results = Vec::with_capacity(total);
        let mut successful = Vec::new();
        for (index, outcome) in outcomes {
            match outcome {
                Ok(pdf) => {
                    results.push(BatchItemResult {
                        index,
                        success: true,
                        error: None,
                        pdf: (!request.merge).then(|| STANDARD.encode(&pdf)),
                        size: pdf.len(),
                    });
                    successful.push(pdf);
                }
                Err(e) => results.push(BatchItemResult {
                    index,
                    success: false,
                    error: Some(e.to_string()),
                    pdf: None,
                    size: 0,
                }),
            }
        }

        let completed = successful.len();
        let merged_pdf = if request.merge {
            self.merge_batch(successful).await
        } else {
            None
        };

        log::info!(
            "📦 Batch request_id={} total={} completed={} failed={}",
            request_id,
            total,
            completed,
            total - completed
        );

        Ok(BatchResult {
            request_id: request_id.to_string(),
            total,
            completed,
            failed: total - completed,
            results,
            merged_pdf,
        })
    }

    async fn merge_batch(&self, mut pdfs: Vec<Vec<u8>>) -> Option<String> {
        match pdfs.len() {
            0 => None,
            1 => pdfs.pop().map(|pdf| STANDARD.encode(pdf)),
            _ => match self.process(move |processor| processor.merge(&pdfs)).await {
                Ok(merged) => Some(STANDARD.encode(merged)),
                Err(e) => {
                    log::warn!("⚠️ Batch merge failed: {}", e);
                    None
                }
            },
        }
    }

    /// Liveness report. Pings the engine on the blocking pool.
    ///
    /// At most one ping runs at a time. A ping that overruns
    /// [`HEALTH_PING_TIMEOUT`] keeps its permit until it returns, so later
    /// checks time out waiting instead of stacking more pings.
    pub async fn health(&self) -> HealthResponse {
        let engine = Arc::clone(self.converter.engine());
        let name = engine.name().to_string();
        let permits = Arc::clone(&self.ping_permit);

        let ping = tokio::time::timeout(HEALTH_PING_TIMEOUT, async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|e| ConversionError::Internal(format!("ping permit closed: {}", e)))?;
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                engine.ping()
            })
            .await
            .map_err(|e| ConversionError::Internal(format!("ping task failed: {}", e)))?
        })
        .await;

        let error = match ping {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("ping timed out after {:?}", HEALTH_PING_TIMEOUT)),
        };
        if let Some(ref e) = error {
            log::warn!("⚠️ Engine health check failed: {}", e);
        }

        let gate = self.converter.gate_status();
        HealthResponse {
            status: if error.is_none() { "healthy" } else { "degraded" }.to_string(),
            version: self.version.clone(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            engine: EngineHealth {
                name,
                status: if error.is_none() { "ok" } else { "unavailable" }.to_string(),
                error,
            },
            workers: WorkerStatus {
                max: gate.max,
                available: gate.available,
                in_use: gate.in_use,
            },
            conversions: self.converter.metrics(),
        }
    }

    /// Prometheus text exposition of counters and gauges.
    pub fn metrics_text(&self) -> String {
        render_prometheus(&self.converter.metrics(), &self.converter.gate_status())
    }
}

impl std::fmt::Debug for PdfService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfService")
            .field("converter", &self.converter)
            .field("version", &self.version)
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConverterConfigBuilder;
    use crate::engine::mock::{FAIL_LOAD_MARKER, MockRenderEngine};
    use crate::processor::{CommandOutput, CommandRunner};

    /// Runner that fails every call; conversions without post-processing
    /// never reach it.
    struct NoTools;

    impl CommandRunner for NoTools {
        fn run(&self, program: &str, _args: &[String]) -> Result<CommandOutput> {
            Err(ConversionError::Processing(format!("{} not installed", program)))
        }
    }

    fn service(engine: MockRenderEngine) -> Arc<PdfService> {
        let config = ConverterConfigBuilder::new()
            .max_workers(2)
            .settle_delay(Duration::ZERO)
            .build()
            .unwrap();
        let converter = Arc::new(Converter::new(Arc::new(engine), config));
        Arc::new(PdfService::new(
            converter,
            PdfProcessor::with_runner(Arc::new(NoTools)),
        ))
    }

    #[tokio::test]
    async fn test_convert_html() {
        let service = service(MockRenderEngine::new());
        let pdf = service
            .convert(ConversionRequest::html("<h1>Test</h1>"), None)
            .await
            .unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert_eq!(service.converter().metrics().by_type.get("html"), Some(&1));
    }

    #[tokio::test]
    async fn test_security_runs_processor() {
        let service = service(MockRenderEngine::new());
        let mut request = ConversionRequest::html("<p>secret</p>");
        request.options = Some(ConversionOptions {
            security: Some(PdfSecurity {
                user_password: "pw".into(),
                ..Default::default()
            }),
            ..Default::default()
        });

        let err = service.convert(request, None).await.unwrap_err();
        assert!(matches!(err, ConversionError::Processing(_)));
    }

    #[tokio::test]
    async fn test_merge_needs_two() {
        let service = service(MockRenderEngine::new());
        let err = service
            .merge(MergeRequest {
                pdfs: vec!["JVBERi0=".into()],
                security: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_batch_reports_per_item() {
        let service = service(MockRenderEngine::new());
        let request = BatchRequest {
            requests: vec![
                ConversionRequest::html("<p>one</p>"),
                ConversionRequest::html(format!("<p>two</p>{}", FAIL_LOAD_MARKER)),
                ConversionRequest::url("ftp://example.com"),
                ConversionRequest::html("<p>four</p>"),
            ],
            merge: false,
        };

        let result = service.batch(request, "req-7").await.unwrap();
        assert_eq!(result.request_id, "req-7");
        assert_eq!(result.total, 4);
        assert_eq!(result.completed, 2);
        assert_eq!(result.failed, 2);

        let indexes: Vec<usize> = result.results.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3]);
        assert!(result.results[0].pdf.is_some());
        assert!(!result.results[1].success);
        assert!(result.merged_pdf.is_none());
    }

    #[tokio::test]
    async fn test_batch_single_success_merge() {
        let service = service(MockRenderEngine::new());
        let request = BatchRequest {
            requests: vec![ConversionRequest::html("<p>only</p>")],
            merge: true,
        };

        let result = service.batch(request, "req-8").await.unwrap();
        assert!(result.results[0].pdf.is_none());
        assert!(result.merged_pdf.is_some());
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let service = service(MockRenderEngine::new());
        let err = service
            .batch(BatchRequest::default(), "req-9")
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_health() {
        let healthy = service(MockRenderEngine::new()).health().await;
        assert_eq!(healthy.status, "healthy");
        assert_eq!(healthy.engine.name, "mock");
        assert_eq!(healthy.workers.max, 2);
        assert_eq!(healthy.workers.available, 2);

        let degraded = service(MockRenderEngine::unavailable("no browser"))
            .health()
            .await;
        assert_eq!(degraded.status, "degraded");
        assert_eq!(degraded.engine.status, "unavailable");
    }

    #[tokio::test]
    async fn test_concurrent_health_checks_ping_one_at_a_time() {
        let engine = MockRenderEngine::new().with_ping_delay(Duration::from_millis(100));
        let service = service(engine.clone());

        let checks = (0..4).map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.health().await })
        });
        for check in checks.collect::<Vec<_>>() {
            assert_eq!(check.await.unwrap().status, "healthy");
        }

        let stats = engine.stats();
        assert_eq!(stats.pings, 4);
        assert_eq!(stats.ping_peak, 1);
        assert_eq!(stats.opened, 0, "health must not open tabs");
    }

    #[tokio::test]
    async fn test_template_converts_rendered_html() {
        let engine = MockRenderEngine::new();
        let service = service(engine.clone());
        let request = TemplateRequest {
            template: "receipt".into(),
            data: serde_json::json!({ "store_name": "Corner Shop", "total": 3 }),
            ..Default::default()
        };

        let pdf = service.template(request).await.unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert_eq!(engine.stats().opened, 1);
        assert_eq!(service.converter().metrics().by_type.get("html"), Some(&1));

        let unknown = TemplateRequest {
            template: "memo".into(),
            ..Default::default()
        };
        assert!(matches!(
            service.template(unknown).await,
            Err(ConversionError::InvalidRequest(_))
        ));
        assert_eq!(engine.stats().opened, 1);
    }

    #[tokio::test]
    async fn test_async_requires_webhook_and_type() {
        let service = service(MockRenderEngine::new());

        let missing = AsyncRequest {
            request: ConversionRequest::html("<p>x</p>"),
            webhook: None,
        };
        assert!(matches!(
            service.submit_async(missing, "a-1"),
            Err(ConversionError::InvalidRequest(msg)) if msg.contains("webhook")
        ));

        let untyped = AsyncRequest {
            request: ConversionRequest {
                html: Some("<p>x</p>".into()),
                ..Default::default()
            },
            webhook: Some(crate::service::webhook::WebhookConfig::new("http://127.0.0.1:9/hook")),
        };
        assert!(service.submit_async(untyped, "a-2").is_err());
        assert_eq!(service.converter().metrics().total, 0);
    }

    #[tokio::test]
    async fn test_metrics_text() {
        let service = service(MockRenderEngine::new());
        service
            .convert(ConversionRequest::html("<p>x</p>"), None)
            .await
            .unwrap();
        let text = service.metrics_text();
        assert!(text.contains("pdf_forge_conversions_total 1"));
        assert!(text.contains("pdf_forge_workers_max 2"));
    }
}
