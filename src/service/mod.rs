//! Framework-agnostic PDF service.
//!
//! Thin handler, thick service: [`PdfService`] holds all request
//! validation, conversion, post-processing and reporting logic, while the
//! integrations only map HTTP to and from the types in this module.
//!
//! ```text
//!   axum handler ──▶ PdfService::convert ──▶ Converter (gate, engine, metrics)
//!                           │
//!                           ├──▶ PdfProcessor (encrypt, merge, ...) on spawn_blocking
//!                           ├──▶ TemplateEngine (handlebars) before convert
//!                           └──▶ WebhookNotifier after a background convert
//! ```

mod pdf;
mod templates;
mod types;
pub mod webhook;

pub use pdf::{HEALTH_PING_TIMEOUT, MAX_BATCH_SIZE, ManipulateOutcome, PdfService};
pub use templates::{BUILTIN_TEMPLATES, CUSTOM_TEMPLATE, TemplateEngine, TemplateRequest};
pub use types::{
    AsyncAccepted, AsyncRequest, BatchItemResult, BatchRequest, BatchResult, ConversionOptions,
    ConversionRequest, EngineHealth, ErrorResponse, HealthResponse, ManipulateOperation,
    ManipulateRequest, ManipulateResult, MergeRequest, RequestType, SplitType, WorkerStatus,
};
pub use webhook::{WebhookConfig, WebhookNotifier, WebhookPayload};
