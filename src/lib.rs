//! # pdf-forge
//!
//! Bounded, concurrent HTML/URL/Markdown/image to PDF conversion on top of
//! headless Chrome.
//!
//! Every conversion passes through a fixed-capacity admission gate, renders
//! in its own isolated browser tab, and is abandoned (tab aborted, slot
//! returned) the moment its deadline passes. Counters for the metrics
//! endpoint are updated exactly once per attempt.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ HTTP (axum): routes, CORS, rate, id, auth   │
//! └─────────────────┬───────────────────────────┘
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │   PdfService: validation, batch, post-proc  │──▶ PdfProcessor (qpdf / gs)
//! └─────────────────┬───────────────────────────┘
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │                 Converter                   │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │ AdmissionGate   [slot] [slot] [ ] [ ]   │ │
//! │ └─────────────────────────────────────────┘ │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │ TaskContext per request (one tab)       │ │
//! │ └─────────────────────────────────────────┘ │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │ ConversionMetrics (total/ok/failed/type)│ │
//! │ └─────────────────────────────────────────┘ │
//! └─────────────────┬───────────────────────────┘
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │   RenderEngine: headless Chrome             │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pdf_forge::prelude::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ConverterConfigBuilder::new()
//!         .max_workers(4)
//!         .inline_timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     let engine = Arc::new(ChromeEngine::with_defaults());
//!     let converter = Converter::new(engine, config);
//!
//!     let request = RenderRequest::html("<h1>Hello</h1>", PdfOptions::default())?;
//!     let pdf = converter.convert(request).await?;
//!     println!("{} bytes in {:?}", pdf.len(), pdf.elapsed());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description | Default |
//! |---------|-------------|---------|
//! | `env-config` | Load configuration from `app.env` and environment variables | ✅ |
//! | `axum-integration` | HTTP API and the `pdf-forge` binary | ✅ |
//! | `test-utils` | [`engine::mock`] for tests without a browser | ❌ |

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod context;
pub mod converter;
pub mod engine;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod prelude;
pub mod processor;
pub mod request;
pub mod service;
pub mod traits;

// ============================================================================
// Feature-gated modules
// ============================================================================

#[cfg(feature = "axum-integration")]
pub mod integrations;

// ============================================================================
// Re-exports (Public API)
// ============================================================================

pub use config::{ConverterConfig, ConverterConfigBuilder, ReadinessMode, ServerConfig};
pub use context::{CancelToken, TaskContext};
pub use converter::{ConversionStage, Converter, PdfDocument};
pub use engine::{ChromeEngine, RenderEngine, RenderSession, create_chrome_options};
pub use error::{ContentOrigin, ConversionError, Result};
pub use gate::{AdmissionGate, AdmissionSlot, GateStatus};
pub use metrics::{ConversionMetrics, MetricsSnapshot};
pub use processor::{CompressionLevel, PdfProcessor, PdfSecurity, SplitMode};
pub use request::{
    ContentSource, ConversionKind, Margins, Orientation, PageSize, PdfOptions, PdfParams,
    RenderRequest, TableData,
};
pub use service::PdfService;
pub use traits::Healthcheck;

#[cfg(feature = "env-config")]
pub use config::env::{chrome_path_from_env, from_env, server_from_env};
