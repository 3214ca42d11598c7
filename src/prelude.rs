//! Convenience re-exports.
//!
//! ```rust,ignore
//! use pdf_forge::prelude::*;
//! ```

pub use crate::config::{ConverterConfig, ConverterConfigBuilder, ReadinessMode, ServerConfig};
pub use crate::converter::{Converter, PdfDocument};
pub use crate::engine::{ChromeEngine, RenderEngine, RenderSession};
pub use crate::error::{ConversionError, Result};
pub use crate::gate::GateStatus;
pub use crate::metrics::MetricsSnapshot;
pub use crate::processor::{PdfProcessor, PdfSecurity};
pub use crate::request::{ConversionKind, Margins, Orientation, PageSize, PdfOptions, RenderRequest};
pub use crate::service::{ConversionRequest, PdfService, RequestType};
pub use crate::traits::Healthcheck;

#[cfg(feature = "env-config")]
pub use crate::config::env::{from_env, server_from_env};

pub use std::sync::Arc;
