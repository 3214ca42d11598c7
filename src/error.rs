//! Error types for PDF conversion.
//!
//! This module provides [`ConversionError`], the single error type returned
//! by the admission gate, the conversion core, the post-processor and the
//! HTTP layer, plus a convenient [`Result`] type alias.
//!
//! # Taxonomy
//!
//! | Variant | Raised when | HTTP | Retryable |
//! |---------|-------------|------|-----------|
//! | [`InvalidRequest`](ConversionError::InvalidRequest) | Payload failed validation | 400 | No |
//! | [`AdmissionTimeout`](ConversionError::AdmissionTimeout) | No free slot before the deadline | 503 | Yes |
//! | [`ContentLoad`](ConversionError::ContentLoad) | Injection or navigation failed | 422 / 502 | Remote only |
//! | [`Emission`](ConversionError::Emission) | Engine failed to print a loaded page | 500 | Yes |
//! | [`Timeout`](ConversionError::Timeout) | Per-request deadline elapsed | 504 | Yes |
//! | [`EngineUnavailable`](ConversionError::EngineUnavailable) | No render session could be opened | 503 | Yes |
//! | [`Processing`](ConversionError::Processing) | External PDF tool failed | 500 | No |
//! | [`Delivery`](ConversionError::Delivery) | Webhook endpoint never accepted the result | 502 | Yes |
//! | [`Configuration`](ConversionError::Configuration) | Invalid configuration | 500 | No |
//! | [`Internal`](ConversionError::Internal) | Worker task panicked or vanished | 500 | No |
//!
//! # Example
//!
//! ```rust
//! use pdf_forge::{ConversionError, Result};
//!
//! fn render() -> Result<Vec<u8>> {
//!     Err(ConversionError::Configuration("example error".to_string()))
//! }
//!
//! match render() {
//!     Ok(pdf) => println!("Generated {} bytes", pdf.len()),
//!     Err(e) if e.is_retryable() => println!("Try again later: {}", e),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Where content that failed to load came from.
///
/// Inline failures are attributed to the caller (bad markup), remote
/// failures to the upstream site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOrigin {
    /// Markup supplied in the request body.
    Inline,
    /// A URL the engine navigated to.
    Remote,
}

impl fmt::Display for ContentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentOrigin::Inline => write!(f, "inline"),
            ContentOrigin::Remote => write!(f, "remote"),
        }
    }
}

/// Errors that can occur during a conversion or post-processing step.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// The request payload failed validation before any work started.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No admission slot became free before the deadline.
    ///
    /// The request never touched the render engine.
    #[error("No rendering slot available within {0:?}")]
    AdmissionTimeout(Duration),

    /// The engine failed to inject or navigate to the content.
    #[error("Failed to load {origin} content: {message}")]
    ContentLoad {
        /// Whether the content was inline markup or a remote URL.
        origin: ContentOrigin,
        /// Engine-supplied description of the failure.
        message: String,
    },

    /// The engine loaded the content but failed to print it.
    #[error("Failed to emit PDF: {0}")]
    Emission(String),

    /// The per-request deadline elapsed before a PDF was produced.
    ///
    /// No partial output is ever returned alongside this error.
    #[error("Conversion timed out after {0:?}")]
    Timeout(Duration),

    /// The render engine could not open a session.
    #[error("Render engine unavailable: {0}")]
    EngineUnavailable(String),

    /// An external PDF tool (qpdf, ghostscript) failed.
    #[error("PDF processing failed: {0}")]
    Processing(String),

    /// A webhook endpoint rejected or never answered every delivery
    /// attempt.
    #[error("Webhook delivery failed: {0}")]
    Delivery(String),

    /// Invalid configuration provided.
    ///
    /// Use [`ConverterConfigBuilder`](crate::ConverterConfigBuilder), which
    /// validates configuration at build time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A worker task panicked or was dropped by the runtime.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConversionError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ConversionError::InvalidRequest(_) => 400,
            ConversionError::AdmissionTimeout(_) => 503,
            ConversionError::ContentLoad {
                origin: ContentOrigin::Inline,
                ..
            } => 422,
            ConversionError::ContentLoad {
                origin: ContentOrigin::Remote,
                ..
            } => 502,
            ConversionError::Emission(_) => 500,
            ConversionError::Timeout(_) => 504,
            ConversionError::EngineUnavailable(_) => 503,
            ConversionError::Processing(_) => 500,
            ConversionError::Delivery(_) => 502,
            ConversionError::Configuration(_) => 500,
            ConversionError::Internal(_) => 500,
        }
    }

    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConversionError::InvalidRequest(_) => "INVALID_REQUEST",
            ConversionError::AdmissionTimeout(_) => "ADMISSION_TIMEOUT",
            ConversionError::ContentLoad { .. } => "CONTENT_LOAD_FAILED",
            ConversionError::Emission(_) => "EMISSION_FAILED",
            ConversionError::Timeout(_) => "TIMEOUT",
            ConversionError::EngineUnavailable(_) => "ENGINE_UNAVAILABLE",
            ConversionError::Processing(_) => "PROCESSING_FAILED",
            ConversionError::Delivery(_) => "DELIVERY_FAILED",
            ConversionError::Configuration(_) => "CONFIGURATION_ERROR",
            ConversionError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Short, fixed summary of the failure class.
    pub fn summary(&self) -> &'static str {
        match self {
            ConversionError::InvalidRequest(_) => "Invalid request",
            ConversionError::AdmissionTimeout(_) => "Server busy",
            ConversionError::ContentLoad { .. } => "Failed to load content",
            ConversionError::Emission(_) => "Failed to generate PDF",
            ConversionError::Timeout(_) => "Conversion timed out",
            ConversionError::EngineUnavailable(_) => "Render engine unavailable",
            ConversionError::Processing(_) => "PDF processing failed",
            ConversionError::Delivery(_) => "Webhook delivery failed",
            ConversionError::Configuration(_) => "Configuration error",
            ConversionError::Internal(_) => "Internal error",
        }
    }

    /// Whether the same request might succeed if sent again.
    ///
    /// The core itself never retries; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConversionError::AdmissionTimeout(_)
            | ConversionError::Emission(_)
            | ConversionError::Timeout(_)
            | ConversionError::EngineUnavailable(_)
            | ConversionError::Delivery(_) => true,
            ConversionError::ContentLoad { origin, .. } => *origin == ContentOrigin::Remote,
            _ => false,
        }
    }
}

/// Convenience conversion from [`String`] to [`ConversionError::Configuration`].
///
/// Lets builder validation messages flow through `?`.
impl From<String> for ConversionError {
    fn from(msg: String) -> Self {
        ConversionError::Configuration(msg)
    }
}

/// Convenience conversion from `&str` to [`ConversionError::Configuration`].
impl From<&str> for ConversionError {
    fn from(msg: &str) -> Self {
        ConversionError::Configuration(msg.to_string())
    }
}

/// Result type alias using [`ConversionError`].
pub type Result<T> = std::result::Result<T, ConversionError>;

// ============================================================================
// Unit Tests
// ============================================================================
