//! Request and response types for the HTTP API.
//!
//! All types are framework-agnostic serde structs. Binary payloads (PDFs,
//! images, base64 HTML) travel as standard base64 strings, optionally with
//! a `data:` URL prefix.

use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, Result};
use crate::metrics::MetricsSnapshot;
use crate::processor::{CompressionLevel, PdfSecurity, SplitMode};
use crate::request::content::decode_html;
use crate::request::{PdfOptions, RenderRequest, TableData};
use crate::service::webhook::WebhookConfig;

// ============================================================================
// Conversion Requests
// ============================================================================

/// Content type of a [`ConversionRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Html,
    Url,
    Markdown,
    Image,
    Images,
    Table,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Html => "html",
            RequestType::Url => "url",
            RequestType::Markdown => "markdown",
            RequestType::Image => "image",
            RequestType::Images => "images",
            RequestType::Table => "table",
        }
    }
}

/// Print options plus optional post-processing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    #[serde(flatten)]
    pub pdf: PdfOptions,

    /// Encrypt the finished PDF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<PdfSecurity>,
}

/// Unified conversion payload.
///
/// `/convert` reads the content type from `type`; the typed endpoints
/// (`/html`, `/url`, ...) supply it themselves.
///
/// ```json
/// {
///   "type": "html",
///   "html": "<h1>Invoice</h1>",
///   "options": { "page_size": "Letter", "orientation": "landscape" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionRequest {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<RequestType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// `html` is base64-encoded.
    pub is_base64: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TableData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<ConversionOptions>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| ConversionError::InvalidRequest(format!("'{}' is required", field)))
}

impl ConversionRequest {
    /// Inline HTML request.
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            kind: Some(RequestType::Html),
            html: Some(html.into()),
            ..Default::default()
        }
    }

    /// Remote URL request.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            kind: Some(RequestType::Url),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Resolve the content type. `fallback` is the type fixed by a typed
    /// endpoint; a payload `type` naming anything else is rejected.
    pub fn resolved_kind(&self, fallback: Option<RequestType>) -> Result<RequestType> {
        match (self.kind, fallback) {
            (Some(kind), Some(endpoint)) if kind != endpoint => {
                Err(ConversionError::InvalidRequest(format!(
                    "'type' is {} but this endpoint converts {}",
                    kind.as_str(),
                    endpoint.as_str()
                )))
            }
            (kind, fallback) => kind.or(fallback).ok_or_else(|| {
                ConversionError::InvalidRequest(
                    "'type' must be one of html, url, markdown, image, images, table".to_string(),
                )
            }),
        }
    }

    /// Validate and build the render request, returning any post-processing
    /// security settings alongside it.
    pub fn into_render_request(
        self,
        fallback: Option<RequestType>,
    ) -> Result<(RenderRequest, Option<PdfSecurity>)> {
        let kind = self.resolved_kind(fallback)?;
        let options = self.options.unwrap_or_default();
        let pdf_options = options.pdf;

        let request = match kind {
            RequestType::Html => {
                let html = required(self.html, "html")?;
                let html = if self.is_base64 { decode_html(&html)? } else { html };
                RenderRequest::html(html, pdf_options)?
            }
            RequestType::Url => RenderRequest::url(&required(self.url, "url")?, pdf_options)?,
            RequestType::Markdown => {
                RenderRequest::markdown(&required(self.markdown, "markdown")?, pdf_options)?
            }
            RequestType::Image => {
                RenderRequest::images(&[required(self.image, "image")?], pdf_options)?
            }
            RequestType::Images => {
                let mut images = self.images;
                if let Some(image) = self.image {
                    images.insert(0, image);
                }
                RenderRequest::images(&images, pdf_options)?
            }
            RequestType::Table => {
                RenderRequest::table(&required(self.table, "table")?, pdf_options)?
            }
        };

        Ok((request, options.security.filter(PdfSecurity::is_active)))
    }
}

// ============================================================================
// Merge / Manipulate
// ============================================================================

/// Merge several base64 PDFs into one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeRequest {
    pub pdfs: Vec<String>,
    #[serde(default)]
    pub security: Option<PdfSecurity>,
}

/// How a split divides the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitType {
    #[default]
    All,
    Range,
    EveryN,
}

/// One manipulation of an existing PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ManipulateOperation {
    Split {
        #[serde(default)]
        split_type: SplitType,
        #[serde(default)]
        pages: Option<String>,
        #[serde(default)]
        every_n: Option<u32>,
    },
    Extract {
        pages: String,
    },
    Rotate {
        rotation: i32,
        #[serde(default)]
        pages: Option<String>,
    },
    Compress {
        #[serde(default)]
        level: CompressionLevel,
    },
    Reorder {
        new_order: Vec<u32>,
    },
    Info,
}

impl ManipulateOperation {
    pub fn name(&self) -> &'static str {
        match self {
            ManipulateOperation::Split { .. } => "split",
            ManipulateOperation::Extract { .. } => "extract",
            ManipulateOperation::Rotate { .. } => "rotate",
            ManipulateOperation::Compress { .. } => "compress",
            ManipulateOperation::Reorder { .. } => "reorder",
            ManipulateOperation::Info => "info",
        }
    }

    /// Split mode for a `Split` operation.
    pub fn split_mode(split_type: SplitType, pages: Option<String>, every_n: Option<u32>) -> Result<SplitMode> {
        match split_type {
            SplitType::All => Ok(SplitMode::All),
            SplitType::Range => Ok(SplitMode::Ranges(required(pages, "pages")?)),
            SplitType::EveryN => Ok(SplitMode::EveryN(required(every_n, "every_n")?)),
        }
    }
}

/// A PDF plus the operation to apply to it.
///
/// ```json
/// { "pdf": "JVBERi0x...", "operation": "rotate", "rotation": 90, "pages": "1-2" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipulateRequest {
    pub pdf: String,
    #[serde(flatten)]
    pub operation: ManipulateOperation,
}

/// JSON result of a manipulation that does not yield a single PDF.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManipulateResult {
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pdfs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings_percent: Option<u32>,
}

// ============================================================================
// Batch
// ============================================================================

/// Several conversions processed concurrently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<ConversionRequest>,
    /// Also return all successful PDFs merged into one.
    #[serde(default)]
    pub merge: bool,
}

/// Outcome of one batch item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Base64 PDF.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub request_id: String,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_pdf: Option<String>,
}

// ============================================================================
// Async
// ============================================================================

/// Conversion delivered to a webhook instead of the response.
///
/// ```json
/// {
///   "request": { "type": "html", "html": "<h1>Later</h1>" },
///   "webhook": { "url": "https://hooks.example.com/pdf", "secret": "s3cret" }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AsyncRequest {
    pub request: ConversionRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookConfig>,
}

/// `202 Accepted` body of `/async`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncAccepted {
    pub request_id: String,
    /// Always `"queued"`.
    pub status: String,
    pub message: String,
}

impl AsyncAccepted {
    pub fn queued(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status: "queued".to_string(),
            message: "Conversion queued, the result will be sent to the webhook".to_string(),
        }
    }
}

// ============================================================================
// Health / Errors
// ============================================================================

/// Admission gate occupancy as reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub max: usize,
    pub available: usize,
    pub in_use: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineHealth {
    pub name: String,
    /// `"ok"` or `"unavailable"`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthResponse {
    /// `"healthy"` when the engine answered its ping, else `"degraded"`.
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub engine: EngineHealth,
    pub workers: WorkerStatus,
    pub conversions: MetricsSnapshot,
}

/// Error body returned by every endpoint.
///
/// ```json
/// {
///   "error": "Conversion timed out",
///   "message": "Conversion timed out after 60s",
///   "code": "TIMEOUT",
///   "request_id": "..."
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Fixed summary of the failure class.
    pub error: String,

    /// Detailed, human-readable message.
    pub message: String,

    /// Stable, uppercase identifier. See
    /// [`ConversionError::error_code`].
    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn from_error(err: &ConversionError, request_id: Option<String>) -> Self {
        Self {
            error: err.summary().to_string(),
            message: err.to_string(),
            code: err.error_code().to_string(),
            request_id,
        }
    }
}

impl From<&ConversionError> for ErrorResponse {
    fn from(err: &ConversionError) -> Self {
        Self::from_error(err, None)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ConversionKind, Orientation, PageSize};

    #[test]
    fn test_unified_request_deserializes() {
        let request: ConversionRequest = serde_json::from_str(
            r#"{
                "type": "html",
                "html": "<h1>Test</h1>",
                "options": {
                    "page_size": "Letter",
                    "orientation": "landscape",
                    "security": { "user_password": "secret" }
                }
            }"#,
        )
        .unwrap();

        let options = request.options.clone().unwrap();
        assert_eq!(options.pdf.page_size, PageSize::Letter);
        assert_eq!(options.pdf.orientation, Orientation::Landscape);
        assert_eq!(options.security.as_ref().unwrap().encryption_bits, 256);

        let (render, security) = request.into_render_request(None).unwrap();
        assert_eq!(render.kind(), ConversionKind::Html);
        assert!(security.is_some());
    }

    #[test]
    fn test_missing_type_without_fallback() {
        let request = ConversionRequest {
            html: Some("<p>x</p>".into()),
            ..Default::default()
        };
        assert!(request.clone().into_render_request(None).is_err());
        assert!(request.into_render_request(Some(RequestType::Html)).is_ok());
    }

    #[test]
    fn test_payload_type_cannot_override_endpoint() {
        let request = ConversionRequest {
            kind: Some(RequestType::Url),
            url: Some("https://example.com".into()),
            ..Default::default()
        };
        let err = request
            .clone()
            .into_render_request(Some(RequestType::Html))
            .unwrap_err();
        assert!(matches!(err, ConversionError::InvalidRequest(msg) if msg.contains("endpoint")));

        assert_eq!(
            request.resolved_kind(Some(RequestType::Url)).unwrap(),
            RequestType::Url
        );
        assert_eq!(request.resolved_kind(None).unwrap(), RequestType::Url);
    }

    #[test]
    fn test_async_request_deserializes() {
        let request: AsyncRequest = serde_json::from_str(
            r##"{
                "request": { "type": "markdown", "markdown": "# Hi" },
                "webhook": { "url": "https://hooks.example.com/x", "retry_count": 1 }
            }"##,
        )
        .unwrap();
        assert_eq!(request.request.kind, Some(RequestType::Markdown));
        assert_eq!(request.webhook.unwrap().retry_count, Some(1));

        let accepted = serde_json::to_value(AsyncAccepted::queued("req-9")).unwrap();
        assert_eq!(accepted["status"], "queued");
        assert_eq!(accepted["request_id"], "req-9");
    }

    #[test]
    fn test_missing_field_is_invalid_request() {
        let request = ConversionRequest {
            kind: Some(RequestType::Url),
            ..Default::default()
        };
        let err = request.into_render_request(None).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidRequest(msg) if msg.contains("'url'")));
    }

    #[test]
    fn test_base64_html() {
        let request = ConversionRequest {
            kind: Some(RequestType::Html),
            html: Some("PGgxPlRlc3Q8L2gxPg==".into()),
            is_base64: true,
            ..Default::default()
        };
        let (render, _) = request.into_render_request(None).unwrap();
        assert_eq!(
            render.source(),
            &crate::request::ContentSource::Inline("<h1>Test</h1>".into())
        );
    }

    #[test]
    fn test_empty_security_is_dropped() {
        let request: ConversionRequest = serde_json::from_str(
            r#"{"type": "html", "html": "<p>x</p>", "options": {"security": {}}}"#,
        )
        .unwrap();
        let (_, security) = request.into_render_request(None).unwrap();
        assert!(security.is_none());
    }

    #[test]
    fn test_manipulate_request_tagging() {
        let request: ManipulateRequest = serde_json::from_str(
            r#"{"pdf": "JVBERi0=", "operation": "rotate", "rotation": 90, "pages": "1-2"}"#,
        )
        .unwrap();
        assert_eq!(
            request.operation,
            ManipulateOperation::Rotate {
                rotation: 90,
                pages: Some("1-2".into())
            }
        );

        let request: ManipulateRequest =
            serde_json::from_str(r#"{"pdf": "JVBERi0=", "operation": "info"}"#).unwrap();
        assert_eq!(request.operation.name(), "info");
    }

    #[test]
    fn test_split_mode() {
        assert_eq!(
            ManipulateOperation::split_mode(SplitType::EveryN, None, Some(2)).unwrap(),
            SplitMode::EveryN(2)
        );
        assert!(ManipulateOperation::split_mode(SplitType::Range, None, None).is_err());
    }

    #[test]
    fn test_error_response_serialization() {
        let err = ConversionError::AdmissionTimeout(std::time::Duration::from_secs(30));
        let response = ErrorResponse::from_error(&err, Some("req-1".into()));

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("ADMISSION_TIMEOUT"));
        assert_eq!(response.error, "Server busy");
        assert!(response.message.contains("30s"));
        assert!(json.contains("req-1"));

        let without_id = serde_json::to_string(&ErrorResponse::from(&err)).unwrap();
        assert!(!without_id.contains("request_id"));
    }
}
