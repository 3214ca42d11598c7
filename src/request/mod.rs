//! Conversion requests.
//!
//! A [`RenderRequest`] bundles what to render ([`ContentSource`]), how to
//! label it in metrics ([`ConversionKind`]) and how to print it
//! ([`PdfOptions`]). Constructors validate their input, so a request that
//! exists is one the converter can attempt.
//!
//! # Example
//!
//! ```rust
//! use pdf_forge::{PdfOptions, RenderRequest};
//!
//! let request = RenderRequest::html("<h1>Invoice</h1>", PdfOptions::default()).unwrap();
//! assert_eq!(request.kind().as_str(), "html");
//!
//! let request = RenderRequest::url("https://example.com", PdfOptions::default()).unwrap();
//! assert_eq!(request.kind().as_str(), "url");
//! ```

pub mod content;
mod geometry;

pub use content::TableData;
pub use geometry::{
    DEFAULT_SCALE, DEFAULT_URL_MARGIN, MAX_SCALE, MIN_SCALE, Margins, Orientation, PageDimensions,
    PageSize, PdfOptions, PdfParams, clamp_scale,
};

use std::fmt;

use url::Url;

use crate::error::{ContentOrigin, ConversionError, Result};

/// Label used to partition metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionKind {
    Html,
    Url,
    Markdown,
    Images,
    Table,
}

impl ConversionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversionKind::Html => "html",
            ConversionKind::Url => "url",
            ConversionKind::Markdown => "markdown",
            ConversionKind::Images => "images",
            ConversionKind::Table => "table",
        }
    }

    /// Margins used when the caller specifies none.
    ///
    /// Remote pages get a small print margin; generated documents fill the
    /// page.
    pub fn default_margins(self) -> Margins {
        match self {
            ConversionKind::Url => Margins::uniform(DEFAULT_URL_MARGIN),
            _ => Margins::none(),
        }
    }
}

impl fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the engine should load.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentSource {
    /// Markup injected directly into a blank document.
    Inline(String),
    /// A page the engine navigates to.
    Remote(Url),
}

impl ContentSource {
    pub fn origin(&self) -> ContentOrigin {
        match self {
            ContentSource::Inline(_) => ContentOrigin::Inline,
            ContentSource::Remote(_) => ContentOrigin::Remote,
        }
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            ContentSource::Inline(html) => format!("inline ({} bytes)", html.len()),
            ContentSource::Remote(url) => truncate(url.as_str(), 100),
        }
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Check a URL is absolute http(s).
pub fn validate_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConversionError::InvalidRequest("URL is required".to_string()));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| ConversionError::InvalidRequest(format!("invalid URL '{}': {}", trimmed, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConversionError::InvalidRequest(format!(
            "unsupported URL scheme '{}'",
            other
        ))),
    }
}

/// One conversion job. Consumed by [`Converter::convert`](crate::Converter::convert).
#[derive(Debug, Clone)]
pub struct RenderRequest {
    source: ContentSource,
    kind: ConversionKind,
    options: PdfOptions,
}

impl RenderRequest {
    /// Render inline HTML.
    pub fn html(html: impl Into<String>, options: PdfOptions) -> Result<Self> {
        let html = html.into();
        if html.trim().is_empty() {
            return Err(ConversionError::InvalidRequest("HTML content is required".to_string()));
        }
        Ok(Self::inline(ConversionKind::Html, html, options))
    }

    /// Navigate to and render a remote page.
    pub fn url(url: &str, options: PdfOptions) -> Result<Self> {
        Ok(Self {
            source: ContentSource::Remote(validate_url(url)?),
            kind: ConversionKind::Url,
            options,
        })
    }

    /// Render Markdown through the styled document template.
    pub fn markdown(markdown: &str, options: PdfOptions) -> Result<Self> {
        if markdown.trim().is_empty() {
            return Err(ConversionError::InvalidRequest(
                "Markdown content is required".to_string(),
            ));
        }
        Ok(Self::inline(
            ConversionKind::Markdown,
            content::markdown_to_html(markdown),
            options,
        ))
    }

    /// Render base64 images, one per page.
    pub fn images(images: &[String], options: PdfOptions) -> Result<Self> {
        Ok(Self::inline(
            ConversionKind::Images,
            content::images_to_html(images)?,
            options,
        ))
    }

    /// Render tabular data.
    pub fn table(table: &TableData, options: PdfOptions) -> Result<Self> {
        Ok(Self::inline(
            ConversionKind::Table,
            content::table_to_html(table)?,
            options,
        ))
    }

    fn inline(kind: ConversionKind, html: String, options: PdfOptions) -> Self {
        Self {
            source: ContentSource::Inline(html),
            kind,
            options,
        }
    }

    pub fn source(&self) -> &ContentSource {
        &self.source
    }

    pub fn kind(&self) -> ConversionKind {
        self.kind
    }

    pub fn options(&self) -> &PdfOptions {
        &self.options
    }

    /// Engine parameters for this request.
    pub fn print_params(&self) -> PdfParams {
        self.options.resolve(self.kind.default_margins())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
