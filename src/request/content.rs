//! Builders that turn non-HTML payloads into printable HTML documents.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, Result};

const MARKDOWN_STYLE: &str = r#"
body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, sans-serif;
    line-height: 1.6;
    max-width: 800px;
    margin: 0 auto;
    padding: 20px;
    color: #333;
}
h1, h2, h3, h4, h5, h6 { margin-top: 1.5em; margin-bottom: 0.5em; }
h1, h2 { border-bottom: 1px solid #eee; padding-bottom: 0.3em; }
code { background: #f4f4f4; padding: 2px 6px; border-radius: 3px; font-family: 'SF Mono', Monaco, monospace; }
pre { background: #f4f4f4; padding: 16px; border-radius: 6px; overflow-x: auto; }
pre code { background: none; padding: 0; }
blockquote { border-left: 4px solid #ddd; margin: 0; padding-left: 16px; color: #666; }
table { border-collapse: collapse; width: 100%; margin: 1em 0; }
th, td { border: 1px solid #ddd; padding: 8px 12px; text-align: left; }
th { background: #f4f4f4; }
img { max-width: 100%; }
a { color: #0066cc; }
"#;

const IMAGE_STYLE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: Arial, sans-serif; }
@page { margin: 0; }
.page { display: flex; justify-content: center; align-items: center; height: 100vh; width: 100%; }
.page + .page { page-break-before: always; }
.page img { max-width: 100%; max-height: 100%; object-fit: contain; }
"#;

const TABLE_STYLE: &str = r#"
body { font-family: Arial, sans-serif; padding: 24px; color: #222; }
h1 { font-size: 1.5em; margin-bottom: 16px; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ccc; padding: 6px 10px; text-align: left; }
th { background: #f0f0f0; }
tr:nth-child(even) td { background: #fafafa; }
tfoot td { font-weight: bold; }
"#;

fn document(style: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<style>{style}</style>\n</head>\n<body>{body}</body>\n</html>\n"
    )
}

/// Escape text for safe inclusion in HTML element content or attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render GitHub-flavoured Markdown into a styled HTML document.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = comrak::Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.render.r#unsafe = true;

    let body = comrak::markdown_to_html(markdown, &options);
    document(MARKDOWN_STYLE, &format!("<div class=\"markdown-body\">{body}</div>"))
}

/// Remove a `data:<mime>;base64,` prefix if present.
pub fn strip_data_url(encoded: &str) -> &str {
    let trimmed = encoded.trim();
    if trimmed.starts_with("data:") {
        if let Some(comma) = trimmed.find(',') {
            return &trimmed[comma + 1..];
        }
    }
    trimmed
}

/// Decode standard base64, tolerating a data-URL prefix.
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(strip_data_url(encoded))
        .map_err(|e| ConversionError::InvalidRequest(format!("invalid base64 payload: {}", e)))
}

/// Decode base64-encoded HTML and check it is UTF-8.
pub fn decode_html(encoded: &str) -> Result<String> {
    let bytes = decode_base64(encoded)?;
    String::from_utf8(bytes)
        .map_err(|_| ConversionError::InvalidRequest("decoded HTML is not valid UTF-8".to_string()))
}

/// Guess an image MIME type from the first character of its base64 text.
///
/// Each format's magic bytes encode to a fixed leading character. Anything
/// unrecognised is treated as JPEG.
pub fn sniff_image_mime(base64_data: &str) -> &'static str {
    match base64_data.as_bytes().first() {
        Some(b'i') => "image/png",
        Some(b'R') => "image/gif",
        Some(b'U') => "image/webp",
        _ => "image/jpeg",
    }
}

/// Lay out one image per page, centred and scaled to fit.
///
/// # Errors
///
/// [`ConversionError::InvalidRequest`] when the list is empty or an entry
/// is not valid base64.
pub fn images_to_html(images: &[String]) -> Result<String> {
    if images.is_empty() {
        return Err(ConversionError::InvalidRequest(
            "at least one image is required".to_string(),
        ));
    }

    let mut pages = String::new();
    for (index, image) in images.iter().enumerate() {
        let data = strip_data_url(image);
        STANDARD.decode(data).map_err(|e| {
            ConversionError::InvalidRequest(format!("image {} is not valid base64: {}", index, e))
        })?;

        let mime = sniff_image_mime(data);
        pages.push_str(&format!(
            "<div class=\"page\"><img src=\"data:{mime};base64,{data}\" /></div>"
        ));
    }

    Ok(document(IMAGE_STYLE, &pages))
}

/// Tabular data rendered as a simple report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableData {
    pub title: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub footer: Option<String>,
}

/// Render [`TableData`] as an HTML document. All cell text is escaped.
pub fn table_to_html(table: &TableData) -> Result<String> {
    if table.headers.is_empty() && table.rows.is_empty() {
        return Err(ConversionError::InvalidRequest(
            "table needs headers or rows".to_string(),
        ));
    }

    let mut body = String::new();
    if let Some(title) = &table.title {
        body.push_str(&format!("<h1>{}</h1>", escape_html(title)));
    }

    body.push_str("<table>");
    if !table.headers.is_empty() {
        body.push_str("<thead><tr>");
        for header in &table.headers {
            body.push_str(&format!("<th>{}</th>", escape_html(header)));
        }
        body.push_str("</tr></thead>");
    }

    body.push_str("<tbody>");
    for row in &table.rows {
        body.push_str("<tr>");
        for cell in row {
            body.push_str(&format!("<td>{}</td>", escape_html(cell)));
        }
        body.push_str("</tr>");
    }
    body.push_str("</tbody>");

    if let Some(footer) = &table.footer {
        let span = table
            .headers
            .len()
            .max(table.rows.iter().map(Vec::len).max().unwrap_or(1))
            .max(1);
        body.push_str(&format!(
            "<tfoot><tr><td colspan=\"{}\">{}</td></tr></tfoot>",
            span,
            escape_html(footer)
        ));
    }
    body.push_str("</table>");

    Ok(document(TABLE_STYLE, &body))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    #[test]
    fn test_markdown_renders_tables_and_strikethrough() {
        let html = markdown_to_html("# Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~");

        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("markdown-body"));
    }

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url("  AAAA  "), "AAAA");
    }

    #[test]
    fn test_decode_html_base64() {
        // "<p>hi</p>"
        let html = decode_html("PHA+aGk8L3A+").unwrap();
        assert_eq!(html, "<p>hi</p>");

        assert!(matches!(
            decode_html("not base64!!"),
            Err(ConversionError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_sniff_image_mime() {
        assert_eq!(sniff_image_mime(PNG_B64), "image/png");
        assert_eq!(sniff_image_mime("/9j/4AAQ"), "image/jpeg");
        assert_eq!(sniff_image_mime("R0lGODlh"), "image/gif");
        assert_eq!(sniff_image_mime("UklGR"), "image/webp");
        assert_eq!(sniff_image_mime(""), "image/jpeg");
    }

    #[test]
    fn test_images_one_page_each() {
        let html = images_to_html(&[PNG_B64.to_string(), format!("data:image/png;base64,{PNG_B64}")])
            .unwrap();

        assert_eq!(html.matches("<div class=\"page\">").count(), 2);
        assert!(html.contains("data:image/png;base64,iVBOR"));
        assert!(!html.contains("base64,data:"));
    }

    #[test]
    fn test_images_rejects_empty_and_garbage() {
        assert!(images_to_html(&[]).is_err());
        assert!(images_to_html(&["%%%".to_string()]).is_err());
    }

    #[test]
    fn test_table_escapes_cells() {
        let table = TableData {
            title: Some("Q1 <Report>".to_string()),
            headers: vec!["Name".to_string(), "Total".to_string()],
            rows: vec![vec!["<script>".to_string(), "10".to_string()]],
            footer: Some("Sum: 10".to_string()),
        };

        let html = table_to_html(&table).unwrap();
        assert!(html.contains("<h1>Q1 &lt;Report&gt;</h1>"));
        assert!(html.contains("<td>&lt;script&gt;</td>"));
        assert!(html.contains("colspan=\"2\""));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_table_requires_content() {
        assert!(table_to_html(&TableData::default()).is_err());
    }
}
