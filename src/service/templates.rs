//! Document templates rendered to HTML before conversion.
//!
//! Built-in templates cover common business documents; `custom` renders a
//! caller-supplied Handlebars template. Values are HTML-escaped unless the
//! template uses triple braces.
//!
//! | Template | Notable fields |
//! |----------|----------------|
//! | `invoice` | `company_name`, `invoice_number`, `items[] {description, quantity, unit_price, amount}`, `subtotal`, `total`, `currency` |
//! | `receipt` | `store_name`, `receipt_number`, `items[] {name, quantity, total}`, `total`, `amount_paid`, `change` |
//! | `certificate` | `recipient_name`, `title`, `description`, `date`, `signatures[] {name, title}` |
//! | `report` | `title`, `executive_summary`, `metrics[] {label, value}`, `sections[] {title, content, table}` |
//! | `contract` | `title`, `effective_date`, `parties[] {full_name, address}`, `clauses[] {title, content}` |
//!
//! Helpers: `formatMoney amount currency`, `upper`, `lower`, `add`,
//! `percentage part whole`.

use handlebars::{
    Context, Handlebars, Helper, HelperResult, Output, RenderContext, handlebars_helper,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConversionError, Result};
use crate::service::types::ConversionOptions;

/// Template name that selects [`TemplateRequest::custom_html`].
pub const CUSTOM_TEMPLATE: &str = "custom";

/// Names accepted in [`TemplateRequest::template`] besides `custom`.
pub const BUILTIN_TEMPLATES: [&str; 5] = ["invoice", "receipt", "certificate", "report", "contract"];

const BASE_CSS: &str = include_str!("templates/base.css");

fn builtin(name: &str) -> Option<&'static str> {
    match name {
        "invoice" => Some(include_str!("templates/invoice.hbs")),
        "receipt" => Some(include_str!("templates/receipt.hbs")),
        "certificate" => Some(include_str!("templates/certificate.hbs")),
        "report" => Some(include_str!("templates/report.hbs")),
        "contract" => Some(include_str!("templates/contract.hbs")),
        _ => None,
    }
}

/// Render a template and convert the result.
///
/// ```json
/// {
///   "template": "invoice",
///   "data": { "company_name": "Acme", "invoice_number": "42", "total": 99.5 },
///   "options": { "page_size": "A4" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateRequest {
    pub template: String,

    /// Handlebars source, required when `template` is `custom`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_html: Option<String>,

    /// Template variables; must be a JSON object.
    #[serde(default)]
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ConversionOptions>,
}

fn format_money_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let amount = h
        .param(0)
        .and_then(|v| {
            let value = v.value();
            value.as_f64().or_else(|| value.as_str()?.trim().parse().ok())
        })
        .unwrap_or(0.0);
    let currency = h
        .param(1)
        .and_then(|v| v.value().as_str())
        .filter(|c| !c.is_empty())
        .unwrap_or("$");
    out.write(&format!("{}{:.2}", currency, amount))?;
    Ok(())
}

handlebars_helper!(upper: |s: str| s.to_uppercase());
handlebars_helper!(lower: |s: str| s.to_lowercase());
handlebars_helper!(add: |a: i64, b: i64| a + b);
handlebars_helper!(percentage: |part: f64, whole: f64| {
    if whole == 0.0 {
        "0%".to_string()
    } else {
        format!("{:.1}%", part / whole * 100.0)
    }
});

/// Handlebars registry with the document helpers installed.
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_helper("formatMoney", Box::new(format_money_helper));
        registry.register_helper("upper", Box::new(upper));
        registry.register_helper("lower", Box::new(lower));
        registry.register_helper("add", Box::new(add));
        registry.register_helper("percentage", Box::new(percentage));
        Self { registry }
    }

    /// Render `request` to a complete HTML document.
    ///
    /// # Errors
    ///
    /// [`ConversionError::InvalidRequest`] for an unknown template, a
    /// missing custom source, non-object data, or a template that fails to
    /// parse or render.
    pub fn render(&self, request: &TemplateRequest) -> Result<String> {
        let invalid = |msg: String| ConversionError::InvalidRequest(msg);

        let source = match request.template.trim() {
            "" => return Err(invalid("'template' is required".to_string())),
            CUSTOM_TEMPLATE => request
                .custom_html
                .as_deref()
                .filter(|html| !html.trim().is_empty())
                .ok_or_else(|| invalid("'custom_html' is required for the custom template".to_string()))?,
            name => builtin(name).ok_or_else(|| {
                invalid(format!(
                    "unknown template '{}', expected one of {} or {}",
                    name,
                    BUILTIN_TEMPLATES.join(", "),
                    CUSTOM_TEMPLATE
                ))
            })?,
        };

        let mut data = match &request.data {
            Value::Null => serde_json::Map::new(),
            Value::Object(map) => map.clone(),
            _ => return Err(invalid("'data' must be a JSON object".to_string())),
        };
        data.insert("css".to_string(), Value::String(BASE_CSS.to_string()));

        let html = self
            .registry
            .render_template(source, &Value::Object(data))
            .map_err(|e| invalid(format!("template rendering failed: {}", e)))?;

        log::debug!("🧾 Rendered '{}' template ({} bytes)", request.template, html.len());
        Ok(html)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(template: &str, data: Value) -> TemplateRequest {
        TemplateRequest {
            template: template.to_string(),
            data,
            ..Default::default()
        }
    }

    #[test]
    fn test_every_builtin_renders_with_empty_data() {
        let engine = TemplateEngine::new();
        for name in BUILTIN_TEMPLATES {
            let html = engine
                .render(&request(name, Value::Null))
                .unwrap_or_else(|e| panic!("{} failed: {}", name, e));
            assert!(html.starts_with("<!DOCTYPE html>"), "{}", name);
            assert!(html.contains("box-sizing"), "{} lost the base stylesheet", name);
        }
    }

    #[test]
    fn test_invoice_fields_and_helpers() {
        let html = TemplateEngine::new()
            .render(&request(
                "invoice",
                json!({
                    "company_name": "Acme & Sons",
                    "invoice_number": "INV-7",
                    "status": "paid",
                    "currency": "€",
                    "items": [
                        { "description": "Bolts", "quantity": 4, "unit_price": 2.5, "amount": 10 }
                    ],
                    "subtotal": 10,
                    "total": 12.1
                }),
            ))
            .unwrap();

        assert!(html.contains("Acme &amp; Sons"));
        assert!(html.contains("INV-7"));
        assert!(html.contains("(PAID)"));
        assert!(html.contains("€2.50"));
        assert!(html.contains("€12.10"));
    }

    #[test]
    fn test_report_numbers_sections() {
        let html = TemplateEngine::new()
            .render(&request(
                "report",
                json!({
                    "title": "Q3",
                    "sections": [
                        { "title": "Revenue", "content": "Up" },
                        { "title": "Costs", "content": "Down" }
                    ]
                }),
            ))
            .unwrap();
        assert!(html.contains("1. Revenue"));
        assert!(html.contains("2. Costs"));
    }

    #[test]
    fn test_custom_template() {
        let engine = TemplateEngine::new();
        let mut custom = request(
            CUSTOM_TEMPLATE,
            json!({ "name": "<b>Ada</b>", "score": 3, "max": 4 }),
        );
        custom.custom_html =
            Some("<p>{{upper name}}</p><p>{{{name}}}</p><p>{{percentage score max}}</p>".into());

        let html = engine.render(&custom).unwrap();
        assert!(html.contains("&lt;B&gt;ADA&lt;/B&gt;"));
        assert!(html.contains("<b>Ada</b>"));
        assert!(html.contains("75.0%"));
    }

    #[test]
    fn test_rejections() {
        let engine = TemplateEngine::new();
        let rejected = |req: TemplateRequest| {
            matches!(engine.render(&req), Err(ConversionError::InvalidRequest(_)))
        };

        assert!(rejected(request("", Value::Null)));
        assert!(rejected(request("memo", Value::Null)));
        assert!(rejected(request(CUSTOM_TEMPLATE, Value::Null)));
        assert!(rejected(request("invoice", json!([1, 2]))));

        let mut broken = request(CUSTOM_TEMPLATE, Value::Null);
        broken.custom_html = Some("{{#each items}}unclosed".into());
        assert!(rejected(broken));
    }
}
