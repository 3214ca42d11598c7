//! Webhook delivery for asynchronous conversions.
//!
//! [`WebhookNotifier`] posts a JSON [`WebhookPayload`] to the caller's
//! endpoint and retries with quadratic backoff until it answers 2xx. When a
//! secret is configured the body is signed with HMAC-SHA256 and the hex
//! digest sent in `X-Webhook-Signature` (and as `sha256=<hex>` in
//! `X-Webhook-Signature-256`).

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, KeyInit, Mac};
use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{ConversionError, Result};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const SIGNATURE_256_HEADER: &str = "x-webhook-signature-256";
pub const EVENT_HEADER: &str = "x-webhook-event";

pub const EVENT_COMPLETED: &str = "conversion.completed";
pub const EVENT_FAILED: &str = "conversion.failed";

/// Retries after the first attempt when the config names none.
pub const DEFAULT_WEBHOOK_RETRIES: u32 = 3;

/// Upper bound on configured retries.
pub const MAX_WEBHOOK_RETRIES: u32 = 10;

/// Per-attempt request timeout.
pub const WEBHOOK_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body quoted in logs and errors.
const MAX_QUOTED_BODY: usize = 256;

/// Where and how to report an asynchronous result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,

    /// `POST` (default) or `PUT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Extra request headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// HMAC-SHA256 key for the signature headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Retries after the first attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,

    /// Embed the PDF (base64) in the payload.
    #[serde(default)]
    pub include_pdf: bool,
}

impl WebhookConfig {
    /// Endpoint configuration with defaults for everything but the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Reject configurations that can never be delivered.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ConversionError::InvalidRequest(msg));

        match url::Url::parse(&self.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => return invalid(format!("webhook scheme '{}' is not allowed", url.scheme())),
            Err(e) => return invalid(format!("invalid webhook url: {}", e)),
        }
        self.method()?;
        if self.retries() > MAX_WEBHOOK_RETRIES {
            return invalid(format!("retry_count may not exceed {}", MAX_WEBHOOK_RETRIES));
        }
        for (name, value) in &self.headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err()
                || HeaderValue::from_str(value).is_err()
            {
                return invalid(format!("invalid webhook header '{}'", name));
            }
        }
        Ok(())
    }

    fn method(&self) -> Result<Method> {
        match self.method.as_deref().map(str::to_ascii_uppercase).as_deref() {
            None | Some("POST") => Ok(Method::POST),
            Some("PUT") => Ok(Method::PUT),
            Some(other) => Err(ConversionError::InvalidRequest(format!(
                "webhook method must be POST or PUT, got {}",
                other
            ))),
        }
    }

    fn retries(&self) -> u32 {
        self.retry_count.unwrap_or(DEFAULT_WEBHOOK_RETRIES)
    }
}

/// Body posted to the webhook endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// [`EVENT_COMPLETED`] or [`EVENT_FAILED`].
    pub event: String,
    pub request_id: String,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub conversion_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<usize>,
    pub duration_ms: u64,
    /// Base64 PDF, only when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl WebhookPayload {
    pub fn completed(
        request_id: &str,
        conversion_type: &str,
        pdf: &[u8],
        duration: Duration,
        include_pdf: bool,
    ) -> Self {
        Self {
            event: EVENT_COMPLETED.to_string(),
            request_id: request_id.to_string(),
            timestamp: unix_now(),
            success: true,
            error: None,
            conversion_type: conversion_type.to_string(),
            file_size: Some(pdf.len()),
            duration_ms: duration.as_millis() as u64,
            pdf: include_pdf.then(|| STANDARD.encode(pdf)),
        }
    }

    pub fn failed(
        request_id: &str,
        conversion_type: &str,
        error: &ConversionError,
        duration: Duration,
    ) -> Self {
        Self {
            event: EVENT_FAILED.to_string(),
            request_id: request_id.to_string(),
            timestamp: unix_now(),
            success: false,
            error: Some(error.to_string()),
            conversion_type: conversion_type.to_string(),
            file_size: None,
            duration_ms: duration.as_millis() as u64,
            pdf: None,
        }
    }
}

fn mac(body: &[u8], secret: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ConversionError::Internal(format!("invalid HMAC key: {}", e)))?;
    mac.update(body);
    Ok(mac)
}

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign(body: &[u8], secret: &str) -> Result<String> {
    Ok(hex::encode(mac(body, secret)?.finalize().into_bytes()))
}

/// Constant-time check of a hex signature, for webhook receivers.
pub fn verify_signature(body: &[u8], signature: &str, secret: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim_start_matches("sha256=")) else {
        return false;
    };
    mac(body, secret).is_ok_and(|mac| mac.verify_slice(&expected).is_ok())
}

/// Delivers [`WebhookPayload`]s with retries.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    backoff: Duration,
}

impl WebhookNotifier {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            backoff: Duration::from_secs(1),
        }
    }

    /// Base retry delay; attempt `n` waits `backoff * n²`.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Deliver `payload`, returning the number of attempts it took.
    ///
    /// # Errors
    ///
    /// [`ConversionError::Delivery`] when every attempt failed,
    /// [`ConversionError::InvalidRequest`] for an undeliverable config.
    pub async fn deliver(&self, config: &WebhookConfig, payload: &WebhookPayload) -> Result<u32> {
        config.validate()?;
        let method = config.method()?;
        let body = serde_json::to_vec(payload)
            .map_err(|e| ConversionError::Internal(format!("failed to encode payload: {}", e)))?;
        let signature = config
            .secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .map(|secret| sign(&body, secret))
            .transpose()?;

        let attempts = config.retries() + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                let step = attempt - 1;
                tokio::time::sleep(self.backoff * step * step).await;
            }

            let mut request = self
                .client
                .request(method.clone(), &config.url)
                .timeout(WEBHOOK_ATTEMPT_TIMEOUT)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .header(
                    reqwest::header::USER_AGENT,
                    concat!("pdf-forge-webhook/", env!("CARGO_PKG_VERSION")),
                )
                .header(EVENT_HEADER, &payload.event)
                .header("x-request-id", &payload.request_id);
            for (name, value) in &config.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if let Some(signature) = &signature {
                request = request
                    .header(SIGNATURE_HEADER, signature.as_str())
                    .header(SIGNATURE_256_HEADER, format!("sha256={}", signature));
            }

            match request.body(body.clone()).send().await {
                Ok(response) if response.status().is_success() => {
                    log::info!(
                        "📬 Webhook delivered request_id={} status={} attempt={}",
                        payload.request_id,
                        response.status().as_u16(),
                        attempt
                    );
                    return Ok(attempt);
                }
                Ok(response) => {
                    let status = response.status();
                    let text: String = response
                        .text()
                        .await
                        .unwrap_or_default()
                        .chars()
                        .take(MAX_QUOTED_BODY)
                        .collect();
                    last_error = format!("endpoint returned {}: {}", status.as_u16(), text);
                }
                Err(e) => last_error = format!("request failed: {}", e),
            }
            log::warn!(
                "⚠️ Webhook attempt {}/{} for request_id={} failed: {}",
                attempt,
                attempts,
                payload.request_id,
                last_error
            );
        }

        Err(ConversionError::Delivery(format!(
            "{} attempts failed, last: {}",
            attempts, last_error
        )))
    }
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"event":"conversion.completed"}"#;
        let signature = sign(body, "topsecret").unwrap();

        assert_eq!(signature.len(), 64);
        assert!(verify_signature(body, &signature, "topsecret"));
        assert!(verify_signature(body, &format!("sha256={}", signature), "topsecret"));
        assert!(!verify_signature(body, &signature, "other"));
        assert!(!verify_signature(b"tampered", &signature, "topsecret"));
        assert!(!verify_signature(body, "not-hex", "topsecret"));
    }

    #[test]
    fn test_known_hmac_vector() {
        // RFC 4231 test case 2.
        let signature = sign(b"what do ya want for nothing?", "Jefe").unwrap();
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(WebhookConfig::new("https://hooks.example.com/pdf").validate().is_ok());
        assert!(WebhookConfig::new("ftp://hooks.example.com").validate().is_err());
        assert!(WebhookConfig::new("not a url").validate().is_err());

        let mut config = WebhookConfig::new("https://hooks.example.com");
        config.method = Some("put".into());
        assert_eq!(config.method().unwrap(), Method::PUT);
        config.method = Some("DELETE".into());
        assert!(config.validate().is_err());

        let mut config = WebhookConfig::new("https://hooks.example.com");
        config.retry_count = Some(MAX_WEBHOOK_RETRIES + 1);
        assert!(config.validate().is_err());

        let mut config = WebhookConfig::new("https://hooks.example.com");
        config.headers.insert("bad header".into(), "x".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_payloads() {
        let ok = WebhookPayload::completed("r-1", "html", b"%PDF-1.4", Duration::from_millis(42), true);
        assert_eq!(ok.event, EVENT_COMPLETED);
        assert_eq!(ok.file_size, Some(8));
        assert_eq!(ok.duration_ms, 42);
        assert_eq!(ok.pdf.as_deref(), Some("JVBERi0xLjQ="));

        let err = ConversionError::Timeout(Duration::from_secs(1));
        let failed = WebhookPayload::failed("r-2", "url", &err, Duration::from_secs(1));
        assert_eq!(failed.event, EVENT_FAILED);
        assert!(!failed.success);

        let json = serde_json::to_string(&failed).unwrap();
        assert!(!json.contains("\"pdf\""));
        assert!(json.contains("timed out"));
    }
}
