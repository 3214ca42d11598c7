//! Axum HTTP front end.
//!
//! [`router`] builds the complete API around a shared [`PdfService`].
//! Handlers stay thin: they parse the body, call the service and map the
//! result to a response.
//!
//! # Routes
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | GET | `/health` | [`HealthResponse`] JSON, 503 when degraded |
//! | GET | `/healthz` | `ok` (liveness) |
//! | GET | `/metrics` | Prometheus text |
//! | POST | `/convert` | PDF, content type from the `type` field |
//! | POST | `/html`, `/render` | PDF from JSON or a raw HTML body |
//! | POST | `/url`, `/markdown`, `/image`, `/images`, `/table` | PDF |
//! | POST | `/merge` | PDF |
//! | POST | `/manipulate` | PDF or JSON report |
//! | POST | `/batch` | [`BatchResult`](crate::service::BatchResult) JSON |
//! | POST | `/template` | PDF rendered from a document template |
//! | POST | `/async` | 202 [`AsyncAccepted`] JSON, result sent to a webhook |
//!
//! # Middleware (outermost first)
//!
//! 1. CORS, when origins are configured; answers preflights itself
//! 2. [`set_request_context`]: request id from `X-Request-ID` or a new UUID,
//!    echoed on every response
//! 3. [`log_responses`]: access log
//! 4. [`limit_rate`]: per client IP when `rate_limit` is non-zero
//! 5. [`require_api_key`]: `X-API-Key` or `Authorization: Bearer` when a key
//!    is configured
//! 6. body size limit
//!
//! Health and metrics are exempt from the rate limit and the API key.
//!
//! # Example
//!
//! ```rust,ignore
//! use pdf_forge::integrations::axum::router;
//!
//! let app = router(service, &server_config);
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Extension, Json, Router,
    body::{Body, Bytes},
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, header},
    middleware::{self as axum_middleware, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::ConversionError;
use crate::integrations::rate_limit::{RateDecision, RateLimiter};
use crate::service::{
    AsyncAccepted, AsyncRequest, BatchRequest, ConversionRequest, ErrorResponse,
    ManipulateOutcome, ManipulateRequest, MergeRequest, PdfService, RequestType, TemplateRequest,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// How long browsers may cache a preflight answer.
const CORS_MAX_AGE: Duration = Duration::from_secs(86400);

/// Longest client-supplied request id that is propagated as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Paths reachable without an API key and never rate limited.
const OPEN_PATHS: [&str; 3] = ["/health", "/healthz", "/metrics"];

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PdfService>,
    pub api_key: Option<Arc<str>>,
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    pub fn new(service: Arc<PdfService>, config: &ServerConfig) -> Self {
        Self {
            service,
            api_key: config
                .api_key
                .clone()
                .filter(|key| !key.is_empty())
                .map(Arc::from),
            rate_limiter: (config.rate_limit > 0).then(|| {
                Arc::new(RateLimiter::new(config.rate_limit_window, config.rate_limit))
            }),
        }
    }
}

/// Per-request data attached by [`set_request_context`].
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Failure detail left on error responses for [`log_responses`].
#[derive(Debug, Clone)]
struct ErrorDetail(String);

/// A [`ConversionError`] bound to the request it failed.
#[derive(Debug)]
pub struct ApiError {
    error: ConversionError,
    request_id: String,
}

impl ApiError {
    fn new(error: ConversionError, ctx: &RequestContext) -> Self {
        Self {
            error,
            request_id: ctx.request_id.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse::from_error(&self.error, Some(self.request_id));

        let mut response = (status, Json(body)).into_response();
        response
            .extensions_mut()
            .insert(ErrorDetail(self.error.to_string()));
        response
    }
}

type ApiResult = std::result::Result<Response, ApiError>;

/// Build the API router.
pub fn router(service: Arc<PdfService>, config: &ServerConfig) -> Router {
    let state = AppState::new(service, config);
    let app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(liveness))
        .route("/metrics", get(metrics))
        .route("/convert", post(convert))
        .route("/html", post(html))
        .route("/render", post(html))
        .route("/url", post(url))
        .route("/markdown", post(markdown))
        .route("/image", post(image))
        .route("/images", post(images))
        .route("/table", post(table))
        .route("/merge", post(merge))
        .route("/manipulate", post(manipulate))
        .route("/batch", post(batch))
        .route("/template", post(template))
        .route("/async", post(submit_async))
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(set_request_context))
                .layer(axum_middleware::from_fn(log_responses))
                .layer(axum_middleware::from_fn_with_state(state.clone(), limit_rate))
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    require_api_key,
                ))
                .layer(DefaultBodyLimit::max(config.max_body_size)),
        )
        .with_state(state);

    match cors_layer(&config.cors_origins) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

/// CORS policy for `origins`; `None` when the list is empty.
pub fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let allow_origin = if origins.iter().any(|origin| origin == "*") {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|origin| {
            let value = HeaderValue::from_str(origin);
            if value.is_err() {
                log::warn!("⚠️ Ignoring invalid CORS origin: {}", origin);
            }
            value.ok()
        }))
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                HeaderName::from_static(API_KEY_HEADER),
                HeaderName::from_static(REQUEST_ID_HEADER),
            ])
            .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
            .max_age(CORS_MAX_AGE),
    )
}

// ============================================================================
// Middleware
// ============================================================================

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
    });

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let response = next.run(request).await;
    let status = response.status();
    let detail = response
        .extensions()
        .get::<ErrorDetail>()
        .map(|detail| detail.0.as_str())
        .unwrap_or("");

    if status.is_server_error() {
        log::error!(
            "❌ {} {} {} in {:?} request_id={} {}",
            method,
            path,
            status.as_u16(),
            start.elapsed(),
            request_id,
            detail
        );
    } else if status.is_client_error() {
        log::warn!(
            "⚠️ {} {} {} in {:?} request_id={} {}",
            method,
            path,
            status.as_u16(),
            start.elapsed(),
            request_id,
            detail
        );
    } else {
        log::info!(
            "🌐 {} {} {} in {:?} request_id={}",
            method,
            path,
            status.as_u16(),
            start.elapsed(),
            request_id
        );
    }

    response
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key);
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn rejection(
    request: &Request<Body>,
    status: StatusCode,
    error: &str,
    message: String,
    code: &str,
) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone());
    let body = ErrorResponse {
        error: error.to_string(),
        message,
        code: code.to_string(),
        request_id,
    };
    (status, Json(body)).into_response()
}

/// Key for rate limiting: the peer IP when the server exposes it.
fn client_key(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn limit_rate(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(limiter) = state.rate_limiter.as_deref() else {
        return next.run(request).await;
    };
    if OPEN_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let client = client_key(&request);
    match limiter.check(&client) {
        RateDecision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(limiter.limit()));
            headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        RateDecision::Limited { retry_after_secs } => {
            log::warn!("🚦 Rate limit exceeded for {}", client);
            let mut response = rejection(
                &request,
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests",
                format!(
                    "rate limit of {} requests per {}s exceeded",
                    limiter.limit(),
                    limiter.window().as_secs()
                ),
                "RATE_LIMITED",
            );
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(limiter.limit()));
            headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from(0u32));
            response
        }
    }
}

pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };
    if OPEN_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }
    if presented_key(request.headers()) == Some(expected) {
        return next.run(request).await;
    }

    rejection(
        &request,
        StatusCode::UNAUTHORIZED,
        "Unauthorized",
        "missing or invalid API key".to_string(),
        "UNAUTHORIZED",
    )
}

// ============================================================================
// Helpers
// ============================================================================

fn pdf_response(pdf: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"document.pdf\"",
            ),
        ],
        pdf,
    )
        .into_response()
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> std::result::Result<T, ConversionError> {
    serde_json::from_slice(body)
        .map_err(|e| ConversionError::InvalidRequest(format!("invalid JSON payload: {}", e)))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

async fn convert_as(
    state: AppState,
    ctx: RequestContext,
    body: Bytes,
    kind: Option<RequestType>,
) -> ApiResult {
    let request: ConversionRequest = parse_json(&body).map_err(|e| ApiError::new(e, &ctx))?;
    let pdf = state
        .service
        .convert(request, kind)
        .await
        .map_err(|e| ApiError::new(e, &ctx))?;
    Ok(pdf_response(pdf))
}

// ============================================================================
// Handlers
// ============================================================================

async fn health(State(state): State<AppState>) -> Response {
    let report = state.service.health().await;
    let status = if report.status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

async fn liveness() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.service.metrics_text(),
    )
        .into_response()
}

async fn convert(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> ApiResult {
    convert_as(state, ctx, body, None).await
}

/// JSON payload, or the raw body as HTML for any other content type.
async fn html(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    if is_json(&headers) {
        return convert_as(state, ctx, body, Some(RequestType::Html)).await;
    }

    let markup = String::from_utf8(body.to_vec()).map_err(|_| {
        ApiError::new(
            ConversionError::InvalidRequest("HTML body is not valid UTF-8".to_string()),
            &ctx,
        )
    })?;
    let pdf = state
        .service
        .convert(ConversionRequest::html(markup), None)
        .await
        .map_err(|e| ApiError::new(e, &ctx))?;
    Ok(pdf_response(pdf))
}

async fn url(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> ApiResult {
    convert_as(state, ctx, body, Some(RequestType::Url)).await
}

async fn markdown(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> ApiResult {
    convert_as(state, ctx, body, Some(RequestType::Markdown)).await
}

async fn image(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> ApiResult {
    convert_as(state, ctx, body, Some(RequestType::Image)).await
}

async fn images(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> ApiResult {
    convert_as(state, ctx, body, Some(RequestType::Images)).await
}

async fn table(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> ApiResult {
    convert_as(state, ctx, body, Some(RequestType::Table)).await
}

async fn merge(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> ApiResult {
    let request: MergeRequest = parse_json(&body).map_err(|e| ApiError::new(e, &ctx))?;
    let pdf = state
        .service
        .merge(request)
        .await
        .map_err(|e| ApiError::new(e, &ctx))?;
    Ok(pdf_response(pdf))
}

async fn manipulate(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> ApiResult {
    let request: ManipulateRequest = parse_json(&body).map_err(|e| ApiError::new(e, &ctx))?;
    match state.service.manipulate(request).await {
        Ok(ManipulateOutcome::Pdf(pdf)) => Ok(pdf_response(pdf)),
        Ok(ManipulateOutcome::Report(report)) => Ok(Json(report).into_response()),
        Err(e) => Err(ApiError::new(e, &ctx)),
    }
}

async fn batch(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> ApiResult {
    let request: BatchRequest = parse_json(&body).map_err(|e| ApiError::new(e, &ctx))?;
    let result = state
        .service
        .batch(request, &ctx.request_id)
        .await
        .map_err(|e| ApiError::new(e, &ctx))?;
    Ok(Json(result).into_response())
}

async fn template(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> ApiResult {
    let request: TemplateRequest = parse_json(&body).map_err(|e| ApiError::new(e, &ctx))?;
    let pdf = state
        .service
        .template(request)
        .await
        .map_err(|e| ApiError::new(e, &ctx))?;
    Ok(pdf_response(pdf))
}

async fn submit_async(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Bytes,
) -> ApiResult {
    let request: AsyncRequest = parse_json(&body).map_err(|e| ApiError::new(e, &ctx))?;
    state
        .service
        .submit_async(request, &ctx.request_id)
        .map_err(|e| ApiError::new(e, &ctx))?;
    Ok((
        StatusCode::ACCEPTED,
        Json(AsyncAccepted::queued(ctx.request_id.as_str())),
    )
        .into_response())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presented_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(presented_key(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(presented_key(&headers), Some("abc"));

        headers.insert(API_KEY_HEADER, HeaderValue::from_static("xyz"));
        assert_eq!(presented_key(&headers), Some("xyz"));
    }

    #[test]
    fn test_is_json() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(is_json(&headers));
    }

    #[test]
    fn test_api_error_status() {
        let ctx = RequestContext {
            request_id: "r-1".into(),
        };
        let response = ApiError::new(
            ConversionError::Timeout(std::time::Duration::from_secs(1)),
            &ctx,
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(response.extensions().get::<ErrorDetail>().is_some());
    }

    #[test]
    fn test_cors_layer_only_with_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["*".to_string()]).is_some());
        assert!(cors_layer(&["https://app.example".to_string()]).is_some());
    }

    #[test]
    fn test_client_key_uses_peer_ip() {
        let mut request = Request::new(Body::empty());
        assert_eq!(client_key(&request), "unknown");

        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 5123))));
        assert_eq!(client_key(&request), "10.0.0.7");
    }
}
