//! Configuration for the converter and the HTTP server.
//!
//! This module provides [`ConverterConfig`] and [`ConverterConfigBuilder`]
//! for tuning the rendering core, and [`ServerConfig`] for the HTTP layer.
//!
//! # Example
//!
//! ```rust
//! use pdf_forge::ConverterConfigBuilder;
//! use std::time::Duration;
//!
//! let config = ConverterConfigBuilder::new()
//!     .max_workers(8)
//!     .inline_timeout(Duration::from_secs(30))
//!     .build()
//!     .expect("Invalid configuration");
//!
//! assert_eq!(config.max_workers, 8);
//! ```
//!
//! # Environment Configuration
//!
//! When the `env-config` feature is enabled, use [`env::from_env`] to load
//! configuration from environment variables (and an optional `app.env`).

use std::net::SocketAddr;
use std::time::Duration;

use crate::processor::DEFAULT_TOOL_TIMEOUT;

/// Default number of concurrent rendering slots.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Default cap on concurrent sessions the engine will accept.
pub const DEFAULT_ENGINE_SESSION_LIMIT: usize = 16;

/// Default request body limit (500 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 500 * 1024 * 1024;

/// Default rate limit window.
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// How the converter decides a loaded page is ready to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessMode {
    /// Sleep for the whole settle interval.
    FixedDelay,
    /// Poll the page and proceed as soon as it reports ready, never
    /// waiting longer than the settle interval.
    Poll,
}

impl ReadinessMode {
    /// Parse `"fixed"` or `"poll"` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fixed" | "fixed-delay" | "fixed_delay" => Some(ReadinessMode::FixedDelay),
            "poll" | "polling" => Some(ReadinessMode::Poll),
            _ => None,
        }
    }
}

/// Tuning knobs for the conversion core.
///
/// Use [`ConverterConfigBuilder`] to construct a validated instance.
///
/// # Fields
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `max_workers` | 4 | Admission slots (concurrent renders) |
/// | `engine_session_limit` | 16 | Sessions the engine can host at once |
/// | `inline_timeout` | 60s | Deadline for inline markup conversions |
/// | `url_timeout` | 45s | Deadline for remote URL conversions |
/// | `admission_timeout` | 30s | Longest wait for a free slot |
/// | `readiness` | `Poll` | Readiness strategy |
/// | `inline_settle_delay` | 3s | Settle interval for html, markdown and table |
/// | `image_settle_delay` | 500ms | Settle interval for image documents |
/// | `url_settle_delay` | 0 | Settle interval for remote pages |
/// | `poll_interval` | 200ms | Readiness poll period |
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Number of conversions allowed to hold a render session at once.
    pub max_workers: usize,

    /// Concurrent sessions the render engine is able to host.
    ///
    /// `max_workers` may not exceed this.
    pub engine_session_limit: usize,

    /// Hard deadline for inline content (html, markdown, images, table).
    pub inline_timeout: Duration,

    /// Hard deadline for remote URL content.
    pub url_timeout: Duration,

    /// Maximum time a request may queue at the admission gate.
    pub admission_timeout: Duration,

    /// Readiness strategy applied after the document body exists.
    pub readiness: ReadinessMode,

    /// Settle interval for inline html, markdown and table documents.
    pub inline_settle_delay: Duration,

    /// Settle interval for image documents.
    pub image_settle_delay: Duration,

    /// Settle interval for remote pages.
    pub url_settle_delay: Duration,

    /// Period between readiness checks in [`ReadinessMode::Poll`].
    pub poll_interval: Duration,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            engine_session_limit: DEFAULT_ENGINE_SESSION_LIMIT,
            inline_timeout: Duration::from_secs(60),
            url_timeout: Duration::from_secs(45),
            admission_timeout: Duration::from_secs(30),
            readiness: ReadinessMode::Poll,
            inline_settle_delay: Duration::from_secs(3),
            image_settle_delay: Duration::from_millis(500),
            url_settle_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(200),
        }
    }
}

/// Builder for [`ConverterConfig`] with validation.
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: ConverterConfig::default(),
        }
    }

    /// Set the number of admission slots.
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.config.max_workers = workers;
        self
    }

    /// Set how many sessions the engine can host at once.
    pub fn engine_session_limit(mut self, limit: usize) -> Self {
        self.config.engine_session_limit = limit;
        self
    }

    /// Set the deadline for inline content.
    pub fn inline_timeout(mut self, timeout: Duration) -> Self {
        self.config.inline_timeout = timeout;
        self
    }

    /// Set the deadline for URL content.
    pub fn url_timeout(mut self, timeout: Duration) -> Self {
        self.config.url_timeout = timeout;
        self
    }

    /// Set the longest admission wait.
    pub fn admission_timeout(mut self, timeout: Duration) -> Self {
        self.config.admission_timeout = timeout;
        self
    }

    /// Select the readiness strategy.
    pub fn readiness(mut self, mode: ReadinessMode) -> Self {
        self.config.readiness = mode;
        self
    }

    /// Set the settle interval for inline html, markdown and table documents.
    pub fn inline_settle_delay(mut self, delay: Duration) -> Self {
        self.config.inline_settle_delay = delay;
        self
    }

    /// Set the settle interval for image documents.
    pub fn image_settle_delay(mut self, delay: Duration) -> Self {
        self.config.image_settle_delay = delay;
        self
    }

    /// Set the settle interval for remote pages.
    pub fn url_settle_delay(mut self, delay: Duration) -> Self {
        self.config.url_settle_delay = delay;
        self
    }

    /// Set one settle interval for every content kind.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.inline_settle_delay = delay;
        self.config.image_settle_delay = delay;
        self.config.url_settle_delay = delay;
        self
    }

    /// Set the readiness poll period.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - `max_workers` is 0
    /// - `max_workers` exceeds `engine_session_limit`
    /// - either conversion timeout is zero
    /// - `poll_interval` is zero
    pub fn build(self) -> std::result::Result<ConverterConfig, String> {
        if self.config.max_workers == 0 {
            return Err("max_workers must be greater than 0".to_string());
        }

        if self.config.max_workers > self.config.engine_session_limit {
            return Err(format!(
                "max_workers ({}) cannot exceed engine_session_limit ({})",
                self.config.max_workers, self.config.engine_session_limit
            ));
        }

        if self.config.inline_timeout.is_zero() || self.config.url_timeout.is_zero() {
            return Err("conversion timeouts must be greater than 0".to_string());
        }

        if self.config.poll_interval.is_zero() {
            return Err("poll_interval must be greater than 0".to_string());
        }

        Ok(self.config)
    }
}

impl Default for ConverterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// Settings for the HTTP layer and engine launch.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind.
    pub address: SocketAddr,

    /// When set, every route except health and metrics requires this key.
    pub api_key: Option<String>,

    /// Largest accepted request body in bytes.
    pub max_body_size: usize,

    /// Explicit Chrome binary; auto-detected when `None`.
    pub chrome_path: Option<String>,

    /// Allowed CORS origins. Empty disables CORS; `*` allows any origin.
    pub cors_origins: Vec<String>,

    /// Requests per client and window; 0 disables limiting.
    pub rate_limit: u32,

    pub rate_limit_window: Duration,

    /// Longest run of one external PDF tool before it is killed.
    pub tool_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            api_key: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            chrome_path: None,
            cors_origins: Vec::new(),
            rate_limit: 0,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

/// Split a comma-separated origin list. A set but empty list means any
/// origin.
pub fn parse_origins(value: &str) -> Vec<String> {
    let origins: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_owned)
        .collect();
    if origins.is_empty() {
        vec!["*".to_string()]
    } else {
        origins
    }
}

/// Parse a listen address, accepting the `":8080"` shorthand.
pub fn parse_address(value: &str) -> Option<SocketAddr> {
    let value = value.trim();
    if let Some(port) = value.strip_prefix(':') {
        return port
            .parse::<u16>()
            .ok()
            .map(|port| SocketAddr::from(([0, 0, 0, 0], port)));
    }
    value.parse().ok()
}

// ============================================================================
// Environment Configuration (feature-gated)
// ============================================================================

/// Environment-based configuration loading.
///
/// Reads an optional `app.env` file, then environment variables.
///
/// | Variable | Type | Default |
/// |----------|------|---------|
/// | `MAX_WORKERS` | usize | 4 |
/// | `ENGINE_SESSION_LIMIT` | usize | 16 |
/// | `INLINE_TIMEOUT_SECONDS` | u64 | 60 |
/// | `URL_TIMEOUT_SECONDS` | u64 | 45 |
/// | `ADMISSION_TIMEOUT_SECONDS` | u64 | 30 |
/// | `READINESS_MODE` | `poll` / `fixed` | poll |
/// | `SETTLE_DELAY_MS` | u64 | per-kind defaults |
/// | `READINESS_POLL_MS` | u64 | 200 |
/// | `ADDRESS` | addr or `:port` | 0.0.0.0:8080 |
/// | `API_KEY` | string | unset |
/// | `MAX_BODY_SIZE` | bytes | 500 MiB |
/// | `CHROME_PATH` | path | auto-detect |
/// | `CORS_ORIGINS` | comma-separated origins, `*` for any | unset (CORS off) |
/// | `RATE_LIMIT` | requests per client and window, 0 = off | 0 |
/// | `RATE_LIMIT_WINDOW_SECONDS` | u64 | 60 |
/// | `TOOL_TIMEOUT_SECONDS` | u64 | 120 |
#[cfg(feature = "env-config")]
pub mod env {
    use super::*;
    use crate::error::ConversionError;

    /// Default environment file name.
    pub const ENV_FILE_NAME: &str = "app.env";

    /// Load environment variables from `app.env`.
    pub fn load_env_file() -> Result<std::path::PathBuf, dotenvy::Error> {
        dotenvy::from_filename(ENV_FILE_NAME)
    }

    fn var<T: std::str::FromStr>(name: &str) -> Option<T> {
        std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
    }

    /// Load converter configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::Configuration`] if the resulting values
    /// fail builder validation.
    pub fn from_env() -> Result<ConverterConfig, ConversionError> {
        match load_env_file() {
            Ok(path) => {
                log::info!("📄 Loaded configuration from: {:?}", path);
            }
            Err(e) => {
                log::debug!(
                    "📄 No {} file found or failed to load: {} (using environment variables and defaults)",
                    ENV_FILE_NAME,
                    e
                );
            }
        }

        let defaults = ConverterConfig::default();

        let max_workers = var("MAX_WORKERS").unwrap_or(defaults.max_workers);
        let engine_session_limit =
            var("ENGINE_SESSION_LIMIT").unwrap_or(defaults.engine_session_limit);
        let inline_timeout_seconds =
            var("INLINE_TIMEOUT_SECONDS").unwrap_or(defaults.inline_timeout.as_secs());
        let url_timeout_seconds =
            var("URL_TIMEOUT_SECONDS").unwrap_or(defaults.url_timeout.as_secs());
        let admission_timeout_seconds =
            var("ADMISSION_TIMEOUT_SECONDS").unwrap_or(defaults.admission_timeout.as_secs());
        let readiness = std::env::var("READINESS_MODE")
            .ok()
            .and_then(|s| ReadinessMode::parse(&s))
            .unwrap_or(defaults.readiness);
        let poll_ms = var("READINESS_POLL_MS")
            .unwrap_or(defaults.poll_interval.as_millis() as u64);
        let settle_ms: Option<u64> = var("SETTLE_DELAY_MS");

        log::info!("⚙️ Loading converter configuration from environment:");
        log::info!("   - Max workers: {}", max_workers);
        log::info!("   - Engine session limit: {}", engine_session_limit);
        log::info!("   - Inline timeout: {}s", inline_timeout_seconds);
        log::info!("   - URL timeout: {}s", url_timeout_seconds);
        log::info!("   - Admission timeout: {}s", admission_timeout_seconds);
        log::info!("   - Readiness: {:?} (poll every {}ms)", readiness, poll_ms);
        if let Some(ms) = settle_ms {
            log::info!("   - Settle delay override: {}ms", ms);
        }

        let mut builder = ConverterConfigBuilder::new()
            .max_workers(max_workers)
            .engine_session_limit(engine_session_limit)
            .inline_timeout(Duration::from_secs(inline_timeout_seconds))
            .url_timeout(Duration::from_secs(url_timeout_seconds))
            .admission_timeout(Duration::from_secs(admission_timeout_seconds))
            .readiness(readiness)
            .poll_interval(Duration::from_millis(poll_ms));

        if let Some(ms) = settle_ms {
            builder = builder.settle_delay(Duration::from_millis(ms));
        }

        builder.build().map_err(ConversionError::Configuration)
    }

    /// Load server configuration from the environment.
    ///
    /// Call after [`from_env`] so `app.env` has already been applied.
    pub fn server_from_env() -> ServerConfig {
        let defaults = ServerConfig::default();

        let address = std::env::var("ADDRESS")
            .ok()
            .and_then(|s| parse_address(&s))
            .unwrap_or(defaults.address);

        let cors_origins = std::env::var("CORS_ORIGINS")
            .map(|s| parse_origins(&s))
            .unwrap_or_default();
        let rate_limit = var("RATE_LIMIT").unwrap_or(defaults.rate_limit);
        let rate_limit_window = var("RATE_LIMIT_WINDOW_SECONDS")
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.rate_limit_window);
        let tool_timeout = var("TOOL_TIMEOUT_SECONDS")
            .filter(|secs: &u64| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.tool_timeout);

        log::info!("⚙️ Loading server configuration from environment:");
        log::info!("   - Address: {}", address);
        log::info!("   - Tool timeout: {:?}", tool_timeout);
        if !cors_origins.is_empty() {
            log::info!("   - CORS origins: {}", cors_origins.join(", "));
        }
        if rate_limit > 0 {
            log::info!("   - Rate limit: {} per {:?}", rate_limit, rate_limit_window);
        }

        ServerConfig {
            address,
            api_key: std::env::var("API_KEY").ok().filter(|k| !k.is_empty()),
            max_body_size: var("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            chrome_path: chrome_path_from_env(),
            cors_origins,
            rate_limit,
            rate_limit_window,
            tool_timeout,
        }
    }

    /// Read `CHROME_PATH`.
    pub fn chrome_path_from_env() -> Option<String> {
        std::env::var("CHROME_PATH").ok().filter(|p| !p.is_empty())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
