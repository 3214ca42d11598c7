//! Health check trait for render engines.
//!
//! The `/health` endpoint pings the engine to report whether the browser
//! behind it still responds.

use crate::error::Result;

/// Trait for engines that can verify they are still responsive.
///
/// # Thread Safety
///
/// Requires `Send + Sync` because the health endpoint pings from a
/// blocking worker while conversions run on others.
///
/// # Example
///
/// ```rust,ignore
/// use pdf_forge::{ConversionError, Healthcheck, Result};
///
/// struct RemoteRenderer {
///     endpoint: String,
/// }
///
/// impl Healthcheck for RemoteRenderer {
///     fn ping(&self) -> Result<()> {
///         probe(&self.endpoint)
///             .map_err(|e| ConversionError::EngineUnavailable(e.to_string()))
///     }
/// }
/// ```
pub trait Healthcheck: Send + Sync {
    /// Perform a lightweight liveness check, such as one protocol round
    /// trip. Must not allocate per-request resources like tabs, since
    /// health probes bypass the admission gate.
    ///
    /// Blocks; call it off the async runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError::EngineUnavailable`](crate::ConversionError::EngineUnavailable)
    /// if the engine is unresponsive or crashed.
    fn ping(&self) -> Result<()>;
}
