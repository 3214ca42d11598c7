//! Traits shared across engine implementations.
//!
//! - [`Healthcheck`]: liveness probe used by the health endpoint

mod healthcheck;

pub use healthcheck::Healthcheck;
