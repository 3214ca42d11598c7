//! Web framework integrations.
//!
//! Each integration is behind its own feature flag and only maps HTTP onto
//! [`PdfService`](crate::service::PdfService).
//!
//! | Feature | Module |
//! |---------|--------|
//! | `axum-integration` (default) | [`axum`], [`rate_limit`] |

#[cfg(feature = "axum-integration")]
pub mod axum;
#[cfg(feature = "axum-integration")]
pub mod rate_limit;
