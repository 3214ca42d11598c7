//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use pdf_forge::engine::mock::MockRenderEngine;
use pdf_forge::prelude::*;

/// Route library logs to the test harness; honours `RUST_LOG`.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builder with no settle delay so tests finish quickly.
pub fn fast_config(max_workers: usize) -> ConverterConfigBuilder {
    ConverterConfigBuilder::new()
        .max_workers(max_workers)
        .settle_delay(Duration::ZERO)
        .poll_interval(Duration::from_millis(5))
}

/// Converter over `engine`. The engine is cloned, so counters stay
/// observable through the caller's handle.
pub fn mock_converter(engine: &MockRenderEngine, config: ConverterConfig) -> Arc<Converter> {
    Arc::new(Converter::new(Arc::new(engine.clone()), config))
}

/// Service over a mock converter and a processor that spawns real tools.
pub fn mock_service(engine: &MockRenderEngine, config: ConverterConfig) -> Arc<PdfService> {
    Arc::new(PdfService::new(
        mock_converter(engine, config),
        PdfProcessor::new(),
    ))
}

pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}
