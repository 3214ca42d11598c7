//! `pdf-forge` HTTP server.
//!
//! Configuration comes from `app.env` and the environment (see
//! [`pdf_forge::config::env`]). Logging follows `RUST_LOG`, defaulting to
//! `info`.

use std::net::SocketAddr;
use std::sync::Arc;

use pdf_forge::integrations::axum::router;
use pdf_forge::{ChromeEngine, Converter, PdfProcessor, PdfService, RenderEngine};
use tokio::signal;

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("❌ Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("❌ Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("🛑 Shutdown signal received, draining requests...");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("🚀 Starting pdf-forge v{}", env!("CARGO_PKG_VERSION"));

    let config = pdf_forge::from_env()?;
    let server = pdf_forge::server_from_env();

    let engine = Arc::new(match server.chrome_path.clone() {
        Some(path) => ChromeEngine::with_path(path),
        None => ChromeEngine::with_defaults(),
    });

    // Launch Chrome up front so the first request does not pay for it.
    let launcher = Arc::clone(&engine);
    tokio::task::spawn_blocking(move || launcher.start()).await??;

    let converter = Arc::new(Converter::new(engine.clone(), config));
    let processor = PdfProcessor::with_tool_timeout(server.tool_timeout);
    let service = Arc::new(PdfService::new(converter, processor));
    if server.api_key.is_some() {
        log::info!("🔐 API key authentication enabled");
    }
    let app = router(service, &server);

    let listener = tokio::net::TcpListener::bind(server.address).await?;
    log::info!("🌐 Listening on http://{}", server.address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    log::info!("🧹 Closing render engine...");
    tokio::task::spawn_blocking(move || engine.shutdown()).await?;
    log::info!("✅ Shutdown complete");

    Ok(())
}
