//! HTTP transport.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use super::routes::{AppState, build_router};

/// Starts the HTTP server on `host:port`.
///
/// Shuts down gracefully on Ctrl+C.
///
/// # Errors
///
/// Returns an error if the server fails to bind or encounters a runtime error.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "ngni-agent listening (POST /query, GET /health)");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("received Ctrl+C, shutting down");
        })
        .await
        .context("server runtime failed")?;

    Ok(())
}
