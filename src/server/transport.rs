//! HTTP transport.
//!
//! Binds the router to a TCP listener and serves until shutdown.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::handlers::{AppState, router};
use crate::agent::orchestrator::Orchestrator;

/// Serves the research API on `host:port` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the server fails to bind or encounters a runtime error.
pub async fn serve(orchestrator: Arc<Orchestrator>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let tcp_listener = TcpListener::bind(&addr).await?;
    info!(%addr, "sleuth server listening");

    let ct = CancellationToken::new();
    let on_signal = ct.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        on_signal.cancel();
    });

    serve_listener(tcp_listener, orchestrator, ct).await
}

/// Serves on an already-bound listener until `shutdown` fires.
///
/// # Errors
///
/// Returns an error if the server encounters a runtime error.
pub async fn serve_listener(
    listener: TcpListener,
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = router(AppState { orchestrator });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}
