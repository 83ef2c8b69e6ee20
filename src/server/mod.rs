//! HTTP front-end for the language model gateway.
//!
//! Provides endpoints for:
//! - Streamed chat replies
//! - Connection checks
//! - Health check
//!
//! The server never touches conversation storage; clients send the whole
//! message list with every request.

pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{ChatError, Result};

/// Build the router with CORS and request tracing applied.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server and stop on Ctrl-C.
///
/// # Errors
/// Returns an error if the address cannot be bound or serving fails.
pub async fn run_server(state: Arc<AppState>, addr: SocketAddr) -> Result<()> {
    run_server_with_shutdown(state, addr, shutdown_signal()).await
}

/// Start the HTTP server with graceful shutdown support.
///
/// The server stops accepting new connections when `shutdown_signal`
/// completes and lets in-flight replies finish.
///
/// # Errors
/// Returns an error if the address cannot be bound or serving fails.
pub async fn run_server_with_shutdown<F>(
    state: Arc<AppState>,
    addr: SocketAddr,
    shutdown_signal: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        ChatError::Config(format!("Failed to bind {}: {}", addr, e))
    })?;
    tracing::info!("aio-chat gateway listening on http://{}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
