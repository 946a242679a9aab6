//! Axum HTTP server: router, listener, graceful shutdown.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::cors;
use crate::dispatch::Dispatcher;

/// Shared application state.
pub struct AppState {
    pub config: GatewayConfig,
    pub dispatcher: Dispatcher,
}

/// Router with every request not claimed by `/health` going through the
/// dispatcher.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .fallback(handle_dispatch)
        .layer(TraceLayer::new_for_http())
        .layer(cors::layer())
        .with_state(state)
}

/// Build and run the HTTP server.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let listen_addr = state.config.server.listen_address.clone();
    if state.dispatcher.routes().is_empty() {
        tracing::warn!("Route table is empty; every request will hit the fallback");
    }
    tracing::info!(routes = state.dispatcher.routes().len(), "Route table built");

    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "anime-gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("anime-gateway shut down gracefully");
    Ok(())
}

async fn handle_dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    state.dispatcher.dispatch(request).await
}

/// Health check endpoint.
async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Wait for SIGINT (Ctrl+C) for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C; shutdown signal disabled");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
