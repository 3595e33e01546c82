//! HTTP surface assembly: public endpoints, the authenticated rush route,
//! and the notification WebSocket, plus graceful shutdown (§5). Route
//! nesting and the `axum::serve` startup shape are grounded in the source
//! gateway's `run_server`, stripped of the market/transfer/funding surface
//! this crate does not expose.

pub mod handlers;
pub mod state;
pub mod websocket;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tokio::net::TcpListener;

use crate::auth::jwt_auth_middleware;
use state::AppState;

/// Upper bound on in-flight request drain time during shutdown (§5).
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub fn build_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/v1/flash-sales/{id}", get(handlers::get_activity))
        .route("/api/v1/flash-sales/{id}/stock", get(handlers::get_stock))
        .route("/ws/notifications", get(websocket::ws_notifications))
        .route("/healthz", get(handlers::healthz));

    let authenticated_routes = Router::new()
        .route("/api/v1/flash-sales/{id}/rush", post(handlers::rush))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .with_state(state)
}

/// Bind and serve until a shutdown signal (ctrl-c or SIGTERM) arrives, then
/// stop accepting new connections and give in-flight requests up to
/// [`SHUTDOWN_DRAIN_TIMEOUT`] to finish before returning.
pub async fn run_server(bind_addr: &str, state: Arc<AppState>) -> std::io::Result<()> {
    let router = build_router(state);
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(target: "GATEWAY", addr = %bind_addr, "listening");

    let serve = axum::serve(listener, router).with_graceful_shutdown(shutdown_signal());

    match tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT + Duration::from_secs(5), serve.into_future()).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(target: "GATEWAY", "shutdown drain timed out, forcing exit");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!(target: "GATEWAY", "shutdown signal received, draining in-flight requests");
}
