//! Route definitions for the Beacon HTTP API.
//!
//! Presence endpoints sit at the root, the catalogue and health checks under
//! `/api`, and the WebSocket upgrades under `/ws`.

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_http::timeout::TimeoutLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the router with all routes, threading `AppState` through every one.
pub fn build_router(state: AppState) -> Router {
    let request_timeout = Duration::from_millis(state.config.server.request_timeout_ms);

    Router::new()
        .merge(presence_routes().layer(TimeoutLayer::new(request_timeout)))
        .nest("/api", api_routes())
        .merge(ws_routes())
        .with_state(state)
}

/// Heartbeat, offline, and the online snapshot.
fn presence_routes() -> Router<AppState> {
    Router::new()
        .route("/presence", get(handlers::presence::online_users))
        .route("/presence/html", get(handlers::presence::online_users_html))
        .route("/presence/heartbeat", post(handlers::presence::heartbeat))
        .route("/presence/offline", post(handlers::presence::offline))
}

/// Topic catalogue and health checks.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
        .route("/topics", get(handlers::topics::list_topics))
}

/// WebSocket upgrades, one per subscriber allow-list.
fn ws_routes() -> Router<AppState> {
    Router::new()
        .route("/ws/html", get(handlers::ws::html_socket))
        .route("/ws/data", get(handlers::ws::data_socket))
        .route("/ws/presence", get(handlers::ws::presence_socket))
}
