// Pulse relay server
//
// HTTP ingest for producers, WebSocket fan-out for dashboard viewers. All
// state lives in pulse-core; this crate is the transport boundary.

pub mod ingest;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use pulse_core::store::AggregateMetrics;
use pulse_core::{Health, Relay};

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
}

/// Builds the full route table. Paths match the dashboard protocol.
pub fn router(relay: Arc<Relay>) -> Router {
    let state = AppState { relay };
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/session/start", post(ingest::session_start))
        .route("/api/session/end", post(ingest::session_end))
        .route("/api/tokens", post(ingest::token_usage))
        .route("/api/task/start", post(ingest::task_start))
        .route("/api/task/complete", post(ingest::task_complete))
        .route("/api/error", post(ingest::error))
        .route("/ws", get(ws::ws_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<Health> {
    Json(state.relay.health())
}

async fn metrics_handler(State(state): State<AppState>) -> Json<AggregateMetrics> {
    Json(state.relay.metrics().await)
}
