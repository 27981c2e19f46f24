// HTTP ingest handlers
//
// One handler per event kind: deserialize the body, normalize into a
// validated event, hand it to the relay, echo the acknowledgement.
// Validation failures never partially apply.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;

use pulse_core::ingest::{
    ErrorRequest, SessionEndRequest, SessionStartRequest, TaskCompleteRequest, TaskStartRequest,
    TokenUsageRequest,
};
use pulse_core::{MonitorEvent, PulseError};

use crate::AppState;

pub async fn session_start(
    State(state): State<AppState>,
    Json(request): Json<SessionStartRequest>,
) -> Response {
    submit(&state, request.normalize()).await
}

pub async fn session_end(
    State(state): State<AppState>,
    Json(request): Json<SessionEndRequest>,
) -> Response {
    submit(&state, request.normalize()).await
}

pub async fn token_usage(
    State(state): State<AppState>,
    Json(request): Json<TokenUsageRequest>,
) -> Response {
    submit(&state, request.normalize()).await
}

pub async fn task_start(
    State(state): State<AppState>,
    Json(request): Json<TaskStartRequest>,
) -> Response {
    submit(&state, request.normalize()).await
}

pub async fn task_complete(
    State(state): State<AppState>,
    Json(request): Json<TaskCompleteRequest>,
) -> Response {
    submit(&state, request.normalize()).await
}

pub async fn error(State(state): State<AppState>, Json(request): Json<ErrorRequest>) -> Response {
    submit(&state, request.normalize()).await
}

async fn submit(state: &AppState, normalized: pulse_core::Result<MonitorEvent>) -> Response {
    let event = match normalized {
        Ok(event) => event,
        Err(e) => return reject(e),
    };
    match state.relay.ingest(event).await {
        Ok(ack) => Json(ack).into_response(),
        Err(e) => reject(e),
    }
}

fn reject(error: PulseError) -> Response {
    let status = match &error {
        PulseError::Validation { .. } => StatusCode::BAD_REQUEST,
        PulseError::DuplicateSession(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    debug!(%error, "rejected ingest request");
    (
        status,
        Json(json!({ "success": false, "error": error.to_string() })),
    )
        .into_response()
}
