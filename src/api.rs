//! REST endpoints for reading completed records.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use tracing::debug;

use crate::form::{FormEngine, ParticipantId};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FormEngine>,
}

/// Build the Axum router with the health and record routes.
pub fn record_routes(engine: Arc<FormEngine>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/records/{participant_id}", get(get_record))
        .with_state(AppState { engine })
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "form-bot",
        "records": state.engine.records().count().await,
        "active_forms": state.engine.sessions().active_count().await,
    }))
}

// ── Records ─────────────────────────────────────────────────────────────

async fn get_record(
    State(state): State<AppState>,
    Path(participant_id): Path<String>,
) -> impl IntoResponse {
    let participant = ParticipantId::new(participant_id);
    match state.engine.records().get(&participant).await {
        Some(record) => (StatusCode::OK, Json(serde_json::json!(record))),
        None => {
            debug!(participant = %participant, "Record lookup missed");
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "No completed form for this participant"})),
            )
        }
    }
}
