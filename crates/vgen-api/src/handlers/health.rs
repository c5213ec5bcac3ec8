//! Health and queue status handlers.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use vgen_pipeline::QueueStatus;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub accepting: bool,
}

/// Liveness probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        accepting: state.scheduler.is_accepting(),
    })
}

/// Queue snapshot.
pub async fn queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    Json(state.scheduler.status())
}
