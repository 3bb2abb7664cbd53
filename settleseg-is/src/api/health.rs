//! Liveness endpoint

use crate::AppState;
use axum::extract::State;
use axum::Json;
use serde_json::json;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "settleseg-is",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "jobs_tracked": state.registry.len(),
    }))
}
