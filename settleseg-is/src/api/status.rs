//! Job status polling

use crate::error::{ApiError, ApiResult};
use crate::models::Job;
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    state
        .registry
        .snapshot(job_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))
}
