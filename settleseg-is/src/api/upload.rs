//! Job intake
//!
//! Accepts a multipart upload, validates what can be checked without
//! touching the archive contents, registers the job and hands it to the
//! scheduler. The archive body is streamed chunk-wise into the job
//! workspace rather than buffered in memory; uploads run up to the
//! configured size cap. Returns 202 immediately; everything slow happens
//! in the background task.

use crate::error::{ApiError, ApiResult};
use crate::models::resolve_model;
use crate::services::job_runner::{run_job, JobContext};
use crate::services::workspace::JobWorkspace;
use crate::AppState;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

pub async fn start_inference(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    // The workspace exists before the body is read so the file field can
    // stream straight to disk. Its drop guard removes it again on every
    // rejection path below.
    let job_id = Uuid::new_v4();
    let workspace = JobWorkspace::create(&state.config.work_dir, job_id)
        .map_err(|e| ApiError::Internal(format!("Failed to allocate workspace: {}", e)))?;

    let mut archive_bytes: Option<u64> = None;
    let mut filename: Option<String> = None;
    let mut model_type: Option<String> = None;
    let mut threshold_raw: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                filename = field.file_name().map(str::to_string);

                let mut file = tokio::fs::File::create(workspace.archive_path())
                    .await
                    .map_err(|e| ApiError::Internal(format!("Failed to store upload: {}", e)))?;
                let mut written: u64 = 0;
                while let Some(chunk) = field.chunk().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read upload: {}", e))
                })? {
                    file.write_all(&chunk).await.map_err(|e| {
                        ApiError::Internal(format!("Failed to store upload: {}", e))
                    })?;
                    written += chunk.len() as u64;
                }
                file.flush()
                    .await
                    .map_err(|e| ApiError::Internal(format!("Failed to store upload: {}", e)))?;
                archive_bytes = Some(written);
            }
            Some("model_type") => {
                model_type = Some(read_text(field).await?);
            }
            Some("threshold") => {
                threshold_raw = Some(read_text(field).await?);
            }
            _ => {}
        }
    }

    let archive_bytes =
        archive_bytes.ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;
    let filename =
        filename.ok_or_else(|| ApiError::BadRequest("Uploaded file has no filename".to_string()))?;
    if archive_bytes == 0 {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }

    let model_type =
        model_type.ok_or_else(|| ApiError::BadRequest("Missing model_type field".to_string()))?;
    if resolve_model(&model_type).is_none() {
        return Err(ApiError::BadRequest(format!(
            "Unknown model type: {}",
            model_type
        )));
    }

    let threshold = match threshold_raw {
        Some(raw) => {
            let value: f32 = raw
                .trim()
                .parse()
                .map_err(|_| ApiError::BadRequest(format!("Invalid threshold: {}", raw)))?;
            if !(0.0..=1.0).contains(&value) {
                return Err(ApiError::BadRequest(format!(
                    "Threshold {} outside [0, 1]",
                    value
                )));
            }
            value
        }
        None => state.config.default_threshold,
    };

    state.registry.create(job_id);
    info!(
        job_id = %job_id,
        filename = %filename,
        model_type = %model_type,
        threshold,
        bytes = archive_bytes,
        "Job accepted"
    );

    let ctx = JobContext {
        config: state.config.clone(),
        registry: state.registry.clone(),
        models: state.models.clone(),
        reader: state.reader.clone(),
    };
    state
        .scheduler
        .spawn(job_id, run_job(ctx, job_id, model_type, threshold, workspace));

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "job_id": job_id, "status": "pending" })),
    ))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart field: {}", e)))
}
