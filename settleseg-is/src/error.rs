//! Error types for settleseg-is
//!
//! Two layers: `PipelineError` is the job-processing taxonomy recorded into
//! failed jobs, `ApiError` is the HTTP-facing type with an `IntoResponse`
//! JSON body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use settleseg_common::geo::GeoError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while processing a job
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad or missing input: absent filename, malformed threshold, missing
    /// required tile directories, incomplete tile sets
    #[error("Validation error: {0}")]
    Validation(String),

    /// Payload is not a supported archive format or cannot be extracted
    #[error("Archive error: {0}")]
    Archive(String),

    /// Weights artifact for a known model type is absent on disk
    #[error("Model weights not found: {0}")]
    ModelNotFound(PathBuf),

    /// Model-type key is not in the registry, or the backend cannot
    /// construct an engine from its configuration
    #[error("Model configuration error: {0}")]
    ModelConfig(String),

    /// A single tile failed preprocessing or inference; recovered locally
    #[error("Tile {tile_id} failed: {message}")]
    TileProcessing { tile_id: String, message: String },

    /// The tile loop finished with zero successful masks
    #[error("No tiles were processed successfully")]
    NoTilesProcessed,

    /// Compositor could not produce any output at all
    #[error("Compositing error: {0}")]
    Compositing(String),

    /// Compositor invoked with an empty mask list
    #[error("No prediction masks to composite")]
    EmptyResult,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<GeoError> for PipelineError {
    fn from(e: GeoError) -> Self {
        PipelineError::Compositing(e.to_string())
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Validation(msg) | PipelineError::Archive(msg) => {
                ApiError::BadRequest(msg)
            }
            PipelineError::ModelConfig(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
