//! Settlement segmentation service
//!
//! HTTP service that accepts a zip of co-registered GeoTIFF tiles, runs
//! per-tile segmentation inference in a background job, stitches the
//! per-tile masks into one georeferenced composite and serves the result
//! artifacts. Clients poll job status; nothing blocks on inference.

pub mod api;
pub mod compositor;
pub mod error;
pub mod inference;
pub mod models;
pub mod raster;
pub mod services;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use services::{JobRegistry, JobScheduler, ModelCache, TileReader};
use settleseg_common::config::ServiceConfig;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Edge length of every source tile and prediction mask, pixels
pub const TILE_SIZE: usize = 256;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub registry: JobRegistry,
    pub models: Arc<ModelCache>,
    pub scheduler: JobScheduler,
    pub reader: Arc<dyn TileReader>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: ServiceConfig,
        models: Arc<ModelCache>,
        reader: Arc<dyn TileReader>,
    ) -> Self {
        let scheduler = JobScheduler::new(config.max_concurrent_jobs);
        Self {
            config: Arc::new(config),
            registry: JobRegistry::new(),
            models,
            scheduler,
            reader,
            started_at: Instant::now(),
        }
    }
}

/// Build the service router
pub fn build_router(state: AppState) -> Router {
    let max_upload = state.config.max_upload_bytes as usize;
    let results_dir = state.config.results_dir.clone();

    Router::new()
        .route("/inference/start", post(api::upload::start_inference))
        .route("/inference/status/:job_id", get(api::status::job_status))
        .route("/inference/models", get(api::models::list_models))
        .route("/health", get(api::health::health))
        .nest_service("/results", ServeDir::new(results_dir))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
