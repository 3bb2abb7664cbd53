//! Background inference pipeline
//!
//! One run per job: load the model, extract the upload, catalog the tiles,
//! run inference tile by tile, stitch, persist. Progress checkpoints are
//! written to the registry at every stage so polling clients see movement
//! even for single-tile jobs. The raster and model work is CPU-bound and
//! runs on the blocking pool.
//!
//! A tile that fails to preprocess or infer is logged and skipped; the job
//! fails only when no tile at all produced a mask.

use crate::compositor;
use crate::error::PipelineError;
use crate::models::{JobResult, JobStatus, TileRecord};
use crate::services::catalog::build_catalog;
use crate::services::job_registry::JobRegistry;
use crate::services::model_cache::ModelCache;
use crate::services::preprocess::preprocess_tile;
use crate::services::tile_reader::TileReader;
use crate::services::workspace::JobWorkspace;
use ndarray::Array2;
use settleseg_common::config::ServiceConfig;
use settleseg_common::geo::Crs;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

const PROGRESS_MODEL_LOADED: f64 = 0.05;
const PROGRESS_EXTRACTED: f64 = 0.10;
const PROGRESS_CATALOGED: f64 = 0.15;
/// Fraction of the progress range spanned by the tile loop
const PROGRESS_TILE_SPAN: f64 = 0.75;
const PROGRESS_MERGING: f64 = 0.92;

/// Everything the pipeline needs besides per-job inputs
#[derive(Clone)]
pub struct JobContext {
    pub config: Arc<ServiceConfig>,
    pub registry: JobRegistry,
    pub models: Arc<ModelCache>,
    pub reader: Arc<dyn TileReader>,
}

/// Drive one job to a terminal state. Never returns an error; failures are
/// recorded in the registry for the polling client.
pub async fn run_job(
    ctx: JobContext,
    job_id: Uuid,
    model_type: String,
    threshold: f32,
    workspace: JobWorkspace,
) {
    ctx.registry.update(job_id, |job| {
        job.status = JobStatus::Processing;
        job.message = "Loading model".to_string();
    });

    let blocking_ctx = ctx.clone();
    let blocking_model = model_type.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        execute(blocking_ctx, job_id, &blocking_model, threshold, workspace)
    })
    .await;

    match outcome {
        Ok(Ok(result)) => {
            info!(job_id = %job_id, file = %result.file, "Job completed");
            ctx.registry.update(job_id, |job| {
                job.status = JobStatus::Completed;
                job.message = "Completed".to_string();
                job.result = Some(result);
            });
        }
        Ok(Err(e)) => {
            warn!(job_id = %job_id, error = %e, "Job failed");
            ctx.registry.update(job_id, |job| {
                job.status = JobStatus::Failed;
                job.message = "Failed".to_string();
                job.error = Some(e.to_string());
            });
        }
        Err(e) => {
            // The blocking task panicked or was cancelled
            error!(job_id = %job_id, error = %e, "Job task aborted");
            ctx.registry.update(job_id, |job| {
                job.status = JobStatus::Failed;
                job.message = "Failed".to_string();
                job.error = Some("internal error".to_string());
            });
        }
    }
}

/// The synchronous pipeline body. The workspace is removed on every exit
/// path, including panics, through its drop guard.
fn execute(
    ctx: JobContext,
    job_id: Uuid,
    model_type: &str,
    threshold: f32,
    mut workspace: JobWorkspace,
) -> Result<JobResult, PipelineError> {
    let model = ctx.models.get_or_load(model_type)?;
    ctx.registry.update(job_id, |job| {
        job.progress = PROGRESS_MODEL_LOADED;
        job.message = "Extracting upload".to_string();
    });

    let extract_root = workspace.extract_archive()?;
    ctx.registry.update(job_id, |job| {
        job.progress = PROGRESS_EXTRACTED;
        job.message = "Validating tiles".to_string();
    });

    let catalog = build_catalog(&extract_root, model.spec.modality, ctx.reader.as_ref())?;
    if catalog.is_empty() {
        return Err(PipelineError::Validation(
            "Upload contains no usable tiles".to_string(),
        ));
    }
    let total = catalog.len();
    ctx.registry.update(job_id, |job| {
        job.progress = PROGRESS_CATALOGED;
        job.tiles_total = total;
        job.message = format!("Running inference on {} tiles", total);
    });

    let mut masks: Vec<(&TileRecord, Array2<u8>)> = Vec::with_capacity(total);
    for (index, tile) in catalog.iter().enumerate() {
        match infer_tile(tile, &model, ctx.reader.as_ref(), threshold) {
            Ok(mask) => masks.push((tile, mask)),
            Err(e) => {
                warn!(job_id = %job_id, tile_id = %tile.id, error = %e, "Tile skipped");
            }
        }
        let done = index + 1;
        ctx.registry.update(job_id, |job| {
            job.tiles_processed = done;
            job.progress = PROGRESS_CATALOGED + PROGRESS_TILE_SPAN * done as f64 / total as f64;
        });
    }
    if masks.is_empty() {
        return Err(PipelineError::NoTilesProcessed);
    }
    if masks.len() < total {
        info!(
            job_id = %job_id,
            succeeded = masks.len(),
            total,
            "Compositing a partial tile set"
        );
    }

    ctx.registry.update(job_id, |job| {
        job.progress = PROGRESS_MERGING;
        job.message = "Merging tiles".to_string();
    });
    let target_crs = Crs::new(ctx.config.target_crs.clone());
    let composite = compositor::compose(&masks, crate::TILE_SIZE, &target_crs)?;
    let result = crate::services::materializer::materialize(
        &composite,
        model_type,
        &ctx.config.results_dir,
    )?;

    workspace.cleanup();
    Ok(result)
}

/// Preprocess one tile, run it through the engine and threshold the
/// probability map into a binary mask.
fn infer_tile(
    tile: &TileRecord,
    model: &crate::services::model_cache::CachedModel,
    reader: &dyn TileReader,
    threshold: f32,
) -> Result<Array2<u8>, PipelineError> {
    let tensor = preprocess_tile(tile, model.spec, reader, crate::TILE_SIZE)?;
    let probabilities = model.engine.infer(&tensor)?;
    Ok(probabilities.mapv(|p| u8::from(p >= threshold)))
}
