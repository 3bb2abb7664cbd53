//! Service layer: job tracking, model management and the inference pipeline

pub mod catalog;
pub mod job_registry;
pub mod job_runner;
pub mod materializer;
pub mod model_cache;
pub mod preprocess;
pub mod scheduler;
pub mod tile_reader;
pub mod workspace;

pub use job_registry::JobRegistry;
pub use model_cache::{CachedModel, ModelCache};
pub use scheduler::JobScheduler;
pub use tile_reader::{GeoTiffTileReader, TileReader};
pub use workspace::JobWorkspace;
