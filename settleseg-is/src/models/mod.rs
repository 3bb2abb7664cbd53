//! Data model types for settleseg-is

mod job;
mod model_spec;
mod tile;

pub use job::{Job, JobResult, JobStatus, LeafletOverlay, ZoomRange};
pub use model_spec::{model_registry, resolve_model, Modality, ModelSpec};
pub use tile::{parse_grid_coords, GridExtent, TileRecord};
