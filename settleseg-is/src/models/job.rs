//! Job lifecycle state machine
//!
//! A job progresses `Pending → Processing → {Completed | Failed}`. The two
//! terminal states are reached exactly once and the record is never mutated
//! afterwards; the registry enforces both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settleseg_common::geo::Crs;
use uuid::Uuid;

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, background work not started yet
    Pending,
    /// Background worker is running
    Processing,
    /// Finished with a result payload
    Completed,
    /// Finished with an error detail
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One job's progress record, snapshotted to polling clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: Uuid,
    pub status: JobStatus,
    /// Progress fraction in [0, 1], monotonically non-decreasing
    pub progress: f64,
    /// Human-readable description of the current stage
    pub message: String,
    pub tiles_total: usize,
    pub tiles_processed: usize,
    /// Result payload, set on completion
    pub result: Option<JobResult>,
    /// Error detail, set on failure
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            progress: 0.0,
            message: "Queued".to_string(),
            tiles_total: 0,
            tiles_processed: 0,
            result: None,
            error: None,
            created_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Result payload of a completed job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// URL path of the composite GeoTIFF under `/results`
    pub file: String,
    /// URL path of the 8-bit grayscale visualization PNG
    pub visualization: String,
    /// URL path of the persisted Leaflet overlay descriptor
    pub overlay_config: String,
    pub crs: Crs,
    /// West / south / east / north in the output CRS
    pub bounds: [f64; 4],
    /// Tile-grid extent as (columns, rows)
    pub tile_grid: (usize, usize),
    /// Composite pixel dimensions as (width, height)
    pub dimensions: (usize, usize),
    pub tile_count: usize,
}

/// Map-overlay configuration persisted alongside the raster for the
/// web frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafletOverlay {
    pub tiff_url: String,
    /// `[[south, west], [north, east]]` in geographic coordinates
    pub bounds: [[f64; 2]; 2],
    /// `[lat, lon]` midpoint of the bounds
    pub center: [f64; 2],
    pub zoom: ZoomRange,
    pub tile_grid: (usize, usize),
    pub dimensions: (usize, usize),
    pub tile_count: usize,
    pub crs: Crs,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: u8,
    pub max: u8,
    pub default: u8,
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self {
            min: 10,
            max: 18,
            default: 14,
        }
    }
}
