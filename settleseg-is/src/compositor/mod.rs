//! Composite assembly
//!
//! Stitches per-tile binary masks into one georeferenced raster. The output
//! canvas is sized from the tile-grid extent, its geography from the union
//! of the tile bounds, and each mask is placed by its own georeferencing, so
//! gaps in the grid stay zero and slightly misaligned tiles land on the
//! nearest pixel. Reprojection to the configured target CRS is attempted
//! afterwards; when no conversion path exists the composite stays in the
//! native CRS of the tiles rather than failing the job.

mod reproject;

pub use reproject::reproject_nearest;

use crate::error::PipelineError;
use crate::models::{GridExtent, TileRecord};
use ndarray::Array2;
use settleseg_common::geo::{BoundingBox, Crs, GeoTransform};
use tracing::{info, warn};

/// A stitched, georeferenced segmentation raster
pub struct CompositeRaster {
    /// Mask values, 0 or 1, row-major `(height, width)`
    pub data: Array2<u8>,
    pub transform: GeoTransform,
    pub bounds: BoundingBox,
    pub crs: Crs,
    /// Grid extent as (columns, rows)
    pub tile_grid: (usize, usize),
    pub tile_count: usize,
}

impl CompositeRaster {
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }
}

/// Stitch the per-tile masks into one composite in the tiles' native CRS,
/// then reproject to `target_crs` when a conversion path exists.
pub fn compose(
    masks: &[(&TileRecord, Array2<u8>)],
    tile_size: usize,
    target_crs: &Crs,
) -> Result<CompositeRaster, PipelineError> {
    let composite = compose_native(masks, tile_size)?;

    if composite.crs.same_as(target_crs) {
        return Ok(composite);
    }
    match reproject_nearest(&composite, target_crs) {
        Ok(reprojected) => Ok(reprojected),
        Err(e) => {
            warn!(
                from = %composite.crs,
                to = %target_crs,
                error = %e,
                "Reprojection unavailable, keeping native CRS"
            );
            Ok(composite)
        }
    }
}

/// Stitch without reprojection
fn compose_native(
    masks: &[(&TileRecord, Array2<u8>)],
    tile_size: usize,
) -> Result<CompositeRaster, PipelineError> {
    if masks.is_empty() {
        return Err(PipelineError::EmptyResult);
    }

    let coords: Vec<(i64, i64)> = masks
        .iter()
        .map(|(tile, _)| (tile.grid_x, tile.grid_y))
        .collect();
    let extent = GridExtent::of(&coords).ok_or(PipelineError::EmptyResult)?;
    let out_width = extent.width() * tile_size;
    let out_height = extent.height() * tile_size;

    let bounds = BoundingBox::union_all(masks.iter().map(|(tile, _)| &tile.bounds))
        .ok_or(PipelineError::EmptyResult)?;
    let pixel_width = bounds.width() / out_width as f64;
    let pixel_height = bounds.height() / out_height as f64;
    if !(pixel_width > 0.0 && pixel_height > 0.0)
        || !pixel_width.is_finite()
        || !pixel_height.is_finite()
    {
        return Err(PipelineError::Compositing(format!(
            "degenerate union bounds {:?}",
            bounds
        )));
    }
    let transform = GeoTransform::from_origin(bounds.left, bounds.top, pixel_width, pixel_height);

    let mut canvas = Array2::<u8>::zeros((out_height, out_width));
    for (tile, mask) in masks {
        if mask.dim() != (tile_size, tile_size) {
            warn!(
                tile_id = %tile.id,
                rows = mask.nrows(),
                cols = mask.ncols(),
                "Skipping mask with unexpected dimensions"
            );
            continue;
        }

        // Place by georeferencing, snapped to the canvas grid and clamped so
        // the whole tile stays inside the composite
        let offset_x = ((tile.bounds.left - bounds.left) / pixel_width).round() as i64;
        let offset_y = ((bounds.top - tile.bounds.top) / pixel_height).round() as i64;
        let offset_x = offset_x.clamp(0, (out_width - tile_size) as i64) as usize;
        let offset_y = offset_y.clamp(0, (out_height - tile_size) as i64) as usize;

        for r in 0..tile_size {
            for c in 0..tile_size {
                canvas[[offset_y + r, offset_x + c]] = mask[[r, c]];
            }
        }
    }

    let crs = masks[0].0.crs.clone();
    info!(
        width = out_width,
        height = out_height,
        tiles = masks.len(),
        grid_cols = extent.width(),
        grid_rows = extent.height(),
        crs = %crs,
        "Composite assembled"
    );

    Ok(CompositeRaster {
        data: canvas,
        transform,
        bounds,
        crs,
        tile_grid: (extent.width(), extent.height()),
        tile_count: masks.len(),
    })
}
