//! Tile preprocessing
//!
//! Stacks the modality rasters of one tile into a `(channels, height,
//! width)` tensor and applies the per-channel normalization the model was
//! trained with. Satellite bands arrive as 0-255 and are scaled to [0, 1]
//! before normalization; bc/bh rasters are used as raw floats.

use crate::error::PipelineError;
use crate::models::{ModelSpec, TileRecord};
use crate::services::tile_reader::TileReader;
use ndarray::{Array3, Axis};

/// Load, stack and normalize every modality of one tile
pub fn preprocess_tile(
    tile: &TileRecord,
    spec: &ModelSpec,
    reader: &dyn TileReader,
    tile_size: usize,
) -> Result<Array3<f32>, PipelineError> {
    let mean = spec.mean();
    let std = spec.std();
    let mut planes: Vec<ndarray::Array2<f32>> = Vec::with_capacity(spec.modality.channels());

    for dir in spec.modality.required_dirs() {
        let path = tile.sources.get(*dir).ok_or_else(|| tile_error(
            tile,
            format!("no source recorded for modality directory {}", dir),
        ))?;
        let raster = reader
            .read(path)
            .map_err(|e| tile_error(tile, format!("failed to read {}: {}", path.display(), e)))?;

        let is_imagery = *dir == "satellite-256";
        for band in raster.bands {
            let (h, w) = band.dim();
            if h != tile_size || w != tile_size {
                return Err(tile_error(
                    tile,
                    format!(
                        "{} is {}x{}, expected {}x{} tiles",
                        path.display(),
                        w,
                        h,
                        tile_size,
                        tile_size
                    ),
                ));
            }
            planes.push(if is_imagery { band / 255.0 } else { band });
        }
    }

    if planes.len() != spec.modality.channels() {
        return Err(tile_error(
            tile,
            format!(
                "stacked {} channels, model expects {}",
                planes.len(),
                spec.modality.channels()
            ),
        ));
    }

    let mut tensor = Array3::<f32>::zeros((planes.len(), tile_size, tile_size));
    for (c, plane) in planes.into_iter().enumerate() {
        let normalized = (plane - mean[c]) / std[c];
        tensor.index_axis_mut(Axis(0), c).assign(&normalized);
    }
    Ok(tensor)
}

fn tile_error(tile: &TileRecord, message: String) -> PipelineError {
    PipelineError::TileProcessing {
        tile_id: tile.id.clone(),
        message,
    }
}
