//! Raster codecs: GeoTIFF read/write and PNG visualization output

mod geotiff;
mod png;

pub use geotiff::{read_geo_metadata, read_geotiff, write_geotiff_gray8, GeoMetadata, TileRaster};
pub use png::write_visualization_png;

use thiserror::Error;

/// Raster codec errors
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("TIFF codec error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("PNG encoding error: {0}")]
    Png(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing georeferencing tags in {0}")]
    MissingGeoTags(std::path::PathBuf),

    #[error("Unsupported raster layout: {0}")]
    Unsupported(String),
}
