//! Source tile reader seam
//!
//! Raster decoding is an external concern; the catalog and preprocessing
//! stages consume this trait so tests can substitute synthetic readers.

use crate::raster::{self, GeoMetadata, RasterError, TileRaster};
use std::path::Path;

/// Reads source tiles and their georeferencing
pub trait TileReader: Send + Sync {
    /// Read georeferencing only (cheap, used at catalog-build time)
    fn read_geo(&self, path: &Path) -> Result<GeoMetadata, RasterError>;

    /// Read pixel bands plus georeferencing
    fn read(&self, path: &Path) -> Result<TileRaster, RasterError>;
}

/// Production reader backed by the GeoTIFF codec
#[derive(Default)]
pub struct GeoTiffTileReader;

impl TileReader for GeoTiffTileReader {
    fn read_geo(&self, path: &Path) -> Result<GeoMetadata, RasterError> {
        raster::read_geo_metadata(path)
    }

    fn read(&self, path: &Path) -> Result<TileRaster, RasterError> {
        raster::read_geotiff(path)
    }
}
