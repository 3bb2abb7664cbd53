//! Geospatial primitives shared across settleseg services
//!
//! North-up rasters only: the tile pipeline never produces rotated or
//! sheared transforms, so the affine type carries pixel sizes and an origin
//! rather than a full 6-parameter matrix.

mod bounds;
mod crs;
mod transform;

pub use bounds::BoundingBox;
pub use crs::{parse_epsg_code, Crs, CrsTransformer, GeoError};
pub use transform::GeoTransform;
