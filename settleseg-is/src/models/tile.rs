//! Tile catalog records

use serde::{Deserialize, Serialize};
use settleseg_common::geo::{BoundingBox, Crs, GeoTransform};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One co-registered tile within a job's upload
#[derive(Debug, Clone)]
pub struct TileRecord {
    /// Identifier, e.g. `qc_12_34`
    pub id: String,
    /// Grid column parsed from the identifier
    pub grid_x: i64,
    /// Grid row parsed from the identifier
    pub grid_y: i64,
    /// Source file per modality directory
    pub sources: BTreeMap<String, PathBuf>,
    /// Geographic bounds read from the reference raster
    pub bounds: BoundingBox,
    /// Pixel-to-geography transform of the reference raster
    pub transform: GeoTransform,
    /// CRS of the reference raster
    pub crs: Crs,
}

/// Inclusive grid extent of a tile set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridExtent {
    pub min_x: i64,
    pub max_x: i64,
    pub min_y: i64,
    pub max_y: i64,
}

impl GridExtent {
    /// Extent covering every tile's grid coordinates; `None` for an empty set
    pub fn of(tiles: &[(i64, i64)]) -> Option<Self> {
        let first = *tiles.first()?;
        let mut extent = GridExtent {
            min_x: first.0,
            max_x: first.0,
            min_y: first.1,
            max_y: first.1,
        };
        for &(x, y) in &tiles[1..] {
            extent.min_x = extent.min_x.min(x);
            extent.max_x = extent.max_x.max(x);
            extent.min_y = extent.min_y.min(y);
            extent.max_y = extent.max_y.max(y);
        }
        Some(extent)
    }

    pub fn width(&self) -> usize {
        (self.max_x - self.min_x + 1) as usize
    }

    pub fn height(&self) -> usize {
        (self.max_y - self.min_y + 1) as usize
    }
}

/// Parse a tile identifier of the form `<prefix>_<x>_<y>` into grid
/// coordinates. Returns `None` for identifiers that do not match; callers
/// skip those rather than failing the job.
pub fn parse_grid_coords(id: &str) -> Option<(i64, i64)> {
    let mut parts = id.rsplitn(3, '_');
    let y = parts.next()?.parse::<i64>().ok()?;
    let x = parts.next()?.parse::<i64>().ok()?;
    // The remainder is the prefix; it must be non-empty
    let prefix = parts.next()?;
    if prefix.is_empty() {
        return None;
    }
    Some((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_identifiers() {
        assert_eq!(parse_grid_coords("qc_12_34"), Some((12, 34)));
        assert_eq!(parse_grid_coords("t_0_0"), Some((0, 0)));
        assert_eq!(parse_grid_coords("multi_part_prefix_3_7"), Some((3, 7)));
        assert_eq!(parse_grid_coords("tile_-1_2"), Some((-1, 2)));
    }

    #[test]
    fn rejects_malformed_identifiers() {
        assert_eq!(parse_grid_coords("sample_003"), None);
        assert_eq!(parse_grid_coords("12_34"), None);
        assert_eq!(parse_grid_coords("_12_34"), None);
        assert_eq!(parse_grid_coords("tile_a_b"), None);
        assert_eq!(parse_grid_coords("plain"), None);
    }

    #[test]
    fn grid_extent_covers_all() {
        let coords = vec![(0, 0), (3, 1), (-2, 5)];
        let extent = GridExtent::of(&coords).unwrap();
        assert_eq!(extent.min_x, -2);
        assert_eq!(extent.max_x, 3);
        assert_eq!(extent.width(), 6);
        assert_eq!(extent.height(), 6);
        assert!(GridExtent::of(&[]).is_none());
    }
}
