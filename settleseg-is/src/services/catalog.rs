//! Tile catalog builder
//!
//! Validates an extracted upload against the modality the selected model
//! requires, cross-checks that every modality has a matching tile for every
//! identifier, and parses identifiers into grid coordinates. Identifiers
//! that do not follow the `<prefix>_<x>_<y>` convention are skipped with a
//! warning; they are not a job failure by themselves.

use crate::error::PipelineError;
use crate::models::{parse_grid_coords, Modality, TileRecord};
use crate::services::tile_reader::TileReader;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const TILE_EXTENSION: &str = "tif";
/// How many missing tiles a validation error names before truncating
const MISSING_TILE_PREVIEW: usize = 5;

/// Build the tile catalog for one job
pub fn build_catalog(
    extract_root: &Path,
    modality: Modality,
    reader: &dyn TileReader,
) -> Result<Vec<TileRecord>, PipelineError> {
    let data_root = find_data_root(extract_root, modality)?;
    let required = modality.required_dirs();

    // Every required directory must exist and hold at least one tile
    let mut missing_dirs = Vec::new();
    for dir in required {
        let path = data_root.join(dir);
        if !path.is_dir() || tile_stems(&path)?.is_empty() {
            missing_dirs.push(*dir);
        }
    }
    if !missing_dirs.is_empty() {
        return Err(PipelineError::Validation(format!(
            "Upload is missing required tile directories: {}",
            missing_dirs.join(", ")
        )));
    }

    // Enumerate from the reference modality, then verify the others match
    let reference_dir = modality.reference_dir();
    let ids = tile_stems(&data_root.join(reference_dir))?;

    for dir in required.iter().filter(|d| **d != reference_dir) {
        let missing: Vec<&str> = ids
            .iter()
            .filter(|id| !data_root.join(dir).join(tile_file(id)).exists())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            let preview: Vec<&str> = missing.iter().take(MISSING_TILE_PREVIEW).copied().collect();
            return Err(PipelineError::Validation(format!(
                "Directory {} is missing {} tile(s), e.g. {}",
                dir,
                missing.len(),
                preview.join(", ")
            )));
        }
    }

    let mut tiles = Vec::with_capacity(ids.len());
    for id in &ids {
        let Some((grid_x, grid_y)) = parse_grid_coords(id) else {
            warn!(tile_id = %id, "Skipping tile with unparseable grid coordinates");
            continue;
        };

        let reference_path = data_root.join(reference_dir).join(tile_file(id));
        let meta = reader.read_geo(&reference_path).map_err(|e| {
            PipelineError::Validation(format!(
                "Reference raster {} is not georeferenced: {}",
                reference_path.display(),
                e
            ))
        })?;

        let mut sources = BTreeMap::new();
        for dir in required {
            sources.insert(dir.to_string(), data_root.join(dir).join(tile_file(id)));
        }

        tiles.push(TileRecord {
            id: id.clone(),
            grid_x,
            grid_y,
            sources,
            bounds: meta.bounds,
            transform: meta.transform,
            crs: meta.crs,
        });
    }

    debug!(
        tiles = tiles.len(),
        enumerated = ids.len(),
        "Tile catalog built"
    );
    Ok(tiles)
}

/// Locate the directory holding the modality subdirectories.
///
/// Archives commonly wrap their content in a single top-level folder; accept
/// the extraction root itself or any directory one level below it.
fn find_data_root(extract_root: &Path, modality: Modality) -> Result<PathBuf, PipelineError> {
    let required = modality.required_dirs();
    let has_any = |root: &Path| required.iter().any(|d| root.join(d).is_dir());

    if has_any(extract_root) {
        return Ok(extract_root.to_path_buf());
    }
    for entry in std::fs::read_dir(extract_root)? {
        let path = entry?.path();
        if path.is_dir() && has_any(&path) {
            return Ok(path);
        }
    }
    Err(PipelineError::Validation(format!(
        "Upload is missing required tile directories: {}",
        required.join(", ")
    )))
}

fn tile_file(id: &str) -> String {
    format!("{}.{}", id, TILE_EXTENSION)
}

/// Sorted tile identifiers (file stems) in a modality directory
fn tile_stems(dir: &Path) -> Result<Vec<String>, PipelineError> {
    let mut stems = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(TILE_EXTENSION) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push(stem.to_string());
            }
        }
    }
    stems.sort();
    Ok(stems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{GeoMetadata, RasterError, TileRaster};
    use settleseg_common::geo::{Crs, GeoTransform};
    use tempfile::TempDir;

    /// Reader that fabricates georeferencing from the tile's grid position
    struct StubReader;

    impl TileReader for StubReader {
        fn read_geo(&self, path: &Path) -> Result<GeoMetadata, RasterError> {
            let stem = path.file_stem().unwrap().to_str().unwrap();
            let (x, y) = parse_grid_coords(stem).unwrap_or((0, 0));
            let transform =
                GeoTransform::from_origin(x as f64, -(y as f64), 1.0 / 256.0, 1.0 / 256.0);
            Ok(GeoMetadata {
                width: 256,
                height: 256,
                bounds: transform.bounds(256, 256),
                transform,
                crs: Crs::epsg(4326),
            })
        }

        fn read(&self, _path: &Path) -> Result<TileRaster, RasterError> {
            unimplemented!("catalog tests never read pixels")
        }
    }

    fn touch(root: &Path, dir: &str, id: &str) {
        let dir_path = root.join(dir);
        std::fs::create_dir_all(&dir_path).unwrap();
        std::fs::write(dir_path.join(format!("{}.tif", id)), b"tile").unwrap();
    }

    #[test]
    fn builds_catalog_for_complete_tile_set() {
        let tmp = TempDir::new().unwrap();
        for id in ["qc_0_0", "qc_1_0", "qc_0_1"] {
            touch(tmp.path(), "satellite-256", id);
            touch(tmp.path(), "bc-256", id);
        }

        let tiles = build_catalog(
            tmp.path(),
            Modality::SatelliteBuildingCount,
            &StubReader,
        )
        .unwrap();
        assert_eq!(tiles.len(), 3);
        let t = tiles.iter().find(|t| t.id == "qc_1_0").unwrap();
        assert_eq!((t.grid_x, t.grid_y), (1, 0));
        assert_eq!(t.sources.len(), 2);
    }

    #[test]
    fn missing_required_directory_is_rejected() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "satellite-256", "qc_0_0");

        let err = build_catalog(tmp.path(), Modality::SatelliteBuildingCount, &StubReader)
            .unwrap_err();
        match err {
            PipelineError::Validation(msg) => assert!(msg.contains("bc-256"), "{}", msg),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn incomplete_cross_modality_set_is_rejected() {
        let tmp = TempDir::new().unwrap();
        for id in ["qc_0_0", "qc_1_0"] {
            touch(tmp.path(), "satellite-256", id);
        }
        touch(tmp.path(), "bc-256", "qc_0_0");

        let err = build_catalog(tmp.path(), Modality::SatelliteBuildingCount, &StubReader)
            .unwrap_err();
        match err {
            PipelineError::Validation(msg) => {
                assert!(msg.contains("bc-256"), "{}", msg);
                assert!(msg.contains("qc_1_0"), "{}", msg);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn unparseable_identifiers_are_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "satellite-256", "qc_0_0");
        touch(tmp.path(), "satellite-256", "README");

        let tiles = build_catalog(tmp.path(), Modality::Satellite, &StubReader).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].id, "qc_0_0");
    }

    #[test]
    fn accepts_single_wrapping_directory() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("export");
        touch(&nested, "satellite-256", "qc_2_3");

        let tiles = build_catalog(tmp.path(), Modality::Satellite, &StubReader).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!((tiles[0].grid_x, tiles[0].grid_y), (2, 3));
    }
}
