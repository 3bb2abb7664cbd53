//! Result materialization
//!
//! Persists a finished composite as three artifacts in the results
//! directory: the georeferenced GeoTIFF, an 8-bit grayscale PNG for quick
//! inspection, and a Leaflet overlay descriptor the web frontend reads.
//! Artifacts share one timestamped base name so a directory listing groups
//! them naturally.

use crate::compositor::CompositeRaster;
use crate::error::PipelineError;
use crate::models::{JobResult, LeafletOverlay, ZoomRange};
use crate::raster;
use settleseg_common::geo::{Crs, CrsTransformer};
use std::path::Path;
use tracing::{info, warn};

const RESULTS_URL_PREFIX: &str = "/results";

/// Write all result artifacts for a composite and describe them as the
/// job's result payload.
pub fn materialize(
    composite: &CompositeRaster,
    model_type: &str,
    results_dir: &Path,
) -> Result<JobResult, PipelineError> {
    let base = format!(
        "predictions_{}_{}tiles_{}",
        model_type,
        composite.tile_count,
        chrono::Utc::now().timestamp()
    );
    let tiff_name = format!("{}.tif", base);
    let png_name = format!("{}_viz.png", base);
    let overlay_name = format!("{}_overlay.json", base);

    let tiff_path = results_dir.join(&tiff_name);
    let png_path = results_dir.join(&png_name);
    let overlay_path = results_dir.join(&overlay_name);

    raster::write_geotiff_gray8(
        &tiff_path,
        &composite.data,
        &composite.transform,
        &composite.crs,
    )
    .map_err(|e| PipelineError::Compositing(format!("failed to write GeoTIFF: {}", e)))?;

    if let Err(e) = raster::write_visualization_png(&png_path, &composite.data) {
        remove_partial(&[&tiff_path]);
        return Err(PipelineError::Compositing(format!(
            "failed to write PNG: {}",
            e
        )));
    }

    let overlay = build_overlay(composite, &format!("{}/{}", RESULTS_URL_PREFIX, tiff_name));
    let overlay_json = match serde_json::to_string_pretty(&overlay) {
        Ok(json) => json,
        Err(e) => {
            remove_partial(&[&tiff_path, &png_path]);
            return Err(PipelineError::Compositing(format!(
                "failed to encode overlay: {}",
                e
            )));
        }
    };
    if let Err(e) = std::fs::write(&overlay_path, overlay_json) {
        remove_partial(&[&tiff_path, &png_path]);
        return Err(e.into());
    }

    info!(
        tiff = %tiff_path.display(),
        width = composite.width(),
        height = composite.height(),
        "Result artifacts written"
    );

    Ok(JobResult {
        file: format!("{}/{}", RESULTS_URL_PREFIX, tiff_name),
        visualization: format!("{}/{}", RESULTS_URL_PREFIX, png_name),
        overlay_config: format!("{}/{}", RESULTS_URL_PREFIX, overlay_name),
        crs: composite.crs.clone(),
        bounds: [
            composite.bounds.left,
            composite.bounds.bottom,
            composite.bounds.right,
            composite.bounds.top,
        ],
        tile_grid: composite.tile_grid,
        dimensions: (composite.width(), composite.height()),
        tile_count: composite.tile_count,
    })
}

/// Remove artifacts written before a later write failed, so a failed job
/// leaves nothing behind in the results directory.
fn remove_partial(paths: &[&Path]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove partial result artifact"
            );
        }
    }
}

/// Leaflet wants geographic corner coordinates. When the composite CRS has
/// no path back to EPSG:4326 the raw bounds are passed through unchanged;
/// the frontend then shows the overlay misplaced rather than not at all.
fn build_overlay(composite: &CompositeRaster, tiff_url: &str) -> LeafletOverlay {
    let wgs84 = Crs::epsg(4326);
    let geo_bounds = CrsTransformer::new(&composite.crs, &wgs84)
        .and_then(|t| t.transform_bounds(&composite.bounds))
        .unwrap_or_else(|e| {
            warn!(
                crs = %composite.crs,
                error = %e,
                "Cannot express bounds in geographic coordinates, using raw values"
            );
            composite.bounds
        });
    let (center_x, center_y) = geo_bounds.center();

    LeafletOverlay {
        tiff_url: tiff_url.to_string(),
        bounds: [
            [geo_bounds.bottom, geo_bounds.left],
            [geo_bounds.top, geo_bounds.right],
        ],
        center: [center_y, center_x],
        zoom: ZoomRange::default(),
        tile_grid: composite.tile_grid,
        dimensions: (composite.width(), composite.height()),
        tile_count: composite.tile_count,
        crs: composite.crs.clone(),
        format: "image/tiff".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use settleseg_common::geo::GeoTransform;
    use tempfile::TempDir;

    fn composite() -> CompositeRaster {
        let transform = GeoTransform::from_origin(10.0, 50.0, 0.25, 0.25);
        let mut data = Array2::<u8>::zeros((8, 8));
        data[[0, 0]] = 1;
        CompositeRaster {
            bounds: transform.bounds(8, 8),
            data,
            transform,
            crs: Crs::epsg(4326),
            tile_grid: (2, 1),
            tile_count: 2,
        }
    }

    #[test]
    fn writes_all_three_artifacts() {
        let dir = TempDir::new().unwrap();
        let result = materialize(&composite(), "settlenet", dir.path()).unwrap();

        assert!(result.file.starts_with("/results/predictions_settlenet_2tiles_"));
        assert!(result.file.ends_with(".tif"));
        assert!(result.visualization.ends_with("_viz.png"));
        assert!(result.overlay_config.ends_with("_overlay.json"));
        assert_eq!(result.bounds, [10.0, 48.0, 12.0, 50.0]);
        assert_eq!(result.dimensions, (8, 8));

        for url in [&result.file, &result.visualization, &result.overlay_config] {
            let name = url.strip_prefix("/results/").unwrap();
            assert!(dir.path().join(name).exists(), "{} missing", name);
        }

        // The GeoTIFF round-trips its georeferencing
        let name = result.file.strip_prefix("/results/").unwrap();
        let meta = raster::read_geo_metadata(&dir.path().join(name)).unwrap();
        assert_eq!(meta.crs, Crs::epsg(4326));
        assert_eq!(meta.width, 8);
    }

    #[test]
    fn overlay_uses_geographic_corner_order() {
        let dir = TempDir::new().unwrap();
        let result = materialize(&composite(), "settlenet", dir.path()).unwrap();

        let name = result.overlay_config.strip_prefix("/results/").unwrap();
        let text = std::fs::read_to_string(dir.path().join(name)).unwrap();
        let overlay: LeafletOverlay = serde_json::from_str(&text).unwrap();

        // [[south, west], [north, east]] and [lat, lon] center
        assert_eq!(overlay.bounds, [[48.0, 10.0], [50.0, 12.0]]);
        assert_eq!(overlay.center, [49.0, 11.0]);
        assert_eq!(overlay.tiff_url, result.file);
        assert_eq!(overlay.format, "image/tiff");
    }

    #[test]
    fn partial_write_failure_removes_earlier_artifacts() {
        let dir = TempDir::new().unwrap();
        // Occupy every PNG path the call could pick, so the PNG write fails
        // after the GeoTIFF has already been written
        let now = chrono::Utc::now().timestamp();
        for ts in now..now + 3 {
            std::fs::create_dir(
                dir.path()
                    .join(format!("predictions_settlenet_2tiles_{}_viz.png", ts)),
            )
            .unwrap();
        }

        let err = materialize(&composite(), "settlenet", dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Compositing(_)));

        // No orphaned files remain, only the pre-created directories
        let stray_files = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|entry| entry.as_ref().unwrap().file_type().unwrap().is_file())
            .count();
        assert_eq!(stray_files, 0);
    }

    #[test]
    fn mercator_composite_gets_geographic_overlay_bounds() {
        let dir = TempDir::new().unwrap();
        let transform = GeoTransform::from_origin(0.0, 100_000.0, 1000.0, 1000.0);
        let merc = CompositeRaster {
            bounds: transform.bounds(4, 4),
            data: Array2::ones((4, 4)),
            transform,
            crs: Crs::epsg(3857),
            tile_grid: (1, 1),
            tile_count: 1,
        };
        let result = materialize(&merc, "convnext_all", dir.path()).unwrap();

        let name = result.overlay_config.strip_prefix("/results/").unwrap();
        let overlay: LeafletOverlay =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(name)).unwrap())
                .unwrap();
        // Result bounds stay in metres, overlay bounds are degrees
        assert!(result.bounds[2] >= 4000.0);
        assert!(overlay.bounds[1][1] < 1.0 && overlay.bounds[1][1] > 0.0);
    }
}
