//! Nearest-neighbor raster reprojection
//!
//! Masks are categorical, so resampling must not interpolate: every output
//! pixel takes the value of the nearest source pixel. Pixel counts are
//! preserved; only the geography of the grid changes.

use super::CompositeRaster;
use ndarray::Array2;
use settleseg_common::geo::{Crs, CrsTransformer, GeoError, GeoTransform};
use tracing::debug;

/// Reproject a composite to `target_crs` with nearest-neighbor sampling.
///
/// Fails when no conversion path exists for the CRS pair or the transformed
/// bounds degenerate; the caller decides whether that is fatal.
pub fn reproject_nearest(
    source: &CompositeRaster,
    target_crs: &Crs,
) -> Result<CompositeRaster, GeoError> {
    let forward = CrsTransformer::new(&source.crs, target_crs)?;
    let inverse = CrsTransformer::new(target_crs, &source.crs)?;

    let bounds = forward.transform_bounds(&source.bounds)?;
    let width = source.width();
    let height = source.height();
    let pixel_width = bounds.width() / width as f64;
    let pixel_height = bounds.height() / height as f64;
    if !(pixel_width > 0.0 && pixel_height > 0.0)
        || !pixel_width.is_finite()
        || !pixel_height.is_finite()
    {
        return Err(GeoError::Projection(format!(
            "reprojected bounds are degenerate: {:?}",
            bounds
        )));
    }
    let transform = GeoTransform::from_origin(bounds.left, bounds.top, pixel_width, pixel_height);

    // For every output pixel, find where its center lies in the source grid
    let mut data = Array2::<u8>::zeros((height, width));
    for row in 0..height {
        for col in 0..width {
            let (x, y) = transform.apply(col as f64 + 0.5, row as f64 + 0.5);
            let (sx, sy) = inverse.transform(x, y)?;
            let (src_col, src_row) = source.transform.invert(sx, sy);
            let src_col = src_col.floor();
            let src_row = src_row.floor();
            if src_col >= 0.0
                && src_row >= 0.0
                && (src_col as usize) < width
                && (src_row as usize) < height
            {
                data[[row, col]] = source.data[[src_row as usize, src_col as usize]];
            }
        }
    }

    debug!(
        from = %source.crs,
        to = %target_crs,
        width,
        height,
        "Composite reprojected"
    );

    Ok(CompositeRaster {
        data,
        transform,
        bounds,
        crs: target_crs.clone(),
        tile_grid: source.tile_grid,
        tile_count: source.tile_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use settleseg_common::geo::BoundingBox;

    fn composite_4326(data: Array2<u8>) -> CompositeRaster {
        let (height, width) = data.dim();
        let transform =
            GeoTransform::from_origin(10.0, 50.0, 1.0 / width as f64, 1.0 / height as f64);
        CompositeRaster {
            bounds: transform.bounds(width, height),
            data,
            transform,
            crs: Crs::epsg(4326),
            tile_grid: (1, 1),
            tile_count: 1,
        }
    }

    #[test]
    fn preserves_dimensions_and_mass() {
        let mut data = Array2::<u8>::zeros((8, 8));
        // Solid left half
        for row in 0..8 {
            for col in 0..4 {
                data[[row, col]] = 1;
            }
        }
        let source = composite_4326(data);
        let out = reproject_nearest(&source, &Crs::epsg(3857)).unwrap();

        assert_eq!((out.width(), out.height()), (8, 8));
        assert!(out.crs.is_web_mercator());
        // A one-degree-square patch at mid latitude keeps its left/right split
        for row in 0..8 {
            assert_eq!(out.data[[row, 0]], 1);
            assert_eq!(out.data[[row, 7]], 0);
        }
    }

    #[test]
    fn identity_pair_copies_values() {
        let mut data = Array2::<u8>::zeros((4, 4));
        data[[1, 2]] = 1;
        let source = composite_4326(data.clone());
        let out = reproject_nearest(&source, &Crs::epsg(4326)).unwrap();
        assert_eq!(out.data, data);
        assert_eq!(out.bounds, source.bounds);
    }

    #[cfg(not(feature = "proj"))]
    #[test]
    fn unsupported_pair_is_an_error() {
        let source = composite_4326(Array2::zeros((4, 4)));
        assert!(matches!(
            reproject_nearest(&source, &Crs::epsg(32654)),
            Err(GeoError::Unsupported { .. })
        ));
    }

    #[test]
    fn bounds_round_trip_through_mercator() {
        let source = composite_4326(Array2::ones((4, 4)));
        let merc = reproject_nearest(&source, &Crs::epsg(3857)).unwrap();
        let back = reproject_nearest(&merc, &Crs::epsg(4326)).unwrap();
        assert!((back.bounds.left - source.bounds.left).abs() < 1e-6);
        assert!((back.bounds.top - source.bounds.top).abs() < 1e-6);
    }
}
