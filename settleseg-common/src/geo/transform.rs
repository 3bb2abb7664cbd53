//! Pixel-to-geography affine transforms

use super::BoundingBox;
use serde::{Deserialize, Serialize};

/// North-up affine transform mapping pixel indices to geographic coordinates.
///
/// Stored as an origin at the top-left corner of pixel (0, 0) plus positive
/// pixel sizes; the y axis points down in pixel space and up in geographic
/// space, so row offsets subtract.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// Geographic x of the raster's top-left corner
    pub origin_x: f64,
    /// Geographic y of the raster's top-left corner
    pub origin_y: f64,
    /// Pixel width in geographic units (positive)
    pub pixel_width: f64,
    /// Pixel height in geographic units (positive)
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Transform with origin at `(left, top)`, matching the convention of
    /// GDAL's `from_origin`
    pub fn from_origin(left: f64, top: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x: left,
            origin_y: top,
            pixel_width,
            pixel_height,
        }
    }

    /// Geographic coordinate of the top-left corner of pixel `(col, row)`
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width,
            self.origin_y - row * self.pixel_height,
        )
    }

    /// Fractional pixel position of geographic coordinate `(x, y)`
    pub fn invert(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.origin_x) / self.pixel_width,
            (self.origin_y - y) / self.pixel_height,
        )
    }

    /// Bounding box of a `width` x `height` raster under this transform
    pub fn bounds(&self, width: usize, height: usize) -> BoundingBox {
        let (right, bottom) = self.apply(width as f64, height as f64);
        BoundingBox::new(self.origin_x, bottom, right, self.origin_y)
    }

    /// GDAL-style 6-element representation `[a, b, c, d, e, f]` where
    /// `x = a + col*b + row*c` and `y = d + col*e + row*f`
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            0.0,
            self.origin_y,
            0.0,
            -self.pixel_height,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_and_invert_round_trip() {
        let t = GeoTransform::from_origin(500_000.0, 4_000_000.0, 10.0, 10.0);
        let (x, y) = t.apply(25.0, 12.0);
        assert_eq!((x, y), (500_250.0, 3_999_880.0));
        let (col, row) = t.invert(x, y);
        assert!((col - 25.0).abs() < 1e-9);
        assert!((row - 12.0).abs() < 1e-9);
    }

    #[test]
    fn bounds_of_raster() {
        let t = GeoTransform::from_origin(0.0, 100.0, 1.0, 2.0);
        let b = t.bounds(50, 25);
        assert_eq!(b, BoundingBox::new(0.0, 50.0, 50.0, 100.0));
    }

    #[test]
    fn gdal_representation_is_north_up() {
        let t = GeoTransform::from_origin(-5.0, 5.0, 0.5, 0.25);
        assert_eq!(t.to_gdal(), [-5.0, 0.5, 0.0, 5.0, 0.0, -0.25]);
    }
}
