//! Coordinate reference system handling
//!
//! EPSG:4326 (geographic) and EPSG:3857 (spherical web mercator) convert
//! through closed forms and are always available. Any other CRS pair needs
//! the PROJ library (feature `proj`); without it the transformer constructor
//! reports the pair as unsupported and callers decide how to degrade.

use super::BoundingBox;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Earth radius of the spherical mercator model, metres
const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Error type for CRS operations
#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("Unsupported CRS pair: {from} -> {to}")]
    Unsupported { from: String, to: String },
}

/// Named coordinate reference system, canonically an `EPSG:<code>` string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(String);

impl Crs {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn epsg(code: u32) -> Self {
        Self(format!("EPSG:{}", code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// EPSG code when the CRS is in `EPSG:<code>` form
    pub fn epsg_code(&self) -> Option<u32> {
        parse_epsg_code(&self.0)
    }

    pub fn is_wgs84(&self) -> bool {
        self.epsg_code() == Some(4326)
    }

    pub fn is_web_mercator(&self) -> bool {
        self.epsg_code() == Some(3857)
    }

    /// Whether two CRS names refer to the same system.
    ///
    /// Identical strings and matching EPSG codes are equal; anything more
    /// would need an authority lookup, so other pairs compare unequal.
    pub fn same_as(&self, other: &Crs) -> bool {
        if self.0.eq_ignore_ascii_case(&other.0) {
            return true;
        }
        match (self.epsg_code(), other.epsg_code()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Get the EPSG code from a CRS string if it's in EPSG format
pub fn parse_epsg_code(crs: &str) -> Option<u32> {
    let crs_upper = crs.to_uppercase();
    crs_upper.strip_prefix("EPSG:")?.parse::<u32>().ok()
}

/// Forward spherical mercator: (lon, lat) degrees -> (x, y) metres
fn web_mercator_forward(lon: f64, lat: f64) -> (f64, f64) {
    // Clamp latitude to the mercator domain
    let lat = lat.clamp(-85.051_128_779_806_59, 85.051_128_779_806_59);
    let x = WEB_MERCATOR_RADIUS * lon.to_radians();
    let y = WEB_MERCATOR_RADIUS * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0)
        .tan()
        .ln();
    (x, y)
}

/// Inverse spherical mercator: (x, y) metres -> (lon, lat) degrees
fn web_mercator_inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WEB_MERCATOR_RADIUS).to_degrees();
    let lat = (2.0 * (y / WEB_MERCATOR_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2)
        .to_degrees();
    (lon, lat)
}

/// Point transformer between two coordinate reference systems
pub enum CrsTransformer {
    /// Source and target are the same system
    Identity,
    /// EPSG:4326 -> EPSG:3857 closed form
    ToWebMercator,
    /// EPSG:3857 -> EPSG:4326 closed form
    FromWebMercator,
    /// Arbitrary pair through PROJ
    #[cfg(feature = "proj")]
    Proj(proj::Proj),
}

impl CrsTransformer {
    /// Build a transformer from `from` to `to`, or report the pair as
    /// unsupported when no conversion path exists in this build.
    pub fn new(from: &Crs, to: &Crs) -> Result<Self, GeoError> {
        if from.same_as(to) {
            return Ok(Self::Identity);
        }
        if from.is_wgs84() && to.is_web_mercator() {
            return Ok(Self::ToWebMercator);
        }
        if from.is_web_mercator() && to.is_wgs84() {
            return Ok(Self::FromWebMercator);
        }

        #[cfg(feature = "proj")]
        {
            let transformer = proj::Proj::new_known_crs(from.as_str(), to.as_str(), None)
                .map_err(|e| GeoError::Projection(format!("Failed to create transform: {}", e)))?;
            return Ok(Self::Proj(transformer));
        }

        #[cfg(not(feature = "proj"))]
        Err(GeoError::Unsupported {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Transform a single `(x, y)` coordinate
    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), GeoError> {
        match self {
            Self::Identity => Ok((x, y)),
            Self::ToWebMercator => Ok(web_mercator_forward(x, y)),
            Self::FromWebMercator => Ok(web_mercator_inverse(x, y)),
            #[cfg(feature = "proj")]
            Self::Proj(transformer) => transformer
                .convert((x, y))
                .map_err(|e| GeoError::Projection(format!("Transform failed at ({}, {}): {}", x, y, e))),
        }
    }

    /// Transform a bounding box by sampling its edges.
    ///
    /// Corner-only transformation under-covers curved edges, so each edge is
    /// sampled at `SAMPLES_PER_EDGE` points and the result is the envelope of
    /// every transformed sample.
    pub fn transform_bounds(&self, bounds: &BoundingBox) -> Result<BoundingBox, GeoError> {
        const SAMPLES_PER_EDGE: usize = 21;

        let mut left = f64::INFINITY;
        let mut bottom = f64::INFINITY;
        let mut right = f64::NEG_INFINITY;
        let mut top = f64::NEG_INFINITY;

        for i in 0..SAMPLES_PER_EDGE {
            let t = i as f64 / (SAMPLES_PER_EDGE - 1) as f64;
            let x = bounds.left + t * bounds.width();
            let y = bounds.bottom + t * bounds.height();
            for (px, py) in [
                (x, bounds.bottom),
                (x, bounds.top),
                (bounds.left, y),
                (bounds.right, y),
            ] {
                let (tx, ty) = self.transform(px, py)?;
                left = left.min(tx);
                bottom = bottom.min(ty);
                right = right.max(tx);
                top = top.max(ty);
            }
        }

        if !(left.is_finite() && bottom.is_finite() && right.is_finite() && top.is_finite()) {
            return Err(GeoError::Projection(
                "transformed bounds are not finite".to_string(),
            ));
        }
        Ok(BoundingBox::new(left, bottom, right, top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_epsg_code() {
        assert_eq!(parse_epsg_code("EPSG:4326"), Some(4326));
        assert_eq!(parse_epsg_code("epsg:32654"), Some(32654));
        assert_eq!(parse_epsg_code("WGS84"), None);
        assert_eq!(parse_epsg_code("EPSG:invalid"), None);
    }

    #[test]
    fn crs_equality() {
        assert!(Crs::new("EPSG:3857").same_as(&Crs::epsg(3857)));
        assert!(Crs::new("epsg:4326").same_as(&Crs::new("EPSG:4326")));
        assert!(!Crs::epsg(4326).same_as(&Crs::epsg(3857)));
    }

    #[test]
    fn mercator_known_point() {
        // Null island maps to the mercator origin
        let (x, y) = web_mercator_forward(0.0, 0.0);
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);

        // Longitude 180 maps to the mercator half-circumference
        let (x, _) = web_mercator_forward(180.0, 0.0);
        assert!((x - 20_037_508.342_789_244).abs() < 1e-3);
    }

    #[test]
    fn mercator_round_trip() {
        let original = (138.7274, 35.3606);
        let (mx, my) = web_mercator_forward(original.0, original.1);
        let (lon, lat) = web_mercator_inverse(mx, my);
        assert!((lon - original.0).abs() < 1e-9);
        assert!((lat - original.1).abs() < 1e-9);
    }

    #[test]
    fn transformer_identity_and_builtin_pairs() {
        let t = CrsTransformer::new(&Crs::epsg(4326), &Crs::epsg(4326)).unwrap();
        assert_eq!(t.transform(12.5, -7.25).unwrap(), (12.5, -7.25));

        let fwd = CrsTransformer::new(&Crs::epsg(4326), &Crs::epsg(3857)).unwrap();
        let inv = CrsTransformer::new(&Crs::epsg(3857), &Crs::epsg(4326)).unwrap();
        let (x, y) = fwd.transform(10.0, 50.0).unwrap();
        let (lon, lat) = inv.transform(x, y).unwrap();
        assert!((lon - 10.0).abs() < 1e-9);
        assert!((lat - 50.0).abs() < 1e-9);
    }

    #[cfg(not(feature = "proj"))]
    #[test]
    fn unknown_pair_is_unsupported_without_proj() {
        let result = CrsTransformer::new(&Crs::epsg(32633), &Crs::epsg(3857));
        assert!(matches!(result, Err(GeoError::Unsupported { .. })));
    }

    #[test]
    fn transform_bounds_envelopes_edges() {
        let fwd = CrsTransformer::new(&Crs::epsg(4326), &Crs::epsg(3857)).unwrap();
        let bounds = BoundingBox::new(-10.0, -20.0, 10.0, 20.0);
        let out = fwd.transform_bounds(&bounds).unwrap();
        // Symmetric about the origin
        assert!((out.left + out.right).abs() < 1e-6);
        assert!((out.bottom + out.top).abs() < 1e-6);
        assert!(out.width() > 0.0 && out.height() > 0.0);
    }
}
