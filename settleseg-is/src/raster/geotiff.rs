//! GeoTIFF decoding and encoding
//!
//! Only the GeoTIFF subset the tile pipeline produces and consumes:
//! single-strip baseline TIFFs with ModelPixelScale, ModelTiepoint and a
//! GeoKeyDirectory carrying an EPSG code. No rotation, no overviews.

use super::RasterError;
use ndarray::Array2;
use settleseg_common::geo::{BoundingBox, Crs, GeoTransform};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

// GeoKey ids
const KEY_GT_MODEL_TYPE: u16 = 1024;
const KEY_GT_RASTER_TYPE: u16 = 1025;
const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_TYPE_PIXEL_IS_AREA: u16 = 1;

/// Georeferencing read from a raster without touching pixel data
#[derive(Debug, Clone)]
pub struct GeoMetadata {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub bounds: BoundingBox,
    pub crs: Crs,
}

/// Decoded raster: per-band planes plus georeferencing
#[derive(Debug, Clone)]
pub struct TileRaster {
    pub bands: Vec<Array2<f32>>,
    pub meta: GeoMetadata,
}

/// Read georeferencing tags only
pub fn read_geo_metadata(path: &Path) -> Result<GeoMetadata, RasterError> {
    let file = BufReader::new(File::open(path)?);
    let mut decoder = Decoder::new(file)?;
    decode_geo_metadata(&mut decoder, path)
}

/// Read a full raster: every band as an `f32` plane plus georeferencing
pub fn read_geotiff(path: &Path) -> Result<TileRaster, RasterError> {
    let file = BufReader::new(File::open(path)?);
    let mut decoder = Decoder::new(file)?;
    let meta = decode_geo_metadata(&mut decoder, path)?;

    let (width, height) = (meta.width, meta.height);
    let interleaved: Vec<f32> = match decoder.read_image()? {
        DecodingResult::U8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::U32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I8(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I16(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::I32(data) => data.into_iter().map(|v| v as f32).collect(),
        DecodingResult::F32(data) => data,
        DecodingResult::F64(data) => data.into_iter().map(|v| v as f32).collect(),
        other => {
            return Err(RasterError::Unsupported(format!(
                "sample format {:?} in {}",
                std::mem::discriminant(&other),
                path.display()
            )))
        }
    };

    let pixels = width * height;
    if pixels == 0 || interleaved.len() % pixels != 0 {
        return Err(RasterError::Unsupported(format!(
            "{} samples do not tile {}x{} pixels in {}",
            interleaved.len(),
            width,
            height,
            path.display()
        )));
    }
    let band_count = interleaved.len() / pixels;

    // De-interleave chunky pixel layout into per-band planes
    let mut bands = vec![Array2::<f32>::zeros((height, width)); band_count];
    for row in 0..height {
        for col in 0..width {
            let base = (row * width + col) * band_count;
            for (b, band) in bands.iter_mut().enumerate() {
                band[[row, col]] = interleaved[base + b];
            }
        }
    }

    Ok(TileRaster { bands, meta })
}

/// Write a single-band 8-bit GeoTIFF with embedded transform and CRS
pub fn write_geotiff_gray8(
    path: &Path,
    data: &Array2<u8>,
    transform: &GeoTransform,
    crs: &Crs,
) -> Result<(), RasterError> {
    let (height, width) = data.dim();
    let file = BufWriter::new(File::create(path)?);
    let mut encoder = TiffEncoder::new(file)?;
    let mut image = encoder.new_image::<colortype::Gray8>(width as u32, height as u32)?;

    let pixel_scale = [transform.pixel_width, transform.pixel_height, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];
    let geo_keys = geo_key_directory(crs);

    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &pixel_scale[..])?;
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &geo_keys[..])?;

    let buffer = contiguous_u8(data);
    image.write_data(&buffer)?;
    Ok(())
}

fn decode_geo_metadata<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<GeoMetadata, RasterError> {
    let (width, height) = decoder.dimensions()?;

    let pixel_scale = decoder
        .find_tag(Tag::ModelPixelScaleTag)?
        .ok_or_else(|| RasterError::MissingGeoTags(path.to_path_buf()))?
        .into_f64_vec()?;
    let tiepoint = decoder
        .find_tag(Tag::ModelTiepointTag)?
        .ok_or_else(|| RasterError::MissingGeoTags(path.to_path_buf()))?
        .into_f64_vec()?;
    if pixel_scale.len() < 2 || tiepoint.len() < 6 {
        return Err(RasterError::MissingGeoTags(path.to_path_buf()));
    }

    // Tiepoint anchors raster position (i, j) to geographic (x, y); tiles
    // are anchored at the top-left corner
    let origin_x = tiepoint[3] - tiepoint[0] * pixel_scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * pixel_scale[1];
    let transform = GeoTransform::from_origin(origin_x, origin_y, pixel_scale[0], pixel_scale[1]);

    let crs = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)?
        .map(|v| v.into_u64_vec())
        .transpose()?
        .and_then(|keys| epsg_from_geo_keys(&keys))
        .map(Crs::epsg)
        .ok_or_else(|| RasterError::MissingGeoTags(path.to_path_buf()))?;

    let width = width as usize;
    let height = height as usize;
    Ok(GeoMetadata {
        width,
        height,
        bounds: transform.bounds(width, height),
        transform,
        crs,
    })
}

/// Extract the EPSG code from a GeoKeyDirectory, preferring the projected
/// CS key over the geographic one
fn epsg_from_geo_keys(keys: &[u64]) -> Option<u32> {
    let mut geographic = None;
    let mut projected = None;
    // Entries of 4 shorts follow the 4-short header
    for entry in keys.chunks_exact(4).skip(1) {
        let (key_id, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 {
            continue;
        }
        match key_id as u16 {
            KEY_PROJECTED_CS_TYPE => projected = Some(value as u32),
            KEY_GEOGRAPHIC_TYPE => geographic = Some(value as u32),
            _ => {}
        }
    }
    projected.or(geographic).filter(|code| *code != 0)
}

fn geo_key_directory(crs: &Crs) -> Vec<u16> {
    let code = crs.epsg_code().unwrap_or(4326) as u16;
    let (model_type, cs_key) = if crs.is_wgs84() {
        (MODEL_TYPE_GEOGRAPHIC, KEY_GEOGRAPHIC_TYPE)
    } else {
        (MODEL_TYPE_PROJECTED, KEY_PROJECTED_CS_TYPE)
    };
    vec![
        // Header: version 1.1, 3 keys
        1, 1, 0, 3,
        KEY_GT_MODEL_TYPE, 0, 1, model_type,
        KEY_GT_RASTER_TYPE, 0, 1, RASTER_TYPE_PIXEL_IS_AREA,
        cs_key, 0, 1, code,
    ]
}

fn contiguous_u8(data: &Array2<u8>) -> Vec<u8> {
    match data.as_slice() {
        Some(slice) => slice.to_vec(),
        None => data.iter().copied().collect(),
    }
}
