//! Grayscale visualization output
//!
//! Binary masks are scaled to the full 8-bit intensity range so the overlay
//! is visible in any image viewer.

use super::RasterError;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use ndarray::Array2;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Write a binary mask as an 8-bit grayscale PNG, mapping 1 -> 255
pub fn write_visualization_png(path: &Path, mask: &Array2<u8>) -> Result<(), RasterError> {
    let (height, width) = mask.dim();
    let data: Vec<u8> = mask.iter().map(|&v| if v > 0 { 255 } else { 0 }).collect();

    let file = BufWriter::new(File::create(path)?);
    let encoder = PngEncoder::new(file);
    encoder.write_image(&data, width as u32, height as u32, ColorType::L8)?;
    Ok(())
}
