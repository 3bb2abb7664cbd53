//! # settleseg common library
//!
//! Shared code for the settleseg services:
//! - Error types
//! - Configuration loading and resolution
//! - Geospatial primitives (bounding boxes, affine transforms, CRS handling)

pub mod config;
pub mod error;
pub mod geo;

pub use error::{Error, Result};
