//! Canvas rendering
//!
//! - Geometry shared by hit-testing and rasterizing
//! - Raster rendering using tiny-skia (preview, export and flattening)

pub mod geometry;
pub mod image;
