//! Conversion between live canvas shapes and their persisted forms
//!
//! Live shapes serialize to [`Shape`] records (JSON on the wire), and the
//! whole canvas flattens to a JPEG for the annotated-image artifact.

use std::io::Cursor;

use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;

use crate::canvas::{CanvasEngine, LiveShape};
use crate::domain::Shape;
use crate::error::{CodecError, RenderError};

/// JPEG quality used when no configuration overrides it
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Shapes and flattened raster taken from the same canvas state
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationSnapshot {
    pub shapes: Vec<Shape>,
    /// JPEG bytes of the flattened canvas
    pub raster: Vec<u8>,
}

/// One record per live shape, in insertion order, with scale factors applied
pub fn serialize(live: &[LiveShape]) -> Vec<Shape> {
    live.iter()
        .map(|s| Shape::new(s.label.clone(), s.body.to_geometry()))
        .collect()
}

/// Check every record, reporting the first violation by position
pub fn validate_all(records: &[Shape]) -> Result<(), CodecError> {
    for (index, record) in records.iter().enumerate() {
        record
            .validate()
            .map_err(|source| CodecError::InvalidShape { index, source })?;
    }
    Ok(())
}

/// Restore persisted records as live shapes without dirtying the engine
///
/// Nothing is inserted unless every record is valid.
pub fn deserialize(records: &[Shape], engine: &mut CanvasEngine) -> Result<(), CodecError> {
    validate_all(records)?;
    engine.restore(records);
    log::debug!("Restored {} shapes onto the canvas", records.len());
    Ok(())
}

/// Replace the live shapes with imported records, as an unsaved edit
pub fn import(records: &[Shape], engine: &mut CanvasEngine) -> Result<(), CodecError> {
    validate_all(records)?;
    engine.replace(records);
    log::debug!("Imported {} shapes onto the canvas", records.len());
    Ok(())
}

/// Flatten the canvas to JPEG bytes
pub fn flatten_to_raster_bytes(engine: &CanvasEngine, quality: u8) -> Result<Vec<u8>, RenderError> {
    let rgb = DynamicImage::ImageRgba8(engine.render()).to_rgb8();
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    Ok(out.into_inner())
}

/// Serialize and flatten together; both succeed or neither is returned
pub fn snapshot(engine: &CanvasEngine, quality: u8) -> Result<AnnotationSnapshot, CodecError> {
    let shapes = serialize(engine.live_shapes());
    validate_all(&shapes)?;
    let raster = flatten_to_raster_bytes(engine, quality)?;
    Ok(AnnotationSnapshot { shapes, raster })
}

/// Encode a shape list as JSON
pub fn encode_json(shapes: &[Shape]) -> Result<String, CodecError> {
    Ok(serde_json::to_string(shapes)?)
}

/// Decode and validate a JSON shape list
pub fn decode_json(json: &str) -> Result<Vec<Shape>, CodecError> {
    let shapes: Vec<Shape> = serde_json::from_str(json)?;
    validate_all(&shapes)?;
    Ok(shapes)
}
