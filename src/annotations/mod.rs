//! Annotation conversion and pointer handling
//!
//! This module provides:
//! - The codec between live canvas shapes, shape records and flattened rasters
//! - Pointer handlers that drive canvas gestures for the selected tool

pub mod codec;
pub mod handlers;

pub use codec::{AnnotationSnapshot, DEFAULT_JPEG_QUALITY};
pub use handlers::{PointerAction, handle_pointer};
