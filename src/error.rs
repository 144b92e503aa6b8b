//! Error types for the annotation core
//!
//! Every failure is scoped to one operation. Background decoding and store
//! failures are recoverable; validation failures are raised before any I/O.

use thiserror::Error;

use crate::canvas::ShapeHandle;
use crate::domain::{SlotId, Status};

/// Background or report image bytes could not be decoded
#[derive(Error, Debug)]
pub enum ImageDecodeError {
    /// The source yielded no bytes
    #[error("image source is empty")]
    Empty,

    /// Bytes are not a supported raster format or are corrupt
    #[error("unsupported or corrupt image data: {0}")]
    Decode(#[from] image::ImageError),

    /// Decoded image has a zero dimension
    #[error("image has zero size ({width}x{height})")]
    ZeroSize {
        /// Decoded width
        width: u32,
        /// Decoded height
        height: u32,
    },

    /// The bytes could not be fetched from the image store
    #[error("image could not be fetched: {0}")]
    Fetch(#[from] PersistenceError),

    /// The blocking decode task did not complete
    #[error("decode task failed: {0}")]
    Task(String),
}

/// A store call failed
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Requested object or submission does not exist
    #[error("{what} not found: {id}")]
    NotFound {
        /// Kind of object looked up
        what: &'static str,
        /// Identifier or URL used
        id: String,
    },

    /// Object already exists
    #[error("{what} already exists: {id}")]
    AlreadyExists {
        /// Kind of object
        what: &'static str,
        /// Conflicting identifier
        id: String,
    },

    /// I/O error in a filesystem-backed store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored JSON could not be read or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The update was rejected by the submission's own invariants
    #[error("update rejected: {0}")]
    Rejected(#[from] ValidationError),

    /// Any other backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

impl PersistenceError {
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// A request was rejected before any I/O
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Report generation needs an annotated submission
    #[error("submission must be annotated before generating a report (status: {status})")]
    NotAnnotated {
        /// Current status
        status: Status,
    },

    /// Report generation needs at least one non-blank recommendation
    #[error("at least one treatment recommendation is required")]
    NoRecommendations,

    /// Shape label is empty
    #[error("problem label must not be empty")]
    EmptyLabel,

    /// Shape geometry violates its invariants
    #[error("invalid {kind} geometry: {reason}")]
    InvalidGeometry {
        /// Shape kind name
        kind: &'static str,
        /// What is wrong
        reason: String,
    },

    /// A required intake photo is missing
    #[error("image for {0} is required")]
    MissingImage(SlotId),

    /// An intake photo is not a supported raster format
    #[error("image for {0} is not a supported format")]
    UnsupportedImage(SlotId),

    /// A required patient field is missing or malformed
    #[error("invalid patient field {field}: {reason}")]
    InvalidPatient {
        /// Field name
        field: &'static str,
        /// What is wrong
        reason: &'static str,
    },
}

/// Rendering of an export or report failed
#[derive(Error, Debug)]
pub enum RenderError {
    /// A report image could not be fetched or decoded; recovered per cell
    #[error("image for {slot} not available: {reason}")]
    ImageUnavailable {
        /// Slot whose image failed
        slot: SlotId,
        /// Underlying cause
        reason: String,
    },

    /// Raster encoding failed
    #[error("raster encoding failed: {0}")]
    Encode(String),

    /// PDF generation failed
    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

impl From<image::ImageError> for RenderError {
    fn from(err: image::ImageError) -> Self {
        RenderError::Encode(err.to_string())
    }
}

impl From<png::EncodingError> for RenderError {
    fn from(err: png::EncodingError) -> Self {
        RenderError::Encode(err.to_string())
    }
}

/// Canvas engine misuse
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CanvasError {
    /// Handle does not refer to a live shape
    #[error("no live shape with handle {0:?}")]
    UnknownShape(ShapeHandle),

    /// Freehand shapes are created by strokes, not added whole
    #[error("freehand shapes must be drawn as a stroke")]
    FreehandNeedsStroke,

    /// The shape kind cannot be resized this way
    #[error("this shape cannot be resized")]
    NotResizable,

    /// Circles keep a single radius, so both factors must match
    #[error("circles can only be scaled uniformly")]
    UnevenScale,

    /// No stroke or drag gesture is in progress
    #[error("no gesture in progress")]
    NoGesture,

    /// Shape label is empty
    #[error("problem label must not be empty")]
    EmptyLabel,
}

/// Conversion between live shapes and persisted forms failed
#[derive(Error, Debug)]
pub enum CodecError {
    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record violates the shape invariants
    #[error("invalid shape at index {index}: {source}")]
    InvalidShape {
        /// Position in the list
        index: usize,
        /// Violated invariant
        #[source]
        source: ValidationError,
    },

    /// Flattening failed
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Outstanding asynchronous request kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Save,
    Recommendations,
    Report,
}

/// Errors surfaced by the session controller to the host UI
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    ImageDecode(#[from] ImageDecodeError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Canvas(#[from] CanvasError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Another save or report request is still outstanding
    #[error("a {0:?} request is already in progress")]
    Busy(RequestKind),

    /// Save requested without unsaved changes
    #[error("there are no unsaved changes")]
    NothingToSave,

    /// Switching slots would discard unsaved edits
    #[error("{0} has unsaved changes")]
    UnsavedChanges(SlotId),
}

/// Errors from creating a new submission
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
