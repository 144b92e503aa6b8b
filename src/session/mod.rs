//! Annotation session
//!
//! - Session state and the save/report lifecycle
//! - Intent and event message types
//! - Treatment recommendation editing

pub mod messages;
pub mod recommendations;
pub mod state;

pub use messages::{Intent, SessionEvent};
pub use recommendations::RecommendationEditor;
pub use state::{AnnotationSession, BackgroundRequest, PendingReport, PendingSave, SessionSettings};
