//! Message types for the annotation session
//!
//! - [`Intent`]: what the host UI asks the session to do
//! - [`SessionEvent`]: notifications the session sends back

use crate::annotations::PointerAction;
use crate::config::Tool;
use crate::domain::{AssetRef, SlotId, Status};

/// User intents forwarded by the host
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Choose the drawing tool
    SelectTool(Tool),
    /// Cycle to the next drawing tool
    CycleTool,
    /// Choose the problem label for new shapes
    SelectLabel(String),
    /// Add a shape of the current tool's kind at its default geometry
    AddShape,
    /// Pointer gesture on the canvas
    Pointer(PointerAction),
    /// Delete the selected shape
    DeleteSelected,
    /// Delete every shape on the active slot
    ClearAll,
    /// Edit the treatment text for a label
    SetRecommendation { label: String, text: String },
    /// Add a recommendation label with no shape behind it
    AddCustomLabel(String),
    /// Drop a custom recommendation label
    RemoveCustomLabel(String),
}

/// Notifications for the host
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The live shapes of the active slot changed
    ShapesChanged,
    /// The dirty flag flipped
    DirtyChanged(bool),
    ToolChanged(Tool),
    LabelChanged(String),
    /// The active slot's background is ready for display
    BackgroundReady(SlotId),
    /// The active slot's background could not be loaded
    BackgroundFailed { slot: SlotId, reason: String },
    /// A different slot is now being edited
    SlotChanged(SlotId),
    /// Unsaved edits on the slot were dropped by a forced switch
    EditsDiscarded(SlotId),
    /// The recommendation entries changed (edit, prune or new label)
    RecommendationsChanged,
    RecommendationsSaved,
    Saved(SlotId),
    SaveFailed { slot: SlotId, reason: String },
    StatusChanged(Status),
    ReportGenerated(AssetRef),
    ReportFailed(String),
}
