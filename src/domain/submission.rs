//! Submission aggregate: three image slots, recommendations and lifecycle

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shape::Shape;
use crate::error::ValidationError;

/// Reference to a stored object (image or report)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub url: String,
    pub id: String,
}

/// The three fixed anatomical photo positions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotId {
    UpperTeeth,
    FrontTeeth,
    LowerTeeth,
}

impl SlotId {
    pub const ALL: [SlotId; 3] = [SlotId::UpperTeeth, SlotId::FrontTeeth, SlotId::LowerTeeth];

    /// Human readable label used in the report
    pub fn label(self) -> &'static str {
        match self {
            SlotId::UpperTeeth => "Upper Teeth",
            SlotId::FrontTeeth => "Front Teeth",
            SlotId::LowerTeeth => "Lower Teeth",
        }
    }

    /// Storage key
    pub fn key(self) -> &'static str {
        match self {
            SlotId::UpperTeeth => "upperTeeth",
            SlotId::FrontTeeth => "frontTeeth",
            SlotId::LowerTeeth => "lowerTeeth",
        }
    }

    pub fn index(self) -> usize {
        match self {
            SlotId::UpperTeeth => 0,
            SlotId::FrontTeeth => 1,
            SlotId::LowerTeeth => 2,
        }
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// One photo position within a submission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSlot {
    /// Uploaded photo, immutable after intake
    pub original: AssetRef,
    /// Flattened annotated photo, overwritten on each save
    #[serde(default)]
    pub annotated: Option<AssetRef>,
    /// Shapes, replaced wholesale on each save
    #[serde(default)]
    pub annotations: Vec<Shape>,
}

impl ImageSlot {
    pub fn new(original: AssetRef) -> Self {
        Self {
            original,
            annotated: None,
            annotations: Vec::new(),
        }
    }

    /// Image shown in reports: the annotated one if present
    pub fn display_image(&self) -> &AssetRef {
        self.annotated.as_ref().unwrap_or(&self.original)
    }
}

/// The three image slots of a submission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotImages {
    pub upper_teeth: ImageSlot,
    pub front_teeth: ImageSlot,
    pub lower_teeth: ImageSlot,
}

impl SlotImages {
    pub fn new(upper: AssetRef, front: AssetRef, lower: AssetRef) -> Self {
        Self {
            upper_teeth: ImageSlot::new(upper),
            front_teeth: ImageSlot::new(front),
            lower_teeth: ImageSlot::new(lower),
        }
    }

    pub fn get(&self, slot: SlotId) -> &ImageSlot {
        match slot {
            SlotId::UpperTeeth => &self.upper_teeth,
            SlotId::FrontTeeth => &self.front_teeth,
            SlotId::LowerTeeth => &self.lower_teeth,
        }
    }

    pub fn get_mut(&mut self, slot: SlotId) -> &mut ImageSlot {
        match slot {
            SlotId::UpperTeeth => &mut self.upper_teeth,
            SlotId::FrontTeeth => &mut self.front_teeth,
            SlotId::LowerTeeth => &mut self.lower_teeth,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &ImageSlot)> {
        SlotId::ALL.into_iter().map(move |slot| (slot, self.get(slot)))
    }
}

/// Submission lifecycle status; transitions only move forward
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Uploaded,
    Annotated,
    Reported,
}

impl Status {
    pub fn name(self) -> &'static str {
        match self {
            Status::Uploaded => "uploaded",
            Status::Annotated => "annotated",
            Status::Reported => "reported",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Patient identity captured at intake
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientInfo {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Problem label to treatment text
pub type Recommendations = BTreeMap<String, String>;

/// True when at least one recommendation has non-whitespace text
pub fn has_recommendation_text(recommendations: &Recommendations) -> bool {
    recommendations.values().any(|text| !text.trim().is_empty())
}

/// A partial update touching exactly one concern of a submission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SubmissionUpdate {
    /// Replace one slot's shapes and annotated image
    #[serde(rename_all = "camelCase")]
    Annotations {
        slot: SlotId,
        shapes: Vec<Shape>,
        annotated_image: AssetRef,
        saved_at: DateTime<Utc>,
    },
    /// Replace the treatment recommendations map
    Recommendations { recommendations: Recommendations },
    /// Record a generated report
    #[serde(rename_all = "camelCase")]
    Report {
        report: AssetRef,
        generated_at: DateTime<Utc>,
    },
}

/// A patient submission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub patient: PatientInfo,
    pub images: SlotImages,
    #[serde(default)]
    pub treatment_recommendations: Recommendations,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub report: Option<AssetRef>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub report_generated_at: Option<DateTime<Utc>>,
}

impl Submission {
    /// Create a freshly uploaded submission; all three originals are required
    pub fn new(
        id: impl Into<String>,
        patient: PatientInfo,
        images: SlotImages,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            patient,
            images,
            treatment_recommendations: Recommendations::new(),
            status: Status::Uploaded,
            report: None,
            submitted_at,
            reviewed_at: None,
            report_generated_at: None,
        }
    }

    pub fn slot(&self, slot: SlotId) -> &ImageSlot {
        self.images.get(slot)
    }

    /// Union of problem labels across every slot's persisted shapes
    pub fn shape_labels(&self) -> BTreeSet<String> {
        self.images
            .iter()
            .flat_map(|(_, slot)| slot.annotations.iter().map(|s| s.label.clone()))
            .collect()
    }

    /// Check that a report may be generated with the given recommendations
    pub fn check_reportable(&self, recommendations: &Recommendations) -> Result<(), ValidationError> {
        if self.status != Status::Annotated {
            return Err(ValidationError::NotAnnotated {
                status: self.status,
            });
        }
        if !has_recommendation_text(recommendations) {
            return Err(ValidationError::NoRecommendations);
        }
        Ok(())
    }

    /// Apply a partial update, enforcing the status transitions
    pub fn apply(&mut self, update: SubmissionUpdate) -> Result<(), ValidationError> {
        match update {
            SubmissionUpdate::Annotations {
                slot,
                shapes,
                annotated_image,
                saved_at,
            } => {
                for shape in &shapes {
                    shape.validate()?;
                }
                let promote = !shapes.is_empty() && self.status == Status::Uploaded;
                let target = self.images.get_mut(slot);
                target.annotations = shapes;
                target.annotated = Some(annotated_image);
                self.reviewed_at = Some(saved_at);
                if promote {
                    self.status = Status::Annotated;
                }
            }
            SubmissionUpdate::Recommendations { recommendations } => {
                self.treatment_recommendations = recommendations;
            }
            SubmissionUpdate::Report {
                report,
                generated_at,
            } => {
                self.check_reportable(&self.treatment_recommendations)?;
                self.report = Some(report);
                self.report_generated_at = Some(generated_at);
                self.status = Status::Reported;
            }
        }
        Ok(())
    }
}
