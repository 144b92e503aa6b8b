//! Persisted annotation shapes
//!
//! A [`Shape`] is the serializable form of one annotation. Coordinates are in
//! the 800×600 canvas space. The wire format is kind-discriminated:
//!
//! ```json
//! {"type": "rectangle", "left": 50, "top": 50, "width": 100, "height": 70, "problem": "Stains"}
//! ```

use serde::{Deserialize, Serialize};

use super::geometry::Point;
use crate::config::{self, ShapeColor};
use crate::error::ValidationError;

/// Kind of annotation shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Arrow,
    Freehand,
}

impl ShapeKind {
    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Circle => "circle",
            ShapeKind::Arrow => "arrow",
            ShapeKind::Freehand => "freehand",
        }
    }
}

/// Kind-specific geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Geometry {
    /// Top-left anchored box
    Rectangle {
        left: f32,
        top: f32,
        width: f32,
        height: f32,
    },
    /// Circle described by its bounding-box top-left and radius
    Circle { left: f32, top: f32, radius: f32 },
    /// Arrow from tail (x1, y1) to head (x2, y2)
    Arrow { x1: f32, y1: f32, x2: f32, y2: f32 },
    /// Polyline in drawing order
    Freehand {
        #[serde(deserialize_with = "deserialize_path")]
        path: Vec<Point>,
    },
}

/// One entry of a stored freehand path: a point, or an SVG path command
/// such as `["M", 10, 20]` or `["Q", 12, 22, 14, 24]` as older records hold
#[derive(Deserialize)]
#[serde(untagged)]
enum PathEntry {
    Point(Point),
    Command(Vec<serde_json::Value>),
}

/// End point of an absolute path command; `None` for a close command
fn command_end<E: serde::de::Error>(command: &[serde_json::Value]) -> Result<Option<Point>, E> {
    let Some(op) = command.first().and_then(|v| v.as_str()) else {
        return Err(E::custom("path command must start with a letter"));
    };
    let args: Vec<f32> = command[1..]
        .iter()
        .map(|v| v.as_f64().map(|n| n as f32))
        .collect::<Option<_>>()
        .ok_or_else(|| E::custom(format!("non-numeric argument in path command {op}")))?;
    let arity = match op {
        "Z" => return Ok(None),
        "M" | "L" | "T" => 2,
        "Q" | "S" => 4,
        "C" => 6,
        other => return Err(E::custom(format!("unsupported path command {other}"))),
    };
    if args.len() != arity {
        return Err(E::custom(format!(
            "path command {op} takes {arity} numbers, got {}",
            args.len()
        )));
    }
    Ok(Some(Point::new(args[arity - 2], args[arity - 1])))
}

fn deserialize_path<'de, D>(deserializer: D) -> Result<Vec<Point>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let entries = Vec::<PathEntry>::deserialize(deserializer)?;
    let mut points = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            PathEntry::Point(p) => points.push(p),
            PathEntry::Command(command) => points.extend(command_end::<D::Error>(&command)?),
        }
    }
    Ok(points)
}

impl Geometry {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Geometry::Rectangle { .. } => ShapeKind::Rectangle,
            Geometry::Circle { .. } => ShapeKind::Circle,
            Geometry::Arrow { .. } => ShapeKind::Arrow,
            Geometry::Freehand { .. } => ShapeKind::Freehand,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidGeometry {
            kind: self.kind().name(),
            reason: reason.to_string(),
        };
        let finite = |values: &[f32]| values.iter().all(|v| v.is_finite());

        match self {
            Geometry::Rectangle {
                left,
                top,
                width,
                height,
            } => {
                if !finite(&[*left, *top, *width, *height]) {
                    return Err(invalid("non-finite coordinate"));
                }
                if *width < 0.0 || *height < 0.0 {
                    return Err(invalid("negative width or height"));
                }
            }
            Geometry::Circle { left, top, radius } => {
                if !finite(&[*left, *top, *radius]) {
                    return Err(invalid("non-finite coordinate"));
                }
                if *radius < 0.0 {
                    return Err(invalid("negative radius"));
                }
            }
            Geometry::Arrow { x1, y1, x2, y2 } => {
                if !finite(&[*x1, *y1, *x2, *y2]) {
                    return Err(invalid("non-finite coordinate"));
                }
            }
            Geometry::Freehand { path } => {
                if path.is_empty() {
                    return Err(invalid("empty path"));
                }
                if !path.iter().all(|p| p.is_finite()) {
                    return Err(invalid("non-finite coordinate"));
                }
            }
        }
        Ok(())
    }
}

/// One persisted annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    #[serde(flatten)]
    pub geometry: Geometry,
    /// Problem label; also the key into the color table
    #[serde(rename = "problem")]
    pub label: String,
    /// Free-form reviewer note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Shape {
    pub fn new(label: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            geometry,
            label: label.into(),
            note: None,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.geometry.kind()
    }

    /// Stroke color derived from the problem label
    pub fn color(&self) -> ShapeColor {
        config::label_color(&self.label)
    }

    /// Check the invariants every persisted shape must hold
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.label.trim().is_empty() {
            return Err(ValidationError::EmptyLabel);
        }
        self.geometry.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_rectangle() {
        let shape = Shape::new(
            "Stains",
            Geometry::Rectangle {
                left: 50.0,
                top: 50.0,
                width: 100.0,
                height: 70.0,
            },
        );
        let value = serde_json::to_value(&shape).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "rectangle",
                "left": 50.0,
                "top": 50.0,
                "width": 100.0,
                "height": 70.0,
                "problem": "Stains"
            })
        );
    }

    #[test]
    fn test_decode_ignores_extra_fields_and_accepts_integers() {
        let json = r#"{"type":"arrow","left":3,"top":4,"x1":10,"y1":20,"x2":30,"y2":40,"problem":"Crowns"}"#;
        let shape: Shape = serde_json::from_str(json).unwrap();
        assert_eq!(
            shape.geometry,
            Geometry::Arrow {
                x1: 10.0,
                y1: 20.0,
                x2: 30.0,
                y2: 40.0
            }
        );
        assert_eq!(shape.label, "Crowns");
        assert!(shape.note.is_none());
    }

    #[test]
    fn test_freehand_with_note() {
        let json = r#"{"type":"freehand","path":[{"x":1,"y":2},{"x":3,"y":4}],"problem":"Receded gums","note":"lower left"}"#;
        let shape: Shape = serde_json::from_str(json).unwrap();
        assert_eq!(shape.kind(), ShapeKind::Freehand);
        assert_eq!(shape.note.as_deref(), Some("lower left"));
        assert!(shape.validate().is_ok());
    }

    #[test]
    fn test_freehand_accepts_svg_commands() {
        let json = r#"{"type":"freehand","left":0,"top":0,"problem":"Stains",
            "path":[["M",10,20],["Q",11,21,12.5,22.5],["L",30,40],["Z"]]}"#;
        let shape: Shape = serde_json::from_str(json).unwrap();
        assert_eq!(
            shape.geometry,
            Geometry::Freehand {
                path: vec![
                    Point::new(10.0, 20.0),
                    Point::new(12.5, 22.5),
                    Point::new(30.0, 40.0),
                ]
            }
        );

        // Re-encoding writes plain points
        let value = serde_json::to_value(&shape).unwrap();
        assert_eq!(value["path"][1], serde_json::json!({"x": 12.5, "y": 22.5}));

        let bad = r#"{"type":"freehand","problem":"Stains","path":[["Q",1,2]]}"#;
        assert!(serde_json::from_str::<Shape>(bad).is_err());
        let relative = r#"{"type":"freehand","problem":"Stains","path":[["m",1,2]]}"#;
        assert!(serde_json::from_str::<Shape>(relative).is_err());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let json = r#"{"type":"polygon","problem":"Stains"}"#;
        assert!(serde_json::from_str::<Shape>(json).is_err());
    }

    #[test]
    fn test_validate() {
        let empty_label = Shape::new(
            "  ",
            Geometry::Circle {
                left: 0.0,
                top: 0.0,
                radius: 5.0,
            },
        );
        assert!(matches!(
            empty_label.validate(),
            Err(ValidationError::EmptyLabel)
        ));

        let negative = Shape::new(
            "Stains",
            Geometry::Rectangle {
                left: 0.0,
                top: 0.0,
                width: -1.0,
                height: 5.0,
            },
        );
        assert!(matches!(
            negative.validate(),
            Err(ValidationError::InvalidGeometry { kind: "rectangle", .. })
        ));

        let empty_path = Shape::new("Stains", Geometry::Freehand { path: vec![] });
        assert!(empty_path.validate().is_err());

        let nan = Shape::new(
            "Stains",
            Geometry::Arrow {
                x1: f32::NAN,
                y1: 0.0,
                x2: 1.0,
                y2: 1.0,
            },
        );
        assert!(nan.validate().is_err());
    }
}
