//! Drag gesture math
//!
//! Every update is recomputed from the gesture's start point and the body
//! captured when the gesture began, so repeated pointer moves never drift.

use super::live::{LiveBody, ShapeHandle};
use crate::domain::Point;
use crate::error::CanvasError;

/// What a drag gesture does to its shape
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragMode {
    /// Reshape a fresh shape from the start point to the pointer
    Resize,
    /// Translate the shape by the pointer offset
    Move,
}

/// An in-progress drag gesture
#[derive(Clone, Debug)]
pub struct Drag {
    pub handle: ShapeHandle,
    pub mode: DragMode,
    pub start: Point,
    /// Body as it was when the gesture began
    pub origin: LiveBody,
}

impl Drag {
    /// Body for the current pointer position
    pub fn apply(&self, current: Point) -> Result<LiveBody, CanvasError> {
        match self.mode {
            DragMode::Resize => resized(&self.origin, self.start, current),
            DragMode::Move => Ok(moved(&self.origin, self.start, current)),
        }
    }
}

/// Reshape a body so it spans from `start` to `current`
pub fn resized(body: &LiveBody, start: Point, current: Point) -> Result<LiveBody, CanvasError> {
    match body {
        LiveBody::Rectangle { .. } => Ok(LiveBody::Rectangle {
            left: start.x.min(current.x),
            top: start.y.min(current.y),
            width: (current.x - start.x).abs(),
            height: (current.y - start.y).abs(),
            scale_x: 1.0,
            scale_y: 1.0,
        }),
        LiveBody::Circle { .. } => {
            // Center stays at the start point
            let radius = start.distance_to(current) / 2.0;
            Ok(LiveBody::Circle {
                left: start.x - radius,
                top: start.y - radius,
                radius,
                scale_x: 1.0,
                scale_y: 1.0,
            })
        }
        LiveBody::Arrow { .. } => Ok(LiveBody::Arrow {
            x1: start.x,
            y1: start.y,
            x2: current.x,
            y2: current.y,
        }),
        LiveBody::Freehand { .. } => Err(CanvasError::NotResizable),
    }
}

/// Translate a body by the pointer offset since `start`
pub fn moved(body: &LiveBody, start: Point, current: Point) -> LiveBody {
    let mut body = body.clone();
    body.translate(current.x - start.x, current.y - start.y);
    body
}
