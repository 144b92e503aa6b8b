//! Live shape objects held by the canvas engine
//!
//! Live shapes carry transient editing state (selection, accumulated scale,
//! the fresh-shape flag) that the persisted [`Shape`](crate::domain::Shape)
//! form omits.

use crate::config::ShapeColor;
use crate::domain::{Bounds, Geometry, Point, ShapeKind};
use crate::render::geometry::{distance_to_segment, shape};

/// Opaque identifier of a live shape within one engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeHandle(pub(crate) u64);

/// Editable geometry of a live shape
#[derive(Clone, Debug, PartialEq)]
pub enum LiveBody {
    Rectangle {
        left: f32,
        top: f32,
        width: f32,
        height: f32,
        scale_x: f32,
        scale_y: f32,
    },
    Circle {
        left: f32,
        top: f32,
        radius: f32,
        scale_x: f32,
        scale_y: f32,
    },
    Arrow {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
    Freehand {
        points: Vec<Point>,
    },
}

impl LiveBody {
    /// Geometry a newly added shape starts with
    pub fn default_for(kind: ShapeKind) -> Option<LiveBody> {
        match kind {
            ShapeKind::Rectangle => Some(LiveBody::Rectangle {
                left: 100.0,
                top: 100.0,
                width: 100.0,
                height: 100.0,
                scale_x: 1.0,
                scale_y: 1.0,
            }),
            ShapeKind::Circle => Some(LiveBody::Circle {
                left: 100.0,
                top: 100.0,
                radius: 50.0,
                scale_x: 1.0,
                scale_y: 1.0,
            }),
            ShapeKind::Arrow => Some(LiveBody::Arrow {
                x1: 100.0,
                y1: 100.0,
                x2: 200.0,
                y2: 200.0,
            }),
            ShapeKind::Freehand => None,
        }
    }

    /// Live body restored from persisted geometry (unit scale)
    pub fn from_geometry(geometry: &Geometry) -> LiveBody {
        match geometry {
            Geometry::Rectangle {
                left,
                top,
                width,
                height,
            } => LiveBody::Rectangle {
                left: *left,
                top: *top,
                width: *width,
                height: *height,
                scale_x: 1.0,
                scale_y: 1.0,
            },
            Geometry::Circle { left, top, radius } => LiveBody::Circle {
                left: *left,
                top: *top,
                radius: *radius,
                scale_x: 1.0,
                scale_y: 1.0,
            },
            Geometry::Arrow { x1, y1, x2, y2 } => LiveBody::Arrow {
                x1: *x1,
                y1: *y1,
                x2: *x2,
                y2: *y2,
            },
            Geometry::Freehand { path } => LiveBody::Freehand {
                points: path.clone(),
            },
        }
    }

    /// Persisted geometry with accumulated scale factors applied
    pub fn to_geometry(&self) -> Geometry {
        match self {
            LiveBody::Rectangle {
                left,
                top,
                width,
                height,
                scale_x,
                scale_y,
            } => Geometry::Rectangle {
                left: *left,
                top: *top,
                width: width * scale_x,
                height: height * scale_y,
            },
            LiveBody::Circle {
                left,
                top,
                radius,
                scale_x,
                ..
            } => Geometry::Circle {
                left: *left,
                top: *top,
                radius: radius * scale_x,
            },
            LiveBody::Arrow { x1, y1, x2, y2 } => Geometry::Arrow {
                x1: *x1,
                y1: *y1,
                x2: *x2,
                y2: *y2,
            },
            LiveBody::Freehand { points } => Geometry::Freehand {
                path: points.clone(),
            },
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            LiveBody::Rectangle { .. } => ShapeKind::Rectangle,
            LiveBody::Circle { .. } => ShapeKind::Circle,
            LiveBody::Arrow { .. } => ShapeKind::Arrow,
            LiveBody::Freehand { .. } => ShapeKind::Freehand,
        }
    }

    /// Effective bounds on the canvas
    pub fn bounds(&self) -> Bounds {
        match self {
            LiveBody::Rectangle {
                left,
                top,
                width,
                height,
                scale_x,
                scale_y,
            } => Bounds::new(*left, *top, width * scale_x, height * scale_y),
            LiveBody::Circle {
                left,
                top,
                radius,
                scale_x,
                scale_y,
            } => Bounds::new(*left, *top, radius * 2.0 * scale_x, radius * 2.0 * scale_y),
            LiveBody::Arrow { x1, y1, x2, y2 } => {
                Bounds::from_corners(Point::new(*x1, *y1), Point::new(*x2, *y2))
            }
            LiveBody::Freehand { points } => Bounds::of_points(points).unwrap_or_default(),
        }
    }

    /// Move the body by the given offset
    pub fn translate(&mut self, dx: f32, dy: f32) {
        match self {
            LiveBody::Rectangle { left, top, .. } | LiveBody::Circle { left, top, .. } => {
                *left += dx;
                *top += dy;
            }
            LiveBody::Arrow { x1, y1, x2, y2 } => {
                *x1 += dx;
                *y1 += dy;
                *x2 += dx;
                *y2 += dy;
            }
            LiveBody::Freehand { points } => {
                for p in points.iter_mut() {
                    *p = p.translate(dx, dy);
                }
            }
        }
    }

    /// Whether the point hits this body
    pub fn hit(&self, p: Point) -> bool {
        match self {
            LiveBody::Rectangle { .. } => self.bounds().inflate(shape::HIT_SLOP).contains_point(p),
            LiveBody::Circle { .. } => {
                let b = self.bounds();
                let c = b.center();
                let rx = b.width / 2.0 + shape::HIT_SLOP;
                let ry = b.height / 2.0 + shape::HIT_SLOP;
                let nx = (p.x - c.x) / rx;
                let ny = (p.y - c.y) / ry;
                nx * nx + ny * ny <= 1.0
            }
            LiveBody::Arrow { x1, y1, x2, y2 } => {
                distance_to_segment(p.x, p.y, *x1, *y1, *x2, *y2) <= shape::HIT_SLOP
            }
            LiveBody::Freehand { points } => match points.as_slice() {
                [] => false,
                [only] => only.distance_to(p) <= shape::HIT_SLOP,
                _ => points.windows(2).any(|w| {
                    distance_to_segment(p.x, p.y, w[0].x, w[0].y, w[1].x, w[1].y)
                        <= shape::HIT_SLOP
                }),
            },
        }
    }
}

/// A shape object living on the canvas
#[derive(Clone, Debug, PartialEq)]
pub struct LiveShape {
    pub handle: ShapeHandle,
    pub label: String,
    pub color: ShapeColor,
    pub body: LiveBody,
    /// Whether this shape is the current selection
    pub selected: bool,
    /// Newly added; the next drag resizes it instead of moving it
    pub fresh: bool,
}

impl LiveShape {
    pub fn kind(&self) -> ShapeKind {
        self.body.kind()
    }
}
