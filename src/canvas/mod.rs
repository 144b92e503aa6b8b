//! Canvas engine: a fixed-size drawing surface with a background photo and
//! editable vector shapes
//!
//! The engine owns all live shapes and the background. Hosts drive it through
//! shape operations and pointer gestures, and read it back through
//! [`CanvasEngine::live_shapes`], [`CanvasEngine::render`] and the queued
//! [`CanvasEvent`]s.

pub mod background;
pub mod drag;
pub mod live;

use std::io::Cursor;

use image::RgbaImage;

pub use background::Background;
pub use drag::{Drag, DragMode};
pub use live::{LiveBody, LiveShape, ShapeHandle};

use crate::config;
use crate::domain::{Point, Shape, ShapeKind};
use crate::error::{CanvasError, ImageDecodeError, RenderError};
use crate::render;

/// Logical canvas width in pixels
pub const CANVAS_WIDTH: u32 = 800;
/// Logical canvas height in pixels
pub const CANVAS_HEIGHT: u32 = 600;

/// Default stroke width for shapes in canvas pixels
pub const DEFAULT_STROKE_WIDTH: f32 = 3.0;

/// Notifications queued by the engine for its owner
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanvasEvent {
    /// The shape collection changed (add, edit, remove, clear, restore)
    ShapesChanged,
    /// A background was decoded and placed
    BackgroundReady,
}

/// Freehand stroke being drawn
#[derive(Clone, Debug)]
struct PendingStroke {
    label: String,
    points: Vec<Point>,
}

/// The drawing surface
#[derive(Debug)]
pub struct CanvasEngine {
    width: u32,
    height: u32,
    stroke_width: f32,
    background: Option<Background>,
    shapes: Vec<LiveShape>,
    next_handle: u64,
    /// Bumped by every user edit of the shape collection
    revision: u64,
    /// Revision last acknowledged as persisted
    saved_revision: u64,
    stroke: Option<PendingStroke>,
    drag: Option<Drag>,
    events: Vec<CanvasEvent>,
}

impl Default for CanvasEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CanvasEngine {
    /// Empty 800×600 canvas with no background
    pub fn new() -> Self {
        Self::with_stroke_width(DEFAULT_STROKE_WIDTH)
    }

    pub fn with_stroke_width(stroke_width: f32) -> Self {
        Self {
            width: CANVAS_WIDTH,
            height: CANVAS_HEIGHT,
            stroke_width,
            background: None,
            shapes: Vec::new(),
            next_handle: 1,
            revision: 0,
            saved_revision: 0,
            stroke: None,
            drag: None,
            events: Vec::new(),
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    // --- background ---

    /// Decode and place a background photo
    ///
    /// On failure the previous background is dropped and the engine stays
    /// usable without one.
    pub fn load_background(&mut self, bytes: &[u8]) -> Result<(), ImageDecodeError> {
        match Background::decode(bytes, self.width, self.height) {
            Ok(background) => {
                self.set_background(background);
                Ok(())
            }
            Err(err) => {
                log::warn!("Background could not be decoded: {}", err);
                self.background = None;
                Err(err)
            }
        }
    }

    /// Install an already decoded background; never affects dirty state
    pub fn set_background(&mut self, background: Background) {
        self.background = Some(background);
        self.events.push(CanvasEvent::BackgroundReady);
    }

    pub fn background(&self) -> Option<&Background> {
        self.background.as_ref()
    }

    // --- shape creation ---

    fn allocate_handle(&mut self) -> ShapeHandle {
        let handle = ShapeHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn mark_changed(&mut self) {
        self.revision += 1;
        self.events.push(CanvasEvent::ShapesChanged);
    }

    fn set_selection(&mut self, handle: Option<ShapeHandle>) {
        for shape in &mut self.shapes {
            let selected = Some(shape.handle) == handle;
            if !selected {
                shape.fresh = false;
            }
            shape.selected = selected;
        }
    }

    /// Add a shape of the given kind at its default geometry
    ///
    /// The new shape is selected and fresh: the next drag resizes it.
    pub fn add_shape(&mut self, kind: ShapeKind, label: &str) -> Result<ShapeHandle, CanvasError> {
        if label.trim().is_empty() {
            return Err(CanvasError::EmptyLabel);
        }
        let body = LiveBody::default_for(kind).ok_or(CanvasError::FreehandNeedsStroke)?;
        let handle = self.allocate_handle();
        self.shapes.push(LiveShape {
            handle,
            label: label.to_string(),
            color: config::label_color(label),
            body,
            selected: false,
            fresh: true,
        });
        self.set_selection(Some(handle));
        log::debug!("Added {} '{}' as {:?}", kind.name(), label, handle);
        self.mark_changed();
        Ok(handle)
    }

    /// Start a freehand stroke
    pub fn begin_stroke(&mut self, label: &str, point: Point) -> Result<(), CanvasError> {
        if label.trim().is_empty() {
            return Err(CanvasError::EmptyLabel);
        }
        self.drag = None;
        self.stroke = Some(PendingStroke {
            label: label.to_string(),
            points: vec![point],
        });
        Ok(())
    }

    /// Append a sample to the stroke in progress
    pub fn extend_stroke(&mut self, point: Point) -> Result<(), CanvasError> {
        let stroke = self.stroke.as_mut().ok_or(CanvasError::NoGesture)?;
        if stroke.points.last() != Some(&point) {
            stroke.points.push(point);
        }
        Ok(())
    }

    /// Commit the stroke in progress as one freehand shape
    ///
    /// Strokes with fewer than two samples are discarded and yield `None`.
    pub fn finish_stroke(&mut self) -> Result<Option<ShapeHandle>, CanvasError> {
        let stroke = self.stroke.take().ok_or(CanvasError::NoGesture)?;
        if stroke.points.len() < 2 {
            log::debug!("Discarding freehand stroke with a single sample");
            return Ok(None);
        }
        let handle = self.allocate_handle();
        self.shapes.push(LiveShape {
            handle,
            color: config::label_color(&stroke.label),
            label: stroke.label,
            body: LiveBody::Freehand {
                points: stroke.points,
            },
            selected: false,
            fresh: false,
        });
        self.mark_changed();
        Ok(Some(handle))
    }

    pub fn is_stroking(&self) -> bool {
        self.stroke.is_some()
    }

    /// Replace all shapes with persisted ones without marking the engine dirty
    pub(crate) fn restore(&mut self, shapes: &[Shape]) {
        self.fill(shapes);
        self.saved_revision = self.revision;
        self.events.push(CanvasEvent::ShapesChanged);
    }

    /// Replace all shapes as a user edit
    pub(crate) fn replace(&mut self, shapes: &[Shape]) {
        self.fill(shapes);
        self.mark_changed();
    }

    fn fill(&mut self, shapes: &[Shape]) {
        self.shapes.clear();
        self.drag = None;
        self.stroke = None;
        for shape in shapes {
            let handle = self.allocate_handle();
            self.shapes.push(LiveShape {
                handle,
                label: shape.label.clone(),
                color: shape.color(),
                body: LiveBody::from_geometry(&shape.geometry),
                selected: false,
                fresh: false,
            });
        }
    }

    // --- drag gestures ---

    fn index_of(&self, handle: ShapeHandle) -> Result<usize, CanvasError> {
        self.shapes
            .iter()
            .position(|s| s.handle == handle)
            .ok_or(CanvasError::UnknownShape(handle))
    }

    /// Start reshaping a shape from `start`
    pub fn begin_resize(&mut self, handle: ShapeHandle, start: Point) -> Result<(), CanvasError> {
        let index = self.index_of(handle)?;
        let origin = self.shapes[index].body.clone();
        if origin.kind() == ShapeKind::Freehand {
            return Err(CanvasError::NotResizable);
        }
        self.set_selection(Some(handle));
        self.drag = Some(Drag {
            handle,
            mode: DragMode::Resize,
            start,
            origin,
        });
        Ok(())
    }

    /// Start translating a shape from `start`
    pub fn begin_move(&mut self, handle: ShapeHandle, start: Point) -> Result<(), CanvasError> {
        let index = self.index_of(handle)?;
        let origin = self.shapes[index].body.clone();
        self.set_selection(Some(handle));
        self.drag = Some(Drag {
            handle,
            mode: DragMode::Move,
            start,
            origin,
        });
        Ok(())
    }

    /// Update the gesture in progress for the current pointer position
    pub fn drag_to(&mut self, current: Point) -> Result<(), CanvasError> {
        let drag = self.drag.as_ref().ok_or(CanvasError::NoGesture)?;
        let body = drag.apply(current)?;
        let index = self.index_of(drag.handle)?;
        if self.shapes[index].body != body {
            self.shapes[index].body = body;
            self.mark_changed();
        }
        Ok(())
    }

    /// Finish the gesture in progress; the shape is no longer fresh
    pub fn end_drag(&mut self) -> Result<ShapeHandle, CanvasError> {
        let drag = self.drag.take().ok_or(CanvasError::NoGesture)?;
        if let Ok(index) = self.index_of(drag.handle) {
            self.shapes[index].fresh = false;
        }
        Ok(drag.handle)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    // --- direct edits ---

    /// Translate a shape by an offset
    pub fn move_shape(&mut self, handle: ShapeHandle, dx: f32, dy: f32) -> Result<(), CanvasError> {
        let index = self.index_of(handle)?;
        self.shapes[index].body.translate(dx, dy);
        self.mark_changed();
        Ok(())
    }

    /// Multiply a rectangle's or circle's accumulated scale factors
    ///
    /// Circles only accept equal factors.
    pub fn scale_shape(&mut self, handle: ShapeHandle, sx: f32, sy: f32) -> Result<(), CanvasError> {
        let index = self.index_of(handle)?;
        let (sx, sy) = (sx.abs(), sy.abs());
        match &mut self.shapes[index].body {
            LiveBody::Rectangle {
                scale_x, scale_y, ..
            } => {
                *scale_x *= sx;
                *scale_y *= sy;
            }
            LiveBody::Circle {
                scale_x, scale_y, ..
            } => {
                if (sx - sy).abs() > f32::EPSILON * sx.max(sy).max(1.0) {
                    return Err(CanvasError::UnevenScale);
                }
                *scale_x *= sx;
                *scale_y *= sx;
            }
            LiveBody::Arrow { .. } | LiveBody::Freehand { .. } => {
                return Err(CanvasError::NotResizable);
            }
        }
        self.mark_changed();
        Ok(())
    }

    /// Remove one shape
    pub fn remove_shape(&mut self, handle: ShapeHandle) -> Result<(), CanvasError> {
        let index = self.index_of(handle)?;
        self.shapes.remove(index);
        if self.drag.as_ref().is_some_and(|d| d.handle == handle) {
            self.drag = None;
        }
        self.mark_changed();
        Ok(())
    }

    /// Remove the selected shape, if any
    pub fn remove_selected(&mut self) -> Option<ShapeHandle> {
        let handle = self.selected()?;
        self.remove_shape(handle).ok()?;
        Some(handle)
    }

    /// Remove every shape; the background stays
    pub fn clear_all_shapes(&mut self) {
        if self.shapes.is_empty() {
            return;
        }
        self.shapes.clear();
        self.drag = None;
        self.mark_changed();
    }

    // --- selection ---

    pub fn select(&mut self, handle: Option<ShapeHandle>) -> Result<(), CanvasError> {
        if let Some(handle) = handle {
            self.index_of(handle)?;
        }
        self.set_selection(handle);
        Ok(())
    }

    /// Select the topmost shape under the point, or clear the selection
    pub fn select_at(&mut self, point: Point) -> Option<ShapeHandle> {
        let hit = self.hit_test(point);
        self.set_selection(hit);
        hit
    }

    /// Topmost shape under the point
    pub fn hit_test(&self, point: Point) -> Option<ShapeHandle> {
        self.shapes
            .iter()
            .rev()
            .find(|s| s.body.hit(point))
            .map(|s| s.handle)
    }

    pub fn selected(&self) -> Option<ShapeHandle> {
        self.shapes.iter().find(|s| s.selected).map(|s| s.handle)
    }

    // --- read back ---

    /// Live shapes in insertion (z) order
    pub fn live_shapes(&self) -> &[LiveShape] {
        &self.shapes
    }

    pub fn shape(&self, handle: ShapeHandle) -> Option<&LiveShape> {
        self.shapes.iter().find(|s| s.handle == handle)
    }

    /// Flatten canvas, background and shapes into one image
    pub fn render(&self) -> RgbaImage {
        let background = self
            .background
            .as_ref()
            .map(|bg| (&bg.image, i64::from(bg.x), i64::from(bg.y)));
        let mut img = render::image::compose_background(self.width, self.height, background);
        render::image::draw_shapes_on_image(&mut img, &self.shapes, self.stroke_width);
        img
    }

    /// Render for on-screen display: selection outline and the stroke in progress
    pub fn render_preview(&self) -> RgbaImage {
        let mut img = self.render();
        if let Some(stroke) = &self.stroke {
            let pending = LiveShape {
                handle: ShapeHandle(0),
                label: stroke.label.clone(),
                color: config::label_color(&stroke.label),
                body: LiveBody::Freehand {
                    points: stroke.points.clone(),
                },
                selected: false,
                fresh: false,
            };
            render::image::draw_shapes_on_image(
                &mut img,
                std::slice::from_ref(&pending),
                self.stroke_width,
            );
        }
        render::image::draw_selection_on_image(&mut img, &self.shapes);
        img
    }

    /// Flattened canvas as PNG bytes
    pub fn export_raster(&self) -> Result<Vec<u8>, RenderError> {
        let img = self.render();
        let mut out = Cursor::new(Vec::new());
        render::image::write_png(&mut out, &img)?;
        Ok(out.into_inner())
    }

    // --- dirty tracking ---

    /// Whether shapes changed since the last acknowledged save
    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    /// Current shape revision, captured when a save begins
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Record that the shapes as of `revision` were persisted
    ///
    /// Edits made after `revision` keep the engine dirty.
    pub fn acknowledge_save(&mut self, revision: u64) {
        self.saved_revision = revision.min(self.revision);
    }

    /// Take the queued notifications
    pub fn drain_events(&mut self) -> Vec<CanvasEvent> {
        std::mem::take(&mut self.events)
    }
}
