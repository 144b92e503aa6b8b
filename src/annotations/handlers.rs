//! Pointer handlers
//!
//! Translate pointer down/move/up into canvas engine gestures according to
//! the selected tool.

use crate::canvas::CanvasEngine;
use crate::config::Tool;
use crate::domain::Point;
use crate::error::CanvasError;

/// A pointer event in canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerAction {
    Down(Point),
    Move(Point),
    Up(Point),
}

/// Handle a pointer event with the given tool and active label
pub fn handle_pointer(
    engine: &mut CanvasEngine,
    tool: Tool,
    label: &str,
    action: PointerAction,
) -> Result<(), CanvasError> {
    match action {
        PointerAction::Down(p) => pointer_down(engine, tool, label, p),
        PointerAction::Move(p) => pointer_move(engine, p),
        PointerAction::Up(p) => pointer_up(engine, p),
    }
}

fn pointer_down(
    engine: &mut CanvasEngine,
    tool: Tool,
    label: &str,
    p: Point,
) -> Result<(), CanvasError> {
    if tool.is_stroke_tool() {
        return engine.begin_stroke(label, p);
    }

    // A freshly added shape is sized by the first drag after it appears
    if let Some(fresh) = engine
        .live_shapes()
        .iter()
        .find(|s| s.selected && s.fresh)
        .map(|s| s.handle)
    {
        return engine.begin_resize(fresh, p);
    }

    match engine.select_at(p) {
        Some(handle) => engine.begin_move(handle, p),
        None => Ok(()),
    }
}

fn pointer_move(engine: &mut CanvasEngine, p: Point) -> Result<(), CanvasError> {
    if engine.is_stroking() {
        engine.extend_stroke(p)
    } else if engine.is_dragging() {
        engine.drag_to(p)
    } else {
        // Hover
        Ok(())
    }
}

fn pointer_up(engine: &mut CanvasEngine, p: Point) -> Result<(), CanvasError> {
    if engine.is_stroking() {
        engine.extend_stroke(p)?;
        engine.finish_stroke()?;
    } else if engine.is_dragging() {
        engine.drag_to(p)?;
        engine.end_drag()?;
    }
    Ok(())
}
