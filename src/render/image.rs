//! Raster rendering of the canvas using tiny-skia
//!
//! These functions draw the background and live shapes onto an RgbaImage for
//! preview, export and flattening.

use std::io;

use image::{Rgba, RgbaImage};
use tiny_skia::{LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, StrokeDash, Transform};

use super::geometry::{arrow, shape};
use crate::canvas::{LiveBody, LiveShape};
use crate::domain::Point;

/// Canvas fill behind the background photo
pub const CANVAS_FILL: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Convert RgbaImage to Pixmap, apply drawing function, and copy back
fn with_pixmap(img: &mut RgbaImage, f: impl FnOnce(&mut Pixmap)) {
    let (w, h) = (img.width(), img.height());
    let Some(size) = tiny_skia::IntSize::from_wh(w, h) else {
        return;
    };
    let Some(mut pixmap) = Pixmap::from_vec(img.as_raw().clone(), size) else {
        return;
    };

    f(&mut pixmap);

    img.copy_from_slice(pixmap.data());
}

/// Build an arrow path as stroked lines (shaft + two angled head lines)
fn build_arrow_path(
    start_x: f32,
    start_y: f32,
    end_x: f32,
    end_y: f32,
    head_size: f32,
) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();

    pb.move_to(start_x, start_y);
    pb.line_to(end_x, end_y);

    // Zero-length arrows still draw a round dot for the shaft
    if let Some((head1_x, head1_y, head2_x, head2_y)) =
        arrow::head_points(start_x, start_y, end_x, end_y, head_size)
    {
        pb.move_to(end_x, end_y);
        pb.line_to(head1_x, head1_y);

        pb.move_to(end_x, end_y);
        pb.line_to(head2_x, head2_y);
    }

    pb.finish()
}

/// Build an ellipse path using cubic bezier curves
fn build_ellipse_path(cx: f32, cy: f32, rx: f32, ry: f32) -> Option<tiny_skia::Path> {
    let kx = rx * shape::BEZIER_K;
    let ky = ry * shape::BEZIER_K;

    let mut pb = PathBuilder::new();

    // Start at top
    pb.move_to(cx, cy - ry);
    pb.cubic_to(cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy);
    pb.cubic_to(cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry);
    pb.cubic_to(cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy);
    pb.cubic_to(cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry);

    pb.close();
    pb.finish()
}

fn build_rect_path(left: f32, top: f32, width: f32, height: f32) -> Option<tiny_skia::Path> {
    let mut pb = PathBuilder::new();
    pb.move_to(left, top);
    pb.line_to(left + width, top);
    pb.line_to(left + width, top + height);
    pb.line_to(left, top + height);
    pb.close();
    pb.finish()
}

fn build_polyline_path(points: &[Point]) -> Option<tiny_skia::Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x, first.y);
    if rest.is_empty() {
        // Single-point stroke renders as a dot through the round cap
        pb.line_to(first.x, first.y);
    }
    for p in rest {
        pb.line_to(p.x, p.y);
    }
    pb.finish()
}

/// Outline path of a live body in canvas coordinates
fn body_path(body: &LiveBody) -> Option<tiny_skia::Path> {
    match body {
        LiveBody::Rectangle { .. } => {
            let b = body.bounds();
            build_rect_path(b.left, b.top, b.width, b.height)
        }
        LiveBody::Circle { .. } => {
            let b = body.bounds();
            let c = b.center();
            build_ellipse_path(c.x, c.y, b.width / 2.0, b.height / 2.0)
        }
        LiveBody::Arrow { x1, y1, x2, y2 } => {
            build_arrow_path(*x1, *y1, *x2, *y2, arrow::HEAD_SIZE)
        }
        LiveBody::Freehand { points } => build_polyline_path(points),
    }
}

/// Fill a new image with the canvas color and overlay the placed background
pub fn compose_background(
    width: u32,
    height: u32,
    background: Option<(&RgbaImage, i64, i64)>,
) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(width, height, CANVAS_FILL);
    if let Some((bg, x, y)) = background {
        image::imageops::overlay(&mut img, bg, x, y);
    }
    img
}

/// Stroke live shapes onto an image in z-order, with rounded caps and joins
pub fn draw_shapes_on_image(img: &mut RgbaImage, shapes: &[LiveShape], stroke_width: f32) {
    if shapes.is_empty() {
        return;
    }

    with_pixmap(img, |pixmap| {
        let stroke = Stroke {
            width: stroke_width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Default::default()
        };

        for live in shapes {
            let Some(path) = body_path(&live.body) else {
                continue;
            };
            let [r, g, b, a] = live.color.to_rgba_u8();
            let mut paint = Paint::default();
            paint.set_color_rgba8(r, g, b, a);
            paint.anti_alias = true;

            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    });
}

/// Draw a dashed box around the selected shape, for previews only
pub fn draw_selection_on_image(img: &mut RgbaImage, shapes: &[LiveShape]) {
    let Some(selected) = shapes.iter().find(|s| s.selected) else {
        return;
    };

    with_pixmap(img, |pixmap| {
        let b = selected.body.bounds().inflate(shape::HIT_SLOP);
        let Some(path) = build_rect_path(b.left, b.top, b.width, b.height) else {
            return;
        };

        let mut paint = Paint::default();
        paint.set_color_rgba8(30, 144, 255, 255);
        paint.anti_alias = true;

        let stroke = Stroke {
            width: 1.0,
            dash: StrokeDash::new(vec![4.0, 4.0], 0.0),
            ..Default::default()
        };
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    });
}

/// Encode an RGBA image as PNG
pub fn write_png<W: io::Write>(w: W, image: &RgbaImage) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(w, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(image.as_raw())
}
