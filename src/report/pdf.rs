//! PDF backend for report layouts via `printpdf`

use std::io::BufWriter;

use image::RgbImage;
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfLayerReference, Point, Polygon, Rgb,
};

use super::fetch::SlotPictures;
use super::layout::{Frame, Item, PAGE_HEIGHT, PAGE_WIDTH, ReportLayout};
use crate::config::ShapeColor;
use crate::error::RenderError;

/// Resolution images are embedded at
const IMAGE_DPI: f32 = 300.0;
/// Segments per rounded corner
const CORNER_STEPS: usize = 6;
/// Baseline offset from the top of a text line, as a fraction of font size
const ASCENT: f32 = 0.8;

fn mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

/// Page-space point from top-left layout coordinates
fn point(x: f32, y: f32) -> Point {
    Point::new(mm(x), mm(PAGE_HEIGHT - y))
}

fn color(c: ShapeColor) -> Color {
    Color::Rgb(Rgb::new(c.r, c.g, c.b, None))
}

/// Outline of a box with rounded corners, clockwise from the top-left
fn rounded_outline(frame: &Frame, radius: f32) -> Vec<(Point, bool)> {
    let r = radius.clamp(0.0, frame.width.min(frame.height) / 2.0);
    let (x0, y0) = (frame.x, frame.y);
    let (x1, y1) = (frame.x + frame.width, frame.y + frame.height);
    if r <= f32::EPSILON {
        return vec![
            (point(x0, y0), false),
            (point(x1, y0), false),
            (point(x1, y1), false),
            (point(x0, y1), false),
        ];
    }

    // (corner center, start angle) for each corner in drawing order
    let corners = [
        ((x1 - r, y0 + r), -std::f32::consts::FRAC_PI_2),
        ((x1 - r, y1 - r), 0.0),
        ((x0 + r, y1 - r), std::f32::consts::FRAC_PI_2),
        ((x0 + r, y0 + r), std::f32::consts::PI),
    ];
    let mut points = Vec::with_capacity(4 * (CORNER_STEPS + 1));
    for ((cx, cy), start) in corners {
        for step in 0..=CORNER_STEPS {
            let a = start + std::f32::consts::FRAC_PI_2 * step as f32 / CORNER_STEPS as f32;
            points.push((point(cx + r * a.cos(), cy + r * a.sin()), false));
        }
    }
    points
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn paint_item(layer: &PdfLayerReference, fonts: &Fonts, pictures: &SlotPictures, item: &Item) {
    match item {
        Item::Box {
            frame,
            radius,
            fill,
            stroke,
        } => {
            let mode = match (fill, stroke) {
                (Some(_), Some(_)) => PaintMode::FillStroke,
                (Some(_), None) => PaintMode::Fill,
                (None, Some(_)) => PaintMode::Stroke,
                (None, None) => return,
            };
            if let Some(fill) = fill {
                layer.set_fill_color(color(*fill));
            }
            if let Some((outline, width)) = stroke {
                layer.set_outline_color(color(*outline));
                layer.set_outline_thickness(*width);
            }
            layer.add_polygon(Polygon {
                rings: vec![rounded_outline(frame, *radius)],
                mode,
                winding_order: WindingOrder::NonZero,
            });
        }
        Item::Text {
            text,
            x,
            y,
            size,
            bold,
            color: ink,
        } => {
            let font = if *bold { &fonts.bold } else { &fonts.regular };
            layer.set_fill_color(color(*ink));
            layer.use_text(text.as_str(), *size, mm(*x), mm(PAGE_HEIGHT - (y + size * ASCENT)), font);
        }
        Item::Image { slot, frame, .. } => {
            // Unavailable pictures never get an image item from the planner
            if let Ok(picture) = &pictures[slot.index()] {
                place_image(layer, picture, frame);
            }
        }
    }
}

/// Embed a picture fitted and centered inside `frame`
fn place_image(layer: &PdfLayerReference, picture: &RgbImage, frame: &Frame) {
    let (w, h) = picture.dimensions();
    let Some(buffer) =
        printpdf::image_crate::RgbImage::from_raw(w, h, picture.as_raw().clone())
    else {
        log::warn!("Skipping picture with inconsistent buffer size {}x{}", w, h);
        return;
    };
    let dynamic = printpdf::image_crate::DynamicImage::ImageRgb8(buffer);

    // Natural size in points at the embedding resolution
    let natural_w = w as f32 * 72.0 / IMAGE_DPI;
    let natural_h = h as f32 * 72.0 / IMAGE_DPI;
    let scale = (frame.width / natural_w).min(frame.height / natural_h);
    let draw_w = natural_w * scale;
    let draw_h = natural_h * scale;
    let left = frame.x + (frame.width - draw_w) / 2.0;
    let bottom = frame.y + (frame.height - draw_h) / 2.0 + draw_h;

    Image::from_dynamic_image(&dynamic).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(mm(left)),
            translate_y: Some(mm(PAGE_HEIGHT - bottom)),
            scale_x: Some(scale),
            scale_y: Some(scale),
            dpi: Some(IMAGE_DPI),
            ..Default::default()
        },
    );
}

/// Paint a layout into a PDF document and return its bytes
pub fn render_pdf(
    layout: &ReportLayout,
    pictures: &SlotPictures,
    title: &str,
) -> Result<Vec<u8>, RenderError> {
    let (width, height) = (mm(PAGE_WIDTH), mm(PAGE_HEIGHT));
    let (doc, first_page, first_layer) = PdfDocument::new(title, width, height, "Layer 1");
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| RenderError::Pdf(format!("font error: {e}")))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| RenderError::Pdf(format!("font error: {e}")))?,
    };

    for (index, items) in layout.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(width, height, "Layer 1");
            doc.get_page(page).get_layer(layer)
        };
        for item in items {
            paint_item(&layer, &fonts, pictures, item);
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| RenderError::Pdf(format!("save error: {e}")))?;
    buf.into_inner()
        .map_err(|e| RenderError::Pdf(format!("buffer error: {e}")))
}
