//! Shared geometry calculations for annotations
//!
//! Constants and math used by both the canvas hit-testing and the tiny-skia
//! rasterizer.

/// Arrow geometry constants
pub mod arrow {
    /// Arrowhead line length in canvas pixels
    pub const HEAD_SIZE: f32 = 15.0;
    /// Arrowhead angle from shaft in radians (30 degrees)
    pub const HEAD_ANGLE: f32 = std::f32::consts::FRAC_PI_6;
    /// Minimum arrow length for a head to be drawn
    pub const MIN_LENGTH: f32 = 1.0;

    /// Calculate arrow head points given start, end, and head size
    /// Returns (head1_x, head1_y, head2_x, head2_y) for the two head lines
    pub fn head_points(
        start_x: f32,
        start_y: f32,
        end_x: f32,
        end_y: f32,
        head_size: f32,
    ) -> Option<(f32, f32, f32, f32)> {
        let dx = end_x - start_x;
        let dy = end_y - start_y;
        let length = (dx * dx + dy * dy).sqrt();
        if length < MIN_LENGTH {
            return None;
        }

        // Unit direction vector (pointing from start to end)
        let nx = dx / length;
        let ny = dy / length;

        let cos_a = HEAD_ANGLE.cos();
        let sin_a = HEAD_ANGLE.sin();

        // First head line (rotated clockwise from arrow direction)
        let head1_dx = -nx * cos_a - (-ny) * sin_a;
        let head1_dy = -nx * sin_a + (-ny) * cos_a;

        // Second head line (rotated counter-clockwise)
        let head2_dx = -nx * cos_a + (-ny) * sin_a;
        let head2_dy = -nx * (-sin_a) + (-ny) * cos_a;

        Some((
            end_x + head1_dx * head_size,
            end_y + head1_dy * head_size,
            end_x + head2_dx * head_size,
            end_y + head2_dy * head_size,
        ))
    }
}

/// Shape (rectangle/circle/freehand) geometry constants
pub mod shape {
    /// Extra tolerance around thin shapes when hit-testing, in canvas pixels
    pub const HIT_SLOP: f32 = 6.0;

    /// Ellipse bezier approximation constant: 4/3 * (sqrt(2) - 1)
    pub const BEZIER_K: f32 = 0.552_284_8;
}

/// Distance from point (px, py) to the segment (ax, ay)-(bx, by)
pub fn distance_to_segment(px: f32, py: f32, ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq <= f32::EPSILON {
        0.0
    } else {
        (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

/// Scale factor and offset that fit an image into a canvas, centered
///
/// Returns (scale, offset_x, offset_y, scaled_width, scaled_height).
pub fn aspect_fit(
    image_w: u32,
    image_h: u32,
    canvas_w: u32,
    canvas_h: u32,
) -> (f32, f32, f32, u32, u32) {
    let scale = (canvas_w as f32 / image_w as f32).min(canvas_h as f32 / image_h as f32);
    let w = ((image_w as f32 * scale).round() as u32).clamp(1, canvas_w);
    let h = ((image_h as f32 * scale).round() as u32).clamp(1, canvas_h);
    let x = (canvas_w - w) as f32 / 2.0;
    let y = (canvas_h - h) as f32 / 2.0;
    (scale, x, y, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_points_symmetric() {
        let (h1x, h1y, h2x, h2y) = arrow::head_points(0.0, 0.0, 100.0, 0.0, 15.0).unwrap();
        // Both head lines point back along the shaft
        assert!(h1x < 100.0 && h2x < 100.0);
        assert!((h1x - h2x).abs() < 1e-4);
        assert!((h1y + h2y).abs() < 1e-4);
        let len = ((100.0 - h1x).powi(2) + h1y.powi(2)).sqrt();
        assert!((len - 15.0).abs() < 1e-3);
    }

    #[test]
    fn test_head_points_degenerate() {
        assert!(arrow::head_points(5.0, 5.0, 5.0, 5.0, 15.0).is_none());
    }

    #[test]
    fn test_distance_to_segment() {
        assert!((distance_to_segment(5.0, 3.0, 0.0, 0.0, 10.0, 0.0) - 3.0).abs() < 1e-5);
        assert!((distance_to_segment(13.0, 4.0, 0.0, 0.0, 10.0, 0.0) - 5.0).abs() < 1e-5);
        assert!((distance_to_segment(3.0, 4.0, 0.0, 0.0, 0.0, 0.0) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_aspect_fit_wide_image() {
        let (scale, x, y, w, h) = aspect_fit(1600, 600, 800, 600);
        assert_eq!(scale, 0.5);
        assert_eq!((w, h), (800, 300));
        assert_eq!((x, y), (0.0, 150.0));
    }

    #[test]
    fn test_aspect_fit_tall_image_upscaled() {
        let (scale, x, y, w, h) = aspect_fit(100, 200, 800, 600);
        assert_eq!(scale, 3.0);
        assert_eq!((w, h), (300, 600));
        assert_eq!((x, y), (250.0, 0.0));
    }
}
