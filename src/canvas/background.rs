//! Background photo decoding and placement

use image::RgbaImage;
use image::imageops::FilterType;

use crate::error::ImageDecodeError;
use crate::render::geometry::aspect_fit;

/// A decoded background, already scaled and centered for a canvas size
#[derive(Clone, Debug)]
pub struct Background {
    /// Scaled pixels
    pub image: RgbaImage,
    /// Left offset on the canvas
    pub x: u32,
    /// Top offset on the canvas
    pub y: u32,
    /// Scale factor applied to the source image
    pub scale: f32,
    /// Source image size before scaling
    pub source_size: (u32, u32),
}

impl Background {
    /// Decode raster bytes and aspect-fit them into a canvas of the given size
    pub fn decode(bytes: &[u8], canvas_w: u32, canvas_h: u32) -> Result<Self, ImageDecodeError> {
        if bytes.is_empty() {
            return Err(ImageDecodeError::Empty);
        }
        let decoded = image::load_from_memory(bytes)?;
        let (src_w, src_h) = (decoded.width(), decoded.height());
        if src_w == 0 || src_h == 0 {
            return Err(ImageDecodeError::ZeroSize {
                width: src_w,
                height: src_h,
            });
        }

        let (scale, x, y, w, h) = aspect_fit(src_w, src_h, canvas_w, canvas_h);
        let rgba = decoded.to_rgba8();
        let image = if (w, h) == (src_w, src_h) {
            rgba
        } else {
            image::imageops::resize(&rgba, w, h, FilterType::Lanczos3)
        };

        log::debug!(
            "Background {}x{} placed at ({}, {}) as {}x{} (scale {:.3})",
            src_w,
            src_h,
            x,
            y,
            w,
            h,
            scale
        );

        Ok(Self {
            image,
            x: x as u32,
            y: y as u32,
            scale,
            source_size: (src_w, src_h),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_centers_wide_image() {
        let bg = Background::decode(&png_bytes(160, 60), 800, 600).unwrap();
        assert_eq!(bg.scale, 5.0);
        assert_eq!(bg.image.dimensions(), (800, 300));
        assert_eq!((bg.x, bg.y), (0, 150));
        assert_eq!(bg.source_size, (160, 60));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Background::decode(&[], 800, 600),
            Err(ImageDecodeError::Empty)
        ));
        assert!(matches!(
            Background::decode(b"not an image at all", 800, 600),
            Err(ImageDecodeError::Decode(_))
        ));
    }
}
