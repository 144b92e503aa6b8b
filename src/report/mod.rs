//! Report compositor
//!
//! - Picture fetching and decoding for the three slots
//! - Pure page layout ([`layout::plan`])
//! - PDF rendering of a layout with `printpdf`

pub mod fetch;
pub mod layout;
pub mod pdf;

use chrono::NaiveDate;

use crate::domain::{Recommendations, Submission};
use crate::error::RenderError;

pub use fetch::{SlotPictures, fetch_report_images};
pub use layout::{ImageSource, Item, ReportLayout, plan};

/// Lay out and render the report for a submission
pub fn compose(
    submission: &Submission,
    recommendations: &Recommendations,
    pictures: &SlotPictures,
    date: NaiveDate,
    title: &str,
) -> Result<Vec<u8>, RenderError> {
    let layout = plan(
        submission,
        recommendations,
        date,
        title,
        fetch::availability(pictures),
    );
    log::debug!(
        "Report for {} laid out on {} page(s)",
        submission.id,
        layout.pages.len()
    );
    pdf::render_pdf(&layout, pictures, title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssetRef, PatientInfo, SlotId, SlotImages};
    use chrono::Utc;
    use image::RgbImage;

    fn asset(id: &str) -> AssetRef {
        AssetRef {
            url: format!("memory://images/{id}"),
            id: id.to_string(),
        }
    }

    #[test]
    fn test_compose_produces_pdf() {
        let submission = Submission::new(
            "s1",
            PatientInfo {
                name: "Dev".to_string(),
                email: "dev@example.com".to_string(),
                note: None,
            },
            SlotImages::new(asset("u"), asset("f"), asset("l")),
            Utc::now(),
        );
        let pictures: SlotPictures = [
            Ok(RgbImage::from_pixel(80, 60, image::Rgb([255, 0, 0]))),
            Err(RenderError::ImageUnavailable {
                slot: SlotId::FrontTeeth,
                reason: "missing".to_string(),
            }),
            Ok(RgbImage::from_pixel(60, 80, image::Rgb([0, 0, 255]))),
        ];
        let mut recommendations = Recommendations::new();
        recommendations.insert("Stains".to_string(), "Scaling and polishing".to_string());

        let bytes = compose(
            &submission,
            &recommendations,
            &pictures,
            NaiveDate::from_ymd_opt(2025, 9, 9).unwrap(),
            "Oral Health Screening Report",
        )
        .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
