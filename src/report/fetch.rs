//! Fetching and decoding the three slot pictures for a report

use image::RgbImage;

use super::layout::{Availability, CELL_HEIGHT, CELL_WIDTH};
use crate::domain::{SlotId, Submission};
use crate::error::RenderError;
use crate::store::ImageStore;

/// Decoded picture per slot, in [`SlotId::ALL`] order
pub type SlotPictures = [Result<RgbImage, RenderError>; 3];

/// Largest embedded picture, a few pixels per point of the cell
const MAX_PICTURE_WIDTH: u32 = (CELL_WIDTH * 4.0) as u32;
const MAX_PICTURE_HEIGHT: u32 = (CELL_HEIGHT * 4.0) as u32;

pub fn availability(pictures: &SlotPictures) -> Availability {
    [pictures[0].is_ok(), pictures[1].is_ok(), pictures[2].is_ok()]
}

/// Decode picture bytes, shrinking large photos to what a report cell needs
pub fn decode_picture(slot: SlotId, bytes: &[u8]) -> Result<RgbImage, RenderError> {
    let unavailable = |reason: String| RenderError::ImageUnavailable { slot, reason };
    let decoded = image::load_from_memory(bytes).map_err(|e| unavailable(e.to_string()))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(unavailable("image has zero size".to_string()));
    }
    let fitted = if decoded.width() > MAX_PICTURE_WIDTH || decoded.height() > MAX_PICTURE_HEIGHT {
        decoded.resize(
            MAX_PICTURE_WIDTH,
            MAX_PICTURE_HEIGHT,
            image::imageops::FilterType::Triangle,
        )
    } else {
        decoded
    };
    Ok(fitted.to_rgb8())
}

async fn fetch_one<S: ImageStore>(
    store: &S,
    submission: &Submission,
    slot: SlotId,
) -> Result<RgbImage, RenderError> {
    let url = submission.slot(slot).display_image().url.clone();
    let bytes = store
        .get_image(&url)
        .await
        .map_err(|e| RenderError::ImageUnavailable {
            slot,
            reason: e.to_string(),
        })?;
    let picture = tokio::task::spawn_blocking(move || decode_picture(slot, &bytes))
        .await
        .map_err(|e| RenderError::ImageUnavailable {
            slot,
            reason: e.to_string(),
        })?;
    if let Err(err) = &picture {
        log::warn!("Report picture for {} unavailable: {}", slot, err);
    }
    picture
}

/// Fetch all three slot pictures concurrently; failures are kept per slot
pub async fn fetch_report_images<S: ImageStore>(store: &S, submission: &Submission) -> SlotPictures {
    let (upper, front, lower) = futures::join!(
        fetch_one(store, submission, SlotId::UpperTeeth),
        fetch_one(store, submission, SlotId::FrontTeeth),
        fetch_one(store, submission, SlotId::LowerTeeth),
    );
    [upper, front, lower]
}
