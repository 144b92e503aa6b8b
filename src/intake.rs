//! Patient intake: validate the form and photos, then create a submission

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{PatientInfo, SlotId, SlotImages, Submission};
use crate::error::{IntakeError, ValidationError};
use crate::store::{ImageStore, SubmissionStore};

/// Patient details as entered on the intake form
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntakeForm {
    pub name: String,
    pub email: String,
    pub note: Option<String>,
}

/// Photo bytes per slot, in [`SlotId::ALL`] order
pub type IntakePhotos = [Option<Vec<u8>>; 3];

fn validate_patient(form: &IntakeForm) -> Result<PatientInfo, ValidationError> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(ValidationError::InvalidPatient {
            field: "name",
            reason: "is required",
        });
    }
    let email = form.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::InvalidPatient {
            field: "email",
            reason: "is required",
        });
    }
    if !email.contains('@') {
        return Err(ValidationError::InvalidPatient {
            field: "email",
            reason: "must contain '@'",
        });
    }
    let note = form
        .note
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    Ok(PatientInfo {
        name: name.to_string(),
        email,
        note,
    })
}

fn validate_photos(photos: IntakePhotos) -> Result<[Vec<u8>; 3], ValidationError> {
    let [upper, front, lower] = photos;
    let check = |slot: SlotId, bytes: Option<Vec<u8>>| {
        let bytes = bytes
            .filter(|b| !b.is_empty())
            .ok_or(ValidationError::MissingImage(slot))?;
        let decoded =
            image::load_from_memory(&bytes).map_err(|_| ValidationError::UnsupportedImage(slot))?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(ValidationError::UnsupportedImage(slot));
        }
        Ok::<_, ValidationError>(bytes)
    };
    Ok([
        check(SlotId::UpperTeeth, upper)?,
        check(SlotId::FrontTeeth, front)?,
        check(SlotId::LowerTeeth, lower)?,
    ])
}

/// Validate an intake, store the three originals and create the submission
///
/// Nothing is written unless the form and every photo pass validation.
pub async fn submit<S>(
    form: &IntakeForm,
    photos: IntakePhotos,
    store: &S,
) -> Result<Submission, IntakeError>
where
    S: ImageStore + SubmissionStore,
{
    let patient = validate_patient(form)?;
    let [upper, front, lower] = validate_photos(photos)?;

    let upper = store.put_image(upper).await?;
    let front = store.put_image(front).await?;
    let lower = store.put_image(lower).await?;

    let submission = Submission::new(
        Uuid::new_v4().to_string(),
        patient,
        SlotImages::new(upper, front, lower),
        Utc::now(),
    );
    store.create_submission(submission.clone()).await?;
    log::info!(
        "Created submission {} for {}",
        submission.id,
        submission.patient.email
    );
    Ok(submission)
}
