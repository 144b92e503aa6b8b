//! Directory-backed store
//!
//! Layout under the data directory:
//!
//! ```text
//! images/<id>.<ext>
//! reports/<id>.pdf
//! submissions/<id>.json
//! ```
//!
//! Blobs are addressed by `file://` URLs.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::{ImageStore, ReportStore, SubmissionStore, image_extension};
use crate::domain::{
    AssetRef, Submission, SubmissionFilter, SubmissionPage, SubmissionStats, SubmissionUpdate,
};
use crate::error::PersistenceError;

const FILE_SCHEME: &str = "file://";

#[derive(Clone, Debug)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Open (and create if needed) a store rooted at `root`
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let root = std::path::absolute(root.as_ref())?;
        for sub in ["images", "reports", "submissions"] {
            tokio::fs::create_dir_all(root.join(sub)).await?;
        }
        log::debug!("Opened data directory {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn submission_path(&self, id: &str) -> Result<PathBuf, PersistenceError> {
        // Ids become file names; refuse anything that could escape the directory
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(PersistenceError::not_found("submission", id));
        }
        Ok(self.root.join("submissions").join(format!("{id}.json")))
    }

    async fn put_blob(
        &self,
        dir: &str,
        ext: &str,
        bytes: Vec<u8>,
    ) -> Result<AssetRef, PersistenceError> {
        let id = Uuid::new_v4().to_string();
        let path = self.root.join(dir).join(format!("{id}.{ext}"));
        tokio::fs::write(&path, bytes).await?;
        Ok(AssetRef {
            url: format!("{FILE_SCHEME}{}", path.display()),
            id,
        })
    }

    async fn write_submission(&self, submission: &Submission) -> Result<(), PersistenceError> {
        let path = self.submission_path(&submission.id)?;
        let json = serde_json::to_vec_pretty(submission)?;
        // Write then rename so readers never see a partial record
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Every readable submission record; unreadable files are logged and skipped
    async fn read_all_submissions(&self) -> Result<Vec<Submission>, PersistenceError> {
        let mut entries = tokio::fs::read_dir(self.root.join("submissions")).await?;
        let mut submissions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = tokio::fs::read(&path)
                .await
                .map_err(PersistenceError::from)
                .and_then(|bytes| Ok(serde_json::from_slice::<Submission>(&bytes)?));
            match parsed {
                Ok(submission) => submissions.push(submission),
                Err(err) => log::warn!("Skipping {}: {}", path.display(), err),
            }
        }
        Ok(submissions)
    }

    /// Path on disk behind a `file://` URL
    pub fn path_of(url: &str) -> Option<PathBuf> {
        url.strip_prefix(FILE_SCHEME).map(PathBuf::from)
    }
}

fn not_found_or_io(err: std::io::Error, what: &'static str, id: &str) -> PersistenceError {
    if err.kind() == std::io::ErrorKind::NotFound {
        PersistenceError::not_found(what, id)
    } else {
        PersistenceError::Io(err)
    }
}

impl ImageStore for DirStore {
    async fn put_image(&self, bytes: Vec<u8>) -> Result<AssetRef, PersistenceError> {
        let ext = image_extension(&bytes);
        self.put_blob("images", ext, bytes).await
    }

    async fn get_image(&self, url: &str) -> Result<Vec<u8>, PersistenceError> {
        let path = Self::path_of(url).ok_or_else(|| PersistenceError::not_found("image", url))?;
        tokio::fs::read(&path)
            .await
            .map_err(|err| not_found_or_io(err, "image", url))
    }
}

impl ReportStore for DirStore {
    async fn put_report(&self, pdf: Vec<u8>) -> Result<AssetRef, PersistenceError> {
        self.put_blob("reports", "pdf", pdf).await
    }
}

impl SubmissionStore for DirStore {
    async fn create_submission(&self, submission: Submission) -> Result<(), PersistenceError> {
        let path = self.submission_path(&submission.id)?;
        if tokio::fs::try_exists(&path).await? {
            return Err(PersistenceError::AlreadyExists {
                what: "submission",
                id: submission.id,
            });
        }
        self.write_submission(&submission).await
    }

    async fn get_submission(&self, id: &str) -> Result<Submission, PersistenceError> {
        let path = self.submission_path(id)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| not_found_or_io(err, "submission", id))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn update_submission(
        &self,
        id: &str,
        update: SubmissionUpdate,
    ) -> Result<Submission, PersistenceError> {
        let mut submission = self.get_submission(id).await?;
        submission.apply(update)?;
        self.write_submission(&submission).await?;
        Ok(submission)
    }

    async fn list_submissions(
        &self,
        filter: &SubmissionFilter,
    ) -> Result<SubmissionPage, PersistenceError> {
        let all = self.read_all_submissions().await?;
        Ok(SubmissionPage::select(all, filter))
    }

    async fn submission_stats(&self) -> Result<SubmissionStats, PersistenceError> {
        let all = self.read_all_submissions().await?;
        Ok(SubmissionStats::collect(all))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Geometry, PatientInfo, Shape, SlotId, SlotImages, Status};
    use chrono::Utc;

    async fn seeded(store: &DirStore) -> Submission {
        let png = {
            let img = image::RgbImage::new(4, 4);
            let mut out = std::io::Cursor::new(Vec::new());
            img.write_to(&mut out, image::ImageFormat::Png).unwrap();
            out.into_inner()
        };
        let upper = store.put_image(png.clone()).await.unwrap();
        let front = store.put_image(png.clone()).await.unwrap();
        let lower = store.put_image(png).await.unwrap();
        let submission = Submission::new(
            "sub-1",
            PatientInfo {
                name: "Ravi".to_string(),
                email: "ravi@example.com".to_string(),
                note: None,
            },
            SlotImages::new(upper, front, lower),
            Utc::now(),
        );
        store.create_submission(submission.clone()).await.unwrap();
        submission
    }

    #[tokio::test]
    async fn test_images_are_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).await.unwrap();
        let submission = seeded(&store).await;

        let url = &submission.slot(SlotId::FrontTeeth).original.url;
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(".png"));
        let path = DirStore::path_of(url).unwrap();
        assert!(path.starts_with(store.root()));
        assert!(!store.get_image(url).await.unwrap().is_empty());

        assert!(matches!(
            store.get_image("file:///definitely/not/here.png").await,
            Err(PersistenceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).await.unwrap();
        seeded(&store).await;

        let annotated = store.put_image(b"jpeg".to_vec()).await.unwrap();
        let update = SubmissionUpdate::Annotations {
            slot: SlotId::UpperTeeth,
            shapes: vec![Shape::new(
                "Stains",
                Geometry::Rectangle {
                    left: 1.0,
                    top: 2.0,
                    width: 3.0,
                    height: 4.0,
                },
            )],
            annotated_image: annotated.clone(),
            saved_at: Utc::now(),
        };
        let updated = store.update_submission("sub-1", update).await.unwrap();
        assert_eq!(updated.status, Status::Annotated);

        let reopened = DirStore::open(dir.path()).await.unwrap();
        let stored = reopened.get_submission("sub-1").await.unwrap();
        assert_eq!(stored, updated);
        assert_eq!(
            stored.slot(SlotId::UpperTeeth).annotated.as_ref(),
            Some(&annotated)
        );
    }

    #[tokio::test]
    async fn test_listing_skips_stray_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).await.unwrap();
        seeded(&store).await;
        let submissions = dir.path().join("submissions");
        tokio::fs::write(submissions.join("broken.json"), b"{").await.unwrap();
        tokio::fs::write(submissions.join("notes.txt"), b"hello").await.unwrap();

        let page = store
            .list_submissions(&SubmissionFilter {
                email: Some("RAVI@example.com".to_string()),
                ..SubmissionFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.submissions[0].id, "sub-1");

        let stats = store.submission_stats().await.unwrap();
        assert_eq!((stats.total, stats.uploaded), (1, 1));
    }

    #[tokio::test]
    async fn test_bad_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store.get_submission("../escape").await,
            Err(PersistenceError::NotFound { .. })
        ));
        assert!(matches!(
            store.get_submission("missing").await,
            Err(PersistenceError::NotFound { .. })
        ));
    }
}
