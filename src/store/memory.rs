//! In-memory store
//!
//! Holds everything behind a single `tokio::sync::Mutex`. Used by tests and
//! by hosts that embed the annotation core without persistence.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ImageStore, ReportStore, SubmissionStore};
use crate::domain::{
    AssetRef, Submission, SubmissionFilter, SubmissionPage, SubmissionStats, SubmissionUpdate,
};
use crate::error::PersistenceError;

const IMAGE_SCHEME: &str = "memory://images/";
const REPORT_SCHEME: &str = "memory://reports/";

#[derive(Debug, Default)]
struct Inner {
    images: HashMap<String, Vec<u8>>,
    reports: HashMap<String, Vec<u8>>,
    submissions: HashMap<String, Submission>,
}

/// Cheaply cloneable handle to a shared in-memory store
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of a stored report, for inspection
    pub async fn report_bytes(&self, url: &str) -> Option<Vec<u8>> {
        let id = url.strip_prefix(REPORT_SCHEME)?;
        self.inner.lock().await.reports.get(id).cloned()
    }

    pub async fn image_count(&self) -> usize {
        self.inner.lock().await.images.len()
    }
}

impl ImageStore for MemoryStore {
    async fn put_image(&self, bytes: Vec<u8>) -> Result<AssetRef, PersistenceError> {
        let id = Uuid::new_v4().to_string();
        let url = format!("{IMAGE_SCHEME}{id}");
        self.inner.lock().await.images.insert(id.clone(), bytes);
        Ok(AssetRef { url, id })
    }

    async fn get_image(&self, url: &str) -> Result<Vec<u8>, PersistenceError> {
        let id = url
            .strip_prefix(IMAGE_SCHEME)
            .ok_or_else(|| PersistenceError::not_found("image", url))?;
        self.inner
            .lock()
            .await
            .images
            .get(id)
            .cloned()
            .ok_or_else(|| PersistenceError::not_found("image", url))
    }
}

impl ReportStore for MemoryStore {
    async fn put_report(&self, pdf: Vec<u8>) -> Result<AssetRef, PersistenceError> {
        let id = Uuid::new_v4().to_string();
        let url = format!("{REPORT_SCHEME}{id}");
        self.inner.lock().await.reports.insert(id.clone(), pdf);
        Ok(AssetRef { url, id })
    }
}

impl SubmissionStore for MemoryStore {
    async fn create_submission(&self, submission: Submission) -> Result<(), PersistenceError> {
        let mut inner = self.inner.lock().await;
        if inner.submissions.contains_key(&submission.id) {
            return Err(PersistenceError::AlreadyExists {
                what: "submission",
                id: submission.id,
            });
        }
        inner.submissions.insert(submission.id.clone(), submission);
        Ok(())
    }

    async fn get_submission(&self, id: &str) -> Result<Submission, PersistenceError> {
        self.inner
            .lock()
            .await
            .submissions
            .get(id)
            .cloned()
            .ok_or_else(|| PersistenceError::not_found("submission", id))
    }

    async fn update_submission(
        &self,
        id: &str,
        update: SubmissionUpdate,
    ) -> Result<Submission, PersistenceError> {
        let mut inner = self.inner.lock().await;
        let stored = inner
            .submissions
            .get_mut(id)
            .ok_or_else(|| PersistenceError::not_found("submission", id))?;
        // Apply to a copy so a rejected update leaves the record untouched
        let mut updated = stored.clone();
        updated.apply(update)?;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn list_submissions(
        &self,
        filter: &SubmissionFilter,
    ) -> Result<SubmissionPage, PersistenceError> {
        let all = self.inner.lock().await.submissions.values().cloned().collect();
        Ok(SubmissionPage::select(all, filter))
    }

    async fn submission_stats(&self) -> Result<SubmissionStats, PersistenceError> {
        let all = self.inner.lock().await.submissions.values().cloned().collect();
        Ok(SubmissionStats::collect(all))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PatientInfo, SlotImages, Status};
    use chrono::Utc;

    fn asset(id: &str) -> AssetRef {
        AssetRef {
            url: format!("{IMAGE_SCHEME}{id}"),
            id: id.to_string(),
        }
    }

    fn submission(id: &str) -> Submission {
        Submission::new(
            id,
            PatientInfo {
                name: "Asha".to_string(),
                email: "asha@example.com".to_string(),
                note: None,
            },
            SlotImages::new(asset("u"), asset("f"), asset("l")),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_image_roundtrip() {
        let store = MemoryStore::new();
        let asset = store.put_image(vec![1, 2, 3]).await.unwrap();
        assert!(asset.url.ends_with(&asset.id));
        assert_eq!(store.get_image(&asset.url).await.unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            store.get_image("memory://images/missing").await,
            Err(PersistenceError::NotFound { what: "image", .. })
        ));
    }

    #[tokio::test]
    async fn test_submission_create_and_duplicate() {
        let store = MemoryStore::new();
        store.create_submission(submission("s1")).await.unwrap();
        assert!(matches!(
            store.create_submission(submission("s1")).await,
            Err(PersistenceError::AlreadyExists { .. })
        ));
        assert_eq!(store.get_submission("s1").await.unwrap().status, Status::Uploaded);
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_record() {
        let store = MemoryStore::new();
        store.create_submission(submission("s1")).await.unwrap();
        let report = SubmissionUpdate::Report {
            report: asset("r"),
            generated_at: Utc::now(),
        };
        assert!(matches!(
            store.update_submission("s1", report).await,
            Err(PersistenceError::Rejected(_))
        ));
        let stored = store.get_submission("s1").await.unwrap();
        assert_eq!(stored.status, Status::Uploaded);
        assert!(stored.report.is_none());
    }

    #[tokio::test]
    async fn test_list_and_stats() {
        let store = MemoryStore::new();
        for id in ["s1", "s2", "s3"] {
            store.create_submission(submission(id)).await.unwrap();
        }
        let page = store
            .list_submissions(&SubmissionFilter {
                limit: 2,
                ..SubmissionFilter::default()
            })
            .await
            .unwrap();
        assert_eq!((page.total, page.pages, page.submissions.len()), (3, 2, 2));

        let stats = store.submission_stats().await.unwrap();
        assert_eq!((stats.total, stats.uploaded, stats.annotated), (3, 3, 0));
        assert_eq!(stats.recent.len(), 3);
    }
}
