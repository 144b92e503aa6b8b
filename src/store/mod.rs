//! Storage collaborators: image blobs, submissions and report documents
//!
//! The session and report modules only see these traits. Two
//! implementations ship with the crate: [`memory::MemoryStore`] for tests and
//! embedding, and [`fs::DirStore`] for a data directory on disk.

pub mod fs;
pub mod memory;

use std::future::Future;

use crate::domain::{AssetRef, Submission, SubmissionFilter, SubmissionPage, SubmissionStats, SubmissionUpdate};
use crate::error::PersistenceError;

pub use fs::DirStore;
pub use memory::MemoryStore;

/// Blob storage for original and annotated photos
pub trait ImageStore: Send + Sync {
    /// Store bytes and return their reference
    fn put_image(
        &self,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<AssetRef, PersistenceError>> + Send;

    /// Fetch the bytes behind a URL returned by `put_image`
    fn get_image(&self, url: &str)
    -> impl Future<Output = Result<Vec<u8>, PersistenceError>> + Send;
}

/// Submission records
pub trait SubmissionStore: Send + Sync {
    /// Persist a new submission; its id must be unused
    fn create_submission(
        &self,
        submission: Submission,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    fn get_submission(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Submission, PersistenceError>> + Send;

    /// Apply exactly one partial update and return the stored result
    fn update_submission(
        &self,
        id: &str,
        update: SubmissionUpdate,
    ) -> impl Future<Output = Result<Submission, PersistenceError>> + Send;

    /// One page of submissions matching `filter`, newest first
    fn list_submissions(
        &self,
        filter: &SubmissionFilter,
    ) -> impl Future<Output = Result<SubmissionPage, PersistenceError>> + Send;

    /// Counts per status and the most recent submissions
    fn submission_stats(
        &self,
    ) -> impl Future<Output = Result<SubmissionStats, PersistenceError>> + Send;
}

/// Storage for generated PDF reports
pub trait ReportStore: Send + Sync {
    fn put_report(
        &self,
        pdf: Vec<u8>,
    ) -> impl Future<Output = Result<AssetRef, PersistenceError>> + Send;
}

/// Everything a session needs from storage
pub trait Backend: ImageStore + SubmissionStore + ReportStore {}

impl<T: ImageStore + SubmissionStore + ReportStore> Backend for T {}

/// File extension for stored image bytes, from their magic number
pub(crate) fn image_extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => "jpg",
        Ok(image::ImageFormat::Png) => "png",
        Ok(image::ImageFormat::WebP) => "webp",
        Ok(image::ImageFormat::Gif) => "gif",
        Ok(image::ImageFormat::Bmp) => "bmp",
        Ok(format) => format.extensions_str().first().copied().unwrap_or("bin"),
        Err(_) => "bin",
    }
}
