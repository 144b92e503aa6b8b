//! Submission listing and dashboard counts

use serde::Serialize;

use super::submission::{Status, Submission};

/// Default page size for listings
pub const DEFAULT_PAGE_LIMIT: usize = 10;
/// Number of recent submissions shown in the stats summary
pub const RECENT_LIMIT: usize = 5;

/// Which submissions to list and which page of them
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionFilter {
    pub status: Option<Status>,
    /// Patient email, compared case-insensitively
    pub email: Option<String>,
    /// 1-based page number
    pub page: usize,
    pub limit: usize,
}

impl Default for SubmissionFilter {
    fn default() -> Self {
        Self {
            status: None,
            email: None,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl SubmissionFilter {
    pub fn matches(&self, submission: &Submission) -> bool {
        if self.status.is_some_and(|s| s != submission.status) {
            return false;
        }
        match &self.email {
            Some(email) => submission
                .patient
                .email
                .eq_ignore_ascii_case(email.trim()),
            None => true,
        }
    }
}

/// One page of a listing, newest first
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubmissionPage {
    pub submissions: Vec<Submission>,
    /// Matching submissions across all pages
    pub total: usize,
    pub page: usize,
    pub pages: usize,
}

/// Newest first; ties broken by id so paging is stable
fn sort_newest_first(submissions: &mut [Submission]) {
    submissions.sort_by(|a, b| {
        b.submitted_at
            .cmp(&a.submitted_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

impl SubmissionPage {
    /// Filter, sort and cut one page out of every stored submission
    pub fn select(all: Vec<Submission>, filter: &SubmissionFilter) -> Self {
        let limit = filter.limit.max(1);
        let page = filter.page.max(1);
        let mut matching: Vec<Submission> = all.into_iter().filter(|s| filter.matches(s)).collect();
        sort_newest_first(&mut matching);

        let total = matching.len();
        let submissions = matching
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();
        Self {
            submissions,
            total,
            page,
            pages: total.div_ceil(limit),
        }
    }
}

/// Counts per status plus the most recent submissions
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SubmissionStats {
    pub total: usize,
    pub uploaded: usize,
    pub annotated: usize,
    pub reported: usize,
    pub recent: Vec<Submission>,
}

impl SubmissionStats {
    pub fn collect(mut all: Vec<Submission>) -> Self {
        let count = |status: Status| all.iter().filter(|s| s.status == status).count();
        let (uploaded, annotated, reported) = (
            count(Status::Uploaded),
            count(Status::Annotated),
            count(Status::Reported),
        );
        let total = all.len();
        sort_newest_first(&mut all);
        all.truncate(RECENT_LIMIT);
        Self {
            total,
            uploaded,
            annotated,
            reported,
            recent: all,
        }
    }
}
