//! Results handed back to callers of a scrape

use serde::Serialize;

use crate::lead::StoredLead;

/// Coarse failure classes a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidRequest,
    Browser,
    Authentication,
    Persistence,
    Unexpected,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    pub location: String,
    pub total_leads: usize,
    /// Empty unless leads were requested back.
    pub leads: Vec<StoredLead>,
    pub cached: bool,
    pub cache_age_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeFailure {
    pub location: String,
    pub error: String,
    pub kind: FailureKind,
    /// Leads durably flushed before the failure.
    pub leads_saved: usize,
}

/// Result of a scrape. Failures are values, never panics or `Err`s.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ScrapeOutcome {
    Success(ScrapeReport),
    Failure(ScrapeFailure),
}

impl ScrapeOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ScrapeOutcome::Success(_))
    }

    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            ScrapeOutcome::Success(r) => &r.location,
            ScrapeOutcome::Failure(f) => &f.location,
        }
    }

    /// Leads stored by this run, or served from cache.
    #[must_use]
    pub fn total_leads(&self) -> usize {
        match self {
            ScrapeOutcome::Success(r) => r.total_leads,
            ScrapeOutcome::Failure(f) => f.leads_saved,
        }
    }

    #[must_use]
    pub fn as_report(&self) -> Option<&ScrapeReport> {
        match self {
            ScrapeOutcome::Success(r) => Some(r),
            ScrapeOutcome::Failure(_) => None,
        }
    }

    #[must_use]
    pub fn as_failure(&self) -> Option<&ScrapeFailure> {
        match self {
            ScrapeOutcome::Success(_) => None,
            ScrapeOutcome::Failure(f) => Some(f),
        }
    }

    pub fn into_result(self) -> Result<ScrapeReport, ScrapeFailure> {
        match self {
            ScrapeOutcome::Success(r) => Ok(r),
            ScrapeOutcome::Failure(f) => Err(f),
        }
    }
}

impl std::fmt::Display for ScrapeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?}): {}", self.location, self.kind, self.error)
    }
}

impl std::error::Error for ScrapeFailure {}
