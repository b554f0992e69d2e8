//! Job status map for polling clients
//!
//! The orchestrator keeps no state between sessions; a front end that
//! wants a status endpoint owns a `ProgressTracker` and hands the
//! orchestrator `tracker.reporter(location)` as its progress sink.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::orchestrator::{ProgressReporter, ScrapeOutcome};

/// How long finished jobs stay visible to pollers.
const DEFAULT_RETENTION: Duration = Duration::from_secs(5 * 60);

/// Interval of the background expiry sweep.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobProgress {
    pub status: JobStatus,
    pub message: String,
    pub percent: Option<u8>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Concurrent map of scrape jobs keyed by location.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    jobs: Arc<DashMap<String, JobProgress>>,
    retention: Duration,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    #[must_use]
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            retention,
        }
    }

    /// Register a running job, replacing any previous one for `location`.
    pub fn start(&self, location: &str) {
        let now = Utc::now();
        self.jobs.insert(
            location.to_string(),
            JobProgress {
                status: JobStatus::Running,
                message: "Starting...".to_string(),
                percent: Some(0),
                started_at: now,
                updated_at: now,
            },
        );
    }

    /// Record a message for a running job. Unknown or finished jobs are
    /// left untouched.
    pub fn update(&self, location: &str, message: &str, percent: Option<u8>) {
        if let Some(mut job) = self.jobs.get_mut(location)
            && job.status == JobStatus::Running
        {
            job.message = message.to_string();
            if percent.is_some() {
                job.percent = percent;
            }
            job.updated_at = Utc::now();
        }
    }

    pub fn finish(&self, location: &str, message: &str) {
        self.settle(location, JobStatus::Completed, message, Some(100));
    }

    pub fn fail(&self, location: &str, error: &str) {
        self.settle(location, JobStatus::Failed, error, None);
    }

    /// Settle a job from the outcome of its scrape.
    pub fn record_outcome(&self, outcome: &ScrapeOutcome) {
        match outcome {
            ScrapeOutcome::Success(report) => self.finish(
                &report.location,
                &format!("Completed with {} leads", report.total_leads),
            ),
            ScrapeOutcome::Failure(failure) => self.fail(&failure.location, &failure.error),
        }
    }

    #[must_use]
    pub fn get(&self, location: &str) -> Option<JobProgress> {
        self.jobs.get(location).map(|job| job.clone())
    }

    /// All jobs, sorted by location.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, JobProgress)> {
        let mut jobs: Vec<_> = self
            .jobs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        jobs.sort_by(|a, b| a.0.cmp(&b.0));
        jobs
    }

    #[must_use]
    pub fn reporter(&self, location: &str) -> TrackerReporter {
        TrackerReporter {
            tracker: self.clone(),
            location: location.to_string(),
        }
    }

    /// Drop finished jobs older than the retention window. Returns how
    /// many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.jobs.len();
        self.jobs.retain(|location, job| {
            let age = now
                .signed_duration_since(job.updated_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            let keep = !job.status.is_terminal() || age < self.retention;
            if !keep {
                log::debug!("Expiring {:?} job for '{location}'", job.status);
            }
            keep
        });
        let removed = before.saturating_sub(self.jobs.len());
        if removed > 0 {
            log::debug!("Expired {removed} finished job(s)");
        }
        removed
    }

    /// Spawn the periodic expiry sweep. Abort the handle to stop it.
    pub fn start_cleanup_task(&self) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                tracker.cleanup_expired();
            }
        })
    }

    fn settle(&self, location: &str, status: JobStatus, message: &str, percent: Option<u8>) {
        let now = Utc::now();
        self.jobs
            .entry(location.to_string())
            .and_modify(|job| {
                job.status = status;
                job.message = message.to_string();
                if percent.is_some() {
                    job.percent = percent;
                }
                job.updated_at = now;
            })
            .or_insert_with(|| JobProgress {
                status,
                message: message.to_string(),
                percent,
                started_at: now,
                updated_at: now,
            });
    }
}

/// `ProgressReporter` that writes into a tracker entry.
#[derive(Debug, Clone)]
pub struct TrackerReporter {
    tracker: ProgressTracker,
    location: String,
}

impl ProgressReporter for TrackerReporter {
    fn report(&self, message: &str, percent: Option<u8>) {
        self.tracker.update(&self.location, message, percent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporter_updates_running_job() {
        let tracker = ProgressTracker::new();
        tracker.start("Hemet");
        let reporter = tracker.reporter("Hemet");

        reporter.report_page(1, Some(4), 0, 100);
        let job = tracker.get("Hemet").unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.percent, Some(25));

        // percent-less messages keep the last known percentage
        reporter.report_flush(500);
        let job = tracker.get("Hemet").unwrap();
        assert_eq!(job.message, "Saving chunk of 500 leads...");
        assert_eq!(job.percent, Some(25));
    }

    #[test]
    fn test_finished_job_ignores_late_updates() {
        let tracker = ProgressTracker::new();
        tracker.start("Norco");
        tracker.fail("Norco", "login rejected");
        tracker.update("Norco", "Scraping page 2", Some(50));

        let job = tracker.get("Norco").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message, "login rejected");
    }

    #[test]
    fn test_cleanup_keeps_running_jobs() {
        let tracker = ProgressTracker::with_retention(Duration::ZERO);
        tracker.start("Corona");
        tracker.start("Tustin");
        tracker.finish("Tustin", "done");

        assert_eq!(tracker.cleanup_expired(), 1);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].0, "Corona");
    }
}
