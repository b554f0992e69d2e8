//! Sequential scraping over a list of locations

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use serde::Serialize;

use crate::orchestrator::{
    FailureKind, LogProgress, ScrapeOrchestrator, ScrapeOutcome, ScrapeRequest,
};

/// Built-in location list used when none is given.
pub const DEFAULT_LOCATIONS: &[&str] = &[
    "San Jacinto",
    "Hemet",
    "Corona",
    "Norco",
    "Riverside",
    "Ontario",
    "Fontana",
    "Pomona",
    "West Covina",
    "Whittier",
    "Anaheim",
    "Santa Ana",
    "Tustin",
    "Gardena",
    "Carson",
    "Bakersfield",
    "Arvin",
    "Lamont",
    "Rosedale",
    "Tulare",
    "Visalia",
    "Delano",
    "Earlimart",
    "McFarland",
    "Palmdale",
    "Lancaster",
    "Oxnard",
];

/// Log a progress report every this many locations.
const REPORT_EVERY: usize = 10;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Attempts per location, including the first.
    pub max_retries: u32,
    /// Pause between attempts and between locations.
    pub delay: Duration,
    /// Skip locations that already have stored leads.
    pub skip_existing: bool,
    pub headless: Option<bool>,
    pub start_index: usize,
    pub limit: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(5),
            skip_existing: true,
            headless: None,
            start_index: 0,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_leads: usize,
    pub failed_locations: Vec<String>,
    #[serde(with = "secs")]
    pub elapsed: Duration,
}

mod secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

/// Runs the orchestrator over many locations, one at a time.
pub struct BatchScraper {
    orchestrator: Arc<ScrapeOrchestrator>,
    config: BatchConfig,
}

impl BatchScraper {
    pub fn new(orchestrator: Arc<ScrapeOrchestrator>, config: BatchConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// The slice of `locations` selected by `start_index` and `limit`.
    fn window<'a, S: AsRef<str>>(&self, locations: &'a [S]) -> &'a [S] {
        let start = self.config.start_index.min(locations.len());
        let end = match self.config.limit {
            Some(limit) => start.saturating_add(limit).min(locations.len()),
            None => locations.len(),
        };
        &locations[start..end]
    }

    pub async fn run<S: AsRef<str>>(&self, locations: &[S]) -> BatchSummary {
        let started = Instant::now();
        let locations = self.window(locations);
        let total = locations.len();
        let mut summary = BatchSummary::default();

        info!(
            "Starting batch scrape of {total} locations (max {} attempts each)",
            self.config.max_retries.max(1)
        );

        for (i, location) in locations.iter().enumerate() {
            let location = location.as_ref();
            let n = i + 1;
            info!("Progress: {n}/{total} - processing '{location}'");

            if self.config.skip_existing && self.already_stored(location).await {
                info!("'{location}' already has stored leads, skipping");
                summary.skipped += 1;
            } else {
                match self.scrape_with_retries(location).await {
                    ScrapeOutcome::Success(report) => {
                        info!("'{location}' done with {} leads", report.total_leads);
                        summary.processed += 1;
                        summary.total_leads += report.total_leads;
                    }
                    ScrapeOutcome::Failure(failure) => {
                        error!("'{location}' failed: {}", failure.error);
                        summary.failed += 1;
                        summary.total_leads += failure.leads_saved;
                        summary.failed_locations.push(location.to_string());
                    }
                }

                if n < total && !self.config.delay.is_zero() {
                    tokio::time::sleep(self.config.delay).await;
                }
            }

            if n % REPORT_EVERY == 0 {
                let elapsed = started.elapsed();
                let remaining = elapsed.mul_f64((total - n) as f64 / n as f64);
                info!(
                    "--- {n}/{total} done: {} scraped, {} skipped, {} failed, {:.1} min elapsed, ~{:.1} min remaining ---",
                    summary.processed,
                    summary.skipped,
                    summary.failed,
                    elapsed.as_secs_f64() / 60.0,
                    remaining.as_secs_f64() / 60.0
                );
            }
        }

        summary.elapsed = started.elapsed();
        info!(
            "Batch finished in {:.1} min: {} scraped, {} skipped, {} failed, {} leads",
            summary.elapsed.as_secs_f64() / 60.0,
            summary.processed,
            summary.skipped,
            summary.failed,
            summary.total_leads
        );
        summary
    }

    async fn already_stored(&self, location: &str) -> bool {
        match self.orchestrator.gateway().exists(location).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Could not check stored leads for '{location}': {e}");
                false
            }
        }
    }

    async fn scrape_with_retries(&self, location: &str) -> ScrapeOutcome {
        let attempts = self.config.max_retries.max(1);
        let mut request = ScrapeRequest::new(location).use_cache(false);
        request.headless = self.config.headless;

        let mut attempt = 1;
        loop {
            let outcome = self.orchestrator.scrape(&request, &LogProgress).await;
            let retryable = match &outcome {
                ScrapeOutcome::Success(_) => return outcome,
                ScrapeOutcome::Failure(failure) => failure.kind != FailureKind::InvalidRequest,
            };
            if !retryable || attempt >= attempts {
                return outcome;
            }
            warn!("Attempt {attempt}/{attempts} for '{location}' failed, retrying");
            attempt += 1;
            if !self.config.delay.is_zero() {
                tokio::time::sleep(self.config.delay).await;
            }
        }
    }
}
