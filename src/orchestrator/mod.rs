//! Scrape session orchestration
//!
//! A session for one location runs:
//! 1. Cache check (fresh, complete entries short-circuit)
//! 2. Browser launch and login
//! 3. Location filter and a clear of the location's stored leads
//! 4. Paging, buffering rows and flushing full chunks in the background
//! 5. Final flush, which marks the entry complete and writes the export
//!
//! Failures come back as `ScrapeOutcome::Failure`; nothing escapes as a
//! panic or an `Err`.

pub mod flush;
pub mod outcome;
pub mod progress;
pub mod session;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::cache::CacheLifecycle;
use crate::chunk_buffer::ChunkBuffer;
use crate::config::ScraperConfig;
use crate::extractor::TableExtractor;
use crate::page_driver::{DriverFactory, PageDriver, apply_location_filter, authenticate};
use crate::persistence::PersistenceGateway;
use crate::utils::LocationLocks;

pub use flush::{FlushScheduler, FlushTally, normalize_chunk};
pub use outcome::{FailureKind, ScrapeFailure, ScrapeOutcome, ScrapeReport};
pub use progress::{LogProgress, NoOpProgress, ProgressReporter};
pub use session::{ScrapeSession, SessionState};

/// What to scrape and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub location: String,
    /// Overrides the configured headless flag.
    #[serde(default)]
    pub headless: Option<bool>,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

fn default_use_cache() -> bool {
    true
}

impl ScrapeRequest {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            headless: None,
            use_cache: true,
        }
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    #[must_use]
    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}

/// Why the page loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingStop {
    EmptyPage,
    PageCap,
    EstimateReached,
    NoNextPage,
    PageLoadFailed,
}

/// Drives scrape sessions against one storage backend.
///
/// Cheap to share behind an `Arc`; sessions for different locations may
/// run concurrently, sessions for the same location run one at a time.
pub struct ScrapeOrchestrator {
    config: Arc<ScraperConfig>,
    drivers: Arc<dyn DriverFactory>,
    gateway: Arc<dyn PersistenceGateway>,
    cache: CacheLifecycle,
    extractor: TableExtractor,
    locks: LocationLocks,
}

impl ScrapeOrchestrator {
    pub fn new(
        config: Arc<ScraperConfig>,
        drivers: Arc<dyn DriverFactory>,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> Self {
        let cache = CacheLifecycle::new(Arc::clone(&gateway), config.cache_max_age_days());
        let extractor = TableExtractor::new(config.table_layout().clone());
        Self {
            config,
            drivers,
            gateway,
            cache,
            extractor,
            locks: LocationLocks::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn PersistenceGateway> {
        &self.gateway
    }

    /// Run one request to completion.
    pub async fn scrape(
        &self,
        request: &ScrapeRequest,
        progress: &dyn ProgressReporter,
    ) -> ScrapeOutcome {
        let location = request.location.trim();
        if location.is_empty() {
            let failure = ScrapeFailure {
                location: String::new(),
                error: "location must not be empty".to_string(),
                kind: FailureKind::InvalidRequest,
                leads_saved: 0,
            };
            progress.report_error(&failure.error);
            return ScrapeOutcome::Failure(failure);
        }

        if request.use_cache
            && let Some(outcome) = self.serve_cached(location, progress).await
        {
            return outcome;
        }

        let _guard = self.locks.acquire(location).await;

        // a session that held the lock may have just refreshed the entry
        if request.use_cache
            && let Some(outcome) = self.serve_cached(location, progress).await
        {
            return outcome;
        }

        let headless = request.headless.unwrap_or_else(|| self.config.headless());
        self.run_live(location, headless, progress).await
    }

    async fn serve_cached(
        &self,
        location: &str,
        progress: &dyn ProgressReporter,
    ) -> Option<ScrapeOutcome> {
        let hit = self.cache.load_if_fresh(location).await?;
        let leads = hit.entry.leads;
        info!(
            "Serving {} cached leads for '{location}' ({} days old)",
            leads.len(),
            hit.age_days
        );
        progress.report_cached(leads.len(), hit.age_days);

        Some(ScrapeOutcome::Success(ScrapeReport {
            location: location.to_string(),
            total_leads: leads.len(),
            leads,
            cached: true,
            cache_age_days: hit.age_days,
        }))
    }

    async fn run_live(
        &self,
        location: &str,
        headless: bool,
        progress: &dyn ProgressReporter,
    ) -> ScrapeOutcome {
        let mut session = ScrapeSession::new(location);
        session.transition(SessionState::Authenticating);
        progress.report_searching(location);

        let mut driver = match self.drivers.launch(headless).await {
            Ok(driver) => driver,
            Err(e) => {
                return fail(&mut session, FailureKind::Browser, e.to_string(), progress);
            }
        };

        // owned here so a panic in `drive` cannot drop in-flight merges
        let mut flushes = FlushScheduler::new(Arc::clone(&self.gateway), location);
        let outcome = AssertUnwindSafe(self.drive(
            &mut session,
            driver.as_mut(),
            &mut flushes,
            progress,
        ))
        .catch_unwind()
        .await;

        if let Err(e) = driver.close().await {
            warn!("[{location}] browser did not close cleanly: {e}");
        }

        match outcome {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "session panicked".to_string());

                if flushes.in_flight() > 0 {
                    info!(
                        "[{location}] waiting on {} partial flush(es) before failing",
                        flushes.in_flight()
                    );
                }
                let tally = flushes.wait_all().await;
                session.leads_saved = session.leads_saved.max(tally.leads_saved);
                session.failed_chunks = tally.failed;
                fail(&mut session, FailureKind::Unexpected, message, progress)
            }
        }
    }

    async fn drive(
        &self,
        session: &mut ScrapeSession,
        driver: &mut dyn PageDriver,
        flushes: &mut FlushScheduler,
        progress: &dyn ProgressReporter,
    ) -> ScrapeOutcome {
        let location = session.location().to_string();

        if let Err(e) = authenticate(driver, &self.config).await {
            return fail(session, FailureKind::Authentication, e.to_string(), progress);
        }

        session.transition(SessionState::LocatingFilter);
        if !apply_location_filter(driver, &self.config, &location).await {
            warn!("[{location}] paging without a confirmed location filter");
        }

        if let Err(e) = self.gateway.clear(&location).await {
            return fail(
                session,
                FailureKind::Persistence,
                format!("could not clear stored leads: {e}"),
                progress,
            );
        }

        session.transition(SessionState::Paging);
        let mut buffer = ChunkBuffer::with_capacity(self.config.batch_size());

        let stop = self
            .page_loop(session, driver, &mut buffer, flushes, progress)
            .await;
        debug!("[{location}] paging stopped: {stop:?}");

        let tally = flushes.wait_all().await;
        session.leads_saved = tally.leads_saved;
        session.failed_chunks = tally.failed;

        session.transition(SessionState::FlushingFinal);
        let remainder = buffer.drain();
        if !remainder.is_empty() || session.leads_saved > 0 {
            if !remainder.is_empty() {
                progress.report_flush(remainder.len());
            }
            let leads = normalize_chunk(&remainder);
            drop(remainder);
            match self.gateway.merge_chunk(&location, leads, true).await {
                Ok(report) => {
                    session.leads_saved += report.appended;
                    if let Some(export) = report.export {
                        info!("[{location}] exported {} leads to {export}", report.total);
                    }
                }
                Err(e) => {
                    return fail(
                        session,
                        FailureKind::Persistence,
                        format!("final flush failed: {e}"),
                        progress,
                    );
                }
            }
        } else {
            info!("[{location}] no leads found");
        }

        session.transition(SessionState::Completed);
        if session.failed_chunks > 0 {
            warn!(
                "[{location}] completed with {} failed chunk(s), {} of {} leads saved",
                session.failed_chunks, session.leads_saved, session.leads_seen
            );
        }
        info!(
            "[{location}] scraped {} leads from {} pages in {:.1}s",
            session.leads_saved,
            session.pages_scraped,
            session.elapsed().as_secs_f64()
        );
        progress.report_completed(session.leads_saved, session.pages_scraped);

        let leads = if self.config.return_leads() {
            match self.gateway.read(&location).await {
                Ok(Some(entry)) => entry.leads,
                Ok(None) => Vec::new(),
                Err(e) => {
                    warn!("[{location}] could not read back stored leads: {e}");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        ScrapeOutcome::Success(ScrapeReport {
            location,
            total_leads: session.leads_saved,
            leads,
            cached: false,
            cache_age_days: 0,
        })
    }

    async fn page_loop(
        &self,
        session: &mut ScrapeSession,
        driver: &mut dyn PageDriver,
        buffer: &mut ChunkBuffer,
        flushes: &mut FlushScheduler,
        progress: &dyn ProgressReporter,
    ) -> PagingStop {
        let max_pages = self.config.max_pages();
        let batch_size = self.config.batch_size();
        let byte_threshold = self.config.write_threshold_bytes();
        let mut page = 0usize;

        loop {
            page += 1;

            let html = match driver.content().await {
                Ok(html) => html,
                Err(e) => {
                    warn!("[{}] page {page} failed to load: {e}", session.location());
                    return PagingStop::PageLoadFailed;
                }
            };

            let extraction = self.extractor.extract(&html);
            drop(html);
            if extraction.is_empty() {
                debug!("[{}] page {page} has no leads", session.location());
                return PagingStop::EmptyPage;
            }

            let count = extraction.leads.len();
            if page == 1
                && let Some(pagination) = extraction.pagination
            {
                session.total_pages = pagination.estimated_pages(count);
                if let Some(pages) = session.total_pages {
                    progress.report_estimate(pagination.total, pages);
                }
            }

            session.record_page(count);
            buffer.add(extraction.leads);

            if buffer.should_flush(batch_size, byte_threshold) {
                session.transition(SessionState::FlushingPartial);
                let chunk = buffer.drain();
                progress.report_flush(chunk.len());
                flushes.dispatch(chunk);
                session.transition(SessionState::Paging);
            }

            let saved = flushes.collect_finished().leads_saved;
            progress.report_page(page, session.total_pages, saved, buffer.len());

            if page >= max_pages {
                info!("[{}] reached the page cap of {max_pages}", session.location());
                return PagingStop::PageCap;
            }
            if let Some(total) = session.total_pages
                && page >= total
            {
                return PagingStop::EstimateReached;
            }

            match driver.click_next().await {
                Ok(true) => {}
                Ok(false) => return PagingStop::NoNextPage,
                Err(e) => {
                    warn!("[{}] could not advance past page {page}: {e}", session.location());
                    return PagingStop::PageLoadFailed;
                }
            }
        }
    }
}

fn fail(
    session: &mut ScrapeSession,
    kind: FailureKind,
    error: String,
    progress: &dyn ProgressReporter,
) -> ScrapeOutcome {
    session.transition(SessionState::Failed);
    error!("[{}] scrape failed ({kind:?}): {error}", session.location());
    progress.report_error(&error);
    ScrapeOutcome::Failure(ScrapeFailure {
        location: session.location().to_string(),
        error,
        kind,
        leads_saved: session.leads_saved(),
    })
}
