pub mod batch;
pub mod cache;
pub mod chunk_buffer;
pub mod config;
pub mod extractor;
pub mod lead;
pub mod orchestrator;
pub mod page_driver;
pub mod persistence;
pub mod progress_tracker;
pub mod street_view;
pub mod utils;

use std::sync::Arc;

pub use batch::{BatchConfig, BatchScraper, BatchSummary, DEFAULT_LOCATIONS};
pub use cache::{CacheHit, CacheLifecycle, is_fresh};
pub use chunk_buffer::ChunkBuffer;
pub use config::{Credentials, ScraperConfig, StorageBackend, StorageConfig};
pub use extractor::{PageExtraction, Pagination, TableExtractor, TableLayout};
pub use lead::{FieldValue, LEAD_COLUMNS, Lead, RawLead, StoredLead, normalize_lead};
pub use orchestrator::{
    FailureKind, NoOpProgress, ProgressReporter, ScrapeFailure, ScrapeOrchestrator,
    ScrapeOutcome, ScrapeReport, ScrapeRequest, SessionState,
};
pub use page_driver::{
    ChromiumDriverFactory, DriverError, DriverFactory, PageDriver, SiteLayout,
};
pub use persistence::{
    CacheEntry, DocumentLeadStore, LeadQuery, PersistenceError, PersistenceGateway,
    SqliteLeadStore, open_gateway,
};
pub use progress_tracker::{JobProgress, JobStatus, ProgressTracker};
pub use street_view::{StreetViewClient, StreetViewConfig};

/// Scrape one location with a Chromium browser against the configured store.
pub async fn scrape(
    config: ScraperConfig,
    storage: &StorageConfig,
    request: &ScrapeRequest,
    progress: &dyn ProgressReporter,
) -> Result<ScrapeOutcome, PersistenceError> {
    let config = Arc::new(config);
    let gateway = open_gateway(storage).await?;
    let drivers = Arc::new(ChromiumDriverFactory::new(Arc::clone(&config)));
    let orchestrator = ScrapeOrchestrator::new(config, drivers, gateway);
    Ok(orchestrator.scrape(request, progress).await)
}
