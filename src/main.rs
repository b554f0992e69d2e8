// Batch lead scraper
//
// Scrapes every location given on the command line, or the built-in list
// when none is given, into the store selected by the environment.

use std::sync::Arc;

use anyhow::{Context, Result};
use leadscrape::{
    BatchConfig, BatchScraper, ChromiumDriverFactory, DEFAULT_LOCATIONS, ScrapeOrchestrator,
    ScraperConfig, StorageConfig, open_gateway,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(ScraperConfig::from_env().context("Failed to load scraper configuration")?);
    let storage = StorageConfig::from_env().context("Failed to load storage configuration")?;

    let gateway = open_gateway(&storage)
        .await
        .context("Failed to open lead storage")?;
    tracing::info!("Storing leads with the {} backend", gateway.backend_name());

    let drivers = Arc::new(ChromiumDriverFactory::new(Arc::clone(&config)));
    let orchestrator = Arc::new(ScrapeOrchestrator::new(config, drivers, gateway));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let locations: Vec<String> = if args.is_empty() {
        DEFAULT_LOCATIONS.iter().map(|s| (*s).to_string()).collect()
    } else {
        args
    };

    let summary = BatchScraper::new(orchestrator, BatchConfig::default())
        .run(&locations)
        .await;

    tracing::info!(
        processed = summary.processed,
        skipped = summary.skipped,
        failed = summary.failed,
        total_leads = summary.total_leads,
        "Batch complete"
    );
    if !summary.failed_locations.is_empty() {
        tracing::warn!("Failed locations: {}", summary.failed_locations.join(", "));
    }

    Ok(())
}
