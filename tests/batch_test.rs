//! Sequential batch runs over several locations

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use leadscrape::{BatchConfig, BatchScraper, ScrapeOrchestrator};

mod common;
use common::{MemoryGateway, MockDriverFactory, empty_results_html, lead_table_html, test_config};

fn quick_batch() -> BatchConfig {
    BatchConfig {
        delay: Duration::ZERO,
        ..BatchConfig::default()
    }
}

#[tokio::test]
async fn test_existing_locations_are_skipped() {
    let factory = MockDriverFactory::new(vec![lead_table_html(1, 3, None), empty_results_html()]);
    let gateway = Arc::new(MemoryGateway::new());
    gateway.seed("Corona", 5, true, Utc::now() - chrono::Duration::days(30));

    let orchestrator = Arc::new(ScrapeOrchestrator::new(
        Arc::new(test_config()),
        Arc::new(factory.clone()),
        Arc::clone(&gateway) as Arc<dyn leadscrape::PersistenceGateway>,
    ));

    let summary = BatchScraper::new(orchestrator, quick_batch())
        .run(&["Corona", "Norco", "Riverside"])
        .await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.total_leads, 6);
    assert_eq!(factory.launches(), 2);
    // the stale entry was left alone
    assert_eq!(gateway.entry("Corona").unwrap().leads.len(), 5);
}

#[tokio::test]
async fn test_failures_are_retried_then_counted() {
    let factory = MockDriverFactory::new(Vec::new()).rejecting_login();
    let gateway = Arc::new(MemoryGateway::new());
    let orchestrator = Arc::new(ScrapeOrchestrator::new(
        Arc::new(test_config()),
        Arc::new(factory.clone()),
        gateway as Arc<dyn leadscrape::PersistenceGateway>,
    ));

    let summary = BatchScraper::new(
        orchestrator,
        BatchConfig {
            max_retries: 2,
            ..quick_batch()
        },
    )
    .run(&["Ontario"])
    .await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_locations, vec!["Ontario"]);
    assert_eq!(factory.launches(), 2);
}

#[tokio::test]
async fn test_window_selects_a_slice() {
    let factory = MockDriverFactory::new(vec![empty_results_html()]);
    let gateway = Arc::new(MemoryGateway::new());
    let orchestrator = Arc::new(ScrapeOrchestrator::new(
        Arc::new(test_config()),
        Arc::new(factory.clone()),
        gateway as Arc<dyn leadscrape::PersistenceGateway>,
    ));

    let summary = BatchScraper::new(
        orchestrator,
        BatchConfig {
            start_index: 1,
            limit: Some(2),
            skip_existing: false,
            ..quick_batch()
        },
    )
    .run(leadscrape::DEFAULT_LOCATIONS)
    .await;

    assert_eq!(summary.processed, 2);
    assert_eq!(factory.launches(), 2);
}
