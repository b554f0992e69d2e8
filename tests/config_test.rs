//! Configuration builder and environment loading

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use leadscrape::config::{ScraperConfig, StorageBackend, StorageConfig};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_builder_defaults() {
    let config = ScraperConfig::builder()
        .credentials("agent@example.com", "pw")
        .build()
        .unwrap();

    assert_eq!(config.base_url(), "https://app.batchleads.io/");
    assert!(config.headless());
    assert_eq!(config.max_pages(), 999);
    assert_eq!(config.batch_size(), 500);
    assert_eq!(config.write_threshold_bytes(), 2 * 1024 * 1024);
    assert_eq!(config.cache_max_age_days(), 7);
    assert_eq!(config.rows_per_page(), Some("100"));
    assert_eq!(config.page_load_timeout(), Duration::from_secs(30));
    assert_eq!(config.element_timeout(), Duration::from_secs(10));
    assert_eq!(config.login_timeout(), Duration::from_secs(15));
    assert_eq!(config.settle_delay(), Duration::from_secs(3));
    assert_eq!(config.app_url("login"), "https://app.batchleads.io/login");
}

#[test]
fn test_builder_validation() {
    let base = || ScraperConfig::builder().credentials("agent@example.com", "pw");

    assert!(base().batch_size(0).build().is_err());
    assert!(base().max_pages(0).build().is_err());
    assert!(base().write_threshold_mb(0.0).build().is_err());
    assert!(base().base_url("ftp://leads.test").build().is_err());
    assert!(ScraperConfig::builder().credentials(" ", "pw").build().is_err());

    let config = base().base_url("https://leads.test/app").build().unwrap();
    assert_eq!(config.base_url(), "https://leads.test/app/");
}

#[test]
fn test_credentials_are_redacted() {
    let config = ScraperConfig::builder()
        .credentials("agent@example.com", "hunter2")
        .build()
        .unwrap();
    let debug = format!("{:?}", config.credentials());
    assert!(debug.contains("agent@example.com"));
    assert!(!debug.contains("hunter2"));
}

#[test]
fn test_from_lookup_reads_overrides() {
    let config = ScraperConfig::from_lookup(lookup(&[
        ("BATCHLEADS_EMAIL", "agent@example.com"),
        ("BATCHLEADS_PASSWORD", "pw"),
        ("MAX_PAGES", "25"),
        ("HEADLESS", "false"),
        ("BATCH_SIZE", "100"),
        ("WRITE_THRESHOLD_MB", "0.5"),
        ("CACHE_MAX_AGE_DAYS", "3"),
    ]))
    .unwrap();

    assert_eq!(config.max_pages(), 25);
    assert!(!config.headless());
    assert_eq!(config.batch_size(), 100);
    assert_eq!(config.write_threshold_bytes(), 512 * 1024);
    assert_eq!(config.cache_max_age_days(), 3);
}

#[test]
fn test_from_lookup_requires_credentials_and_valid_numbers() {
    assert!(ScraperConfig::from_lookup(lookup(&[("BATCHLEADS_PASSWORD", "pw")])).is_err());

    let err = ScraperConfig::from_lookup(lookup(&[
        ("BATCHLEADS_EMAIL", "agent@example.com"),
        ("BATCHLEADS_PASSWORD", "pw"),
        ("BATCH_SIZE", "lots"),
    ]))
    .unwrap_err();
    assert!(format!("{err:#}").contains("BATCH_SIZE"));
}

#[test]
fn test_storage_backend_precedence() {
    let config = StorageConfig::from_lookup(lookup(&[]));
    assert!(matches!(config.backend, StorageBackend::Sqlite { ref path } if path == &PathBuf::from("leads.db")));
    assert_eq!(config.document_prefix, "batchleads_data");

    let config = StorageConfig::from_lookup(lookup(&[
        ("LEADS_DATABASE_PATH", "/tmp/x.db"),
        ("LEADS_DOCUMENT_DIR", "/tmp/docs"),
    ]));
    assert!(matches!(config.backend, StorageBackend::DocumentDir { .. }));

    let config = StorageConfig::from_lookup(lookup(&[
        ("LEADS_DOCUMENT_DIR", "/tmp/docs"),
        ("LEADS_DOCUMENT_URL", "https://bucket.test/leads"),
        ("LEADS_DOCUMENT_PREFIX", "ca"),
    ]));
    assert!(matches!(config.backend, StorageBackend::DocumentHttp { ref url, .. } if url == "https://bucket.test/leads"));
    assert_eq!(config.document_prefix, "ca");
}
