//! Getter methods for `ScraperConfig`

use std::path::Path;
use std::time::Duration;

use super::types::{Credentials, ScraperConfig};
use crate::extractor::TableLayout;
use crate::page_driver::SiteLayout;

impl ScraperConfig {
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn write_threshold_bytes(&self) -> usize {
        self.write_threshold_bytes
    }

    #[must_use]
    pub fn cache_max_age_days(&self) -> i64 {
        self.cache_max_age_days
    }

    #[must_use]
    pub fn rows_per_page(&self) -> Option<&str> {
        self.rows_per_page.as_deref()
    }

    #[must_use]
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    #[must_use]
    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    #[must_use]
    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub fn return_leads(&self) -> bool {
        self.return_leads
    }

    #[must_use]
    pub fn chrome_data_dir(&self) -> Option<&Path> {
        self.chrome_data_dir.as_deref()
    }

    #[must_use]
    pub fn table_layout(&self) -> &TableLayout {
        &self.table_layout
    }

    #[must_use]
    pub fn site(&self) -> &SiteLayout {
        &self.site
    }

    /// Absolute URL of a path under the application root.
    #[must_use]
    pub fn app_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}
