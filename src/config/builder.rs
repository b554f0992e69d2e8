//! Type-safe builder for `ScraperConfig` using the typestate pattern
//!
//! Credentials are the only required input; `build()` does not exist until
//! they are set.

use std::marker::PhantomData;
use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};
use url::Url;

use super::types::{Credentials, ScraperConfig};
use crate::extractor::TableLayout;
use crate::page_driver::SiteLayout;
use crate::utils::{
    DEFAULT_BASE_URL, DEFAULT_BATCH_SIZE, DEFAULT_CACHE_MAX_AGE_DAYS, DEFAULT_ELEMENT_TIMEOUT_SECS,
    DEFAULT_LOGIN_TIMEOUT_SECS, DEFAULT_MAX_PAGES, DEFAULT_PAGE_LOAD_TIMEOUT_SECS,
    DEFAULT_ROWS_PER_PAGE, DEFAULT_SETTLE_DELAY_MS, DEFAULT_WRITE_THRESHOLD_MB,
};

// Type states for the builder
pub struct WithCredentials;

pub struct ScraperConfigBuilder<State = ()> {
    pub(crate) base_url: String,
    pub(crate) credentials: Option<Credentials>,
    pub(crate) headless: bool,
    pub(crate) max_pages: usize,
    pub(crate) batch_size: usize,
    pub(crate) write_threshold_mb: f64,
    pub(crate) cache_max_age_days: i64,
    pub(crate) rows_per_page: Option<String>,
    pub(crate) page_load_timeout_secs: u64,
    pub(crate) element_timeout_secs: u64,
    pub(crate) login_timeout_secs: u64,
    pub(crate) settle_delay_ms: u64,
    pub(crate) return_leads: bool,
    pub(crate) chrome_data_dir: Option<PathBuf>,
    pub(crate) table_layout: TableLayout,
    pub(crate) site: SiteLayout,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for ScraperConfigBuilder<()> {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials: None,
            headless: true,
            max_pages: DEFAULT_MAX_PAGES,
            batch_size: DEFAULT_BATCH_SIZE,
            write_threshold_mb: DEFAULT_WRITE_THRESHOLD_MB,
            cache_max_age_days: DEFAULT_CACHE_MAX_AGE_DAYS,
            rows_per_page: Some(DEFAULT_ROWS_PER_PAGE.to_string()),
            page_load_timeout_secs: DEFAULT_PAGE_LOAD_TIMEOUT_SECS,
            element_timeout_secs: DEFAULT_ELEMENT_TIMEOUT_SECS,
            login_timeout_secs: DEFAULT_LOGIN_TIMEOUT_SECS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            return_leads: true,
            chrome_data_dir: None,
            table_layout: TableLayout::default(),
            site: SiteLayout::default(),
            _phantom: PhantomData,
        }
    }
}

impl ScraperConfig {
    /// Create a builder for configuring a `ScraperConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> ScraperConfigBuilder<()> {
        ScraperConfigBuilder::default()
    }
}

impl ScraperConfigBuilder<()> {
    pub fn credentials(
        self,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> ScraperConfigBuilder<WithCredentials> {
        ScraperConfigBuilder {
            base_url: self.base_url,
            credentials: Some(Credentials::new(email, password)),
            headless: self.headless,
            max_pages: self.max_pages,
            batch_size: self.batch_size,
            write_threshold_mb: self.write_threshold_mb,
            cache_max_age_days: self.cache_max_age_days,
            rows_per_page: self.rows_per_page,
            page_load_timeout_secs: self.page_load_timeout_secs,
            element_timeout_secs: self.element_timeout_secs,
            login_timeout_secs: self.login_timeout_secs,
            settle_delay_ms: self.settle_delay_ms,
            return_leads: self.return_leads,
            chrome_data_dir: self.chrome_data_dir,
            table_layout: self.table_layout,
            site: self.site,
            _phantom: PhantomData,
        }
    }
}

/// Parse and normalize the application root to end in `/`.
fn normalize_base_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw.trim()).map_err(|e| anyhow!("Invalid base URL '{raw}': {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Base URL must be http(s), got '{raw}'");
    }
    let mut normalized = url.to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Ok(normalized)
}

impl ScraperConfigBuilder<WithCredentials> {
    pub fn build(self) -> Result<ScraperConfig> {
        let credentials = self
            .credentials
            .ok_or_else(|| anyhow!("Credentials are required"))?;
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            bail!("Email and password must both be non-empty");
        }
        if self.batch_size == 0 {
            bail!("Batch size must be at least 1");
        }
        if self.max_pages == 0 {
            bail!("Page cap must be at least 1");
        }
        if !(self.write_threshold_mb.is_finite() && self.write_threshold_mb > 0.0) {
            bail!(
                "Write threshold must be a positive number of megabytes, got {}",
                self.write_threshold_mb
            );
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let write_threshold_bytes = (self.write_threshold_mb * 1024.0 * 1024.0) as usize;

        Ok(ScraperConfig {
            base_url: normalize_base_url(&self.base_url)?,
            credentials,
            headless: self.headless,
            max_pages: self.max_pages,
            batch_size: self.batch_size,
            write_threshold_bytes: write_threshold_bytes.max(1),
            cache_max_age_days: self.cache_max_age_days,
            rows_per_page: self.rows_per_page,
            page_load_timeout_secs: self.page_load_timeout_secs,
            element_timeout_secs: self.element_timeout_secs,
            login_timeout_secs: self.login_timeout_secs,
            settle_delay_ms: self.settle_delay_ms,
            return_leads: self.return_leads,
            chrome_data_dir: self.chrome_data_dir,
            table_layout: self.table_layout,
            site: self.site,
        })
    }
}

// Builder methods available at any state
impl<State> ScraperConfigBuilder<State> {
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Run the browser without a window (default: true).
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Stop paging after this many pages.
    #[must_use]
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    /// Leads buffered before a partial flush is dispatched.
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Estimated buffer size, in megabytes, that forces a partial flush.
    #[must_use]
    pub fn write_threshold_mb(mut self, mb: f64) -> Self {
        self.write_threshold_mb = mb;
        self
    }

    /// Cached lead sets younger than this are served without rescraping.
    #[must_use]
    pub fn cache_max_age_days(mut self, days: i64) -> Self {
        self.cache_max_age_days = days;
        self
    }

    #[must_use]
    pub fn rows_per_page(mut self, rows: Option<String>) -> Self {
        self.rows_per_page = rows;
        self
    }

    #[must_use]
    pub fn page_load_timeout_secs(mut self, secs: u64) -> Self {
        self.page_load_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn element_timeout_secs(mut self, secs: u64) -> Self {
        self.element_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn login_timeout_secs(mut self, secs: u64) -> Self {
        self.login_timeout_secs = secs;
        self
    }

    /// Pause after navigation, submission and pagination clicks.
    ///
    /// The results table renders client-side; zero is only sensible
    /// against a driver that renders synchronously.
    #[must_use]
    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.settle_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn return_leads(mut self, return_leads: bool) -> Self {
        self.return_leads = return_leads;
        self
    }

    /// Browser profile directory; a per-process temp dir when unset.
    #[must_use]
    pub fn chrome_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.chrome_data_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn table_layout(mut self, layout: TableLayout) -> Self {
        self.table_layout = layout;
        self
    }

    #[must_use]
    pub fn site_layout(mut self, site: SiteLayout) -> Self {
        self.site = site;
        self
    }
}
