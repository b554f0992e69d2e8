//! Browser page driving
//!
//! The orchestrator only sees the `PageDriver` and `DriverFactory` traits.
//! Everything that knows about the target site's markup lives in
//! [`SiteLayout`] and the login/filter flows in [`site`]; everything that
//! knows about Chromium lives in [`chromium`].

pub mod browser_setup;
pub mod chromium;
pub mod cleanup;
pub mod site;
pub mod timeout;

use std::time::Duration;

use async_trait::async_trait;

pub use chromium::{ChromiumDriverFactory, ChromiumPageDriver};
pub use site::{SiteLayout, apply_location_filter, authenticate};
pub use timeout::with_page_timeout;

/// Errors raised by page drivers.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("element '{selector}' not found")]
    ElementNotFound { selector: String },

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("browser error: {0}")]
    Browser(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// A stateful browser tab.
///
/// Every call is bounded by its own timeout; a failed call does not end the
/// session by itself.
#[async_trait]
pub trait PageDriver: Send {
    async fn navigate(&mut self, url: &str) -> DriverResult<()>;

    /// Type `value` into the element matching `selector`.
    async fn fill(&mut self, selector: &str, value: &str) -> DriverResult<()>;

    async fn click(&mut self, selector: &str) -> DriverResult<()>;

    /// Submit the form of the most recently filled field.
    async fn submit(&mut self) -> DriverResult<()>;

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> DriverResult<()>;

    /// Rendered HTML of the current page.
    async fn content(&mut self) -> DriverResult<String>;

    /// Advance the results table; `false` when there is no next page.
    async fn click_next(&mut self) -> DriverResult<bool>;

    /// Pick `value` in a `<select>`; `false` when the control is missing.
    async fn select_option(&mut self, selector: &str, value: &str) -> DriverResult<bool>;

    async fn current_url(&mut self) -> DriverResult<Option<String>>;

    /// Release the browser. Called once at the end of every session.
    async fn close(&mut self) -> DriverResult<()>;
}

/// Creates one fresh driver per scrape session.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn launch(&self, headless: bool) -> DriverResult<Box<dyn PageDriver>>;
}
