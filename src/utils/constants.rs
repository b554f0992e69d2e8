//! Shared configuration constants for leadscrape
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// Default application root of the lead-list web app.
///
/// Always ends with a slash so relative paths (`login`, `app/mylist-new`)
/// can be appended directly.
pub const DEFAULT_BASE_URL: &str = "https://app.batchleads.io/";

/// Default page cap per scrape session: 999 pages
///
/// Effectively unbounded for a single location; the pagination estimate or
/// an empty page normally ends the session long before this.
pub const DEFAULT_MAX_PAGES: usize = 999;

/// Default chunk size: 500 leads
///
/// Number of leads accumulated before a partial flush is dispatched.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default memory threshold for a chunk: 2 MB
///
/// Estimated serialized size at which a partial flush is dispatched even if
/// the batch size has not been reached.
pub const DEFAULT_WRITE_THRESHOLD_MB: f64 = 2.0;

/// Cached lead sets younger than this many days are served without rescraping.
pub const DEFAULT_CACHE_MAX_AGE_DAYS: i64 = 7;

/// Rows-per-page option selected on the results table.
pub const DEFAULT_ROWS_PER_PAGE: &str = "100";

/// Page load timeout: 30 seconds
pub const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: u64 = 30;

/// Element wait timeout: 10 seconds
pub const DEFAULT_ELEMENT_TIMEOUT_SECS: u64 = 10;

/// Time allowed for the app shell to appear after submitting credentials.
pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 15;

/// Settle delay after navigation, form submission and pagination clicks.
///
/// The results table is rendered client-side; reading it immediately after
/// a click returns the previous page.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 3000;

/// Filename prefix for document-store objects (`<prefix>_<location>.json`).
pub const DEFAULT_DOCUMENT_PREFIX: &str = "batchleads_data";

/// Poll interval used while waiting for an element to appear.
pub const ELEMENT_POLL_INTERVAL_MS: u64 = 250;

/// User agent presented by launched browsers
///
/// Updated: 2025-01-29 to Chrome 132 (current stable)
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";
