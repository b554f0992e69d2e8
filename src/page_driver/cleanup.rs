//! Browser teardown at the end of a session

use chromiumoxide::Browser;
use log::{debug, warn};
use tokio::task::JoinHandle;

/// Result of cleanup operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupResult {
    /// All cleanup operations succeeded
    Success,
    /// Some cleanup operations failed, with error details
    PartialFailure(Vec<String>),
}

/// Close the browser, stop its handler and remove its profile directory.
///
/// Every step runs even when an earlier one fails.
pub async fn cleanup_browser_and_data(
    mut browser: Browser,
    handler: JoinHandle<()>,
    chrome_data_dir: std::path::PathBuf,
) -> CleanupResult {
    let mut errors = Vec::new();

    debug!(target: "leadscrape::cleanup", "Closing browser");
    if let Err(e) = browser.close().await {
        warn!(target: "leadscrape::cleanup", "Failed to close browser: {e}");
        errors.push(format!("Browser close failed: {e}"));
    }

    // reap the process so it is not reported as leaked
    if let Err(e) = browser.wait().await {
        warn!(target: "leadscrape::cleanup", "Failed to wait for browser exit: {e}");
        errors.push(format!("Browser wait failed: {e}"));
    }

    handler.abort();

    if let Err(e) = tokio::fs::remove_dir_all(&chrome_data_dir).await {
        warn!(target: "leadscrape::cleanup", "Failed to remove profile directory: {e}");
        errors.push(format!("Directory cleanup failed: {e}"));
    }

    if errors.is_empty() {
        debug!(target: "leadscrape::cleanup", "Browser cleanup complete");
        CleanupResult::Success
    } else {
        CleanupResult::PartialFailure(errors)
    }
}
