//! Progress reporting abstraction for scrape sessions
//!
//! Defines the `ProgressReporter` trait for lifecycle event reporting
//! and provides a no-op implementation for simple use cases.

/// Receives human-readable status updates from a running session.
///
/// Only `report` is required; the lifecycle hooks format the standard
/// messages and forward them. Any `Fn(&str, Option<u8>)` closure is a
/// reporter.
pub trait ProgressReporter: Send + Sync {
    /// A status line and, when the amount of work is known, a percentage.
    fn report(&self, message: &str, percent: Option<u8>);

    fn report_searching(&self, location: &str) {
        self.report(&format!("Searching for location {location}..."), Some(0));
    }

    fn report_estimate(&self, total_leads: u64, pages: usize) {
        self.report(
            &format!("Found {total_leads} total leads across approximately {pages} pages"),
            Some(0),
        );
    }

    fn report_page(&self, page: usize, pages: Option<usize>, saved: usize, buffered: usize) {
        match pages {
            Some(pages) if pages > 0 => {
                let percent = (page * 100 / pages).min(99);
                self.report(
                    &format!(
                        "Scraping page {page} of {pages} ({saved} leads saved, {buffered} in current chunk)"
                    ),
                    u8::try_from(percent).ok(),
                );
            }
            _ => self.report(
                &format!("Scraping page {page} ({saved} leads saved, {buffered} in current chunk)"),
                None,
            ),
        }
    }

    fn report_flush(&self, leads: usize) {
        self.report(&format!("Saving chunk of {leads} leads..."), None);
    }

    fn report_cached(&self, leads: usize, age_days: i64) {
        self.report(
            &format!("Loaded {leads} leads from cache ({age_days} days old)"),
            Some(100),
        );
    }

    fn report_completed(&self, leads: usize, pages: usize) {
        self.report(
            &format!("Completed: Scraped and saved {leads} leads from {pages} pages"),
            Some(100),
        );
    }

    fn report_error(&self, error: &str) {
        self.report(&format!("Error: {error}"), None);
    }
}

impl<F> ProgressReporter for F
where
    F: Fn(&str, Option<u8>) + Send + Sync,
{
    fn report(&self, message: &str, percent: Option<u8>) {
        self(message, percent);
    }
}

/// Progress reporter that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgress;

impl ProgressReporter for NoOpProgress {
    #[inline(always)]
    fn report(&self, _message: &str, _percent: Option<u8>) {}
}

/// Forwards every message to the `log` facade at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, message: &str, percent: Option<u8>) {
        match percent {
            Some(p) => log::info!("[{p:>3}%] {message}"),
            None => log::info!("{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_page_percent_is_capped_below_completion() {
        let seen = Mutex::new(Vec::new());
        let reporter = |msg: &str, pct: Option<u8>| seen.lock().unwrap().push((msg.to_string(), pct));

        reporter.report_page(3, Some(3), 200, 100);
        reporter.report_page(1, Some(4), 0, 100);
        reporter.report_page(2, None, 0, 5);

        let seen = seen.into_inner().unwrap();
        assert_eq!(
            seen[0],
            ("Scraping page 3 of 3 (200 leads saved, 100 in current chunk)".to_string(), Some(99))
        );
        assert_eq!(seen[1].1, Some(25));
        assert_eq!(seen[2], ("Scraping page 2 (0 leads saved, 5 in current chunk)".to_string(), None));
    }
}
