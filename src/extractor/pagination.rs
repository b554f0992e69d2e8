//! Pagination indicator parsing
//!
//! The results footer renders a range summary such as `1,001 - 1,025 of 5,234`.
//! Only the text is stable enough to rely on; the surrounding markup is not.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RANGE_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^\s*(\d[\d,]*)\s*-\s*(\d[\d,]*)\s+of\s+(\d[\d,]*)\s*$").ok()
});

/// Range summary read from the results footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub current_start: u64,
    pub current_end: u64,
}

impl Pagination {
    /// Estimated page count given how many leads the first page held.
    ///
    /// `None` when the page size is zero.
    #[must_use]
    pub fn estimated_pages(&self, page_size: usize) -> Option<usize> {
        if page_size == 0 {
            return None;
        }
        let total = usize::try_from(self.total).ok()?;
        Some(total.div_ceil(page_size))
    }
}

fn parse_count(text: &str) -> Option<u64> {
    text.replace(',', "").parse().ok()
}

/// Parse one span's text as a `<start> - <end> of <total>` summary.
#[must_use]
pub fn parse_pagination_text(text: &str) -> Option<Pagination> {
    let pattern = RANGE_PATTERN.as_ref()?;
    let caps = pattern.captures(text)?;

    Some(Pagination {
        current_start: parse_count(caps.get(1)?.as_str())?,
        current_end: parse_count(caps.get(2)?.as_str())?,
        total: parse_count(caps.get(3)?.as_str())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_thousands_separators() {
        assert_eq!(
            parse_pagination_text(" 1,001 - 1,025 of 5,234 "),
            Some(Pagination {
                total: 5234,
                current_start: 1001,
                current_end: 1025,
            })
        );
    }

    #[test]
    fn test_parse_rejects_other_text() {
        assert_eq!(parse_pagination_text(" invalid format "), None);
        assert_eq!(parse_pagination_text("Page 1 of 3"), None);
        assert_eq!(parse_pagination_text(""), None);
    }

    #[test]
    fn test_estimated_pages_rounds_up() {
        let p = parse_pagination_text("1 - 100 of 250").unwrap();
        assert_eq!(p.estimated_pages(100), Some(3));
        assert_eq!(p.estimated_pages(0), None);
    }
}
