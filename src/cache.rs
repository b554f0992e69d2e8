//! Freshness policy for stored lead sets

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::persistence::{CacheEntry, PersistenceGateway};

/// True when the entry is younger than `max_age_days` whole days.
#[must_use]
pub fn is_fresh(entry: &CacheEntry, max_age_days: i64, now: DateTime<Utc>) -> bool {
    entry.age_days(now) < max_age_days
}

/// A fresh entry together with its age.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub entry: CacheEntry,
    pub age_days: i64,
}

/// Decides whether a location's stored leads can be served as-is.
#[derive(Clone)]
pub struct CacheLifecycle {
    gateway: Arc<dyn PersistenceGateway>,
    max_age_days: i64,
}

impl CacheLifecycle {
    #[must_use]
    pub fn new(gateway: Arc<dyn PersistenceGateway>, max_age_days: i64) -> Self {
        Self {
            gateway,
            max_age_days,
        }
    }

    #[must_use]
    pub fn max_age_days(&self) -> i64 {
        self.max_age_days
    }

    /// The stored entry when it is complete and fresh.
    ///
    /// Stale, incomplete, unreadable and absent entries are all misses; a
    /// storage error is logged and also reported as a miss.
    pub async fn load_if_fresh(&self, location: &str) -> Option<CacheHit> {
        let entry = match self.gateway.read(location).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("No cached leads for '{location}'");
                return None;
            }
            Err(e) => {
                warn!("Cache read for '{location}' failed, rescraping: {e}");
                return None;
            }
        };

        if !entry.complete {
            debug!("Cached leads for '{location}' are from an unfinished session");
            return None;
        }

        let now = Utc::now();
        if !is_fresh(&entry, self.max_age_days, now) {
            debug!(
                "Cached leads for '{location}' are stale ({} days old)",
                entry.age_days(now)
            );
            return None;
        }

        Some(CacheHit {
            age_days: entry.age_days(now).max(0),
            entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry_aged(days: i64, now: DateTime<Utc>) -> CacheEntry {
        CacheEntry {
            timestamp: now - Duration::days(days),
            leads: Vec::new(),
            complete: true,
            total_leads: 0,
        }
    }

    #[test]
    fn test_freshness_boundary() {
        let now = Utc::now();
        assert!(is_fresh(&entry_aged(0, now), 7, now));
        assert!(is_fresh(&entry_aged(6, now), 7, now));
        assert!(!is_fresh(&entry_aged(7, now), 7, now));
        assert!(!is_fresh(&entry_aged(30, now), 7, now));
    }

    #[test]
    fn test_partial_day_rounds_down() {
        let now = Utc::now();
        let mut entry = entry_aged(6, now);
        entry.timestamp -= Duration::hours(23);
        assert!(is_fresh(&entry, 7, now));
    }
}
