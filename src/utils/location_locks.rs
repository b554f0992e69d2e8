//! Per-location async mutexes

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// One holder per location at a time.
///
/// Entries are created on first use and removed again when the last guard
/// for a location is released, so the map only holds locations in use.
#[derive(Debug, Default, Clone)]
pub struct LocationLocks {
    locks: Arc<LockMap>,
}

impl LocationLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `location`.
    pub async fn acquire(&self, location: &str) -> LocationGuard {
        let lock = self
            .locks
            .entry(location.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        LocationGuard {
            locks: Arc::clone(&self.locks),
            location: location.to_string(),
            guard: Some(guard),
        }
    }

    /// Whether someone currently holds `location`.
    #[must_use]
    pub fn is_locked(&self, location: &str) -> bool {
        self.locks
            .get(location)
            .is_some_and(|lock| lock.try_lock().is_err())
    }

    /// Locations with a live entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held lock on one location; releases and prunes on drop.
pub struct LocationGuard {
    locks: Arc<LockMap>,
    location: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl LocationGuard {
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl Drop for LocationGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // the map's own reference is the last one: nobody holds or waits
        self.locks
            .remove_if(&self.location, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_location_waits() {
        let locks = LocationLocks::new();
        let guard = locks.acquire("93720").await;
        assert!(locks.is_locked("93720"));

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = other.acquire("93720").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // a different location is independent
        let _clovis = locks.acquire("Clovis").await;

        drop(guard);
        waiter.await.unwrap();
        assert!(!locks.is_locked("93720"));
    }

    #[tokio::test]
    async fn test_released_locations_are_pruned() {
        let locks = LocationLocks::new();

        let fresno = locks.acquire("Fresno").await;
        let clovis = locks.acquire("Clovis").await;
        assert_eq!(locks.len(), 2);

        drop(fresno);
        assert_eq!(locks.len(), 1);
        drop(clovis);
        assert!(locks.is_empty());

        for n in 0..100 {
            let _g = locks.acquire(&format!("zip-{n}")).await;
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_survives_while_someone_waits() {
        let locks = LocationLocks::new();
        let guard = locks.acquire("Hemet").await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let g = other.acquire("Hemet").await;
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(g);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // the waiter still references the entry
        drop(guard);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
