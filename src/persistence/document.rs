//! JSON-document lead store
//!
//! Each location is one `<prefix>_<location>.json` object holding the whole
//! `CacheEntry`. Merges are read-append-write, so writers to the same
//! location are serialized by a per-location lock inside the store.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use tokio::time::timeout;

use super::export::render_csv;
use super::object_store::ObjectStore;
use super::{
    CacheEntry, MergeReport, PersistenceError, PersistenceGateway, PersistenceResult, object_stem,
};
use crate::lead::{Lead, StoredLead};
use crate::utils::LocationLocks;

/// Timeout for blocking (de)serialization of a location document
const BLOCKING_SERIALIZATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Run CPU-bound work off the async runtime with a timeout.
async fn run_blocking<T, F>(what: &'static str, f: F) -> PersistenceResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> PersistenceResult<T> + Send + 'static,
{
    match timeout(BLOCKING_SERIALIZATION_TIMEOUT, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(PersistenceError::Task(format!("{what} task panicked: {e}"))),
        Err(_) => Err(PersistenceError::Task(format!(
            "{what} timed out after {BLOCKING_SERIALIZATION_TIMEOUT:?}"
        ))),
    }
}

/// `PersistenceGateway` over any `ObjectStore`.
pub struct DocumentLeadStore {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    locks: LocationLocks,
}

impl DocumentLeadStore {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
            locks: LocationLocks::new(),
        }
    }

    /// Object key of the location document.
    #[must_use]
    pub fn document_key(&self, location: &str) -> String {
        format!("{}.json", object_stem(&self.prefix, location))
    }

    /// Object key of the CSV export.
    #[must_use]
    pub fn export_key(&self, location: &str) -> String {
        format!("{}.csv", object_stem(&self.prefix, location))
    }

    /// Fetch and decode the document; unreadable documents count as absent.
    async fn load(&self, location: &str) -> PersistenceResult<Option<CacheEntry>> {
        self.load_key(&self.document_key(location)).await
    }

    async fn load_key(&self, key: &str) -> PersistenceResult<Option<CacheEntry>> {
        let Some(bytes) = self.store.get(key).await? else {
            return Ok(None);
        };

        let decoded = run_blocking("document decode", move || {
            Ok(serde_json::from_slice::<CacheEntry>(&bytes))
        })
        .await?;

        match decoded {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("Document '{key}' is malformed, treating as absent: {e}");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl PersistenceGateway for DocumentLeadStore {
    fn backend_name(&self) -> &'static str {
        "document"
    }

    async fn clear(&self, location: &str) -> PersistenceResult<()> {
        let _guard = self.locks.acquire(location).await;

        self.store.delete(&self.document_key(location)).await?;
        self.store.delete(&self.export_key(location)).await?;
        debug!("Cleared document for '{location}'");
        Ok(())
    }

    async fn merge_chunk(
        &self,
        location: &str,
        leads: Vec<Lead>,
        is_final: bool,
    ) -> PersistenceResult<MergeReport> {
        let _guard = self.locks.acquire(location).await;

        let now = Utc::now();
        let appended = leads.len();

        let mut merged = self
            .load(location)
            .await?
            .map(|entry| entry.leads)
            .unwrap_or_default();
        merged.extend(
            leads
                .into_iter()
                .map(|lead| StoredLead::new(location, lead, now)),
        );

        let entry = CacheEntry {
            timestamp: now,
            total_leads: merged.len(),
            leads: merged,
            complete: is_final,
        };
        let total = entry.total_leads;

        let (json, entry) = run_blocking("document encode", move || {
            let json = serde_json::to_vec(&entry)?;
            Ok((json, entry))
        })
        .await?;

        // the export lands before the document that marks the entry complete
        let export = if is_final {
            let csv = run_blocking("csv export", move || Ok(render_csv(&entry.leads)?)).await?;
            let key = self.export_key(location);
            self.store.put(&key, csv, "text/csv").await?;
            Some(key)
        } else {
            None
        };

        self.store
            .put(&self.document_key(location), json, "application/json")
            .await?;

        Ok(MergeReport {
            appended,
            total,
            export,
        })
    }

    async fn read(&self, location: &str) -> PersistenceResult<Option<CacheEntry>> {
        self.load(location).await
    }

    /// Locations as they were requested.
    ///
    /// Object keys carry a filesystem-safe form of the location, so the name
    /// is taken from the stored leads and the key is only a fallback.
    async fn list_locations(&self) -> PersistenceResult<BTreeSet<String>> {
        let prefix = format!("{}_", self.prefix);
        let keys = self.store.list(&prefix).await?;

        let mut locations = BTreeSet::new();
        for key in &keys {
            let Some(stem) = key.strip_prefix(&prefix).and_then(|k| k.strip_suffix(".json")) else {
                continue;
            };
            let stored = match self.load_key(key).await? {
                Some(entry) => entry.leads.into_iter().next().map(|lead| lead.location),
                None => None,
            };
            locations.insert(stored.unwrap_or_else(|| stem.to_string()));
        }
        Ok(locations)
    }

    async fn exists(&self, location: &str) -> PersistenceResult<bool> {
        self.store.exists(&self.document_key(location)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::FieldValue;
    use crate::persistence::FsObjectStore;
    use tempfile::TempDir;

    /// Local store whose CSV uploads are refused.
    struct NoExports(FsObjectStore);

    #[async_trait]
    impl ObjectStore for NoExports {
        async fn get(&self, key: &str) -> PersistenceResult<Option<Vec<u8>>> {
            self.0.get(key).await
        }

        async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> PersistenceResult<()> {
            if key.ends_with(".csv") {
                return Err(PersistenceError::RemoteStatus {
                    status: 507,
                    key: key.to_string(),
                });
            }
            self.0.put(key, body, content_type).await
        }

        async fn delete(&self, key: &str) -> PersistenceResult<()> {
            self.0.delete(key).await
        }

        async fn list(&self, prefix: &str) -> PersistenceResult<Vec<String>> {
            self.0.list(prefix).await
        }
    }

    fn lead(address: &str) -> Lead {
        let mut lead = Lead::new();
        lead.set("property_address", Some(FieldValue::Text(address.into())));
        lead
    }

    #[tokio::test]
    async fn test_keys_follow_prefix_convention() {
        let dir = TempDir::new().unwrap();
        let store = DocumentLeadStore::new(Arc::new(FsObjectStore::new(dir.path())), "batchleads_data");
        assert_eq!(store.document_key("93720"), "batchleads_data_93720.json");
        assert_eq!(store.export_key("Los Angeles"), "batchleads_data_Los Angeles.csv");
    }

    #[tokio::test]
    async fn test_partial_merge_writes_no_export() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = DocumentLeadStore::new(Arc::new(FsObjectStore::new(dir.path())), "leads");

        store.merge_chunk("93720", vec![lead("1 A St")], false).await?;
        assert!(dir.path().join("leads_93720.json").exists());
        assert!(!dir.path().join("leads_93720.csv").exists());

        let report = store.merge_chunk("93720", vec![lead("2 B St")], true).await?;
        assert_eq!(report.total, 2);
        assert_eq!(report.export.as_deref(), Some("leads_93720.csv"));
        assert!(dir.path().join("leads_93720.csv").exists());

        let locations = store.list_locations().await?;
        assert_eq!(locations.into_iter().collect::<Vec<_>>(), vec!["93720".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_document_is_a_miss() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("leads_90001.json"), b"{\"timestamp\": 12")?;
        let store = DocumentLeadStore::new(Arc::new(FsObjectStore::new(dir.path())), "leads");

        assert!(store.read("90001").await?.is_none());

        // a merge over a malformed document starts a fresh list
        let report = store.merge_chunk("90001", vec![lead("1 A St")], false).await?;
        assert_eq!(report.total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_export_leaves_entry_incomplete() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = DocumentLeadStore::new(
            Arc::new(NoExports(FsObjectStore::new(dir.path()))),
            "leads",
        );

        store.merge_chunk("Perris", vec![lead("1 A St")], false).await?;
        let result = store.merge_chunk("Perris", vec![lead("2 B St")], true).await;
        assert!(result.is_err());

        let entry = store.read("Perris").await?.expect("entry");
        assert!(!entry.complete);
        assert_eq!(entry.total_leads, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_listed_locations_round_trip() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = DocumentLeadStore::new(Arc::new(FsObjectStore::new(dir.path())), "leads");

        store.merge_chunk("Tulare/Kings: CA", vec![lead("1 A St")], true).await?;
        assert_ne!(store.document_key("Tulare/Kings: CA"), "leads_Tulare/Kings: CA.json");

        let locations = store.list_locations().await?;
        assert_eq!(
            locations.iter().collect::<Vec<_>>(),
            vec!["Tulare/Kings: CA"]
        );
        for location in &locations {
            assert!(store.exists(location).await?);
            assert!(store.read(location).await?.is_some());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_merge_locks_are_released() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = DocumentLeadStore::new(Arc::new(FsObjectStore::new(dir.path())), "leads");

        for n in 0..5 {
            store.merge_chunk(&format!("9000{n}"), vec![lead("1 A St")], false).await?;
        }
        store.clear("90000").await?;
        assert!(store.locks.is_empty());
        Ok(())
    }
}
