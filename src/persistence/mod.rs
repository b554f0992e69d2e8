//! Durable lead storage
//!
//! `PersistenceGateway` is the single capability set the orchestrator talks
//! to. Two backends implement it with identical merge semantics:
//!
//! - [`SqliteLeadStore`]: one row per lead in a local SQLite database, plus
//!   the relational query surface (filters, favorites, filter options).
//! - [`DocumentLeadStore`]: one JSON document per location in an
//!   [`ObjectStore`] (a local directory or an HTTP object store).
//!
//! Merges are pure appends. Only a final merge materializes the CSV export.

pub mod document;
pub mod export;
pub mod object_store;
pub mod query;
pub mod sqlite;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{StorageBackend, StorageConfig};
use crate::lead::{Lead, StoredLead};

pub use document::DocumentLeadStore;
pub use object_store::{FsObjectStore, HttpObjectStore, ObjectStore};
pub use query::{FilterOptions, LeadPage, LeadQuery, LocationSummary, Predicate, SortOrder};
pub use sqlite::SqliteLeadStore;

/// Errors raised by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("object store returned HTTP {status} for '{key}'")]
    RemoteStatus { status: u16, key: String },

    #[error("malformed stored data: {0}")]
    Malformed(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("invalid storage configuration: {0}")]
    Config(String),
}

impl PersistenceError {
    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(e) => matches!(e, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)),
            Self::Io(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::RemoteStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Serialization(_) | Self::Malformed(_) | Self::Task(_) | Self::Config(_) => {
                false
            }
        }
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// The persisted lead set of one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Time of the last merge.
    pub timestamp: DateTime<Utc>,
    pub leads: Vec<StoredLead>,
    /// Set by a final merge; false while a session is still writing.
    pub complete: bool,
    pub total_leads: usize,
}

impl CacheEntry {
    /// Whole days elapsed since the last write.
    #[must_use]
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp).num_days()
    }
}

/// Outcome of a successful `merge_chunk`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Leads appended by this merge.
    pub appended: usize,
    /// Leads stored for the location after the merge.
    pub total: usize,
    /// Where the export was written, when this was a final merge.
    pub export: Option<String>,
}

/// Location-keyed durable store for lead sets.
///
/// Implementations never panic on I/O failure; every failure comes back as
/// a `PersistenceError` and the caller decides whether it is fatal.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Remove every stored lead of `location`.
    async fn clear(&self, location: &str) -> PersistenceResult<()>;

    /// Append `leads` after the location's existing leads and stamp the
    /// entry with the current time. A final merge also marks the entry
    /// complete and writes the CSV export of the full set.
    async fn merge_chunk(
        &self,
        location: &str,
        leads: Vec<Lead>,
        is_final: bool,
    ) -> PersistenceResult<MergeReport>;

    /// The stored entry, `None` when absent or unreadable.
    async fn read(&self, location: &str) -> PersistenceResult<Option<CacheEntry>>;

    async fn list_locations(&self) -> PersistenceResult<BTreeSet<String>>;

    async fn exists(&self, location: &str) -> PersistenceResult<bool>;
}

/// Open the backend selected by `config`.
pub async fn open_gateway(config: &StorageConfig) -> PersistenceResult<Arc<dyn PersistenceGateway>> {
    let gateway: Arc<dyn PersistenceGateway> = match &config.backend {
        StorageBackend::Sqlite { path } => {
            Arc::new(SqliteLeadStore::open(path, &config.export_dir, &config.document_prefix).await?)
        }
        StorageBackend::DocumentDir { dir } => Arc::new(DocumentLeadStore::new(
            Arc::new(FsObjectStore::new(dir)),
            &config.document_prefix,
        )),
        StorageBackend::DocumentHttp { url, auth_token } => Arc::new(DocumentLeadStore::new(
            Arc::new(HttpObjectStore::new(url, auth_token.clone())?),
            &config.document_prefix,
        )),
    };
    log::info!("Opened {} lead store", gateway.backend_name());
    Ok(gateway)
}

/// `<prefix>_<location>` with the location made filesystem safe.
#[must_use]
pub fn object_stem(prefix: &str, location: &str) -> String {
    format!("{prefix}_{}", sanitize_filename::sanitize(location.trim()))
}

pub(crate) fn parse_timestamp(raw: &str) -> PersistenceResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| PersistenceError::Malformed(format!("bad timestamp '{raw}': {e}")))
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
