//! SQLite lead store
//!
//! One row per lead. A small `locations` table carries the per-location
//! entry metadata (last write, completeness, total) so `read` can rebuild a
//! `CacheEntry` without scanning timestamps.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Row, Sqlite, SqlitePool};

use super::export::render_csv;
use super::{
    CacheEntry, MergeReport, PersistenceError, PersistenceGateway, PersistenceResult,
    format_timestamp, object_stem, parse_timestamp,
};
use crate::lead::{FieldValue, LEAD_COLUMNS, Lead, StoredLead, is_numeric_column};

pub(crate) type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Metadata table; the `leads` table is generated from the schema columns.
const LOCATIONS_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS locations (
    location TEXT PRIMARY KEY,
    updated_at TEXT NOT NULL,
    complete INTEGER NOT NULL DEFAULT 0,
    total_leads INTEGER NOT NULL DEFAULT 0
);
"#;

fn leads_schema_sql() -> String {
    let columns: Vec<String> = LEAD_COLUMNS
        .iter()
        .map(|col| {
            let ty = if is_numeric_column(col) { "INTEGER" } else { "TEXT" };
            format!("    {col} {ty}")
        })
        .collect();

    format!(
        r#"
CREATE TABLE IF NOT EXISTS leads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    location TEXT NOT NULL,
{},
    created_at TEXT NOT NULL,
    is_favorite INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_leads_location ON leads(location);
CREATE INDEX IF NOT EXISTS idx_leads_favorite ON leads(is_favorite);
"#,
        columns.join(",\n")
    )
}

fn insert_sql() -> String {
    let placeholders = vec!["?"; LEAD_COLUMNS.len()].join(", ");
    format!(
        "INSERT INTO leads (location, created_at, is_favorite, {}) VALUES (?, ?, 0, {placeholders})",
        LEAD_COLUMNS.join(", ")
    )
}

pub(crate) fn bind_field<'q>(query: SqliteQuery<'q>, value: Option<&FieldValue>) -> SqliteQuery<'q> {
    match value {
        Some(FieldValue::Integer(n)) => query.bind(*n),
        Some(FieldValue::Text(s)) => query.bind(s.clone()),
        None => query.bind(None::<String>),
    }
}

pub(crate) fn row_to_stored(row: &SqliteRow) -> PersistenceResult<StoredLead> {
    let created_at: String = row.try_get("created_at")?;

    let mut lead = Lead::new();
    for col in LEAD_COLUMNS {
        let value = if is_numeric_column(col) {
            row.try_get::<Option<i64>, _>(col)?.map(FieldValue::Integer)
        } else {
            row.try_get::<Option<String>, _>(col)?.map(FieldValue::Text)
        };
        lead.set(col, value);
    }

    Ok(StoredLead {
        id: Some(row.try_get("id")?),
        location: row.try_get("location")?,
        created_at: parse_timestamp(&created_at)?,
        is_favorite: row.try_get("is_favorite")?,
        lead,
    })
}

/// SQLite-backed `PersistenceGateway`.
#[derive(Clone)]
pub struct SqliteLeadStore {
    pub(crate) pool: SqlitePool,
    insert_sql: String,
    export_dir: PathBuf,
    export_prefix: String,
}

impl SqliteLeadStore {
    /// Open an existing database or create a new one.
    ///
    /// CSV exports of completed sessions are written to `export_dir` as
    /// `<export_prefix>_<location>.csv`.
    pub async fn open(
        db_path: &Path,
        export_dir: &Path,
        export_prefix: &str,
    ) -> PersistenceResult<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        // idempotent: CREATE IF NOT EXISTS
        sqlx::query(&leads_schema_sql()).execute(&pool).await?;
        sqlx::query(LOCATIONS_SQL).execute(&pool).await?;

        Ok(Self {
            pool,
            insert_sql: insert_sql(),
            export_dir: export_dir.to_path_buf(),
            export_prefix: export_prefix.to_string(),
        })
    }

    /// Path of the CSV export for `location`.
    #[must_use]
    pub fn export_path(&self, location: &str) -> PathBuf {
        self.export_dir
            .join(format!("{}.csv", object_stem(&self.export_prefix, location)))
    }

    /// All stored leads of `location`, in insertion order.
    pub async fn leads_for(&self, location: &str) -> PersistenceResult<Vec<StoredLead>> {
        let rows = sqlx::query("SELECT * FROM leads WHERE location = ? ORDER BY id")
            .bind(location)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_stored).collect()
    }

    async fn write_export(&self, location: &str) -> PersistenceResult<String> {
        let leads = self.leads_for(location).await?;
        let path = self.export_path(location);

        let bytes = tokio::task::spawn_blocking(move || render_csv(&leads))
            .await
            .map_err(|e| PersistenceError::Task(e.to_string()))??;

        tokio::fs::create_dir_all(&self.export_dir).await?;
        tokio::fs::write(&path, bytes).await?;
        Ok(path.display().to_string())
    }
}

#[async_trait]
impl PersistenceGateway for SqliteLeadStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn clear(&self, location: &str) -> PersistenceResult<()> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM leads WHERE location = ?")
            .bind(location)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM locations WHERE location = ?")
            .bind(location)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("Cleared {deleted} stored leads for '{location}'");
        Ok(())
    }

    async fn merge_chunk(
        &self,
        location: &str,
        leads: Vec<Lead>,
        is_final: bool,
    ) -> PersistenceResult<MergeReport> {
        let now = format_timestamp(Utc::now());
        let mut tx = self.pool.begin().await?;

        for lead in &leads {
            let mut query = sqlx::query(&self.insert_sql).bind(location).bind(&now);
            for col in LEAD_COLUMNS {
                query = bind_field(query, lead.get(col));
            }
            query.execute(&mut *tx).await?;
        }

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM leads WHERE location = ?")
            .bind(location)
            .fetch_one(&mut *tx)
            .await?;

        // completeness is only set once the export exists
        sqlx::query(
            r#"
            INSERT INTO locations (location, updated_at, complete, total_leads)
            VALUES (?, ?, 0, ?)
            ON CONFLICT(location) DO UPDATE SET
                updated_at = excluded.updated_at,
                complete = 0,
                total_leads = excluded.total_leads
            "#,
        )
        .bind(location)
        .bind(&now)
        .bind(total)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let export = if is_final {
            let export = self.write_export(location).await?;
            sqlx::query("UPDATE locations SET complete = 1 WHERE location = ?")
                .bind(location)
                .execute(&self.pool)
                .await?;
            Some(export)
        } else {
            None
        };

        Ok(MergeReport {
            appended: leads.len(),
            total: usize::try_from(total).unwrap_or_default(),
            export,
        })
    }

    async fn read(&self, location: &str) -> PersistenceResult<Option<CacheEntry>> {
        let meta: Option<(String, bool, i64)> = sqlx::query_as(
            "SELECT updated_at, complete, total_leads FROM locations WHERE location = ?",
        )
        .bind(location)
        .fetch_optional(&self.pool)
        .await?;

        let leads = match self.leads_for(location).await {
            Ok(leads) => leads,
            Err(PersistenceError::Malformed(msg)) => {
                warn!("Stored leads for '{location}' are unreadable: {msg}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let entry = match meta {
            Some((updated_at, complete, total)) => {
                let timestamp = match parse_timestamp(&updated_at) {
                    Ok(ts) => ts,
                    Err(e) => {
                        warn!("Entry for '{location}' is unreadable: {e}");
                        return Ok(None);
                    }
                };
                CacheEntry {
                    timestamp,
                    complete,
                    total_leads: usize::try_from(total).unwrap_or(leads.len()),
                    leads,
                }
            }
            // rows written without metadata: newest row dates the entry
            None => {
                let Some(timestamp) = leads.iter().map(|l| l.created_at).max() else {
                    return Ok(None);
                };
                CacheEntry {
                    timestamp,
                    complete: true,
                    total_leads: leads.len(),
                    leads,
                }
            }
        };

        Ok(Some(entry))
    }

    async fn list_locations(&self) -> PersistenceResult<BTreeSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT location FROM leads UNION SELECT location FROM locations",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(loc,)| loc).collect())
    }

    async fn exists(&self, location: &str) -> PersistenceResult<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM leads WHERE location = ?")
            .bind(location)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}
