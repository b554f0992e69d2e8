//! Core configuration types for lead scraping

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::extractor::TableLayout;
use crate::page_driver::SiteLayout;

/// Login credentials for the lead-list web app.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Main configuration struct for scrape sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Application root, always with a trailing slash.
    pub(crate) base_url: String,
    pub(crate) credentials: Credentials,
    pub(crate) headless: bool,
    pub(crate) max_pages: usize,
    pub(crate) batch_size: usize,
    pub(crate) write_threshold_bytes: usize,
    pub(crate) cache_max_age_days: i64,
    /// Option value picked in the rows-per-page select, `None` leaves the site default.
    pub(crate) rows_per_page: Option<String>,
    pub(crate) page_load_timeout_secs: u64,
    pub(crate) element_timeout_secs: u64,
    pub(crate) login_timeout_secs: u64,
    pub(crate) settle_delay_ms: u64,
    /// Re-read the stored lead set into the result on completion.
    pub(crate) return_leads: bool,
    pub(crate) chrome_data_dir: Option<PathBuf>,
    pub(crate) table_layout: TableLayout,
    pub(crate) site: SiteLayout,
}

/// Which durable store backs the lead sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageBackend {
    Sqlite { path: PathBuf },
    DocumentDir { dir: PathBuf },
    DocumentHttp { url: String, auth_token: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// `<prefix>_<location>.json|csv` naming for documents and exports.
    pub document_prefix: String,
    /// Directory for the SQLite backend's CSV exports.
    pub export_dir: PathBuf,
}

impl StorageConfig {
    #[must_use]
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::Sqlite { path: path.into() },
            ..Self::default()
        }
    }

    #[must_use]
    pub fn document_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::DocumentDir { dir: dir.into() },
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_document_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.document_prefix = prefix.into();
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite {
                path: PathBuf::from("leads.db"),
            },
            document_prefix: crate::utils::DEFAULT_DOCUMENT_PREFIX.to_string(),
            export_dir: PathBuf::from("exports"),
        }
    }
}
