//! Loading configuration from environment variables
//!
//! `from_env` reads `.env` (if present) through `dotenvy` and then the
//! process environment. `from_lookup` takes any key/value source so callers
//! and tests never have to mutate the process environment.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};

use super::types::{ScraperConfig, StorageBackend, StorageConfig};
use crate::utils::DEFAULT_DOCUMENT_PREFIX;

pub const ENV_EMAIL: &str = "BATCHLEADS_EMAIL";
pub const ENV_PASSWORD: &str = "BATCHLEADS_PASSWORD";
pub const ENV_BASE_URL: &str = "BATCHLEADS_BASE_URL";
pub const ENV_MAX_PAGES: &str = "MAX_PAGES";
pub const ENV_HEADLESS: &str = "HEADLESS";
pub const ENV_BATCH_SIZE: &str = "BATCH_SIZE";
pub const ENV_WRITE_THRESHOLD_MB: &str = "WRITE_THRESHOLD_MB";
pub const ENV_CACHE_MAX_AGE_DAYS: &str = "CACHE_MAX_AGE_DAYS";
pub const ENV_DATABASE_PATH: &str = "LEADS_DATABASE_PATH";
pub const ENV_DOCUMENT_DIR: &str = "LEADS_DOCUMENT_DIR";
pub const ENV_DOCUMENT_URL: &str = "LEADS_DOCUMENT_URL";
pub const ENV_DOCUMENT_TOKEN: &str = "LEADS_DOCUMENT_TOKEN";
pub const ENV_DOCUMENT_PREFIX: &str = "LEADS_DOCUMENT_PREFIX";
pub const ENV_EXPORT_DIR: &str = "LEADS_EXPORT_DIR";

/// Load `.env` once; a missing file is not an error.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("Ignoring unreadable .env file: {e}"),
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| anyhow!("{key}='{raw}' is not valid: {e}"))
        })
        .transpose()
}

/// `true/false`, `1/0`, `yes/no`, `on/off`, case-insensitive.
pub fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("'{other}' is not a boolean"),
    }
}

impl ScraperConfig {
    /// Build from `.env` and the process environment.
    pub fn from_env() -> Result<Self> {
        load_dotenv();
        Self::from_lookup(process_env)
    }

    /// Build from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let email = non_empty(&lookup, ENV_EMAIL)
            .with_context(|| format!("{ENV_EMAIL} must be set"))?;
        let password = lookup(ENV_PASSWORD)
            .filter(|p| !p.is_empty())
            .with_context(|| format!("{ENV_PASSWORD} must be set"))?;

        let mut builder = ScraperConfig::builder().credentials(email, password);

        if let Some(url) = non_empty(&lookup, ENV_BASE_URL) {
            builder = builder.base_url(url);
        }
        if let Some(pages) = parse_var::<usize, _>(&lookup, ENV_MAX_PAGES)? {
            builder = builder.max_pages(pages);
        }
        if let Some(raw) = non_empty(&lookup, ENV_HEADLESS) {
            builder = builder.headless(parse_flag(&raw).context(ENV_HEADLESS)?);
        }
        if let Some(size) = parse_var::<usize, _>(&lookup, ENV_BATCH_SIZE)? {
            builder = builder.batch_size(size);
        }
        if let Some(mb) = parse_var::<f64, _>(&lookup, ENV_WRITE_THRESHOLD_MB)? {
            builder = builder.write_threshold_mb(mb);
        }
        if let Some(days) = parse_var::<i64, _>(&lookup, ENV_CACHE_MAX_AGE_DAYS)? {
            builder = builder.cache_max_age_days(days);
        }

        builder.build()
    }
}

impl StorageConfig {
    /// Build from `.env` and the process environment.
    pub fn from_env() -> Result<Self> {
        load_dotenv();
        Ok(Self::from_lookup(process_env))
    }

    /// Backend precedence: HTTP document store, document directory, SQLite.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = if let Some(url) = non_empty(&lookup, ENV_DOCUMENT_URL) {
            StorageBackend::DocumentHttp {
                url,
                auth_token: non_empty(&lookup, ENV_DOCUMENT_TOKEN),
            }
        } else if let Some(dir) = non_empty(&lookup, ENV_DOCUMENT_DIR) {
            StorageBackend::DocumentDir {
                dir: PathBuf::from(dir),
            }
        } else {
            StorageBackend::Sqlite {
                path: non_empty(&lookup, ENV_DATABASE_PATH)
                    .map_or_else(|| PathBuf::from("leads.db"), PathBuf::from),
            }
        };

        Self {
            backend,
            document_prefix: non_empty(&lookup, ENV_DOCUMENT_PREFIX)
                .unwrap_or_else(|| DEFAULT_DOCUMENT_PREFIX.to_string()),
            export_dir: non_empty(&lookup, ENV_EXPORT_DIR)
                .map_or_else(|| PathBuf::from("exports"), PathBuf::from),
        }
    }
}
