//! Configuration module for lead scraping
//!
//! This module provides the `ScraperConfig` struct and its type-safe builder,
//! the storage backend selection, and loading both from the environment.

// Sub-modules
pub mod builder;
pub mod env;
pub mod getters;
pub mod types;

// Re-exports for public API
pub use builder::{ScraperConfigBuilder, WithCredentials};
pub use types::{Credentials, ScraperConfig, StorageBackend, StorageConfig};
