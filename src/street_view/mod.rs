//! Street-level property photos
//!
//! Resolves an address to coordinates, checks that imagery exists there and
//! downloads the static image, optionally as base64 for embedding.

mod client;

pub use client::StreetViewClient;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

pub const ENV_API_KEY: &str = "GOOGLE_STREETVIEW_API_KEY";

pub const DEFAULT_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DEFAULT_METADATA_URL: &str = "https://maps.googleapis.com/maps/api/streetview/metadata";
pub const DEFAULT_IMAGE_URL: &str = "https://maps.googleapis.com/maps/api/streetview";

#[derive(Debug, thiserror::Error)]
pub enum StreetViewError {
    #[error("{ENV_API_KEY} is not configured")]
    MissingApiKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: String },

    #[error("could not geocode '{0}'")]
    NotGeocoded(String),

    #[error("no street-level imagery at {0}")]
    NoImagery(Coordinates),

    #[error("expected an image, got '{content_type}'")]
    NotAnImage { content_type: String },
}

pub type StreetViewResult<T> = Result<T, StreetViewError>;

/// Endpoints and key.
#[derive(Clone)]
pub struct StreetViewConfig {
    pub api_key: Option<String>,
    pub geocode_url: String,
    pub metadata_url: String,
    pub image_url: String,
}

impl std::fmt::Debug for StreetViewConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreetViewConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("geocode_url", &self.geocode_url)
            .field("metadata_url", &self.metadata_url)
            .field("image_url", &self.image_url)
            .finish()
    }
}

impl StreetViewConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Key from `GOOGLE_STREETVIEW_API_KEY` (after loading `.env`).
    #[must_use]
    pub fn from_env() -> Self {
        crate::config::env::load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY).filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            log::warn!("{ENV_API_KEY} not set; street view requests will fail");
        }
        Self {
            api_key,
            ..Self::default()
        }
    }

    /// Point every endpoint at `base` (for a proxy or a test server).
    #[must_use]
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.geocode_url = format!("{base}/maps/api/geocode/json");
        self.metadata_url = format!("{base}/maps/api/streetview/metadata");
        self.image_url = format!("{base}/maps/api/streetview");
        self
    }
}

impl Default for StreetViewConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            geocode_url: DEFAULT_GEOCODE_URL.to_string(),
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            image_url: DEFAULT_IMAGE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

/// Capture details for a panorama.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreetViewMetadata {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub pano_id: Option<String>,
    #[serde(default)]
    pub location: Option<Coordinates>,
}

/// Static image parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOptions {
    /// `<width>x<height>`, at most 640x640 on the free tier.
    pub size: String,
    /// Field of view in degrees, 10 to 120.
    pub fov: u32,
    /// -90 to 90.
    pub pitch: i32,
    pub heading: Option<u32>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            size: "640x640".to_string(),
            fov: 120,
            pitch: 0,
            heading: None,
        }
    }
}

/// Where to point the camera.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageTarget {
    Address(String),
    Coordinates(Coordinates),
}

#[derive(Debug, Clone)]
pub struct StreetViewImage {
    pub coordinates: Coordinates,
    pub metadata: StreetViewMetadata,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl StreetViewImage {
    #[must_use]
    pub fn to_base64(&self) -> String {
        to_base64(&self.bytes)
    }
}

#[must_use]
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
