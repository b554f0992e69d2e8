use std::time::Duration;

use log::{debug, info, warn};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use super::{
    Coordinates, ImageOptions, ImageTarget, StreetViewConfig, StreetViewError, StreetViewImage,
    StreetViewMetadata, StreetViewResult,
};

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);
const IMAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Statuses that mean "nothing here" rather than "request failed".
const EMPTY_STATUSES: [&str; 2] = ["ZERO_RESULTS", "NOT_FOUND"];

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    location: Coordinates,
}

#[derive(Deserialize)]
struct MetadataResponse {
    status: String,
    #[serde(flatten)]
    metadata: StreetViewMetadata,
}

/// Client for the geocoding, street view metadata and static image APIs.
#[derive(Debug, Clone)]
pub struct StreetViewClient {
    client: reqwest::Client,
    config: StreetViewConfig,
}

impl StreetViewClient {
    pub fn new(config: StreetViewConfig) -> StreetViewResult<Self> {
        let client = reqwest::Client::builder().timeout(IMAGE_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn api_key(&self) -> StreetViewResult<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or(StreetViewError::MissingApiKey)
    }

    /// Coordinates of the first geocoding match, `None` when there is none.
    pub async fn geocode(&self, address: &str) -> StreetViewResult<Option<Coordinates>> {
        let key = self.api_key()?;
        let response: GeocodeResponse = self
            .client
            .get(&self.config.geocode_url)
            .query(&[("address", address), ("key", key)])
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.status.as_str() {
            "OK" => Ok(response
                .results
                .into_iter()
                .next()
                .map(|r| r.geometry.location)),
            status if EMPTY_STATUSES.contains(&status) => {
                debug!("No geocoding match for '{address}'");
                Ok(None)
            }
            _ => Err(StreetViewError::Status {
                service: "geocoding",
                status: response.status,
            }),
        }
    }

    /// Panorama details at `at`, `None` when there is no imagery.
    pub async fn metadata(
        &self,
        at: Coordinates,
        heading: Option<u32>,
    ) -> StreetViewResult<Option<StreetViewMetadata>> {
        let key = self.api_key()?;
        let mut request = self
            .client
            .get(&self.config.metadata_url)
            .query(&[("location", at.to_string().as_str()), ("key", key)])
            .timeout(LOOKUP_TIMEOUT);
        if let Some(heading) = heading {
            request = request.query(&[("heading", heading)]);
        }

        let response: MetadataResponse = request.send().await?.error_for_status()?.json().await?;
        match response.status.as_str() {
            "OK" => Ok(Some(response.metadata)),
            status if EMPTY_STATUSES.contains(&status) => Ok(None),
            _ => Err(StreetViewError::Status {
                service: "street view metadata",
                status: response.status,
            }),
        }
    }

    /// Download the static image for `target`.
    ///
    /// Addresses are geocoded first. The download only happens when the
    /// metadata lookup confirms imagery exists, since the image endpoint
    /// answers missing locations with a placeholder picture.
    pub async fn fetch_image(
        &self,
        target: &ImageTarget,
        options: &ImageOptions,
    ) -> StreetViewResult<StreetViewImage> {
        let key = self.api_key()?;

        let coordinates = match target {
            ImageTarget::Coordinates(c) => *c,
            ImageTarget::Address(address) => self
                .geocode(address)
                .await?
                .ok_or_else(|| StreetViewError::NotGeocoded(address.clone()))?,
        };

        let metadata = self
            .metadata(coordinates, options.heading)
            .await?
            .ok_or(StreetViewError::NoImagery(coordinates))?;

        let mut request = self
            .client
            .get(&self.config.image_url)
            .query(&[
                ("location", coordinates.to_string()),
                ("size", options.size.clone()),
                ("fov", options.fov.to_string()),
                ("pitch", options.pitch.to_string()),
                ("key", key.to_string()),
            ]);
        if let Some(heading) = options.heading {
            request = request.query(&[("heading", heading)]);
        }

        let response = request.send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("image/") {
            warn!("Street view returned '{content_type}' for {coordinates}");
            return Err(StreetViewError::NotAnImage { content_type });
        }

        let bytes = response.bytes().await?.to_vec();
        info!("Fetched {} byte street view image at {coordinates}", bytes.len());

        Ok(StreetViewImage {
            coordinates,
            metadata,
            content_type,
            bytes,
        })
    }
}
