//! Reverse geocoding of delivery coordinates to a searchable address.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::ScraperError;

/// Returned whenever an address cannot be resolved.
pub const UNKNOWN_LOCATION: &str = "Unknown location";

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Resolves coordinates to a human-readable address. Never fails; any
    /// error degrades to [`UNKNOWN_LOCATION`].
    async fn resolve(&self, lat: f64, lng: f64) -> String;
}

/// Client for a Nominatim-compatible `/reverse` endpoint.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

impl NominatimGeocoder {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(base_url: &str, user_agent: &str, timeout_secs: u64) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn lookup(&self, lat: f64, lng: f64) -> Result<Option<String>, ScraperError> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", lat.to_string()),
                ("lon", lng.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let parsed: ReverseResponse =
            serde_json::from_str(&body).map_err(|e| ScraperError::Json {
                context: format!("reverse geocode of {lat}, {lng}"),
                source: e,
            })?;
        Ok(parsed.display_name.filter(|s| !s.trim().is_empty()))
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn resolve(&self, lat: f64, lng: f64) -> String {
        match self.lookup(lat, lng).await {
            Ok(Some(address)) => address,
            Ok(None) => {
                tracing::warn!(lat, lng, "geocoder returned no address");
                UNKNOWN_LOCATION.to_string()
            }
            Err(e) => {
                tracing::warn!(lat, lng, error = %e, "reverse geocoding failed");
                UNKNOWN_LOCATION.to_string()
            }
        }
    }
}

/// The search text typed into the storefront's location picker: the first
/// comma-separated component of the address.
#[must_use]
pub fn search_query(address: &str) -> &str {
    address.split(',').next().unwrap_or(address).trim()
}
