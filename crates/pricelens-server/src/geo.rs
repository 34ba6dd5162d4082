//! IP geolocation collaborator.
//!
//! Resolves a client IP to a [`LocationContext`] through an ip-api.com-style
//! endpoint. Strictly best-effort: any failure resolves to `None` and the
//! search proceeds without location-aware tax.

use std::time::Duration;

use serde::Deserialize;

use pricelens_core::LocationContext;
use pricelens_scraper::FetchError;

pub struct GeoResolver {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: Option<String>,
    country: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    /// Region code, e.g. `"TX"`.
    region: Option<String>,
    city: Option<String>,
    zip: Option<String>,
}

impl GeoResolver {
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolves `ip` to a location, or `None` when the provider is
    /// unavailable, answers with an error status, or the IP is unknown.
    pub async fn resolve(&self, ip: &str) -> Option<LocationContext> {
        let url = format!("{}/json/{ip}", self.base_url);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(ip, error = %e, "geolocation lookup failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(ip, status = %response.status(), "geolocation lookup rejected");
            return None;
        }

        let payload: IpApiResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(ip, error = %e, "geolocation payload did not parse");
                return None;
            }
        };

        let succeeded = payload.status.as_deref() == Some("success")
            || payload.country.is_some();
        if !succeeded {
            return None;
        }

        Some(LocationContext {
            country: payload.country,
            region: payload.region_name,
            state: payload.region,
            city: payload.city,
            zip: payload.zip,
        })
    }
}
