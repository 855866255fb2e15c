//! Free-text location resolution against a Nominatim-compatible service.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::Settings,
    error::{SearchError, SearchResult},
    search::geo::Coordinate,
};

/// One geocoding candidate for a free-text query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

impl ResolvedLocation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Resolves free text to zero or more coordinate candidates.
///
/// An empty candidate list is a semantic outcome, not a failure; callers turn
/// it into [`SearchError::LocationNotFound`]. Transport problems are retried
/// here and surface as [`SearchError::Unavailable`] once retries run out.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, free_text: &str) -> SearchResult<Vec<ResolvedLocation>>;
}

/// Nominatim `/search` client restricted to the configured country codes.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    countries: String,
    retry_attempts: u32,
    retry_backoff: Duration,
}

impl NominatimGeocoder {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        // Nominatim usage policy asks for an identifiable agent with contact.
        let client = Client::builder()
            .user_agent(format!("trial-scout/0.1 (+{})", settings.geocoder_email))
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.geocoder_url.trim_end_matches('/').to_string(),
            countries: settings.geocoder_countries.clone(),
            retry_attempts: settings.retry_attempts,
            retry_backoff: Duration::from_millis(settings.retry_backoff_ms),
        })
    }

    async fn request(&self, free_text: &str) -> Result<Vec<ResolvedLocation>> {
        let url = format!(
            "{base}/search?q={q}&format=jsonv2&limit=5&countrycodes={cc}",
            base = self.base_url,
            q = urlencoding::encode(free_text),
            cc = self.countries,
        );
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("geocoder returned {status}"));
        }
        let places: Vec<NominatimPlace> = resp.json().await.context("decode geocoder response")?;
        let mut out = Vec::new();
        for place in places {
            match (place.lat.parse::<f64>(), place.lon.parse::<f64>()) {
                (Ok(latitude), Ok(longitude)) => out.push(ResolvedLocation {
                    latitude,
                    longitude,
                    display_name: place.display_name,
                }),
                _ => warn!(name = %place.display_name, "skipping unparsable coordinates"),
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn resolve(&self, free_text: &str) -> SearchResult<Vec<ResolvedLocation>> {
        let mut last_err = None;
        for attempt in 1..=self.retry_attempts {
            match self.request(free_text).await {
                Ok(candidates) => {
                    debug!(count = candidates.len(), %free_text, "geocoded location");
                    return Ok(candidates);
                }
                Err(err) => {
                    warn!(attempt, %err, "geocoding attempt failed");
                    last_err = Some(err);
                    if attempt < self.retry_attempts {
                        sleep(self.retry_backoff * attempt).await;
                    }
                }
            }
        }
        Err(SearchError::Unavailable {
            service: "geocoder",
            attempts: self.retry_attempts,
            source: last_err.unwrap_or_else(|| anyhow!("no attempt recorded")),
        })
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}
