//! Nominatim geocoding client

use serde::Deserialize;
use thiserror::Error;

use crate::types::Coordinates;

/// Errors from the geocoding HTTP layer.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Transport-level failure (connection, TLS, body decode)
    #[error("geocoding request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("geocoding service returned HTTP {0}")]
    Status(reqwest::StatusCode),

    /// The response parsed but its coordinates did not
    #[error("malformed geocoding response: {0}")]
    Parse(String),
}

/// Nominatim API response
#[derive(Debug, Deserialize)]
pub struct NominatimResult {
    pub lat: String,
    pub lon: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
struct NominatimReverseResult {
    // Nominatim reports unresolvable coordinates as {"error": ...}
    #[serde(default)]
    display_name: Option<String>,
}

/// A resolved place: coordinates plus the human-readable name.
#[derive(Debug, Clone)]
pub struct Place {
    pub coords: Coordinates,
    pub display_name: String,
}

/// Nominatim geocoding client
pub struct NominatimClient {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimClient {
    /// Create a new client
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Doorstep/1.0 (https://doorstep.app)")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Forward-geocode a free-text location to its best match.
    /// `Ok(None)` means Nominatim knows no such place — not an error.
    pub async fn search(&self, query: &str) -> Result<Option<Place>, GeocodeError> {
        let url = format!(
            "{}/search?format=json&q={}&limit=1",
            self.base_url,
            urlencoding::encode(query)
        );

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status()));
        }

        let results: Vec<NominatimResult> = response.json().await?;
        parse_first(results)
    }

    /// Reverse-geocode coordinates to a display name.
    pub async fn reverse(&self, coords: &Coordinates) -> Result<Option<String>, GeocodeError> {
        let url = format!(
            "{}/reverse?format=json&lat={}&lon={}",
            self.base_url, coords.lat, coords.lng
        );

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status(response.status()));
        }

        let result: NominatimReverseResult = response.json().await?;
        Ok(result.display_name)
    }
}

/// Parse the first search result, validating coordinate ranges.
fn parse_first(results: Vec<NominatimResult>) -> Result<Option<Place>, GeocodeError> {
    let Some(result) = results.into_iter().next() else {
        return Ok(None);
    };

    let lat: f64 = result
        .lat
        .parse()
        .map_err(|_| GeocodeError::Parse(format!("invalid latitude '{}'", result.lat)))?;
    let lng: f64 = result
        .lon
        .parse()
        .map_err(|_| GeocodeError::Parse(format!("invalid longitude '{}'", result.lon)))?;

    let coords = Coordinates::checked(lat, lng)
        .ok_or_else(|| GeocodeError::Parse(format!("coordinate out of range: {lat}, {lng}")))?;

    Ok(Some(Place {
        coords,
        display_name: result.display_name,
    }))
}
