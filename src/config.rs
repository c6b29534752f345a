//! Configuration management

use anyhow::{Context, Result};

use crate::defaults;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Nominatim API URL (for geocoding)
    pub nominatim_url: String,

    /// Minimum spacing between geocoding requests, milliseconds
    pub min_delay_ms: u64,

    /// Backoff ceiling for geocoding requests, milliseconds
    pub max_delay_ms: u64,

    /// Total attempts per distance estimate
    pub max_attempts: u32,

    /// Timeout for the live-location lookup, seconds
    pub location_timeout_secs: u64,

    /// Geocode cache TTL, seconds (0 = entries never expire)
    pub cache_ttl_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nominatim_url = std::env::var("NOMINATIM_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string());

        let min_delay_ms = env_or("GEOCODE_MIN_DELAY_MS", defaults::MIN_GEOCODE_DELAY.as_millis() as u64)?;
        let max_delay_ms = env_or("GEOCODE_MAX_DELAY_MS", defaults::MAX_GEOCODE_DELAY.as_millis() as u64)?;
        let max_attempts = env_or("GEOCODE_MAX_ATTEMPTS", defaults::MAX_ESTIMATE_ATTEMPTS)?;
        let location_timeout_secs = env_or("LOCATION_TIMEOUT_SECS", defaults::LOCATION_TIMEOUT.as_secs())?;
        let cache_ttl_secs = env_or("GEOCODE_CACHE_TTL_SECS", defaults::GEOCODE_CACHE_TTL.as_secs())?;

        if min_delay_ms == 0 {
            anyhow::bail!("GEOCODE_MIN_DELAY_MS must be positive — Nominatim requires spacing requests out");
        }
        if max_delay_ms < min_delay_ms {
            anyhow::bail!(
                "GEOCODE_MAX_DELAY_MS ({}) must be >= GEOCODE_MIN_DELAY_MS ({})",
                max_delay_ms,
                min_delay_ms
            );
        }
        if max_attempts == 0 {
            anyhow::bail!("GEOCODE_MAX_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            nominatim_url,
            min_delay_ms,
            max_delay_ms,
            max_attempts,
            location_timeout_secs,
            cache_ttl_secs,
        })
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("{} must be a number, got '{}'", name, value)),
        Err(_) => Ok(default),
    }
}
