//! Geocoding abstraction layer with caching and adaptive rate limiting.
//!
//! Layering:
//! - `GeocodeBackend` — the raw forward/reverse HTTP seam (`NominatimClient`
//!   in production, scripted fakes in tests)
//! - `Geocoder` — what the proximity estimator consumes: cached, rate-limited
//!   resolution of free-text locations
//! - `GeocodeClient` — the production `Geocoder`; owns the cache map and the
//!   shared `BackoffLimiter`, and is dependency-injected into every estimator
//! - `MockGeocoder` — deterministic, network-free `Geocoder` for tests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::services::nominatim::{GeocodeError, NominatimClient, Place};
use crate::services::rate_limiter::BackoffLimiter;
use crate::types::Coordinates;

/// Raw geocoding transport seam.
#[async_trait]
pub trait GeocodeBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<Option<Place>, GeocodeError>;
    async fn reverse(&self, coords: &Coordinates) -> Result<Option<String>, GeocodeError>;
}

#[async_trait]
impl GeocodeBackend for NominatimClient {
    async fn search(&self, query: &str) -> Result<Option<Place>, GeocodeError> {
        NominatimClient::search(self, query).await
    }

    async fn reverse(&self, coords: &Coordinates) -> Result<Option<String>, GeocodeError> {
        NominatimClient::reverse(self, coords).await
    }
}

/// Geocoder trait - abstraction for all geocoding implementations
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a free-text location, consulting the cache first.
    /// Returns `Ok(None)` if no such place exists.
    async fn resolve(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError>;

    /// Resolve bypassing the cache. Retries use this so a stale entry
    /// cannot satisfy the request again.
    async fn resolve_fresh(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError>;

    /// Delay a caller should observe before retrying after a failure.
    fn backoff_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Get the name of this geocoder implementation
    fn name(&self) -> &'static str;
}

struct CacheEntry {
    coords: Coordinates,
    stored_at: Instant,
}

/// Production geocoder: cache plus shared limiter over a `GeocodeBackend`.
///
/// Cache keys are the exact query strings (case-sensitive). Entries expire
/// `cache_ttl` after being stored; a zero TTL disables expiry.
pub struct GeocodeClient {
    backend: Arc<dyn GeocodeBackend>,
    cache: Mutex<HashMap<String, CacheEntry>>,
    limiter: Arc<BackoffLimiter>,
    cache_ttl: Duration,
}

impl GeocodeClient {
    pub fn new(
        backend: Arc<dyn GeocodeBackend>,
        limiter: Arc<BackoffLimiter>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            backend,
            cache: Mutex::new(HashMap::new()),
            limiter,
            cache_ttl,
        }
    }

    /// Cache lookup; expired entries are dropped on read.
    fn cached(&self, query: &str) -> Option<Coordinates> {
        let mut cache = self.cache.lock();
        let entry = cache.get(query)?;

        if self.cache_ttl.is_zero() || entry.stored_at.elapsed() <= self.cache_ttl {
            return Some(entry.coords);
        }

        cache.remove(query);
        None
    }

    fn store(&self, query: &str, coords: Coordinates) {
        self.cache.lock().insert(
            query.to_string(),
            CacheEntry {
                coords,
                stored_at: Instant::now(),
            },
        );
    }

    /// Rate-limited fetch with outcome bookkeeping on the shared limiter.
    async fn fetch(&self, query: &str) -> Result<Option<Place>, GeocodeError> {
        self.limiter.wait().await;

        match self.backend.search(query).await {
            Ok(Some(place)) => {
                self.limiter.record_success();
                self.store(query, place.coords);
                Ok(Some(place))
            }
            // Empty result set: nothing to cache, delay unchanged.
            Ok(None) => Ok(None),
            Err(e) => {
                self.limiter.record_failure();
                Err(e)
            }
        }
    }

    /// Forward search returning the display name as well — the
    /// location-picker flow. Coordinates are cached under the query.
    pub async fn locate_place(&self, query: &str) -> Result<Option<Place>, GeocodeError> {
        self.fetch(query).await
    }

    /// Reverse lookup for a display name. Not cached — coordinates are
    /// continuous, so keys would never repeat.
    pub async fn reverse(&self, coords: &Coordinates) -> Result<Option<String>, GeocodeError> {
        self.limiter.wait().await;

        match self.backend.reverse(coords).await {
            Ok(name) => {
                self.limiter.record_success();
                Ok(name)
            }
            Err(e) => {
                self.limiter.record_failure();
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Geocoder for GeocodeClient {
    async fn resolve(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        if let Some(coords) = self.cached(query) {
            debug!(location = query, "geocode cache hit");
            return Ok(Some(coords));
        }

        Ok(self.fetch(query).await?.map(|p| p.coords))
    }

    async fn resolve_fresh(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        Ok(self.fetch(query).await?.map(|p| p.coords))
    }

    fn backoff_delay(&self) -> Duration {
        self.limiter.current_delay()
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

// ==========================================================================
// MockGeocoder Implementation
// ==========================================================================

/// Mock geocoder for testing - returns deterministic fake coordinates
pub struct MockGeocoder;

impl MockGeocoder {
    pub fn new() -> Self {
        Self
    }

    /// Deterministic coordinates from the query hash, kept inside the
    /// Delhi NCR service area.
    fn hash_to_coordinates(query: &str) -> Coordinates {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        query.hash(&mut hasher);
        let hash = hasher.finish();

        // Delhi NCR bounds
        const LAT_MIN: f64 = 28.40;
        const LAT_MAX: f64 = 28.90;
        const LNG_MIN: f64 = 76.85;
        const LNG_MAX: f64 = 77.60;

        let lat_normalized = ((hash >> 32) as f64) / (u32::MAX as f64);
        let lng_normalized = ((hash & 0xFFFF_FFFF) as f64) / (u32::MAX as f64);

        Coordinates {
            lat: LAT_MIN + lat_normalized * (LAT_MAX - LAT_MIN),
            lng: LNG_MIN + lng_normalized * (LNG_MAX - LNG_MIN),
        }
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn resolve(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        Ok(Some(Self::hash_to_coordinates(query)))
    }

    async fn resolve_fresh(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        self.resolve(query).await
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
