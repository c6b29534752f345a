use std::time::Duration;

use crate::types::Coordinates;

/// Minimum spacing between geocoding requests (Nominatim allows ~1 req/s)
pub const MIN_GEOCODE_DELAY: Duration = Duration::from_millis(1000);

/// Backoff ceiling for geocoding requests
pub const MAX_GEOCODE_DELAY: Duration = Duration::from_millis(5000);

/// Total attempts per distance estimate before giving up
pub const MAX_ESTIMATE_ATTEMPTS: u32 = 3;

/// Timeout for the live-location lookup
pub const LOCATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Geocode cache entry lifetime (zero disables expiry)
pub const GEOCODE_CACHE_TTL: Duration = Duration::from_secs(1800);

/// Fallback position when the caller supplies none (Delhi city center).
pub fn default_center() -> Coordinates {
    Coordinates::new(28.6139, 77.2090)
}
