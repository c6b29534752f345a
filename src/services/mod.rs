//! Business logic services

pub mod cancellation;
pub mod geo;
pub mod geocoding;
pub mod locator;
pub mod nominatim;
pub mod proximity;
pub mod rate_limiter;
