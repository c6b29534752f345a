//! Doorstep proximity engine.
//!
//! Turns a service provider's free-text location into a displayable distance
//! from the caller, via a cached, rate-limited Nominatim geocoder and
//! great-circle math. Distance display is best-effort: when location lookup
//! or geocoding fails past the retry budget, the answer is simply `None`.

pub mod config;
pub mod defaults;
pub mod services;
pub mod types;

pub use services::geocoding::{GeocodeClient, Geocoder, MockGeocoder};
pub use services::proximity::{ProximityConfig, ProximityEstimator, ProximityObserver};
pub use types::Coordinates;
