//! Proximity estimation for provider cards.
//!
//! Translates a provider's free-text location into a displayable distance
//! from the caller ("350m", "4.2km"). Distance is a best-effort enrichment:
//! every failure path ends in `None`, never a user-facing error. Failures are
//! still logged and reported to the optional `ProximityObserver` so operators
//! can spot a persistently broken geocoder.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::defaults;
use crate::services::geo::{format_distance, haversine_distance};
use crate::services::geocoding::Geocoder;
use crate::services::locator::{LocateError, Locator};
use crate::services::nominatim::GeocodeError;

/// A single failed estimate attempt.
#[derive(Debug, Error)]
pub enum EstimateError {
    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),
}

/// Hook for operators: invoked on every failed attempt and on final give-up.
pub trait ProximityObserver: Send + Sync {
    fn attempt_failed(&self, _location: &str, _attempt: u32, _error: &EstimateError) {}
    fn gave_up(&self, _location: &str, _attempts: u32) {}
}

/// Estimator tuning.
#[derive(Debug, Clone)]
pub struct ProximityConfig {
    /// Total attempts before giving up
    pub max_attempts: u32,
    /// Timeout for the live-location lookup
    pub location_timeout: Duration,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::MAX_ESTIMATE_ATTEMPTS,
            location_timeout: defaults::LOCATION_TIMEOUT,
        }
    }
}

/// Distance estimator for one or more provider cards.
///
/// Instances are cheap; concurrent estimators are expected to share the same
/// `Geocoder` (and through it the cache and limiter).
pub struct ProximityEstimator {
    locator: Arc<dyn Locator>,
    geocoder: Arc<dyn Geocoder>,
    config: ProximityConfig,
    observer: Option<Arc<dyn ProximityObserver>>,
}

impl ProximityEstimator {
    pub fn new(
        locator: Arc<dyn Locator>,
        geocoder: Arc<dyn Geocoder>,
        config: ProximityConfig,
    ) -> Self {
        Self {
            locator,
            geocoder,
            config,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProximityObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Formatted distance to `provider_location`, or `None` when it cannot
    /// be determined.
    pub async fn estimate(&self, provider_location: &str) -> Option<String> {
        self.estimate_km(provider_location).await.map(format_distance)
    }

    /// Distance in kilometers, after the full retry/backoff cycle.
    pub async fn estimate_km(&self, provider_location: &str) -> Option<f64> {
        for attempt in 0..self.config.max_attempts {
            match self.attempt(provider_location, attempt).await {
                Ok(Some(km)) => return Some(km),
                Ok(None) => {
                    // No such place — retrying cannot help.
                    debug!(location = provider_location, "geocoder found no match");
                    return None;
                }
                Err(error) => {
                    warn!(
                        location = provider_location,
                        attempt,
                        %error,
                        "distance estimate attempt failed"
                    );
                    if let Some(observer) = &self.observer {
                        observer.attempt_failed(provider_location, attempt, &error);
                    }
                    if attempt + 1 < self.config.max_attempts {
                        tokio::time::sleep(self.geocoder.backoff_delay()).await;
                    }
                }
            }
        }

        warn!(
            location = provider_location,
            attempts = self.config.max_attempts,
            "giving up on distance estimate"
        );
        if let Some(observer) = &self.observer {
            observer.gave_up(provider_location, self.config.max_attempts);
        }
        None
    }

    /// Cancellable variant for consumers that may be torn down mid-flight.
    /// When the token fires, the pending attempt (including its retry timer)
    /// is dropped before it can touch the cache or limiter again.
    pub async fn estimate_cancellable(
        &self,
        provider_location: &str,
        cancel: &CancellationToken,
    ) -> Option<String> {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(location = provider_location, "estimate cancelled");
                None
            }
            distance = self.estimate(provider_location) => distance,
        }
    }

    /// Estimate several provider locations concurrently. All tasks share the
    /// same limiter and cache, so requests still space themselves out.
    pub async fn estimate_many(&self, provider_locations: &[String]) -> Vec<Option<String>> {
        futures::future::join_all(
            provider_locations
                .iter()
                .map(|location| self.estimate(location)),
        )
        .await
    }

    async fn attempt(
        &self,
        provider_location: &str,
        attempt: u32,
    ) -> Result<Option<f64>, EstimateError> {
        let here = match tokio::time::timeout(
            self.config.location_timeout,
            self.locator.current_position(),
        )
        .await
        {
            Ok(position) => position?,
            Err(_) => return Err(LocateError::Timeout(self.config.location_timeout).into()),
        };

        // Retries bypass the cache so a stale entry cannot resolve again.
        let there = if attempt == 0 {
            self.geocoder.resolve(provider_location).await?
        } else {
            self.geocoder.resolve_fresh(provider_location).await?
        };

        Ok(there.map(|coords| haversine_distance(&here, &coords)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::services::geocoding::MockGeocoder;
    use crate::services::locator::FixedLocator;
    use crate::types::Coordinates;

    fn delhi() -> Coordinates {
        Coordinates::new(28.6139, 77.2090)
    }

    fn fast_config() -> ProximityConfig {
        ProximityConfig {
            max_attempts: 3,
            location_timeout: Duration::from_millis(100),
        }
    }

    // ── test doubles ─────────────────────────────────────────────────────

    struct DenyingLocator;

    #[async_trait]
    impl Locator for DenyingLocator {
        async fn current_position(&self) -> Result<Coordinates, LocateError> {
            Err(LocateError::Denied)
        }
    }

    struct SlowLocator(Duration);

    #[async_trait]
    impl Locator for SlowLocator {
        async fn current_position(&self) -> Result<Coordinates, LocateError> {
            tokio::time::sleep(self.0).await;
            Ok(delhi())
        }
    }

    enum Outcome {
        Found(Coordinates),
        Empty,
        Fail,
    }

    /// Geocoder that replays a script and counts cached vs fresh calls.
    struct ScriptedGeocoder {
        script: Mutex<VecDeque<Outcome>>,
        resolve_calls: AtomicU32,
        fresh_calls: AtomicU32,
        retry_delay: Duration,
    }

    impl ScriptedGeocoder {
        fn new(script: Vec<Outcome>) -> Arc<Self> {
            Self::with_retry_delay(script, Duration::ZERO)
        }

        fn with_retry_delay(script: Vec<Outcome>, retry_delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                resolve_calls: AtomicU32::new(0),
                fresh_calls: AtomicU32::new(0),
                retry_delay,
            })
        }

        fn total_calls(&self) -> u32 {
            self.resolve_calls.load(Ordering::SeqCst) + self.fresh_calls.load(Ordering::SeqCst)
        }

        fn next(&self) -> Result<Option<Coordinates>, GeocodeError> {
            match self.script.lock().pop_front() {
                Some(Outcome::Found(coords)) => Ok(Some(coords)),
                Some(Outcome::Empty) => Ok(None),
                Some(Outcome::Fail) | None => {
                    Err(GeocodeError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE))
                }
            }
        }
    }

    #[async_trait]
    impl Geocoder for ScriptedGeocoder {
        async fn resolve(&self, _query: &str) -> Result<Option<Coordinates>, GeocodeError> {
            self.resolve_calls.fetch_add(1, Ordering::SeqCst);
            self.next()
        }

        async fn resolve_fresh(&self, _query: &str) -> Result<Option<Coordinates>, GeocodeError> {
            self.fresh_calls.fetch_add(1, Ordering::SeqCst);
            self.next()
        }

        fn backoff_delay(&self) -> Duration {
            self.retry_delay
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        failed: AtomicU32,
        gave_up: AtomicU32,
    }

    impl ProximityObserver for CountingObserver {
        fn attempt_failed(&self, _location: &str, _attempt: u32, _error: &EstimateError) {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        fn gave_up(&self, _location: &str, _attempts: u32) {
            self.gave_up.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn estimator(
        locator: Arc<dyn Locator>,
        geocoder: Arc<dyn Geocoder>,
    ) -> ProximityEstimator {
        ProximityEstimator::new(locator, geocoder, fast_config())
    }

    // ── tests ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn estimate_formats_a_distance() {
        let geocoder =
            ScriptedGeocoder::new(vec![Outcome::Found(Coordinates::new(28.5700, 77.3200))]);
        let est = estimator(Arc::new(FixedLocator::new(delhi())), geocoder);

        let distance = est.estimate("Sector 18, Noida").await.unwrap();
        assert!(distance.ends_with("km"), "got {distance}");
    }

    #[tokio::test]
    async fn nearby_provider_is_shown_in_meters() {
        let geocoder =
            ScriptedGeocoder::new(vec![Outcome::Found(Coordinates::new(28.6145, 77.2095))]);
        let est = estimator(Arc::new(FixedLocator::new(delhi())), geocoder);

        let distance = est.estimate("Connaught Place").await.unwrap();
        assert!(distance.ends_with('m') && !distance.ends_with("km"), "got {distance}");
    }

    #[tokio::test]
    async fn location_denied_exhausts_attempts_silently() {
        let geocoder = ScriptedGeocoder::new(vec![]);
        let observer = Arc::new(CountingObserver::default());
        let est = estimator(Arc::new(DenyingLocator), geocoder.clone())
            .with_observer(observer.clone());

        assert!(est.estimate("Sector 18, Noida").await.is_none());

        assert_eq!(observer.failed.load(Ordering::SeqCst), 3);
        assert_eq!(observer.gave_up.load(Ordering::SeqCst), 1);
        assert_eq!(geocoder.total_calls(), 0, "never geocode without a position");
    }

    #[tokio::test]
    async fn location_timeout_counts_as_failed_attempt() {
        let geocoder = ScriptedGeocoder::new(vec![]);
        let observer = Arc::new(CountingObserver::default());
        let est = ProximityEstimator::new(
            Arc::new(SlowLocator(Duration::from_millis(80))),
            geocoder,
            ProximityConfig {
                max_attempts: 1,
                location_timeout: Duration::from_millis(10),
            },
        )
        .with_observer(observer.clone());

        assert!(est.estimate("Sector 18, Noida").await.is_none());
        assert_eq!(observer.failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_geocode_result_is_terminal() {
        let geocoder = ScriptedGeocoder::new(vec![Outcome::Empty]);
        let observer = Arc::new(CountingObserver::default());
        let est = estimator(Arc::new(FixedLocator::new(delhi())), geocoder.clone())
            .with_observer(observer.clone());

        assert!(est.estimate("Atlantis").await.is_none());

        assert_eq!(geocoder.total_calls(), 1, "an unknown place must not be retried");
        assert_eq!(observer.failed.load(Ordering::SeqCst), 0);
        assert_eq!(observer.gave_up.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retry_after_failure_bypasses_cache() {
        let geocoder = ScriptedGeocoder::new(vec![
            Outcome::Fail,
            Outcome::Found(Coordinates::new(28.5700, 77.3200)),
        ]);
        let est = estimator(Arc::new(FixedLocator::new(delhi())), geocoder.clone());

        assert!(est.estimate("Sector 18, Noida").await.is_some());

        assert_eq!(geocoder.resolve_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            geocoder.fresh_calls.load(Ordering::SeqCst),
            1,
            "the retry must re-resolve instead of trusting the cache"
        );
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let geocoder = ScriptedGeocoder::new(vec![
            Outcome::Fail,
            Outcome::Fail,
            Outcome::Fail,
            Outcome::Found(Coordinates::new(28.5700, 77.3200)),
        ]);
        let observer = Arc::new(CountingObserver::default());
        let est = estimator(Arc::new(FixedLocator::new(delhi())), geocoder.clone())
            .with_observer(observer.clone());

        assert!(est.estimate("Sector 18, Noida").await.is_none());

        assert_eq!(geocoder.total_calls(), 3, "exactly max_attempts geocode calls");
        assert_eq!(observer.failed.load(Ordering::SeqCst), 3);
        assert_eq!(observer.gave_up.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelling_mid_retry_stops_pending_work() {
        // First attempt fails, the retry sits behind a 200ms backoff sleep;
        // cancelling during that sleep must drop the retry entirely.
        let geocoder = ScriptedGeocoder::with_retry_delay(
            vec![Outcome::Fail, Outcome::Found(Coordinates::new(28.5700, 77.3200))],
            Duration::from_millis(200),
        );
        let est = estimator(Arc::new(FixedLocator::new(delhi())), geocoder.clone());

        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        assert!(est.estimate_cancellable("Sector 18, Noida", &token).await.is_none());
        assert_eq!(
            geocoder.total_calls(),
            1,
            "the retry scheduled behind the backoff sleep must never run"
        );
    }

    #[tokio::test]
    async fn cancellation_before_first_attempt_resolves_nothing() {
        let geocoder = ScriptedGeocoder::new(vec![Outcome::Found(delhi())]);
        let est = ProximityEstimator::new(
            Arc::new(SlowLocator(Duration::from_millis(200))),
            geocoder.clone(),
            fast_config(),
        );

        let token = CancellationToken::new();
        token.cancel();

        assert!(est.estimate_cancellable("Sector 18, Noida", &token).await.is_none());
        assert_eq!(geocoder.total_calls(), 0);
    }

    #[tokio::test]
    async fn estimate_many_resolves_each_card() {
        let est = estimator(
            Arc::new(FixedLocator::new(delhi())),
            Arc::new(MockGeocoder::new()),
        );

        let locations = vec![
            "Karol Bagh".to_string(),
            "Saket".to_string(),
            "Sector 18, Noida".to_string(),
        ];
        let distances = est.estimate_many(&locations).await;

        assert_eq!(distances.len(), 3);
        assert!(distances.iter().all(|d| d.is_some()));
    }
}
