//! Adaptive rate limiter for the geocoding client.
//!
//! One `BackoffLimiter` is shared by every estimator in the process: it
//! spaces requests `current_delay` apart, doubles that delay when a request
//! fails (capped at the configured maximum) and snaps back to the minimum on
//! success. The limiter only tracks timing — callers report outcomes via
//! `record_success` / `record_failure`.
//!
//! State is in-memory and resets on process restart.
//! It is safe to share via `Arc<BackoffLimiter>` across async tasks.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct LimiterState {
    last_call: Option<Instant>,
    current_delay: Duration,
}

/// Shared adaptive-delay limiter.
/// Invariant: `current_delay` stays within `[min_delay, max_delay]`.
pub struct BackoffLimiter {
    state: Mutex<LimiterState>,
    min_delay: Duration,
    max_delay: Duration,
}

impl BackoffLimiter {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                last_call: None,
                current_delay: min_delay,
            }),
            min_delay,
            max_delay,
        }
    }

    /// Sleep until the next request is allowed, then stamp the call time.
    /// The lock is released while sleeping.
    pub async fn wait(&self) {
        let wait = {
            let state = self.state.lock();
            match state.last_call {
                Some(last) => state.current_delay.saturating_sub(last.elapsed()),
                None => Duration::ZERO,
            }
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        self.state.lock().last_call = Some(Instant::now());
    }

    /// A request succeeded — snap the delay back to the minimum.
    pub fn record_success(&self) {
        self.state.lock().current_delay = self.min_delay;
    }

    /// A request failed — double the delay, capped at the maximum.
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        state.current_delay = (state.current_delay * 2).min(self.max_delay);
    }

    /// The delay a caller should observe before retrying a failed operation.
    pub fn current_delay(&self) -> Duration {
        self.state.lock().current_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> BackoffLimiter {
        BackoffLimiter::new(Duration::from_millis(10), Duration::from_millis(40))
    }

    #[test]
    fn starts_at_minimum_delay() {
        let l = limiter();
        assert_eq!(l.current_delay(), Duration::from_millis(10));
    }

    #[test]
    fn failure_doubles_delay() {
        let l = limiter();
        l.record_failure();
        assert_eq!(l.current_delay(), Duration::from_millis(20));
        l.record_failure();
        assert_eq!(l.current_delay(), Duration::from_millis(40));
    }

    #[test]
    fn delay_is_capped_at_maximum() {
        let l = limiter();
        for _ in 0..5 {
            l.record_failure();
        }
        assert_eq!(l.current_delay(), Duration::from_millis(40));
    }

    #[test]
    fn success_resets_to_minimum() {
        let l = limiter();
        l.record_failure();
        l.record_failure();
        l.record_success();
        assert_eq!(l.current_delay(), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn first_call_is_immediate() {
        let l = BackoffLimiter::new(Duration::from_millis(100), Duration::from_millis(500));

        let start = Instant::now();
        l.wait().await;
        assert!(start.elapsed() < Duration::from_millis(50), "first call should not wait");
    }

    #[tokio::test]
    async fn second_call_waits_out_the_delay() {
        let l = BackoffLimiter::new(Duration::from_millis(100), Duration::from_millis(500));

        let start = Instant::now();
        l.wait().await;
        l.wait().await;
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(100),
            "second call should wait at least 100ms, took {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn call_after_interval_is_immediate() {
        let l = BackoffLimiter::new(Duration::from_millis(50), Duration::from_millis(200));

        l.wait().await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let start = Instant::now();
        l.wait().await;
        assert!(
            start.elapsed() < Duration::from_millis(20),
            "call after the interval should be immediate"
        );
    }
}
