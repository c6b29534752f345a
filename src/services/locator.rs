//! Host location capability.
//!
//! `Locator` abstracts "where is the caller right now" — the browser
//! geolocation API in the web client. Server-side and CLI deployments
//! inject a `FixedLocator` built from configuration or flags.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::Coordinates;

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("location permission denied")]
    Denied,

    #[error("location request timed out after {0:?}")]
    Timeout(Duration),

    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// Source of the caller's current position.
#[async_trait]
pub trait Locator: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, LocateError>;
}

/// Locator pinned to a known position.
pub struct FixedLocator {
    coords: Coordinates,
}

impl FixedLocator {
    pub fn new(coords: Coordinates) -> Self {
        Self { coords }
    }
}

#[async_trait]
impl Locator for FixedLocator {
    async fn current_position(&self) -> Result<Coordinates, LocateError> {
        Ok(self.coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_locator_returns_its_position() {
        let locator = FixedLocator::new(Coordinates::new(28.6139, 77.2090));

        let position = locator.current_position().await.unwrap();
        assert_eq!(position, Coordinates::new(28.6139, 77.2090));
    }
}
