//! doorstep-geo - distance estimates for Doorstep provider listings
//!
//! Resolves each provider location through Nominatim and prints how far it
//! is from the caller's position.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use doorstep_geo::config::Config;
use doorstep_geo::defaults;
use doorstep_geo::services::cancellation::CancellationRegistry;
use doorstep_geo::services::geocoding::GeocodeClient;
use doorstep_geo::services::locator::FixedLocator;
use doorstep_geo::services::nominatim::NominatimClient;
use doorstep_geo::services::proximity::{ProximityConfig, ProximityEstimator};
use doorstep_geo::services::rate_limiter::BackoffLimiter;
use doorstep_geo::types::Coordinates;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,doorstep_geo=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = cli::Cli::parse();

    let config = Config::from_env()?;
    info!("Configuration loaded");

    let position = match (args.lat, args.lng) {
        (Some(lat), Some(lng)) => Coordinates::checked(lat, lng)
            .ok_or_else(|| anyhow::anyhow!("--lat/--lng out of range"))?,
        (None, None) => {
            debug!("no position supplied, using the default city center");
            defaults::default_center()
        }
        _ => anyhow::bail!("--lat and --lng must be given together"),
    };

    let limiter = Arc::new(BackoffLimiter::new(
        Duration::from_millis(config.min_delay_ms),
        Duration::from_millis(config.max_delay_ms),
    ));
    let backend = Arc::new(NominatimClient::new(&config.nominatim_url));
    let geocoder = Arc::new(GeocodeClient::new(
        backend,
        limiter,
        Duration::from_secs(config.cache_ttl_secs),
    ));

    let estimator = ProximityEstimator::new(
        Arc::new(FixedLocator::new(position)),
        geocoder.clone(),
        ProximityConfig {
            max_attempts: config.max_attempts,
            location_timeout: Duration::from_secs(config.location_timeout_secs),
        },
    );

    // One cancellation token per requested location; ctrl-c tears them all down.
    let registry = CancellationRegistry::default();
    let guards: Vec<_> = args
        .locations
        .iter()
        .map(|_| registry.register(Uuid::new_v4()))
        .collect();
    {
        let registry = registry.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, cancelling pending estimates");
                registry.cancel_all();
            }
        });
    }

    let estimates = futures::future::join_all(args.locations.iter().zip(&guards).map(
        |(location, guard)| {
            let token = guard.token();
            let estimator = &estimator;
            async move { estimator.estimate_cancellable(location, &token).await }
        },
    ))
    .await;

    for (location, distance) in args.locations.iter().zip(estimates) {
        match distance {
            Some(distance) => println!("{location}: {distance} away"),
            None => println!("{location}: distance unavailable"),
        }
    }

    if args.places {
        for location in &args.locations {
            // Display names are not cached, so this re-queries Nominatim.
            if let Ok(Some(place)) = geocoder.locate_place(location).await {
                println!("{location}: {}", place.display_name);
            }
        }
    }

    Ok(())
}
