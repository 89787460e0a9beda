//! CinemaxStream Media Cache Proxy
//!
//! Hosts one media cache for the front-end: serves cached posters and
//! backdrops, fetches and caches them from their origin on a miss, and runs
//! the periodic expiry sweep.

mod config;
mod error;
mod fetcher;
mod server;
mod types;

use crate::config::ProxyConfig;
use crate::error::Result;
use crate::fetcher::OriginFetcher;
use crate::server::{start_server, ServerState, SharedState};
use media_cache::MediaCacheManager;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("media_cache_proxy=info".parse()?)
        .add_directive("media_cache=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting CinemaxStream Media Cache Proxy...");

    let config = ProxyConfig::from_env();
    info!("Port: {}", config.port);
    info!("Cache dir: {:?}", config.cache_dir);
    info!("Cache namespace: {}", config.namespace);
    info!("Max cache size: {} MB", config.max_cache_size_mb);
    info!("Cache max age: {} seconds", config.max_age.as_secs());
    info!("Allowed origins: {}", config.allowed_origins.join(", "));

    let cache = MediaCacheManager::open(config.cache_settings());
    if !cache.ready().await {
        warn!("Media cache storage unavailable, serving without caching");
    }

    // The library never sweeps on its own; expiry is scheduled here
    let sweep_cache = cache.clone();
    let max_age = config.max_age;
    let sweep_interval = config.sweep_interval;
    tokio::spawn(async move {
        let mut ticker = interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = sweep_cache.clear_expired_media(max_age).await;
            if removed > 0 {
                info!(removed, "Expiry sweep finished");
            }
        }
    });

    let port = config.port;
    let state: SharedState = Arc::new(ServerState::new(cache, OriginFetcher::new(), config));

    // Start HTTP server (blocking)
    start_server(state, port).await?;

    Ok(())
}
