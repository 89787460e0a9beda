//! Request and response types for the proxy endpoints

use media_cache::{CacheStats, Priority};
use serde::{Deserialize, Serialize};

/// Query string for `/media`
#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    /// Source URL, used as the cache key
    pub url: String,
    pub priority: Option<Priority>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cache_ready: bool,
    pub cache: CacheStats,
}

/// Result of an expiry sweep
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct ExpireResponse {
    pub removed: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
