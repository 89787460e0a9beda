//! Cache types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Caller-assigned retention preference.
///
/// Ordered `Low < Medium < High`; lower ranks are evicted first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Metadata for a cached media entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryMetadata {
    /// Cache key, typically the source URL
    pub id: String,
    /// Milliseconds since the Unix epoch when the entry was stored
    pub timestamp_created: i64,
    pub size_bytes: u64,
    pub mime_type: String,
    pub priority: Priority,
    /// Milliseconds since the Unix epoch of the last successful read
    pub last_accessed: i64,
}

/// A binary payload together with its content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl MediaBlob {
    pub fn new(data: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Per-write cache policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Quota for this logical cache in bytes
    pub max_size_bytes: u64,
    /// Age after which the expiry sweep removes an entry; not enforced on write
    pub max_age: Duration,
    pub priority: Priority,
}

impl CacheConfig {
    /// Build a config from a quota expressed in megabytes
    pub fn new(max_size_mb: u64, max_age: Duration, priority: Priority) -> Self {
        Self {
            max_size_bytes: max_size_mb.saturating_mul(BYTES_PER_MB),
            max_age,
            priority,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Statistics about the cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: u64,
    pub hits: u64,
    pub misses: u64,
}
