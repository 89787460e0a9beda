use media_cache::{CacheConfig, CacheSettings, Priority};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Proxy configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub port: u16,
    pub cache_dir: PathBuf,
    pub namespace: String,
    pub max_cache_size_mb: u64,
    pub max_age: Duration,
    pub sweep_interval: Duration,
    pub default_priority: Priority,
    /// Lowercase host names the proxy may fetch media from
    pub allowed_origins: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            cache_dir: PathBuf::from("./cache/media"),
            namespace: "media-cache-v1".to_string(),
            max_cache_size_mb: 500,
            max_age: Duration::from_secs(7 * 24 * 60 * 60), // 7 days
            sweep_interval: Duration::from_secs(60 * 60),   // 1 hour
            default_priority: Priority::Medium,
            allowed_origins: vec!["image.tmdb.org".to_string()],
        }
    }
}

impl ProxyConfig {
    /// Parse configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = lookup("PORT")
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let cache_dir = lookup("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.cache_dir);

        let namespace = lookup("CACHE_NAMESPACE")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.namespace);

        let max_cache_size_mb = lookup("MAX_CACHE_SIZE_MB")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(defaults.max_cache_size_mb);

        let max_age = lookup("CACHE_MAX_AGE_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.max_age);

        let sweep_interval = lookup("EXPIRY_SWEEP_INTERVAL_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.sweep_interval);

        let default_priority = lookup("DEFAULT_PRIORITY")
            .and_then(|s| s.parse::<Priority>().ok())
            .unwrap_or(defaults.default_priority);

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|host| host.trim().to_ascii_lowercase())
                    .filter(|host| !host.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|hosts| !hosts.is_empty())
            .unwrap_or(defaults.allowed_origins);

        Self {
            port,
            cache_dir,
            namespace,
            max_cache_size_mb,
            max_age,
            sweep_interval,
            default_priority,
            allowed_origins,
        }
    }

    /// Whether media may be fetched from `url`'s host
    pub fn allows_origin(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| self.allowed_origins.iter().any(|allowed| allowed == host))
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            cache_dir: self.cache_dir.clone(),
            namespace: self.namespace.clone(),
        }
    }

    /// Write policy for a request, using the configured priority unless one is given
    pub fn cache_config(&self, priority: Option<Priority>) -> CacheConfig {
        CacheConfig::new(
            self.max_cache_size_mb,
            self.max_age,
            priority.unwrap_or(self.default_priority),
        )
    }
}
