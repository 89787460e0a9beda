//! The media cache manager
//!
//! One [`MediaCacheManager`] is built at startup and cloned into whatever
//! needs it. Store initialization runs once, on first use, behind a shared
//! future that every operation awaits. If it fails the manager stays usable
//! but inert: writes return `false`, reads return `None`.

use crate::blob_store::{BlobStore, FileBlobStore};
use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, Result};
use crate::eviction::{plan_eviction, plan_expiry, EvictionPlan};
use crate::memory::{MemoryBlobStore, MemoryMetadataStore};
use crate::metadata::{MetadataStore, SqliteMetadataStore};
use crate::types::{CacheConfig, CacheEntryMetadata, CacheStats, MediaBlob};
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Where the durable stores live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub cache_dir: PathBuf,
    /// Blob/metadata generation; changing it discards everything cached under the old one
    pub namespace: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache/media"),
            namespace: "media-cache-v1".to_string(),
        }
    }
}

struct Stores {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
}

type ReadyFuture = Shared<BoxFuture<'static, Option<Arc<Stores>>>>;

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Quota-bounded, priority-aware media cache
#[derive(Clone)]
pub struct MediaCacheManager {
    ready: ReadyFuture,
    clock: Arc<dyn Clock>,
    counters: Arc<Counters>,
}

impl MediaCacheManager {
    /// Cache backed by [`FileBlobStore`] and [`SqliteMetadataStore`] under `settings.cache_dir`
    pub fn open(settings: CacheSettings) -> Self {
        Self::from_init(async move {
            let blobs =
                FileBlobStore::open(settings.cache_dir.join("blobs"), &settings.namespace).await?;
            let metadata = SqliteMetadataStore::connect(
                settings.cache_dir.join("metadata.db"),
                &settings.namespace,
            )
            .await?;
            Ok((
                Arc::new(blobs) as Arc<dyn BlobStore>,
                Arc::new(metadata) as Arc<dyn MetadataStore>,
            ))
        })
    }

    /// Cache whose stores are produced by `init`, run lazily on first use
    pub fn from_init<F>(init: F) -> Self
    where
        F: Future<Output = Result<(Arc<dyn BlobStore>, Arc<dyn MetadataStore>)>> + Send + 'static,
    {
        let ready = async move {
            match init.await {
                Ok((blobs, metadata)) => {
                    info!("Media cache initialized");
                    Some(Arc::new(Stores { blobs, metadata }))
                }
                Err(e) => {
                    error!(error = %e, "Media cache initialization failed, caching disabled");
                    None
                }
            }
        }
        .boxed()
        .shared();

        Self {
            ready,
            clock: Arc::new(SystemClock),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Cache over already-open stores
    pub fn with_stores(blobs: Arc<dyn BlobStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self::from_init(async move { Ok((blobs, metadata)) })
    }

    /// Ephemeral cache that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::with_stores(
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryMetadataStore::new()),
        )
    }

    /// Replace the time source used for entry timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Wait for initialization; `false` means the cache is running degraded
    pub async fn ready(&self) -> bool {
        self.stores().await.is_some()
    }

    async fn stores(&self) -> Option<Arc<Stores>> {
        self.ready.clone().await
    }

    /// Store `blob` under `key`, evicting other entries if needed to stay under
    /// `config.max_size_bytes`.
    ///
    /// Returns `false` on any failure; the failure is logged, never raised.
    pub async fn cache_media(&self, key: &str, blob: MediaBlob, config: &CacheConfig) -> bool {
        let Some(stores) = self.stores().await else {
            debug!(key, "Skipping cache write, storage unavailable");
            return false;
        };

        match self.try_cache_media(&stores, key, blob, config).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Failed to cache media");
                false
            }
        }
    }

    async fn try_cache_media(
        &self,
        stores: &Stores,
        key: &str,
        blob: MediaBlob,
        config: &CacheConfig,
    ) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey);
        }

        let size = blob.size();
        if size > config.max_size_bytes {
            return Err(CacheError::QuotaExceeded {
                size,
                quota: config.max_size_bytes,
            });
        }

        self.make_room(stores, key, size, config.max_size_bytes)
            .await?;

        stores.blobs.put(key, &blob).await?;

        let now = self.clock.now_millis();
        stores
            .metadata
            .put(&CacheEntryMetadata {
                id: key.to_string(),
                timestamp_created: now,
                size_bytes: size,
                mime_type: blob.mime_type,
                priority: config.priority,
                last_accessed: now,
            })
            .await?;

        debug!(key, size, priority = %config.priority, "Cached media");
        Ok(())
    }

    async fn make_room(
        &self,
        stores: &Stores,
        key: &str,
        incoming_size: u64,
        max_bytes: u64,
    ) -> Result<EvictionPlan> {
        let entries = stores.metadata.all().await?;
        let plan = plan_eviction(entries, key, incoming_size, max_bytes);
        if !plan.is_empty() {
            let removed = remove_entries(stores, &plan.evict).await;
            info!(
                planned = plan.evict.len(),
                removed,
                bytes_before = plan.bytes_before,
                bytes_after = plan.bytes_after,
                "Evicted media to stay under quota"
            );
        }
        Ok(plan)
    }

    /// Evict worst-ranked entries until the stored total fits in `max_bytes`.
    ///
    /// Runs automatically before every write; callers only need it after
    /// lowering a quota. Returns the number of entries removed.
    pub async fn enforce_storage_limits(&self, max_bytes: u64) -> usize {
        let Some(stores) = self.stores().await else {
            return 0;
        };

        match self.make_room(&stores, "", 0, max_bytes).await {
            Ok(plan) => plan.evict.len(),
            Err(e) => {
                warn!(max_bytes, error = %e, "Failed to enforce storage limits");
                0
            }
        }
    }

    /// Look up a cached blob.
    ///
    /// A key present in only one of the two stores is a miss, and the stray
    /// half is removed. Errors are logged and reported as a miss.
    pub async fn get_media(&self, key: &str) -> Option<MediaBlob> {
        let blob = match self.stores().await {
            Some(stores) if !key.is_empty() => self.lookup(&stores, key).await,
            _ => None,
        };

        let counter = if blob.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        blob
    }

    async fn lookup(&self, stores: &Stores, key: &str) -> Option<MediaBlob> {
        let blob = match stores.blobs.get(key).await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                if let Ok(true) = stores.metadata.delete(key).await {
                    debug!(key, "Removed metadata without a blob");
                }
                debug!(key, "Cache miss");
                return None;
            }
            Err(CacheError::CorruptEntry(msg)) => {
                warn!(key, error = %msg, "Corrupt cache entry, removing");
                remove_entries(stores, &[key.to_string()]).await;
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to read cached media");
                return None;
            }
        };

        match stores.metadata.touch(key, self.clock.now_millis()).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(key, "Blob without metadata, removing");
                if let Err(e) = stores.blobs.delete(key).await {
                    warn!(key, error = %e, "Failed to remove orphaned blob");
                }
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to record access, serving blob anyway");
            }
        }

        debug!(key, "Cache hit");
        Some(blob)
    }

    /// Remove every entry stored more than `max_age` ago, regardless of priority.
    ///
    /// Never runs on its own; the host decides when to sweep. Returns the
    /// number of entries removed.
    pub async fn clear_expired_media(&self, max_age: Duration) -> usize {
        let Some(stores) = self.stores().await else {
            return 0;
        };

        let entries = match stores.metadata.all().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Failed to load metadata for expiry sweep");
                return 0;
            }
        };

        let expired = plan_expiry(&entries, self.clock.now_millis(), max_age);
        if expired.is_empty() {
            return 0;
        }

        let removed = remove_entries(&stores, &expired).await;
        info!(expired = expired.len(), removed, "Cleared expired media");
        removed
    }

    /// Empty both stores
    pub async fn clear(&self) -> bool {
        let Some(stores) = self.stores().await else {
            return false;
        };

        let (blobs, metadata) = futures::join!(stores.blobs.clear(), stores.metadata.clear());
        match blobs.and(metadata) {
            Ok(()) => {
                info!("Media cache cleared");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to clear media cache");
                false
            }
        }
    }

    /// Current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            ..Default::default()
        };

        if let Some(stores) = self.stores().await {
            match stores.metadata.all().await {
                Ok(entries) => {
                    stats.entries = entries.len();
                    stats.total_size = entries.iter().map(|e| e.size_bytes).sum();
                }
                Err(e) => warn!(error = %e, "Failed to load metadata for stats"),
            }
        }

        stats
    }
}

/// Delete `keys` from both stores concurrently. A failure on one key is
/// logged and does not stop the rest. Returns how many keys were fully removed.
async fn remove_entries(stores: &Stores, keys: &[String]) -> usize {
    let removals = keys.iter().map(|key| async move {
        let (blob, metadata) = futures::join!(stores.blobs.delete(key), stores.metadata.delete(key));
        let mut ok = true;
        if let Err(e) = blob {
            warn!(key = %key, error = %e, "Failed to delete blob");
            ok = false;
        }
        if let Err(e) = metadata {
            warn!(key = %key, error = %e, "Failed to delete metadata");
            ok = false;
        }
        ok
    });

    join_all(removals).await.into_iter().filter(|ok| *ok).count()
}
