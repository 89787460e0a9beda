//! Quota-bounded media blob cache
//!
//! Stores binary media (posters, backdrops, short clips) in a durable
//! namespaced blob store, tracks per-item metadata in SQLite, and evicts
//! low-priority / oldest items to stay under a caller-supplied quota.
//!
//! Every public operation on [`MediaCacheManager`] contains its own failures:
//! writes report `false`, reads report `None`. A cache miss is always safe.

pub mod blob_store;
pub mod clock;
pub mod error;
pub mod eviction;
pub mod manager;
pub mod memory;
pub mod metadata;
pub mod types;

pub use blob_store::{BlobStore, FileBlobStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CacheError, Result};
pub use eviction::{plan_eviction, plan_expiry, EvictionPlan};
pub use manager::{CacheSettings, MediaCacheManager};
pub use memory::{MemoryBlobStore, MemoryMetadataStore};
pub use metadata::{MetadataStore, SqliteMetadataStore};
pub use types::{CacheConfig, CacheEntryMetadata, CacheStats, MediaBlob, Priority};
