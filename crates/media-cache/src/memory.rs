//! In-memory stores
//!
//! Used when no writable disk is available and in tests. Contents are lost
//! when the process exits.

use crate::blob_store::BlobStore;
use crate::error::Result;
use crate::metadata::MetadataStore;
use crate::types::{CacheEntryMetadata, MediaBlob};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, MediaBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, blob: &MediaBlob) -> Result<()> {
        self.blobs
            .write()
            .await
            .insert(key.to_string(), blob.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<MediaBlob>> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.blobs.write().await.remove(key).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.blobs.write().await.clear();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    entries: RwLock<HashMap<String, CacheEntryMetadata>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn all(&self) -> Result<Vec<CacheEntryMetadata>> {
        Ok(self.entries.read().await.values().cloned().collect())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntryMetadata>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, entry: &CacheEntryMetadata) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn touch(&self, key: &str, now_ms: i64) -> Result<bool> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) => {
                entry.last_accessed = entry.last_accessed.max(now_ms);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    #[tokio::test]
    async fn test_blob_store_roundtrip() {
        let store = MemoryBlobStore::new();
        assert!(store.is_empty().await);

        store
            .put("k", &MediaBlob::new(b"abc".to_vec(), "image/gif"))
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("k").await.unwrap().unwrap().data, b"abc");

        assert!(store.delete("k").await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_metadata_touch_is_monotonic() {
        let store = MemoryMetadataStore::new();
        store
            .put(&CacheEntryMetadata {
                id: "k".to_string(),
                timestamp_created: 10,
                size_bytes: 1,
                mime_type: "image/png".to_string(),
                priority: Priority::Low,
                last_accessed: 10,
            })
            .await
            .unwrap();

        assert!(store.touch("k", 40).await.unwrap());
        assert!(store.touch("k", 20).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().unwrap().last_accessed, 40);
        assert!(!store.touch("other", 40).await.unwrap());
    }
}
