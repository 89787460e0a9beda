//! Durable blob storage
//!
//! Blobs live under `<root>/<namespace>/`, one file per key, named by the
//! hex SHA-256 of the key. Each file starts with the content type on its own
//! line so a blob can be served without consulting the metadata store.

use crate::error::{CacheError, Result};
use crate::types::MediaBlob;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, info, warn};

/// Namespaced key to binary store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob, replacing any existing one under `key`
    async fn put(&self, key: &str, blob: &MediaBlob) -> Result<()>;

    /// Look up a blob; `Ok(None)` when absent
    async fn get(&self, key: &str) -> Result<Option<MediaBlob>>;

    /// Remove a blob, returning whether one existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every blob in the namespace
    async fn clear(&self) -> Result<()>;
}

/// File-backed [`BlobStore`]
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Open the `namespace` generation under `root`.
    ///
    /// Sibling namespace directories are removed: bumping the namespace
    /// string invalidates every entry written under an older one.
    pub async fn open(root: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        let root = root.as_ref();
        if namespace.is_empty() || namespace.contains(['/', '\\']) || namespace.starts_with('.') {
            return Err(CacheError::InvalidNamespace(namespace.to_string()));
        }

        let dir = root.join(namespace);
        fs::create_dir_all(&dir).await?;

        let mut siblings = fs::read_dir(root).await?;
        while let Some(sibling) = siblings.next_entry().await? {
            if sibling.file_name() == namespace || !sibling.file_type().await?.is_dir() {
                continue;
            }
            match fs::remove_dir_all(sibling.path()).await {
                Ok(()) => info!(path = ?sibling.path(), "Removed stale blob namespace"),
                Err(e) => warn!(path = ?sibling.path(), error = %e, "Failed to remove stale blob namespace"),
            }
        }

        info!(dir = ?dir, "Blob store opened");
        Ok(Self { dir })
    }

    /// File name for a cache key
    pub fn file_name(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(Self::file_name(key))
    }

    /// Write target for one `put`; unique per call so concurrent writers never share it
    fn temp_path_for(&self, key: &str) -> PathBuf {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let seq = NEXT.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            "{}.{}.{}.tmp",
            Self::file_name(key),
            std::process::id(),
            seq
        ))
    }
}

fn encode(blob: &MediaBlob) -> Result<Vec<u8>> {
    if blob.mime_type.contains(['\n', '\r']) {
        return Err(CacheError::CorruptEntry(format!(
            "content type contains a line break: {:?}",
            blob.mime_type
        )));
    }
    let mut buf = Vec::with_capacity(blob.mime_type.len() + 1 + blob.data.len());
    buf.extend_from_slice(blob.mime_type.as_bytes());
    buf.push(b'\n');
    buf.extend_from_slice(&blob.data);
    Ok(buf)
}

fn decode(mut raw: Vec<u8>) -> Result<MediaBlob> {
    let newline = raw
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| CacheError::CorruptEntry("missing content type header".to_string()))?;
    let data = raw.split_off(newline + 1);
    raw.truncate(newline);
    let mime_type = String::from_utf8(raw)
        .map_err(|_| CacheError::CorruptEntry("content type is not UTF-8".to_string()))?;
    Ok(MediaBlob { data, mime_type })
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn put(&self, key: &str, blob: &MediaBlob) -> Result<()> {
        let path = self.path_for(key);
        let tmp = self.temp_path_for(key);
        if let Err(e) = fs::write(&tmp, encode(blob)?).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(key, size = blob.size(), "Wrote blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<MediaBlob>> {
        match fs::read(self.path_for(key)).await {
            Ok(raw) => decode(raw).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut files = fs::read_dir(&self.dir).await?;
        while let Some(file) = files.next_entry().await? {
            if file.file_type().await?.is_file() {
                fs::remove_file(file.path()).await?;
            }
        }
        Ok(())
    }
}
