//! Entry metadata storage
//!
//! Uses sqlx with SQLite. One table holds every namespace's rows, keyed by
//! `(namespace, id)` and indexed on timestamp and size.

use crate::error::{CacheError, Result};
use crate::types::{CacheEntryMetadata, Priority};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Structured store for [`CacheEntryMetadata`] records
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn all(&self) -> Result<Vec<CacheEntryMetadata>>;

    async fn get(&self, key: &str) -> Result<Option<CacheEntryMetadata>>;

    /// Insert or replace the record for `entry.id`
    async fn put(&self, entry: &CacheEntryMetadata) -> Result<()>;

    /// Raise `last_accessed` to `now_ms` (never lowers it).
    /// Returns whether a record existed.
    async fn touch(&self, key: &str, now_ms: i64) -> Result<bool>;

    /// Remove a record, returning whether one existed
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn clear(&self) -> Result<()>;
}

#[derive(Debug, FromRow)]
struct MetadataRow {
    id: String,
    timestamp: i64,
    size: i64,
    mime_type: String,
    priority: String,
    last_accessed: i64,
}

impl TryFrom<MetadataRow> for CacheEntryMetadata {
    type Error = CacheError;

    fn try_from(row: MetadataRow) -> Result<Self> {
        let priority: Priority = row.priority.parse().map_err(CacheError::CorruptEntry)?;
        let size_bytes = u64::try_from(row.size)
            .map_err(|_| CacheError::CorruptEntry(format!("negative size for {}", row.id)))?;
        Ok(CacheEntryMetadata {
            id: row.id,
            timestamp_created: row.timestamp,
            size_bytes,
            mime_type: row.mime_type,
            priority,
            last_accessed: row.last_accessed,
        })
    }
}

/// SQLite-backed [`MetadataStore`] scoped to one namespace
#[derive(Debug, Clone)]
pub struct SqliteMetadataStore {
    pool: SqlitePool,
    namespace: String,
}

impl SqliteMetadataStore {
    /// Open (or create) the database file and prepare the schema.
    ///
    /// Rows belonging to any other namespace are removed.
    pub async fn connect(path: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(path = ?path, "Opening metadata database...");
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            namespace: namespace.to_string(),
        };
        store.migrate().await?;
        store.purge_other_namespaces().await?;
        info!(namespace, "Metadata database ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS media_metadata (
                namespace TEXT NOT NULL,
                id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                size INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                priority TEXT NOT NULL,
                last_accessed INTEGER NOT NULL,
                PRIMARY KEY (namespace, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_media_metadata_timestamp ON media_metadata (namespace, timestamp)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_media_metadata_size ON media_metadata (namespace, size)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn purge_other_namespaces(&self) -> Result<()> {
        let purged = sqlx::query("DELETE FROM media_metadata WHERE namespace != ?")
            .bind(&self.namespace)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if purged > 0 {
            info!(purged, "Removed metadata from stale namespaces");
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn all(&self) -> Result<Vec<CacheEntryMetadata>> {
        let rows = sqlx::query_as::<_, MetadataRow>(
            r#"
            SELECT id, timestamp, size, mime_type, priority, last_accessed
            FROM media_metadata
            WHERE namespace = ?
            ORDER BY timestamp
            "#,
        )
        .bind(&self.namespace)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(CacheEntryMetadata::try_from).collect()
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntryMetadata>> {
        let row = sqlx::query_as::<_, MetadataRow>(
            r#"
            SELECT id, timestamp, size, mime_type, priority, last_accessed
            FROM media_metadata
            WHERE namespace = ? AND id = ?
            "#,
        )
        .bind(&self.namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CacheEntryMetadata::try_from).transpose()
    }

    async fn put(&self, entry: &CacheEntryMetadata) -> Result<()> {
        let size = i64::try_from(entry.size_bytes).map_err(|_| {
            CacheError::CorruptEntry(format!("size out of range for {}", entry.id))
        })?;

        sqlx::query(
            r#"
            INSERT INTO media_metadata (namespace, id, timestamp, size, mime_type, priority, last_accessed)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (namespace, id) DO UPDATE SET
                timestamp = excluded.timestamp,
                size = excluded.size,
                mime_type = excluded.mime_type,
                priority = excluded.priority,
                last_accessed = excluded.last_accessed
            "#,
        )
        .bind(&self.namespace)
        .bind(&entry.id)
        .bind(entry.timestamp_created)
        .bind(size)
        .bind(&entry.mime_type)
        .bind(entry.priority.as_str())
        .bind(entry.last_accessed)
        .execute(&self.pool)
        .await?;

        debug!(key = %entry.id, size = entry.size_bytes, "Upserted metadata");
        Ok(())
    }

    async fn touch(&self, key: &str, now_ms: i64) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE media_metadata
            SET last_accessed = MAX(last_accessed, ?)
            WHERE namespace = ? AND id = ?
            "#,
        )
        .bind(now_ms)
        .bind(&self.namespace)
        .bind(key)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM media_metadata WHERE namespace = ? AND id = ?")
            .bind(&self.namespace)
            .bind(key)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM media_metadata WHERE namespace = ?")
            .bind(&self.namespace)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
