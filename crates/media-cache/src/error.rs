//! Error types for the media cache
//!
//! These never escape [`crate::MediaCacheManager`]'s public operations; the
//! manager logs them and reports a miss or a declined write instead.

use std::fmt;

#[derive(Debug)]
pub enum CacheError {
    Io(Box<std::io::Error>),
    Database(sqlx::Error),
    InvalidKey,
    QuotaExceeded { size: u64, quota: u64 },
    CorruptEntry(String),
    /// Namespace that cannot be used as a single directory name
    InvalidNamespace(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io(err) => write!(f, "IO error: {}", err),
            CacheError::Database(err) => write!(f, "Database error: {}", err),
            CacheError::InvalidKey => write!(f, "Cache key must not be empty"),
            CacheError::QuotaExceeded { size, quota } => {
                write!(f, "Blob of {} bytes exceeds cache quota of {} bytes", size, quota)
            }
            CacheError::CorruptEntry(msg) => write!(f, "Corrupt cache entry: {}", msg),
            CacheError::InvalidNamespace(ns) => write!(f, "Invalid cache namespace: {:?}", ns),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io(err) => Some(err.as_ref()),
            CacheError::Database(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(Box::new(err))
    }
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        CacheError::Database(err)
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_display() {
        let err = CacheError::QuotaExceeded {
            size: 20,
            quota: 10,
        };
        assert_eq!(
            format!("{}", err),
            "Blob of 20 bytes exceeds cache quota of 10 bytes"
        );
    }

    #[test]
    fn test_io_error_has_source() {
        let err: CacheError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into();
        assert!(format!("{}", err).contains("read-only"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_invalid_namespace_display() {
        let err = CacheError::InvalidNamespace("../escape".to_string());
        assert_eq!(format!("{}", err), "Invalid cache namespace: \"../escape\"");
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn test_error_is_debug() {
        let err = CacheError::CorruptEntry("missing header".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("CorruptEntry"));
    }
}
