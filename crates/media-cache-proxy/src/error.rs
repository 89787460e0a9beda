//! Error types for the media cache proxy

use std::fmt;

#[derive(Debug)]
pub enum ProxyError {
    Fetch(Box<reqwest::Error>),
    Origin(String),
    InvalidUrl(String),
    OriginNotAllowed(String),
    TooLarge { size: u64, limit: u64 },
    Io(Box<std::io::Error>),
    Config(String),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::Fetch(err) => write!(f, "Fetch error: {}", err),
            ProxyError::Origin(msg) => write!(f, "Origin error: {}", msg),
            ProxyError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            ProxyError::OriginNotAllowed(host) => write!(f, "Origin not allowed: {}", host),
            ProxyError::TooLarge { size, limit } => {
                write!(f, "Media of {} bytes exceeds limit of {} bytes", size, limit)
            }
            ProxyError::Io(err) => write!(f, "IO error: {}", err),
            ProxyError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProxyError::Fetch(err) => Some(err.as_ref()),
            ProxyError::Io(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        ProxyError::Fetch(Box::new(err))
    }
}

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        ProxyError::Io(Box::new(err))
    }
}

impl From<tracing_subscriber::filter::ParseError> for ProxyError {
    fn from(err: tracing_subscriber::filter::ParseError) -> Self {
        ProxyError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_display() {
        let err = ProxyError::InvalidUrl("ftp://example.com".to_string());
        assert_eq!(format!("{}", err), "Invalid URL: ftp://example.com");
    }

    #[test]
    fn test_too_large_display() {
        let err = ProxyError::TooLarge {
            size: 2048,
            limit: 1024,
        };
        assert_eq!(
            format!("{}", err),
            "Media of 2048 bytes exceeds limit of 1024 bytes"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ProxyError::Config("bad directive".to_string());
        assert_eq!(format!("{}", err), "Configuration error: bad directive");
    }

    #[test]
    fn test_error_is_debug() {
        let err = ProxyError::Origin("status 404".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("Origin"));
    }
}
