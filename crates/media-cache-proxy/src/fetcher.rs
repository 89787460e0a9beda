//! Origin fetching for cache misses

use crate::error::{ProxyError, Result};
use media_cache::MediaBlob;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// HTTP client for fetching media from its origin
pub struct OriginFetcher {
    client: Client,
}

impl OriginFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("media-cache-proxy/0.1")
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build configured HTTP client, using defaults");
                Client::new()
            });
        Self { client }
    }

    /// Parse a media source URL, accepting only http(s)
    pub fn parse_source(source: &str) -> Result<Url> {
        let url = Url::parse(source).map_err(|e| ProxyError::InvalidUrl(format!("{source}: {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ProxyError::InvalidUrl(format!(
                "unsupported scheme {scheme}"
            ))),
        }
    }

    /// Download the media at `url`, refusing bodies larger than `limit` bytes
    pub async fn fetch(&self, url: &Url, limit: u64) -> Result<MediaBlob> {
        debug!(url = %url, "Fetching media from origin");

        let mut response = self.client.get(url.as_str()).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), url = %url, "Origin returned error");
            return Err(ProxyError::Origin(format!(
                "origin returned status {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();

        if let Some(size) = response.content_length().filter(|size| *size > limit) {
            warn!(url = %url, size, limit, "Origin media too large");
            return Err(ProxyError::TooLarge { size, limit });
        }

        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let size = (data.len() + chunk.len()) as u64;
            if size > limit {
                warn!(url = %url, size, limit, "Origin media too large");
                return Err(ProxyError::TooLarge { size, limit });
            }
            data.extend_from_slice(&chunk);
        }

        debug!(
            size = data.len(),
            content_type = %content_type,
            "Fetched media from origin"
        );

        Ok(MediaBlob::new(data, content_type))
    }
}

impl Default for OriginFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::header, routing::get, Router};

    /// Serve `size` bytes of fake JPEG at `/poster.jpg` on a loopback port
    async fn spawn_origin(size: usize) -> Url {
        let router = Router::new().route(
            "/poster.jpg",
            get(move || async move { ([(header::CONTENT_TYPE, "image/jpeg")], vec![1u8; size]) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{}/poster.jpg", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_within_limit() {
        let url = spawn_origin(512).await;
        let blob = OriginFetcher::new().fetch(&url, 1024).await.unwrap();
        assert_eq!(blob.data.len(), 512);
        assert_eq!(blob.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_fetch_refuses_oversized_body() {
        let url = spawn_origin(4096).await;
        let result = OriginFetcher::new().fetch(&url, 1024).await;
        assert!(matches!(
            result,
            Err(ProxyError::TooLarge { limit: 1024, .. })
        ));
    }

    #[test]
    fn test_parse_source_accepts_http() {
        let url = OriginFetcher::parse_source("https://image.tmdb.org/t/p/w500/poster.jpg").unwrap();
        assert_eq!(url.host_str(), Some("image.tmdb.org"));
        assert!(OriginFetcher::parse_source("http://localhost:8080/a.png").is_ok());
    }

    #[test]
    fn test_parse_source_rejects_other_schemes() {
        assert!(matches!(
            OriginFetcher::parse_source("file:///etc/passwd"),
            Err(ProxyError::InvalidUrl(_))
        ));
        assert!(OriginFetcher::parse_source("not a url").is_err());
    }
}
