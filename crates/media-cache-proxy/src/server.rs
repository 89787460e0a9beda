//! HTTP server for the media cache
//!
//! Provides /health, /media (GET, PUT, DELETE) and /maintenance/expire.

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::fetcher::OriginFetcher;
use crate::types::{ErrorResponse, ExpireResponse, HealthResponse, MediaQuery};
use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use media_cache::{MediaBlob, MediaCacheManager};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use url::Url;

const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Shared state for the HTTP server
pub struct ServerState {
    pub cache: MediaCacheManager,
    pub fetcher: OriginFetcher,
    pub config: ProxyConfig,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(cache: MediaCacheManager, fetcher: OriginFetcher, config: ProxyConfig) -> Self {
        Self {
            cache,
            fetcher,
            config,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/media",
            get(get_media).put(put_media).delete(clear_media),
        )
        .route("/maintenance/expire", post(expire_media))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn media_response(blob: MediaBlob, from_cache: bool) -> Response {
    let cache_header = if from_cache { "HIT" } else { "MISS" };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, blob.mime_type)
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .header("X-Cache", cache_header)
        .body(Body::from(blob.data))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Validate a `url` query parameter and return it in the normalized form used as the cache key
fn source_url(config: &ProxyConfig, raw: &str) -> std::result::Result<Url, Response> {
    let url = OriginFetcher::parse_source(raw)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;
    if !config.allows_origin(&url) {
        let host = url.host_str().unwrap_or_default().to_string();
        warn!(host = %host, "Rejected media request for disallowed origin");
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            ProxyError::OriginNotAllowed(host).to_string(),
        ));
    }
    Ok(url)
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let cache_ready = state.cache.ready().await;
    let cache_stats = state.cache.stats().await;
    let uptime_secs = (Utc::now() - state.started_at).num_seconds().max(0) as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache_ready,
        cache: cache_stats,
    })
}

/// Serve media from the cache, fetching and caching it from the origin on a miss
async fn get_media(State(state): State<SharedState>, Query(query): Query<MediaQuery>) -> Response {
    let url = match source_url(&state.config, &query.url) {
        Ok(url) => url,
        Err(response) => return response,
    };

    if let Some(blob) = state.cache.get_media(url.as_str()).await {
        return media_response(blob, true);
    }

    let config = state.config.cache_config(query.priority);
    let blob = match state.fetcher.fetch(&url, config.max_size_bytes).await {
        Ok(blob) => blob,
        Err(e) => {
            warn!(url = %url, error = %e, "Failed to fetch media");
            let status = match e {
                ProxyError::Origin(_) | ProxyError::Fetch(_) | ProxyError::TooLarge { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            return error_response(status, "Media unavailable");
        }
    };

    // Serve the media even when the cache declines to keep it
    state
        .cache
        .cache_media(url.as_str(), blob.clone(), &config)
        .await;

    media_response(blob, false)
}

/// Store the request body under the normalized `url`
async fn put_media(
    State(state): State<SharedState>,
    Query(query): Query<MediaQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let url = match source_url(&state.config, &query.url) {
        Ok(url) => url,
        Err(response) => return response,
    };

    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");

    let blob = MediaBlob::new(body.to_vec(), mime_type);
    let config = state.config.cache_config(query.priority);

    if state.cache.cache_media(url.as_str(), blob, &config).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(StatusCode::INSUFFICIENT_STORAGE, "Media was not cached")
    }
}

/// Drop every cached entry
async fn clear_media(State(state): State<SharedState>) -> Response {
    if state.cache.clear().await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to clear cache")
    }
}

/// Run the expiry sweep with the configured max age
async fn expire_media(State(state): State<SharedState>) -> Json<ExpireResponse> {
    let removed = state.cache.clear_expired_media(state.config.max_age).await;
    Json(ExpireResponse { removed })
}
