//! In-memory response caching using moka
//!
//! GET responses are cached per `METHOD:path?query` for a fixed TTL. Successful
//! writes invalidate every cached entry under the same resource base path
//! (`/api/locations`, `/api/promos`, ...). The cache is owned by `AppState` and
//! handed to the middleware, so tests and alternative routers get their own.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::AppError;

/// Largest response body that will be buffered into the cache
const MAX_CACHED_BODY: usize = 2 * 1024 * 1024;

/// A cached JSON response body
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub body: Bytes,
}

/// Application response cache
#[derive(Clone)]
pub struct ResponseCache {
    /// Responses (`METHOD:path?query` -> body)
    responses: Cache<String, Arc<CachedResponse>>,
}

impl ResponseCache {
    /// Create a new cache instance with the given TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            // 1000 entries, TTL from config (60s by default)
            responses: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(ttl)
                .support_invalidation_closures()
                .build(),
        }
    }

    /// Generate cache key for a request
    pub fn key(method: &Method, uri: &Uri) -> String {
        let target = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| uri.path());
        format!("{}:{}", method, target)
    }

    pub async fn get(&self, key: &str) -> Option<Arc<CachedResponse>> {
        self.responses.get(key).await
    }

    pub async fn insert(&self, key: String, body: Bytes) {
        self.responses
            .insert(key, Arc::new(CachedResponse { body }))
            .await;
    }

    /// Invalidate every entry whose path is `base` or lies under it
    pub fn invalidate_prefix(&self, base: &str) {
        let base = base.to_string();
        let pred_base = base.clone();
        match self
            .responses
            .invalidate_entries_if(move |key, _| key_under_base(key, &pred_base))
        {
            Ok(_) => info!("Cache invalidated for {}", base),
            Err(e) => {
                warn!("Prefix invalidation failed for {}: {}; dropping all entries", base, e);
                self.responses.invalidate_all();
            }
        }
    }

    /// Invalidate all entries
    pub fn invalidate_all(&self) {
        self.responses.invalidate_all();
        info!("All caches invalidated");
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            responses_size: self.responses.entry_count(),
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

/// Cache statistics for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub responses_size: u64,
}

/// True when the path part of a `METHOD:path?query` key is `base` or one of
/// its sub-paths. Only the path is compared, never the query string.
fn key_under_base(key: &str, base: &str) -> bool {
    let Some((_, target)) = key.split_once(':') else {
        return false;
    };
    let path = target.split('?').next().unwrap_or(target);
    match path.strip_prefix(base) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || base.ends_with('/'),
        None => false,
    }
}

/// Resource base path used for invalidation: the first two path segments.
///
/// `/api/locations/5/areas/7` -> `/api/locations`
pub fn resource_base(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).take(2).collect();
    format!("/{}", segments.join("/"))
}

/// POST endpoints that compute a result without changing any resource
const QUERY_POSTS: &[&str] = &[
    "/api/locations/check-delivery",
    "/api/promos/validate",
    "/api/checkout/quote",
];

/// Axum middleware serving cached GET responses and invalidating on writes
pub async fn cache_responses(
    State(cache): State<ResponseCache>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();

    if method == Method::GET {
        let key = ResponseCache::key(&method, request.uri());
        if let Some(hit) = cache.get(&key).await {
            debug!("Cache HIT for {}", key);
            return (
                [(header::CONTENT_TYPE, "application/json")],
                hit.body.clone(),
            )
                .into_response();
        }
        debug!("Cache MISS for {}", key);

        let response = next.run(request).await;
        if response.status() != StatusCode::OK {
            return response;
        }

        let (parts, body) = response.into_parts();
        return match axum::body::to_bytes(body, MAX_CACHED_BODY).await {
            Ok(bytes) => {
                cache.insert(key, bytes.clone()).await;
                Response::from_parts(parts, Body::from(bytes))
            }
            Err(e) => AppError::Internal(format!("Failed to buffer response: {}", e)).into_response(),
        };
    }

    let is_write = matches!(
        method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    ) && !QUERY_POSTS.contains(&request.uri().path());
    let base = resource_base(request.uri().path());
    let response = next.run(request).await;
    if is_write && response.status().is_success() {
        cache.invalidate_prefix(&base);
    }
    response
}
