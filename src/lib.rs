//! castlehire-api: delivery-zone resolution and promo engine for a
//! bouncy-castle rental backend.

pub mod cache;
pub mod checkout;
pub mod config;
pub mod error;
pub mod location;
pub mod money;
pub mod promo;
pub mod routes;

use axum::{http::HeaderValue, middleware, routing::get, Router};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::location::{InMemoryLocationStore, LocationStore, PgLocationStore};
use crate::promo::{InMemoryPromoStore, PgPromoStore, PromoStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub locations: Arc<dyn LocationStore>,
    pub promos: Arc<dyn PromoStore>,
    pub cache: ResponseCache,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn postgres(pool: PgPool, config: Config) -> Self {
        Self {
            locations: Arc::new(PgLocationStore::new(pool.clone())),
            promos: Arc::new(PgPromoStore::new(pool)),
            cache: ResponseCache::new(config.cache_ttl),
            config: Arc::new(config),
        }
    }

    /// State backed by process-local maps; nothing survives a restart
    pub fn in_memory(config: Config) -> Self {
        Self {
            locations: Arc::new(InMemoryLocationStore::new()),
            promos: Arc::new(InMemoryPromoStore::new()),
            cache: ResponseCache::new(config.cache_ttl),
            config: Arc::new(config),
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::permissive();
    match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) if config.cors_origin != "*" => cors.allow_origin(origin),
        Ok(_) => cors,
        Err(e) => {
            warn!("Ignoring invalid CORS_ORIGIN {:?}: {}", config.cors_origin, e);
            cors
        }
    }
}

/// Build the application router
pub fn app(state: AppState) -> Router {
    let api = routes::api_router().layer(middleware::from_fn_with_state(
        state.cache.clone(),
        cache::cache_responses,
    ));

    Router::new()
        .route("/health", get(routes::health))
        .merge(api)
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            error::expose_error_details,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .layer(CompressionLayer::new())
        .with_state(state)
}
