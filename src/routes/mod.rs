//! HTTP route handlers and router assembly.

pub mod checkout;
pub mod locations;
pub mod promos;

use axum::{
    extract::State,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::cache::CacheStats;
use crate::error::{AppError, Result};
use crate::AppState;

/// Success body shared by all JSON endpoints
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            count: None,
            data,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

/// Parse a path id, rejecting malformed values with a 400
pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::BadRequest("Invalid id format".to_string()))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub environment: &'static str,
    pub cache: CacheStats,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        environment: state.config.environment.as_str(),
        cache: state.cache.stats(),
    })
}

/// All `/api` routes, with full paths so middleware sees the real URI
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/locations",
            post(locations::create).get(locations::list),
        )
        .route("/api/locations/check-delivery", post(locations::check_delivery))
        .route(
            "/api/locations/:id",
            get(locations::detail)
                .patch(locations::update)
                .delete(locations::remove),
        )
        .route("/api/locations/:id/areas", post(locations::add_area))
        .route(
            "/api/locations/:id/areas/:area_id",
            patch(locations::update_area).delete(locations::remove_area),
        )
        .route("/api/promos", post(promos::create).get(promos::list))
        .route("/api/promos/active", get(promos::active))
        .route("/api/promos/stats/overview", get(promos::stats))
        .route("/api/promos/validate", post(promos::validate))
        .route(
            "/api/promos/:id",
            get(promos::detail).put(promos::update).delete(promos::remove),
        )
        .route("/api/promos/:id/apply", post(promos::apply))
        .route("/api/checkout/quote", post(checkout::quote))
}
