//! Checkout route handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use crate::checkout::{self, CheckoutQuote, QuoteRequest};
use crate::error::Result;
use crate::AppState;

use super::ApiResponse;

/// Price a prospective order for a postcode and optional promo
pub async fn quote(
    State(state): State<AppState>,
    body: std::result::Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<CheckoutQuote>>> {
    let Json(req) = body?;
    let quote = checkout::quote(state.locations.as_ref(), state.promos.as_ref(), req).await?;

    Ok(Json(ApiResponse::ok(quote)))
}
