//! Promo route handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::promo::requests::{
    ApplyPromoRequest, CreatePromoRequest, UpdatePromoRequest, ValidatePromoRequest,
};
use crate::promo::services;
use crate::promo::{Promo, PromoStats};
use crate::AppState;

use super::{parse_id, ApiResponse};

type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;

pub async fn create(
    State(state): State<AppState>,
    body: JsonBody<CreatePromoRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Promo>>)> {
    let Json(req) = body?;
    let promo = services::create_promo(state.promos.as_ref(), req).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(promo).with_message("Promo created successfully")),
    ))
}

/// All promos, newest first
pub async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Promo>>>> {
    let promos = services::get_all_promos(state.promos.as_ref()).await?;
    let count = promos.len();
    Ok(Json(ApiResponse::ok(promos).with_count(count)))
}

pub async fn active(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Promo>>>> {
    let promos = services::get_active_promos(state.promos.as_ref()).await?;
    let count = promos.len();
    Ok(Json(ApiResponse::ok(promos).with_count(count)))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<ApiResponse<PromoStats>>> {
    let stats = services::get_promo_stats(state.promos.as_ref()).await?;
    Ok(Json(ApiResponse::ok(stats)))
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Promo>>> {
    let id = parse_id(&id)?;
    let promo = services::get_promo(state.promos.as_ref(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Promo"))?;

    Ok(Json(ApiResponse::ok(promo)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: JsonBody<UpdatePromoRequest>,
) -> Result<Json<ApiResponse<Promo>>> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    let promo = services::update_promo(state.promos.as_ref(), id, req)
        .await?
        .ok_or_else(|| AppError::not_found("Promo"))?;

    Ok(Json(
        ApiResponse::ok(promo).with_message("Promo updated successfully"),
    ))
}

/// Hard delete
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Promo>>> {
    let id = parse_id(&id)?;
    let promo = services::delete_promo(state.promos.as_ref(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Promo"))?;

    Ok(Json(
        ApiResponse::ok(promo).with_message("Promo deleted successfully"),
    ))
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub success: bool,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<Decimal>,
}

/// Eligibility check; a rejected promo is still a 200 with `valid: false`
pub async fn validate(
    State(state): State<AppState>,
    body: JsonBody<ValidatePromoRequest>,
) -> Result<Json<ValidateResponse>> {
    let Json(req) = body?;
    let validation =
        services::validate_promo(state.promos.as_ref(), &req.promo_name, req.order_amount).await?;

    Ok(Json(ValidateResponse {
        success: true,
        valid: validation.valid,
        message: validation.message,
        discount: validation.discount,
    }))
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
    pub success: bool,
    pub discount: Decimal,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Promo>,
}

/// Redeem a promo by id or name. Rejections are 400s.
pub async fn apply(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    body: JsonBody<ApplyPromoRequest>,
) -> Result<Response> {
    let Json(req) = body?;
    let result = services::apply_promo(state.promos.as_ref(), &identifier, req.order_amount).await?;

    if !result.success {
        let body = ApplyResponse {
            success: false,
            discount: result.discount,
            message: result.message.unwrap_or_default(),
            data: None,
        };
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    }

    Ok(Json(ApplyResponse {
        success: true,
        discount: result.discount,
        message: "Promo applied successfully".to_string(),
        data: result.promo,
    })
    .into_response())
}
