//! Location route handlers

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};

use crate::error::{AppError, Result};
use crate::location::requests::{
    CheckDeliveryRequest, CreateLocationRequest, DeliveryAreaInput, LocationListQuery,
    UpdateLocationRequest,
};
use crate::location::services::{self, LocationDetail, LocationPage};
use crate::location::{DeliveryCheckResult, Location};
use crate::AppState;

use super::{parse_id, ApiResponse};

type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;

/// Create a location
pub async fn create(
    State(state): State<AppState>,
    body: JsonBody<CreateLocationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Location>>)> {
    let Json(req) = body?;
    let location = services::create_location(state.locations.as_ref(), req).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(location).with_message("Location created successfully")),
    ))
}

/// Filtered, paginated location listing
pub async fn list(
    State(state): State<AppState>,
    query: std::result::Result<Query<LocationListQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<LocationPage>>> {
    let Query(query) = query?;
    let filter = services::build_filter(query)?;
    let page = services::get_locations(state.locations.as_ref(), filter).await?;
    let count = page.locations.len();

    Ok(Json(ApiResponse::ok(page).with_count(count)))
}

/// Location with its direct children
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<LocationDetail>>> {
    let id = parse_id(&id)?;
    let detail = services::get_location(state.locations.as_ref(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Location"))?;

    Ok(Json(ApiResponse::ok(detail)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: JsonBody<UpdateLocationRequest>,
) -> Result<Json<ApiResponse<Location>>> {
    let id = parse_id(&id)?;
    let Json(req) = body?;
    let location = services::update_location(state.locations.as_ref(), id, req)
        .await?
        .ok_or_else(|| AppError::not_found("Location"))?;

    Ok(Json(
        ApiResponse::ok(location).with_message("Location updated successfully"),
    ))
}

/// Soft delete
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Location>>> {
    let id = parse_id(&id)?;
    let location = services::delete_location(state.locations.as_ref(), id)
        .await?
        .ok_or_else(|| AppError::not_found("Location"))?;

    Ok(Json(
        ApiResponse::ok(location).with_message("Location deactivated successfully"),
    ))
}

/// Delivery availability for a postcode; an unknown postcode is still a 200
pub async fn check_delivery(
    State(state): State<AppState>,
    body: JsonBody<CheckDeliveryRequest>,
) -> Result<Json<ApiResponse<DeliveryCheckResult>>> {
    let Json(req) = body?;
    let result = services::check_delivery_availability(
        state.locations.as_ref(),
        &req.postcode,
        req.order_amount,
    )
    .await?;
    let message = result.message.clone();

    Ok(Json(ApiResponse::ok(result).with_message(message)))
}

pub async fn add_area(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: JsonBody<DeliveryAreaInput>,
) -> Result<(StatusCode, Json<ApiResponse<Location>>)> {
    let id = parse_id(&id)?;
    let Json(input) = body?;
    let location = services::add_delivery_area(state.locations.as_ref(), id, input)
        .await?
        .ok_or_else(|| AppError::not_found("Location"))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(location).with_message("Delivery area added successfully")),
    ))
}

pub async fn update_area(
    State(state): State<AppState>,
    Path((id, area_id)): Path<(String, String)>,
    body: JsonBody<DeliveryAreaInput>,
) -> Result<Json<ApiResponse<Location>>> {
    let id = parse_id(&id)?;
    let area_id = parse_id(&area_id)?;
    let Json(input) = body?;
    let location = services::update_delivery_area(state.locations.as_ref(), id, area_id, input)
        .await?
        .ok_or_else(|| AppError::not_found("Location or delivery area"))?;

    Ok(Json(
        ApiResponse::ok(location).with_message("Delivery area updated successfully"),
    ))
}

/// Remove a delivery area; removing an unknown area still succeeds
pub async fn remove_area(
    State(state): State<AppState>,
    Path((id, area_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<Location>>> {
    let id = parse_id(&id)?;
    let area_id = parse_id(&area_id)?;
    let location = services::delete_delivery_area(state.locations.as_ref(), id, area_id)
        .await?
        .ok_or_else(|| AppError::not_found("Location"))?;

    Ok(Json(
        ApiResponse::ok(location).with_message("Delivery area removed successfully"),
    ))
}
