//! Location service functions with store access.
//!
//! Not-found outcomes are returned as `Ok(None)` so routes can answer 404
//! themselves; store failures and invalid input propagate as `AppError`.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, FieldError, Result};
use crate::money::non_negative;

use super::models::{
    DeliveryArea, DeliveryOptions, DeliverySummary, Location, LocationFilter, ParentFilter,
};
use super::requests::{
    CreateLocationRequest, DeliveryAreaInput, DeliveryOptionsInput, LocationListQuery,
    UpdateLocationRequest,
};
use super::resolver::{self, normalize_postcode, DeliveryCheckResult};
use super::store::LocationStore;

const MAX_NAME_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 1000;
const DEFAULT_PAGE_LIMIT: i64 = 10;
const MAX_PAGE_LIMIT: i64 = 100;
const MAX_PAGE: i64 = 1_000_000;
/// Longest ancestor chain walked by the cycle check
const MAX_TREE_DEPTH: usize = 32;

/// A location together with its direct children
#[derive(Debug, Clone, Serialize)]
pub struct LocationDetail {
    #[serde(flatten)]
    pub location: Location,
    pub delivery_summary: DeliverySummary,
    pub children: Vec<Location>,
}

/// One page of a location listing
#[derive(Debug, Clone, Serialize)]
pub struct LocationPage {
    pub locations: Vec<Location>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_non_negative(errors: &mut Vec<FieldError>, field: &str, value: Option<Decimal>) {
    if matches!(value, Some(v) if v < Decimal::ZERO) {
        errors.push(FieldError::new(field, format!("{} cannot be negative", field)));
    }
}

fn check_non_negative_int(errors: &mut Vec<FieldError>, field: &str, value: Option<i32>) {
    if matches!(value, Some(v) if v < 0) {
        errors.push(FieldError::new(field, format!("{} cannot be negative", field)));
    }
}

fn check_name(errors: &mut Vec<FieldError>, name: &str) {
    if name.chars().count() > MAX_NAME_LEN {
        errors.push(FieldError::new(
            "name",
            format!("Name cannot exceed {} characters", MAX_NAME_LEN),
        ));
    }
}

fn check_description(errors: &mut Vec<FieldError>, description: &Option<String>) {
    if matches!(description, Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN) {
        errors.push(FieldError::new(
            "description",
            format!("Description cannot exceed {} characters", MAX_DESCRIPTION_LEN),
        ));
    }
}

fn validate_options_input(errors: &mut Vec<FieldError>, input: &DeliveryOptionsInput) {
    check_non_negative(errors, "delivery_options.fee", input.fee);
    check_non_negative(errors, "delivery_options.min_order", input.min_order);
    check_non_negative_int(errors, "delivery_options.estimated_time", input.estimated_time);
    check_non_negative_int(errors, "delivery_options.radius", input.radius);
}

fn apply_options_input(options: &mut DeliveryOptions, input: DeliveryOptionsInput) {
    if let Some(v) = input.is_available {
        options.is_available = v;
    }
    if let Some(v) = input.is_free {
        options.is_free = v;
    }
    if let Some(v) = input.fee {
        options.fee = v;
    }
    if let Some(v) = input.min_order {
        options.min_order = v;
    }
    if let Some(v) = input.estimated_time {
        options.estimated_time = v;
    }
    if let Some(v) = input.radius {
        options.radius = v;
    }
}

fn validate_area_input(errors: &mut Vec<FieldError>, input: &DeliveryAreaInput, creating: bool) {
    if creating && trimmed(input.name.clone()).is_none() {
        errors.push(FieldError::new("name", "Delivery area name is required"));
    }
    let postcode_blank = input
        .postcode
        .as_deref()
        .map(|p| p.trim().is_empty())
        .unwrap_or(creating);
    if postcode_blank {
        errors.push(FieldError::new("postcode", "Delivery area postcode is required"));
    }
    check_non_negative(errors, "delivery_fee", input.delivery_fee);
    check_non_negative(errors, "min_order", input.min_order);
    check_non_negative_int(errors, "estimated_time", input.estimated_time);
}

/// Build a normalized delivery area from create input (already validated)
fn new_delivery_area(input: DeliveryAreaInput) -> DeliveryArea {
    let delivery_fee = input.delivery_fee.unwrap_or(Decimal::ZERO);
    DeliveryArea {
        id: Uuid::new_v4(),
        name: trimmed(input.name).unwrap_or_default(),
        postcode: normalize_postcode(input.postcode.as_deref().unwrap_or_default()),
        delivery_fee,
        is_free: input.is_free.unwrap_or(delivery_fee.is_zero()),
        min_order: input.min_order.unwrap_or(Decimal::ZERO),
        estimated_time: input.estimated_time.unwrap_or(60),
        is_active: input.is_active.unwrap_or(true),
    }
}

/// Apply only the fields present in `input`
fn apply_area_input(area: &mut DeliveryArea, input: DeliveryAreaInput) {
    if let Some(name) = trimmed(input.name) {
        area.name = name;
    }
    if let Some(postcode) = input.postcode {
        area.postcode = normalize_postcode(&postcode);
    }
    if let Some(fee) = input.delivery_fee {
        area.delivery_fee = fee;
    }
    if let Some(is_free) = input.is_free {
        area.is_free = is_free;
    }
    if let Some(min_order) = input.min_order {
        area.min_order = min_order;
    }
    if let Some(estimated_time) = input.estimated_time {
        area.estimated_time = estimated_time;
    }
    if let Some(is_active) = input.is_active {
        area.is_active = is_active;
    }
}

fn into_result(errors: Vec<FieldError>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(errors))
    }
}

/// Ids from `start` up to the root, `start` included.
///
/// A chain longer than `MAX_TREE_DEPTH` is a validation error, since a
/// truncated chain could hide a cycle.
async fn ancestor_chain(store: &dyn LocationStore, start: Uuid) -> Result<Vec<Uuid>> {
    let mut chain = vec![start];
    let mut current = store.get(start).await?.and_then(|l| l.parent_id);
    while let Some(id) = current {
        if chain.contains(&id) {
            break;
        }
        if chain.len() >= MAX_TREE_DEPTH {
            return Err(AppError::validation(vec![FieldError::new(
                "parent_id",
                format!("Location tree cannot be deeper than {} levels", MAX_TREE_DEPTH),
            )]));
        }
        chain.push(id);
        current = store.get(id).await?.and_then(|l| l.parent_id);
    }
    Ok(chain)
}

/// Create a location.
///
/// Name and type are required; a given parent must exist.
pub async fn create_location(
    store: &dyn LocationStore,
    req: CreateLocationRequest,
) -> Result<Location> {
    let mut errors = Vec::new();

    let name = trimmed(req.name);
    match &name {
        None => errors.push(FieldError::new("name", "Location name is required")),
        Some(n) => check_name(&mut errors, n),
    }
    if req.location_type.is_none() {
        errors.push(FieldError::new("type", "Location type is required"));
    }
    let description = trimmed(req.description);
    check_description(&mut errors, &description);
    if let Some(options) = &req.delivery_options {
        validate_options_input(&mut errors, options);
    }
    for area in &req.delivery_areas {
        validate_area_input(&mut errors, area, true);
    }
    if let Some(parent_id) = req.parent_id {
        if store.get(parent_id).await?.is_none() {
            errors.push(FieldError::new("parent_id", "Parent location not found"));
        }
    }

    let (Some(name), Some(location_type), true) = (name, req.location_type, errors.is_empty())
    else {
        return Err(AppError::validation(errors));
    };

    let mut delivery_options = DeliveryOptions::default();
    if let Some(input) = req.delivery_options {
        apply_options_input(&mut delivery_options, input);
    }

    let now = Utc::now();
    let location = Location {
        id: Uuid::new_v4(),
        name,
        location_type,
        parent_id: req.parent_id,
        country: trimmed(req.country),
        state: trimmed(req.state),
        city: trimmed(req.city),
        area: trimmed(req.area),
        postcode: req.postcode.as_deref().map(normalize_postcode).filter(|p| !p.is_empty()),
        delivery_areas: req.delivery_areas.into_iter().map(new_delivery_area).collect(),
        delivery_options,
        description,
        is_active: req.is_active.unwrap_or(true),
        metadata: req.metadata.unwrap_or_else(|| serde_json::json!({})),
        created_at: now,
        updated_at: now,
    };

    store.insert(&location).await?;
    info!(
        "Created {} location {} ({})",
        location.location_type.as_str(),
        location.name,
        location.id
    );
    Ok(location)
}

/// Get a location with its children
pub async fn get_location(store: &dyn LocationStore, id: Uuid) -> Result<Option<LocationDetail>> {
    let Some(location) = store.get(id).await? else {
        return Ok(None);
    };
    let children = store.children(id).await?;

    Ok(Some(LocationDetail {
        delivery_summary: location.delivery_summary(),
        location,
        children,
    }))
}

/// Partially update a location.
///
/// Re-parenting is rejected when the new parent is the node itself or one of
/// its descendants.
pub async fn update_location(
    store: &dyn LocationStore,
    id: Uuid,
    req: UpdateLocationRequest,
) -> Result<Option<Location>> {
    let Some(mut location) = store.get(id).await? else {
        return Ok(None);
    };

    let mut errors = Vec::new();
    if let Some(name) = &req.name {
        if name.trim().is_empty() {
            errors.push(FieldError::new("name", "Location name is required"));
        } else {
            check_name(&mut errors, name.trim());
        }
    }
    check_description(&mut errors, &req.description);
    if let Some(options) = &req.delivery_options {
        validate_options_input(&mut errors, options);
    }
    if let Some(Some(parent_id)) = req.parent_id {
        if parent_id == id {
            errors.push(FieldError::new("parent_id", "A location cannot be its own parent"));
        } else if store.get(parent_id).await?.is_none() {
            errors.push(FieldError::new("parent_id", "Parent location not found"));
        } else {
            let chain = ancestor_chain(store, parent_id).await?;
            if resolver::creates_cycle(id, &chain) {
                errors.push(FieldError::new(
                    "parent_id",
                    "A location cannot be moved under its own descendant",
                ));
            }
        }
    }
    into_result(errors)?;

    if let Some(name) = trimmed(req.name) {
        location.name = name;
    }
    if let Some(location_type) = req.location_type {
        location.location_type = location_type;
    }
    if let Some(parent_id) = req.parent_id {
        location.parent_id = parent_id;
    }
    if req.country.is_some() {
        location.country = trimmed(req.country);
    }
    if req.state.is_some() {
        location.state = trimmed(req.state);
    }
    if req.city.is_some() {
        location.city = trimmed(req.city);
    }
    if req.area.is_some() {
        location.area = trimmed(req.area);
    }
    if let Some(postcode) = req.postcode {
        location.postcode = Some(normalize_postcode(&postcode)).filter(|p| !p.is_empty());
    }
    if let Some(input) = req.delivery_options {
        apply_options_input(&mut location.delivery_options, input);
    }
    if req.description.is_some() {
        location.description = trimmed(req.description);
    }
    if let Some(is_active) = req.is_active {
        location.is_active = is_active;
    }
    if let Some(metadata) = req.metadata {
        location.metadata = metadata;
    }
    location.updated_at = Utc::now();

    store.save(&location).await
}

/// Soft delete: the location is deactivated and kept
pub async fn delete_location(store: &dyn LocationStore, id: Uuid) -> Result<Option<Location>> {
    let Some(mut location) = store.get(id).await? else {
        return Ok(None);
    };
    location.is_active = false;
    location.updated_at = Utc::now();

    let saved = store.save(&location).await?;
    if saved.is_some() {
        info!("Deactivated location {} ({})", location.name, location.id);
    }
    Ok(saved)
}

/// Turn query-string parameters into a validated listing filter
pub fn build_filter(query: LocationListQuery) -> Result<LocationFilter> {
    let parent = match query.parent.as_deref().map(str::trim) {
        None | Some("") => None,
        Some("null") => Some(ParentFilter::Root),
        Some(raw) => Some(ParentFilter::Id(Uuid::parse_str(raw).map_err(|_| {
            AppError::validation(vec![FieldError::new("parent", "Invalid parent id")])
        })?)),
    };

    Ok(LocationFilter {
        location_type: query.location_type,
        country: trimmed(query.country),
        state: trimmed(query.state),
        city: trimmed(query.city),
        area: trimmed(query.area),
        postcode: query.postcode.as_deref().map(normalize_postcode).filter(|p| !p.is_empty()),
        parent,
        has_delivery_areas: query.has_delivery_areas,
        is_active: query.is_active,
        search: trimmed(query.search),
        page: query.page.unwrap_or(1).clamp(1, MAX_PAGE),
        limit: query
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT),
    })
}

/// List locations matching all given filters, sorted by type then name
pub async fn get_locations(store: &dyn LocationStore, filter: LocationFilter) -> Result<LocationPage> {
    let (locations, total) = store.list(&filter).await?;
    Ok(LocationPage {
        locations,
        total,
        page: filter.page,
        limit: filter.limit,
    })
}

/// Check whether delivery to a postcode is possible for an order amount.
///
/// Absent or negative amounts are treated as zero. An unknown postcode is a
/// negative result, not an error.
pub async fn check_delivery_availability(
    store: &dyn LocationStore,
    postcode: &str,
    order_amount: Option<Decimal>,
) -> Result<DeliveryCheckResult> {
    let postcode = normalize_postcode(postcode);
    let amount = non_negative(order_amount);

    let own_match = store.find_active_by_postcode(&postcode).await?;
    let area_match = if own_match.is_none() {
        store.find_active_by_area_postcode(&postcode).await?
    } else {
        None
    };

    let result = resolver::resolve(&postcode, own_match.as_ref(), area_match.as_ref(), amount);
    debug!(
        "Delivery check for {} (amount {}): available={}",
        postcode, amount, result.available
    );
    Ok(result)
}

/// Append a delivery area to a location
pub async fn add_delivery_area(
    store: &dyn LocationStore,
    location_id: Uuid,
    input: DeliveryAreaInput,
) -> Result<Option<Location>> {
    let mut errors = Vec::new();
    validate_area_input(&mut errors, &input, true);
    into_result(errors)?;

    let area = new_delivery_area(input);
    store
        .edit_delivery_areas(
            location_id,
            Box::new(move |areas: &mut Vec<DeliveryArea>| {
                areas.push(area);
                true
            }),
        )
        .await
}

/// Update the given fields of one embedded delivery area
pub async fn update_delivery_area(
    store: &dyn LocationStore,
    location_id: Uuid,
    area_id: Uuid,
    input: DeliveryAreaInput,
) -> Result<Option<Location>> {
    let mut errors = Vec::new();
    validate_area_input(&mut errors, &input, false);
    into_result(errors)?;

    let location = store
        .edit_delivery_areas(
            location_id,
            Box::new(move |areas: &mut Vec<DeliveryArea>| {
                match areas.iter_mut().find(|a| a.id == area_id) {
                    Some(area) => {
                        apply_area_input(area, input);
                        true
                    }
                    None => false,
                }
            }),
        )
        .await?;

    Ok(location.filter(|l| l.delivery_areas.iter().any(|a| a.id == area_id)))
}

/// Remove an embedded delivery area. Unknown area ids are a no-op.
pub async fn delete_delivery_area(
    store: &dyn LocationStore,
    location_id: Uuid,
    area_id: Uuid,
) -> Result<Option<Location>> {
    store
        .edit_delivery_areas(
            location_id,
            Box::new(move |areas: &mut Vec<DeliveryArea>| {
                let before = areas.len();
                areas.retain(|a| a.id != area_id);
                areas.len() != before
            }),
        )
        .await
}
