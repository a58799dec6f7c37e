//! Request DTOs for location endpoints.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

use super::models::LocationType;

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial delivery options; missing fields keep their current/default value
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryOptionsInput {
    pub is_available: Option<bool>,
    pub is_free: Option<bool>,
    pub fee: Option<Decimal>,
    pub min_order: Option<Decimal>,
    pub estimated_time: Option<i32>,
    pub radius: Option<i32>,
}

/// Delivery area fields; required on create, all optional on update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryAreaInput {
    pub name: Option<String>,
    pub postcode: Option<String>,
    pub delivery_fee: Option<Decimal>,
    pub is_free: Option<bool>,
    pub min_order: Option<Decimal>,
    pub estimated_time: Option<i32>,
    pub is_active: Option<bool>,
}

/// Request to create a location
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateLocationRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub location_type: Option<LocationType>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub area: Option<String>,
    pub postcode: Option<String>,
    #[serde(default)]
    pub delivery_options: Option<DeliveryOptionsInput>,
    #[serde(default)]
    pub delivery_areas: Vec<DeliveryAreaInput>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub metadata: Option<serde_json::Value>,
}

/// Partial location update. `parent_id: null` moves the node to the top level.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLocationRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub location_type: Option<LocationType>,
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<Uuid>>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub area: Option<String>,
    pub postcode: Option<String>,
    pub delivery_options: Option<DeliveryOptionsInput>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub metadata: Option<serde_json::Value>,
}

/// Query string for location listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationListQuery {
    #[serde(rename = "type")]
    pub location_type: Option<LocationType>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub area: Option<String>,
    pub postcode: Option<String>,
    /// `null` for top-level locations, or a parent id
    pub parent: Option<String>,
    pub has_delivery_areas: Option<bool>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Request to check delivery for a postcode
#[derive(Debug, Clone, Deserialize)]
pub struct CheckDeliveryRequest {
    pub postcode: String,
    #[serde(default)]
    pub order_amount: Option<Decimal>,
}
