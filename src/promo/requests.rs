//! Request DTOs for promo endpoints.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::models::{DiscountType, PromoStatus};

/// Validity window input; both ends required on create, either on update
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidityPeriodInput {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePromoRequest {
    pub promo_name: Option<String>,
    pub discount_percentage: Option<Decimal>,
    pub discount_type: Option<DiscountType>,
    pub max_discount_value: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub total_usage_limit: Option<i64>,
    pub validity_period: Option<ValidityPeriodInput>,
    pub minimum_order_value: Option<Decimal>,
    pub usage_limit_per_customer: Option<i32>,
    pub status: Option<PromoStatus>,
    pub availability: Option<bool>,
}

/// Partial promo update. Redemption counters cannot be set here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePromoRequest {
    pub promo_name: Option<String>,
    pub discount_percentage: Option<Decimal>,
    pub discount_type: Option<DiscountType>,
    pub max_discount_value: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub total_usage_limit: Option<i64>,
    pub validity_period: Option<ValidityPeriodInput>,
    pub minimum_order_value: Option<Decimal>,
    pub usage_limit_per_customer: Option<i32>,
    pub status: Option<PromoStatus>,
    pub availability: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatePromoRequest {
    pub promo_name: String,
    #[serde(default)]
    pub order_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplyPromoRequest {
    #[serde(default)]
    pub order_amount: Option<Decimal>,
}
