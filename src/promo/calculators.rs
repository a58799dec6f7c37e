//! Promo eligibility and discount math.
//!
//! Pure functions over a loaded `Promo` - no store access.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::money::positive;

use super::models::{DiscountType, Promo, PromoStatus};

/// Why a promo cannot be redeemed, in gate order
#[derive(Debug, Clone, PartialEq)]
pub enum PromoRejection {
    NotFound,
    NotAvailable,
    Status(PromoStatus),
    NotStarted,
    Expired,
    MinimumOrder(Decimal),
    UsageLimitReached,
}

impl std::fmt::Display for PromoRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PromoRejection::NotFound => write!(f, "Promo not found"),
            PromoRejection::NotAvailable => write!(f, "Promo is not available"),
            PromoRejection::Status(status) => write!(f, "Promo is {}", status),
            PromoRejection::NotStarted => write!(f, "Promo not yet started"),
            PromoRejection::Expired => write!(f, "Promo has expired"),
            PromoRejection::MinimumOrder(value) => {
                write!(f, "Minimum order value {} required", value.normalize())
            }
            PromoRejection::UsageLimitReached => write!(f, "Promo usage limit reached"),
        }
    }
}

/// Outcome of a promo validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromoValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<Decimal>,
}

impl PromoValidation {
    pub fn accepted(discount: Decimal) -> Self {
        Self {
            valid: true,
            message: None,
            discount: Some(discount),
        }
    }

    pub fn rejected(reason: &PromoRejection) -> Self {
        Self {
            valid: false,
            message: Some(reason.to_string()),
            discount: None,
        }
    }
}

/// Discount for an order amount.
///
/// Fixed and free-shipping promos return the flat `discount` even when it
/// exceeds the order amount.
pub fn compute_discount(promo: &Promo, order_amount: Decimal) -> Decimal {
    match promo.discount_type {
        DiscountType::Percentage => {
            let discount = order_amount * promo.discount_percentage / Decimal::ONE_HUNDRED;
            match positive(promo.max_discount_value) {
                Some(cap) if discount > cap => cap,
                _ => discount,
            }
        }
        DiscountType::FixedAmount | DiscountType::FreeShipping => promo.discount,
    }
}

/// Run the eligibility gates; the first failing gate decides.
///
/// The status gate reads the stored status. The window and usage gates read
/// the raw fields, so a promo whose stored status went stale is still caught.
pub fn check_gates(
    promo: &Promo,
    order_amount: Decimal,
    now: DateTime<Utc>,
) -> Result<(), PromoRejection> {
    if !promo.availability {
        return Err(PromoRejection::NotAvailable);
    }
    if promo.status != PromoStatus::Active {
        return Err(PromoRejection::Status(promo.status));
    }
    if !promo.validity_period.has_started(now) {
        return Err(PromoRejection::NotStarted);
    }
    if promo.validity_period.has_ended(now) {
        return Err(PromoRejection::Expired);
    }
    if let Some(minimum) = promo.minimum_order() {
        if order_amount < minimum {
            return Err(PromoRejection::MinimumOrder(minimum));
        }
    }
    if promo.cap_reached() {
        return Err(PromoRejection::UsageLimitReached);
    }
    Ok(())
}

/// Gates plus discount for an optional promo lookup result
pub fn evaluate(
    promo: Option<&Promo>,
    order_amount: Decimal,
    now: DateTime<Utc>,
) -> Result<Decimal, PromoRejection> {
    let promo = promo.ok_or(PromoRejection::NotFound)?;
    check_gates(promo, order_amount, now)?;
    Ok(compute_discount(promo, order_amount))
}

/// Record one redemption on a promo whose cap has already been checked.
///
/// Reaching the cap switches the promo off.
pub fn record_usage(
    promo: &mut Promo,
    discount: Decimal,
    order_amount: Decimal,
    now: DateTime<Utc>,
) {
    promo.usage += 1;
    promo.total_usage += 1;
    promo.total_discount += discount;
    promo.total_revenue += order_amount;
    promo.avg_discount_per_order = promo.total_discount / Decimal::from(promo.total_usage);
    if promo.cap_reached() {
        promo.status = PromoStatus::Inactive;
        promo.availability = false;
    }
    promo.updated_at = now;
}

/// Aggregate redemption statistics across all promos
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PromoStats {
    pub total_promos: i64,
    pub total_discount_given: Decimal,
    pub total_usage: i64,
    /// Mean of each promo's own average, not a usage-weighted mean
    pub avg_discount_per_order: Decimal,
    pub active_promos: i64,
    pub expired_promos: i64,
}

pub fn aggregate_stats(promos: &[Promo], now: DateTime<Utc>) -> PromoStats {
    let mut stats = PromoStats {
        total_promos: promos.len() as i64,
        ..Default::default()
    };
    let mut avg_sum = Decimal::ZERO;

    for promo in promos {
        stats.total_discount_given += promo.total_discount;
        stats.total_usage += promo.total_usage;
        avg_sum += promo.avg_discount_per_order;
        match promo.effective_status(now) {
            PromoStatus::Active => stats.active_promos += 1,
            PromoStatus::Expired => stats.expired_promos += 1,
            PromoStatus::Inactive => {}
        }
    }

    stats.avg_discount_per_order = avg_sum / Decimal::from(stats.total_promos.max(1));
    stats
}
