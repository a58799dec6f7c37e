//! Checkout quote: delivery fee and promo discount applied to a basket subtotal.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::location::services::check_delivery_availability;
use crate::location::{DeliveryCheckResult, LocationStore};
use crate::money::{non_negative, round_money};
use crate::promo::services::quote_discount;
use crate::promo::PromoStore;

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub postcode: String,
    pub subtotal: Option<Decimal>,
    pub promo_name: Option<String>,
}

/// Payable amount for a prospective order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutQuote {
    pub subtotal: Decimal,
    pub delivery: DeliveryCheckResult,
    pub delivery_fee: Decimal,
    pub promo_name: Option<String>,
    pub discount: Decimal,
    pub promo_valid: bool,
    pub promo_message: Option<String>,
    pub total: Decimal,
}

/// Quote an order.
///
/// The delivery fee only counts when delivery is available, an invalid promo
/// contributes no discount, and the total never drops below zero.
pub async fn quote(
    locations: &dyn LocationStore,
    promos: &dyn PromoStore,
    req: QuoteRequest,
) -> Result<CheckoutQuote> {
    let subtotal = non_negative(req.subtotal);
    let delivery = check_delivery_availability(locations, &req.postcode, Some(subtotal)).await?;
    let delivery_fee = if delivery.available {
        delivery.fee
    } else {
        Decimal::ZERO
    };

    let promo_name = req
        .promo_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let (discount, promo_valid, promo_message) = match &promo_name {
        None => (Decimal::ZERO, false, None),
        Some(name) => match quote_discount(promos, name, subtotal).await? {
            Ok(discount) => (discount, true, None),
            Err(reason) => (Decimal::ZERO, false, Some(reason.to_string())),
        },
    };

    let total = round_money((subtotal + delivery_fee - discount).max(Decimal::ZERO), 2);

    Ok(CheckoutQuote {
        subtotal,
        delivery,
        delivery_fee,
        promo_name,
        discount,
        promo_valid,
        promo_message,
        total,
    })
}
