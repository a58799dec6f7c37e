//! Delivery resolution rules.
//!
//! Pure functions - the store lookups happen in `services`.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::money::format_gbp;

use super::models::{DeliveryArea, DeliveryOptions, Location, LocationSummary};

pub const NOT_AVAILABLE_MESSAGE: &str = "Delivery not available for this postcode.";

/// Normalize a postcode for storage and lookup: trimmed, uppercase.
///
/// No format validation is performed; a malformed postcode simply never matches.
pub fn normalize_postcode(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Delivery policy that produced a result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum MatchedDelivery {
    /// The location's own default options (its postcode matched)
    DeliveryOptions(DeliveryOptions),
    /// An embedded postcode-level area
    DeliveryArea(DeliveryArea),
}

/// Outcome of a delivery availability check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryCheckResult {
    pub available: bool,
    pub postcode: String,
    pub location: Option<LocationSummary>,
    pub delivery: Option<MatchedDelivery>,
    #[serde(with = "rust_decimal::serde::str")]
    pub fee: Decimal,
    pub is_free: bool,
    pub min_order_met: bool,
    pub estimated_time: Option<i32>,
    pub message: String,
}

impl DeliveryCheckResult {
    /// Nothing matched the postcode
    pub fn not_available(postcode: &str) -> Self {
        Self {
            available: false,
            postcode: postcode.to_string(),
            location: None,
            delivery: None,
            fee: Decimal::ZERO,
            is_free: false,
            min_order_met: false,
            estimated_time: None,
            message: NOT_AVAILABLE_MESSAGE.to_string(),
        }
    }
}

fn quote_message(enabled: bool, min_order_met: bool, min_order: Decimal, fee: Decimal) -> String {
    if !enabled {
        NOT_AVAILABLE_MESSAGE.to_string()
    } else if !min_order_met {
        format!("Minimum order {} required", format_gbp(min_order))
    } else if fee.is_zero() {
        "Delivery available. Free delivery".to_string()
    } else {
        format!("Delivery available. Fee: {}", format_gbp(fee))
    }
}

/// Quote from a location whose own postcode matched
pub fn evaluate_location_options(
    location: &Location,
    postcode: &str,
    order_amount: Decimal,
) -> DeliveryCheckResult {
    let options = &location.delivery_options;
    let min_order_met = order_amount >= options.min_order;
    let fee = if options.is_free { Decimal::ZERO } else { options.fee };

    DeliveryCheckResult {
        available: options.is_available && min_order_met,
        postcode: postcode.to_string(),
        location: Some(location.summary()),
        delivery: Some(MatchedDelivery::DeliveryOptions(options.clone())),
        fee,
        is_free: options.is_free,
        min_order_met,
        estimated_time: Some(options.estimated_time),
        message: quote_message(options.is_available, min_order_met, options.min_order, fee),
    }
}

/// Quote from an embedded delivery area
pub fn evaluate_delivery_area(
    location: &Location,
    area: &DeliveryArea,
    order_amount: Decimal,
) -> DeliveryCheckResult {
    let min_order_met = order_amount >= area.min_order;
    let fee = if area.is_free { Decimal::ZERO } else { area.delivery_fee };

    DeliveryCheckResult {
        available: min_order_met,
        postcode: area.postcode.clone(),
        location: Some(location.summary()),
        delivery: Some(MatchedDelivery::DeliveryArea(area.clone())),
        fee,
        is_free: area.is_free,
        min_order_met,
        estimated_time: Some(area.estimated_time),
        message: quote_message(true, min_order_met, area.min_order, fee),
    }
}

/// Resolve delivery for a normalized postcode given the two candidate lookups.
///
/// A location matching on its own postcode always wins over an area match.
pub fn resolve(
    postcode: &str,
    own_match: Option<&Location>,
    area_match: Option<&Location>,
    order_amount: Decimal,
) -> DeliveryCheckResult {
    if let Some(location) = own_match {
        return evaluate_location_options(location, postcode, order_amount);
    }
    if let Some(location) = area_match {
        if let Some(area) = location.active_area(postcode) {
            return evaluate_delivery_area(location, area, order_amount);
        }
    }
    DeliveryCheckResult::not_available(postcode)
}

/// True when `node` appears in the ancestor chain of a prospective parent,
/// i.e. re-parenting would make `node` its own ancestor.
pub fn creates_cycle(node: uuid::Uuid, parent_chain: &[uuid::Uuid]) -> bool {
    parent_chain.contains(&node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::models::fixtures::{area, location};
    use crate::location::models::LocationType;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sw1a() -> Location {
        let mut loc = location("Westminster", LocationType::Postcode);
        loc.postcode = Some("SW1A1AA".to_string());
        loc.state = Some("Greater London".to_string());
        loc.city = Some("London".to_string());
        loc.delivery_options = DeliveryOptions {
            is_available: true,
            is_free: false,
            fee: dec!(10),
            min_order: dec!(50),
            ..DeliveryOptions::default()
        };
        loc
    }

    #[test]
    fn test_normalize_postcode() {
        assert_eq!(normalize_postcode(" sw1a1aa "), "SW1A1AA");
        assert_eq!(normalize_postcode("rm9"), "RM9");
        assert_eq!(normalize_postcode("not-a-postcode!"), "NOT-A-POSTCODE!");
    }

    #[test]
    fn test_location_options_above_minimum() {
        let loc = sw1a();
        let result = resolve("SW1A1AA", Some(&loc), None, dec!(60));

        assert!(result.available);
        assert!(result.min_order_met);
        assert_eq!(result.fee, dec!(10));
        assert!(result.message.contains("£10"));
        let summary = result.location.unwrap();
        assert_eq!(summary.name, "Westminster");
        assert_eq!(summary.city.as_deref(), Some("London"));
    }

    #[test]
    fn test_location_options_below_minimum() {
        let loc = sw1a();
        let result = resolve("SW1A1AA", Some(&loc), None, dec!(40));

        assert!(!result.available);
        assert!(!result.min_order_met);
        assert_eq!(result.message, "Minimum order £50 required");
    }

    #[test]
    fn test_minimum_is_inclusive() {
        let loc = sw1a();
        assert!(resolve("SW1A1AA", Some(&loc), None, dec!(50)).available);
        assert!(!resolve("SW1A1AA", Some(&loc), None, dec!(49.99)).available);
    }

    #[test]
    fn test_free_options_report_zero_fee() {
        let mut loc = sw1a();
        loc.delivery_options.is_free = true;
        let result = resolve("SW1A1AA", Some(&loc), None, dec!(60));

        assert!(result.available);
        assert_eq!(result.fee, dec!(0));
        assert_eq!(result.message, "Delivery available. Free delivery");
    }

    #[test]
    fn test_options_switched_off() {
        let mut loc = sw1a();
        loc.delivery_options.is_available = false;
        let result = resolve("SW1A1AA", Some(&loc), None, dec!(500));

        assert!(!result.available);
        assert!(result.min_order_met);
        assert_eq!(result.message, NOT_AVAILABLE_MESSAGE);
    }

    #[test]
    fn test_own_postcode_preferred_over_area() {
        let own = sw1a();
        let mut other = location("Central Zone", LocationType::Area);
        other.delivery_areas.push(area("SW1A1AA", dec!(0), dec!(0)));

        let result = resolve("SW1A1AA", Some(&own), Some(&other), dec!(60));

        assert_eq!(result.location.unwrap().name, "Westminster");
        assert!(matches!(
            result.delivery,
            Some(MatchedDelivery::DeliveryOptions(_))
        ));
        assert_eq!(result.fee, dec!(10));
    }

    #[test]
    fn test_area_match() {
        let mut loc = location("Dagenham", LocationType::Area);
        loc.delivery_areas.push(area("RM9", dec!(15), dec!(100)));

        let result = resolve("RM9", None, Some(&loc), dec!(120));
        assert!(result.available);
        assert_eq!(result.fee, dec!(15));
        assert_eq!(result.message, "Delivery available. Fee: £15");
        assert!(matches!(result.delivery, Some(MatchedDelivery::DeliveryArea(_))));

        let result = resolve("RM9", None, Some(&loc), dec!(99));
        assert!(!result.available);
        assert_eq!(result.message, "Minimum order £100 required");
    }

    #[test]
    fn test_area_marked_free_ignores_fee() {
        let mut loc = location("Dagenham", LocationType::Area);
        let mut free = area("RM10", dec!(15), dec!(0));
        free.is_free = true;
        loc.delivery_areas.push(free);

        let result = resolve("RM10", None, Some(&loc), dec!(0));
        assert!(result.available);
        assert_eq!(result.fee, dec!(0));
    }

    #[test]
    fn test_no_match() {
        let result = resolve("ZZ99", None, None, dec!(1000));
        assert!(!result.available);
        assert!(result.location.is_none());
        assert_eq!(result.message, NOT_AVAILABLE_MESSAGE);
    }

    #[test]
    fn test_result_serializes_matched_policy_with_source_tag() {
        let loc = sw1a();
        let result = resolve("SW1A1AA", Some(&loc), None, dec!(60));
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["delivery"]["source"], "delivery_options");
        assert_eq!(json["fee"], "10");
        assert_eq!(json["location"]["type"], "postcode");
    }

    #[test]
    fn test_creates_cycle() {
        let node = Uuid::new_v4();
        let parent = Uuid::new_v4();
        let grandparent = Uuid::new_v4();
        assert!(!creates_cycle(node, &[parent, grandparent]));
        assert!(creates_cycle(node, &[parent, node]));
    }
}
