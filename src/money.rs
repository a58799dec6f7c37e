//! Money helpers shared by delivery, promo and checkout pricing.
//!
//! Pure functions - no database access.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Round to specified decimal places using banker's rounding (ROUND_HALF_EVEN).
///
/// Banker's rounding rounds to the nearest even number when the value is exactly
/// halfway between two possibilities. This reduces cumulative rounding bias.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use castlehire_api::money::round_money;
///
/// assert_eq!(round_money(dec!(2.5), 0), dec!(2));   // rounds to even
/// assert_eq!(round_money(dec!(3.5), 0), dec!(4));   // rounds to even
/// assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// Coerce an optional caller-supplied amount to a usable non-negative value.
///
/// Absent and negative amounts both become zero.
pub fn non_negative(amount: Option<Decimal>) -> Decimal {
    match amount {
        Some(a) if a > Decimal::ZERO => a,
        _ => Decimal::ZERO,
    }
}

/// Treat a zero or negative optional threshold as unset.
pub fn positive(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| *v > Decimal::ZERO)
}

/// Render an amount in pounds for customer-facing messages.
///
/// Whole amounts drop the pence (`£10`), anything else keeps two places (`£10.50`).
pub fn format_gbp(amount: Decimal) -> String {
    let rounded = round_money(amount, 2);
    if rounded.fract().is_zero() {
        format!("£{}", rounded.trunc().normalize())
    } else {
        format!("£{:.2}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_bankers_rounding_to_even() {
        assert_eq!(round_money(dec!(2.5), 0), dec!(2));
        assert_eq!(round_money(dec!(3.5), 0), dec!(4));
        assert_eq!(round_money(dec!(2.25), 1), dec!(2.2));
        assert_eq!(round_money(dec!(2.35), 1), dec!(2.4));
    }

    #[test]
    fn test_round_money_normal_rounding() {
        assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
        assert_eq!(round_money(dec!(1.236), 2), dec!(1.24));
        assert_eq!(round_money(dec!(999999.995), 2), dec!(1000000.00));
    }

    #[test]
    fn test_non_negative_coerces() {
        assert_eq!(non_negative(None), dec!(0));
        assert_eq!(non_negative(Some(dec!(-5))), dec!(0));
        assert_eq!(non_negative(Some(dec!(12.5))), dec!(12.5));
    }

    #[test]
    fn test_positive_treats_zero_as_unset() {
        assert_eq!(positive(Some(dec!(0))), None);
        assert_eq!(positive(None), None);
        assert_eq!(positive(Some(dec!(50))), Some(dec!(50)));
    }

    #[test]
    fn test_format_gbp() {
        assert_eq!(format_gbp(dec!(10)), "£10");
        assert_eq!(format_gbp(dec!(10.00)), "£10");
        assert_eq!(format_gbp(dec!(50.0)), "£50");
        assert_eq!(format_gbp(dec!(7.5)), "£7.50");
        assert_eq!(format_gbp(dec!(3.999)), "£4");
    }
}
