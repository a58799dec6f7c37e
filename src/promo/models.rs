//! Promo records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::money::positive;

/// How a promo's discount is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "discount_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `amount * discount_percentage / 100`, capped by `max_discount_value`
    Percentage,
    /// Flat `discount`
    FixedAmount,
    /// Flat `discount`, meant to cover delivery
    FreeShipping,
}

impl Default for DiscountType {
    fn default() -> Self {
        DiscountType::Percentage
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "promo_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PromoStatus {
    Active,
    Inactive,
    Expired,
}

impl PromoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoStatus::Active => "active",
            PromoStatus::Inactive => "inactive",
            PromoStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for PromoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive window in which a promo can be redeemed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ValidityPeriod {
    #[sqlx(rename = "validity_from")]
    pub from: DateTime<Utc>,
    #[sqlx(rename = "validity_to")]
    pub to: DateTime<Utc>,
}

impl ValidityPeriod {
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.from
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now > self.to
    }
}

/// A promo code with its redemption statistics.
///
/// `status` and `availability` are refreshed on every write; readers that
/// need the current state use [`Promo::effective_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Promo {
    pub id: Uuid,
    pub promo_name: String,
    pub discount_percentage: Decimal,
    pub discount_type: DiscountType,
    pub max_discount_value: Option<Decimal>,
    pub discount: Decimal,
    pub usage: i64,
    pub total_usage: i64,
    pub total_usage_limit: Option<i64>,
    pub total_discount: Decimal,
    pub avg_discount_per_order: Decimal,
    pub total_revenue: Decimal,
    #[sqlx(flatten)]
    pub validity_period: ValidityPeriod,
    pub minimum_order_value: Option<Decimal>,
    /// Stored and validated, not enforced at redemption
    pub usage_limit_per_customer: Option<i32>,
    pub created_on: DateTime<Utc>,
    pub status: PromoStatus,
    pub availability: bool,
    pub updated_at: DateTime<Utc>,
}

impl Promo {
    /// Usage cap, if one is set. Zero means no cap.
    pub fn usage_cap(&self) -> Option<i64> {
        self.total_usage_limit.filter(|limit| *limit > 0)
    }

    pub fn cap_reached(&self) -> bool {
        matches!(self.usage_cap(), Some(limit) if self.total_usage >= limit)
    }

    /// Status as of `now`, from the raw fields rather than the stored cache
    pub fn effective_status(&self, now: DateTime<Utc>) -> PromoStatus {
        if self.validity_period.to < now {
            PromoStatus::Expired
        } else if self.cap_reached() {
            PromoStatus::Inactive
        } else {
            self.status
        }
    }

    /// Refresh the stored status before a write.
    ///
    /// An ended window wins over a reached cap. Otherwise the status is left as
    /// the caller set it.
    pub fn refresh_status(&mut self, now: DateTime<Utc>) {
        if self.validity_period.to < now {
            self.status = PromoStatus::Expired;
            self.availability = false;
        } else if self.cap_reached() {
            self.status = PromoStatus::Inactive;
            self.availability = false;
        }
    }

    /// Minimum order value, if one is set. Zero means no minimum.
    pub fn minimum_order(&self) -> Option<Decimal> {
        positive(self.minimum_order_value)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    /// Active 10% promo, valid from yesterday for thirty days
    pub fn promo(name: &str) -> Promo {
        let now = Utc::now();
        Promo {
            id: Uuid::new_v4(),
            promo_name: name.to_string(),
            discount_percentage: dec!(10),
            discount_type: DiscountType::Percentage,
            max_discount_value: None,
            discount: dec!(0),
            usage: 0,
            total_usage: 0,
            total_usage_limit: None,
            total_discount: dec!(0),
            avg_discount_per_order: dec!(0),
            total_revenue: dec!(0),
            validity_period: ValidityPeriod {
                from: now - Duration::days(1),
                to: now + Duration::days(30),
            },
            minimum_order_value: None,
            usage_limit_per_customer: None,
            created_on: now,
            status: PromoStatus::Active,
            availability: true,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::promo;
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_zero_cap_is_no_cap() {
        let mut p = promo("SAVE10");
        p.total_usage_limit = Some(0);
        p.total_usage = 50;
        assert_eq!(p.usage_cap(), None);
        assert!(!p.cap_reached());
    }

    #[test]
    fn test_refresh_status_expired_wins() {
        let now = Utc::now();
        let mut p = promo("OLD");
        p.validity_period.to = now - Duration::days(1);
        p.total_usage_limit = Some(1);
        p.total_usage = 1;

        p.refresh_status(now);
        assert_eq!(p.status, PromoStatus::Expired);
        assert!(!p.availability);
    }

    #[test]
    fn test_refresh_status_cap_reached() {
        let now = Utc::now();
        let mut p = promo("CAPPED");
        p.total_usage_limit = Some(3);
        p.total_usage = 3;

        p.refresh_status(now);
        assert_eq!(p.status, PromoStatus::Inactive);
        assert!(!p.availability);
    }

    #[test]
    fn test_refresh_status_keeps_manual_status() {
        let mut p = promo("PAUSED");
        p.status = PromoStatus::Inactive;
        p.refresh_status(Utc::now());
        assert_eq!(p.status, PromoStatus::Inactive);
        assert!(p.availability);
    }

    #[test]
    fn test_effective_status_reads_raw_fields() {
        let now = Utc::now();
        let mut p = promo("STALE");
        p.validity_period.to = now - Duration::seconds(1);
        assert_eq!(p.status, PromoStatus::Active);
        assert_eq!(p.effective_status(now), PromoStatus::Expired);
    }

    #[test]
    fn test_serializes_nested_validity_period() {
        let p = promo("SAVE10");
        let json = serde_json::to_value(&p).unwrap();
        assert!(json["validity_period"]["from"].is_string());
        assert_eq!(json["discount_type"], "percentage");
        assert_eq!(json["status"], "active");
    }
}
