//! Promo service functions with store access.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, FieldError, Result};
use crate::money::non_negative;

use super::calculators::{self, PromoRejection, PromoStats, PromoValidation};
use super::models::{Promo, PromoStatus, ValidityPeriod};
use super::requests::{CreatePromoRequest, UpdatePromoRequest};
use super::store::PromoStore;

/// Result of a promo redemption
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromoApplication {
    pub success: bool,
    pub discount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo: Option<Promo>,
}

impl PromoApplication {
    fn rejected(reason: PromoRejection) -> Self {
        Self {
            success: false,
            discount: Decimal::ZERO,
            message: Some(reason.to_string()),
            promo: None,
        }
    }
}

fn check_percentage(errors: &mut Vec<FieldError>, value: Option<Decimal>) {
    if matches!(value, Some(v) if v < Decimal::ZERO || v > Decimal::ONE_HUNDRED) {
        errors.push(FieldError::new(
            "discount_percentage",
            "Discount percentage must be between 0 and 100",
        ));
    }
}

fn check_non_negative(errors: &mut Vec<FieldError>, field: &str, value: Option<Decimal>) {
    if matches!(value, Some(v) if v < Decimal::ZERO) {
        errors.push(FieldError::new(field, format!("{} cannot be negative", field)));
    }
}

fn check_limits(
    errors: &mut Vec<FieldError>,
    total_usage_limit: Option<i64>,
    usage_limit_per_customer: Option<i32>,
) {
    if matches!(total_usage_limit, Some(v) if v < 0) {
        errors.push(FieldError::new(
            "total_usage_limit",
            "total_usage_limit cannot be negative",
        ));
    }
    if matches!(usage_limit_per_customer, Some(v) if v < 1) {
        errors.push(FieldError::new(
            "usage_limit_per_customer",
            "usage_limit_per_customer must be at least 1",
        ));
    }
}

fn check_window(errors: &mut Vec<FieldError>, from: DateTime<Utc>, to: DateTime<Utc>) {
    if from > to {
        errors.push(FieldError::new(
            "validity_period",
            "Validity period must start before it ends",
        ));
    }
}

/// Create a promo. Names are unique.
pub async fn create_promo(store: &dyn PromoStore, req: CreatePromoRequest) -> Result<Promo> {
    let mut errors = Vec::new();

    let promo_name = req
        .promo_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if promo_name.is_none() {
        errors.push(FieldError::new("promo_name", "Promo name is required"));
    }
    if req.discount_percentage.is_none() {
        errors.push(FieldError::new(
            "discount_percentage",
            "Discount percentage is required",
        ));
    }
    check_percentage(&mut errors, req.discount_percentage);
    if req.discount.is_none() {
        errors.push(FieldError::new("discount", "Discount is required"));
    }
    check_non_negative(&mut errors, "discount", req.discount);
    check_non_negative(&mut errors, "max_discount_value", req.max_discount_value);
    check_non_negative(&mut errors, "minimum_order_value", req.minimum_order_value);
    check_limits(&mut errors, req.total_usage_limit, req.usage_limit_per_customer);

    let window = req.validity_period.unwrap_or_default();
    match (window.from, window.to) {
        (Some(from), Some(to)) => check_window(&mut errors, from, to),
        _ => errors.push(FieldError::new(
            "validity_period",
            "Validity period start and end are required",
        )),
    }

    let (Some(promo_name), Some(discount_percentage), Some(discount), Some(from), Some(to)) = (
        promo_name,
        req.discount_percentage,
        req.discount,
        window.from,
        window.to,
    ) else {
        return Err(AppError::validation(errors));
    };
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    if store.find_by_name(&promo_name).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Promo name '{}' already exists",
            promo_name
        )));
    }

    let now = Utc::now();
    let mut promo = Promo {
        id: Uuid::new_v4(),
        promo_name,
        discount_percentage,
        discount_type: req.discount_type.unwrap_or_default(),
        max_discount_value: req.max_discount_value,
        discount,
        usage: 0,
        total_usage: 0,
        total_usage_limit: req.total_usage_limit,
        total_discount: Decimal::ZERO,
        avg_discount_per_order: Decimal::ZERO,
        total_revenue: Decimal::ZERO,
        validity_period: ValidityPeriod { from, to },
        minimum_order_value: req.minimum_order_value,
        usage_limit_per_customer: req.usage_limit_per_customer,
        created_on: now,
        status: req.status.unwrap_or(PromoStatus::Active),
        availability: req.availability.unwrap_or(true),
        updated_at: now,
    };
    promo.refresh_status(now);

    store.insert(&promo).await?;
    info!("Created promo {} ({})", promo.promo_name, promo.id);
    Ok(promo)
}

/// All promos, newest first
pub async fn get_all_promos(store: &dyn PromoStore) -> Result<Vec<Promo>> {
    store.list().await
}

/// Promos currently marked active and available
pub async fn get_active_promos(store: &dyn PromoStore) -> Result<Vec<Promo>> {
    store.list_active().await
}

pub async fn get_promo(store: &dyn PromoStore, id: Uuid) -> Result<Option<Promo>> {
    store.get(id).await
}

/// Apply the given fields and refresh the stored status
pub async fn update_promo(
    store: &dyn PromoStore,
    id: Uuid,
    req: UpdatePromoRequest,
) -> Result<Option<Promo>> {
    let Some(mut promo) = store.get(id).await? else {
        return Ok(None);
    };

    let mut errors = Vec::new();
    let promo_name = req.promo_name.map(|n| n.trim().to_string());
    if matches!(&promo_name, Some(n) if n.is_empty()) {
        errors.push(FieldError::new("promo_name", "Promo name is required"));
    }
    check_percentage(&mut errors, req.discount_percentage);
    check_non_negative(&mut errors, "discount", req.discount);
    check_non_negative(&mut errors, "max_discount_value", req.max_discount_value);
    check_non_negative(&mut errors, "minimum_order_value", req.minimum_order_value);
    check_limits(&mut errors, req.total_usage_limit, req.usage_limit_per_customer);

    let window = req.validity_period.unwrap_or_default();
    let from = window.from.unwrap_or(promo.validity_period.from);
    let to = window.to.unwrap_or(promo.validity_period.to);
    check_window(&mut errors, from, to);

    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    if let Some(name) = promo_name.filter(|n| *n != promo.promo_name) {
        if store.find_by_name(&name).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Promo name '{}' already exists",
                name
            )));
        }
        promo.promo_name = name;
    }
    if let Some(v) = req.discount_percentage {
        promo.discount_percentage = v;
    }
    if let Some(v) = req.discount_type {
        promo.discount_type = v;
    }
    if req.max_discount_value.is_some() {
        promo.max_discount_value = req.max_discount_value;
    }
    if let Some(v) = req.discount {
        promo.discount = v;
    }
    if req.total_usage_limit.is_some() {
        promo.total_usage_limit = req.total_usage_limit;
    }
    promo.validity_period = ValidityPeriod { from, to };
    if req.minimum_order_value.is_some() {
        promo.minimum_order_value = req.minimum_order_value;
    }
    if req.usage_limit_per_customer.is_some() {
        promo.usage_limit_per_customer = req.usage_limit_per_customer;
    }
    if let Some(v) = req.status {
        promo.status = v;
    }
    if let Some(v) = req.availability {
        promo.availability = v;
    }

    let now = Utc::now();
    promo.refresh_status(now);
    promo.updated_at = now;

    if !store.save(&promo).await? {
        return Ok(None);
    }
    Ok(Some(promo))
}

/// Hard delete
pub async fn delete_promo(store: &dyn PromoStore, id: Uuid) -> Result<Option<Promo>> {
    let deleted = store.delete(id).await?;
    if let Some(promo) = &deleted {
        info!("Deleted promo {} ({})", promo.promo_name, promo.id);
    }
    Ok(deleted)
}

/// Check a promo against an order without recording anything
pub async fn validate_promo(
    store: &dyn PromoStore,
    promo_name: &str,
    order_amount: Option<Decimal>,
) -> Result<PromoValidation> {
    let amount = non_negative(order_amount);
    let promo = store.find_by_name(promo_name.trim()).await?;

    let validation = match calculators::evaluate(promo.as_ref(), amount, Utc::now()) {
        Ok(discount) => PromoValidation::accepted(discount),
        Err(reason) => {
            debug!("Promo {} rejected: {}", promo_name, reason);
            PromoValidation::rejected(&reason)
        }
    };
    Ok(validation)
}

async fn find_by_identifier(store: &dyn PromoStore, identifier: &str) -> Result<Option<Promo>> {
    let identifier = identifier.trim();
    match Uuid::parse_str(identifier) {
        Ok(id) => store.get(id).await,
        Err(_) => store.find_by_name(identifier).await,
    }
}

/// Redeem a promo, identified by id or by name.
///
/// Runs the same gates as validation, then records the redemption in one
/// atomic store operation. Losing a race for the last slot under the usage
/// cap is reported like any other rejection.
pub async fn apply_promo(
    store: &dyn PromoStore,
    identifier: &str,
    order_amount: Option<Decimal>,
) -> Result<PromoApplication> {
    let amount = non_negative(order_amount);
    let Some(promo) = find_by_identifier(store, identifier).await? else {
        return Ok(PromoApplication::rejected(PromoRejection::NotFound));
    };

    if let Err(reason) = calculators::check_gates(&promo, amount, Utc::now()) {
        return Ok(PromoApplication::rejected(reason));
    }
    let discount = calculators::compute_discount(&promo, amount);

    let Some(updated) = store.apply_usage(promo.id, discount, amount).await? else {
        warn!("Promo {} hit its usage limit during apply", promo.promo_name);
        return Ok(PromoApplication::rejected(
            PromoRejection::UsageLimitReached,
        ));
    };

    info!(
        "Applied promo {} to order of {}: discount {}",
        updated.promo_name, amount, discount
    );
    Ok(PromoApplication {
        success: true,
        discount,
        message: None,
        promo: Some(updated),
    })
}

/// Aggregate statistics; active/expired counts use the status as of now
pub async fn get_promo_stats(store: &dyn PromoStore) -> Result<PromoStats> {
    let promos = store.list().await?;
    Ok(calculators::aggregate_stats(&promos, Utc::now()))
}

/// Discount a promo would give, or the rejection reason. Used by checkout.
pub async fn quote_discount(
    store: &dyn PromoStore,
    promo_name: &str,
    order_amount: Decimal,
) -> Result<std::result::Result<Decimal, PromoRejection>> {
    let promo = store.find_by_name(promo_name.trim()).await?;
    Ok(calculators::evaluate(promo.as_ref(), order_amount, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promo::models::DiscountType;
    use crate::promo::requests::ValidityPeriodInput;
    use crate::promo::store::InMemoryPromoStore;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn save10_request() -> CreatePromoRequest {
        let now = Utc::now();
        CreatePromoRequest {
            promo_name: Some("SAVE10".to_string()),
            discount_percentage: Some(dec!(10)),
            discount_type: Some(DiscountType::Percentage),
            max_discount_value: Some(dec!(20)),
            discount: Some(dec!(0)),
            validity_period: Some(ValidityPeriodInput {
                from: Some(now - Duration::days(1)),
                to: Some(now + Duration::days(30)),
            }),
            minimum_order_value: Some(dec!(50)),
            ..Default::default()
        }
    }

    // ==== create tests ====

    #[tokio::test]
    async fn test_create_promo_defaults() {
        let store = InMemoryPromoStore::new();
        let promo = create_promo(&store, save10_request()).await.unwrap();

        assert_eq!(promo.status, PromoStatus::Active);
        assert!(promo.availability);
        assert_eq!(promo.total_usage, 0);
        assert_eq!(promo.discount_type, DiscountType::Percentage);
    }

    #[tokio::test]
    async fn test_create_promo_duplicate_name_conflicts() {
        let store = InMemoryPromoStore::new();
        create_promo(&store, save10_request()).await.unwrap();

        let mut again = save10_request();
        again.promo_name = Some("  SAVE10 ".to_string());
        let err = create_promo(&store, again).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_create_promo_validates_fields() {
        let store = InMemoryPromoStore::new();
        let now = Utc::now();
        let req = CreatePromoRequest {
            promo_name: Some("BAD".to_string()),
            discount_percentage: Some(dec!(150)),
            discount: Some(dec!(-1)),
            usage_limit_per_customer: Some(0),
            validity_period: Some(ValidityPeriodInput {
                from: Some(now + Duration::days(2)),
                to: Some(now),
            }),
            ..Default::default()
        };

        let AppError::Validation { errors, .. } = create_promo(&store, req).await.unwrap_err()
        else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "discount_percentage",
                "discount",
                "usage_limit_per_customer",
                "validity_period"
            ]
        );
    }

    #[tokio::test]
    async fn test_create_promo_with_past_window_is_expired() {
        let store = InMemoryPromoStore::new();
        let now = Utc::now();
        let mut req = save10_request();
        req.validity_period = Some(ValidityPeriodInput {
            from: Some(now - Duration::days(10)),
            to: Some(now - Duration::days(1)),
        });

        let promo = create_promo(&store, req).await.unwrap();
        assert_eq!(promo.status, PromoStatus::Expired);
        assert!(!promo.availability);
        assert!(get_active_promos(&store).await.unwrap().is_empty());
    }

    // ==== validate / apply tests ====

    #[tokio::test]
    async fn test_validate_save10() {
        let store = InMemoryPromoStore::new();
        create_promo(&store, save10_request()).await.unwrap();

        let result = validate_promo(&store, "SAVE10", Some(dec!(300))).await.unwrap();
        assert!(result.valid);
        assert_eq!(result.discount, Some(dec!(20)));

        let below = validate_promo(&store, "SAVE10", Some(dec!(40))).await.unwrap();
        assert_eq!(below.message.as_deref(), Some("Minimum order value 50 required"));

        let missing = validate_promo(&store, "NOPE", Some(dec!(300))).await.unwrap();
        assert_eq!(missing.message.as_deref(), Some("Promo not found"));
    }

    #[tokio::test]
    async fn test_validate_does_not_mutate() {
        let store = InMemoryPromoStore::new();
        let promo = create_promo(&store, save10_request()).await.unwrap();

        validate_promo(&store, "SAVE10", Some(dec!(300))).await.unwrap();
        validate_promo(&store, "SAVE10", Some(dec!(300))).await.unwrap();

        let stored = get_promo(&store, promo.id).await.unwrap().unwrap();
        assert_eq!(stored, promo);
    }

    #[tokio::test]
    async fn test_validate_expired_with_stale_status() {
        let store = InMemoryPromoStore::new();
        let mut promo = create_promo(&store, save10_request()).await.unwrap();
        // Window closed after the last write; stored status is still active
        promo.validity_period.to = Utc::now() - Duration::seconds(1);
        store.save(&promo).await.unwrap();

        let result = validate_promo(&store, "SAVE10", Some(dec!(300))).await.unwrap();
        assert!(!result.valid);
        assert_eq!(result.message.as_deref(), Some("Promo has expired"));
    }

    #[tokio::test]
    async fn test_apply_twice_accumulates_stats() {
        let store = InMemoryPromoStore::new();
        let promo = create_promo(&store, save10_request()).await.unwrap();

        let first = apply_promo(&store, "SAVE10", Some(dec!(300))).await.unwrap();
        let second = apply_promo(&store, &promo.id.to_string(), Some(dec!(300)))
            .await
            .unwrap();
        assert!(first.success && second.success);
        assert_eq!(first.discount, dec!(20));

        let stored = get_promo(&store, promo.id).await.unwrap().unwrap();
        assert_eq!(stored.total_usage, 2);
        assert_eq!(stored.usage, 2);
        assert_eq!(stored.total_discount, dec!(40));
        assert_eq!(stored.total_revenue, dec!(600));
        assert_eq!(stored.avg_discount_per_order, dec!(20));
    }

    #[tokio::test]
    async fn test_apply_rejections() {
        let store = InMemoryPromoStore::new();
        create_promo(&store, save10_request()).await.unwrap();

        let missing = apply_promo(&store, "NOPE", Some(dec!(300))).await.unwrap();
        assert!(!missing.success);
        assert_eq!(missing.message.as_deref(), Some("Promo not found"));

        let unknown_id = apply_promo(&store, &Uuid::new_v4().to_string(), Some(dec!(300)))
            .await
            .unwrap();
        assert_eq!(unknown_id.message.as_deref(), Some("Promo not found"));

        let below = apply_promo(&store, "SAVE10", Some(dec!(10))).await.unwrap();
        assert!(!below.success);
        assert_eq!(below.discount, dec!(0));
    }

    #[tokio::test]
    async fn test_apply_closes_promo_at_cap() {
        let store = InMemoryPromoStore::new();
        let mut req = save10_request();
        req.total_usage_limit = Some(2);
        let promo = create_promo(&store, req).await.unwrap();

        assert!(apply_promo(&store, "SAVE10", Some(dec!(100))).await.unwrap().success);
        assert!(apply_promo(&store, "SAVE10", Some(dec!(100))).await.unwrap().success);

        let third = apply_promo(&store, "SAVE10", Some(dec!(100))).await.unwrap();
        assert!(!third.success);
        assert_eq!(third.message.as_deref(), Some("Promo is not available"));

        let stored = get_promo(&store, promo.id).await.unwrap().unwrap();
        assert_eq!(stored.total_usage, 2);
        assert_eq!(stored.status, PromoStatus::Inactive);
    }

    // ==== update / delete / stats tests ====

    #[tokio::test]
    async fn test_update_promo_partial_and_refreshes_status() {
        let store = InMemoryPromoStore::new();
        let promo = create_promo(&store, save10_request()).await.unwrap();

        let updated = update_promo(
            &store,
            promo.id,
            UpdatePromoRequest {
                max_discount_value: Some(dec!(25)),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.max_discount_value, Some(dec!(25)));
        assert_eq!(updated.minimum_order_value, Some(dec!(50)));

        let expired = update_promo(
            &store,
            promo.id,
            UpdatePromoRequest {
                validity_period: Some(ValidityPeriodInput {
                    from: Some(Utc::now() - Duration::days(5)),
                    to: Some(Utc::now() - Duration::days(1)),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(expired.status, PromoStatus::Expired);

        let missing = update_promo(&store, Uuid::new_v4(), UpdatePromoRequest::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_update_promo_rename_conflict() {
        let store = InMemoryPromoStore::new();
        create_promo(&store, save10_request()).await.unwrap();
        let mut other = save10_request();
        other.promo_name = Some("SUMMER".to_string());
        let summer = create_promo(&store, other).await.unwrap();

        let err = update_promo(
            &store,
            summer.id,
            UpdatePromoRequest {
                promo_name: Some("SAVE10".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_promo() {
        let store = InMemoryPromoStore::new();
        let promo = create_promo(&store, save10_request()).await.unwrap();

        assert!(delete_promo(&store, promo.id).await.unwrap().is_some());
        assert!(get_promo(&store, promo.id).await.unwrap().is_none());
        assert!(delete_promo(&store, promo.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_promo_stats() {
        let store = InMemoryPromoStore::new();
        create_promo(&store, save10_request()).await.unwrap();
        let mut expired = save10_request();
        expired.promo_name = Some("OLD".to_string());
        expired.validity_period = Some(ValidityPeriodInput {
            from: Some(Utc::now() - Duration::days(10)),
            to: Some(Utc::now() - Duration::days(1)),
        });
        create_promo(&store, expired).await.unwrap();
        apply_promo(&store, "SAVE10", Some(dec!(300))).await.unwrap();

        let stats = get_promo_stats(&store).await.unwrap();
        assert_eq!(stats.total_promos, 2);
        assert_eq!(stats.total_usage, 1);
        assert_eq!(stats.total_discount_given, dec!(20));
        assert_eq!(stats.avg_discount_per_order, dec!(10));
        assert_eq!(stats.active_promos, 1);
        assert_eq!(stats.expired_promos, 1);
    }
}
