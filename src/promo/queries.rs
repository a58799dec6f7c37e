//! Database queries for promos.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

use super::models::Promo;
use super::store::PromoStore;

const PROMO_COLUMNS: &str = r#"
    id, promo_name, discount_percentage, discount_type, max_discount_value,
    discount, usage, total_usage, total_usage_limit,
    total_discount, avg_discount_per_order, total_revenue,
    validity_from, validity_to,
    minimum_order_value, usage_limit_per_customer,
    created_on, status, availability, updated_at
"#;

/// Map a unique-name violation to a 409
fn name_conflict(err: sqlx::Error, name: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(format!("Promo name '{}' already exists", name))
        }
        _ => AppError::Database(err),
    }
}

pub async fn insert_promo(pool: &PgPool, promo: &Promo) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO promos (
            id, promo_name, discount_percentage, discount_type, max_discount_value,
            discount, usage, total_usage, total_usage_limit,
            total_discount, avg_discount_per_order, total_revenue,
            validity_from, validity_to,
            minimum_order_value, usage_limit_per_customer,
            created_on, status, availability, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
        "#,
    )
    .bind(promo.id)
    .bind(&promo.promo_name)
    .bind(promo.discount_percentage)
    .bind(promo.discount_type)
    .bind(promo.max_discount_value)
    .bind(promo.discount)
    .bind(promo.usage)
    .bind(promo.total_usage)
    .bind(promo.total_usage_limit)
    .bind(promo.total_discount)
    .bind(promo.avg_discount_per_order)
    .bind(promo.total_revenue)
    .bind(promo.validity_period.from)
    .bind(promo.validity_period.to)
    .bind(promo.minimum_order_value)
    .bind(promo.usage_limit_per_customer)
    .bind(promo.created_on)
    .bind(promo.status)
    .bind(promo.availability)
    .bind(promo.updated_at)
    .execute(pool)
    .await
    .map_err(|e| name_conflict(e, &promo.promo_name))?;

    Ok(())
}

pub async fn get_promo(pool: &PgPool, id: Uuid) -> Result<Option<Promo>, AppError> {
    let promo = sqlx::query_as::<_, Promo>(&format!(
        "SELECT {} FROM promos WHERE id = $1",
        PROMO_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(promo)
}

/// Exact, case-sensitive name lookup
pub async fn get_promo_by_name(pool: &PgPool, name: &str) -> Result<Option<Promo>, AppError> {
    let promo = sqlx::query_as::<_, Promo>(&format!(
        "SELECT {} FROM promos WHERE promo_name = $1",
        PROMO_COLUMNS
    ))
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(promo)
}

pub async fn list_promos(pool: &PgPool) -> Result<Vec<Promo>, AppError> {
    let promos = sqlx::query_as::<_, Promo>(&format!(
        "SELECT {} FROM promos ORDER BY created_on DESC",
        PROMO_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(promos)
}

pub async fn list_active_promos(pool: &PgPool) -> Result<Vec<Promo>, AppError> {
    let promos = sqlx::query_as::<_, Promo>(&format!(
        r#"
        SELECT {}
        FROM promos
        WHERE status = 'active'
          AND availability = true
        ORDER BY created_on DESC
        "#,
        PROMO_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(promos)
}

/// Overwrite the editable fields of a promo. Redemption counters are left
/// to `apply_promo_usage`.
pub async fn update_promo(pool: &PgPool, promo: &Promo) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE promos
        SET promo_name = $2,
            discount_percentage = $3,
            discount_type = $4,
            max_discount_value = $5,
            discount = $6,
            total_usage_limit = $7,
            validity_from = $8,
            validity_to = $9,
            minimum_order_value = $10,
            usage_limit_per_customer = $11,
            status = $12,
            availability = $13,
            updated_at = $14
        WHERE id = $1
        "#,
    )
    .bind(promo.id)
    .bind(&promo.promo_name)
    .bind(promo.discount_percentage)
    .bind(promo.discount_type)
    .bind(promo.max_discount_value)
    .bind(promo.discount)
    .bind(promo.total_usage_limit)
    .bind(promo.validity_period.from)
    .bind(promo.validity_period.to)
    .bind(promo.minimum_order_value)
    .bind(promo.usage_limit_per_customer)
    .bind(promo.status)
    .bind(promo.availability)
    .bind(promo.updated_at)
    .execute(pool)
    .await
    .map_err(|e| name_conflict(e, &promo.promo_name))?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_promo(pool: &PgPool, id: Uuid) -> Result<Option<Promo>, AppError> {
    let promo = sqlx::query_as::<_, Promo>(&format!(
        "DELETE FROM promos WHERE id = $1 RETURNING {}",
        PROMO_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(promo)
}

/// Conditional increment of the redemption counters.
///
/// The `WHERE` clause re-checks the cap inside the same statement, so two
/// concurrent redemptions can never both take the last slot.
pub async fn apply_promo_usage(
    pool: &PgPool,
    id: Uuid,
    discount: Decimal,
    order_amount: Decimal,
) -> Result<Option<Promo>, AppError> {
    let promo = sqlx::query_as::<_, Promo>(&format!(
        r#"
        UPDATE promos
        SET usage = usage + 1,
            total_usage = total_usage + 1,
            total_discount = total_discount + $2,
            total_revenue = total_revenue + $3,
            avg_discount_per_order = (total_discount + $2) / (total_usage + 1),
            status = CASE
                WHEN total_usage_limit > 0 AND total_usage + 1 >= total_usage_limit
                THEN 'inactive'::promo_status
                ELSE status
            END,
            availability = CASE
                WHEN total_usage_limit > 0 AND total_usage + 1 >= total_usage_limit
                THEN false
                ELSE availability
            END,
            updated_at = $4
        WHERE id = $1
          AND (total_usage_limit IS NULL
               OR total_usage_limit <= 0
               OR total_usage < total_usage_limit)
        RETURNING {}
        "#,
        PROMO_COLUMNS
    ))
    .bind(id)
    .bind(discount)
    .bind(order_amount)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await?;

    Ok(promo)
}

/// Postgres-backed promo store
#[derive(Clone)]
pub struct PgPromoStore {
    pool: PgPool,
}

impl PgPromoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PromoStore for PgPromoStore {
    async fn insert(&self, promo: &Promo) -> Result<(), AppError> {
        insert_promo(&self.pool, promo).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Promo>, AppError> {
        get_promo(&self.pool, id).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Promo>, AppError> {
        get_promo_by_name(&self.pool, name).await
    }

    async fn list(&self) -> Result<Vec<Promo>, AppError> {
        list_promos(&self.pool).await
    }

    async fn list_active(&self) -> Result<Vec<Promo>, AppError> {
        list_active_promos(&self.pool).await
    }

    async fn save(&self, promo: &Promo) -> Result<bool, AppError> {
        update_promo(&self.pool, promo).await
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Promo>, AppError> {
        delete_promo(&self.pool, id).await
    }

    async fn apply_usage(
        &self,
        id: Uuid,
        discount: Decimal,
        order_amount: Decimal,
    ) -> Result<Option<Promo>, AppError> {
        apply_promo_usage(&self.pool, id, discount, order_amount).await
    }
}
