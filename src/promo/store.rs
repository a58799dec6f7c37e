//! Promo persistence seam.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, Result};

use super::calculators::record_usage;
use super::models::{Promo, PromoStatus};

#[async_trait]
pub trait PromoStore: Send + Sync {
    /// Insert a new promo. A taken `promo_name` is a `Conflict`.
    async fn insert(&self, promo: &Promo) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Promo>>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Promo>>;

    /// All promos, newest first
    async fn list(&self) -> Result<Vec<Promo>>;

    /// Promos stored as active and available
    async fn list_active(&self) -> Result<Vec<Promo>>;

    /// Overwrite the editable fields of an existing promo; `false` when it
    /// does not exist.
    ///
    /// Redemption counters (`usage`, `total_usage`, `total_discount`,
    /// `avg_discount_per_order`, `total_revenue`) are owned by `apply_usage`
    /// and keep their stored values, so saving a stale copy cannot undo a
    /// redemption.
    async fn save(&self, promo: &Promo) -> Result<bool>;

    /// Hard delete, returning the removed promo
    async fn delete(&self, id: Uuid) -> Result<Option<Promo>>;

    /// Record one redemption in a single atomic step.
    ///
    /// Applies only while the usage cap (if any) has room; returns `None`
    /// when the cap was reached first or the promo is gone.
    async fn apply_usage(
        &self,
        id: Uuid,
        discount: Decimal,
        order_amount: Decimal,
    ) -> Result<Option<Promo>>;
}

/// HashMap-backed promo store
#[derive(Clone, Default)]
pub struct InMemoryPromoStore {
    data: Arc<RwLock<HashMap<Uuid, Promo>>>,
}

impl InMemoryPromoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut promos: Vec<Promo>) -> Vec<Promo> {
    promos.sort_by(|a, b| b.created_on.cmp(&a.created_on));
    promos
}

fn name_taken(name: &str) -> AppError {
    AppError::Conflict(format!("Promo name '{}' already exists", name))
}

#[async_trait]
impl PromoStore for InMemoryPromoStore {
    async fn insert(&self, promo: &Promo) -> Result<()> {
        let mut data = self.data.write().await;
        if data.values().any(|p| p.promo_name == promo.promo_name) {
            return Err(name_taken(&promo.promo_name));
        }
        data.insert(promo.id, promo.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Promo>> {
        Ok(self.data.read().await.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Promo>> {
        let data = self.data.read().await;
        Ok(data.values().find(|p| p.promo_name == name).cloned())
    }

    async fn list(&self) -> Result<Vec<Promo>> {
        let data = self.data.read().await;
        Ok(newest_first(data.values().cloned().collect()))
    }

    async fn list_active(&self) -> Result<Vec<Promo>> {
        let data = self.data.read().await;
        Ok(newest_first(
            data.values()
                .filter(|p| p.status == PromoStatus::Active && p.availability)
                .cloned()
                .collect(),
        ))
    }

    async fn save(&self, promo: &Promo) -> Result<bool> {
        let mut data = self.data.write().await;
        if data
            .values()
            .any(|p| p.id != promo.id && p.promo_name == promo.promo_name)
        {
            return Err(name_taken(&promo.promo_name));
        }
        match data.get_mut(&promo.id) {
            Some(existing) => {
                let mut updated = promo.clone();
                updated.usage = existing.usage;
                updated.total_usage = existing.total_usage;
                updated.total_discount = existing.total_discount;
                updated.avg_discount_per_order = existing.avg_discount_per_order;
                updated.total_revenue = existing.total_revenue;
                *existing = updated;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Promo>> {
        Ok(self.data.write().await.remove(&id))
    }

    async fn apply_usage(
        &self,
        id: Uuid,
        discount: Decimal,
        order_amount: Decimal,
    ) -> Result<Option<Promo>> {
        let mut data = self.data.write().await;
        let Some(promo) = data.get_mut(&id) else {
            return Ok(None);
        };
        if promo.cap_reached() {
            return Ok(None);
        }
        record_usage(promo, discount, order_amount, Utc::now());
        Ok(Some(promo.clone()))
    }
}
