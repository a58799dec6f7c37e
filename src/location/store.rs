//! Location persistence seam.
//!
//! `PgLocationStore` (in `queries`) backs production; `InMemoryLocationStore`
//! serves tests and database-less development runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

use super::models::{DeliveryArea, Location, LocationFilter};

/// In-place edit of a location's delivery areas. Returns whether anything
/// changed; unchanged locations are not written back.
pub type AreaEdit = Box<dyn FnOnce(&mut Vec<DeliveryArea>) -> bool + Send>;

/// Storage operations needed by the location services
#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn insert(&self, location: &Location) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Location>>;

    /// Overwrite the mutable fields of an existing location, returning the
    /// stored result or `None` when no row with that id exists.
    ///
    /// `delivery_areas` keeps its stored value; areas only change through
    /// `edit_delivery_areas`.
    async fn save(&self, location: &Location) -> Result<Option<Location>>;

    /// Run `edit` against the stored delivery areas as one atomic
    /// read-modify-write, bumping `updated_at` when it reports a change.
    ///
    /// Returns the location as stored afterwards, or `None` when it does not
    /// exist.
    async fn edit_delivery_areas(&self, id: Uuid, edit: AreaEdit) -> Result<Option<Location>>;

    /// Direct children, ordered by type then name
    async fn children(&self, id: Uuid) -> Result<Vec<Location>>;

    /// Active location whose own postcode equals `postcode`
    async fn find_active_by_postcode(&self, postcode: &str) -> Result<Option<Location>>;

    /// Active location embedding an active delivery area for `postcode`
    async fn find_active_by_area_postcode(&self, postcode: &str) -> Result<Option<Location>>;

    /// One page of matching locations plus the total match count
    async fn list(&self, filter: &LocationFilter) -> Result<(Vec<Location>, i64)>;
}

/// HashMap-backed location store
#[derive(Clone, Default)]
pub struct InMemoryLocationStore {
    data: Arc<RwLock<HashMap<Uuid, Location>>>,
}

impl InMemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut locations: Vec<Location>) -> Vec<Location> {
        locations.sort_by(|a, b| {
            a.location_type
                .cmp(&b.location_type)
                .then_with(|| a.name.cmp(&b.name))
        });
        locations
    }
}

#[async_trait]
impl LocationStore for InMemoryLocationStore {
    async fn insert(&self, location: &Location) -> Result<()> {
        self.data
            .write()
            .await
            .insert(location.id, location.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Location>> {
        Ok(self.data.read().await.get(&id).cloned())
    }

    async fn save(&self, location: &Location) -> Result<Option<Location>> {
        let mut data = self.data.write().await;
        let Some(existing) = data.get_mut(&location.id) else {
            return Ok(None);
        };
        let areas = std::mem::take(&mut existing.delivery_areas);
        *existing = Location {
            delivery_areas: areas,
            ..location.clone()
        };
        Ok(Some(existing.clone()))
    }

    async fn edit_delivery_areas(&self, id: Uuid, edit: AreaEdit) -> Result<Option<Location>> {
        let mut data = self.data.write().await;
        let Some(location) = data.get_mut(&id) else {
            return Ok(None);
        };
        if edit(&mut location.delivery_areas) {
            location.updated_at = Utc::now();
        }
        Ok(Some(location.clone()))
    }

    async fn children(&self, id: Uuid) -> Result<Vec<Location>> {
        let data = self.data.read().await;
        let children = data
            .values()
            .filter(|l| l.parent_id == Some(id))
            .cloned()
            .collect();
        Ok(Self::sorted(children))
    }

    async fn find_active_by_postcode(&self, postcode: &str) -> Result<Option<Location>> {
        let data = self.data.read().await;
        let found = Self::sorted(
            data.values()
                .filter(|l| l.is_active && l.postcode.as_deref() == Some(postcode))
                .cloned()
                .collect(),
        );
        Ok(found.into_iter().next())
    }

    async fn find_active_by_area_postcode(&self, postcode: &str) -> Result<Option<Location>> {
        let data = self.data.read().await;
        let found = Self::sorted(
            data.values()
                .filter(|l| l.is_active && l.active_area(postcode).is_some())
                .cloned()
                .collect(),
        );
        Ok(found.into_iter().next())
    }

    async fn list(&self, filter: &LocationFilter) -> Result<(Vec<Location>, i64)> {
        let data = self.data.read().await;
        let matching = Self::sorted(data.values().filter(|l| filter.matches(l)).cloned().collect());
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset().max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }
}
