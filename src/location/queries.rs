//! Database queries for locations.
//!
//! Embedded delivery areas and options are JSONB columns. A location is read
//! as a whole document; delivery area edits lock the row for their
//! read-modify-write.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::AppError;

use super::models::{Location, LocationFilter, ParentFilter};
use super::store::{AreaEdit, LocationStore};

const LOCATION_COLUMNS: &str = r#"
    id, name, location_type, parent_id,
    country, state, city, area, postcode,
    delivery_areas, delivery_options,
    description, is_active, metadata,
    created_at, updated_at
"#;

/// Insert a new location
pub async fn insert_location(pool: &PgPool, location: &Location) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO locations (
            id, name, location_type, parent_id,
            country, state, city, area, postcode,
            delivery_areas, delivery_options,
            description, is_active, metadata,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        "#,
    )
    .bind(location.id)
    .bind(&location.name)
    .bind(location.location_type)
    .bind(location.parent_id)
    .bind(&location.country)
    .bind(&location.state)
    .bind(&location.city)
    .bind(&location.area)
    .bind(&location.postcode)
    .bind(Json(&location.delivery_areas))
    .bind(Json(&location.delivery_options))
    .bind(&location.description)
    .bind(location.is_active)
    .bind(&location.metadata)
    .bind(location.created_at)
    .bind(location.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a location by id
pub async fn get_location(pool: &PgPool, id: Uuid) -> Result<Option<Location>, AppError> {
    let location = sqlx::query_as::<_, Location>(&format!(
        "SELECT {} FROM locations WHERE id = $1",
        LOCATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(location)
}

/// Overwrite a location's fields other than its delivery areas
pub async fn update_location(
    pool: &PgPool,
    location: &Location,
) -> Result<Option<Location>, AppError> {
    let updated = sqlx::query_as::<_, Location>(&format!(
        r#"
        UPDATE locations
        SET name = $2,
            location_type = $3,
            parent_id = $4,
            country = $5,
            state = $6,
            city = $7,
            area = $8,
            postcode = $9,
            delivery_options = $10,
            description = $11,
            is_active = $12,
            metadata = $13,
            updated_at = $14
        WHERE id = $1
        RETURNING {}
        "#,
        LOCATION_COLUMNS
    ))
    .bind(location.id)
    .bind(&location.name)
    .bind(location.location_type)
    .bind(location.parent_id)
    .bind(&location.country)
    .bind(&location.state)
    .bind(&location.city)
    .bind(&location.area)
    .bind(&location.postcode)
    .bind(Json(&location.delivery_options))
    .bind(&location.description)
    .bind(location.is_active)
    .bind(&location.metadata)
    .bind(location.updated_at)
    .fetch_optional(pool)
    .await?;

    Ok(updated)
}

/// Edit the delivery areas of a locked row inside one transaction
pub async fn edit_delivery_areas(
    pool: &PgPool,
    id: Uuid,
    edit: AreaEdit,
) -> Result<Option<Location>, AppError> {
    let mut tx = pool.begin().await?;

    let location = sqlx::query_as::<_, Location>(&format!(
        "SELECT {} FROM locations WHERE id = $1 FOR UPDATE",
        LOCATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(mut location) = location else {
        return Ok(None);
    };

    if edit(&mut location.delivery_areas) {
        location.updated_at = Utc::now();
        sqlx::query(
            r#"
            UPDATE locations
            SET delivery_areas = $2,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(Json(&location.delivery_areas))
        .bind(location.updated_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(Some(location))
}

/// Direct children of a location
pub async fn get_children(pool: &PgPool, parent_id: Uuid) -> Result<Vec<Location>, AppError> {
    let children = sqlx::query_as::<_, Location>(&format!(
        "SELECT {} FROM locations WHERE parent_id = $1 ORDER BY location_type, name",
        LOCATION_COLUMNS
    ))
    .bind(parent_id)
    .fetch_all(pool)
    .await?;

    Ok(children)
}

/// Active location whose own postcode matches
pub async fn find_active_by_postcode(
    pool: &PgPool,
    postcode: &str,
) -> Result<Option<Location>, AppError> {
    let location = sqlx::query_as::<_, Location>(&format!(
        r#"
        SELECT {}
        FROM locations
        WHERE postcode = $1
          AND is_active = true
        ORDER BY location_type, name
        LIMIT 1
        "#,
        LOCATION_COLUMNS
    ))
    .bind(postcode)
    .fetch_optional(pool)
    .await?;

    Ok(location)
}

/// Active location embedding an active delivery area for the postcode
pub async fn find_active_by_area_postcode(
    pool: &PgPool,
    postcode: &str,
) -> Result<Option<Location>, AppError> {
    let location = sqlx::query_as::<_, Location>(&format!(
        r#"
        SELECT {}
        FROM locations
        WHERE is_active = true
          AND EXISTS (
              SELECT 1
              FROM jsonb_array_elements(delivery_areas) AS a
              WHERE a->>'postcode' = $1
                AND COALESCE((a->>'is_active')::boolean, true)
          )
        ORDER BY location_type, name
        LIMIT 1
        "#,
        LOCATION_COLUMNS
    ))
    .bind(postcode)
    .fetch_optional(pool)
    .await?;

    Ok(location)
}

/// Escape LIKE metacharacters and wrap for substring matching
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a LocationFilter) {
    qb.push(" WHERE TRUE");

    if let Some(location_type) = filter.location_type {
        qb.push(" AND location_type = ").push_bind(location_type);
    }

    let exact = [
        ("country", &filter.country),
        ("state", &filter.state),
        ("city", &filter.city),
        ("area", &filter.area),
        ("postcode", &filter.postcode),
    ];
    for (column, value) in exact {
        if let Some(value) = value {
            qb.push(format!(" AND {} = ", column))
                .push_bind(value.as_str());
        }
    }

    match filter.parent {
        Some(ParentFilter::Root) => {
            qb.push(" AND parent_id IS NULL");
        }
        Some(ParentFilter::Id(id)) => {
            qb.push(" AND parent_id = ").push_bind(id);
        }
        None => {}
    }

    match filter.has_delivery_areas {
        Some(true) => {
            qb.push(" AND jsonb_array_length(delivery_areas) > 0");
        }
        Some(false) => {
            qb.push(" AND jsonb_array_length(delivery_areas) = 0");
        }
        None => {}
    }

    if let Some(active) = filter.is_active {
        qb.push(" AND is_active = ").push_bind(active);
    }

    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        qb.push(" AND (");
        let mut separated = qb.separated(" OR ");
        for column in ["name", "state", "city", "area", "postcode"] {
            separated
                .push(format!("{} ILIKE ", column))
                .push_bind_unseparated(pattern.clone());
        }
        qb.push(")");
    }
}

/// List locations with filters and pagination
pub async fn list_locations(
    pool: &PgPool,
    filter: &LocationFilter,
) -> Result<(Vec<Location>, i64), AppError> {
    let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM locations");
    push_filters(&mut count_query, filter);
    let total: i64 = count_query
        .build_query_scalar()
        .fetch_one(pool)
        .await?;

    let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM locations", LOCATION_COLUMNS));
    push_filters(&mut query, filter);
    query
        .push(" ORDER BY location_type, name LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset());
    let locations = query
        .build_query_as::<Location>()
        .fetch_all(pool)
        .await?;

    Ok((locations, total))
}

/// Postgres-backed location store
#[derive(Clone)]
pub struct PgLocationStore {
    pool: PgPool,
}

impl PgLocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LocationStore for PgLocationStore {
    async fn insert(&self, location: &Location) -> Result<(), AppError> {
        insert_location(&self.pool, location).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Location>, AppError> {
        get_location(&self.pool, id).await
    }

    async fn save(&self, location: &Location) -> Result<Option<Location>, AppError> {
        update_location(&self.pool, location).await
    }

    async fn edit_delivery_areas(
        &self,
        id: Uuid,
        edit: AreaEdit,
    ) -> Result<Option<Location>, AppError> {
        edit_delivery_areas(&self.pool, id, edit).await
    }

    async fn children(&self, id: Uuid) -> Result<Vec<Location>, AppError> {
        get_children(&self.pool, id).await
    }

    async fn find_active_by_postcode(&self, postcode: &str) -> Result<Option<Location>, AppError> {
        find_active_by_postcode(&self.pool, postcode).await
    }

    async fn find_active_by_area_postcode(
        &self,
        postcode: &str,
    ) -> Result<Option<Location>, AppError> {
        find_active_by_area_postcode(&self.pool, postcode).await
    }

    async fn list(&self, filter: &LocationFilter) -> Result<(Vec<Location>, i64), AppError> {
        list_locations(&self.pool, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::models::LocationType;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rm"), "%rm%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_push_filters_builds_anded_where_clause() {
        let filter = LocationFilter {
            location_type: Some(LocationType::City),
            state: Some("East London".to_string()),
            parent: Some(ParentFilter::Root),
            has_delivery_areas: Some(true),
            search: Some("bark".to_string()),
            page: 1,
            limit: 10,
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM locations");
        push_filters(&mut qb, &filter);
        let sql = qb.sql();

        assert!(sql.contains("location_type = $1"));
        assert!(sql.contains("state = $2"));
        assert!(sql.contains("parent_id IS NULL"));
        assert!(sql.contains("jsonb_array_length(delivery_areas) > 0"));
        assert!(sql.contains("(name ILIKE $3 OR state ILIKE $4"));
        assert!(sql.contains("postcode ILIKE $7)"));
    }
}
