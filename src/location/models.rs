//! Location documents and their embedded delivery policies.
//!
//! Embedded documents (delivery areas, delivery options) live in JSONB columns
//! and are decoded with sqlx's `json` field attribute.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::money::format_gbp;

/// Level of a node in the geographic hierarchy.
///
/// Ordering follows the hierarchy (country first), which is also the order of
/// the `location_type` Postgres enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "location_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Country,
    State,
    City,
    Area,
    Postcode,
}

impl LocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationType::Country => "country",
            LocationType::State => "state",
            LocationType::City => "city",
            LocationType::Area => "area",
            LocationType::Postcode => "postcode",
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_estimated_time() -> i32 {
    60
}

fn default_radius() -> i32 {
    5000
}

/// Default delivery policy of a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOptions {
    #[serde(default = "default_true")]
    pub is_available: bool,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default)]
    pub min_order: Decimal,
    /// Minutes
    #[serde(default = "default_estimated_time")]
    pub estimated_time: i32,
    /// Meters
    #[serde(default = "default_radius")]
    pub radius: i32,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            is_available: true,
            is_free: false,
            fee: Decimal::ZERO,
            min_order: Decimal::ZERO,
            estimated_time: default_estimated_time(),
            radius: default_radius(),
        }
    }
}

/// Postcode-level delivery rule embedded in a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryArea {
    pub id: Uuid,
    pub name: String,
    pub postcode: String,
    pub delivery_fee: Decimal,
    pub is_free: bool,
    pub min_order: Decimal,
    /// Minutes
    pub estimated_time: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Location from the locations table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: LocationType,
    pub parent_id: Option<Uuid>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub area: Option<String>,
    pub postcode: Option<String>,
    #[sqlx(json)]
    pub delivery_areas: Vec<DeliveryArea>,
    #[sqlx(json)]
    pub delivery_options: DeliveryOptions,
    pub description: Option<String>,
    pub is_active: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Location {
    /// First active embedded area for an already-normalized postcode
    pub fn active_area(&self, postcode: &str) -> Option<&DeliveryArea> {
        self.delivery_areas
            .iter()
            .find(|a| a.is_active && a.postcode == postcode)
    }

    pub fn summary(&self) -> LocationSummary {
        LocationSummary {
            id: self.id,
            name: self.name.clone(),
            location_type: self.location_type,
            state: self.state.clone(),
            city: self.city.clone(),
        }
    }

    /// Human-readable view of the default delivery policy
    pub fn delivery_summary(&self) -> DeliverySummary {
        let options = &self.delivery_options;
        DeliverySummary {
            location: match &self.postcode {
                Some(pc) => format!("{} ({})", self.name, pc),
                None => self.name.clone(),
            },
            delivery_available: options.is_available,
            delivery_fee: if options.is_free {
                "Free".to_string()
            } else {
                format_gbp(options.fee)
            },
            estimated_time: format!("{} mins", options.estimated_time),
            min_order: if options.min_order > Decimal::ZERO {
                format_gbp(options.min_order)
            } else {
                "None".to_string()
            },
        }
    }
}

/// Short location description returned with delivery checks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: LocationType,
    pub state: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliverySummary {
    pub location: String,
    pub delivery_available: bool,
    pub delivery_fee: String,
    pub estimated_time: String,
    pub min_order: String,
}

/// Parent constraint for location listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentFilter {
    /// Only top-level locations
    Root,
    /// Only direct children of the given location
    Id(Uuid),
}

/// Listing filters. All present filters must hold; `search` matches any of
/// name/state/city/area/postcode case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationFilter {
    pub location_type: Option<LocationType>,
    pub country: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub area: Option<String>,
    pub postcode: Option<String>,
    pub parent: Option<ParentFilter>,
    pub has_delivery_areas: Option<bool>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub page: i64,
    pub limit: i64,
}

impl LocationFilter {
    /// Rows to skip, saturating at `i64::MAX`
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit.max(0))
    }

    /// In-process evaluation of the filter, matching the SQL built in `queries`
    pub fn matches(&self, location: &Location) -> bool {
        fn eq(want: &Option<String>, have: &Option<String>) -> bool {
            match want {
                Some(w) => have.as_deref() == Some(w.as_str()),
                None => true,
            }
        }

        if let Some(t) = self.location_type {
            if location.location_type != t {
                return false;
            }
        }
        if !(eq(&self.country, &location.country)
            && eq(&self.state, &location.state)
            && eq(&self.city, &location.city)
            && eq(&self.area, &location.area)
            && eq(&self.postcode, &location.postcode))
        {
            return false;
        }
        match self.parent {
            Some(ParentFilter::Root) if location.parent_id.is_some() => return false,
            Some(ParentFilter::Id(id)) if location.parent_id != Some(id) => return false,
            _ => {}
        }
        if let Some(has_areas) = self.has_delivery_areas {
            if location.delivery_areas.is_empty() == has_areas {
                return false;
            }
        }
        if let Some(active) = self.is_active {
            if location.is_active != active {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let needle = term.to_lowercase();
            let hit = std::iter::once(Some(&location.name))
                .chain([
                    location.state.as_ref(),
                    location.city.as_ref(),
                    location.area.as_ref(),
                    location.postcode.as_ref(),
                ])
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use rust_decimal_macros::dec;

    pub fn location(name: &str, location_type: LocationType) -> Location {
        let now = Utc::now();
        Location {
            id: Uuid::new_v4(),
            name: name.to_string(),
            location_type,
            parent_id: None,
            country: Some("England".to_string()),
            state: None,
            city: None,
            area: None,
            postcode: None,
            delivery_areas: vec![],
            delivery_options: DeliveryOptions::default(),
            description: None,
            is_active: true,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn area(postcode: &str, fee: Decimal, min_order: Decimal) -> DeliveryArea {
        DeliveryArea {
            id: Uuid::new_v4(),
            name: format!("Zone {}", postcode),
            postcode: postcode.to_string(),
            delivery_fee: fee,
            is_free: fee == dec!(0),
            min_order,
            estimated_time: 45,
            is_active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_delivery_options_defaults_from_empty_json() {
        let options: DeliveryOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, DeliveryOptions::default());
        assert_eq!(options.radius, 5000);
        assert_eq!(options.estimated_time, 60);
        assert!(options.is_available);
    }

    #[test]
    fn test_location_type_serializes_lowercase() {
        let json = serde_json::to_string(&LocationType::Postcode).unwrap();
        assert_eq!(json, "\"postcode\"");
        assert!(LocationType::Country < LocationType::Postcode);
    }

    #[test]
    fn test_active_area_skips_inactive() {
        let mut loc = location("Dagenham", LocationType::Area);
        let mut inactive = area("RM9", dec!(5), dec!(0));
        inactive.is_active = false;
        let active = area("RM9", dec!(7), dec!(0));
        loc.delivery_areas = vec![inactive, active.clone()];

        assert_eq!(loc.active_area("RM9"), Some(&active));
        assert_eq!(loc.active_area("RM10"), None);
    }

    #[test]
    fn test_delivery_summary() {
        let mut loc = location("Westminster", LocationType::Postcode);
        loc.postcode = Some("SW1A1AA".to_string());
        loc.delivery_options.fee = dec!(10);
        loc.delivery_options.min_order = dec!(50);

        let summary = loc.delivery_summary();
        assert_eq!(summary.location, "Westminster (SW1A1AA)");
        assert_eq!(summary.delivery_fee, "£10");
        assert_eq!(summary.min_order, "£50");
        assert_eq!(summary.estimated_time, "60 mins");

        loc.delivery_options.is_free = true;
        loc.delivery_options.min_order = dec!(0);
        let summary = loc.delivery_summary();
        assert_eq!(summary.delivery_fee, "Free");
        assert_eq!(summary.min_order, "None");
    }

    #[test]
    fn test_filter_fields_are_anded() {
        let mut loc = location("Barking", LocationType::City);
        loc.state = Some("East London".to_string());

        let filter = LocationFilter {
            location_type: Some(LocationType::City),
            state: Some("East London".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&loc));

        let filter = LocationFilter {
            location_type: Some(LocationType::City),
            state: Some("West London".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&loc));
    }

    #[test]
    fn test_filter_search_is_case_insensitive_or() {
        let mut loc = location("Becontree", LocationType::Area);
        loc.postcode = Some("RM8".to_string());

        let by_name = LocationFilter {
            search: Some("contr".to_string()),
            ..Default::default()
        };
        let by_postcode = LocationFilter {
            search: Some("rm8".to_string()),
            ..Default::default()
        };
        let miss = LocationFilter {
            search: Some("ilford".to_string()),
            ..Default::default()
        };
        assert!(by_name.matches(&loc));
        assert!(by_postcode.matches(&loc));
        assert!(!miss.matches(&loc));
    }

    #[test]
    fn test_filter_parent_and_areas() {
        let parent = location("London", LocationType::City);
        let mut child = location("Barking", LocationType::Area);
        child.parent_id = Some(parent.id);
        child.delivery_areas.push(area("IG11", dec!(5), dec!(0)));

        let roots = LocationFilter {
            parent: Some(ParentFilter::Root),
            ..Default::default()
        };
        assert!(roots.matches(&parent));
        assert!(!roots.matches(&child));

        let children = LocationFilter {
            parent: Some(ParentFilter::Id(parent.id)),
            has_delivery_areas: Some(true),
            ..Default::default()
        };
        assert!(children.matches(&child));
        assert!(!children.matches(&parent));

        let without_areas = LocationFilter {
            has_delivery_areas: Some(false),
            ..Default::default()
        };
        assert!(without_areas.matches(&parent));
        assert!(!without_areas.matches(&child));
    }

    #[test]
    fn test_offset_saturates_on_huge_page() {
        let filter = LocationFilter {
            page: i64::MAX,
            limit: 100,
            ..Default::default()
        };
        assert_eq!(filter.offset(), i64::MAX);

        let second = LocationFilter {
            page: 2,
            limit: 10,
            ..Default::default()
        };
        assert_eq!(second.offset(), 10);
    }
}
