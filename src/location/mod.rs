//! Delivery zones: the location tree, embedded delivery areas and the
//! postcode resolver used at checkout.

pub mod models;
pub mod queries;
pub mod requests;
pub mod resolver;
pub mod services;
pub mod store;

pub use models::{DeliveryArea, DeliveryOptions, Location, LocationType};
pub use queries::PgLocationStore;
pub use resolver::{normalize_postcode, DeliveryCheckResult};
pub use store::{InMemoryLocationStore, LocationStore};
