//! Promo codes: eligibility gates, discount math and redemption tracking.

pub mod calculators;
pub mod models;
pub mod queries;
pub mod requests;
pub mod services;
pub mod store;

pub use calculators::{PromoRejection, PromoStats, PromoValidation};
pub use models::{DiscountType, Promo, PromoStatus};
pub use queries::PgPromoStore;
pub use services::PromoApplication;
pub use store::{InMemoryPromoStore, PromoStore};
