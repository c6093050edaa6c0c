//! car-listings - structured vehicle listings from car.gr
//!
//! Resolves listing pages into [`domain::Car`] records, search pages into
//! [`domain::CarSummary`] lists, and the search form into a classified
//! [`domain::FilterCatalog`] served through a cache with stale fallback.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{FilterCache, ListingService};
pub use domain::{Car, CarSummary, FilterCatalog, ListingRef};
pub use infrastructure::{AppConfig, ConfigManager};
