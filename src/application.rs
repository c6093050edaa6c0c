//! Application layer
//!
//! Orchestrates fetching and parsing behind the entry points used by callers,
//! and caches the classified filter catalog.

pub mod filter_cache;
pub mod listing_service;

pub use filter_cache::{CatalogProducer, FilterCache};
pub use listing_service::{ListingService, TransportFactory};
