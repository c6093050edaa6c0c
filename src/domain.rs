//! Domain layer: listing records, listing references and the search filter catalog

pub mod filters;
pub mod listing;
pub mod listing_ref;

pub use filters::{FilterCatalog, FilterDefinition, FilterKind, FilterOption};
pub use listing::{Car, CarSummary};
pub use listing_ref::ListingRef;
