//! HTML parsing for car.gr pages
//!
//! Every parser compiles its selectors and patterns once and is then shared
//! read-only. Parsing is synchronous; callers fetch first and hand over the body.

pub mod document;
pub mod field_rules;
pub mod filter_classifier;
pub mod listing_parser;
pub mod numeric;
pub mod search_parser;
pub mod selectors;
pub mod table_locator;

pub use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};
pub use document::ParsedDocument;
pub use field_rules::{FieldDescriptor, FieldKind, FieldStrategy, FieldValue};
pub use filter_classifier::FilterClassifier;
pub use listing_parser::ListingParser;
pub use search_parser::SearchResultsParser;
pub use table_locator::{TableLabel, TableLocator};

/// Parser for one page type, given what the caller knows about the page
pub trait ContextualParser {
    type Output;
    type Context: ?Sized;

    fn parse_with_context(&self, body: &str, context: &Self::Context) -> ParsingResult<Self::Output>;
}
