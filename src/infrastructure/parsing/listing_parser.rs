//! Listing page parser
//!
//! Maps the field table below onto a [`Car`]. Every attribute is optional;
//! only the listing id and URL are always present.

use super::ContextualParser;
use super::document::ParsedDocument;
use super::field_rules::{
    CustomRule, FieldDescriptor, FieldKind, FieldStrategy, FieldValue, ModelInference, resolve,
};
use super::table_locator::TableLocator;
use crate::domain::{Car, ListingRef};
use crate::infrastructure::config::ParsingConfig;
use crate::infrastructure::parsing_error::ParsingResult;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

static DEALER_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new("Έμπορος").unwrap());

/// Seller `@type` values that mark a professional seller
const DEALER_TYPES: &[&str] = &["AutoDealer", "Organization"];

/// Grid rows read as text
const TABLE_TEXT_FIELDS: &[(&str, &str)] = &[
    ("color", "Χρώμα"),
    ("category", "Κατηγορία"),
    ("euro_class", "Κλάση ρύπων"),
    ("kteo_expiry", "ΚΤΕΟ μέχρι"),
    ("modified_at", "Τελευταία αλλαγή"),
];

/// Grid rows read as integers
const TABLE_INT_FIELDS: &[(&str, &str)] = &[
    ("views", "Εμφανίσεις αγγελίας"),
    ("road_tax", "Τέλη κυκλοφορίας"),
    ("seats", "Θέσεις επιβατών"),
    ("doors", "Πόρτες"),
];

pub struct ListingParser {
    fields: HashMap<String, FieldDescriptor>,
    tables: TableLocator,
}

impl ListingParser {
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&ParsingConfig::default())
    }

    pub fn with_config(config: &ParsingConfig) -> ParsingResult<Self> {
        let fields = build_field_table(config)?
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();
        Ok(Self {
            fields,
            tables: TableLocator::new(config.table_row_class.clone()),
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    /// Resolve one named field; unknown names are absent
    pub fn resolve(&self, name: &str, doc: &ParsedDocument) -> Option<FieldValue> {
        let descriptor = self.fields.get(name)?;
        resolve(descriptor, doc, &self.tables)
    }

    fn text(&self, name: &str, doc: &ParsedDocument) -> Option<String> {
        self.resolve(name, doc).and_then(FieldValue::into_text)
    }

    fn int(&self, name: &str, doc: &ParsedDocument) -> Option<i64> {
        self.resolve(name, doc).and_then(|v| v.as_int())
    }

    fn float(&self, name: &str, doc: &ParsedDocument) -> Option<f64> {
        self.resolve(name, doc).and_then(|v| v.as_float())
    }

    /// Professional seller per structured data, or a dealer marker in the page text
    pub fn is_dealer(&self, doc: &ParsedDocument) -> bool {
        let typed = doc
            .lookup_path("offers.seller.@type")
            .and_then(Value::as_str)
            .is_some_and(|t| DEALER_TYPES.contains(&t));
        typed || doc.any_text_matches(&DEALER_MARKER)
    }

    /// Build the record from an already parsed page
    pub fn parse_document(&self, listing: &ListingRef, doc: &ParsedDocument) -> Car {
        let mut car = Car::new(
            listing.listing_id.clone(),
            self.text("url", doc).unwrap_or_else(|| listing.url.clone()),
        );

        car.title = self.text("title", doc);
        car.price = self.float("price", doc);
        car.make = self.text("make", doc);
        car.model = self.text("model", doc);
        car.category = self.text("category", doc);

        car.release_date = self.text("release_date", doc);
        car.engine = self.int("engine", doc);
        car.km = self.float("km", doc);
        car.bhp = self.int("bhp", doc);
        car.color = self.text("color", doc);
        car.fueltype = self.text("fueltype", doc);
        car.transmission = self.text("transmission", doc);
        car.doors = self.int("doors", doc);
        car.seats = self.int("seats", doc);

        car.euro_class = self.text("euro_class", doc);
        car.road_tax = self.int("road_tax", doc);
        car.kteo_expiry = self.text("kteo_expiry", doc);

        car.city = self.text("city", doc);
        car.is_dealer = self.is_dealer(doc);
        car.seller_name = self.text("seller_name", doc);
        car.description = self.text("description", doc);
        car.views = self.int("views", doc);
        car.modified_at = self.text("modified_at", doc);

        car.images = self
            .resolve("images", doc)
            .and_then(FieldValue::into_list)
            .unwrap_or_default();

        debug!(
            listing = %listing.listing_id,
            make = car.make.as_deref().unwrap_or("-"),
            model = car.model.as_deref().unwrap_or("-"),
            images = car.images.len(),
            "Parsed listing"
        );
        car
    }
}

impl ContextualParser for ListingParser {
    type Output = Car;
    type Context = ListingRef;

    fn parse_with_context(&self, body: &str, listing: &ListingRef) -> ParsingResult<Car> {
        let doc = ParsedDocument::parse(body);
        Ok(self.parse_document(listing, &doc))
    }
}

fn build_field_table(config: &ParsingConfig) -> ParsingResult<Vec<FieldDescriptor>> {
    use FieldKind::{Float, Int, List, Text};
    use FieldStrategy as S;

    let mut fields = vec![
        FieldDescriptor::new("title", Text, vec![S::path("name")]),
        FieldDescriptor::new("url", Text, vec![S::path("url")]),
        FieldDescriptor::new("price", Float, vec![S::path("offers.priceSpecification.price")]),
        FieldDescriptor::new("make", Text, vec![S::path("manufacturer")]),
        FieldDescriptor::new(
            "model",
            Text,
            vec![
                S::filled_path("model"),
                S::ByCustomRule(CustomRule::InferModel(ModelInference::new(
                    &config.model_stopwords,
                )?)),
            ],
        ),
        FieldDescriptor::new(
            "km",
            Float,
            vec![
                S::path("mileageFromOdometer.value"),
                S::pattern("km", r"Χιλιόμετρα:\s*([\d\.]+)")?,
            ],
        ),
        FieldDescriptor::new("engine", Int, vec![S::pattern("engine", r"Κυβικά:\s*([\d\.]+)\s*cc")?]),
        FieldDescriptor::new("bhp", Int, vec![S::pattern("bhp", r"Ιπποδύναμη:\s*(\d+)\s*hp")?]),
        FieldDescriptor::new(
            "fueltype",
            Text,
            vec![S::path("fuelType"), S::pattern("fueltype", r"Καύσιμο:\s*([^\s]+)")?],
        ),
        FieldDescriptor::new(
            "transmission",
            Text,
            vec![
                S::path("vehicleTransmission"),
                S::pattern("transmission", r"Σασμάν:\s*([^\s]+)")?,
            ],
        ),
        FieldDescriptor::new(
            "release_date",
            Text,
            vec![
                S::composite("release_date", r"Χρονολογία:\s*(\d{1,2})\s*/\s*(\d{4})")?,
                S::path("modelDate"),
            ],
        ),
        FieldDescriptor::new(
            "description",
            Text,
            vec![S::filled_path("description"), S::ByCustomRule(CustomRule::DescriptionBlock)],
        ),
        FieldDescriptor::new("images", List, vec![S::path("image")]),
        FieldDescriptor::new(
            "seller_name",
            Text,
            vec![S::filled_path("offers.seller.name"), S::ByCustomRule(CustomRule::SellerLink)],
        ),
        FieldDescriptor::new(
            "city",
            Text,
            vec![
                S::ByCustomRule(CustomRule::SellerLocation),
                S::path("offers.seller.areaServed.name"),
            ],
        ),
    ];

    for (name, label) in TABLE_TEXT_FIELDS {
        fields.push(FieldDescriptor::new(name, Text, vec![S::table(label)?]));
    }
    for (name, label) in TABLE_INT_FIELDS {
        fields.push(FieldDescriptor::new(name, Int, vec![S::table(label)?]));
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> ListingRef {
        ListingRef::resolve("41234567", "https://www.car.gr", "/classifieds/cars/view/")
    }

    #[test]
    fn every_car_attribute_has_a_rule() {
        let parser = ListingParser::new().unwrap();
        for name in [
            "title", "url", "price", "make", "model", "category", "release_date", "engine", "km",
            "bhp", "color", "fueltype", "transmission", "doors", "seats", "euro_class", "road_tax",
            "kteo_expiry", "city", "seller_name", "description", "views", "modified_at", "images",
        ] {
            assert!(parser.field(name).is_some(), "missing rule for {name}");
        }
    }

    #[test]
    fn bare_page_keeps_id_and_url() {
        let parser = ListingParser::new().unwrap();
        let car = parser
            .parse_with_context("<html><body></body></html>", &listing())
            .unwrap();
        assert_eq!(car.car_id, "41234567");
        assert_eq!(car.url, "https://www.car.gr/classifieds/cars/view/41234567");
        assert!(car.title.is_none() && car.images.is_empty() && !car.is_dealer);
    }

    #[test]
    fn dealer_marker_in_text_counts() {
        let parser = ListingParser::new().unwrap();
        let doc = ParsedDocument::parse("<html><body><span>Έμπορος αυτοκινήτων</span></body></html>");
        assert!(parser.is_dealer(&doc));
    }

    #[test]
    fn organization_seller_is_dealer() {
        let parser = ListingParser::new().unwrap();
        let doc = ParsedDocument::parse(
            r#"<script type="application/ld+json">{"offers": {"seller": {"@type": "Organization"}}}</script>"#,
        );
        assert!(parser.is_dealer(&doc));
        let private = ParsedDocument::parse(
            r#"<script type="application/ld+json">{"offers": {"seller": {"@type": "Person"}}}</script>"#,
        );
        assert!(!parser.is_dealer(&private));
    }

    #[test]
    fn custom_stopwords_change_inference() {
        let config = ParsingConfig {
            model_stopwords: vec!["Gran".into()],
            ..ParsingConfig::default()
        };
        let parser = ListingParser::with_config(&config).unwrap();
        let doc = ParsedDocument::parse(
            r#"<script type="application/ld+json">{"@type": "Car", "name": "BMW Gran 420d 2020", "manufacturer": "BMW"}</script>"#,
        );
        assert_eq!(parser.resolve("model", &doc), Some(FieldValue::Text("420d".into())));
    }

    #[test]
    fn empty_structured_strings_fall_through_to_page_fallbacks() {
        let parser = ListingParser::new().unwrap();
        let doc = ParsedDocument::parse(
            r#"<html><head>
                 <script type="application/ld+json">
                   {"@type": "Car", "name": "BMW 320d 2019", "manufacturer": "BMW",
                    "model": "", "description": "  ", "offers": {"seller": {"name": ""}}}
                 </script>
               </head><body>
                 <div class="description"><p>Real text</p></div>
                 <div class="main-seller-info"><a class="tw-text-lg" href="/d/1">Auto Athens</a></div>
               </body></html>"#,
        );

        let car = parser.parse_document(&listing(), &doc);

        assert_eq!(car.model.as_deref(), Some("320d"));
        assert_eq!(car.description.as_deref(), Some("Real text"));
        assert_eq!(car.seller_name.as_deref(), Some("Auto Athens"));
    }
}

