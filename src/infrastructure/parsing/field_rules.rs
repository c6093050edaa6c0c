//! Field extraction rules
//!
//! Each field is a [`FieldDescriptor`]: a declared output kind plus an ordered
//! list of strategies. [`resolve`] tries them in order and stops at the first
//! one that yields a raw value; that value is then coerced to the declared
//! kind. A value that fails coercion makes the field absent, it does not fall
//! through to later strategies.

use super::document::{ParsedDocument, joined_text, lookup_path};
use super::numeric::{first_int, float_from_value, int_from_value, parse_float, parse_int};
use super::selectors::listing;
use super::table_locator::{TableLabel, TableLocator};
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;
use serde_json::Value;
use tracing::debug;

static YEAR_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());

/// Declared output type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Int,
    Float,
    List,
}

/// A resolved field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    List(Vec<String>),
}

impl FieldValue {
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<String>> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }
}

/// Bespoke extraction that does not fit a path, pattern or table lookup
#[derive(Debug, Clone)]
pub enum CustomRule {
    /// Model name guessed from the title (see [`infer_model`])
    InferModel(ModelInference),
    /// `div.description` text, one line per text piece
    DescriptionBlock,
    /// Dealer link in the seller box
    SellerLink,
    /// Span following the location pin in the seller box
    SellerLocation,
}

#[derive(Debug, Clone)]
pub enum FieldStrategy {
    /// Dotted path into the structured data
    ByPath(String),
    /// Like `ByPath`, but an empty string also counts as missing
    ByFilledPath(String),
    /// First capture group of a pattern over the meta description
    ByPattern(Regex),
    /// Two capture groups over the meta description, joined as `"{1}/{2}"`
    ByComposite(Regex),
    /// Value cell of a labelled row in the attribute grid
    ByTable(TableLabel),
    ByCustomRule(CustomRule),
}

impl FieldStrategy {
    pub fn path(path: &str) -> Self {
        Self::ByPath(path.to_string())
    }

    pub fn filled_path(path: &str) -> Self {
        Self::ByFilledPath(path.to_string())
    }

    pub fn pattern(field: &str, pattern: &str) -> ParsingResult<Self> {
        Ok(Self::ByPattern(compile(field, pattern)?))
    }

    pub fn composite(field: &str, pattern: &str) -> ParsingResult<Self> {
        Ok(Self::ByComposite(compile(field, pattern)?))
    }

    pub fn table(label: &str) -> ParsingResult<Self> {
        Ok(Self::ByTable(TableLabel::new(label)?))
    }

    fn name(&self) -> &'static str {
        match self {
            Self::ByPath(_) => "path",
            Self::ByFilledPath(_) => "filled path",
            Self::ByPattern(_) => "pattern",
            Self::ByComposite(_) => "composite",
            Self::ByTable(_) => "table",
            Self::ByCustomRule(_) => "custom",
        }
    }
}

fn compile(field: &str, pattern: &str) -> ParsingResult<Regex> {
    Regex::new(pattern).map_err(|e| ParsingError::invalid_pattern(field, e))
}

/// Declarative rule for one named field
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    pub strategies: Vec<FieldStrategy>,
}

impl FieldDescriptor {
    pub fn new(name: &str, kind: FieldKind, strategies: Vec<FieldStrategy>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            strategies,
        }
    }
}

/// Raw output of a strategy, before coercion
#[derive(Debug)]
enum RawValue<'a> {
    Structured(&'a Value),
    Text(String),
    /// Grid cell text; integer fields take its first numeric run
    Cell(String),
}

/// Resolve one field against a parsed page
pub fn resolve(
    descriptor: &FieldDescriptor,
    doc: &ParsedDocument,
    tables: &TableLocator,
) -> Option<FieldValue> {
    for strategy in &descriptor.strategies {
        if let Some(raw) = apply(strategy, doc, tables) {
            let value = coerce(raw, descriptor.kind);
            debug!(
                field = %descriptor.name,
                strategy = strategy.name(),
                resolved = value.is_some(),
                "Field resolved"
            );
            return value;
        }
    }
    debug!(field = %descriptor.name, "Field absent");
    None
}

fn apply<'a>(
    strategy: &FieldStrategy,
    doc: &'a ParsedDocument,
    tables: &TableLocator,
) -> Option<RawValue<'a>> {
    match strategy {
        FieldStrategy::ByPath(path) => doc.lookup_path(path).map(RawValue::Structured),
        FieldStrategy::ByFilledPath(path) => doc
            .lookup_path(path)
            .filter(|value| value.as_str().is_none_or(|s| !s.trim().is_empty()))
            .map(RawValue::Structured),
        FieldStrategy::ByPattern(pattern) => pattern
            .captures(doc.description())
            .and_then(|c| c.get(1))
            .map(|m| RawValue::Text(m.as_str().to_string())),
        FieldStrategy::ByComposite(pattern) => {
            let caps = pattern.captures(doc.description())?;
            let (first, second) = (caps.get(1)?, caps.get(2)?);
            Some(RawValue::Text(format!("{}/{}", first.as_str(), second.as_str())))
        }
        FieldStrategy::ByTable(label) => tables.locate(label, doc.html()).map(RawValue::Cell),
        FieldStrategy::ByCustomRule(rule) => apply_custom(rule, doc).map(RawValue::Text),
    }
}

fn coerce(raw: RawValue<'_>, kind: FieldKind) -> Option<FieldValue> {
    match kind {
        FieldKind::Text => match raw {
            RawValue::Structured(value) => text_from_value(value),
            RawValue::Text(s) | RawValue::Cell(s) => Some(s),
        }
        .map(FieldValue::Text),
        FieldKind::Int => match raw {
            RawValue::Structured(value) => int_from_value(value),
            RawValue::Text(s) => parse_int(&s),
            RawValue::Cell(s) => first_int(&s),
        }
        .map(FieldValue::Int),
        FieldKind::Float => match raw {
            RawValue::Structured(value) => float_from_value(value),
            RawValue::Text(s) | RawValue::Cell(s) => parse_float(&s),
        }
        .map(FieldValue::Float),
        FieldKind::List => match raw {
            RawValue::Structured(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            ),
            RawValue::Structured(Value::String(s)) => Some(vec![s.clone()]),
            RawValue::Structured(_) => None,
            RawValue::Text(s) | RawValue::Cell(s) => Some(vec![s]),
        }
        .map(FieldValue::List),
    }
}

/// Strings as-is, numbers and booleans printed, objects by their `name`
fn text_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn apply_custom(rule: &CustomRule, doc: &ParsedDocument) -> Option<String> {
    let found = match rule {
        CustomRule::InferModel(inference) => inference.infer(doc),
        CustomRule::DescriptionBlock => doc
            .html()
            .select(&listing::DESCRIPTION)
            .next()
            .map(|div| joined_text(div, "\n")),
        CustomRule::SellerLink => seller_box(doc)
            .and_then(|seller| seller.select(&listing::SELLER_LINK).next())
            .map(|link| joined_text(link, "")),
        CustomRule::SellerLocation => seller_location(doc),
    };
    found.filter(|s| !s.is_empty())
}

fn seller_box(doc: &ParsedDocument) -> Option<ElementRef<'_>> {
    doc.html().select(&listing::SELLER_INFO).next()
}

/// First `<span>` after the location pin, in document order
fn seller_location(doc: &ParsedDocument) -> Option<String> {
    let pin = seller_box(doc)?.select(&listing::LOCATION_PIN).next()?;
    let pin_id = pin.id();
    doc.html()
        .root_element()
        .descendants()
        .skip_while(|node| node.id() != pin_id)
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "span")
        .map(|span| joined_text(span, ""))
}

/// Model name inference from a listing title
#[derive(Debug, Clone)]
pub struct ModelInference {
    stopwords: Option<Regex>,
}

impl ModelInference {
    pub fn new(stopwords: &[String]) -> ParsingResult<Self> {
        let words: Vec<String> = stopwords
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .map(regex::escape)
            .collect();
        let stopwords = if words.is_empty() {
            None
        } else {
            Some(compile("model", &format!(r"(?i)\b(?:{})\b", words.join("|")))?)
        };
        Ok(Self { stopwords })
    }

    fn infer(&self, doc: &ParsedDocument) -> Option<String> {
        let structured = doc.structured();
        let title = structured
            .get("name")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .or_else(|| doc.title_text())?;
        let make = lookup_path(structured, "manufacturer")
            .and_then(text_from_value)
            .filter(|m| !m.is_empty())
            .or_else(|| {
                lookup_path(structured, "brand.name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })?;
        infer_model(&title, &make, self.stopwords.as_ref())
    }
}

/// Title minus the make, year tokens and stopwords; first remaining token
pub fn infer_model(title: &str, make: &str, stopwords: Option<&Regex>) -> Option<String> {
    if make.trim().is_empty() {
        return None;
    }
    let make_pattern = Regex::new(&format!("(?i){}", regex::escape(make))).ok()?;
    let without_make = make_pattern.replace_all(title, "");
    let without_year = YEAR_TOKEN.replace_all(&without_make, "");
    let cleaned = match stopwords {
        Some(pattern) => pattern.replace_all(&without_year, "").into_owned(),
        None => without_year.into_owned(),
    };
    cleaned.split_whitespace().next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn stopwords() -> Regex {
        Regex::new(r"(?i)\b(?:Professional|Edition|Pack|Sport)\b").unwrap()
    }

    fn doc_with(json: &str, description: &str, body: &str) -> ParsedDocument {
        ParsedDocument::parse(&format!(
            r#"<html><head>
                 <meta property="og:description" content="{description}">
                 <script type="application/ld+json">{json}</script>
               </head><body>{body}</body></html>"#
        ))
    }

    fn tables() -> TableLocator {
        TableLocator::new("tw-grid")
    }

    #[rstest]
    #[case("BMW 320d 2019", "BMW", Some("320d"))]
    #[case("bmw Sport 320d", "BMW", Some("320d"))]
    #[case("Mercedes-Benz C 200 Edition 2021", "Mercedes-Benz", Some("C"))]
    #[case("Toyota 2019", "Toyota", None)]
    #[case("Fiat Panda", "", None)]
    fn model_inference(#[case] title: &str, #[case] make: &str, #[case] expected: Option<&str>) {
        assert_eq!(infer_model(title, make, Some(&stopwords())).as_deref(), expected);
    }

    #[test]
    fn structured_path_wins_over_pattern() {
        let doc = doc_with(
            r#"{"@type": "Car", "mileageFromOdometer": {"value": "120.000"}}"#,
            "Χιλιόμετρα: 85.000",
            "",
        );
        let km = FieldDescriptor::new(
            "km",
            FieldKind::Float,
            vec![
                FieldStrategy::path("mileageFromOdometer.value"),
                FieldStrategy::pattern("km", r"Χιλιόμετρα:\s*([\d\.]+)").unwrap(),
            ],
        );
        assert_eq!(resolve(&km, &doc, &tables()), Some(FieldValue::Float(120_000.0)));
    }

    #[test]
    fn uncoercible_path_value_does_not_fall_through() {
        let doc = doc_with(
            r#"{"@type": "Car", "mileageFromOdometer": {"value": "πολλά"}}"#,
            "Χιλιόμετρα: 85.000",
            "",
        );
        let km = FieldDescriptor::new(
            "km",
            FieldKind::Float,
            vec![
                FieldStrategy::path("mileageFromOdometer.value"),
                FieldStrategy::pattern("km", r"Χιλιόμετρα:\s*([\d\.]+)").unwrap(),
            ],
        );
        assert_eq!(resolve(&km, &doc, &tables()), None);
    }

    #[test]
    fn pattern_is_used_when_path_is_missing() {
        let doc = doc_with(r#"{"@type": "Car"}"#, "Κυβικά: 1.995 cc Ιπποδύναμη: 190 hp", "");
        let engine = FieldDescriptor::new(
            "engine",
            FieldKind::Int,
            vec![FieldStrategy::pattern("engine", r"Κυβικά:\s*([\d\.]+)\s*cc").unwrap()],
        );
        assert_eq!(resolve(&engine, &doc, &tables()), Some(FieldValue::Int(1995)));
    }

    #[test]
    fn composite_joins_month_and_year_or_falls_back_to_path() {
        let release = FieldDescriptor::new(
            "release_date",
            FieldKind::Text,
            vec![
                FieldStrategy::composite("release_date", r"Χρονολογία:\s*(\d{1,2})\s*/\s*(\d{4})")
                    .unwrap(),
                FieldStrategy::path("modelDate"),
            ],
        );

        let with_text = doc_with(r#"{"@type": "Car", "modelDate": "2019"}"#, "Χρονολογία: 3 / 2019", "");
        assert_eq!(
            resolve(&release, &with_text, &tables()),
            Some(FieldValue::Text("3/2019".into()))
        );

        let path_only = doc_with(r#"{"@type": "Car", "modelDate": 2018}"#, "", "");
        assert_eq!(
            resolve(&release, &path_only, &tables()),
            Some(FieldValue::Text("2018".into()))
        );
    }

    #[test]
    fn table_int_takes_first_numeric_run() {
        let doc = doc_with(
            r#"{"@type": "Car"}"#,
            "",
            r#"<div class="tw-grid"><div>Τέλη κυκλοφορίας</div><div>1.250 € / έτος</div></div>"#,
        );
        let road_tax = FieldDescriptor::new(
            "road_tax",
            FieldKind::Int,
            vec![FieldStrategy::table("Τέλη κυκλοφορίας").unwrap()],
        );
        assert_eq!(resolve(&road_tax, &doc, &tables()), Some(FieldValue::Int(1250)));
    }

    #[test]
    fn list_accepts_single_string() {
        let images = FieldDescriptor::new("images", FieldKind::List, vec![FieldStrategy::path("image")]);

        let single = doc_with(r#"{"@type": "Car", "image": "https://static.car.gr/1_z.jpg"}"#, "", "");
        assert_eq!(
            resolve(&images, &single, &tables()),
            Some(FieldValue::List(vec!["https://static.car.gr/1_z.jpg".into()]))
        );

        let many = doc_with(r#"{"@type": "Car", "image": ["a.jpg", 3, "b.jpg"]}"#, "", "");
        assert_eq!(
            resolve(&images, &many, &tables()),
            Some(FieldValue::List(vec!["a.jpg".into(), "b.jpg".into()]))
        );
    }

    #[test]
    fn model_rule_uses_title_tag_and_brand() {
        let doc = ParsedDocument::parse(
            r#"<html><head><title>Audi A4 Avant 2017</title>
               <script type="application/ld+json">{"@type": "Car", "brand": {"name": "Audi"}}</script>
               </head></html>"#,
        );
        let inference = ModelInference::new(&["Sport".to_string()]).unwrap();
        let model = FieldDescriptor::new(
            "model",
            FieldKind::Text,
            vec![
                FieldStrategy::path("model"),
                FieldStrategy::ByCustomRule(CustomRule::InferModel(inference)),
            ],
        );
        assert_eq!(resolve(&model, &doc, &tables()), Some(FieldValue::Text("A4".into())));
    }

    #[test]
    fn absent_everywhere_is_none() {
        let doc = doc_with(r#"{"@type": "Car"}"#, "", "");
        let color = FieldDescriptor::new("color", FieldKind::Text, vec![FieldStrategy::table("Χρώμα").unwrap()]);
        assert_eq!(resolve(&color, &doc, &tables()), None);
    }

    #[test]
    fn invalid_pattern_is_reported_with_field() {
        let err = FieldStrategy::pattern("km", r"([\d").unwrap_err();
        assert!(matches!(err, ParsingError::InvalidPattern { ref field, .. } if field == "km"));
    }

    #[test]
    fn filled_path_skips_empty_strings_plain_path_keeps_them() {
        let doc = doc_with(r#"{"@type": "Car", "color": "", "doors": 0}"#, "", "");
        let strategies = |first: FieldStrategy| {
            vec![first, FieldStrategy::ByCustomRule(CustomRule::DescriptionBlock)]
        };
        let body = doc_with(r#"{"@type": "Car", "color": ""}"#, "", r#"<div class="description">Γκρι</div>"#);

        let plain = FieldDescriptor::new("color", FieldKind::Text, strategies(FieldStrategy::path("color")));
        assert_eq!(resolve(&plain, &body, &tables()), Some(FieldValue::Text(String::new())));

        let filled = FieldDescriptor::new("color", FieldKind::Text, strategies(FieldStrategy::filled_path("color")));
        assert_eq!(resolve(&filled, &body, &tables()), Some(FieldValue::Text("Γκρι".into())));

        // non-string values are never treated as empty
        let doors = FieldDescriptor::new("doors", FieldKind::Int, vec![FieldStrategy::filled_path("doors")]);
        assert_eq!(resolve(&doors, &doc, &tables()), Some(FieldValue::Int(0)));
    }
}

