//! Parsed page bundle
//!
//! A [`ParsedDocument`] is built once per fetched page and owned by the parse
//! call that created it. It holds the qualifying JSON-LD object (empty when the
//! page has none), the meta description, and the DOM itself.

use super::selectors::page;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::{Map, Value};
use tracing::debug;

/// JSON-LD `@type` values that describe a vehicle listing
const VEHICLE_TYPES: &[&str] = &["Car", "Vehicle", "Product"];

pub struct ParsedDocument {
    html: Html,
    structured: Map<String, Value>,
    description: String,
}

impl ParsedDocument {
    pub fn parse(body: &str) -> Self {
        let html = Html::parse_document(body);
        let structured = extract_structured_data(&html);
        let description = extract_meta_description(&html);
        debug!(
            structured_keys = structured.len(),
            description_len = description.len(),
            "Parsed document"
        );
        Self {
            html,
            structured,
            description,
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn structured(&self) -> &Map<String, Value> {
        &self.structured
    }

    /// Meta description text (possibly empty)
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Walk a dotted path through the structured data. `null` counts as missing.
    pub fn lookup_path(&self, path: &str) -> Option<&Value> {
        lookup_path(&self.structured, path)
    }

    /// `<title>` text, trimmed
    pub fn title_text(&self) -> Option<String> {
        self.html
            .select(&page::TITLE)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Every text node in document order
    pub fn text_nodes(&self) -> impl Iterator<Item = &str> {
        text_nodes_of(self.html.root_element())
    }

    pub fn any_text_matches(&self, pattern: &Regex) -> bool {
        self.text_nodes().any(|t| pattern.is_match(t))
    }
}

pub fn lookup_path<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for key in segments {
        current = current.as_object()?.get(key)?;
    }
    (!current.is_null()).then_some(current)
}

/// Text nodes below `root`, including its own
pub fn text_nodes_of<'a>(root: ElementRef<'a>) -> impl Iterator<Item = &'a str> {
    root.descendants()
        .filter_map(|node| node.value().as_text().map(|t| &**t))
}

/// Trimmed non-empty text pieces of `el` joined with `separator`
pub fn joined_text(el: ElementRef<'_>, separator: &str) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// First JSON-LD object describing a vehicle, or an object carrying `offers`
fn extract_structured_data(html: &Html) -> Map<String, Value> {
    for script in html.select(&page::JSON_LD) {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(Value::Object(data)) => {
                let typed = data
                    .get("@type")
                    .and_then(Value::as_str)
                    .is_some_and(|t| VEHICLE_TYPES.contains(&t));
                if typed || data.contains_key("offers") {
                    return data;
                }
            }
            Ok(_) => {}
            Err(e) => debug!("Skipping malformed JSON-LD block: {}", e),
        }
    }
    Map::new()
}

fn extract_meta_description(html: &Html) -> String {
    html.select(&page::OG_DESCRIPTION)
        .next()
        .or_else(|| html.select(&page::META_DESCRIPTION).next())
        .and_then(|meta| meta.value().attr("content"))
        .unwrap_or_default()
        .to_string()
}
