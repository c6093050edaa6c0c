//! Search filter catalog types
//!
//! The catalog is rebuilt from the search form on every classification pass.
//! A category is claimed by the first control identified for it; later
//! controls never overwrite an existing entry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One selectable value of a filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption {
    pub label: String,
    pub value: String,
    pub count: Option<u64>,
}

impl FilterOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            count: None,
        }
    }

    pub fn with_count(mut self, count: Option<u64>) -> Self {
        self.count = count;
        self
    }
}

/// How a filter is presented on the search form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Select,
    Checkbox,
    ButtonGroup,
    Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub query_param: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FilterKind,
    pub options: Vec<FilterOption>,
}

impl FilterDefinition {
    pub fn new(
        query_param: impl Into<String>,
        label: impl Into<String>,
        kind: FilterKind,
        options: Vec<FilterOption>,
    ) -> Self {
        Self {
            query_param: query_param.into(),
            label: label.into(),
            kind,
            options,
        }
    }
}

/// Category name → filter definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterCatalog {
    filters: BTreeMap<String, FilterDefinition>,
}

impl FilterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the category is already claimed. Returns whether it was inserted.
    pub fn insert_first(&mut self, category: impl Into<String>, definition: FilterDefinition) -> bool {
        match self.filters.entry(category.into()) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(definition);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, category: &str) -> Option<&FilterDefinition> {
        self.filters.get(category)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.filters.contains_key(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterDefinition)> {
        self.filters.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Number of categories backed by enumerated options (everything but ranges)
    pub fn enumerated_len(&self) -> usize {
        self.filters
            .values()
            .filter(|d| d.kind != FilterKind::Range)
            .count()
    }

    /// Content hash of the catalog, stable across passes over an unchanged form
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_vec(&self.filters).unwrap_or_default();
        blake3::hash(&canonical).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(label: &str) -> FilterDefinition {
        FilterDefinition::new("make", label, FilterKind::Select, vec![FilterOption::new("Audi", "12")])
    }

    #[test]
    fn first_definition_wins() {
        let mut catalog = FilterCatalog::new();
        assert!(catalog.insert_first("make", select("first")));
        assert!(!catalog.insert_first("make", select("second")));
        assert_eq!(catalog.get("make").map(|d| d.label.as_str()), Some("first"));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let mut a = FilterCatalog::new();
        a.insert_first("make", select("Μάρκα"));
        let mut b = FilterCatalog::new();
        b.insert_first("make", select("Μάρκα"));
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.insert_first("price", FilterDefinition::new("price-from / price-to", "Τιμή (€)", FilterKind::Range, vec![]));
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(b.enumerated_len(), 1);
    }

    #[test]
    fn serializes_as_plain_mapping() {
        let mut catalog = FilterCatalog::new();
        catalog.insert_first("make", select("Μάρκα"));
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json["make"]["type"], "select");
        assert_eq!(json["make"]["options"][0]["value"], "12");
    }
}
