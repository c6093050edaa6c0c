//! Filter signature classifier
//!
//! The search form's `<select>` controls carry no usable names. Each one is
//! identified from the shape of its option set by an ordered table of
//! signature rules; the first rule that matches decides the category, and a
//! category already claimed by an earlier control is never replaced. Button
//! groups are found by container id, feature checkboxes by wrapper class, and
//! the numeric ranges are always present.

use super::ContextualParser;
use super::document::joined_text;
use super::selectors::filters;
use crate::domain::{FilterCatalog, FilterDefinition, FilterKind, FilterOption};
use crate::infrastructure::config::ParsingConfig;
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, info};

static COUNT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d+[\.\d]*)\)").unwrap());
static TRAILING_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(\d+[\.\d]*\)$").unwrap());

/// Lowercased labels and raw values of one control's options
#[derive(Debug)]
pub struct OptionSignature {
    labels: Vec<String>,
    values: Vec<String>,
}

impl OptionSignature {
    pub fn of(options: &[FilterOption]) -> Self {
        Self {
            labels: options.iter().map(|o| o.label.to_lowercase()).collect(),
            values: options.iter().map(|o| o.value.clone()).collect(),
        }
    }

    fn has_labels(&self, wanted: &[&str]) -> bool {
        wanted.iter().all(|w| self.labels.iter().any(|l| l == w))
    }

    fn labels_contain(&self, wanted: &[&str]) -> bool {
        wanted.iter().all(|w| self.labels.iter().any(|l| l.contains(w)))
    }

    fn has_values(&self, wanted: &[&str]) -> bool {
        wanted.iter().all(|w| self.values.iter().any(|v| v == w))
    }
}

/// One row of the signature table
pub struct SignatureRule {
    pub category: &'static str,
    /// Human label of the resulting filter
    pub label: &'static str,
    test: fn(&OptionSignature) -> bool,
}

impl SignatureRule {
    pub fn matches(&self, signature: &OptionSignature) -> bool {
        (self.test)(signature)
    }
}

impl std::fmt::Debug for SignatureRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureRule")
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// Evaluated top to bottom; the first match wins
pub static SIGNATURE_RULES: &[SignatureRule] = &[
    SignatureRule {
        category: "fuel_type",
        label: "Καύσιμο",
        test: |s| s.labels_contain(&["βενζίνη", "πετρέλαιο"]),
    },
    SignatureRule {
        category: "euroclass",
        label: "Κλάση Ρύπων",
        test: |s| s.labels_contain(&["euro 6", "euro 5"]),
    },
    SignatureRule {
        category: "exterior_color",
        label: "Χρώμα Εξωτερικό",
        test: |s| s.has_labels(&["ασημί", "μαύρο", "κόκκινο"]),
    },
    SignatureRule {
        category: "exterior_color_type",
        label: "Τύπος Χρώματος",
        test: |s| s.has_labels(&["μεταλλικό", "ματ"]),
    },
    SignatureRule {
        category: "interior_color",
        label: "Χρώμα Εσωτερικό",
        test: |s| s.has_labels(&["μπεζ", "γκρι", "δίχρωμο"]),
    },
    SignatureRule {
        category: "interior_type",
        label: "Σαλόνι",
        test: |s| s.has_labels(&["alcantara", "βελούδο"]),
    },
    SignatureRule {
        category: "media_types",
        label: "Πολυμέσα",
        test: |s| s.has_labels(&["με φωτογραφίες"]),
    },
    SignatureRule {
        category: "kteo",
        label: "ΚΤΕΟ",
        test: |s| s.labels_contain(&["πάνω από 1 χρόνο"]),
    },
    SignatureRule {
        category: "number_plate_ending",
        label: "Πινακίδα",
        test: |s| s.has_labels(&["μονή", "ζυγή"]),
    },
    SignatureRule {
        category: "make",
        label: "Μάρκα",
        test: |s| s.has_labels(&["audi", "bmw"]),
    },
    SignatureRule {
        category: "doors",
        label: "Πόρτες",
        test: |s| s.has_labels(&["2/3", "4/5"]),
    },
    SignatureRule {
        category: "seats",
        label: "Θέσεις",
        test: |s| s.has_values(&["2", "4", "5"]) && s.values.len() > 5,
    },
];

/// First rule matching the option set
pub fn identify(options: &[FilterOption]) -> Option<&'static SignatureRule> {
    let signature = OptionSignature::of(options);
    SIGNATURE_RULES.iter().find(|rule| rule.matches(&signature))
}

/// (container id, label)
pub const BUTTON_GROUPS: &[(&str, &str)] = &[
    ("gearbox_type", "Σασμάν"),
    ("drive_type", "Κίνηση"),
    ("seller_type", "Τύπος Πωλητή"),
    ("crashed", "Ζημιά"),
    ("audit_options", "Τεχνικοί Έλεγχοι"),
];

/// Button caption → query value, for buttons without a `value` attribute
const BUTTON_VALUES: &[(&str, &str)] = &[
    ("Χειροκίνητο", "manual"),
    ("Αυτόματο", "automatic"),
    ("Ημιαυτόματο", "semi_automatic"),
    ("Προσθιοκίνητο (FWD)", "fwd"),
    ("Πισωκίνητο (RWD)", "rwd"),
    ("Τετρακίνητο (4x4)", "4x4"),
    ("Έμπορος", "dealer"),
    ("Ιδιώτης", "private"),
    ("Όλα", ""),
    ("Με ζημιά", "t"),
    ("Χωρίς ζημιά", "f"),
];

/// (category, label); query key is `{category}-from / {category}-to`
pub const RANGE_FILTERS: &[(&str, &str)] = &[
    ("price", "Τιμή (€)"),
    ("registration", "Χρονολογία"),
    ("mileage", "Χιλιόμετρα"),
    ("engine_size", "Κυβικά (cc)"),
    ("engine_power", "Ιπποδύναμη (bhp)"),
];

pub const FEATURE_CATEGORY: &str = "feature";
const FEATURE_LABEL: &str = "Ιδιαιτερότητες / Έξτρα";
/// Shortest code accepted as a real feature id
const MIN_FEATURE_CODE_LEN: usize = 3;

/// `"Βενζίνη (1.234)"` → `Some(1234)`
pub fn extract_count(text: &str) -> Option<u64> {
    COUNT_SUFFIX
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().replace('.', "").parse().ok())
}

/// `"Βενζίνη (1.234)"` → `"Βενζίνη"`
pub fn clean_label(text: &str) -> String {
    TRAILING_COUNT.replace(text, "").trim().to_string()
}

pub struct FilterClassifier {
    placeholders: Vec<String>,
}

impl FilterClassifier {
    pub fn new() -> Self {
        Self::with_config(&ParsingConfig::default())
    }

    pub fn with_config(config: &ParsingConfig) -> Self {
        Self {
            placeholders: config.placeholder_labels.clone(),
        }
    }

    /// Classify every control on a search form page
    pub fn classify_controls(&self, html: &Html) -> FilterCatalog {
        let mut catalog = FilterCatalog::new();

        for (index, select) in html.select(&filters::SELECT).enumerate() {
            let options = self.select_options(select);
            if options.is_empty() {
                continue;
            }
            match identify(&options) {
                Some(rule) => {
                    let definition =
                        FilterDefinition::new(rule.category, rule.label, FilterKind::Select, options);
                    if catalog.insert_first(rule.category, definition) {
                        debug!("select #{} → {}", index, rule.category);
                    } else {
                        debug!("select #{} matched {} again, keeping the first", index, rule.category);
                    }
                }
                None => debug!("select #{} ({} options) matched no signature", index, options.len()),
            }
        }

        for (container_id, label) in BUTTON_GROUPS {
            let options = button_group_options(html, container_id);
            if !options.is_empty() {
                catalog.insert_first(
                    *container_id,
                    FilterDefinition::new(*container_id, *label, FilterKind::ButtonGroup, options),
                );
            }
        }

        let features = feature_options(html);
        if !features.is_empty() {
            catalog.insert_first(
                FEATURE_CATEGORY,
                FilterDefinition::new(FEATURE_CATEGORY, FEATURE_LABEL, FilterKind::Checkbox, features),
            );
        }

        for (key, label) in RANGE_FILTERS {
            catalog.insert_first(
                *key,
                FilterDefinition::new(format!("{key}-from / {key}-to"), *label, FilterKind::Range, Vec::new()),
            );
        }

        catalog
    }

    /// Options of one `<select>`, placeholders removed and counts split off
    pub fn select_options(&self, select: ElementRef<'_>) -> Vec<FilterOption> {
        select
            .select(&filters::OPTION)
            .filter_map(|option| {
                let value = option.value().attr("value").unwrap_or_default();
                let raw = joined_text(option, "");
                if value.is_empty() || raw.is_empty() || self.is_placeholder(&raw) {
                    return None;
                }
                Some(FilterOption::new(clean_label(&raw), value).with_count(extract_count(&raw)))
            })
            .collect()
    }

    fn is_placeholder(&self, text: &str) -> bool {
        self.placeholders.iter().any(|p| p == text)
    }
}

impl Default for FilterClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextualParser for FilterClassifier {
    type Output = FilterCatalog;
    type Context = str;

    /// Fails when the page yields no enumerated category at all
    fn parse_with_context(&self, body: &str, search_url: &str) -> ParsingResult<FilterCatalog> {
        let html = Html::parse_document(body);
        let catalog = self.classify_controls(&html);
        let controls_seen = html.select(&filters::SELECT).count();

        if catalog.enumerated_len() == 0 {
            return Err(ParsingError::no_filters_found(search_url, controls_seen));
        }

        info!(
            "🧭 Classified {} filter categories from {} selects on {}",
            catalog.len(),
            controls_seen,
            search_url
        );
        Ok(catalog)
    }
}

fn button_group_options(html: &Html, container_id: &str) -> Vec<FilterOption> {
    let Some(container) = html
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().id() == Some(container_id))
    else {
        return Vec::new();
    };

    container
        .select(&filters::BUTTON)
        .filter_map(|button| {
            let text = joined_text(button, "");
            let value = button
                .value()
                .attr("value")
                .filter(|v| !v.is_empty())
                .or_else(|| {
                    BUTTON_VALUES
                        .iter()
                        .find(|(caption, _)| *caption == text)
                        .map(|(_, value)| *value)
                })?;
            (!text.is_empty() && !value.is_empty()).then(|| FilterOption::new(text.clone(), value))
        })
        .collect()
}

fn feature_options(html: &Html) -> Vec<FilterOption> {
    let mut seen = std::collections::HashSet::new();
    let mut options: Vec<FilterOption> = html
        .select(&filters::CHECKBOX_WRAPPER)
        .filter_map(|wrapper| {
            let input = wrapper.select(&filters::INPUT).next()?;
            let label = wrapper.select(&filters::LABEL).next()?;
            let code = input
                .value()
                .attr("value")
                .filter(|v| !v.is_empty())
                .or_else(|| input.value().attr("name"))?;
            let is_code = code.len() >= MIN_FEATURE_CODE_LEN && code.chars().all(|c| c.is_ascii_digit());
            (is_code && seen.insert(code.to_string()))
                .then(|| FilterOption::new(joined_text(label, ""), code))
        })
        .collect();
    options.sort_by(|a, b| a.label.cmp(&b.label));
    options
}
