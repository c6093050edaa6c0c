//! DOM table locator
//!
//! Listing pages render each attribute as a row element carrying a
//! layout class, with the label in one child and the value in the last one.
//! Lookups never fail loudly: a missing label, row or value cell is `None`.

use super::document::joined_text;
use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::trace;

/// Compiled matcher for one grid label
#[derive(Debug, Clone)]
pub struct TableLabel {
    label: String,
    /// Whole-node match, surrounding whitespace allowed
    node: Regex,
    /// A copy of the label leaking into the value cell
    leading: Regex,
}

impl TableLabel {
    pub fn new(label: &str) -> ParsingResult<Self> {
        let escaped = regex::escape(label);
        let node = Regex::new(&format!(r"^\s*{escaped}\s*$"))
            .map_err(|e| ParsingError::invalid_pattern(label, e))?;
        let leading = Regex::new(&format!(r"(?i)^{escaped}"))
            .map_err(|e| ParsingError::invalid_pattern(label, e))?;
        Ok(Self {
            label: label.to_string(),
            node,
            leading,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TableLocator {
    row_class: String,
}

impl TableLocator {
    pub fn new(row_class: impl Into<String>) -> Self {
        Self {
            row_class: row_class.into(),
        }
    }

    /// Value text of the grid row labelled `label`
    pub fn locate(&self, label: &TableLabel, html: &Html) -> Option<String> {
        let label_node = html
            .root_element()
            .descendants()
            .find(|node| node.value().as_text().is_some_and(|t| label.node.is_match(t)))?;

        let row = label_node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().classes().any(|c| c == self.row_class))?;

        let cells: Vec<ElementRef<'_>> = row.children().filter_map(ElementRef::wrap).collect();
        if cells.len() < 2 {
            trace!("Row for '{}' has {} cells", label.label, cells.len());
            return None;
        }

        let text = joined_text(*cells.last()?, " ");
        let value = label.leading.replace(&text, "").trim().to_string();
        trace!("Table '{}' => '{}'", label.label, value);
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &str) -> Html {
        Html::parse_document(&format!("<html><body><section>{rows}</section></body></html>"))
    }

    fn locate(label: &str, html: &Html) -> Option<String> {
        TableLocator::new("tw-grid").locate(&TableLabel::new(label).unwrap(), html)
    }

    #[test]
    fn reads_last_cell_of_labelled_row() {
        let html = grid(
            r#"<div class="tw-grid tw-grid-cols-2">
                 <div><span> Χρώμα </span></div>
                 <div><span>Μαύρο</span>
                      <span>Μεταλλικό</span></div>
               </div>"#,
        );
        assert_eq!(locate("Χρώμα", &html).as_deref(), Some("Μαύρο Μεταλλικό"));
    }

    #[test]
    fn strips_leaked_label_case_insensitively() {
        let html = grid(
            r#"<div class="tw-grid"><div>Πόρτες</div><div>πόρτες 5</div></div>"#,
        );
        assert_eq!(locate("Πόρτες", &html).as_deref(), Some("5"));
    }

    #[test]
    fn label_must_match_whole_text_node() {
        let html = grid(r#"<div class="tw-grid"><div>Χρώμα εσωτερικό</div><div>Μαύρο</div></div>"#);
        assert_eq!(locate("Χρώμα", &html), None);
    }

    #[test]
    fn missing_row_or_value_cell_is_absent() {
        let no_row = grid(r#"<div class="row"><div>Χρώμα</div><div>Μαύρο</div></div>"#);
        assert_eq!(locate("Χρώμα", &no_row), None);

        let one_cell = grid(r#"<div class="tw-grid"><div>Χρώμα</div></div>"#);
        assert_eq!(locate("Χρώμα", &one_cell), None);

        assert_eq!(locate("Κατηγορία", &one_cell), None);
    }

    #[test]
    fn labels_with_regex_metacharacters_are_literal() {
        let html = grid(r#"<div class="tw-grid"><div>Τιμή (€)</div><div>9.500</div></div>"#);
        assert_eq!(locate("Τιμή (€)", &html).as_deref(), Some("9.500"));
    }
}
