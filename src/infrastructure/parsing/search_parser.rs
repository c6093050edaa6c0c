//! Search results parser
//!
//! Result cards carry no stable classes, so every anchor pointing at a
//! listing is taken as a result and the nearest ancestor holding an image is
//! read as its card.

use super::ContextualParser;
use super::document::{joined_text, text_nodes_of};
use super::numeric::parse_float;
use super::selectors::search;
use crate::domain::CarSummary;
use crate::infrastructure::config::SiteConfig;
use crate::infrastructure::parsing_error::ParsingResult;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use tracing::{debug, info};

static LISTING_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:classifieds/cars/view/|used-cars/)(\d+)").unwrap());
static PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\d.]+)\s*€").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b").unwrap());
static YEAR_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(19|20)\d{2}$").unwrap());
static KM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)([\d.]+)\s*Km").unwrap());
static LOCATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z]{3,}(?:\s+[A-Z]+)*)\s+\d{5}").unwrap());
static GALLERY_COUNTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\s*/\s*\d+\s*").unwrap());
static CARD_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Promoted|In tallment|Installment").unwrap());

/// How far up from the anchor a card container is searched for
const MAX_CARD_DEPTH: usize = 5;
const CARD_TAGS: &[&str] = &["li", "article", "div"];

const FUEL_TYPES: &[&str] = &[
    "Petrol", "Diesel", "Electric", "Hybrid", "LPG", "CNG", "Βενζίνη", "Πετρέλαιο", "Ηλεκτρικό",
    "Υβριδικό",
];
const DEALER_WORDS: &[&str] = &["dealer", "έμπορος", "επαγγελματίας"];

pub struct SearchResultsParser {
    site: SiteConfig,
}

impl SearchResultsParser {
    pub fn new(site: SiteConfig) -> Self {
        Self { site }
    }

    /// Summaries in page order, one per listing id
    pub fn parse_results(&self, body: &str) -> Vec<CarSummary> {
        let html = Html::parse_document(body);
        let mut seen = HashSet::new();
        let mut results = Vec::new();

        for anchor in html.select(&search::ANCHOR) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(car_id) = LISTING_HREF
                .captures(href)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
            else {
                continue;
            };
            if !seen.insert(car_id.clone()) {
                continue;
            }

            let card = find_card(anchor);
            results.push(self.summarize(car_id, href, card));
        }

        results
    }

    fn summarize(&self, car_id: String, href: &str, card: ElementRef<'_>) -> CarSummary {
        let text = card.text().collect::<String>();
        let lower = text.to_lowercase();
        let title = extract_title(card);

        CarSummary {
            url: self.site.resolve_url(href),
            year: title.as_deref().and_then(extract_year),
            title,
            price: PRICE
                .captures(&text)
                .and_then(|c| c.get(1))
                .and_then(|m| parse_float(m.as_str())),
            km: extract_km(card),
            fueltype: FUEL_TYPES
                .iter()
                .find(|fuel| lower.contains(&fuel.to_lowercase()))
                .map(|fuel| (*fuel).to_string()),
            transmission: extract_transmission(&lower),
            location: LOCATION
                .captures(&text)
                .and_then(|c| c.get(1))
                .map(|m| title_case(m.as_str())),
            thumbnail: self.extract_thumbnail(card),
            is_dealer: DEALER_WORDS.iter().any(|w| lower.contains(w)),
            car_id,
        }
    }

    fn extract_thumbnail(&self, card: ElementRef<'_>) -> Option<String> {
        let img = first_descendant(card, &search::IMAGE)?;
        let src = ["src", "data-src", "data-lazy-src"]
            .iter()
            .filter_map(|attr| img.value().attr(attr))
            .find(|v| !v.is_empty())?;
        if src.starts_with("data:") {
            return None;
        }
        Some(self.site.resolve_url(src))
    }
}

impl ContextualParser for SearchResultsParser {
    type Output = Vec<CarSummary>;
    type Context = str;

    fn parse_with_context(&self, body: &str, page_url: &str) -> ParsingResult<Vec<CarSummary>> {
        let results = self.parse_results(body);
        info!("🔍 {} listings on {}", results.len(), page_url);
        Ok(results)
    }
}

/// Nearest `li`/`article`/`div` ancestor with an image, else the element reached after five steps
fn find_card(anchor: ElementRef<'_>) -> ElementRef<'_> {
    let mut card = anchor;
    for _ in 0..MAX_CARD_DEPTH {
        let Some(parent) = card.parent().and_then(ElementRef::wrap) else {
            break;
        };
        if CARD_TAGS.contains(&parent.value().name())
            && first_descendant(parent, &search::IMAGE).is_some()
        {
            return parent;
        }
        card = parent;
    }
    debug!("No image card around {:?}", anchor.value().attr("href"));
    card
}

/// First matching element strictly below `root`
fn first_descendant<'a>(root: ElementRef<'a>, selector: &scraper::Selector) -> Option<ElementRef<'a>> {
    root.select(selector).find(|el| el.id() != root.id())
}

fn extract_title(card: ElementRef<'_>) -> Option<String> {
    if let Some(alt) = first_descendant(card, &search::IMAGE)
        .and_then(|img| img.value().attr("alt"))
        .filter(|alt| !alt.is_empty())
    {
        return Some(alt.to_string());
    }

    let link = first_descendant(card, &search::ANCHOR)?;
    let text = joined_text(link, " ");
    let text = GALLERY_COUNTER.replace(&text, "");
    let text = CARD_NOISE.replace_all(&text, "");
    let parts: Vec<&str> = text.split_whitespace().collect();

    if parts.len() > 3 {
        if let Some(year_at) = parts.iter().position(|p| YEAR_WORD.is_match(p)) {
            return Some(parts[..=year_at].join(" "));
        }
    }
    (!parts.is_empty()).then(|| parts.iter().take(5).copied().collect::<Vec<_>>().join(" "))
}

fn extract_year(title: &str) -> Option<i32> {
    YEAR.find(title).and_then(|m| m.as_str().parse().ok())
}

fn extract_km(card: ElementRef<'_>) -> Option<f64> {
    text_nodes_of(card)
        .find_map(|t| KM.captures(t))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().replace('.', "").parse().ok())
}

fn extract_transmission(lower: &str) -> Option<String> {
    if lower.contains("automatic") || lower.contains("αυτόματο") {
        Some("Automatic".to_string())
    } else if lower.contains("manual") || lower.contains("χειροκίνητο") {
        Some("Manual".to_string())
    } else {
        None
    }
}

/// `"NEA SMYRNI"` → `"Nea Smyrni"`
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut boundary = true;
    for c in s.chars() {
        if boundary {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        boundary = !c.is_alphabetic();
    }
    out
}
