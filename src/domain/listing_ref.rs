use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static LISTING_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").unwrap());

/// A listing identified by the caller as an id, a site path or a full URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRef {
    /// Numeric listing id (the raw input when it carries no digits)
    pub listing_id: String,
    /// Absolute URL of the listing page
    pub url: String,
}

impl ListingRef {
    /// Resolve a path-or-id against the site base URL and listing view path
    pub fn resolve(path_or_id: &str, base_url: &str, view_path: &str) -> Self {
        let raw = path_or_id.trim();
        let listing_id = LISTING_ID
            .captures(raw)
            .and_then(|c| c.get(1))
            .map_or_else(|| raw.to_string(), |m| m.as_str().to_string());

        let base = base_url.trim_end_matches('/');
        let url = if raw.starts_with("http") {
            raw.to_string()
        } else if raw.starts_with('/') {
            format!("{base}{raw}")
        } else {
            format!("{base}{view_path}{raw}")
        };

        Self { listing_id, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl From<ListingRef> for String {
    fn from(listing: ListingRef) -> Self {
        listing.url
    }
}

impl AsRef<str> for ListingRef {
    fn as_ref(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for ListingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id: {})", self.url, self.listing_id)
    }
}
