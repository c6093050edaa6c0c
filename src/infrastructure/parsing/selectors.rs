//! CSS selectors for car.gr pages
//!
//! Update this file when the site changes its markup, then add a fixture
//! reproducing the new layout to the integration tests.

use once_cell::sync::Lazy;
use scraper::Selector;

fn compile(css: &str) -> Selector {
    // Literal selectors only; a failure here is a programming error
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e}"))
}

/// Selectors shared by every page type
pub mod page {
    use super::*;

    /// Embedded structured-data blocks
    pub static JSON_LD: Lazy<Selector> =
        Lazy::new(|| compile(r#"script[type="application/ld+json"]"#));

    pub static OG_DESCRIPTION: Lazy<Selector> =
        Lazy::new(|| compile(r#"meta[property="og:description"]"#));

    pub static META_DESCRIPTION: Lazy<Selector> =
        Lazy::new(|| compile(r#"meta[name="description"]"#));

    pub static TITLE: Lazy<Selector> = Lazy::new(|| compile("title"));
}

/// Listing page selectors
pub mod listing {
    use super::*;

    /// Free-text description block, used when structured data has none
    pub static DESCRIPTION: Lazy<Selector> = Lazy::new(|| compile("div.description"));

    pub static SELLER_INFO: Lazy<Selector> = Lazy::new(|| compile("div.main-seller-info"));

    /// Dealer name link inside the seller box
    pub static SELLER_LINK: Lazy<Selector> = Lazy::new(|| compile(r#"a[class*="tw-text-lg"]"#));

    pub static LOCATION_PIN: Lazy<Selector> = Lazy::new(|| compile("svg.ci-location-pin"));
}

/// Search results page selectors
pub mod search {
    use super::*;

    pub static ANCHOR: Lazy<Selector> = Lazy::new(|| compile("a[href]"));

    pub static IMAGE: Lazy<Selector> = Lazy::new(|| compile("img"));
}

/// Search form selectors
pub mod filters {
    use super::*;

    pub static SELECT: Lazy<Selector> = Lazy::new(|| compile("select"));

    pub static OPTION: Lazy<Selector> = Lazy::new(|| compile("option"));

    pub static BUTTON: Lazy<Selector> = Lazy::new(|| compile("button"));

    pub static CHECKBOX_WRAPPER: Lazy<Selector> = Lazy::new(|| compile("div.c-checkbox-wrapper"));

    pub static INPUT: Lazy<Selector> = Lazy::new(|| compile("input"));

    pub static LABEL: Lazy<Selector> = Lazy::new(|| compile("label"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn all_selectors_compile() {
        let doc = Html::parse_document("<html><head><title>t</title></head><body></body></html>");
        for selector in [
            &*page::JSON_LD,
            &*page::OG_DESCRIPTION,
            &*page::META_DESCRIPTION,
            &*listing::DESCRIPTION,
            &*listing::SELLER_INFO,
            &*listing::SELLER_LINK,
            &*listing::LOCATION_PIN,
            &*search::ANCHOR,
            &*search::IMAGE,
            &*filters::SELECT,
            &*filters::OPTION,
            &*filters::BUTTON,
            &*filters::CHECKBOX_WRAPPER,
            &*filters::INPUT,
            &*filters::LABEL,
        ] {
            let _ = doc.select(selector).count();
        }
        assert_eq!(doc.select(&page::TITLE).count(), 1);
    }
}
