//! Listing service: the fetch-then-parse pipelines behind every entry point
//!
//! Each call opens its own fetch session, so independent calls share no
//! mutable fetch state and can run concurrently.

use super::filter_cache::CatalogProducer;
use crate::domain::{Car, CarSummary, FilterCatalog, ListingRef};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::http_client::{FetchSession, HttpTransport, ReqwestTransport};
use crate::infrastructure::parsing::{
    ContextualParser, FilterClassifier, ListingParser, SearchResultsParser,
};
use crate::infrastructure::parsing_error::FetchResult;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Builds the transport for a new session (one cookie jar per session)
pub type TransportFactory =
    Arc<dyn Fn() -> FetchResult<Arc<dyn HttpTransport>> + Send + Sync>;

pub struct ListingService {
    config: AppConfig,
    listing_parser: ListingParser,
    search_parser: SearchResultsParser,
    classifier: FilterClassifier,
    transports: TransportFactory,
}

impl ListingService {
    /// Service backed by real HTTP
    pub fn new(config: AppConfig) -> Result<Self> {
        let http = config.http.clone();
        let factory: TransportFactory = Arc::new(move || {
            let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::from_config(&http)?);
            Ok(transport)
        });
        Self::with_transport_factory(config, factory)
    }

    pub fn with_transport_factory(config: AppConfig, transports: TransportFactory) -> Result<Self> {
        let listing_parser = ListingParser::with_config(&config.parsing)
            .context("Failed to compile listing field rules")?;
        let search_parser = SearchResultsParser::new(config.site.clone());
        let classifier = FilterClassifier::with_config(&config.parsing);

        Ok(Self {
            config,
            listing_parser,
            search_parser,
            classifier,
            transports,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    async fn open_session(&self, warmup: bool) -> Result<FetchSession> {
        let transport = (self.transports)().context("Failed to create HTTP transport")?;
        Ok(if warmup {
            FetchSession::establish(transport, &self.config).await
        } else {
            FetchSession::new(transport, &self.config)
        })
    }

    /// Fetch and parse one listing page
    pub async fn resolve_listing(&self, path_or_id: &str) -> Result<Car> {
        let site = &self.config.site;
        let listing = ListingRef::resolve(path_or_id, &site.base_url, &site.listing_view_path);
        info!("🚗 Resolving listing {}", listing);

        let session = self.open_session(true).await?;
        let body = session
            .fetch_text(listing.url())
            .await
            .with_context(|| format!("Failed to fetch listing {}", listing))?;

        let car = self
            .listing_parser
            .parse_with_context(&body, &listing)
            .with_context(|| format!("Failed to parse listing {}", listing))?;
        Ok(car)
    }

    /// Fetch and parse one search results page
    pub async fn resolve_search_page(&self, url: &str) -> Result<Vec<CarSummary>> {
        let session = self.open_session(true).await?;
        let body = session
            .fetch_text(url)
            .await
            .with_context(|| format!("Failed to fetch search page {}", url))?;

        let results = self
            .search_parser
            .parse_with_context(&body, url)
            .with_context(|| format!("Failed to parse search page {}", url))?;
        Ok(results)
    }

    /// Fetch the search form and classify its controls
    pub async fn build_filter_catalog(&self) -> Result<FilterCatalog> {
        let search_url = self.config.site.search_url();
        let session = self.open_session(false).await?;
        let body = session
            .fetch_text(&search_url)
            .await
            .with_context(|| format!("Failed to fetch search form {}", search_url))?;

        let catalog = self
            .classifier
            .parse_with_context(&body, &search_url)
            .with_context(|| format!("Failed to classify filters on {}", search_url))?;
        Ok(catalog)
    }
}

#[async_trait]
impl CatalogProducer for ListingService {
    async fn produce(&self) -> Result<FilterCatalog> {
        self.build_filter_catalog().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::TimingConfig;
    use crate::infrastructure::http_client::test_support::{ScriptedTransport, response};
    use crate::infrastructure::parsing_error::{FetchError, ParsingError};

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.http.max_requests_per_second = 0;
        config.timing = TimingConfig::immediate();
        config
    }

    fn service(transport: Arc<ScriptedTransport>) -> ListingService {
        let transport: Arc<dyn HttpTransport> = transport;
        let factory: TransportFactory = Arc::new(move || Ok(Arc::clone(&transport)));
        ListingService::with_transport_factory(config(), factory).unwrap()
    }

    #[tokio::test]
    async fn listing_fetch_warms_up_then_requests_listing_url() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(Ok(response(200, "<html></html>")));
        transport.push(Ok(response(
            200,
            r#"<script type="application/ld+json">{"@type": "Car", "name": "BMW 320d 2019", "manufacturer": "BMW"}</script>"#,
        )));

        let car = service(transport.clone()).resolve_listing("41234567").await.unwrap();

        assert_eq!(car.model.as_deref(), Some("320d"));
        assert_eq!(
            transport.requests(),
            vec![
                "https://www.car.gr".to_string(),
                "https://www.car.gr/classifieds/cars/view/41234567".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn exhausted_fetch_surfaces_as_error() {
        let transport = Arc::new(ScriptedTransport::always(503));
        let err = service(transport).resolve_listing("1").await.unwrap_err();

        let fetch = err.downcast_ref::<FetchError>().unwrap();
        assert_eq!(fetch.status_code(), Some(503));
    }

    #[tokio::test]
    async fn filter_catalog_skips_warmup() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(Ok(response(
            200,
            r#"<select><option value="1">Βενζίνη (120)</option><option value="2">Πετρέλαιο (300)</option></select>"#,
        )));

        let catalog = service(transport.clone()).build_filter_catalog().await.unwrap();

        assert!(catalog.contains("fuel_type"));
        assert_eq!(transport.requests(), vec!["https://www.car.gr/classifieds/cars/".to_string()]);
    }

    #[tokio::test]
    async fn empty_form_is_a_parsing_error() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push(Ok(response(200, "<html><body>maintenance</body></html>")));

        let err = service(transport).build_filter_catalog().await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ParsingError>(),
            Some(ParsingError::NoFiltersFound { .. })
        ));
    }
}
