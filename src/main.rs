//! car-listings command line
//!
//! ```text
//! car-listings [--config PATH] listing <id|path|url>
//! car-listings [--config PATH] search <url>
//! car-listings [--config PATH] filters [--refresh]
//! ```
//! Results are printed to stdout as pretty JSON; logs go to stderr.

use anyhow::{Context, Result, bail};
use car_listings::application::{FilterCache, ListingService};
use car_listings::domain::FilterCatalog;
use car_listings::infrastructure::config::ConfigManager;
use car_listings::infrastructure::logging;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

const USAGE: &str = "usage: car-listings [--config PATH] <listing ID | search URL | filters [--refresh]>";

enum Command {
    Listing(String),
    Search(String),
    Filters { refresh: bool },
}

fn parse_args(mut args: Vec<String>) -> Result<(Option<String>, Command)> {
    let mut config_path = None;
    if args.first().map(String::as_str) == Some("--config") {
        if args.len() < 2 {
            bail!("--config needs a path\n{USAGE}");
        }
        config_path = Some(args.remove(1));
        args.remove(0);
    }

    let command = match args.first().map(String::as_str) {
        Some("listing") => Command::Listing(args.get(1).cloned().context(USAGE)?),
        Some("search") => Command::Search(args.get(1).cloned().context(USAGE)?),
        Some("filters") => Command::Filters {
            refresh: args.get(1).is_some_and(|a| a == "--refresh"),
        },
        _ => bail!("{USAGE}"),
    };
    Ok((config_path, command))
}

/// Catalog for the `filters` command; a forced refresh replaces the startup warm
async fn load_catalog(cache: &FilterCache, warm_on_startup: bool, refresh: bool) -> Result<Arc<FilterCatalog>> {
    if !refresh && warm_on_startup && !cache.warm().await {
        info!("Continuing without a warm filter cache");
    }
    cache.get(refresh).await
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config_path, command) = parse_args(std::env::args().skip(1).collect())?;

    let config = match config_path {
        Some(path) => ConfigManager::load_from(path).await?,
        None => ConfigManager::new()?.load_config().await?,
    };
    logging::init_logging_with_config(config.logging.clone())?;
    logging::log_system_info();

    let warm_on_startup = config.cache.warm_on_startup;
    let cache_config = config.cache.clone();
    let service = Arc::new(ListingService::new(config)?);

    match command {
        Command::Listing(id) => print_json(&service.resolve_listing(&id).await?)?,
        Command::Search(url) => print_json(&service.resolve_search_page(&url).await?)?,
        Command::Filters { refresh } => {
            let cache = FilterCache::from_config(service.clone(), &cache_config);
            let catalog = load_catalog(&cache, warm_on_startup, refresh).await?;
            print_json(&*catalog)?;
        }
    }

    Ok(())
}
