//! Filter catalog cache with stale fallback
//!
//! One slot, one lock. A refresh that fails is answered with the last catalog
//! that was produced successfully, if there is one. The lock is held across
//! the producer call, so concurrent callers wait for the refresh in flight
//! instead of starting their own.

use crate::domain::FilterCatalog;
use crate::infrastructure::config::CacheConfig;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Source of fresh catalogs
#[async_trait]
pub trait CatalogProducer: Send + Sync {
    async fn produce(&self) -> Result<FilterCatalog>;
}

#[derive(Debug)]
struct CachedCatalog {
    catalog: Arc<FilterCatalog>,
    stored_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entry: Option<CachedCatalog>,
    /// Survives invalidation and expiry
    last_good: Option<Arc<FilterCatalog>>,
}

pub struct FilterCache {
    producer: Arc<dyn CatalogProducer>,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl FilterCache {
    pub fn new(producer: Arc<dyn CatalogProducer>, ttl: Duration) -> Self {
        Self {
            producer,
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn from_config(producer: Arc<dyn CatalogProducer>, config: &CacheConfig) -> Self {
        Self::new(producer, config.filter_ttl())
    }

    /// Cached catalog while fresh, otherwise a refresh (or the stale fallback)
    pub async fn get(&self, force_refresh: bool) -> Result<Arc<FilterCatalog>> {
        let mut state = self.state.lock().await;

        if !force_refresh {
            if let Some(entry) = &state.entry {
                if entry.stored_at.elapsed() < self.ttl {
                    debug!("Filter cache hit");
                    return Ok(Arc::clone(&entry.catalog));
                }
            }
        }

        info!(force_refresh, "Filter cache miss, fetching fresh data");
        self.refresh(&mut state).await
    }

    async fn refresh(&self, state: &mut CacheState) -> Result<Arc<FilterCatalog>> {
        match self.producer.produce().await {
            Ok(fresh) => {
                let fresh = Arc::new(fresh);
                if let Some(previous) = &state.last_good {
                    let (old, new) = (previous.fingerprint(), fresh.fingerprint());
                    if old != new {
                        info!(old = %&old[..12], new = %&new[..12], "Filter catalog changed upstream");
                    }
                }
                state.entry = Some(CachedCatalog {
                    catalog: Arc::clone(&fresh),
                    stored_at: Instant::now(),
                });
                state.last_good = Some(Arc::clone(&fresh));
                info!(categories = fresh.len(), "Cached fresh filter catalog");
                Ok(fresh)
            }
            Err(e) => {
                error!("Failed to fetch filter catalog: {:#}", e);
                match &state.last_good {
                    Some(stale) => {
                        warn!("Serving stale filter catalog after refresh failure");
                        Ok(Arc::clone(stale))
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Force one refresh; reports failure instead of returning it
    pub async fn warm(&self) -> bool {
        match self.get(true).await {
            Ok(_) => {
                info!("Filter cache warmed");
                true
            }
            Err(e) => {
                error!("Failed to warm filter cache: {:#}", e);
                false
            }
        }
    }

    /// Drop the fresh entry; the stale fallback stays
    pub async fn invalidate(&self) {
        self.state.lock().await.entry = None;
        info!("Filter cache invalidated");
    }

    /// Whether an unexpired entry is present
    pub async fn is_cached(&self) -> bool {
        self.state
            .lock()
            .await
            .entry
            .as_ref()
            .is_some_and(|e| e.stored_at.elapsed() < self.ttl)
    }

    pub async fn has_stale_fallback(&self) -> bool {
        self.state.lock().await.last_good.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FilterDefinition, FilterKind, FilterOption};
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Succeeds for the first `successes` calls, then fails
    struct CountingProducer {
        calls: AtomicUsize,
        successes: usize,
    }

    impl CountingProducer {
        fn new(successes: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                successes,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CatalogProducer for CountingProducer {
        async fn produce(&self) -> Result<FilterCatalog> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.successes {
                return Err(anyhow!("upstream unavailable"));
            }
            let mut catalog = FilterCatalog::new();
            catalog.insert_first(
                "make",
                FilterDefinition::new(
                    "make",
                    "Μάρκα",
                    FilterKind::Select,
                    vec![FilterOption::new(format!("Make {call}"), call.to_string())],
                ),
            );
            Ok(catalog)
        }
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn second_get_within_ttl_hits_cache() {
        let producer = CountingProducer::new(usize::MAX);
        let cache = FilterCache::new(producer.clone(), TTL);

        let first = cache.get(false).await.unwrap();
        let second = cache.get(false).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(producer.calls(), 1);
        assert!(cache.is_cached().await);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_refreshed() {
        let producer = CountingProducer::new(usize::MAX);
        let cache = FilterCache::new(producer.clone(), TTL);

        cache.get(false).await.unwrap();
        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        assert!(!cache.is_cached().await);

        let refreshed = cache.get(false).await.unwrap();
        assert_eq!(producer.calls(), 2);
        assert_eq!(refreshed.get("make").unwrap().options[0].value, "1");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_serves_last_good() {
        let producer = CountingProducer::new(1);
        let cache = FilterCache::new(producer.clone(), TTL);

        let first = cache.get(false).await.unwrap();
        for _ in 0..3 {
            let served = cache.get(true).await.unwrap();
            assert!(Arc::ptr_eq(&first, &served));
        }
        assert_eq!(producer.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn cold_failure_propagates() {
        let producer = CountingProducer::new(0);
        let cache = FilterCache::new(producer, TTL);

        assert!(cache.get(false).await.is_err());
        assert!(!cache.has_stale_fallback().await);
        assert!(!cache.warm().await);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_keeps_stale_fallback() {
        let producer = CountingProducer::new(1);
        let cache = FilterCache::new(producer.clone(), TTL);

        assert!(cache.warm().await);
        cache.invalidate().await;
        assert!(!cache.is_cached().await);
        assert!(cache.has_stale_fallback().await);

        let served = cache.get(false).await.unwrap();
        assert_eq!(served.get("make").unwrap().options[0].value, "0");
        assert_eq!(producer.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let producer = CountingProducer::new(usize::MAX);
        let cache = Arc::new(FilterCache::new(producer.clone(), TTL));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get(false).await.map(|c| c.len()) })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 1);
        }
        assert_eq!(producer.calls(), 1);
    }
}
