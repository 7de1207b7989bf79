//! Page service: cache lookup, fetch coalescing and cache store.
//!
//! ```text
//! get_page(cursor) → PageCache (fresh?) ──yes──→ cached page
//!                         │ no
//!                         ↓
//!                  InFlightRegistry::start ──joined──→ await outstanding fetch
//!                         │ started
//!                         ↓
//!                  PageSource::fetch → PageCache::put (success only)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::cache::PageCache;
use crate::cursor::CursorKey;
use crate::inflight::{InFlightRegistry, PageResult};
use crate::metrics;
use crate::upstream::PageSource;

/// Orchestrates the cache, the in-flight registry and the upstream source.
///
/// Cheap to clone; clones share the same cache and registry.
#[derive(Clone)]
pub struct PageService {
    source: Arc<dyn PageSource>,
    cache: PageCache,
    inflight: InFlightRegistry,
    ttl: Duration,
}

impl PageService {
    /// Creates a service with fresh, empty stores.
    pub fn new(source: Arc<dyn PageSource>, ttl: Duration) -> Self {
        Self::with_stores(source, PageCache::new(), InFlightRegistry::new(), ttl)
    }

    /// Creates a service over existing stores.
    pub fn with_stores(
        source: Arc<dyn PageSource>,
        cache: PageCache,
        inflight: InFlightRegistry,
        ttl: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            inflight,
            ttl,
        }
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    pub fn inflight(&self) -> &InFlightRegistry {
        &self.inflight
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the page for a caller-supplied cursor.
    ///
    /// An absent or empty cursor addresses the first page.
    ///
    /// # Errors
    ///
    /// Returns the upstream error of the fetch this call started or joined.
    pub async fn get_page(&self, cursor: Option<&str>) -> PageResult {
        self.get_page_by_key(CursorKey::from_cursor(cursor)).await
    }

    /// Returns the page for an already canonical key.
    pub async fn get_page_by_key(&self, key: CursorKey) -> PageResult {
        let first_page = key.is_first_page();

        if let Some(entry) = self.cache.get(&key)
            && PageCache::is_fresh(&entry, Instant::now(), self.ttl)
        {
            tracing::trace!(cursor = %key, "Page cache hit");
            metrics::record_cache_hit(first_page);
            return Ok(entry.page.clone());
        }
        metrics::record_cache_miss(first_page);

        let flight = self.inflight.start(key.clone(), || {
            fetch_and_store(Arc::clone(&self.source), self.cache.clone(), key.clone())
        });
        if flight.is_owner() {
            tracing::debug!(cursor = %key, "Page cache miss, fetching upstream");
        } else {
            tracing::debug!(cursor = %key, "Joining in-flight fetch");
            metrics::record_fetch_joined();
        }

        flight.into_pending().await
    }
}

/// The owner task of a fetch: fetch, then store on success only.
async fn fetch_and_store(
    source: Arc<dyn PageSource>,
    cache: PageCache,
    key: CursorKey,
) -> PageResult {
    let result = source.fetch(&key).await;
    if let Ok(page) = &result {
        cache.put(key, page.clone());
        metrics::record_cache_entries(cache.len());
    }
    result
}

impl std::fmt::Debug for PageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageService")
            .field("ttl", &self.ttl)
            .field("cached_pages", &self.cache.len())
            .field("in_flight", &self.inflight.len())
            .finish()
    }
}
