//! TTL-checked page cache keyed by cursor.
//!
//! Entries are never evicted; freshness is decided at read time by the
//! caller via [`PageCache::is_fresh`]. A successful refresh replaces the
//! entry for its key with a new immutable [`CacheEntry`], so readers holding
//! the old `Arc` keep a consistent view.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::cursor::CursorKey;
use crate::page::Page;

/// A cached page with its fetch timestamp.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CursorKey,
    pub page: Page,
    pub saved_at: Instant,
}

impl CacheEntry {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.saved_at)
    }
}

/// Shared page cache. Clones are handles to the same map.
#[derive(Clone, Default)]
pub struct PageCache {
    entries: Arc<DashMap<CursorKey, Arc<CacheEntry>>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the entry for `key`, fresh or not.
    pub fn get(&self, key: &CursorKey) -> Option<Arc<CacheEntry>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Store `page` for `key` stamped with the current time, replacing any
    /// previous entry.
    pub fn put(&self, key: CursorKey, page: Page) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry {
            key: key.clone(),
            page,
            saved_at: Instant::now(),
        });
        self.entries.insert(key, Arc::clone(&entry));
        entry
    }

    /// `now - saved_at < ttl`.
    pub fn is_fresh(entry: &CacheEntry, now: Instant, ttl: Duration) -> bool {
        entry.age(now) < ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
