//! Bounded memo of UTC offsets keyed by zone and minute.

use std::sync::atomic::{AtomicU64, Ordering};

use quick_cache::sync::Cache;
use serde::Serialize;

/// Default number of `(zone, minute)` entries kept before eviction.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Offset facts for one zone at one minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetEntry {
    /// Signed minutes east of UTC.
    pub offset_minutes: i32,
    /// Whether a daylight-saving shift is in effect.
    pub dst: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache, 0.0 when nothing was looked up yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Offset cache. Keys borrow the zone's static IANA name, so lookups never allocate.
pub struct OffsetCache {
    inner: Cache<(&'static str, i64), OffsetEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl OffsetCache {
    pub fn new(capacity: usize) -> Self {
        OffsetCache {
            inner: Cache::new(capacity.max(1)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached entry for `(zone, minute)`, computing and storing it on a miss.
    pub fn get_or_compute(
        &self,
        zone: &'static str,
        minute: i64,
        compute: impl FnOnce() -> OffsetEntry,
    ) -> OffsetEntry {
        let key = (zone, minute);
        if let Some(entry) = self.inner.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return entry;
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let entry = compute();
        self.inner.insert(key, entry);
        entry
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.inner.len(),
            capacity: self.inner.capacity(),
        }
    }
}

impl Default for OffsetCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
