use anyhow::{Result, ensure};
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::trace;

mod entry;
mod index;

pub use entry::CacheEntry;
use index::CacheIndex;

use crate::metrics::{self, CacheUsageGauges};
use crate::proxy::target::Target;
use crate::settings::Settings;

/// Point-in-time view of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: usize,
    pub capacity: usize,
    pub max_object_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Stored { evicted: usize },
    Rejected,
}

/// Shared in-memory response cache keyed by (host, port, uri).
///
/// Entries are kept in recency order and the sum of their lengths never exceeds `capacity`.
/// A single mutex covers both `lookup` and `insert`, so the promote-on-hit and the
/// evict-then-add sequences are never observed half done by another worker.
#[derive(Debug)]
pub struct ObjectCache {
    index: Mutex<CacheIndex>,
    capacity: usize,
    max_object_size: usize,
    usage: CacheUsageGauges,
}

impl ObjectCache {
    pub fn new(capacity: usize, max_object_size: usize) -> Result<Self> {
        Self::with_gauges(capacity, max_object_size, CacheUsageGauges::registered())
    }

    fn with_gauges(
        capacity: usize,
        max_object_size: usize,
        usage: CacheUsageGauges,
    ) -> Result<Self> {
        ensure!(capacity > 0, "cache capacity must be greater than zero");
        ensure!(
            max_object_size > 0,
            "cache object size limit must be greater than zero"
        );
        ensure!(
            max_object_size <= capacity,
            "cache object size limit ({max_object_size}) must not exceed cache capacity ({capacity})"
        );
        Ok(Self {
            index: Mutex::new(CacheIndex::new(capacity)),
            capacity,
            max_object_size,
            usage,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.cache_total_capacity, settings.cache_max_object_size)
    }

    /// True when a response of `length` bytes may be cached. The object limit is exclusive.
    pub fn admits(&self, length: usize) -> bool {
        length < self.max_object_size && length <= self.capacity
    }

    pub fn max_object_size(&self) -> usize {
        self.max_object_size
    }

    pub fn lookup(&self, host: &str, port: &str, uri: &str) -> Option<CacheEntry> {
        self.lookup_target(&Target::new(host, port, uri))
    }

    pub fn lookup_target(&self, target: &Target) -> Option<CacheEntry> {
        let entry = {
            let mut guard = self.index.lock();
            let entry = guard.get(target);
            self.publish_usage(&guard);
            entry
        };
        metrics::record_cache_lookup(entry.is_some());
        entry
    }

    /// Take ownership of `data` as the cached response for `target`.
    ///
    /// Least-recently-used entries are evicted until the new entry fits. Responses the cache
    /// does not admit are refused without touching existing entries.
    pub fn insert(&self, target: Target, data: Bytes) -> InsertOutcome {
        let length = data.len();
        if !self.admits(length) {
            trace!(key = %target, length, "refusing to cache oversized object");
            return InsertOutcome::Rejected;
        }

        let evicted = {
            let mut guard = self.index.lock();
            let evicted = guard.insert(target, CacheEntry::new(data));
            self.publish_usage(&guard);
            evicted
        };

        if !evicted.is_empty() {
            trace!(
                evicted = evicted.len(),
                bytes = evicted.iter().map(CacheEntry::len).sum::<usize>(),
                "evicted least recently used cache entries"
            );
            metrics::record_cache_evictions(evicted.len());
        }
        metrics::record_cache_store();
        InsertOutcome::Stored {
            evicted: evicted.len(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let guard = self.index.lock();
        self.stats_locked(&guard)
    }

    /// Release every entry, returning how many bytes were held.
    pub fn clear(&self) -> usize {
        let mut guard = self.index.lock();
        let released = guard.clear();
        self.publish_usage(&guard);
        released
    }

    fn publish_usage(&self, index: &CacheIndex) {
        self.usage.set(index.total_size(), index.len());
    }

    fn stats_locked(&self, index: &CacheIndex) -> CacheStats {
        CacheStats {
            entries: index.len(),
            total_size: index.total_size(),
            capacity: self.capacity,
            max_object_size: self.max_object_size,
        }
    }
}
