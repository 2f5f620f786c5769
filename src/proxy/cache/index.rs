use lru::LruCache;

use super::CacheEntry;
use crate::proxy::target::Target;

/// Recency-ordered entries plus the running byte total. Callers hold the cache mutex.
#[derive(Debug)]
pub(super) struct CacheIndex {
    lru: LruCache<Target, CacheEntry>,
    total_size: usize,
    max_bytes: usize,
}

impl CacheIndex {
    pub(super) fn new(max_bytes: usize) -> Self {
        Self {
            lru: LruCache::unbounded(),
            total_size: 0,
            max_bytes,
        }
    }

    /// Exact-key lookup; a hit becomes most-recently-used.
    pub(super) fn get(&mut self, key: &Target) -> Option<CacheEntry> {
        self.lru.get(key).cloned()
    }

    /// Evict from the LRU end until `entry` fits, then add it as most-recently-used.
    ///
    /// An existing entry under the same key is dropped first (it is replaced, not evicted), so a
    /// key never appears twice. Returns the evicted entries.
    pub(super) fn insert(&mut self, key: Target, entry: CacheEntry) -> Vec<CacheEntry> {
        let mut evicted = Vec::new();

        if let Some(previous) = self.lru.pop(&key) {
            self.total_size -= previous.len();
        }

        while self.total_size + entry.len() > self.max_bytes {
            let Some((_key, removed)) = self.lru.pop_lru() else {
                break;
            };
            self.total_size -= removed.len();
            evicted.push(removed);
        }

        self.total_size += entry.len();
        self.lru.push(key, entry);
        evicted
    }

    /// Drop every entry, returning the number of bytes released.
    pub(super) fn clear(&mut self) -> usize {
        let released = self.total_size;
        self.lru.clear();
        self.total_size = 0;
        released
    }

    pub(super) fn total_size(&self) -> usize {
        self.total_size
    }

    pub(super) fn len(&self) -> usize {
        self.lru.len()
    }

    #[cfg(test)]
    pub(super) fn recomputed_size(&self) -> usize {
        self.lru.iter().map(|(_, entry)| entry.len()).sum()
    }

    #[cfg(test)]
    pub(super) fn keys_mru(&self) -> Vec<Target> {
        self.lru.iter().map(|(key, _)| key.clone()).collect()
    }
}
