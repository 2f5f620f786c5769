use bytes::Bytes;

/// A captured upstream response, stored verbatim.
///
/// The bytes are immutable once inserted; clones share the same allocation, so a hit can be
/// written to the client after the cache lock is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    data: Bytes,
}

impl CacheEntry {
    pub(super) fn new(data: Bytes) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
