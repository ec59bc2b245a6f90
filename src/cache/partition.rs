//! Single cache partition: insertion-ordered entries with FIFO eviction

use crate::http::{Response, ServedFrom};
use crate::types::CacheKey;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// A cached response: status, headers and a shared body buffer.
///
/// The body is behind an `Arc` so serving a hit clones cheaply no matter
/// how large the payload is.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Arc<Vec<u8>>,
}

impl CacheEntry {
    /// Create an entry from raw parts
    #[must_use]
    pub fn new(status: u16, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body: Arc::new(body),
        }
    }

    /// Snapshot a network response for caching
    #[must_use]
    pub fn from_response(response: &Response) -> Self {
        Self::new(response.status, response.headers.clone(), response.body.clone())
    }

    /// Materialize the entry as a response with the given source marker
    #[must_use]
    pub fn to_response(&self, served_from: ServedFrom) -> Response {
        Response {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.as_ref().clone(),
            served_from,
        }
    }
}

/// Insertion-ordered entry map for one partition.
///
/// The order deque tracks first-insertion order; a same-key rewrite
/// updates the map but leaves the deque untouched.
#[derive(Debug, Default)]
pub(crate) struct PartitionCache {
    entries: HashMap<CacheKey, CacheEntry>,
    order: VecDeque<CacheKey>,
}

impl PartitionCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn put(&mut self, key: CacheKey, entry: CacheEntry) {
        if self.entries.insert(key.clone(), entry).is_none() {
            self.order.push_back(key);
        }
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.get(key).cloned()
    }

    /// Remove oldest insertions until at most `limit` entries remain.
    /// Returns the number of entries evicted.
    pub(crate) fn evict_overflow(&mut self, limit: usize) -> usize {
        let mut evicted = 0;
        while self.entries.len() > limit {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub(crate) fn keys(&self) -> Vec<CacheKey> {
        self.order.iter().cloned().collect()
    }
}
