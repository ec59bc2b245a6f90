//! Bounded response cache with named partitions
//!
//! Each partition is an insertion-ordered map with an independent capacity
//! limit. Eviction is FIFO on *insertion*: access recency is irrelevant,
//! only how long ago an entry was first written. The overflow check runs
//! as a spawned task after a write so it never blocks the response path.

mod partition;

pub use partition::CacheEntry;

use crate::config::CacheConfig;
use crate::types::CacheKey;
use dashmap::DashMap;
use partition::PartitionCache;
use std::sync::Arc;
use tracing::debug;

/// A named, independently bounded cache partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Deploy-time assets: scripts, styles, icons, manifest. Unbounded.
    StaticAssets,
    /// HTML pages and user media
    DynamicPages,
    /// API and dynamic-data responses
    ApiResponses,
}

impl Partition {
    /// All partitions, in lookup order for cross-partition matches
    pub const ALL: [Partition; 3] = [
        Partition::StaticAssets,
        Partition::DynamicPages,
        Partition::ApiResponses,
    ];

    /// Partition name for logging
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StaticAssets => "static-assets",
            Self::DynamicPages => "dynamic-pages",
            Self::ApiResponses => "api-responses",
        }
    }
}

/// Partitioned response cache with FIFO overflow eviction
#[derive(Debug)]
pub struct BoundedCacheStore {
    partitions: DashMap<Partition, PartitionCache>,
    config: CacheConfig,
}

impl BoundedCacheStore {
    /// Create an empty store with the given partition limits
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let partitions = DashMap::new();
        for partition in Partition::ALL {
            partitions.insert(partition, PartitionCache::new());
        }
        Self { partitions, config }
    }

    /// Capacity limit for a partition; `None` means unbounded
    #[must_use]
    pub fn limit_for(&self, partition: Partition) -> Option<usize> {
        match partition {
            Partition::StaticAssets => None,
            Partition::DynamicPages => Some(self.config.dynamic_limit),
            Partition::ApiResponses => Some(self.config.api_limit),
        }
    }

    /// Insert an entry.
    ///
    /// A same-key write replaces the value (last write wins) but keeps the
    /// original insertion position, so re-caching a page does not extend
    /// its lifetime against eviction.
    pub fn put(&self, partition: Partition, key: CacheKey, entry: CacheEntry) {
        if let Some(mut cache) = self.partitions.get_mut(&partition) {
            cache.put(key, entry);
        }
    }

    /// Look up an entry in a specific partition
    #[must_use]
    pub fn get(&self, partition: Partition, key: &CacheKey) -> Option<CacheEntry> {
        self.partitions
            .get(&partition)
            .and_then(|cache| cache.get(key))
    }

    /// Look up an entry across all partitions (first match wins)
    #[must_use]
    pub fn get_any(&self, key: &CacheKey) -> Option<CacheEntry> {
        Partition::ALL
            .iter()
            .find_map(|partition| self.get(*partition, key))
    }

    /// Remove oldest-inserted entries until the partition holds at most
    /// `limit` entries. Only ever removes; a racing same-key write lands
    /// either before or after and is never blocked.
    pub fn evict_overflow(&self, partition: Partition, limit: usize) {
        let Some(mut cache) = self.partitions.get_mut(&partition) else {
            return;
        };
        let evicted = cache.evict_overflow(limit);
        if evicted > 0 {
            debug!(
                partition = partition.as_str(),
                evicted, limit, "evicted oldest cache entries"
            );
        }
    }

    /// Schedule an overflow check without blocking the caller.
    ///
    /// No-op for unbounded partitions.
    pub fn spawn_evict(self: &Arc<Self>, partition: Partition) {
        let Some(limit) = self.limit_for(partition) else {
            return;
        };
        let store = Arc::clone(self);
        tokio::spawn(async move {
            store.evict_overflow(partition, limit);
        });
    }

    /// Number of entries currently in a partition
    #[must_use]
    pub fn len(&self, partition: Partition) -> usize {
        self.partitions
            .get(&partition)
            .map_or(0, |cache| cache.len())
    }

    /// Whether a partition holds no entries
    #[must_use]
    pub fn is_empty(&self, partition: Partition) -> bool {
        self.len(partition) == 0
    }

    /// Drop all entries in a partition
    pub fn clear(&self, partition: Partition) {
        if let Some(mut cache) = self.partitions.get_mut(&partition) {
            cache.clear();
        }
    }

    /// Keys currently held, oldest insertion first
    #[must_use]
    pub fn keys(&self, partition: Partition) -> Vec<CacheKey> {
        self.partitions
            .get(&partition)
            .map_or_else(Vec::new, |cache| cache.keys())
    }
}
