//! Cache statistics types
//!
//! This module provides structures for tracking cache performance metrics:
//! - `CacheStats`: Aggregate statistics (hits, misses, evictions, sizes)
//! - `StorageStats`: Per-named-cache statistics

use serde::Serialize;
use std::collections::BTreeMap;

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of evictions by expiration policy
    pub evictions: u64,
    /// Current cache size in bytes
    pub current_size_bytes: u64,
    /// Current number of items in cache
    pub current_item_count: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total requests)
    /// Returns 0.0 if there are no requests
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Statistics for every named cache in a cache storage
#[derive(Debug, Clone, Default, Serialize)]
pub struct StorageStats {
    caches: BTreeMap<String, CacheStats>,
}

impl StorageStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    pub fn set(&mut self, cache_name: String, stats: CacheStats) {
        self.caches.insert(cache_name, stats);
    }

    /// Returns None if the cache is not found
    pub fn get(&self, cache_name: &str) -> Option<&CacheStats> {
        self.caches.get(cache_name)
    }

    /// Aggregate statistics across all caches
    pub fn aggregate(&self) -> CacheStats {
        let mut aggregated = CacheStats::default();
        for stats in self.caches.values() {
            aggregated.hits += stats.hits;
            aggregated.misses += stats.misses;
            aggregated.evictions += stats.evictions;
            aggregated.current_size_bytes += stats.current_size_bytes;
            aggregated.current_item_count += stats.current_item_count;
        }
        aggregated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_with_no_requests_is_zero() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_calculation() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_storage_stats_aggregate_sums_all_caches() {
        let mut storage = StorageStats::new();
        assert!(storage.is_empty());

        storage.set(
            "pages".to_string(),
            CacheStats {
                hits: 10,
                misses: 2,
                evictions: 1,
                current_size_bytes: 100,
                current_item_count: 4,
            },
        );
        storage.set(
            "pages-rsc".to_string(),
            CacheStats {
                hits: 5,
                misses: 5,
                evictions: 0,
                current_size_bytes: 50,
                current_item_count: 2,
            },
        );

        let total = storage.aggregate();
        assert_eq!(total.hits, 15);
        assert_eq!(total.misses, 7);
        assert_eq!(total.evictions, 1);
        assert_eq!(total.current_size_bytes, 150);
        assert_eq!(total.current_item_count, 6);
        assert_eq!(storage.get("pages").unwrap().hits, 10);
        assert!(storage.get("missing").is_none());
    }
}
