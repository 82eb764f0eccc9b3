//! Memory cache implementation
//!
//! `MemoryCache` is a named in-memory cache. Entries are whole responses and
//! writes replace the whole entry under a short lock; there is no per-key
//! serialization, so concurrent writers to the same key resolve as last write wins.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use super::entry::{CacheEntry, CacheKey};
use super::error::CacheError;
use super::stats::CacheStats;
use super::traits::Cache;

/// Statistics tracker using atomics for thread safety
pub(crate) struct CacheStatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStatsTracker {
    /// Create a new stats tracker with all counters at zero
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn increment_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics
    pub fn snapshot(&self, current_size_bytes: u64, current_item_count: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            current_size_bytes,
            current_item_count,
        }
    }
}

/// In-memory named cache
pub struct MemoryCache {
    name: String,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    stats: CacheStatsTracker,
}

impl MemoryCache {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
            stats: CacheStatsTracker::new(),
        }
    }

    fn size_bytes(&self) -> u64 {
        self.entries
            .read()
            .values()
            .map(|entry| entry.size_bytes() as u64)
            .sum()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let entry = self.entries.read().get(key).cloned();
        match entry {
            Some(entry) => {
                self.stats.increment_hits();
                Ok(Some(entry))
            }
            None => {
                self.stats.increment_misses();
                Ok(None)
            }
        }
    }

    async fn set(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.write().insert(key, entry);
        Ok(())
    }

    async fn touch(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(entry) => {
                entry.touch_at(SystemTime::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn evict(&self, keys: &[CacheKey]) -> Result<usize, CacheError> {
        let removed = {
            let mut entries = self.entries.write();
            keys.iter()
                .filter(|key| entries.remove(*key).is_some())
                .count()
        };
        self.stats.add_evictions(removed as u64);
        Ok(removed)
    }

    async fn entries(&self) -> Result<Vec<(CacheKey, CacheEntry)>, CacheError> {
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().clear();
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let count = self.entries.read().len() as u64;
        Ok(self.stats.snapshot(self.size_bytes(), count))
    }

    async fn len(&self) -> Result<usize, CacheError> {
        Ok(self.entries.read().len())
    }
}
