//! Registry of named caches
//!
//! `CacheStorage` owns every named cache of a worker. Caches are created on
//! first `open` and live until explicitly deleted.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::CacheError;
use super::memory::MemoryCache;
use super::stats::StorageStats;
use super::traits::Cache;

#[derive(Default)]
pub struct CacheStorage {
    caches: RwLock<BTreeMap<String, Arc<dyn Cache>>>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the named cache, creating an empty in-memory cache if needed
    pub fn open(&self, name: &str) -> Arc<dyn Cache> {
        if let Some(cache) = self.caches.read().get(name) {
            return cache.clone();
        }

        let mut caches = self.caches.write();
        // Another caller may have created it between the two locks
        caches
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(cache = %name, "Created named cache");
                Arc::new(MemoryCache::new(name)) as Arc<dyn Cache>
            })
            .clone()
    }

    /// Get an existing named cache
    pub fn get(&self, name: &str) -> Result<Arc<dyn Cache>, CacheError> {
        self.caches
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::UnknownCache(name.to_string()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.caches.read().contains_key(name)
    }

    /// Delete a named cache and everything in it
    /// Returns true if the cache existed
    pub fn delete(&self, name: &str) -> bool {
        let removed = self.caches.write().remove(name).is_some();
        if removed {
            tracing::info!(cache = %name, "Deleted named cache");
        }
        removed
    }

    /// Names of all caches, in sorted order
    pub fn names(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }

    /// Statistics for every cache
    pub async fn stats(&self) -> Result<StorageStats, CacheError> {
        let caches: Vec<(String, Arc<dyn Cache>)> = self
            .caches
            .read()
            .iter()
            .map(|(name, cache)| (name.clone(), cache.clone()))
            .collect();

        let mut stats = StorageStats::new();
        for (name, cache) in caches {
            stats.set(name, cache.stats().await?);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, CacheKey};
    use crate::request::Response;

    #[tokio::test]
    async fn test_open_returns_same_cache_instance() {
        let storage = CacheStorage::new();
        let first = storage.open("pages");
        first
            .set(
                CacheKey::new("https://app.example.com/"),
                CacheEntry::new(Response::ok("home")),
            )
            .await
            .unwrap();

        let second = storage.open("pages");
        assert_eq!(second.len().await.unwrap(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_caches_are_disjoint_namespaces() {
        let storage = CacheStorage::new();
        let key = CacheKey::new("https://app.example.com/");
        storage
            .open("pages")
            .set(key.clone(), CacheEntry::new(Response::ok("page")))
            .await
            .unwrap();

        assert!(storage.open("pages-rsc").get(&key).await.unwrap().is_none());
    }

    #[test]
    fn test_get_unknown_cache_is_error() {
        let storage = CacheStorage::new();
        assert!(matches!(
            storage.get("nope"),
            Err(CacheError::UnknownCache(name)) if name == "nope"
        ));
    }

    #[test]
    fn test_delete_and_names() {
        let storage = CacheStorage::new();
        storage.open("b");
        storage.open("a");
        assert_eq!(storage.names(), vec!["a".to_string(), "b".to_string()]);

        assert!(storage.delete("a"));
        assert!(!storage.delete("a"));
        assert!(!storage.has("a"));
        assert!(storage.has("b"));
    }

    #[tokio::test]
    async fn test_stats_cover_every_cache() {
        let storage = CacheStorage::new();
        storage.open("pages");
        storage.open("precache");
        let stats = storage.stats().await.unwrap();
        assert!(stats.get("pages").is_some());
        assert!(stats.get("precache").is_some());
    }
}
