//! Cache trait definition
//!
//! This module defines the `Cache` trait that named cache implementations must satisfy.
//! Every method is async: each cache read or write is a suspension point.

use async_trait::async_trait;

use super::entry::{CacheEntry, CacheKey};
use super::error::CacheError;
use super::stats::CacheStats;

/// A named cache: a disjoint key -> response namespace
#[async_trait]
pub trait Cache: Send + Sync {
    /// Name of this cache (unique within a cache storage)
    fn name(&self) -> &str;

    /// Get a cache entry by key without changing its timestamps
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Store an entry, overwriting any existing entry under the same key
    async fn set(&self, key: CacheKey, entry: CacheEntry) -> Result<(), CacheError>;

    /// Refresh the last-used timestamp of an entry
    /// Returns false if the key is not present
    async fn touch(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// Delete a cache entry by key
    /// Returns true if the entry was deleted, false if it didn't exist
    async fn delete(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// Remove entries on behalf of an expiration policy
    /// Returns the number of entries removed; removals count as evictions
    async fn evict(&self, keys: &[CacheKey]) -> Result<usize, CacheError>;

    /// Snapshot of all entries (used by expiration enforcement)
    async fn entries(&self) -> Result<Vec<(CacheKey, CacheEntry)>, CacheError>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<(), CacheError>;

    /// Get cache statistics
    async fn stats(&self) -> Result<CacheStats, CacheError>;

    /// Number of entries currently stored
    async fn len(&self) -> Result<usize, CacheError> {
        Ok(self.entries().await?.len())
    }
}
