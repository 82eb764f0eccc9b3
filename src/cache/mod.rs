// Cache module
//
// Named caches and their registry:
// - `Cache`: async trait every named cache implements
// - `MemoryCache`: in-memory implementation
// - `CacheStorage`: registry owning all named caches of a worker

pub mod entry;
pub mod error;
pub mod memory;
pub mod stats;
pub mod storage;
pub mod traits;

pub use entry::{CacheEntry, CacheKey};
pub use error::CacheError;
pub use memory::MemoryCache;
pub use stats::{CacheStats, StorageStats};
pub use storage::CacheStorage;
pub use traits::Cache;
