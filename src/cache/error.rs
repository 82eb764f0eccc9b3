//! Cache error types
//!
//! This module defines error types for cache operations.

/// Cache error types
#[derive(Debug, Clone)]
pub enum CacheError {
    /// Named cache does not exist in the cache storage
    UnknownCache(String),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::UnknownCache(name) => write!(f, "Unknown cache: {}", name),
        }
    }
}

impl std::error::Error for CacheError {}
