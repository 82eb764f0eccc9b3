//! Cache key and entry types
//!
//! This module defines the core cache entry structures:
//! - `CacheKey`: Normalized URL identifying a cached response
//! - `CacheEntry`: Cached response with the timestamps used by expiration

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use url::Url;

use crate::expiration::AgeBasis;
use crate::request::Response;

/// Fragment marker used to give precached keys their revision
const REVISION_MARKER: &str = "__revision=";

/// Monotonic counter ordering writes and uses that share a timestamp
static SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// Cache key for identifying cached responses
///
/// Keys are absolute URLs without fragment. Runtime caches may drop the query
/// string (`ignore_search`); precache keys carry the asset revision.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from a raw string (used for keys already normalized)
    pub fn new(key: impl Into<String>) -> Self {
        CacheKey(key.into())
    }

    /// Build a key from a request URL
    pub fn from_url(url: &Url, ignore_search: bool) -> Self {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        if ignore_search {
            normalized.set_query(None);
        }
        CacheKey(normalized.into())
    }

    /// Build a precache key for `url` at `revision`
    ///
    /// URLs without a revision are assumed to be content-versioned already.
    pub fn revisioned(url: &Url, revision: Option<&str>) -> Self {
        let mut normalized = url.clone();
        normalized.set_fragment(None);
        match revision {
            Some(revision) => {
                normalized.set_fragment(Some(&format!("{}{}", REVISION_MARKER, revision)));
                CacheKey(normalized.into())
            }
            None => CacheKey(normalized.into()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The URL this key was built from, without any revision marker
    pub fn url(&self) -> &str {
        match self.0.split_once('#') {
            Some((url, _)) => url,
            None => &self.0,
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache entry representing a stored response
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached response
    pub response: Response,
    /// When this entry was written
    pub inserted_at: SystemTime,
    /// Last time this entry was served (for last-used expiration)
    pub last_used_at: SystemTime,
    inserted_seq: u64,
    last_used_seq: u64,
}

impl CacheEntry {
    /// Create a new entry stamped with the current time
    pub fn new(response: Response) -> Self {
        Self::with_timestamps(response, SystemTime::now(), SystemTime::now())
    }

    /// Create an entry with explicit timestamps
    pub fn with_timestamps(
        response: Response,
        inserted_at: SystemTime,
        last_used_at: SystemTime,
    ) -> Self {
        let seq = next_sequence();
        Self {
            response,
            inserted_at,
            last_used_at,
            inserted_seq: seq,
            last_used_seq: seq,
        }
    }

    /// Mark the entry as used now
    pub fn touch(&mut self) {
        self.touch_at(SystemTime::now());
    }

    pub fn touch_at(&mut self, now: SystemTime) {
        self.last_used_at = now;
        self.last_used_seq = next_sequence();
    }

    /// Timestamp the given age basis measures from
    pub fn timestamp(&self, basis: AgeBasis) -> SystemTime {
        match basis {
            AgeBasis::LastUsed => self.last_used_at,
            AgeBasis::Insertion => self.inserted_at,
        }
    }

    /// Eviction rank: lower ranks are older and evicted first
    pub fn rank(&self, basis: AgeBasis) -> (SystemTime, u64) {
        match basis {
            AgeBasis::LastUsed => (self.last_used_at, self.last_used_seq),
            AgeBasis::Insertion => (self.inserted_at, self.inserted_seq),
        }
    }

    /// Age of the entry at `now`. Clock skew into the future counts as zero.
    pub fn age(&self, basis: AgeBasis, now: SystemTime) -> Duration {
        now.duration_since(self.timestamp(basis))
            .unwrap_or(Duration::ZERO)
    }

    pub fn size_bytes(&self) -> usize {
        self.response.size_bytes()
    }
}
