//! Expiration policy engine
//!
//! Each named cache carries exactly one `ExpirationPolicy`. After every write the
//! policy is enforced: entries older than `max_age_seconds` are evicted, then the
//! oldest entries (by the configured age basis) are evicted until the cache holds
//! at most `max_entries`.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

use crate::cache::{Cache, CacheEntry, CacheError, CacheKey};
use crate::constants::{DEFAULT_MAX_AGE_SECONDS, DEFAULT_MAX_ENTRIES};

/// Timestamp an entry's age is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgeBasis {
    /// Age restarts on every cache hit (LRU-like retention)
    #[default]
    #[serde(alias = "last_used")]
    LastUsed,
    /// Age counts from the time the entry was written
    Insertion,
}

/// Expiration bounds for one named cache
///
/// A bound set to `None` (`null` in YAML) is not enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpirationRule {
    pub max_entries: Option<u32>,
    pub max_age_seconds: Option<u64>,
    pub age_basis: AgeBasis,
}

impl Default for ExpirationRule {
    fn default() -> Self {
        Self {
            max_entries: Some(DEFAULT_MAX_ENTRIES),
            max_age_seconds: Some(DEFAULT_MAX_AGE_SECONDS),
            age_basis: AgeBasis::LastUsed,
        }
    }
}

impl ExpirationRule {
    /// Rule that never evicts
    pub fn unbounded() -> Self {
        Self {
            max_entries: None,
            max_age_seconds: None,
            age_basis: AgeBasis::LastUsed,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries.is_none() && self.max_age_seconds.is_none() {
            return Err(
                "expiration requires at least one of max_entries or max_age_seconds".to_string(),
            );
        }
        Ok(())
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_seconds.map(Duration::from_secs)
    }
}

/// Applies an `ExpirationRule` to a named cache
#[derive(Debug, Clone)]
pub struct ExpirationPolicy {
    rule: ExpirationRule,
}

impl ExpirationPolicy {
    pub fn new(rule: ExpirationRule) -> Self {
        Self { rule }
    }

    pub fn rule(&self) -> &ExpirationRule {
        &self.rule
    }

    /// True if the entry may still be served at `now`
    pub fn is_fresh(&self, entry: &CacheEntry, now: SystemTime) -> bool {
        match self.rule.max_age() {
            Some(max_age) => entry.age(self.rule.age_basis, now) <= max_age,
            None => true,
        }
    }

    /// Record a cache hit. Under last-used aging this restarts the entry's clock.
    pub async fn record_hit(&self, cache: &dyn Cache, key: &CacheKey) -> Result<(), CacheError> {
        if self.rule.age_basis == AgeBasis::LastUsed {
            cache.touch(key).await?;
        }
        Ok(())
    }

    /// Enforce the rule against the cache as of now
    pub async fn enforce(&self, cache: &dyn Cache) -> Result<Vec<CacheKey>, CacheError> {
        self.enforce_at(cache, SystemTime::now()).await
    }

    /// Enforce the rule as of `now`, returning the evicted keys
    pub async fn enforce_at(
        &self,
        cache: &dyn Cache,
        now: SystemTime,
    ) -> Result<Vec<CacheKey>, CacheError> {
        let victims = self.select_victims(cache.entries().await?, now);
        if victims.is_empty() {
            return Ok(victims);
        }

        let removed = cache.evict(&victims).await?;
        tracing::debug!(
            cache = %cache.name(),
            evicted = removed,
            max_entries = ?self.rule.max_entries,
            max_age_seconds = ?self.rule.max_age_seconds,
            "Expiration enforced"
        );
        Ok(victims)
    }

    /// Pick the entries to evict: everything past max age, then the lowest
    /// ranked survivors beyond max entries.
    fn select_victims(
        &self,
        entries: Vec<(CacheKey, CacheEntry)>,
        now: SystemTime,
    ) -> Vec<CacheKey> {
        let basis = self.rule.age_basis;
        let (mut survivors, expired): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|(_, entry)| self.is_fresh(entry, now));

        let mut victims: Vec<CacheKey> = expired.into_iter().map(|(key, _)| key).collect();

        if let Some(max_entries) = self.rule.max_entries {
            let max_entries = max_entries as usize;
            if survivors.len() > max_entries {
                survivors.sort_by_key(|(_, entry)| entry.rank(basis));
                let excess = survivors.len() - max_entries;
                victims.extend(survivors.drain(..excess).map(|(key, _)| key));
            }
        }

        victims
    }
}
