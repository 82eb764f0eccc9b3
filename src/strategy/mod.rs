//! Cache strategy executor
//!
//! A `StrategyExecutor` binds one handler (stale-while-revalidate by default) to
//! one named cache and its expiration policy. Stale-while-revalidate:
//!
//! 1. Look the request up in the named cache.
//! 2. On a hit, return the cached response immediately and refresh the entry from
//!    the network on a detached task. Refresh failures leave the stale entry alone.
//! 3. On a miss, wait for the network; store and return the response.
//!    A network failure on this path is returned to the caller (who then
//!    consults the fallback registry).
//!
//! Concurrent refreshes of the same key are not coordinated; the last write wins.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::task::JoinHandle;

use crate::cache::{Cache, CacheEntry, CacheKey};
use crate::expiration::ExpirationPolicy;
use crate::fetch::{FetchError, Fetcher};
use crate::request::{RequestDescriptor, Response};

/// Caching strategy applied by a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handler {
    /// Serve cached immediately, refresh in the background
    #[default]
    StaleWhileRevalidate,
    /// Serve cached if present, otherwise network
    CacheFirst,
    /// Network if reachable, otherwise cached
    NetworkFirst,
    /// Always network, never cached
    NetworkOnly,
    /// Always cached, never network
    CacheOnly,
}

impl Handler {
    pub fn as_str(&self) -> &'static str {
        match self {
            Handler::StaleWhileRevalidate => "stale_while_revalidate",
            Handler::CacheFirst => "cache_first",
            Handler::NetworkFirst => "network_first",
            Handler::NetworkOnly => "network_only",
            Handler::CacheOnly => "cache_only",
        }
    }
}

/// Where a delivered response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
    Precache,
    Fallback,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Precache => "precache",
            ResponseSource::Fallback => "fallback",
        }
    }
}

/// Strategy failures
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    /// Network failed and no cached response could stand in
    #[error("network request failed: {0}")]
    Network(#[from] FetchError),

    /// Cache-only lookup found nothing
    #[error("no cached response for {0}")]
    CacheMiss(String),
}

/// Navigation preload: the network response for a navigation, fetched
/// alongside the precache lookup and routing instead of after them
#[derive(Debug)]
pub enum Preload {
    /// Response already received
    Ready(Response),
    /// Fetch still in flight
    Pending(JoinHandle<Result<Response, FetchError>>),
}

impl Preload {
    /// Start fetching `request` on its own task
    pub fn spawn(fetcher: Arc<dyn Fetcher>, request: RequestDescriptor) -> Self {
        Preload::Pending(tokio::spawn(async move { fetcher.fetch(&request).await }))
    }

    /// Wait for the preloaded response
    pub async fn response(self) -> Result<Response, FetchError> {
        match self {
            Preload::Ready(response) => Ok(response),
            Preload::Pending(handle) => handle
                .await
                .map_err(|e| FetchError::Network(format!("navigation preload aborted: {}", e)))?,
        }
    }

    /// Abort an in-flight preload whose response will not be used
    pub fn cancel(self) {
        if let Preload::Pending(handle) = self {
            handle.abort();
        }
    }
}

impl From<Response> for Preload {
    fn from(response: Response) -> Self {
        Preload::Ready(response)
    }
}

/// Result of running a strategy
#[derive(Debug)]
pub struct StrategyResponse {
    pub response: Response,
    pub source: ResponseSource,
    /// Background refresh started for a stale-while-revalidate hit.
    /// The task is detached: dropping the handle does not cancel it.
    pub revalidation: Option<JoinHandle<()>>,
}

/// Everything a background refresh needs, shared with spawned tasks
struct ExecutorShared {
    cache: Arc<dyn Cache>,
    policy: ExpirationPolicy,
    fetcher: Arc<dyn Fetcher>,
    cacheable_statuses: Vec<u16>,
}

impl ExecutorShared {
    fn is_cacheable(&self, response: &Response) -> bool {
        self.cacheable_statuses.contains(&response.status.as_u16())
    }

    /// Network step; a preloaded navigation response stands in for the fetch
    async fn fetch(
        &self,
        request: &RequestDescriptor,
        preload: Option<Preload>,
    ) -> Result<Response, FetchError> {
        match preload {
            Some(preload) => preload.response().await,
            None => self.fetcher.fetch(request).await,
        }
    }

    /// Write a response to the cache and enforce expiration.
    /// Storage failures are logged, never surfaced.
    async fn store(&self, key: CacheKey, response: &Response) {
        if !self.is_cacheable(response) {
            tracing::debug!(
                cache = %self.cache.name(),
                key = %key,
                status = response.status.as_u16(),
                "Response not cacheable, skipping store"
            );
            return;
        }

        if let Err(e) = self
            .cache
            .set(key.clone(), CacheEntry::new(response.clone()))
            .await
        {
            tracing::warn!(cache = %self.cache.name(), key = %key, error = %e, "Cache write failed");
            return;
        }

        if let Err(e) = self.policy.enforce(self.cache.as_ref()).await {
            tracing::warn!(cache = %self.cache.name(), error = %e, "Expiration enforcement failed");
        }
    }

    async fn fetch_and_store(
        &self,
        request: &RequestDescriptor,
        key: CacheKey,
        preload: Option<Preload>,
    ) -> Result<Response, FetchError> {
        let response = self.fetch(request, preload).await?;
        self.store(key, &response).await;
        Ok(response)
    }

    /// Cache lookup honouring freshness. Entries past max age are not served.
    async fn lookup(&self, key: &CacheKey) -> Option<Response> {
        let entry = match self.cache.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(cache = %self.cache.name(), key = %key, error = %e, "Cache read failed");
                return None;
            }
        };

        if !self.policy.is_fresh(&entry, SystemTime::now()) {
            tracing::debug!(cache = %self.cache.name(), key = %key, "Cached entry expired");
            return None;
        }

        if let Err(e) = self.policy.record_hit(self.cache.as_ref(), key).await {
            tracing::warn!(cache = %self.cache.name(), key = %key, error = %e, "Failed to record cache hit");
        }
        Some(entry.response)
    }
}

/// Runs one handler against one named cache
pub struct StrategyExecutor {
    handler: Handler,
    ignore_search: bool,
    shared: Arc<ExecutorShared>,
}

impl StrategyExecutor {
    pub fn new(
        handler: Handler,
        cache: Arc<dyn Cache>,
        policy: ExpirationPolicy,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            handler,
            ignore_search: false,
            shared: Arc::new(ExecutorShared {
                cache,
                policy,
                fetcher,
                cacheable_statuses: crate::constants::DEFAULT_CACHEABLE_STATUSES.to_vec(),
            }),
        }
    }

    /// Drop the query string when deriving cache keys
    pub fn with_ignore_search(mut self, ignore_search: bool) -> Self {
        self.ignore_search = ignore_search;
        self
    }

    /// Response statuses that may be stored
    pub fn with_cacheable_statuses(mut self, statuses: Vec<u16>) -> Self {
        let shared = ExecutorShared {
            cache: self.shared.cache.clone(),
            policy: self.shared.policy.clone(),
            fetcher: self.shared.fetcher.clone(),
            cacheable_statuses: statuses,
        };
        self.shared = Arc::new(shared);
        self
    }

    pub fn handler(&self) -> Handler {
        self.handler
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.shared.cache
    }

    pub fn cache_key(&self, request: &RequestDescriptor) -> CacheKey {
        CacheKey::from_url(request.url(), self.ignore_search)
    }

    /// Run the handler for `request`.
    ///
    /// `preload` is a navigation preload; when present it replaces the
    /// strategy's own network fetch.
    pub async fn handle(
        &self,
        request: &RequestDescriptor,
        preload: Option<Preload>,
    ) -> Result<StrategyResponse, StrategyError> {
        let key = self.cache_key(request);
        match self.handler {
            Handler::StaleWhileRevalidate => self.stale_while_revalidate(request, key, preload).await,
            Handler::CacheFirst => self.cache_first(request, key, preload).await,
            Handler::NetworkFirst => self.network_first(request, key, preload).await,
            Handler::NetworkOnly => {
                let response = self.shared.fetch(request, preload).await?;
                Ok(Self::respond(response, ResponseSource::Network))
            }
            Handler::CacheOnly => {
                if let Some(preload) = preload {
                    preload.cancel();
                }
                match self.shared.lookup(&key).await {
                    Some(response) => Ok(Self::respond(response, ResponseSource::Cache)),
                    None => Err(StrategyError::CacheMiss(key.to_string())),
                }
            }
        }
    }

    fn respond(response: Response, source: ResponseSource) -> StrategyResponse {
        StrategyResponse {
            response,
            source,
            revalidation: None,
        }
    }

    async fn stale_while_revalidate(
        &self,
        request: &RequestDescriptor,
        key: CacheKey,
        preload: Option<Preload>,
    ) -> Result<StrategyResponse, StrategyError> {
        if let Some(cached) = self.shared.lookup(&key).await {
            let revalidation = self.spawn_revalidation(request.clone(), key, preload);
            return Ok(StrategyResponse {
                response: cached,
                source: ResponseSource::Cache,
                revalidation: Some(revalidation),
            });
        }

        let response = self.shared.fetch_and_store(request, key, preload).await?;
        Ok(Self::respond(response, ResponseSource::Network))
    }

    /// Refresh `key` on a detached task so the update survives caller cancellation
    fn spawn_revalidation(
        &self,
        request: RequestDescriptor,
        key: CacheKey,
        preload: Option<Preload>,
    ) -> JoinHandle<()> {
        let shared = self.shared.clone();
        tokio::spawn(async move {
            match shared.fetch(&request, preload).await {
                Ok(response) => {
                    shared.store(key.clone(), &response).await;
                    tracing::debug!(
                        cache = %shared.cache.name(),
                        key = %key,
                        status = response.status.as_u16(),
                        "Background revalidation completed"
                    );
                }
                Err(e) => {
                    tracing::debug!(
                        cache = %shared.cache.name(),
                        key = %key,
                        error = %e,
                        "Background revalidation failed, keeping stale entry"
                    );
                }
            }
        })
    }

    async fn cache_first(
        &self,
        request: &RequestDescriptor,
        key: CacheKey,
        preload: Option<Preload>,
    ) -> Result<StrategyResponse, StrategyError> {
        if let Some(cached) = self.shared.lookup(&key).await {
            if let Some(preload) = preload {
                preload.cancel();
            }
            return Ok(Self::respond(cached, ResponseSource::Cache));
        }
        let response = self.shared.fetch_and_store(request, key, preload).await?;
        Ok(Self::respond(response, ResponseSource::Network))
    }

    async fn network_first(
        &self,
        request: &RequestDescriptor,
        key: CacheKey,
        preload: Option<Preload>,
    ) -> Result<StrategyResponse, StrategyError> {
        match self.shared.fetch_and_store(request, key.clone(), preload).await {
            Ok(response) => Ok(Self::respond(response, ResponseSource::Network)),
            Err(e) => match self.shared.lookup(&key).await {
                Some(cached) => {
                    tracing::debug!(key = %key, error = %e, "Network failed, serving cached response");
                    Ok(Self::respond(cached, ResponseSource::Cache))
                }
                None => Err(StrategyError::Network(e)),
            },
        }
    }
}
