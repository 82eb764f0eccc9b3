//! Precache store
//!
//! Assets listed in the build manifest are fetched at install time and kept in
//! the `precache` named cache under revisioned keys. An install only stages the
//! new generation next to the one being served. `activate` promotes the staged
//! generation and sweeps every stored revision neither generation references;
//! `discard_staged` drops a generation that will never activate.

use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::cache::{Cache, CacheEntry, CacheError, CacheKey};
use crate::config::PrecacheConfig;
use crate::constants::{
    DEFAULT_DIRECTORY_INDEX, DEFAULT_IGNORED_URL_PARAMETERS, DEFAULT_OFFLINE_URL,
    DEFAULT_PRECACHE_CONCURRENCY, ROOT_DOCUMENT_URL,
};
use crate::fetch::Fetcher;
use crate::request::{RequestDescriptor, Response};

pub mod manifest;

pub use manifest::{PrecacheEntry, PrecacheManifest};

/// Whether the app can start offline after an install
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    /// Every critical asset is precached
    Ready,
    /// At least one critical asset is missing
    Degraded,
}

/// An asset that could not be precached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedAsset {
    pub url: String,
    pub error: String,
}

/// Summary of one precache install
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    /// Entries fetched and stored by this install
    pub installed: usize,
    /// Entries already stored at the requested revision
    pub skipped: usize,
    pub failed: Vec<FailedAsset>,
    /// Critical URLs that are not precached
    pub missing_critical: Vec<String>,
    pub readiness: Readiness,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl InstallReport {
    pub fn is_ready(&self) -> bool {
        self.readiness == Readiness::Ready
    }
}

fn serialize_millis<S: serde::Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(duration.as_millis() as u64)
}

enum AssetOutcome {
    Installed,
    Skipped,
    Failed(String),
}

/// Versioned store of precached assets
pub struct PrecacheStore {
    cache: Arc<dyn Cache>,
    origin: Url,
    /// Normalized asset URL -> key of the revision currently served
    index: RwLock<BTreeMap<String, CacheKey>>,
    /// Index of the installed generation awaiting activation
    staged: RwLock<Option<BTreeMap<String, CacheKey>>>,
    /// Keys an unfinished install reads or writes; never swept
    in_flight: RwLock<HashSet<CacheKey>>,
    critical: Vec<String>,
    concurrency: usize,
    ignored_parameters: Vec<Regex>,
    directory_index: Option<String>,
    clean_urls: bool,
}

impl PrecacheStore {
    pub fn new(cache: Arc<dyn Cache>, origin: Url) -> Self {
        Self {
            cache,
            origin,
            index: RwLock::new(BTreeMap::new()),
            staged: RwLock::new(None),
            in_flight: RwLock::new(HashSet::new()),
            critical: vec![ROOT_DOCUMENT_URL.to_string(), DEFAULT_OFFLINE_URL.to_string()],
            concurrency: DEFAULT_PRECACHE_CONCURRENCY,
            ignored_parameters: DEFAULT_IGNORED_URL_PARAMETERS
                .iter()
                .filter_map(|pattern| Regex::new(pattern).ok())
                .collect(),
            directory_index: Some(DEFAULT_DIRECTORY_INDEX.to_string()),
            clean_urls: true,
        }
    }

    pub fn from_config(
        config: &PrecacheConfig,
        cache: Arc<dyn Cache>,
        origin: Url,
    ) -> Result<Self, String> {
        let ignored_parameters = config
            .ignore_url_parameters
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| format!("Invalid ignore_url_parameters pattern '{}': {}", pattern, e))
            })
            .collect::<Result<Vec<_>, String>>()?;

        Ok(Self::new(cache, origin)
            .with_critical(config.critical.clone())
            .with_concurrency(config.concurrency)
            .with_ignored_parameters(ignored_parameters)
            .with_directory_index(config.directory_index.clone())
            .with_clean_urls(config.clean_urls))
    }

    /// URLs that must be precached for the app to work offline
    pub fn with_critical(mut self, critical: Vec<String>) -> Self {
        self.critical = critical;
        self
    }

    /// Maximum number of concurrent fetches during install (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Query parameters matching any of these are ignored on lookup
    pub fn with_ignored_parameters(mut self, patterns: Vec<Regex>) -> Self {
        self.ignored_parameters = patterns;
        self
    }

    pub fn with_directory_index(mut self, index: Option<String>) -> Self {
        self.directory_index = index;
        self
    }

    pub fn with_clean_urls(mut self, clean_urls: bool) -> Self {
        self.clean_urls = clean_urls;
        self
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn critical(&self) -> &[String] {
        &self.critical
    }

    /// Fetch and store every manifest entry not already stored at its revision,
    /// and stage the resulting generation. Nothing served changes until
    /// `activate`; a previously staged generation is superseded.
    ///
    /// Individual failures are recorded in the report and never abort the rest.
    /// A URL that fails keeps the revision currently served, if any.
    pub async fn install(
        &self,
        manifest: &PrecacheManifest,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<InstallReport, CacheError> {
        let started = Instant::now();

        let mut targets = Vec::with_capacity(manifest.len());
        let mut failed = Vec::new();
        for entry in manifest.entries() {
            match entry.resolve(&self.origin) {
                Ok(url) => targets.push((entry.clone(), url)),
                Err(error) => failed.push(FailedAsset {
                    url: entry.url.clone(),
                    error,
                }),
            }
        }

        self.in_flight.write().extend(
            targets
                .iter()
                .map(|(entry, url)| CacheKey::revisioned(url, entry.revision.as_deref())),
        );

        tracing::info!(
            entries = manifest.len(),
            concurrency = self.concurrency,
            "Precache install started"
        );

        let outcomes: Vec<(PrecacheEntry, Url, AssetOutcome)> = stream::iter(targets)
            .map(|(entry, url)| {
                let fetcher = fetcher.clone();
                async move {
                    let outcome = self.install_entry(&entry, &url, fetcher.as_ref()).await;
                    (entry, url, outcome)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut installed = 0;
        let mut skipped = 0;
        let mut generation: BTreeMap<String, CacheKey> = BTreeMap::new();
        let mut failed_urls = HashSet::new();

        for (entry, url, outcome) in outcomes {
            let key = CacheKey::revisioned(&url, entry.revision.as_deref());
            match outcome {
                AssetOutcome::Installed => {
                    installed += 1;
                    generation.insert(key.url().to_string(), key);
                }
                AssetOutcome::Skipped => {
                    skipped += 1;
                    generation.insert(key.url().to_string(), key);
                }
                AssetOutcome::Failed(error) => {
                    tracing::warn!(url = %url, error = %error, "Failed to precache asset");
                    let url = key.url().to_string();
                    if let Some(served) = self.index.read().get(&url) {
                        generation.insert(url.clone(), served.clone());
                    }
                    failed_urls.insert(url);
                    failed.push(FailedAsset {
                        url: entry.url.clone(),
                        error,
                    });
                }
            }
        }

        let missing_critical: Vec<String> = self
            .critical
            .iter()
            .filter(|path| match self.origin.join(path) {
                Ok(url) => {
                    let url = CacheKey::revisioned(&url, None).url().to_string();
                    failed_urls.contains(&url) || !generation.contains_key(&url)
                }
                Err(_) => true,
            })
            .cloned()
            .collect();

        let staged_urls = generation.len();
        let superseded = self.staged.write().replace(generation).is_some();
        self.in_flight.write().clear();
        if superseded {
            let removed = self.sweep().await?;
            tracing::debug!(
                removed = removed.len(),
                "Superseded staged precache generation"
            );
        }

        let readiness = if missing_critical.is_empty() {
            Readiness::Ready
        } else {
            Readiness::Degraded
        };

        let report = InstallReport {
            installed,
            skipped,
            failed,
            missing_critical,
            readiness,
            duration: started.elapsed(),
        };

        tracing::info!(
            installed = report.installed,
            skipped = report.skipped,
            failed = report.failed.len(),
            staged_urls,
            readiness = ?report.readiness,
            duration_ms = report.duration.as_millis() as u64,
            "Precache install finished"
        );
        if !report.missing_critical.is_empty() {
            tracing::warn!(
                missing = ?report.missing_critical,
                "Critical assets not precached, offline support degraded"
            );
        }

        Ok(report)
    }

    async fn install_entry(
        &self,
        entry: &PrecacheEntry,
        url: &Url,
        fetcher: &dyn Fetcher,
    ) -> AssetOutcome {
        let key = CacheKey::revisioned(url, entry.revision.as_deref());
        match self.cache.get(&key).await {
            Ok(Some(_)) => return AssetOutcome::Skipped,
            Ok(None) => {}
            Err(e) => return AssetOutcome::Failed(e.to_string()),
        }

        let request = RequestDescriptor::new(http::Method::GET, url.clone());
        let response = match fetcher.fetch(&request).await {
            Ok(response) => response,
            Err(e) => return AssetOutcome::Failed(e.to_string()),
        };
        if !response.is_success() {
            return AssetOutcome::Failed(format!("unexpected status {}", response.status));
        }

        match self.cache.set(key.clone(), CacheEntry::new(response)).await {
            Ok(()) => {
                tracing::debug!(key = %key, "Precached asset");
                AssetOutcome::Installed
            }
            Err(e) => AssetOutcome::Failed(e.to_string()),
        }
    }

    /// Serve the staged generation. Outdated revisions and URLs the new
    /// manifest no longer lists are removed. Returns the removed keys.
    pub async fn activate(&self) -> Result<Vec<CacheKey>, CacheError> {
        let Some(generation) = self.staged.write().take() else {
            return Ok(Vec::new());
        };
        let urls = generation.len();
        *self.index.write() = generation;

        let removed = self.sweep().await?;
        tracing::info!(urls, removed = removed.len(), "Precache generation activated");
        Ok(removed)
    }

    /// Drop the staged generation and every revision only it referenced
    pub async fn discard_staged(&self) -> Result<Vec<CacheKey>, CacheError> {
        if self.staged.write().take().is_none() {
            return Ok(Vec::new());
        }
        let removed = self.sweep().await?;
        tracing::info!(removed = removed.len(), "Staged precache generation discarded");
        Ok(removed)
    }

    /// Delete stored keys that neither the served nor the staged generation
    /// references
    async fn sweep(&self) -> Result<Vec<CacheKey>, CacheError> {
        let mut live: HashSet<CacheKey> = self.index.read().values().cloned().collect();
        if let Some(staged) = self.staged.read().as_ref() {
            live.extend(staged.values().cloned());
        }
        live.extend(self.in_flight.read().iter().cloned());

        let stale: Vec<CacheKey> = self
            .cache
            .entries()
            .await?
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| !live.contains(key))
            .collect();

        if stale.is_empty() {
            return Ok(stale);
        }
        for key in &stale {
            tracing::debug!(key = %key, "Evicting unreferenced precache entry");
        }
        self.cache.evict(&stale).await?;
        Ok(stale)
    }

    /// True while an installed generation awaits activation
    pub fn has_staged(&self) -> bool {
        self.staged.read().is_some()
    }

    /// Lookup candidates for `url`, most specific first
    fn candidates(&self, url: &Url) -> Vec<String> {
        let mut base = url.clone();
        base.set_fragment(None);

        let mut candidates = vec![base.to_string()];

        let stripped = self.strip_ignored_parameters(&base);
        if stripped != base {
            candidates.push(stripped.to_string());
        }

        let path = stripped.path().to_string();
        if path.ends_with('/') {
            if let Some(index) = &self.directory_index {
                let mut with_index = stripped.clone();
                with_index.set_path(&format!("{}{}", path, index));
                candidates.push(with_index.to_string());
            }
        } else if self.clean_urls {
            let mut with_extension = stripped.clone();
            with_extension.set_path(&format!("{}.html", path));
            candidates.push(with_extension.to_string());
        }

        candidates
    }

    fn strip_ignored_parameters(&self, url: &Url) -> Url {
        if url.query().is_none() || self.ignored_parameters.is_empty() {
            return url.clone();
        }

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| !self.ignored_parameters.iter().any(|re| re.is_match(name)))
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();

        let mut stripped = url.clone();
        if kept.is_empty() {
            stripped.set_query(None);
        } else {
            stripped.query_pairs_mut().clear().extend_pairs(kept);
        }
        stripped
    }

    fn key_for(&self, url: &Url) -> Option<CacheKey> {
        let index = self.index.read();
        self.candidates(url)
            .iter()
            .find_map(|candidate| index.get(candidate).cloned())
    }

    /// True if `url` resolves to a precached asset
    pub fn contains(&self, url: &Url) -> bool {
        self.key_for(url).is_some()
    }

    /// Precached response for `url`, after URL normalization
    pub async fn match_url(&self, url: &Url) -> Option<Response> {
        let key = self.key_for(url)?;
        match self.cache.get(&key).await {
            Ok(entry) => entry.map(|entry| entry.response),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Precache read failed");
                None
            }
        }
    }

    /// Precached response for an origin-relative or absolute URL
    pub async fn match_path(&self, path: &str) -> Option<Response> {
        let url = self.origin.join(path).ok()?;
        self.match_url(&url).await
    }

    /// URLs currently served from the precache
    pub fn urls(&self) -> Vec<String> {
        self.index.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::fetch::MockFetcher;
    use http::StatusCode;

    fn origin() -> Url {
        Url::parse("https://app.example.com").unwrap()
    }

    fn store() -> PrecacheStore {
        PrecacheStore::new(Arc::new(MemoryCache::new("precache")), origin())
    }

    fn entry(url: &str, revision: Option<&str>) -> PrecacheEntry {
        PrecacheEntry::new(url, revision.map(str::to_string))
    }

    fn manifest(entries: Vec<PrecacheEntry>) -> PrecacheManifest {
        PrecacheManifest::new(entries).unwrap()
    }

    fn url(path: &str) -> Url {
        origin().join(path).unwrap()
    }

    async fn install_and_activate(
        store: &PrecacheStore,
        manifest: &PrecacheManifest,
        fetcher: &MockFetcher,
    ) -> InstallReport {
        let report = store.install(manifest, Arc::new(fetcher.clone())).await.unwrap();
        store.activate().await.unwrap();
        report
    }

    #[tokio::test]
    async fn test_install_stages_until_activation() {
        let store = store();
        let fetcher = MockFetcher::new();
        fetcher.respond_ok("/", "home");
        fetcher.respond_ok("/offline", "offline page");
        fetcher.respond_ok("/app.js", "app");

        let report = store
            .install(
                &manifest(vec![
                    entry("/", Some("r1")),
                    entry("/offline", Some("r1")),
                    entry("/app.js", None),
                ]),
                Arc::new(fetcher.clone()),
            )
            .await
            .unwrap();

        assert_eq!(report.installed, 3);
        assert!(report.is_ready());
        assert!(store.has_staged());
        assert!(store.is_empty());
        assert!(store.match_url(&url("/offline")).await.is_none());

        assert!(store.activate().await.unwrap().is_empty());
        assert!(!store.has_staged());
        assert_eq!(
            store.match_url(&url("/offline")).await.unwrap().body,
            "offline page"
        );
        assert!(store.contains(&url("/app.js")));
    }

    #[tokio::test]
    async fn test_revision_change_served_only_after_activation() {
        let store = store();
        let fetcher = MockFetcher::new();

        fetcher.respond_ok("/app.js", "v1 content");
        install_and_activate(&store, &manifest(vec![entry("/app.js", Some("v1"))]), &fetcher)
            .await;

        fetcher.respond_ok("/app.js", "v2 content");
        let report = store
            .install(&manifest(vec![entry("/app.js", Some("v2"))]), Arc::new(fetcher.clone()))
            .await
            .unwrap();
        assert_eq!(report.installed, 1);

        // Both revisions stored, the old one still served
        assert_eq!(store.cache().len().await.unwrap(), 2);
        assert_eq!(
            store.match_url(&url("/app.js")).await.unwrap().body,
            "v1 content"
        );

        let removed = store.activate().await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed, vec![CacheKey::revisioned(&url("/app.js"), Some("v1"))]);

        let entries = store.cache().entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.response.body, "v2 content");
        assert_eq!(
            store.match_url(&url("/app.js")).await.unwrap().body,
            "v2 content"
        );
    }

    #[tokio::test]
    async fn test_discarded_generation_leaves_served_one_intact() {
        let store = store();
        let fetcher = MockFetcher::new();

        fetcher.respond_ok("/app.js", "v1 content");
        install_and_activate(&store, &manifest(vec![entry("/app.js", Some("v1"))]), &fetcher)
            .await;

        fetcher.respond_ok("/app.js", "v2 content");
        store
            .install(&manifest(vec![entry("/app.js", Some("v2"))]), Arc::new(fetcher.clone()))
            .await
            .unwrap();

        let removed = store.discard_staged().await.unwrap();
        assert_eq!(removed.len(), 1);
        assert!(!store.has_staged());
        assert_eq!(store.cache().len().await.unwrap(), 1);
        assert_eq!(
            store.match_url(&url("/app.js")).await.unwrap().body,
            "v1 content"
        );

        // Nothing staged: activation is a no-op
        assert!(store.activate().await.unwrap().is_empty());
        assert_eq!(
            store.match_url(&url("/app.js")).await.unwrap().body,
            "v1 content"
        );
    }

    #[tokio::test]
    async fn test_newer_install_supersedes_staged_generation() {
        let store = store().with_critical(vec![]);
        let fetcher = MockFetcher::new();

        fetcher.respond_ok("/app.js", "v1 content");
        install_and_activate(&store, &manifest(vec![entry("/app.js", Some("v1"))]), &fetcher)
            .await;

        fetcher.respond_ok("/app.js", "v2 content");
        store
            .install(&manifest(vec![entry("/app.js", Some("v2"))]), Arc::new(fetcher.clone()))
            .await
            .unwrap();
        fetcher.respond_ok("/app.js", "v3 content");
        store
            .install(&manifest(vec![entry("/app.js", Some("v3"))]), Arc::new(fetcher.clone()))
            .await
            .unwrap();

        // v2 never activated and is gone; v1 still served next to staged v3
        assert_eq!(store.cache().len().await.unwrap(), 2);
        assert_eq!(
            store.match_url(&url("/app.js")).await.unwrap().body,
            "v1 content"
        );

        store.activate().await.unwrap();
        assert_eq!(
            store.match_url(&url("/app.js")).await.unwrap().body,
            "v3 content"
        );
        assert_eq!(store.cache().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_asset_keeps_served_revision() {
        let store = store().with_critical(vec![]);
        let fetcher = MockFetcher::new();

        fetcher.respond_ok("/app.js", "v1 content");
        install_and_activate(&store, &manifest(vec![entry("/app.js", Some("v1"))]), &fetcher)
            .await;

        fetcher.set_offline(true);
        let report =
            install_and_activate(&store, &manifest(vec![entry("/app.js", Some("v2"))]), &fetcher)
                .await;
        assert_eq!(report.failed.len(), 1);
        assert_eq!(
            store.match_url(&url("/app.js")).await.unwrap().body,
            "v1 content"
        );
    }

    #[tokio::test]
    async fn test_unchanged_revision_is_not_refetched() {
        let store = store();
        let fetcher = MockFetcher::new();
        fetcher.respond_ok("/app.js", "v1");
        let m = manifest(vec![entry("/app.js", Some("v1"))]);

        store.install(&m, Arc::new(fetcher.clone())).await.unwrap();
        let report = store.install(&m, Arc::new(fetcher.clone())).await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(fetcher.calls("/app.js"), 1);
    }

    #[tokio::test]
    async fn test_individual_failure_does_not_abort_install() {
        let store = store().with_critical(vec![]);
        let fetcher = MockFetcher::new();
        fetcher.respond_ok("/a.js", "a");
        fetcher.respond("/missing.js", Response::new(StatusCode::NOT_FOUND, "nope"));

        let report = store
            .install(
                &manifest(vec![
                    entry("/a.js", None),
                    entry("/broken.js", None),
                    entry("/missing.js", None),
                ]),
                Arc::new(fetcher),
            )
            .await
            .unwrap();

        assert_eq!(report.installed, 1);
        assert_eq!(report.failed.len(), 2);
        assert!(report
            .failed
            .iter()
            .any(|f| f.url == "/missing.js" && f.error.contains("404")));
        assert!(!store.contains(&url("/missing.js")));
        assert!(report.is_ready());
    }

    #[tokio::test]
    async fn test_missing_critical_asset_degrades_readiness() {
        let store = store();
        let fetcher = MockFetcher::new();
        fetcher.respond_ok("/", "home");

        let report = store
            .install(
                &manifest(vec![entry("/", Some("r1")), entry("/offline", Some("r1"))]),
                Arc::new(fetcher),
            )
            .await
            .unwrap();

        assert_eq!(report.readiness, Readiness::Degraded);
        assert_eq!(report.missing_critical, vec!["/offline".to_string()]);
    }

    #[tokio::test]
    async fn test_critical_asset_absent_from_manifest_degrades_readiness() {
        let store = store();
        let fetcher = MockFetcher::new();
        fetcher.respond_ok("/", "home");

        let report = store
            .install(&manifest(vec![entry("/", Some("r1"))]), Arc::new(fetcher))
            .await
            .unwrap();
        assert_eq!(report.missing_critical, vec!["/offline".to_string()]);
    }

    #[tokio::test]
    async fn test_activation_removes_urls_dropped_from_manifest() {
        let store = store().with_critical(vec![]);
        let fetcher = MockFetcher::new();
        fetcher.respond_ok("/old.js", "old");
        fetcher.respond_ok("/new.js", "new");

        install_and_activate(&store, &manifest(vec![entry("/old.js", None)]), &fetcher).await;
        store
            .install(&manifest(vec![entry("/new.js", None)]), Arc::new(fetcher.clone()))
            .await
            .unwrap();

        // Until activation the old generation is served
        assert!(store.contains(&url("/old.js")));
        assert!(!store.contains(&url("/new.js")));

        let removed = store.activate().await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].url(), "https://app.example.com/old.js");
        assert!(!store.contains(&url("/old.js")));
        assert!(store.contains(&url("/new.js")));
    }

    #[tokio::test]
    async fn test_lookup_ignores_tracking_parameters() {
        let store = store();
        let fetcher = MockFetcher::new();
        fetcher.respond_ok("/pricing", "pricing");
        install_and_activate(&store, &manifest(vec![entry("/pricing", Some("r1"))]), &fetcher)
            .await;

        let tracked = Url::parse("https://app.example.com/pricing?utm_source=mail&fbclid=x").unwrap();
        assert_eq!(store.match_url(&tracked).await.unwrap().body, "pricing");

        let other = Url::parse("https://app.example.com/pricing?plan=pro").unwrap();
        assert!(store.match_url(&other).await.is_none());
    }

    #[tokio::test]
    async fn test_lookup_tries_directory_index_and_clean_urls() {
        let store = store();
        let fetcher = MockFetcher::new();
        fetcher.respond_ok("/docs/index.html", "docs");
        fetcher.respond_ok("/about.html", "about");
        install_and_activate(
            &store,
            &manifest(vec![entry("/docs/index.html", None), entry("/about.html", None)]),
            &fetcher,
        )
        .await;

        assert_eq!(store.match_url(&url("/docs/")).await.unwrap().body, "docs");
        assert_eq!(store.match_url(&url("/about")).await.unwrap().body, "about");

        let strict = PrecacheStore::new(store.cache().clone(), origin())
            .with_directory_index(None)
            .with_clean_urls(false);
        assert!(strict.candidates(&url("/docs/")).len() == 1);
        assert!(strict.candidates(&url("/about")).len() == 1);
    }

    #[test]
    fn test_store_from_config() {
        let config = PrecacheConfig {
            critical: vec!["/".to_string()],
            concurrency: 0,
            ignore_url_parameters: vec!["^ref$".to_string()],
            directory_index: None,
            clean_urls: false,
            ..Default::default()
        };
        let store =
            PrecacheStore::from_config(&config, Arc::new(MemoryCache::new("precache")), origin())
                .unwrap();
        assert_eq!(store.critical(), &["/".to_string()]);
        assert_eq!(store.concurrency, 1);

        let candidates = store.candidates(&url("/docs/?ref=nav&utm_source=x"));
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1], "https://app.example.com/docs/?utm_source=x");

        let bad = PrecacheConfig {
            ignore_url_parameters: vec!["(".to_string()],
            ..Default::default()
        };
        assert!(
            PrecacheStore::from_config(&bad, Arc::new(MemoryCache::new("precache")), origin())
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_fragment_is_ignored_on_lookup() {
        let store = store();
        let fetcher = MockFetcher::new();
        fetcher.respond_ok("/guide", "guide");
        install_and_activate(&store, &manifest(vec![entry("/guide", None)]), &fetcher).await;

        assert!(store.contains(&url("/guide#install")));
        assert_eq!(store.match_path("/guide").await.unwrap().body, "guide");
    }
}
