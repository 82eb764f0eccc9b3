//! Lifecycle controller
//!
//! The controller owns every cache of the orchestrator and drives worker
//! generations through `installing -> waiting -> active -> redundant`.
//! It is also the interception entry point: `handle_fetch` consults the
//! precache, then the router, then (after a complete failure) the fallback
//! registry.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use url::Url;

use crate::cache::{CacheError, CacheStorage, StorageStats};
use crate::config::Config;
use crate::constants::PRECACHE_NAME;
use crate::fallback::FallbackRegistry;
use crate::fetch::Fetcher;
use crate::precache::{InstallReport, PrecacheManifest, PrecacheStore, Readiness};
use crate::request::{RequestDescriptor, Response};
use crate::router::{MatchContext, RouteDecision, Router};
use crate::strategy::{Preload, ResponseSource, StrategyError};

pub mod worker;

pub use worker::{ClientId, ClientRegistry, Worker, WorkerId, WorkerOptions, WorkerState};

/// Lifecycle failures
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("an install is already in progress")]
    InstallInProgress,

    #[error("no waiting worker to activate")]
    NoWaitingWorker,

    #[error("critical assets could not be precached: {}", .0.join(", "))]
    NotOfflineReady(Vec<String>),

    #[error("precache failed: {0}")]
    Precache(#[from] CacheError),
}

/// Result of intercepting one request
#[derive(Debug)]
pub enum FetchOutcome {
    Respond {
        response: Response,
        source: ResponseSource,
        /// Background refresh started by a stale-while-revalidate hit
        revalidation: Option<JoinHandle<()>>,
    },
    /// Not handled; forward to the network unmodified
    Passthrough,
}

impl FetchOutcome {
    fn respond(response: Response, source: ResponseSource) -> Self {
        FetchOutcome::Respond {
            response,
            source,
            revalidation: None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, FetchOutcome::Passthrough)
    }
}

#[derive(Debug, Default)]
struct Registration {
    installing: Option<Worker>,
    waiting: Option<Worker>,
    active: Option<Worker>,
    retired: u64,
    clients: ClientRegistry,
    last_install: Option<InstallReport>,
}

impl Registration {
    fn retire_active(&mut self) -> Option<WorkerId> {
        let mut previous = self.active.take()?;
        previous.transition(WorkerState::Redundant);
        self.retired += 1;
        Some(previous.id)
    }
}

/// Point-in-time view of the controller, served by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installing: Option<Worker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting: Option<Worker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<Worker>,
    pub retired_workers: u64,
    pub clients: usize,
    pub precached_urls: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_install: Option<InstallReport>,
    pub caches: StorageStats,
}

pub struct LifecycleController {
    storage: Arc<CacheStorage>,
    precache: Arc<PrecacheStore>,
    router: Router,
    fallbacks: FallbackRegistry,
    fetcher: Arc<dyn Fetcher>,
    options: WorkerOptions,
    registration: RwLock<Registration>,
}

impl LifecycleController {
    pub fn new(
        storage: Arc<CacheStorage>,
        precache: Arc<PrecacheStore>,
        router: Router,
        fallbacks: FallbackRegistry,
        fetcher: Arc<dyn Fetcher>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            storage,
            precache,
            router,
            fallbacks,
            fetcher,
            options,
            registration: RwLock::new(Registration::default()),
        }
    }

    /// Build the controller from configuration: caches first, then the
    /// router and fallbacks that reference them.
    pub fn from_config(config: &Config, fetcher: Arc<dyn Fetcher>) -> Result<Self, String> {
        let origin = config.server.origin_url()?;
        let storage = Arc::new(CacheStorage::new());

        let precache = Arc::new(PrecacheStore::from_config(
            &config.precache,
            storage.open(PRECACHE_NAME),
            origin,
        )?);
        let router = Router::from_config(&config.routes, &storage, fetcher.clone())?;
        let fallbacks = FallbackRegistry::from_config(&config.fallbacks)?;

        tracing::info!(
            origin = %precache.origin(),
            routes = router.len(),
            fallbacks = fallbacks.rules().len(),
            caches = storage.names().len(),
            "Lifecycle controller configured"
        );

        Ok(Self::new(
            storage,
            precache,
            router,
            fallbacks,
            fetcher,
            config.worker.clone(),
        ))
    }

    pub fn storage(&self) -> &Arc<CacheStorage> {
        &self.storage
    }

    pub fn precache(&self) -> &Arc<PrecacheStore> {
        &self.precache
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    pub fn origin(&self) -> &Url {
        self.precache.origin()
    }

    pub fn active_worker(&self) -> Option<Worker> {
        self.registration.read().active.clone()
    }

    pub fn waiting_worker(&self) -> Option<Worker> {
        self.registration.read().waiting.clone()
    }

    pub fn is_active(&self) -> bool {
        self.registration.read().active.is_some()
    }

    /// Install a new worker generation from `manifest`.
    ///
    /// On success the worker is waiting, or already active when nothing holds
    /// it back (skip waiting, or no clients controlled by an older worker).
    /// Until then the active worker keeps serving its own precache generation.
    pub async fn install(
        &self,
        manifest: &PrecacheManifest,
    ) -> Result<InstallReport, LifecycleError> {
        let worker_id = {
            let mut registration = self.registration.write();
            if registration.installing.is_some() {
                return Err(LifecycleError::InstallInProgress);
            }
            let worker = Worker::new();
            let id = worker.id;
            tracing::info!(worker = %id, entries = manifest.len(), "Installing worker");
            registration.installing = Some(worker);
            id
        };

        let result = self.precache.install(manifest, self.fetcher.clone()).await;

        let outcome = {
            let mut registration = self.registration.write();
            let mut worker = match registration.installing.take() {
                Some(worker) => worker,
                None => Worker::new(),
            };

            match result {
                Err(e) => {
                    worker.transition(WorkerState::Redundant);
                    registration.retired += 1;
                    tracing::error!(worker = %worker_id, error = %e, "Worker install failed");
                    Err(LifecycleError::from(e))
                }
                Ok(report) => {
                    worker.readiness = Some(report.readiness);
                    registration.last_install = Some(report.clone());

                    if report.readiness == Readiness::Degraded && self.options.require_offline_ready {
                        worker.transition(WorkerState::Redundant);
                        registration.retired += 1;
                        tracing::error!(
                            worker = %worker_id,
                            missing = ?report.missing_critical,
                            "Worker install rejected, app would not be offline ready"
                        );
                        Err(LifecycleError::NotOfflineReady(
                            report.missing_critical.clone(),
                        ))
                    } else {
                        worker.transition(WorkerState::Waiting);
                        if let Some(mut previous) = registration.waiting.replace(worker) {
                            // A newer install supersedes a worker that never activated
                            previous.transition(WorkerState::Redundant);
                            registration.retired += 1;
                        }
                        Ok(report)
                    }
                }
            }
        };

        let report = match outcome {
            Ok(report) => report,
            Err(e) => {
                // The rejected generation must never be served
                if let Err(discard) = self.precache.discard_staged().await {
                    tracing::warn!(error = %discard, "Failed to discard rejected precache generation");
                }
                return Err(e);
            }
        };

        if self.can_activate_waiting() {
            self.activate_waiting().await?;
        } else {
            tracing::info!(
                worker = %worker_id,
                "Worker waiting for clients of the previous worker to close"
            );
        }

        Ok(report)
    }

    fn can_activate_waiting(&self) -> bool {
        let registration = self.registration.read();
        if registration.waiting.is_none() {
            return false;
        }
        if self.options.skip_waiting {
            return true;
        }
        match &registration.active {
            Some(active) => registration.clients.controlled_by(&active.id) == 0,
            None => true,
        }
    }

    /// Activate the waiting worker regardless of open clients
    pub async fn skip_waiting(&self) -> Result<WorkerId, LifecycleError> {
        self.activate_waiting().await
    }

    async fn activate_waiting(&self) -> Result<WorkerId, LifecycleError> {
        if self.registration.read().waiting.is_none() {
            return Err(LifecycleError::NoWaitingWorker);
        }

        // Swap in the staged precache generation; revisions it no longer
        // references go with the previous worker
        if let Err(e) = self.precache.activate().await {
            tracing::warn!(error = %e, "Precache sweep failed during activation");
        }

        let mut registration = self.registration.write();
        let mut worker = registration
            .waiting
            .take()
            .ok_or(LifecycleError::NoWaitingWorker)?;
        let id = worker.id;

        let previous = registration.retire_active();
        worker.transition(WorkerState::Active);
        registration.active = Some(worker);
        registration
            .clients
            .hand_over(previous, id, self.options.clients_claim);

        tracing::info!(
            worker = %id,
            claimed = self.options.clients_claim,
            controlled_clients = registration.clients.controlled_by(&id),
            "Worker activated"
        );
        Ok(id)
    }

    /// Make the active worker redundant. Its clients become uncontrolled and
    /// every request passes through until another worker activates.
    pub fn retire(&self) -> Option<WorkerId> {
        let mut registration = self.registration.write();
        let id = registration.retire_active()?;
        registration.clients.release(&id);
        Some(id)
    }

    /// Register a client. It is controlled by the active worker, if any.
    pub fn connect_client(&self) -> ClientId {
        let mut registration = self.registration.write();
        let controller = registration.active.as_ref().map(|worker| worker.id);
        registration.clients.connect(controller)
    }

    /// Unregister a client; a waiting worker activates once the last client
    /// of the previous worker is gone.
    pub async fn disconnect_client(&self, id: &ClientId) -> Result<bool, LifecycleError> {
        let removed = self.registration.write().clients.disconnect(id);
        if removed && self.can_activate_waiting() {
            self.activate_waiting().await?;
        }
        Ok(removed)
    }

    pub fn client_controller(&self, id: &ClientId) -> Option<WorkerId> {
        self.registration.read().clients.controller(id)
    }

    /// Start the network fetch for a navigation ahead of `handle_fetch`, so
    /// it overlaps the precache lookup and routing. None when navigation
    /// preload is off, no worker is active, or the precache will answer.
    pub fn start_preload(&self, request: &RequestDescriptor) -> Option<Preload> {
        if !self.options.navigation_preload
            || !request.is_navigation()
            || !self.is_active()
            || self.precache.contains(request.url())
        {
            return None;
        }
        tracing::trace!(url = %request.url(), "Navigation preload started");
        Some(Preload::spawn(self.fetcher.clone(), request.clone()))
    }

    /// Intercept one request.
    ///
    /// `preload` is a navigation preload; it is only used for navigations and
    /// only when navigation preload is enabled. An unused preload is aborted.
    pub async fn handle_fetch(
        &self,
        request: &RequestDescriptor,
        preload: Option<Preload>,
    ) -> Result<FetchOutcome, StrategyError> {
        let preload = match preload {
            Some(preload)
                if self.options.navigation_preload
                    && request.is_navigation()
                    && self.is_active() =>
            {
                Some(preload)
            }
            Some(preload) => {
                preload.cancel();
                None
            }
            None => None,
        };

        if !self.is_active() {
            return Ok(FetchOutcome::Passthrough);
        }

        let same_origin = request.is_same_origin(self.origin());
        let precached = self.precache.contains(request.url());

        if precached && request.method() == http::Method::GET {
            if let Some(response) = self.precache.match_url(request.url()).await {
                tracing::debug!(url = %request.url(), "Serving from precache");
                if let Some(preload) = preload {
                    preload.cancel();
                }
                return Ok(FetchOutcome::respond(response, ResponseSource::Precache));
            }
        }

        let ctx = MatchContext::new(request, same_origin, precached);
        let route = match self.router.route(&ctx) {
            RouteDecision::Matched(route) => route,
            RouteDecision::Passthrough => {
                tracing::trace!(url = %request.url(), "No route matched, passing through");
                return Ok(self.passthrough(request, preload).await);
            }
        };

        match route.executor().handle(request, preload).await {
            Ok(result) => {
                tracing::debug!(
                    url = %request.url(),
                    route = %route.name(),
                    source = result.source.as_str(),
                    status = result.response.status.as_u16(),
                    "Request handled"
                );
                Ok(FetchOutcome::Respond {
                    response: result.response,
                    source: result.source,
                    revalidation: result.revalidation,
                })
            }
            Err(e) => {
                tracing::debug!(url = %request.url(), route = %route.name(), error = %e, "Strategy failed");
                match self.fallbacks.resolve(&ctx, &self.precache).await {
                    Some(response) => Ok(FetchOutcome::respond(response, ResponseSource::Fallback)),
                    None => Err(e),
                }
            }
        }
    }

    /// An unrouted navigation whose preload is already under way answers with
    /// it rather than fetching a second time
    async fn passthrough(&self, request: &RequestDescriptor, preload: Option<Preload>) -> FetchOutcome {
        let Some(preload) = preload else {
            return FetchOutcome::Passthrough;
        };
        match preload.response().await {
            Ok(response) => FetchOutcome::respond(response, ResponseSource::Network),
            Err(e) => {
                tracing::debug!(url = %request.url(), error = %e, "Navigation preload failed, passing through");
                FetchOutcome::Passthrough
            }
        }
    }

    pub async fn snapshot(&self) -> Result<LifecycleSnapshot, CacheError> {
        let caches = self.storage.stats().await?;
        let registration = self.registration.read();
        Ok(LifecycleSnapshot {
            installing: registration.installing.clone(),
            waiting: registration.waiting.clone(),
            active: registration.active.clone(),
            retired_workers: registration.retired,
            clients: registration.clients.len(),
            precached_urls: self.precache.len(),
            last_install: registration.last_install.clone(),
            caches,
        })
    }
}
