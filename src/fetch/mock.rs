//! Mock fetcher for testing (in-memory responses keyed by URL path)

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use super::{FetchError, Fetcher};
use crate::request::{RequestDescriptor, Response};

/// Mock network that serves canned responses for paths
///
/// Paths with no canned response fail with a network error, as does every
/// request while the mock is offline.
#[derive(Clone)]
pub struct MockFetcher {
    responses: Arc<RwLock<HashMap<String, Response>>>,
    calls: Arc<RwLock<HashMap<String, usize>>>,
    total_calls: Arc<AtomicUsize>,
    offline: Arc<RwLock<bool>>,
    gate: Arc<watch::Sender<bool>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            responses: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(HashMap::new())),
            total_calls: Arc::new(AtomicUsize::new(0)),
            offline: Arc::new(RwLock::new(false)),
            gate: Arc::new(gate),
        }
    }

    /// Serve `response` for `path` (path plus optional `?query`)
    pub fn respond(&self, path: &str, response: Response) {
        self.responses.write().insert(path.to_string(), response);
    }

    /// Serve a 200 response with `body` for `path`
    pub fn respond_ok(&self, path: &str, body: &str) {
        self.respond(path, Response::ok(body.to_string()));
    }

    /// Remove the canned response so `path` fails with a network error
    pub fn fail(&self, path: &str) {
        self.responses.write().remove(path);
    }

    /// Simulate total network loss
    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    /// Hold every fetch until `release` is called
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Number of fetches issued for `path`
    pub fn calls(&self, path: &str) -> usize {
        self.calls.read().get(path).copied().unwrap_or(0)
    }

    /// Number of fetches issued for any path
    pub fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    fn request_path(request: &RequestDescriptor) -> String {
        match request.url().query() {
            Some(query) => format!("{}?{}", request.url().path(), query),
            None => request.url().path().to_string(),
        }
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<Response, FetchError> {
        let path = Self::request_path(request);
        *self.calls.write().entry(path.clone()).or_insert(0) += 1;
        self.total_calls.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        if *self.offline.read() {
            return Err(FetchError::Network(format!("offline: {}", path)));
        }

        self.responses
            .read()
            .get(&path)
            .cloned()
            .ok_or_else(|| FetchError::Network(format!("connection refused: {}", path)))
    }
}
