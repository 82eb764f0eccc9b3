//! Worker generations and the clients they control

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::SystemTime;
use uuid::Uuid;

use crate::precache::Readiness;

pub type WorkerId = Uuid;
pub type ClientId = Uuid;

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    Waiting,
    Active,
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// Activation behavior of newly installed workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerOptions {
    /// Activate as soon as install completes, even while an older worker
    /// still controls clients
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Take control of every connected client on activation
    #[serde(default = "default_true")]
    pub clients_claim: bool,

    /// Accept preloaded network responses for navigations
    #[serde(default = "default_true")]
    pub navigation_preload: bool,

    /// Fail the install when a critical asset could not be precached
    #[serde(default)]
    pub require_offline_ready: bool,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            skip_waiting: true,
            clients_claim: true,
            navigation_preload: true,
            require_offline_ready: false,
        }
    }
}

/// One worker generation
#[derive(Debug, Clone, Serialize)]
pub struct Worker {
    pub id: WorkerId,
    pub state: WorkerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness: Option<Readiness>,
    pub created_at: SystemTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<SystemTime>,
}

impl Worker {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: WorkerState::Installing,
            readiness: None,
            created_at: SystemTime::now(),
            activated_at: None,
        }
    }

    pub(crate) fn transition(&mut self, state: WorkerState) {
        tracing::info!(
            worker = %self.id,
            from = %self.state,
            to = %state,
            "Worker state changed"
        );
        if state == WorkerState::Active {
            self.activated_at = Some(SystemTime::now());
        }
        self.state = state;
    }
}

impl Default for Worker {
    fn default() -> Self {
        Self::new()
    }
}

/// Connected clients (pages) and the worker controlling each
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClientRegistry {
    clients: BTreeMap<ClientId, Option<WorkerId>>,
}

impl ClientRegistry {
    pub fn connect(&mut self, controller: Option<WorkerId>) -> ClientId {
        let id = Uuid::new_v4();
        self.clients.insert(id, controller);
        id
    }

    /// Returns false if the client was not connected
    pub fn disconnect(&mut self, id: &ClientId) -> bool {
        self.clients.remove(id).is_some()
    }

    pub fn controller(&self, id: &ClientId) -> Option<WorkerId> {
        self.clients.get(id).copied().flatten()
    }

    pub fn is_connected(&self, id: &ClientId) -> bool {
        self.clients.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Number of clients controlled by `worker`
    pub fn controlled_by(&self, worker: &WorkerId) -> usize {
        self.clients
            .values()
            .filter(|controller| controller.as_ref() == Some(worker))
            .count()
    }

    /// Hand clients of `from` over to `to`; with `claim_all`, uncontrolled
    /// clients are taken as well
    pub fn hand_over(&mut self, from: Option<WorkerId>, to: WorkerId, claim_all: bool) {
        for controller in self.clients.values_mut() {
            let owned_by_previous = from.is_some() && *controller == from;
            if owned_by_previous || claim_all {
                *controller = Some(to);
            }
        }
    }

    /// Drop control by `worker`, leaving its clients uncontrolled
    pub fn release(&mut self, worker: &WorkerId) {
        for controller in self.clients.values_mut() {
            if controller.as_ref() == Some(worker) {
                *controller = None;
            }
        }
    }
}
