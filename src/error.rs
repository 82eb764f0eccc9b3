// Error types module

use std::fmt;

use crate::cache::CacheError;
use crate::fetch::FetchError;
use crate::lifecycle::LifecycleError;
use crate::strategy::StrategyError;

/// Top-level error type for the orchestrator
///
/// Categorizes errors into 4 main types so the server can map them to
/// status codes and operators can tell configuration mistakes apart from
/// runtime failures.
#[derive(Debug, Clone)]
pub enum TsubameError {
    /// Configuration errors (invalid YAML, missing env vars, bad matchers, etc.)
    Config(String),

    /// Cache storage failures
    Cache(String),

    /// Network failures with nothing cached or precached to stand in
    Network(String),

    /// Unexpected orchestrator errors
    Internal(String),
}

impl TsubameError {
    /// HTTP status the interception server answers with
    pub fn status_code(&self) -> u16 {
        match self {
            TsubameError::Network(_) => 504,
            TsubameError::Config(_) | TsubameError::Cache(_) | TsubameError::Internal(_) => 500,
        }
    }
}

impl fmt::Display for TsubameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TsubameError::Config(msg) => write!(f, "Configuration error: {}", msg),
            TsubameError::Cache(msg) => write!(f, "Cache error: {}", msg),
            TsubameError::Network(msg) => write!(f, "Network error: {}", msg),
            TsubameError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for TsubameError {}

impl From<CacheError> for TsubameError {
    fn from(err: CacheError) -> Self {
        TsubameError::Cache(err.to_string())
    }
}

impl From<FetchError> for TsubameError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network(msg) => TsubameError::Network(msg),
            FetchError::InvalidRequest(msg) => TsubameError::Internal(msg),
        }
    }
}

impl From<StrategyError> for TsubameError {
    fn from(err: StrategyError) -> Self {
        match err {
            StrategyError::Network(e) => e.into(),
            StrategyError::CacheMiss(url) => {
                TsubameError::Network(format!("no cached response for {}", url))
            }
        }
    }
}

impl From<LifecycleError> for TsubameError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Precache(e) => e.into(),
            other => TsubameError::Internal(other.to_string()),
        }
    }
}
