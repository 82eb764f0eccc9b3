//! Route and fallback configuration types.
//!
//! A route binds a declarative matcher to a caching handler and one named
//! cache with its expiration rule. Routes are evaluated in file order.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CACHEABLE_STATUSES, DEFAULT_OFFLINE_URL, DEFAULT_ROUTE_METHOD};
use crate::expiration::ExpirationRule;
use crate::router::RequestMatcherConfig;
use crate::strategy::Handler;

fn default_method() -> String {
    DEFAULT_ROUTE_METHOD.to_string()
}

fn default_cacheable_statuses() -> Vec<u16> {
    DEFAULT_CACHEABLE_STATUSES.to_vec()
}

fn default_fallback_url() -> String {
    DEFAULT_OFFLINE_URL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub name: String,
    /// Named cache for this route (default: the route name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_name: Option<String>,
    #[serde(default)]
    pub handler: Handler,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub matcher: RequestMatcherConfig,
    #[serde(default)]
    pub expiration: ExpirationRule,
    /// Response statuses that may be stored (default: 200)
    #[serde(default = "default_cacheable_statuses")]
    pub cacheable_statuses: Vec<u16>,
    /// Drop the query string when deriving cache keys
    #[serde(default)]
    pub ignore_search: bool,
}

impl RouteConfig {
    pub fn cache_name(&self) -> &str {
        self.cache_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Precached substitute URL (default: /offline)
    #[serde(default = "default_fallback_url")]
    pub url: String,
    #[serde(default)]
    pub matcher: RequestMatcherConfig,
}
