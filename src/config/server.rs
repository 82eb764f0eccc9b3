//! Server configuration types.
//!
//! This module defines the interception server configuration:
//! - Address and port bindings
//! - The application origin that same-origin checks and precache URLs resolve against
//! - Network fetch timeout for the origin client
//!
//! Default values are sourced from `crate::constants`.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{DEFAULT_LISTEN_ADDRESS, DEFAULT_LISTEN_PORT};

fn default_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Application origin, e.g. `https://app.example.com`
    pub origin: String,
    /// Network fetch timeout in seconds (default: none)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_seconds: Option<u64>,
}

impl ServerConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn origin_url(&self) -> Result<Url, String> {
        let url = Url::parse(&self.origin)
            .map_err(|e| format!("Invalid server origin '{}': {}", self.origin, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "Server origin '{}' must start with http:// or https://",
                self.origin
            ));
        }
        if url.host_str().is_none() {
            return Err(format!("Server origin '{}' has no host", self.origin));
        }
        Ok(url)
    }
}
