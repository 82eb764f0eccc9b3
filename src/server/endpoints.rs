//! Built-in endpoints of the interception server.
//!
//! - `/__tsubame/health` - liveness with uptime and version
//! - `/__tsubame/status` - worker lifecycle state and cache statistics
//!
//! Functions return `EndpointResponse` so response generation stays testable
//! without a connection; the server turns it into an HTTP response.

use std::time::Instant;

use crate::lifecycle::LifecycleController;

/// Response from a built-in endpoint handler.
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl EndpointResponse {
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }
}

/// Generate response for the health endpoint.
pub fn handle_health(start_time: Instant) -> EndpointResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    })
    .to_string();

    EndpointResponse::json(200, body)
}

/// Generate response for the status endpoint.
///
/// Returns 503 until a worker is active so load balancers can hold traffic
/// back during the first install.
pub async fn handle_status(controller: &LifecycleController) -> EndpointResponse {
    let snapshot = match controller.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::error!(error = %e, "Failed to collect status snapshot");
            let body = serde_json::json!({ "status": "error", "error": e.to_string() });
            return EndpointResponse::json(500, body.to_string());
        }
    };

    let (status, label) = if snapshot.active.is_some() {
        (200, "active")
    } else {
        (503, "inactive")
    };

    let body = serde_json::json!({
        "status": label,
        "origin": controller.origin().as_str(),
        "worker": snapshot,
    })
    .to_string();

    EndpointResponse::json(status, body)
}
