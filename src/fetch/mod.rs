//! Network fetcher
//!
//! The `Fetcher` trait is the single seam through which the orchestrator talks to
//! the network. `HttpFetcher` implements it with reqwest; tests substitute fakes.

use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use std::time::Duration;

use crate::request::{RequestDescriptor, Response};

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

#[cfg(any(test, feature = "test-util"))]
pub use mock::MockFetcher;

/// Headers that describe the client connection rather than the request itself
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "host",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Network fetch errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, connect, reset, timeout imposed by the host)
    #[error("Network error: {0}")]
    Network(String),

    /// The request could not be expressed on the wire
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Performs network requests on behalf of the orchestrator
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue the request and return the complete response.
    /// Non-2xx statuses are successful fetches; only transport failures are errors.
    async fn fetch(&self, request: &RequestDescriptor) -> Result<Response, FetchError>;
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher. `timeout` of None leaves request duration unbounded.
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn to_reqwest_headers(headers: &HeaderMap) -> reqwest::header::HeaderMap {
        let mut out = reqwest::header::HeaderMap::new();
        for (name, value) in headers {
            if HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
                continue;
            }
            let name = reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes());
            let value = reqwest::header::HeaderValue::from_bytes(value.as_bytes());
            if let (Ok(name), Ok(value)) = (name, value) {
                out.append(name, value);
            }
        }
        out
    }

    fn from_reqwest_headers(headers: &reqwest::header::HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::new();
        for (name, value) in headers {
            if HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
                continue;
            }
            let name = HeaderName::from_bytes(name.as_str().as_bytes());
            let value = HeaderValue::from_bytes(value.as_bytes());
            if let (Ok(name), Ok(value)) = (name, value) {
                out.append(name, value);
            }
        }
        out
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<Response, FetchError> {
        let method = reqwest::Method::from_bytes(request.method().as_str().as_bytes())
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;

        let mut builder = self
            .client
            .request(method, request.url().as_str())
            .headers(Self::to_reqwest_headers(request.headers()));
        if !request.body().is_empty() {
            builder = builder.body(request.body().clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let headers = Self::from_reqwest_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        tracing::debug!(
            url = %request.url(),
            status = status.as_u16(),
            bytes = body.len(),
            "Network fetch completed"
        );

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}
