//! Intercepted request and response types
//!
//! This module defines the values that flow through the orchestrator:
//! - `RequestDescriptor`: an immutable snapshot of an intercepted request
//! - `Destination`: what the requester will do with the response (document, script, ...)
//! - `Response`: a complete, self-contained response (status, headers, body)

use bytes::Bytes;
use http::header::{HeaderName, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

/// Request destination, as reported by the `Sec-Fetch-Dest` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Iframe,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    Worker,
    Audio,
    Video,
    #[default]
    Empty,
}

impl Destination {
    /// Parse a `Sec-Fetch-Dest` value. Unknown values map to `Empty`.
    pub fn from_fetch_dest(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" => Destination::Document,
            "iframe" | "frame" => Destination::Iframe,
            "script" | "sharedworker" => Destination::Script,
            "style" => Destination::Style,
            "image" => Destination::Image,
            "font" => Destination::Font,
            "manifest" => Destination::Manifest,
            "worker" | "serviceworker" => Destination::Worker,
            "audio" => Destination::Audio,
            "video" => Destination::Video,
            _ => Destination::Empty,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Document => "document",
            Destination::Iframe => "iframe",
            Destination::Script => "script",
            Destination::Style => "style",
            Destination::Image => "image",
            Destination::Font => "font",
            Destination::Manifest => "manifest",
            Destination::Worker => "worker",
            Destination::Audio => "audio",
            Destination::Video => "video",
            Destination::Empty => "empty",
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request mode, as reported by the `Sec-Fetch-Mode` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

impl RequestMode {
    pub fn from_fetch_mode(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "navigate" => RequestMode::Navigate,
            "same-origin" => RequestMode::SameOrigin,
            "no-cors" => RequestMode::NoCors,
            _ => RequestMode::Cors,
        }
    }
}

/// Immutable description of an intercepted request
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    url: Url,
    headers: HeaderMap,
    destination: Destination,
    mode: RequestMode,
    body: Bytes,
}

impl RequestDescriptor {
    /// Create a descriptor with no headers and an empty destination
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            destination: Destination::Empty,
            mode: RequestMode::Cors,
            body: Bytes::new(),
        }
    }

    /// Parse `url` and create a GET descriptor
    pub fn get(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Method::GET, Url::parse(url)?))
    }

    /// Parse `url` and create a top-level navigation (document) descriptor
    pub fn navigation(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::get(url)?
            .with_destination(Destination::Document)
            .with_mode(RequestMode::Navigate))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach a request body; only forwarded on passthrough
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// URL path, always starting with `/`
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// True when the request targets the same scheme/host/port as `origin`
    pub fn is_same_origin(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }

    /// True for top-level page loads
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// A complete response as stored in caches and returned to callers
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// 200 OK response with the given body
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Approximate in-memory size (body plus header bytes)
    pub fn size_bytes(&self) -> usize {
        let header_size: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.as_str().len() + value.len())
            .sum();
        self.body.len() + header_size
    }
}
