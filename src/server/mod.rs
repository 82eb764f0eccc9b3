// Server module - hyper HTTP/1 interception server
//
// Every request arriving on the listener is turned into a `RequestDescriptor`
// and handed to the lifecycle controller. Passthrough requests are forwarded to
// the origin with the controller's fetcher.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use url::Url;

use crate::constants::{
    HEALTH_ENDPOINT_PATH, NO_STORE_CACHE_CONTROL, SECURITY_HEADERS, SOURCE_HEADER,
    STATUS_ENDPOINT_PATH,
};
use crate::error::TsubameError;
use crate::lifecycle::{FetchOutcome, LifecycleController};
use crate::request::{Destination, RequestDescriptor, RequestMode, Response};

pub mod endpoints;

pub use endpoints::EndpointResponse;

pub type HttpResponse = http::Response<Full<Bytes>>;

/// Build a descriptor for a request received by the server.
///
/// The URL is resolved against `origin`; `Sec-Fetch-Dest` and `Sec-Fetch-Mode`
/// supply destination and mode. Clients that send neither are treated as
/// navigating when they ask for HTML with a GET.
pub fn descriptor_from_request(
    request: Request<Bytes>,
    origin: &Url,
) -> Result<RequestDescriptor, TsubameError> {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = origin
        .join(path_and_query)
        .map_err(|e| TsubameError::Internal(format!("invalid request target: {}", e)))?;

    let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());
    let fetch_dest = header("sec-fetch-dest");
    let fetch_mode = header("sec-fetch-mode");

    let (destination, mode) = match (fetch_dest, fetch_mode) {
        (None, None) if parts.method == Method::GET && accepts_html(header(ACCEPT.as_str())) => {
            (Destination::Document, RequestMode::Navigate)
        }
        (dest, mode) => (
            dest.map(Destination::from_fetch_dest).unwrap_or_default(),
            mode.map(RequestMode::from_fetch_mode).unwrap_or(RequestMode::Cors),
        ),
    };

    Ok(RequestDescriptor::new(parts.method, url)
        .with_headers(parts.headers)
        .with_destination(destination)
        .with_mode(mode)
        .with_body(body))
}

fn accepts_html(accept: Option<&str>) -> bool {
    accept.map_or(false, |accept| accept.contains("text/html"))
}

/// HTTP front end for a lifecycle controller
pub struct InterceptionServer {
    controller: Arc<LifecycleController>,
    start_time: Instant,
}

impl InterceptionServer {
    pub fn new(controller: Arc<LifecycleController>) -> Self {
        Self {
            controller,
            start_time: Instant::now(),
        }
    }

    pub fn controller(&self) -> &Arc<LifecycleController> {
        &self.controller
    }

    /// Answer one fully-read request
    pub async fn handle(&self, request: Request<Bytes>) -> HttpResponse {
        if request.method() == Method::GET {
            match request.uri().path() {
                STATUS_ENDPOINT_PATH => {
                    let endpoint = endpoints::handle_status(&self.controller).await;
                    return endpoint_response(endpoint);
                }
                HEALTH_ENDPOINT_PATH => {
                    return endpoint_response(endpoints::handle_health(self.start_time));
                }
                _ => {}
            }
        }

        let descriptor = match descriptor_from_request(request, self.controller.origin()) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected malformed request");
                return error_response(StatusCode::BAD_REQUEST, &e.to_string());
            }
        };

        let preload = self.controller.start_preload(&descriptor);
        match self.controller.handle_fetch(&descriptor, preload).await {
            Ok(FetchOutcome::Respond {
                response, source, ..
            }) => into_http_response(response, source.as_str()),
            Ok(FetchOutcome::Passthrough) => self.forward(&descriptor).await,
            Err(e) => {
                let err = TsubameError::from(e);
                tracing::warn!(
                    method = %descriptor.method(),
                    url = %descriptor.url(),
                    error = %err,
                    "Request failed with nothing to serve"
                );
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                error_response(status, &err.to_string())
            }
        }
    }

    async fn forward(&self, request: &RequestDescriptor) -> HttpResponse {
        match self.controller.fetcher().fetch(request).await {
            Ok(response) => into_http_response(response, "passthrough"),
            Err(e) => {
                tracing::warn!(url = %request.url(), error = %e, "Passthrough fetch failed");
                error_response(StatusCode::BAD_GATEWAY, &e.to_string())
            }
        }
    }

    async fn handle_incoming(&self, request: Request<Incoming>) -> HttpResponse {
        let (parts, body) = request.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read request body");
                return error_response(StatusCode::BAD_REQUEST, "failed to read request body");
            }
        };
        self.handle(Request::from_parts(parts, body)).await
    }

    /// Accept connections until `shutdown` resolves
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            address = %listener.local_addr()?,
            origin = %self.controller.origin(),
            "Interception server listening"
        );
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => {
                    tracing::info!("Interception server shutting down");
                    return Ok(());
                }
            };

            let server = self.clone();
            tokio::spawn(async move {
                let service = service_fn(move |request: Request<Incoming>| {
                    let server = server.clone();
                    async move { Ok::<_, Infallible>(server.handle_incoming(request).await) }
                });
                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    tracing::debug!(peer = %peer, error = %e, "Connection closed with error");
                }
            });
        }
    }
}

fn apply_security_headers(response: &mut HttpResponse) {
    for (name, value) in SECURITY_HEADERS.iter().copied() {
        response.headers_mut().insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
}

fn into_http_response(response: Response, source: &'static str) -> HttpResponse {
    let mut out = http::Response::new(Full::new(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = response.headers;
    // The body is complete; hyper computes the length
    out.headers_mut().remove(CONTENT_LENGTH);
    out.headers_mut()
        .insert(SOURCE_HEADER, HeaderValue::from_static(source));
    apply_security_headers(&mut out);
    out
}

fn endpoint_response(endpoint: EndpointResponse) -> HttpResponse {
    let mut out = http::Response::new(Full::new(Bytes::from(endpoint.body)));
    *out.status_mut() =
        StatusCode::from_u16(endpoint.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    out.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static(endpoint.content_type),
    );
    out.headers_mut().insert(
        CACHE_CONTROL,
        HeaderValue::from_static(NO_STORE_CACHE_CONTROL),
    );
    apply_security_headers(&mut out);
    out
}

fn error_response(status: StatusCode, message: &str) -> HttpResponse {
    let body = serde_json::json!({ "error": message }).to_string();
    endpoint_response(EndpointResponse::json(status.as_u16(), body))
}
