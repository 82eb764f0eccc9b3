// Router tests built from configuration, as the binary builds them

use rstest::rstest;
use std::sync::Arc;
use tsubame::cache::CacheStorage;
use tsubame::config::Config;
use tsubame::fetch::MockFetcher;
use tsubame::request::{Destination, RequestDescriptor};
use tsubame::router::{MatchContext, RouteDecision, Router};

fn shipped_router() -> (Router, CacheStorage) {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config.yaml");
    let config = Config::from_file(path).unwrap();
    let storage = CacheStorage::new();
    let router = Router::from_config(&config.routes, &storage, Arc::new(MockFetcher::new())).unwrap();
    (router, storage)
}

fn route_name(router: &Router, request: &RequestDescriptor) -> Option<String> {
    let origin = url::Url::parse("http://localhost:3000").unwrap();
    let ctx = MatchContext::new(request, request.is_same_origin(&origin), false);
    match router.route(&ctx) {
        RouteDecision::Matched(route) => Some(route.name().to_string()),
        RouteDecision::Passthrough => None,
    }
}

#[rstest]
#[case("/_next/static/chunks/main.js", Destination::Script, Some("next-static"))]
#[case("/logo.png", Destination::Image, Some("static-images"))]
#[case("/fonts/inter.woff2", Destination::Font, Some("static-fonts"))]
#[case("/api/todos", Destination::Empty, Some("apis"))]
#[case("/api/auth/session", Destination::Empty, None)]
#[case("/data.json", Destination::Empty, None)]
fn test_shipped_routes(
    #[case] path: &str,
    #[case] destination: Destination,
    #[case] expected: Option<&str>,
) {
    let (router, _) = shipped_router();
    let request = RequestDescriptor::get(&format!("http://localhost:3000{}", path))
        .unwrap()
        .with_destination(destination);
    assert_eq!(route_name(&router, &request).as_deref(), expected);
}

#[test]
fn test_rsc_prefetch_takes_precedence() {
    let (router, _) = shipped_router();
    let request = RequestDescriptor::get("http://localhost:3000/dashboard")
        .unwrap()
        .with_header(
            http::HeaderName::from_static("rsc"),
            http::HeaderValue::from_static("1"),
        )
        .with_header(
            http::HeaderName::from_static("next-router-prefetch"),
            http::HeaderValue::from_static("1"),
        );
    assert_eq!(
        route_name(&router, &request).as_deref(),
        Some("pages-rsc-prefetch")
    );
}

#[test]
fn test_cross_origin_document_is_not_routed() {
    let (router, _) = shipped_router();
    let request = RequestDescriptor::navigation("https://other.example.com/").unwrap();
    assert_eq!(route_name(&router, &request), None);
}

#[test]
fn test_every_route_gets_its_own_cache() {
    let (router, storage) = shipped_router();
    assert_eq!(storage.names().len(), router.len());
}
