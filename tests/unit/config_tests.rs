// Configuration unit tests against the shipped config.yaml

use std::path::PathBuf;
use tsubame::config::*;
use tsubame::expiration::AgeBasis;
use tsubame::strategy::Handler;

fn shipped_config_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config.yaml")
}

#[test]
fn test_shipped_config_loads_and_validates() {
    let config = Config::from_file(shipped_config_path()).expect("config.yaml should load");
    config.validate().expect("config.yaml should validate");

    assert_eq!(config.server.origin, "http://localhost:3000");
    assert!(config.worker.skip_waiting);
    assert!(config.worker.clients_claim);
    assert!(config.worker.navigation_preload);
}

#[test]
fn test_shipped_config_declares_page_routes_first() {
    let config = Config::from_file(shipped_config_path()).unwrap();
    let names: Vec<&str> = config.routes.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(&names[..3], &["pages-rsc-prefetch", "pages-rsc", "pages"]);

    for route in &config.routes[..3] {
        assert_eq!(route.handler, Handler::StaleWhileRevalidate);
        assert_eq!(route.expiration.max_entries, Some(200));
        assert_eq!(route.expiration.max_age_seconds, Some(86400));
        assert_eq!(route.expiration.age_basis, AgeBasis::LastUsed);
        assert_eq!(route.cache_name(), route.name);
    }
}

#[test]
fn test_shipped_config_falls_back_to_offline_page() {
    let config = Config::from_file(shipped_config_path()).unwrap();
    assert_eq!(config.fallbacks.len(), 1);
    assert_eq!(config.fallbacks[0].url, "/offline");

    let urls: Vec<&str> = config
        .precache
        .additional_entries
        .iter()
        .map(|e| e.url.as_str())
        .collect();
    assert_eq!(urls, vec!["/", "/offline"]);
    assert_eq!(config.precache.critical, vec!["/", "/offline"]);
}

#[test]
fn test_shipped_manifest_loads_with_additional_entries() {
    let config = Config::from_file(shipped_config_path()).unwrap();
    let manifest_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("precache-manifest.json");

    let manifest = config.precache.load_manifest(Some(&manifest_path)).unwrap();
    assert!(manifest.contains_url("/"));
    assert!(manifest.contains_url("/offline"));
    assert!(manifest.contains_url("/favicon.ico"));
}

#[test]
fn test_route_defaults() {
    let yaml = r#"
server:
  origin: "https://app.example.com"
routes:
  - name: pages
"#;
    let config = Config::from_yaml_with_env(yaml).unwrap();
    let route = &config.routes[0];
    assert_eq!(route.method, "GET");
    assert_eq!(route.handler, Handler::StaleWhileRevalidate);
    assert_eq!(route.cacheable_statuses, vec![200]);
    assert!(!route.ignore_search);
    assert!(config.validate().is_ok());
}

#[test]
fn test_unknown_matcher_field_is_rejected() {
    let yaml = r#"
server:
  origin: "https://app.example.com"
routes:
  - name: pages
    matcher:
      destination: document
"#;
    assert!(Config::from_yaml_with_env(yaml).is_err());
}

#[test]
fn test_listen_address_and_origin_url() {
    let config = Config::from_file(shipped_config_path()).unwrap();
    assert_eq!(config.server.listen_address(), "127.0.0.1:8080");
    assert_eq!(
        config.server.origin_url().unwrap().as_str(),
        "http://localhost:3000/"
    );
}
