// Lifecycle tests driving a controller built from configuration

use http::StatusCode;
use std::sync::Arc;
use tsubame::config::Config;
use tsubame::fetch::MockFetcher;
use tsubame::lifecycle::{FetchOutcome, LifecycleController, LifecycleError, WorkerState};
use tsubame::precache::{PrecacheEntry, PrecacheManifest, Readiness};
use tsubame::request::{RequestDescriptor, Response};
use tsubame::strategy::ResponseSource;

fn config(worker: &str) -> Config {
    let yaml = format!(
        r#"
server:
  origin: "https://app.example.com"
worker:
{}
routes:
  - name: pages
    matcher: {{ same_origin: true, destinations: [document] }}
fallbacks:
  - url: /offline
    matcher: {{ destinations: [document] }}
"#,
        worker
    );
    let config = Config::from_yaml_with_env(&yaml).unwrap();
    config.validate().unwrap();
    config
}

fn manifest(revision: &str) -> PrecacheManifest {
    PrecacheManifest::new(vec![
        PrecacheEntry::new("/", Some(revision.to_string())),
        PrecacheEntry::new("/offline", Some(revision.to_string())),
    ])
    .unwrap()
}

async fn body_of(controller: &LifecycleController, path: &str) -> String {
    let request =
        RequestDescriptor::navigation(&format!("https://app.example.com{}", path)).unwrap();
    match controller.handle_fetch(&request, None).await.unwrap() {
        FetchOutcome::Respond { response, .. } => String::from_utf8_lossy(&response.body).into_owned(),
        FetchOutcome::Passthrough => panic!("expected a response for {}", path),
    }
}

#[tokio::test]
async fn test_redeploy_waits_for_clients_then_serves_new_revision() {
    let fetcher = MockFetcher::new();
    fetcher.respond_ok("/", "home v1");
    fetcher.respond_ok("/offline", "offline v1");

    let controller = LifecycleController::from_config(
        &config("  skip_waiting: false\n  clients_claim: false"),
        Arc::new(fetcher.clone()),
    )
    .unwrap();
    let first = controller.install(&manifest("v1")).await.unwrap();
    assert_eq!(first.readiness, Readiness::Ready);
    let v1 = controller.active_worker().unwrap().id;

    let client = controller.connect_client();
    assert_eq!(controller.client_controller(&client), Some(v1));

    fetcher.respond_ok("/", "home v2");
    fetcher.respond_ok("/offline", "offline v2");
    controller.install(&manifest("v2")).await.unwrap();

    let waiting = controller.waiting_worker().unwrap();
    assert_eq!(waiting.state, WorkerState::Waiting);
    assert_eq!(controller.active_worker().unwrap().id, v1);

    // The active worker keeps its own generation while the new one waits
    assert_eq!(body_of(&controller, "/").await, "home v1");
    assert_eq!(body_of(&controller, "/offline").await, "offline v1");

    assert!(controller.disconnect_client(&client).await.unwrap());
    let active = controller.active_worker().unwrap();
    assert_eq!(active.id, waiting.id);
    assert!(controller.waiting_worker().is_none());

    assert_eq!(body_of(&controller, "/").await, "home v2");
    assert_eq!(controller.precache().len(), 2);
}

#[tokio::test]
async fn test_require_offline_ready_rejects_degraded_install() {
    let fetcher = MockFetcher::new();
    fetcher.respond_ok("/", "home");

    let controller = LifecycleController::from_config(
        &config("  require_offline_ready: true"),
        Arc::new(fetcher),
    )
    .unwrap();

    match controller.install(&manifest("v1")).await {
        Err(LifecycleError::NotOfflineReady(missing)) => assert_eq!(missing, vec!["/offline"]),
        other => panic!("expected NotOfflineReady, got {:?}", other.map(|r| r.readiness)),
    }
    assert!(!controller.is_active());

    let snapshot = controller.snapshot().await.unwrap();
    assert_eq!(snapshot.retired_workers, 1);
}

#[tokio::test]
async fn test_rejected_redeploy_keeps_active_generation() {
    let fetcher = MockFetcher::new();
    fetcher.respond_ok("/", "home v1");
    fetcher.respond_ok("/offline", "offline v1");

    let controller = LifecycleController::from_config(
        &config("  require_offline_ready: true"),
        Arc::new(fetcher.clone()),
    )
    .unwrap();
    controller.install(&manifest("v1")).await.unwrap();
    let v1 = controller.active_worker().unwrap().id;

    fetcher.respond_ok("/", "home v2");
    fetcher.respond(
        "/offline",
        Response::new(StatusCode::INTERNAL_SERVER_ERROR, "broken build"),
    );
    assert!(matches!(
        controller.install(&manifest("v2")).await,
        Err(LifecycleError::NotOfflineReady(_))
    ));

    assert_eq!(controller.active_worker().unwrap().id, v1);
    assert!(controller.waiting_worker().is_none());
    assert!(!controller.precache().has_staged());
    assert_eq!(body_of(&controller, "/").await, "home v1");
    assert_eq!(body_of(&controller, "/offline").await, "offline v1");
    // The rejected revision of "/" is not kept around
    assert_eq!(controller.precache().cache().len().await.unwrap(), 2);
}

#[tokio::test]
async fn test_navigation_served_from_runtime_cache_when_offline() {
    let fetcher = MockFetcher::new();
    fetcher.respond_ok("/", "home");
    fetcher.respond_ok("/offline", "offline");
    fetcher.respond_ok("/dashboard", "dashboard");

    let controller =
        LifecycleController::from_config(&config("  skip_waiting: true"), Arc::new(fetcher.clone()))
            .unwrap();
    controller.install(&manifest("v1")).await.unwrap();

    assert_eq!(body_of(&controller, "/dashboard").await, "dashboard");

    fetcher.set_offline(true);
    let request = RequestDescriptor::navigation("https://app.example.com/dashboard").unwrap();
    match controller.handle_fetch(&request, None).await.unwrap() {
        FetchOutcome::Respond {
            response,
            source,
            revalidation,
        } => {
            assert_eq!(source, ResponseSource::Cache);
            assert_eq!(response.body, "dashboard");
            // The refresh fails quietly
            revalidation.unwrap().await.unwrap();
        }
        FetchOutcome::Passthrough => panic!("expected cached page"),
    }
    assert_eq!(body_of(&controller, "/dashboard").await, "dashboard");
}
