// Error taxonomy tests

use tsubame::cache::CacheError;
use tsubame::error::TsubameError;
use tsubame::fetch::FetchError;
use tsubame::lifecycle::LifecycleError;
use tsubame::strategy::StrategyError;

#[test]
fn test_error_categories_display_with_prefix() {
    let cases = [
        (TsubameError::Config("bad yaml".into()), "Configuration error: bad yaml"),
        (TsubameError::Cache("full".into()), "Cache error: full"),
        (TsubameError::Network("offline".into()), "Network error: offline"),
        (TsubameError::Internal("oops".into()), "Internal error: oops"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn test_total_failure_maps_to_network_category() {
    let err: TsubameError =
        StrategyError::Network(FetchError::Network("connection refused".into())).into();
    assert!(matches!(err, TsubameError::Network(_)));
    assert_eq!(err.status_code(), 504);

    let err: TsubameError = StrategyError::CacheMiss("https://app.example.com/".into()).into();
    assert_eq!(err.status_code(), 504);
}

#[test]
fn test_not_offline_ready_lists_missing_assets() {
    let err = LifecycleError::NotOfflineReady(vec!["/".into(), "/offline".into()]);
    assert_eq!(
        err.to_string(),
        "critical assets could not be precached: /, /offline"
    );

    let err: TsubameError = err.into();
    assert!(matches!(err, TsubameError::Internal(_)));
}

#[test]
fn test_errors_are_std_errors() {
    fn assert_error<E: std::error::Error + Send + Sync + 'static>() {}
    assert_error::<TsubameError>();
    assert_error::<CacheError>();
    assert_error::<FetchError>();
    assert_error::<StrategyError>();
    assert_error::<LifecycleError>();
}
