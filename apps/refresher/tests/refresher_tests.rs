use chrono::{Duration, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use tempfile::tempdir;

use emaflow_core::bars::{AssetProfile, BarStore, PriceBar};
use emaflow_core::timeframes::{AlignmentType, TimeframeServiceTrait};
use emaflow_refresher::{build_alert_sink, build_state, config::Config, scheduler, AppState};

fn config(db_path: &str, extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = extra
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    vars.insert("EMAFLOW_DB_PATH".to_string(), db_path.to_string());
    Config::from_lookup(|name| vars.get(name).cloned()).unwrap()
}

async fn seed_bars(state: &AppState, count: i64) {
    seed_asset(state, "BTC", count).await;
}

async fn seed_asset(state: &AppState, asset_id: &str, count: i64) {
    state
        .bar_repository
        .upsert_asset_profile(AssetProfile {
            asset_id: asset_id.to_string(),
            asset_class: "crypto".to_string(),
            region: "GLOBAL".to_string(),
            venue: "ANY".to_string(),
            asset_key_type: "symbol".to_string(),
            asset_key: asset_id.to_string(),
        })
        .await
        .unwrap();

    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let bars = (0..count)
        .map(|i| PriceBar {
            asset_id: asset_id.to_string(),
            timestamp: Utc.from_utc_datetime(
                &(start + Duration::days(i)).and_hms_opt(0, 0, 0).unwrap(),
            ),
            open: 100.0,
            high: 100.0 + i as f64,
            low: 99.0,
            close: 100.0 + i as f64,
            volume: 1.0,
            updated_at: Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap(),
        })
        .collect();
    state.bar_repository.upsert_bars(bars).await.unwrap();
}

#[tokio::test]
async fn build_state_seeds_reference_data_once() {
    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("nested").join("emaflow.db");
    let config = config(db_path.to_str().unwrap(), &[]);

    let state = build_state(&config).await.unwrap();
    let canonical = state.timeframe_service.list_timeframes(None, true).unwrap();
    assert!(canonical.iter().any(|t| t.code == "7D"));
    assert!(db_path.exists());

    // Reopening the same file keeps the registry as it was.
    let again = build_state(&config).await.unwrap();
    assert_eq!(
        again.timeframe_service.list_timeframes(None, false).unwrap().len(),
        state.timeframe_service.list_timeframes(None, false).unwrap().len()
    );
}

#[tokio::test]
async fn one_shot_run_refreshes_and_is_idempotent() {
    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("emaflow.db");
    let config = config(
        db_path.to_str().unwrap(),
        &[("EMAFLOW_TIMEFRAMES", "7D"), ("EMAFLOW_PERIODS", "10")],
    );
    let state = build_state(&config).await.unwrap();
    seed_bars(&state, 100).await;
    let request = config.refresh_request();

    let first = scheduler::run_once(&state, &request).await.unwrap();
    assert!(first.is_success());
    assert_eq!(first.succeeded, 1);
    assert_eq!(first.canonical_rows_written, 14);
    assert_eq!(first.rows_merged.get(&AlignmentType::Rolling), Some(&94));
    assert!(first.validation.as_ref().unwrap().is_clean());

    let second = scheduler::run_once(&state, &request).await.unwrap();
    assert!(second.is_success());
    assert_eq!(second.total_merged(), 0);

    seed_bars(&state, 110).await;
    let third = scheduler::run_once(&state, &request).await.unwrap();
    assert_eq!(third.canonical_rows_written, 4);
    assert!(third.validation.unwrap().is_clean());
}

#[tokio::test]
async fn failed_asset_is_reported_without_aborting_the_run() {
    let tmp = tempdir().unwrap();
    let config = config(
        tmp.path().join("emaflow.db").to_str().unwrap(),
        &[("EMAFLOW_TIMEFRAMES", "7D"), ("EMAFLOW_PERIODS", "10")],
    );
    let state = build_state(&config).await.unwrap();
    seed_bars(&state, 60).await;
    seed_asset(&state, "ETH", 60).await;

    let mut bad = state
        .bar_repository
        .get_bars("ETH", None)
        .unwrap()
        .remove(30);
    bad.close = -5.0;
    state.bar_repository.upsert_bars(vec![bad]).await.unwrap();

    let summary = scheduler::run_once(&state, &config.refresh_request())
        .await
        .unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);

    let failures = summary.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].asset_id, "ETH");
    assert_eq!(failures[0].error_kind, "data_quality");
}

#[tokio::test]
async fn unknown_timeframe_aborts_the_run() {
    let tmp = tempdir().unwrap();
    let config = config(
        tmp.path().join("emaflow.db").to_str().unwrap(),
        &[("EMAFLOW_TIMEFRAMES", "9X")],
    );
    let state = build_state(&config).await.unwrap();
    seed_bars(&state, 10).await;

    let err = scheduler::run_once(&state, &config.refresh_request())
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.kind(), "configuration");
}

#[tokio::test]
async fn reconcile_is_available_after_a_run() {
    let tmp = tempdir().unwrap();
    let config = config(
        tmp.path().join("emaflow.db").to_str().unwrap(),
        &[("EMAFLOW_TIMEFRAMES", "7D"), ("EMAFLOW_PERIODS", "10")],
    );
    let state = build_state(&config).await.unwrap();
    seed_bars(&state, 100).await;
    scheduler::run_once(&state, &config.refresh_request())
        .await
        .unwrap();

    let from = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let inserted = state
        .merger
        .reconcile(AlignmentType::Rolling, "BTC", from)
        .await
        .unwrap();
    // March 1 through April 9: 40 daily rows.
    assert_eq!(inserted, 40);
}

#[test]
fn alert_sink_follows_webhook_setting() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("emaflow.db");
    let path = path.to_str().unwrap();

    assert!(build_alert_sink(&config(path, &[])).is_ok());
    assert!(build_alert_sink(&config(
        path,
        &[("EMAFLOW_ALERT_WEBHOOK_URL", "http://127.0.0.1:9/hook")]
    ))
    .is_ok());
}
