//! Repository and end-to-end tests against a real SQLite file.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use emaflow_core::alerts::MockAlertSink;
use emaflow_core::bars::{AssetProfile, BarStore, PriceBar};
use emaflow_core::ema::{EmaRefreshService, EmaRow, EmaStore, ProducerConfig, WindowWrite};
use emaflow_core::pipeline::{RefreshPipeline, RefreshRequest};
use emaflow_core::refresh_state::{RefreshKey, RefreshStateStore, RefreshStateTracker};
use emaflow_core::sessions::{
    default_sessions, SessionRepositoryTrait, SessionService, SessionServiceTrait,
};
use emaflow_core::timeframes::{
    default_timeframes, AlignmentType, TimeframeRepositoryTrait, TimeframeService,
    TimeframeServiceTrait,
};
use emaflow_core::unified::{UnificationMerger, UnifiedEmaRow, UnifiedEmaStore};
use emaflow_core::validation::{ValidationAuditStore, ValidationService};
use emaflow_storage_sqlite::{
    open, BarRepository, DbPool, EmaRepository, RefreshStateRepository, SessionRepository,
    TimeframeRepository, UnifiedEmaRepository, ValidationAuditRepository, WriteHandle,
};
use std::sync::Arc;
use tempfile::TempDir;

fn setup() -> (TempDir, Arc<DbPool>, WriteHandle) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("emaflow.db");
    let (pool, writer) = open(path.to_str().unwrap()).unwrap();
    (dir, pool, writer)
}

fn day(offset: i64) -> DateTime<Utc> {
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset);
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
}

fn bars(asset_id: &str, offsets: std::ops::Range<i64>) -> Vec<PriceBar> {
    offsets
        .map(|i| PriceBar {
            asset_id: asset_id.to_string(),
            timestamp: day(i),
            open: 100.0 + i as f64,
            high: 101.0 + i as f64,
            low: 99.0 + i as f64,
            close: 100.0 + i as f64,
            volume: 10.0,
            updated_at: Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap(),
        })
        .collect()
}

fn ema_row(key: &RefreshKey, offset: i64, value: f64, provisional: bool) -> EmaRow {
    EmaRow {
        asset_id: key.asset_id.clone(),
        timestamp: day(offset),
        timeframe_code: key.timeframe_code.clone(),
        period: key.period,
        alignment_source: key.alignment_source,
        ema_value: value,
        derivative_1: Some(0.5),
        derivative_2: None,
        close_value: value,
        is_canonical_close: true,
        window_start: Some(day(offset - 6).date_naive()),
        realized_days: Some(7),
        is_partial_start: false,
        is_partial_end: provisional,
        write_seq: 0,
        computed_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_reference_data_seeding_is_idempotent() {
    let (_dir, pool, writer) = setup();
    let timeframes = TimeframeRepository::new(pool.clone(), writer.clone());
    let sessions = SessionRepository::new(pool, writer);

    let inserted = timeframes.seed(default_timeframes()).await.unwrap();
    assert_eq!(inserted, default_timeframes().len());
    assert_eq!(timeframes.seed(default_timeframes()).await.unwrap(), 0);

    let stored = timeframes.get_by_code("1M_CAL_ANCHOR_US").unwrap().unwrap();
    let expected = default_timeframes()
        .into_iter()
        .find(|t| t.code == "1M_CAL_ANCHOR_US")
        .unwrap();
    assert_eq!(stored, expected);

    sessions.seed(default_sessions()).await.unwrap();
    assert_eq!(sessions.list().unwrap().len(), default_sessions().len());
    assert_eq!(sessions.seed(default_sessions()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_timeframe_insert_is_a_unique_violation() {
    let (_dir, pool, writer) = setup();
    let timeframes = TimeframeRepository::new(pool, writer);
    let def = default_timeframes().remove(0);
    timeframes.insert(def.clone()).await.unwrap();
    let err = timeframes.insert(def).await.unwrap_err();
    assert_eq!(err.kind(), "persistence");
}

#[tokio::test]
async fn test_bar_queries() {
    let (_dir, pool, writer) = setup();
    let repo = BarRepository::new(pool, writer);
    assert!(repo.get_bar_bounds("BTC").unwrap().is_none());

    repo.upsert_bars(bars("BTC", 0..30)).await.unwrap();
    let bounds = repo.get_bar_bounds("BTC").unwrap().unwrap();
    assert_eq!(bounds.first, day(0));
    assert_eq!(bounds.last, day(29));
    assert_eq!(bounds.count, 30);

    assert_eq!(repo.get_bars("BTC", Some(day(25))).unwrap().len(), 5);
    assert_eq!(repo.count_bars_before("BTC", day(10)).unwrap(), 10);

    let since = Utc::now();
    let mut corrected = bars("BTC", 12..13);
    corrected[0].close = 1.0;
    corrected[0].low = 1.0;
    corrected[0].updated_at = since + Duration::seconds(1);
    repo.upsert_bars(corrected).await.unwrap();
    assert_eq!(repo.earliest_revised_since("BTC", since).unwrap(), Some(day(12)));
    assert_eq!(repo.get_bar_bounds("BTC").unwrap().unwrap().count, 30);

    repo.upsert_asset_profile(AssetProfile {
        asset_id: "BTC".to_string(),
        asset_class: "crypto".to_string(),
        region: "GLOBAL".to_string(),
        venue: "ANY".to_string(),
        asset_key_type: "symbol".to_string(),
        asset_key: "BTC".to_string(),
    })
    .await
    .unwrap();
    assert_eq!(repo.list_asset_ids().unwrap(), vec!["BTC".to_string()]);
}

#[tokio::test]
async fn test_refresh_state_is_monotonic() {
    let (_dir, pool, writer) = setup();
    let repo = RefreshStateRepository::new(pool, writer);
    let key = RefreshKey::new("BTC", "7D", 10, AlignmentType::Rolling);

    assert!(repo.save_state(&key, day(20), 21, day(30)).await.unwrap());
    assert!(!repo.save_state(&key, day(10), 11, day(31)).await.unwrap());
    let state = repo.get_state(&key).unwrap().unwrap();
    assert_eq!(state.last_contiguous_timestamp, day(20));
    assert_eq!(state.last_bar_sequence, 21);
    assert_eq!(state.updated_at, day(31));

    assert!(repo.request_recompute(&key, day(8)).await.unwrap());
    assert!(repo.request_recompute(&key, day(12)).await.unwrap());
    assert_eq!(repo.get_state(&key).unwrap().unwrap().recompute_from, Some(day(8)));
    repo.clear_override(&key).await.unwrap();
    assert_eq!(repo.get_state(&key).unwrap().unwrap().recompute_from, None);

    let loaded = repo
        .load_state(&["BTC".to_string()], &["7D".to_string()], &[10, 20], AlignmentType::Rolling)
        .unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(repo
        .load_state(&["BTC".to_string()], &["7D".to_string()], &[10], AlignmentType::Calendar)
        .unwrap()
        .is_empty());

    let other = RefreshKey::new("ETH", "7D", 10, AlignmentType::Rolling);
    assert!(!repo.request_recompute(&other, day(1)).await.unwrap());
    assert!(repo.reset_state(&key).await.unwrap());
    assert!(repo.get_state(&key).unwrap().is_none());
}

#[tokio::test]
async fn test_ema_tables_replace_windows_per_source() {
    let (_dir, pool, writer) = setup();
    let repo = EmaRepository::new(pool, writer);
    let rolling = RefreshKey::new("BTC", "7D", 10, AlignmentType::Rolling);
    let anchored = RefreshKey::new("BTC", "1M_CAL_ANCHOR_US", 10, AlignmentType::CalendarAnchored);

    let written = repo
        .replace_windows(vec![
            WindowWrite {
                key: rolling.clone(),
                from: day(6),
                rows: (0..4).map(|k| ema_row(&rolling, 6 + 7 * k, 1.0, false)).collect(),
            },
            WindowWrite {
                key: anchored.clone(),
                from: day(30),
                rows: vec![ema_row(&anchored, 30, 1.0, false), ema_row(&anchored, 59, 2.0, true)],
            },
        ])
        .await
        .unwrap();
    assert_eq!(written, 6);

    // Rewrite the tail of the rolling series only.
    repo.replace_windows(vec![WindowWrite {
        key: rolling.clone(),
        from: day(20),
        rows: vec![ema_row(&rolling, 20, 5.0, false), ema_row(&rolling, 27, 6.0, false)],
    }])
    .await
    .unwrap();

    let rows = repo.get_rows(&rolling, None).unwrap();
    let values: Vec<f64> = rows.iter().map(|r| r.ema_value).collect();
    assert_eq!(values, vec![1.0, 1.0, 5.0, 6.0]);
    assert_eq!(rows[0].window_start, Some(day(0).date_naive()));
    assert_eq!(rows[0].derivative_1, Some(0.5));

    let after: Vec<i64> = repo
        .rows_written_after(AlignmentType::Rolling, 0, 10)
        .unwrap()
        .iter()
        .map(|r| r.write_seq)
        .collect();
    assert!(after.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(after.len(), 4);
    assert_eq!(repo.rows_written_after(AlignmentType::Rolling, 0, 1).unwrap().len(), 1);

    // The provisional row is never a seed.
    let seed = repo.latest_canonical_before(&anchored, day(100)).unwrap().unwrap();
    assert_eq!(seed.timestamp, day(30));
    assert!(repo.latest_canonical_before(&rolling, day(6)).unwrap().is_none());

    let anchored_rows = repo
        .get_asset_rows(AlignmentType::CalendarAnchored, "BTC", day(0))
        .unwrap();
    assert_eq!(anchored_rows.len(), 2);
    assert_eq!(repo.delete_series(&anchored).await.unwrap(), 2);
    assert!(repo.get_rows(&anchored, None).unwrap().is_empty());
}

#[tokio::test]
async fn test_unified_merge_ignores_conflicts_and_keeps_watermark() {
    let (_dir, pool, writer) = setup();
    let repo = UnifiedEmaRepository::new(pool, writer);
    let key = RefreshKey::new("BTC", "7D", 10, AlignmentType::Rolling);
    let rows: Vec<UnifiedEmaRow> = (0..3)
        .map(|k| {
            let mut row = ema_row(&key, 6 + 7 * k, 1.0, false);
            row.write_seq = k + 1;
            UnifiedEmaRow::from_source(&row, Utc::now())
        })
        .collect();

    assert_eq!(repo.merge_batch(AlignmentType::Rolling, rows.clone(), 3).await.unwrap(), 3);
    assert_eq!(repo.merge_batch(AlignmentType::Rolling, rows, 2).await.unwrap(), 0);
    let watermark = repo.get_merge_watermark(AlignmentType::Rolling).unwrap().unwrap();
    assert_eq!(watermark.last_write_seq, 3);
    assert_eq!(watermark.rows_merged, 3);
    assert!(repo.get_merge_watermark(AlignmentType::Calendar).unwrap().is_none());

    let stored = repo.get_rows("BTC", Some(AlignmentType::Rolling)).unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[0].roll_window_days, Some(7));
    assert_eq!(stored[0].calendar_window_start, None);

    let counts = repo.count_canonical("BTC", day(10), day(30)).unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].count, 2);
    assert_eq!(repo.list_asset_ids().unwrap(), vec!["BTC".to_string()]);

    let (deleted, inserted) = repo
        .replace_asset_rows(AlignmentType::Rolling, "BTC", day(13), vec![])
        .await
        .unwrap();
    assert_eq!((deleted, inserted), (2, 0));
}

#[tokio::test]
async fn test_pipeline_on_sqlite() {
    let (_dir, pool, writer) = setup();
    let timeframe_repo = Arc::new(TimeframeRepository::new(pool.clone(), writer.clone()));
    let session_repo = Arc::new(SessionRepository::new(pool.clone(), writer.clone()));
    let bar_repo = Arc::new(BarRepository::new(pool.clone(), writer.clone()));
    let ema_repo = Arc::new(EmaRepository::new(pool.clone(), writer.clone()));
    let state_repo = Arc::new(RefreshStateRepository::new(pool.clone(), writer.clone()));
    let unified_repo = Arc::new(UnifiedEmaRepository::new(pool.clone(), writer.clone()));
    let audit_repo = Arc::new(ValidationAuditRepository::new(pool, writer));

    let timeframes = Arc::new(TimeframeService::new(timeframe_repo));
    timeframes.seed_defaults().await.unwrap();
    let sessions = Arc::new(SessionService::new(session_repo));
    sessions.seed_defaults().await.unwrap();

    let sink = Arc::new(MockAlertSink::new());
    let refresh = Arc::new(EmaRefreshService::new(
        bar_repo.clone(),
        ema_repo.clone(),
        Arc::new(RefreshStateTracker::new(state_repo)),
        ProducerConfig::default(),
    ));
    let merger = Arc::new(UnificationMerger::new(ema_repo, unified_repo.clone()));
    let validation = Arc::new(
        ValidationService::new(
            bar_repo.clone(),
            unified_repo.clone(),
            timeframes.clone(),
            sink.clone(),
        )
        .with_audit_store(audit_repo.clone()),
    );
    let pipeline =
        RefreshPipeline::new(timeframes, sessions, bar_repo.clone(), refresh, merger, validation);

    bar_repo
        .upsert_asset_profile(AssetProfile {
            asset_id: "BTC".to_string(),
            asset_class: "crypto".to_string(),
            region: "GLOBAL".to_string(),
            venue: "ANY".to_string(),
            asset_key_type: "symbol".to_string(),
            asset_key: "BTC".to_string(),
        })
        .await
        .unwrap();
    bar_repo.upsert_bars(bars("BTC", 0..100)).await.unwrap();

    let request = RefreshRequest {
        timeframe_codes: vec!["7D".to_string(), "1M_CAL_ANCHOR_US".to_string()],
        periods: vec![10],
        ..RefreshRequest::default()
    };
    let first = pipeline.run(&request).await.unwrap();
    assert!(first.is_success());
    assert_eq!(first.canonical_rows_written, 14 + 4);

    let canonical = |source| {
        unified_repo
            .get_rows("BTC", Some(source))
            .unwrap()
            .iter()
            .filter(|r| r.is_canonical_close)
            .count()
    };
    assert_eq!(canonical(AlignmentType::Rolling), 14);
    // The open April period stays out of the unified table.
    assert_eq!(canonical(AlignmentType::CalendarAnchored), 3);

    bar_repo.upsert_bars(bars("BTC", 100..110)).await.unwrap();
    let second = pipeline.run(&request).await.unwrap();
    assert!(second.is_success());
    assert_eq!(canonical(AlignmentType::Rolling), 15);

    let audited = audit_repo.list_results(&second.run_id).unwrap();
    assert_eq!(audited, second.validation.unwrap().results);
}
