//! Tests for row-count validation and the run alert.

#[cfg(test)]
mod tests {
    use crate::alerts::{FailedAsset, MockAlertSink, Severity};
    use crate::bars::{BarStore, PriceBar};
    use crate::memory::InMemoryStore;
    use crate::timeframes::{AlignmentType, TimeframeService, TimeframeServiceTrait};
    use crate::unified::UnifiedEmaRow;
    use crate::utils::time_utils::date_to_utc;
    use crate::validation::{ValidationAuditStore, ValidationService, ValidationStatus};
    use chrono::{Duration, NaiveDate, Utc};
    use std::sync::Arc;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn unified(offset: i64) -> UnifiedEmaRow {
        UnifiedEmaRow {
            asset_id: "BTC".to_string(),
            timestamp: date_to_utc(start() + Duration::days(offset)),
            timeframe_code: "7D".to_string(),
            period: 10,
            alignment_source: AlignmentType::Rolling,
            ema_value: 1.0,
            derivative_1: None,
            derivative_2: None,
            close_value: 1.0,
            is_canonical_close: true,
            roll_window_days: Some(7),
            calendar_window_start: None,
            realized_days: None,
            is_partial_start: None,
            is_partial_end: None,
            source_write_seq: offset,
            merged_at: Utc::now(),
        }
    }

    /// 100 daily bars and the 14 canonical 7D rows they should produce.
    async fn fixture() -> InMemoryStore {
        let store = InMemoryStore::new();
        let bars: Vec<PriceBar> = (0..100)
            .map(|i| PriceBar {
                asset_id: "BTC".to_string(),
                timestamp: date_to_utc(start() + Duration::days(i)),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 0.0,
                updated_at: Utc::now(),
            })
            .collect();
        store.upsert_bars(bars).await.unwrap();
        for k in 0..14 {
            store.put_unified_row(unified(6 + 7 * k)).unwrap();
        }
        store
    }

    async fn service(store: &InMemoryStore, sink: Arc<MockAlertSink>) -> ValidationService {
        let shared = Arc::new(store.clone());
        let timeframes = Arc::new(TimeframeService::new(shared.clone()));
        timeframes.seed_defaults().await.unwrap();
        ValidationService::new(shared.clone(), shared.clone(), timeframes, sink)
            .with_audit_store(shared)
    }

    #[tokio::test]
    async fn test_status_follows_row_count() {
        let store = fixture().await;
        let svc = service(&store, Arc::new(MockAlertSink::new())).await;

        let report = svc.validate("run-1", &[]).unwrap();
        assert_eq!(report.results.len(), 1);
        let result = &report.results[0];
        assert_eq!(result.expected_count, 14);
        assert_eq!(result.actual_count, 14);
        assert_eq!(result.status, ValidationStatus::Ok);
        assert!(report.is_clean());

        assert!(store.remove_unified_row(&unified(6 + 7 * 5)).unwrap());
        let report = svc.validate("run-2", &[]).unwrap();
        assert_eq!(report.results[0].status, ValidationStatus::Gap);
        assert_eq!(report.results[0].actual_count, 13);

        store.put_unified_row(unified(6 + 7 * 5)).unwrap();
        // A second close one day off the grid.
        store.put_unified_row(unified(7 + 7 * 5)).unwrap();
        let report = svc.validate("run-3", &[]).unwrap();
        assert_eq!(report.results[0].status, ValidationStatus::Duplicate);
        assert_eq!(report.mismatches().count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_timeframe_is_skipped() {
        let store = fixture().await;
        let mut odd = unified(6);
        odd.timeframe_code = "UNKNOWN".to_string();
        store.put_unified_row(odd).unwrap();

        let svc = service(&store, Arc::new(MockAlertSink::new())).await;
        let report = svc.validate("run-1", &["BTC".to_string()]).unwrap();
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].timeframe_code, "7D");
    }

    #[tokio::test]
    async fn test_results_are_audited() {
        let store = fixture().await;
        let svc = service(&store, Arc::new(MockAlertSink::new())).await;

        let report = svc
            .validate_and_alert("run-7", &[], &[], true, false)
            .await
            .unwrap();
        let audited = store.list_results("run-7").unwrap();
        assert_eq!(audited, report.results);
        assert!(store.list_results("other").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clean_run_sends_no_alert() {
        let store = fixture().await;
        let sink = Arc::new(MockAlertSink::new());
        let svc = service(&store, sink.clone()).await;

        svc.validate_and_alert("run-1", &[], &[], true, true).await;
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_mismatch_and_failure_raise_one_alert() {
        let store = fixture().await;
        store.remove_unified_row(&unified(6)).unwrap();
        let sink = Arc::new(MockAlertSink::new());
        let svc = service(&store, sink.clone()).await;

        let failures = vec![FailedAsset {
            asset_id: "ETH".to_string(),
            error_kind: "data_quality".to_string(),
            error: "close must be positive".to_string(),
        }];
        svc.validate_and_alert("run-9", &[], &failures, true, true).await;

        let alerts = sink.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Error);
        assert!(alerts[0].message.contains("run-9"));
        assert!(alerts[0].message.contains("GAP BTC"));
        assert!(alerts[0].message.contains("ETH"));
    }

    #[tokio::test]
    async fn test_alert_delivery_failure_is_swallowed() {
        let store = fixture().await;
        store.remove_unified_row(&unified(6)).unwrap();
        let sink = Arc::new(MockAlertSink::failing());
        let svc = service(&store, sink.clone()).await;

        let report = svc.validate_and_alert("run-1", &[], &[], true, true).await;
        assert_eq!(report.unwrap().count(ValidationStatus::Gap), 1);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_validation_can_be_disabled() {
        let store = fixture().await;
        let sink = Arc::new(MockAlertSink::new());
        let svc = service(&store, sink.clone()).await;

        let report = svc.validate_and_alert("run-1", &[], &[], false, true).await;
        assert!(report.is_none());
        assert!(sink.is_empty());
        assert!(store.list_results("run-1").unwrap().is_empty());
    }
}
