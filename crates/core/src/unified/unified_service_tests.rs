//! Tests for the unification merger.

#[cfg(test)]
mod tests {
    use crate::ema::{EmaRow, EmaStore, WindowWrite};
    use crate::memory::InMemoryStore;
    use crate::refresh_state::RefreshKey;
    use crate::timeframes::AlignmentType;
    use crate::unified::{UnificationMerger, UnifiedEmaRow, UnifiedEmaStore};
    use crate::utils::time_utils::date_to_utc;
    use chrono::{Duration, NaiveDate, Utc};
    use std::sync::Arc;

    fn d(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 7).unwrap() + Duration::days(offset)
    }

    fn row(key: &RefreshKey, offset: i64, ema: f64) -> EmaRow {
        let date = d(offset);
        EmaRow {
            asset_id: key.asset_id.clone(),
            timestamp: date_to_utc(date),
            timeframe_code: key.timeframe_code.clone(),
            period: key.period,
            alignment_source: key.alignment_source,
            ema_value: ema,
            derivative_1: None,
            derivative_2: None,
            close_value: ema,
            is_canonical_close: true,
            window_start: Some(date - Duration::days(6)),
            realized_days: Some(7),
            is_partial_start: false,
            is_partial_end: false,
            write_seq: 0,
            computed_at: Utc::now(),
        }
    }

    async fn write(store: &InMemoryStore, key: &RefreshKey, rows: Vec<EmaRow>) {
        store
            .replace_windows(vec![WindowWrite {
                key: key.clone(),
                from: rows[0].timestamp,
                rows,
            }])
            .await
            .unwrap();
    }

    fn merger(store: &InMemoryStore) -> UnificationMerger {
        let store = Arc::new(store.clone());
        UnificationMerger::new(store.clone(), store)
    }

    #[test]
    fn test_source_columns_are_mapped_per_alignment_type() {
        let rolling = RefreshKey::new("BTC", "7D", 10, AlignmentType::Rolling);
        let calendar = RefreshKey::new("BTC", "1W_CAL_US", 10, AlignmentType::Calendar);
        let anchored =
            RefreshKey::new("BTC", "1W_CAL_ANCHOR_US", 10, AlignmentType::CalendarAnchored);
        let now = Utc::now();

        let r = UnifiedEmaRow::from_source(&row(&rolling, 0, 1.0), now);
        assert_eq!(r.roll_window_days, Some(7));
        assert_eq!(r.calendar_window_start, None);
        assert_eq!(r.realized_days, None);
        assert_eq!(r.is_partial_start, None);

        let c = UnifiedEmaRow::from_source(&row(&calendar, 0, 1.0), now);
        assert_eq!(c.roll_window_days, None);
        assert_eq!(c.calendar_window_start, Some(d(-6)));
        assert_eq!(c.realized_days, Some(7));
        assert_eq!(c.is_partial_end, None);

        let a = UnifiedEmaRow::from_source(&row(&anchored, 0, 1.0), now);
        assert_eq!(a.calendar_window_start, Some(d(-6)));
        assert_eq!(a.is_partial_start, Some(false));
        assert_eq!(a.is_partial_end, Some(false));
    }

    #[tokio::test]
    async fn test_sync_is_incremental_and_idempotent() {
        let store = InMemoryStore::new();
        let key = RefreshKey::new("BTC", "7D", 10, AlignmentType::Rolling);
        write(&store, &key, (0..5).map(|i| row(&key, i * 7, i as f64)).collect()).await;

        let merger = merger(&store).with_batch_size(2);
        assert_eq!(merger.sync(AlignmentType::Rolling).await.unwrap(), 5);
        assert_eq!(merger.sync(AlignmentType::Rolling).await.unwrap(), 0);

        let watermark = store
            .get_merge_watermark(AlignmentType::Rolling)
            .unwrap()
            .unwrap();
        assert_eq!(watermark.last_write_seq, 5);
        assert_eq!(watermark.rows_merged, 5);

        // Rewriting the tail re-offers rows that already exist; only the new one lands.
        write(&store, &key, (3..6).map(|i| row(&key, i * 7, 99.0)).collect()).await;
        assert_eq!(merger.sync(AlignmentType::Rolling).await.unwrap(), 1);
        let unified = UnifiedEmaStore::get_rows(&store, "BTC", None).unwrap();
        assert_eq!(unified.len(), 6);
        // Insert-only: the earlier values survive.
        assert_eq!(unified[3].ema_value, 3.0);
        assert_eq!(unified[5].ema_value, 99.0);
    }

    #[tokio::test]
    async fn test_provisional_rows_are_not_merged() {
        let store = InMemoryStore::new();
        let key = RefreshKey::new("BTC", "1W_CAL_ANCHOR_US", 10, AlignmentType::CalendarAnchored);
        let mut rows: Vec<EmaRow> = (0..3).map(|i| row(&key, i * 7, 1.0)).collect();
        rows[2].is_partial_end = true;
        write(&store, &key, rows).await;

        let merged = merger(&store).sync(AlignmentType::CalendarAnchored).await.unwrap();
        assert_eq!(merged, 2);
        // The watermark still passes the skipped row.
        let watermark = store
            .get_merge_watermark(AlignmentType::CalendarAnchored)
            .unwrap()
            .unwrap();
        assert_eq!(watermark.last_write_seq, 3);
    }

    #[tokio::test]
    async fn test_sources_share_keys_without_conflict() {
        let store = InMemoryStore::new();
        let rolling = RefreshKey::new("BTC", "7D", 10, AlignmentType::Rolling);
        let calendar = RefreshKey::new("BTC", "7D", 10, AlignmentType::Calendar);
        write(&store, &rolling, vec![row(&rolling, 0, 1.0)]).await;
        write(&store, &calendar, vec![row(&calendar, 0, 2.0)]).await;

        let merged = merger(&store).sync_all().await.unwrap();
        assert_eq!(merged.get(&AlignmentType::Rolling), Some(&1));
        assert_eq!(merged.get(&AlignmentType::Calendar), Some(&1));
        assert_eq!(merged.get(&AlignmentType::CalendarAnchored), Some(&0));
        assert_eq!(UnifiedEmaStore::get_rows(&store, "BTC", None).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reconcile_replaces_stale_rows() {
        let store = InMemoryStore::new();
        let key = RefreshKey::new("BTC", "7D", 10, AlignmentType::Rolling);
        write(&store, &key, (0..4).map(|i| row(&key, i * 7, 1.0)).collect()).await;
        let merger = merger(&store);
        merger.sync(AlignmentType::Rolling).await.unwrap();

        write(&store, &key, (2..4).map(|i| row(&key, i * 7, 2.0)).collect()).await;
        let from = date_to_utc(d(14));
        let inserted = merger
            .reconcile(AlignmentType::Rolling, "BTC", from)
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let values: Vec<f64> =
            UnifiedEmaStore::get_rows(&store, "BTC", Some(AlignmentType::Rolling))
                .unwrap()
            .iter()
            .map(|r| r.ema_value)
            .collect();
        assert_eq!(values, vec![1.0, 1.0, 2.0, 2.0]);
    }
}
