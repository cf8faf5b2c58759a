use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

use super::refresh_state_model::{DirtyReason, DirtyWindow, RefreshKey, RefreshState};
use super::refresh_state_traits::RefreshStateStore;
use crate::errors::Result;
use crate::timeframes::{AlignmentType, TimeframeDefinition};

/// Start of the recompute range for one key.
///
/// `max(last_contiguous_timestamp - lookback, earliest_source_timestamp)`, or
/// the earliest source timestamp when the key was never refreshed.
pub fn compute_dirty_window(
    state: Option<&RefreshState>,
    lookback: Duration,
    earliest_source_timestamp: DateTime<Utc>,
) -> DirtyWindow {
    match state {
        None => DirtyWindow {
            start: earliest_source_timestamp,
            reason: DirtyReason::Full,
        },
        Some(state) => {
            let start = (state.last_contiguous_timestamp - lookback).max(earliest_source_timestamp);
            let reason = if start == earliest_source_timestamp {
                DirtyReason::Full
            } else {
                DirtyReason::Incremental
            };
            DirtyWindow { start, reason }
        }
    }
}

/// Watermark bookkeeping shared by every producer.
pub struct RefreshStateTracker {
    store: Arc<dyn RefreshStateStore>,
    lookback_days_override: Option<i64>,
}

impl RefreshStateTracker {
    pub fn new(store: Arc<dyn RefreshStateStore>) -> Self {
        Self {
            store,
            lookback_days_override: None,
        }
    }

    /// Replaces the per-timeframe default lookback with a fixed number of days.
    pub fn with_lookback_days(mut self, days: Option<i64>) -> Self {
        self.lookback_days_override = days.filter(|d| *d > 0);
        self
    }

    pub fn lookback_for(&self, timeframe: &TimeframeDefinition) -> Duration {
        Duration::days(
            self.lookback_days_override
                .unwrap_or_else(|| timeframe.default_lookback_days()),
        )
    }

    pub fn load_state(
        &self,
        asset_ids: &[String],
        timeframe_codes: &[String],
        periods: &[u32],
        alignment_source: AlignmentType,
    ) -> Result<HashMap<RefreshKey, RefreshState>> {
        self.store
            .load_state(asset_ids, timeframe_codes, periods, alignment_source)
    }

    /// Dirty window including pending overrides and revised source bars.
    pub fn plan_window(
        &self,
        state: Option<&RefreshState>,
        timeframe: &TimeframeDefinition,
        earliest_source_timestamp: DateTime<Utc>,
        revised_timestamp: Option<DateTime<Utc>>,
    ) -> DirtyWindow {
        let lookback = self.lookback_for(timeframe);
        let mut window = compute_dirty_window(state, lookback, earliest_source_timestamp);
        if window.is_full() {
            return window;
        }

        if let Some(from) = state.and_then(|s| s.recompute_from) {
            let start = from.max(earliest_source_timestamp);
            if start < window.start {
                window = DirtyWindow {
                    start,
                    reason: DirtyReason::Override,
                };
            }
        }

        if let Some(revised) = revised_timestamp {
            let start = (revised - lookback).max(earliest_source_timestamp);
            if start < window.start {
                window = DirtyWindow {
                    start,
                    reason: DirtyReason::Revision,
                };
            }
        }

        window
    }

    pub async fn save_state(
        &self,
        key: &RefreshKey,
        watermark: DateTime<Utc>,
        bar_sequence: i64,
        refreshed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let advanced = self
            .store
            .save_state(key, watermark, bar_sequence, refreshed_at)
            .await?;
        if advanced {
            debug!("Watermark for {} advanced to {}", key, watermark);
        }
        Ok(advanced)
    }

    /// Manual override for backfills: the next run recomputes `key` from `from`.
    pub async fn request_recompute(&self, key: &RefreshKey, from: DateTime<Utc>) -> Result<bool> {
        let applied = self.store.request_recompute(key, from).await?;
        if applied {
            info!("Recompute of {} requested from {}", key, from);
        } else {
            debug!("Recompute request for {} ignored, key was never refreshed", key);
        }
        Ok(applied)
    }

    pub async fn clear_override(&self, key: &RefreshKey) -> Result<()> {
        self.store.clear_override(key).await
    }

    pub async fn reset_state(&self, key: &RefreshKey) -> Result<bool> {
        let removed = self.store.reset_state(key).await?;
        if removed {
            info!("Refresh state for {} reset", key);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::timeframes::default_timeframes;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn seven_day() -> TimeframeDefinition {
        default_timeframes()
            .into_iter()
            .find(|tf| tf.code == "7D")
            .unwrap()
    }

    fn state(watermark: DateTime<Utc>) -> RefreshState {
        RefreshState {
            key: RefreshKey::new("BTC", "7D", 10, AlignmentType::Rolling),
            last_contiguous_timestamp: watermark,
            last_bar_sequence: 90,
            recompute_from: None,
            updated_at: watermark,
        }
    }

    #[test]
    fn test_dirty_window_without_state_is_full_history() {
        let earliest = ts(2024, 1, 1);
        let window = compute_dirty_window(None, Duration::days(14), earliest);
        assert_eq!(window.start, earliest);
        assert!(window.is_full());
    }

    #[test]
    fn test_dirty_window_subtracts_lookback() {
        let s = state(ts(2024, 4, 1));
        let window = compute_dirty_window(Some(&s), Duration::days(14), ts(2024, 1, 1));
        assert_eq!(window.start, ts(2024, 3, 18));
        assert_eq!(window.reason, DirtyReason::Incremental);
    }

    #[test]
    fn test_dirty_window_never_precedes_history() {
        let s = state(ts(2024, 1, 5));
        let window = compute_dirty_window(Some(&s), Duration::days(14), ts(2024, 1, 1));
        assert_eq!(window.start, ts(2024, 1, 1));
    }

    #[test]
    fn test_plan_window_applies_override_and_revision() {
        let tracker = RefreshStateTracker::new(Arc::new(InMemoryStore::new()));
        let tf = seven_day();
        let earliest = ts(2024, 1, 1);

        let mut s = state(ts(2024, 4, 1));
        s.recompute_from = Some(ts(2024, 2, 1));
        let window = tracker.plan_window(Some(&s), &tf, earliest, None);
        assert_eq!(window.start, ts(2024, 2, 1));
        assert_eq!(window.reason, DirtyReason::Override);

        // A correction further back wins, minus lookback.
        let window = tracker.plan_window(Some(&s), &tf, earliest, Some(ts(2024, 1, 20)));
        assert_eq!(window.start, ts(2024, 1, 6));
        assert_eq!(window.reason, DirtyReason::Revision);
    }

    #[test]
    fn test_lookback_override() {
        let store = Arc::new(InMemoryStore::new());
        let tf = seven_day();
        assert_eq!(
            RefreshStateTracker::new(store.clone()).lookback_for(&tf),
            Duration::days(14)
        );
        assert_eq!(
            RefreshStateTracker::new(store.clone())
                .with_lookback_days(Some(30))
                .lookback_for(&tf),
            Duration::days(30)
        );
        // Non-positive overrides are ignored.
        assert_eq!(
            RefreshStateTracker::new(store)
                .with_lookback_days(Some(0))
                .lookback_for(&tf),
            Duration::days(14)
        );
    }

    #[tokio::test]
    async fn test_save_state_is_monotonic() {
        let tracker = RefreshStateTracker::new(Arc::new(InMemoryStore::new()));
        let key = RefreshKey::new("BTC", "7D", 10, AlignmentType::Rolling);

        assert!(tracker.save_state(&key, ts(2024, 4, 1), 91, ts(2024, 4, 2)).await.unwrap());
        // Same watermark: no-op.
        assert!(!tracker.save_state(&key, ts(2024, 4, 1), 91, ts(2024, 4, 3)).await.unwrap());
        // Older watermark: no-op.
        assert!(!tracker.save_state(&key, ts(2024, 3, 1), 60, ts(2024, 4, 4)).await.unwrap());

        let states = tracker
            .load_state(
                &["BTC".to_string()],
                &["7D".to_string()],
                &[10],
                AlignmentType::Rolling,
            )
            .unwrap();
        let stored = &states[&key];
        assert_eq!(stored.last_contiguous_timestamp, ts(2024, 4, 1));
        assert_eq!(stored.last_bar_sequence, 91);

        assert!(tracker.save_state(&key, ts(2024, 4, 8), 98, ts(2024, 4, 9)).await.unwrap());
    }

    #[tokio::test]
    async fn test_override_and_reset_lifecycle() {
        let tracker = RefreshStateTracker::new(Arc::new(InMemoryStore::new()));
        let key = RefreshKey::new("ETH", "1M_CAL", 20, AlignmentType::Calendar);

        // No state yet: nothing to override.
        assert!(!tracker.request_recompute(&key, ts(2023, 1, 1)).await.unwrap());

        tracker.save_state(&key, ts(2024, 3, 31), 90, ts(2024, 4, 1)).await.unwrap();
        assert!(tracker.request_recompute(&key, ts(2023, 1, 1)).await.unwrap());
        tracker.clear_override(&key).await.unwrap();

        assert!(tracker.reset_state(&key).await.unwrap());
        assert!(!tracker.reset_state(&key).await.unwrap());
    }
}
