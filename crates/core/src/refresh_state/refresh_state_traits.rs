use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::refresh_state_model::{RefreshKey, RefreshState};
use crate::errors::Result;
use crate::timeframes::AlignmentType;

/// Persistence contract for refresh watermarks.
///
/// Implementations must keep `save_state` monotonic: a watermark that is not
/// strictly newer than the stored one leaves the watermark and bar sequence
/// untouched.
#[async_trait]
pub trait RefreshStateStore: Send + Sync {
    /// States for every combination of the given assets, timeframes and periods
    /// that has been refreshed before.
    fn load_state(
        &self,
        asset_ids: &[String],
        timeframe_codes: &[String],
        periods: &[u32],
        alignment_source: AlignmentType,
    ) -> Result<HashMap<RefreshKey, RefreshState>>;

    fn get_state(&self, key: &RefreshKey) -> Result<Option<RefreshState>>;

    /// Upserts the watermark. Returns true when the watermark advanced.
    ///
    /// `refreshed_at` is recorded as `updated_at` even when the watermark
    /// does not move.
    async fn save_state(
        &self,
        key: &RefreshKey,
        watermark: DateTime<Utc>,
        bar_sequence: i64,
        refreshed_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Widens the next dirty window of an existing key down to `from`.
    ///
    /// Returns false when the key has no state (the next run is a full
    /// recompute anyway).
    async fn request_recompute(&self, key: &RefreshKey, from: DateTime<Utc>) -> Result<bool>;

    async fn clear_override(&self, key: &RefreshKey) -> Result<()>;

    /// Explicit correction: forgets the key so the next run recomputes from scratch.
    async fn reset_state(&self, key: &RefreshKey) -> Result<bool>;
}
