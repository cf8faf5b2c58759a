use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::ema_model::{EmaRow, EmaSeed, WindowWrite};
use crate::errors::Result;
use crate::refresh_state::RefreshKey;
use crate::timeframes::AlignmentType;

/// Per-strategy EMA output tables.
///
/// Every alignment type owns a separate table; the `alignment_source` of a key
/// selects it.
#[async_trait]
pub trait EmaStore: Send + Sync {
    /// Latest final canonical row of `key` strictly before `before`.
    fn latest_canonical_before(
        &self,
        key: &RefreshKey,
        before: DateTime<Utc>,
    ) -> Result<Option<EmaSeed>>;

    /// Rows of one series ordered by timestamp, optionally from an instant on.
    fn get_rows(&self, key: &RefreshKey, from: Option<DateTime<Utc>>) -> Result<Vec<EmaRow>>;

    /// Rows of an asset in one strategy table from an instant on.
    fn get_asset_rows(
        &self,
        alignment_source: AlignmentType,
        asset_id: &str,
        from: DateTime<Utc>,
    ) -> Result<Vec<EmaRow>>;

    /// Rows written after `after_seq`, ordered by write sequence, at most `limit`.
    fn rows_written_after(
        &self,
        alignment_source: AlignmentType,
        after_seq: i64,
        limit: usize,
    ) -> Result<Vec<EmaRow>>;

    /// Deletes every row of each key at or after its `from` and inserts the new
    /// rows, all in one transaction. Returns the number of rows inserted.
    async fn replace_windows(&self, writes: Vec<WindowWrite>) -> Result<usize>;

    /// Removes a whole series. Used together with a state reset.
    async fn delete_series(&self, key: &RefreshKey) -> Result<usize>;
}
