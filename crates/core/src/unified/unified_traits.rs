use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::unified_model::{CanonicalCount, MergeWatermark, UnifiedEmaRow};
use crate::errors::Result;
use crate::timeframes::AlignmentType;

/// Persistence contract for the unified table and its merge watermarks.
#[async_trait]
pub trait UnifiedEmaStore: Send + Sync {
    fn get_merge_watermark(&self, alignment_source: AlignmentType)
        -> Result<Option<MergeWatermark>>;

    /// Inserts rows, ignoring natural-key conflicts, and moves the source's
    /// watermark up to `high_write_seq` in the same transaction.
    ///
    /// Returns the number of rows actually inserted.
    async fn merge_batch(
        &self,
        alignment_source: AlignmentType,
        rows: Vec<UnifiedEmaRow>,
        high_write_seq: i64,
    ) -> Result<usize>;

    /// Deletes an asset's rows of one source at or after `from` and inserts
    /// `rows` in their place. Returns (deleted, inserted).
    async fn replace_asset_rows(
        &self,
        alignment_source: AlignmentType,
        asset_id: &str,
        from: DateTime<Utc>,
        rows: Vec<UnifiedEmaRow>,
    ) -> Result<(usize, usize)>;

    /// Rows of an asset ordered by source, timeframe, period, timestamp.
    fn get_rows(
        &self,
        asset_id: &str,
        alignment_source: Option<AlignmentType>,
    ) -> Result<Vec<UnifiedEmaRow>>;

    fn list_asset_ids(&self) -> Result<Vec<String>>;

    /// Every series of the asset present in the table, with its number of
    /// canonical rows inside `[from, to]` (zero when all fall outside).
    fn count_canonical(
        &self,
        asset_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CanonicalCount>>;
}
