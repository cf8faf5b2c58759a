use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::unified_model::UnifiedEmaRow;
use super::unified_traits::UnifiedEmaStore;
use crate::constants::MERGE_BATCH_SIZE;
use crate::ema::EmaStore;
use crate::errors::Result;
use crate::timeframes::AlignmentType;

/// Copies per-strategy rows into the unified table.
///
/// Insert-only: rows already present under the same natural key are left as
/// they are. Corrections go through [`UnificationMerger::reconcile`].
pub struct UnificationMerger {
    ema_store: Arc<dyn EmaStore>,
    unified_store: Arc<dyn UnifiedEmaStore>,
    batch_size: usize,
}

impl UnificationMerger {
    pub fn new(ema_store: Arc<dyn EmaStore>, unified_store: Arc<dyn UnifiedEmaStore>) -> Self {
        Self {
            ema_store,
            unified_store,
            batch_size: MERGE_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Merges everything one source wrote since its watermark.
    pub async fn sync(&self, alignment_source: AlignmentType) -> Result<usize> {
        let mut watermark = self
            .unified_store
            .get_merge_watermark(alignment_source)?
            .map_or(0, |w| w.last_write_seq);
        let merged_at = Utc::now();
        let mut inserted = 0;

        loop {
            let rows = self
                .ema_store
                .rows_written_after(alignment_source, watermark, self.batch_size)?;
            let Some(high) = rows.iter().map(|r| r.write_seq).max() else {
                break;
            };
            let batch: Vec<UnifiedEmaRow> = rows
                .iter()
                .filter(|r| !r.is_provisional())
                .map(|r| UnifiedEmaRow::from_source(r, merged_at))
                .collect();
            debug!(
                "Merging {} of {} {} rows up to seq {}",
                batch.len(),
                rows.len(),
                alignment_source,
                high
            );
            inserted += self
                .unified_store
                .merge_batch(alignment_source, batch, high)
                .await?;
            watermark = high;
            if rows.len() < self.batch_size {
                break;
            }
        }

        if inserted > 0 {
            info!("Merged {} new {} rows into unified table", inserted, alignment_source);
        }
        Ok(inserted)
    }

    pub async fn sync_all(&self) -> Result<BTreeMap<AlignmentType, usize>> {
        self.sync_sources(&AlignmentType::ALL).await
    }

    pub async fn sync_sources(
        &self,
        sources: &[AlignmentType],
    ) -> Result<BTreeMap<AlignmentType, usize>> {
        let mut counts = BTreeMap::new();
        for &source in sources {
            counts.insert(source, self.sync(source).await?);
        }
        Ok(counts)
    }

    /// Rebuilds an asset's unified rows of one source from `from` on out of the
    /// current per-strategy table.
    pub async fn reconcile(
        &self,
        alignment_source: AlignmentType,
        asset_id: &str,
        from: DateTime<Utc>,
    ) -> Result<usize> {
        let merged_at = Utc::now();
        let rows: Vec<UnifiedEmaRow> = self
            .ema_store
            .get_asset_rows(alignment_source, asset_id, from)?
            .iter()
            .filter(|r| !r.is_provisional())
            .map(|r| UnifiedEmaRow::from_source(r, merged_at))
            .collect();
        let (deleted, inserted) = self
            .unified_store
            .replace_asset_rows(alignment_source, asset_id, from, rows)
            .await?;
        info!(
            "Reconciled {} {} rows from {}: {} removed, {} inserted",
            asset_id, alignment_source, from, deleted, inserted
        );
        Ok(inserted)
    }
}
