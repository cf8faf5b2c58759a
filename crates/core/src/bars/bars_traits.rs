use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::bars_model::{AssetProfile, BarBounds, PriceBar};
use crate::errors::Result;

/// Access to source price bars.
///
/// Producers only read through this trait. The write methods exist for the
/// ingestion side and for seeding fixtures.
#[async_trait]
pub trait BarStore: Send + Sync {
    /// Assets that have a registered profile.
    fn list_asset_ids(&self) -> Result<Vec<String>>;

    fn get_asset_profile(&self, asset_id: &str) -> Result<Option<AssetProfile>>;

    fn get_bar_bounds(&self, asset_id: &str) -> Result<Option<BarBounds>>;

    /// Bars at or after `from` (all bars when None), ordered by timestamp.
    fn get_bars(&self, asset_id: &str, from: Option<DateTime<Utc>>) -> Result<Vec<PriceBar>>;

    /// Number of bars strictly before `before`.
    fn count_bars_before(&self, asset_id: &str, before: DateTime<Utc>) -> Result<i64>;

    /// Earliest bar timestamp among bars rewritten after `since`.
    fn earliest_revised_since(
        &self,
        asset_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Inserts or replaces bars keyed by (asset_id, timestamp).
    async fn upsert_bars(&self, bars: Vec<PriceBar>) -> Result<usize>;

    async fn upsert_asset_profile(&self, profile: AssetProfile) -> Result<()>;
}
