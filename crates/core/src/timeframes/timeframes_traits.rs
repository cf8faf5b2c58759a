//! Timeframe repository and service traits.

use async_trait::async_trait;

use super::timeframes_model::{AlignmentType, TimeframeDefinition};
use crate::errors::Result;

/// Persistence contract for the timeframe dimension table.
#[async_trait]
pub trait TimeframeRepositoryTrait: Send + Sync {
    /// Returns every stored definition, in no particular order.
    fn list(&self) -> Result<Vec<TimeframeDefinition>>;

    fn get_by_code(&self, code: &str) -> Result<Option<TimeframeDefinition>>;

    /// Inserts a new definition. Fails with a unique violation on a duplicate code.
    async fn insert(&self, definition: TimeframeDefinition) -> Result<TimeframeDefinition>;

    /// Inserts the given definitions, ignoring codes that already exist.
    ///
    /// Returns the number of rows actually inserted.
    async fn seed(&self, definitions: Vec<TimeframeDefinition>) -> Result<usize>;
}

#[async_trait]
pub trait TimeframeServiceTrait: Send + Sync {
    /// Lists timeframes ordered by sort order, then code.
    fn list_timeframes(
        &self,
        alignment_type: Option<AlignmentType>,
        canonical_only: bool,
    ) -> Result<Vec<TimeframeDefinition>>;

    /// Looks up a timeframe. Unknown codes are a configuration error.
    fn get_timeframe(&self, code: &str) -> Result<TimeframeDefinition>;

    fn get_nominal_days(&self, code: &str) -> Result<i64>;

    /// Administrative addition of a new timeframe.
    async fn add_timeframe(&self, definition: TimeframeDefinition) -> Result<TimeframeDefinition>;

    /// Seeds the static registry. Safe to call on every start.
    async fn seed_defaults(&self) -> Result<usize>;
}
