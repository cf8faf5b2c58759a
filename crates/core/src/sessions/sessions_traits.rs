//! Session repository and service traits.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::sessions_model::{SessionDefinition, SessionKey, SessionWindow, TradingCalendar};
use crate::bars::AssetProfile;
use crate::errors::Result;

#[async_trait]
pub trait SessionRepositoryTrait: Send + Sync {
    fn get(&self, key: &SessionKey) -> Result<Option<SessionDefinition>>;

    fn list(&self) -> Result<Vec<SessionDefinition>>;

    /// Inserts or replaces the definition stored under its key.
    async fn upsert(&self, definition: SessionDefinition) -> Result<SessionDefinition>;

    /// Inserts definitions whose keys are not stored yet. Returns rows inserted.
    async fn seed(&self, definitions: Vec<SessionDefinition>) -> Result<usize>;
}

#[async_trait]
pub trait SessionServiceTrait: Send + Sync {
    /// Exact lookup. Unknown keys are a configuration error.
    fn get_session(&self, key: &SessionKey) -> Result<SessionDefinition>;

    /// Asset-specific session first, then the venue default.
    fn resolve_session(&self, profile: &AssetProfile, session_type: &str)
        -> Result<SessionDefinition>;

    /// Calendar for an asset, resolved through `resolve_session`.
    fn trading_calendar(&self, profile: &AssetProfile, session_type: &str)
        -> Result<TradingCalendar>;

    /// Session windows for every trading date in `[start, end]`.
    fn get_session_windows(
        &self,
        key: &SessionKey,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SessionWindow>>;

    /// Records an asset-specific session discovered at runtime.
    async fn register_session(&self, definition: SessionDefinition) -> Result<SessionDefinition>;

    async fn seed_defaults(&self) -> Result<usize>;
}
