use chrono::NaiveDate;
use log::{debug, info};
use std::sync::Arc;

use super::sessions_constants::default_sessions;
use super::sessions_model::{SessionDefinition, SessionKey, SessionWindow, TradingCalendar};
use super::sessions_traits::{SessionRepositoryTrait, SessionServiceTrait};
use crate::bars::AssetProfile;
use crate::errors::{ConfigurationError, Result};
use crate::utils::time_utils::get_days_between;

/// Service over the session dimension.
pub struct SessionService {
    repository: Arc<dyn SessionRepositoryTrait>,
}

impl SessionService {
    pub fn new(repository: Arc<dyn SessionRepositoryTrait>) -> Self {
        Self { repository }
    }
}

#[async_trait::async_trait]
impl SessionServiceTrait for SessionService {
    fn get_session(&self, key: &SessionKey) -> Result<SessionDefinition> {
        self.repository
            .get(key)?
            .ok_or_else(|| ConfigurationError::UnknownSession(key.to_string()).into())
    }

    fn resolve_session(
        &self,
        profile: &AssetProfile,
        session_type: &str,
    ) -> Result<SessionDefinition> {
        let key = profile.session_key(session_type);
        if let Some(definition) = self.repository.get(&key)? {
            return Ok(definition);
        }
        let fallback = key.venue_default();
        match self.repository.get(&fallback)? {
            Some(definition) => {
                debug!(
                    "No session for {}, using venue default {}",
                    key, fallback
                );
                Ok(definition)
            }
            None => Err(ConfigurationError::UnknownSession(key.to_string()).into()),
        }
    }

    fn trading_calendar(
        &self,
        profile: &AssetProfile,
        session_type: &str,
    ) -> Result<TradingCalendar> {
        self.resolve_session(profile, session_type)?.calendar()
    }

    fn get_session_windows(
        &self,
        key: &SessionKey,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SessionWindow>> {
        let definition = self.get_session(key)?;
        let tz = definition.calendar()?.tz;
        let mut windows = Vec::new();
        for date in get_days_between(start, end) {
            if let Some(window) = definition.window_on(tz, date)? {
                windows.push(window);
            }
        }
        Ok(windows)
    }

    async fn register_session(&self, definition: SessionDefinition) -> Result<SessionDefinition> {
        definition.validate()?;
        info!(
            "Registering session {} ({})",
            definition.key, definition.timezone
        );
        self.repository.upsert(definition).await
    }

    async fn seed_defaults(&self) -> Result<usize> {
        let defaults = default_sessions();
        for definition in &defaults {
            definition.validate()?;
        }
        let inserted = self.repository.seed(defaults).await?;
        debug!("Seeded {} session definitions", inserted);
        Ok(inserted)
    }
}
