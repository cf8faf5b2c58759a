use log::{debug, info};
use std::sync::Arc;

use super::timeframes_constants::default_timeframes;
use super::timeframes_model::{AlignmentType, TimeframeDefinition};
use super::timeframes_traits::{TimeframeRepositoryTrait, TimeframeServiceTrait};
use crate::errors::{ConfigurationError, Result};

/// Service for reading and extending the timeframe registry.
pub struct TimeframeService {
    repository: Arc<dyn TimeframeRepositoryTrait>,
}

impl TimeframeService {
    pub fn new(repository: Arc<dyn TimeframeRepositoryTrait>) -> Self {
        Self { repository }
    }
}

#[async_trait::async_trait]
impl TimeframeServiceTrait for TimeframeService {
    fn list_timeframes(
        &self,
        alignment_type: Option<AlignmentType>,
        canonical_only: bool,
    ) -> Result<Vec<TimeframeDefinition>> {
        let mut timeframes: Vec<TimeframeDefinition> = self
            .repository
            .list()?
            .into_iter()
            .filter(|tf| alignment_type.map_or(true, |t| tf.alignment_type == t))
            .filter(|tf| !canonical_only || tf.canonical)
            .collect();
        timeframes.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.code.cmp(&b.code))
        });
        Ok(timeframes)
    }

    fn get_timeframe(&self, code: &str) -> Result<TimeframeDefinition> {
        self.repository
            .get_by_code(code)?
            .ok_or_else(|| ConfigurationError::UnknownTimeframe(code.to_string()).into())
    }

    fn get_nominal_days(&self, code: &str) -> Result<i64> {
        Ok(self.get_timeframe(code)?.nominal_length_days)
    }

    async fn add_timeframe(&self, definition: TimeframeDefinition) -> Result<TimeframeDefinition> {
        definition.validate()?;
        if self.repository.get_by_code(&definition.code)?.is_some() {
            return Err(ConfigurationError::DuplicateTimeframe(definition.code).into());
        }
        info!(
            "Adding timeframe {} ({}, {} days)",
            definition.code, definition.alignment_type, definition.nominal_length_days
        );
        self.repository.insert(definition).await
    }

    async fn seed_defaults(&self) -> Result<usize> {
        let defaults = default_timeframes();
        for definition in &defaults {
            definition.validate()?;
        }
        let inserted = self.repository.seed(defaults).await?;
        debug!("Seeded {} timeframe definitions", inserted);
        Ok(inserted)
    }
}
