use chrono::Utc;
use futures::stream::{self, StreamExt};
use log::{debug, info};
use std::sync::Arc;
use uuid::Uuid;

use super::pipeline_model::{RefreshRequest, RunSummary};
use crate::bars::BarStore;
use crate::constants::DEFAULT_SESSION_TYPE;
use crate::ema::{AssetPlan, EmaRefreshService};
use crate::errors::{ConfigurationError, Result, ValidationError};
use crate::sessions::SessionServiceTrait;
use crate::timeframes::{AlignmentType, TimeframeDefinition, TimeframeServiceTrait};
use crate::unified::UnificationMerger;
use crate::validation::ValidationService;

/// Orchestrates one refresh run: produce, merge, validate, alert.
pub struct RefreshPipeline {
    timeframe_service: Arc<dyn TimeframeServiceTrait>,
    session_service: Arc<dyn SessionServiceTrait>,
    bar_store: Arc<dyn BarStore>,
    refresh_service: Arc<EmaRefreshService>,
    merger: Arc<UnificationMerger>,
    validation_service: Arc<ValidationService>,
    session_type: String,
}

impl RefreshPipeline {
    pub fn new(
        timeframe_service: Arc<dyn TimeframeServiceTrait>,
        session_service: Arc<dyn SessionServiceTrait>,
        bar_store: Arc<dyn BarStore>,
        refresh_service: Arc<EmaRefreshService>,
        merger: Arc<UnificationMerger>,
        validation_service: Arc<ValidationService>,
    ) -> Self {
        Self {
            timeframe_service,
            session_service,
            bar_store,
            refresh_service,
            merger,
            validation_service,
            session_type: DEFAULT_SESSION_TYPE.to_string(),
        }
    }

    pub fn with_session_type(mut self, session_type: impl Into<String>) -> Self {
        self.session_type = session_type.into();
        self
    }

    /// Timeframes named by the request, or every canonical timeframe.
    fn resolve_timeframes(&self, codes: &[String]) -> Result<Vec<TimeframeDefinition>> {
        if codes.is_empty() {
            return self.timeframe_service.list_timeframes(None, true);
        }
        codes
            .iter()
            .map(|code| self.timeframe_service.get_timeframe(code))
            .collect()
    }

    /// Profiles and calendars of every requested asset, before any work starts.
    fn resolve_assets(&self, asset_ids: &[String]) -> Result<Vec<AssetPlan>> {
        let asset_ids = if asset_ids.is_empty() {
            self.bar_store.list_asset_ids()?
        } else {
            asset_ids.to_vec()
        };
        asset_ids
            .into_iter()
            .map(|asset_id| {
                let profile = self
                    .bar_store
                    .get_asset_profile(&asset_id)?
                    .ok_or_else(|| ConfigurationError::UnknownAsset(asset_id.clone()))?;
                let calendar = self
                    .session_service
                    .trading_calendar(&profile, &self.session_type)?;
                Ok(AssetPlan { asset_id, calendar })
            })
            .collect()
    }

    /// Runs the whole refresh. Configuration problems and a failed merge
    /// abort the run; per-asset failures land in the summary.
    pub async fn run(&self, request: &RefreshRequest) -> Result<RunSummary> {
        let run_id = Uuid::new_v4().to_string();
        let mut summary = RunSummary::new(run_id.clone(), Utc::now());

        if request.periods.is_empty() || request.periods.contains(&0) {
            return Err(ValidationError::InvalidInput(format!(
                "EMA periods must be at least 1, got {:?}",
                request.periods
            ))
            .into());
        }
        let timeframes = self.resolve_timeframes(&request.timeframe_codes)?;
        let assets = self.resolve_assets(&request.asset_ids)?;
        let mut periods = request.periods.clone();
        periods.sort_unstable();
        periods.dedup();

        info!(
            "Starting refresh run {}: {} assets, {} timeframes, periods {:?}",
            run_id,
            assets.len(),
            timeframes.len(),
            periods
        );

        let workers = request.max_workers.max(1);
        let refresh_service = &self.refresh_service;
        let timeframes_ref = &timeframes;
        let periods_ref = &periods;
        let results: Vec<_> = stream::iter(assets.iter())
            .map(|asset| async move {
                refresh_service
                    .refresh_asset(asset, timeframes_ref, periods_ref)
                    .await
            })
            .buffer_unordered(workers)
            .collect()
            .await;
        for result in results {
            summary.add_result(result);
        }
        summary.assets.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));

        let sources: Vec<AlignmentType> = AlignmentType::ALL
            .into_iter()
            .filter(|source| timeframes.iter().any(|tf| tf.alignment_type == *source))
            .collect();
        summary.rows_merged = self.merger.sync_sources(&sources).await?;
        debug!("Merge counts for run {}: {:?}", run_id, summary.rows_merged);

        let asset_ids: Vec<String> = assets.into_iter().map(|a| a.asset_id).collect();
        summary.validation = self
            .validation_service
            .validate_and_alert(
                &run_id,
                &asset_ids,
                &summary.failures(),
                request.validate,
                request.alert,
            )
            .await;

        summary.finished_at = Utc::now();
        info!("{}", summary.summary());
        Ok(summary)
    }
}
