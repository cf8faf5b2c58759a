//! Incremental EMA refresh for one asset at a time.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::alignment::{AlignmentStrategy, CloseContext};
use super::ema_model::{DailyClose, WindowWrite};
use super::ema_traits::EmaStore;
use super::producer::compute_ema;
use crate::bars::{BarStore, PriceBar};
use crate::constants::DEFAULT_MAX_GAP_DAYS;
use crate::errors::{DataQualityError, Error, Result};
use crate::refresh_state::{DirtyWindow, RefreshKey, RefreshState, RefreshStateTracker};
use crate::sessions::TradingCalendar;
use crate::timeframes::{AlignmentType, TimeframeDefinition};
use crate::utils::time_utils::date_to_utc;

/// Tuning for the producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProducerConfig {
    /// Longest tolerated run of missing trading days inside one window.
    pub max_gap_days: i64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            max_gap_days: DEFAULT_MAX_GAP_DAYS,
        }
    }
}

/// An asset ready to refresh, with its session calendar already resolved.
#[derive(Debug, Clone)]
pub struct AssetPlan {
    pub asset_id: String,
    pub calendar: TradingCalendar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefreshStatus {
    Success,
    Skipped,
    Failed,
}

/// Outcome of refreshing every requested series of one asset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRefreshResult {
    pub asset_id: String,
    pub status: RefreshStatus,
    pub rows_written: usize,
    pub canonical_rows_written: usize,
    pub windows_excluded: usize,
    pub watermarks_advanced: usize,
    pub error: Option<String>,
    pub error_kind: Option<&'static str>,
}

impl AssetRefreshResult {
    fn empty(asset_id: &str, status: RefreshStatus) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            status,
            rows_written: 0,
            canonical_rows_written: 0,
            windows_excluded: 0,
            watermarks_advanced: 0,
            error: None,
            error_kind: None,
        }
    }

    pub fn skipped(asset_id: &str, reason: &str) -> Self {
        Self {
            error: Some(reason.to_string()),
            ..Self::empty(asset_id, RefreshStatus::Skipped)
        }
    }

    pub fn failed(asset_id: &str, err: &Error) -> Self {
        Self {
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            ..Self::empty(asset_id, RefreshStatus::Failed)
        }
    }
}

struct SeriesJob<'a> {
    key: RefreshKey,
    timeframe: &'a TimeframeDefinition,
    strategy: AlignmentStrategy,
    window: DirtyWindow,
    from: NaiveDate,
    state: Option<RefreshState>,
}

struct Checkpoint {
    key: RefreshKey,
    watermark: Option<DateTime<Utc>>,
    bar_sequence: i64,
    state: Option<RefreshState>,
}

/// Converts bars to trading-date closes, rejecting malformed or non-monotonic series.
pub fn to_daily_closes(bars: &[PriceBar], calendar: &TradingCalendar) -> Result<Vec<DailyClose>> {
    let mut days: Vec<DailyClose> = Vec::with_capacity(bars.len());
    let mut previous: Option<&PriceBar> = None;
    for bar in bars {
        bar.check()?;
        let date = calendar.trading_date(bar.timestamp);
        if let (Some(prev), Some(last)) = (previous, days.last()) {
            if date <= last.date {
                return Err(DataQualityError::NonMonotonic {
                    asset_id: bar.asset_id.clone(),
                    previous: prev.timestamp,
                    timestamp: bar.timestamp,
                }
                .into());
            }
        }
        days.push(DailyClose {
            date,
            close: bar.close,
        });
        previous = Some(bar);
    }
    Ok(days)
}

/// Runs the producers of every requested alignment type for single assets.
pub struct EmaRefreshService {
    bar_store: Arc<dyn BarStore>,
    ema_store: Arc<dyn EmaStore>,
    tracker: Arc<RefreshStateTracker>,
    config: ProducerConfig,
}

impl EmaRefreshService {
    pub fn new(
        bar_store: Arc<dyn BarStore>,
        ema_store: Arc<dyn EmaStore>,
        tracker: Arc<RefreshStateTracker>,
        config: ProducerConfig,
    ) -> Self {
        Self {
            bar_store,
            ema_store,
            tracker,
            config,
        }
    }

    pub fn tracker(&self) -> &RefreshStateTracker {
        &self.tracker
    }

    /// Refreshes all series of one asset. Never returns an error: failures are
    /// reported in the result so other assets keep going.
    pub async fn refresh_asset(
        &self,
        asset: &AssetPlan,
        timeframes: &[TimeframeDefinition],
        periods: &[u32],
    ) -> AssetRefreshResult {
        match self.try_refresh_asset(asset, timeframes, periods).await {
            Ok(result) => result,
            Err(err) => {
                error!(
                    "Refresh of {} failed ({}): {}",
                    asset.asset_id,
                    err.kind(),
                    err
                );
                AssetRefreshResult::failed(&asset.asset_id, &err)
            }
        }
    }

    async fn try_refresh_asset(
        &self,
        asset: &AssetPlan,
        timeframes: &[TimeframeDefinition],
        periods: &[u32],
    ) -> Result<AssetRefreshResult> {
        let asset_id = asset.asset_id.as_str();
        let calendar = &asset.calendar;
        let refreshed_at = Utc::now();

        let Some(bounds) = self.bar_store.get_bar_bounds(asset_id)? else {
            debug!("No source bars for {}, skipping", asset_id);
            return Ok(AssetRefreshResult::skipped(asset_id, "no source bars"));
        };
        let history_start = calendar.trading_date(bounds.first);

        let states = self.load_states(asset_id, timeframes, periods)?;
        let mut revisions: HashMap<DateTime<Utc>, Option<DateTime<Utc>>> = HashMap::new();
        let mut jobs = Vec::with_capacity(timeframes.len() * periods.len());

        for timeframe in timeframes {
            let strategy = AlignmentStrategy::for_timeframe(timeframe)?;
            for &period in periods {
                let key =
                    RefreshKey::new(asset_id, &timeframe.code, period, timeframe.alignment_type);
                let state = states.get(&key).cloned();
                let revised = match &state {
                    Some(s) => match revisions.get(&s.updated_at) {
                        Some(cached) => *cached,
                        None => {
                            let found =
                                self.bar_store.earliest_revised_since(asset_id, s.updated_at)?;
                            revisions.insert(s.updated_at, found);
                            found
                        }
                    },
                    None => None,
                };
                let window =
                    self.tracker
                        .plan_window(state.as_ref(), timeframe, bounds.first, revised);
                let from = if window.is_full() {
                    history_start
                } else {
                    window
                        .start
                        .date_naive()
                        .min(calendar.trading_date(window.start))
                        .max(history_start)
                };
                jobs.push(SeriesJob {
                    key,
                    timeframe,
                    strategy,
                    window,
                    from,
                    state,
                });
            }
        }

        let Some(load_from) = jobs
            .iter()
            .map(|job| job.from - Duration::days(job.strategy.max_window_days(job.timeframe) + 1))
            .min()
        else {
            return Ok(AssetRefreshResult::skipped(asset_id, "no series requested"));
        };

        // One extra day covers sessions whose trading date trails the UTC date.
        let load_ts = date_to_utc(load_from) - Duration::days(1);
        let bars = self.bar_store.get_bars(asset_id, Some(load_ts))?;
        let bars_before = self.bar_store.count_bars_before(asset_id, load_ts)?;
        let days = to_daily_closes(&bars, calendar)?;

        let ctx = CloseContext {
            calendar,
            history_start,
            max_gap_days: self.config.max_gap_days,
        };

        let mut result = AssetRefreshResult::empty(asset_id, RefreshStatus::Success);
        let mut writes = Vec::with_capacity(jobs.len());
        let mut checkpoints = Vec::with_capacity(jobs.len());

        for job in jobs {
            let series = job
                .strategy
                .compute_canonical_closes(&days, &ctx, job.from)?;
            for excluded in &series.excluded {
                warn!(
                    "Excluded window ending {} for {}: {}",
                    excluded.boundary, job.key, excluded.reason
                );
            }
            result.windows_excluded += series.excluded.len();

            let from_ts = date_to_utc(job.from);
            let seed = if job.window.is_full() {
                None
            } else {
                self.ema_store.latest_canonical_before(&job.key, from_ts)?
            };
            let rows = compute_ema(&job.key, &series, &days, seed, job.from, refreshed_at);

            let watermark = rows
                .iter()
                .filter(|r| r.is_canonical_close && !r.is_provisional())
                .map(|r| r.timestamp)
                .max();
            let bar_sequence = watermark.map_or(0, |wm| {
                let through = wm.date_naive();
                bars_before + days.iter().filter(|d| d.date <= through).count() as i64
            });

            result.canonical_rows_written += rows.iter().filter(|r| r.is_canonical_close).count();
            debug!(
                "{}: recomputing from {} ({:?}), {} rows",
                job.key,
                job.from,
                job.window.reason,
                rows.len()
            );

            checkpoints.push(Checkpoint {
                key: job.key.clone(),
                watermark,
                bar_sequence,
                state: job.state,
            });
            writes.push(WindowWrite {
                key: job.key,
                from: from_ts,
                rows,
            });
        }

        result.rows_written = self.ema_store.replace_windows(writes).await?;

        // The batch is durable; only now may watermarks move.
        for checkpoint in checkpoints {
            let advanced = match (checkpoint.watermark, &checkpoint.state) {
                (Some(watermark), _) => {
                    self.tracker
                        .save_state(
                            &checkpoint.key,
                            watermark,
                            checkpoint.bar_sequence,
                            refreshed_at,
                        )
                        .await?
                }
                (None, Some(state)) => {
                    self.tracker
                        .save_state(
                            &checkpoint.key,
                            state.last_contiguous_timestamp,
                            state.last_bar_sequence,
                            refreshed_at,
                        )
                        .await?
                }
                (None, None) => false,
            };
            if advanced {
                result.watermarks_advanced += 1;
            }
            if checkpoint
                .state
                .as_ref()
                .is_some_and(|s| s.recompute_from.is_some())
            {
                self.tracker.clear_override(&checkpoint.key).await?;
            }
        }

        info!(
            "Refreshed {}: {} rows ({} canonical), {} watermarks advanced, {} windows excluded",
            asset_id,
            result.rows_written,
            result.canonical_rows_written,
            result.watermarks_advanced,
            result.windows_excluded
        );
        Ok(result)
    }

    fn load_states(
        &self,
        asset_id: &str,
        timeframes: &[TimeframeDefinition],
        periods: &[u32],
    ) -> Result<HashMap<RefreshKey, RefreshState>> {
        let asset_ids = [asset_id.to_string()];
        let mut states = HashMap::new();
        for source in AlignmentType::ALL {
            let codes: Vec<String> = timeframes
                .iter()
                .filter(|tf| tf.alignment_type == source)
                .map(|tf| tf.code.clone())
                .collect();
            if codes.is_empty() {
                continue;
            }
            states.extend(self.tracker.load_state(&asset_ids, &codes, periods, source)?);
        }
        Ok(states)
    }

    /// Forgets a series entirely; the next refresh recomputes it from scratch.
    pub async fn reset_series(&self, key: &RefreshKey) -> Result<usize> {
        self.tracker.reset_state(key).await?;
        let deleted = self.ema_store.delete_series(key).await?;
        info!("Reset {}: {} rows deleted", key, deleted);
        Ok(deleted)
    }
}
