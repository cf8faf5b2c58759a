//! Refresh run request and summary.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::alerts::FailedAsset;
use crate::constants::{DEFAULT_EMA_PERIODS, DEFAULT_MAX_WORKERS};
use crate::ema::{AssetRefreshResult, RefreshStatus};
use crate::timeframes::AlignmentType;
use crate::validation::ValidationReport;

/// What one run refreshes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRequest {
    /// Assets to refresh; empty means every asset with a profile.
    pub asset_ids: Vec<String>,
    /// Timeframe codes; empty means every canonical timeframe.
    pub timeframe_codes: Vec<String>,
    pub periods: Vec<u32>,
    /// Assets refreshed concurrently.
    pub max_workers: usize,
    pub validate: bool,
    pub alert: bool,
}

impl Default for RefreshRequest {
    fn default() -> Self {
        Self {
            asset_ids: Vec::new(),
            timeframe_codes: Vec::new(),
            periods: DEFAULT_EMA_PERIODS.to_vec(),
            max_workers: DEFAULT_MAX_WORKERS,
            validate: true,
            alert: true,
        }
    }
}

/// Aggregate result of one run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub assets: Vec<AssetRefreshResult>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub rows_written: usize,
    pub canonical_rows_written: usize,
    pub windows_excluded: usize,
    pub rows_merged: BTreeMap<AlignmentType, usize>,
    pub validation: Option<ValidationReport>,
}

impl RunSummary {
    pub fn new(run_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: started_at,
            assets: Vec::new(),
            succeeded: 0,
            failed: 0,
            skipped: 0,
            rows_written: 0,
            canonical_rows_written: 0,
            windows_excluded: 0,
            rows_merged: BTreeMap::new(),
            validation: None,
        }
    }

    pub fn add_result(&mut self, result: AssetRefreshResult) {
        match result.status {
            RefreshStatus::Success => self.succeeded += 1,
            RefreshStatus::Skipped => self.skipped += 1,
            RefreshStatus::Failed => self.failed += 1,
        }
        self.rows_written += result.rows_written;
        self.canonical_rows_written += result.canonical_rows_written;
        self.windows_excluded += result.windows_excluded;
        self.assets.push(result);
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> Vec<FailedAsset> {
        self.assets
            .iter()
            .filter(|a| a.status == RefreshStatus::Failed)
            .map(|a| FailedAsset {
                asset_id: a.asset_id.clone(),
                error_kind: a.error_kind.unwrap_or("unexpected").to_string(),
                error: a.error.clone().unwrap_or_default(),
            })
            .collect()
    }

    pub fn total_merged(&self) -> usize {
        self.rows_merged.values().sum()
    }

    pub fn summary(&self) -> String {
        let base = format!(
            "Run {}: {} assets refreshed, {} skipped, {} rows written ({} canonical), {} merged",
            self.run_id,
            self.succeeded,
            self.skipped,
            self.rows_written,
            self.canonical_rows_written,
            self.total_merged()
        );
        if self.is_success() {
            base
        } else {
            format!("{} with {} failures", base, self.failed)
        }
    }
}
