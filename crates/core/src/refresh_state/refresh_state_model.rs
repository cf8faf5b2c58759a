//! Watermark models for incremental refresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::timeframes::AlignmentType;

/// Identity of one incrementally maintained EMA series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshKey {
    pub asset_id: String,
    pub timeframe_code: String,
    pub period: u32,
    pub alignment_source: AlignmentType,
}

impl RefreshKey {
    pub fn new(
        asset_id: impl Into<String>,
        timeframe_code: impl Into<String>,
        period: u32,
        alignment_source: AlignmentType,
    ) -> Self {
        Self {
            asset_id: asset_id.into(),
            timeframe_code: timeframe_code.into(),
            period,
            alignment_source,
        }
    }
}

impl fmt::Display for RefreshKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/p{}/{}",
            self.asset_id, self.timeframe_code, self.period, self.alignment_source
        )
    }
}

/// Persisted watermark of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshState {
    pub key: RefreshKey,
    /// Latest canonical close known to be correctly computed.
    pub last_contiguous_timestamp: DateTime<Utc>,
    /// Source bars consumed through the watermark.
    pub last_bar_sequence: i64,
    /// Pending manual widening of the next dirty window.
    pub recompute_from: Option<DateTime<Utc>>,
    /// When the last successful batch for this key read its bars.
    pub updated_at: DateTime<Utc>,
}

/// Why a dirty window starts where it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirtyReason {
    /// No state yet, compute the whole history.
    Full,
    /// Watermark minus lookback.
    Incremental,
    /// A manual override reached further back.
    Override,
    /// A revised source bar reached further back.
    Revision,
}

/// Start of the range a producer must recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyWindow {
    pub start: DateTime<Utc>,
    pub reason: DirtyReason,
}

impl DirtyWindow {
    pub fn is_full(&self) -> bool {
        self.reason == DirtyReason::Full
    }
}
