//! Unified EMA table models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::ema::EmaRow;
use crate::timeframes::AlignmentType;

/// One row of the unified table.
///
/// Strategy-specific columns are populated only for the `alignment_source`
/// they belong to and stay `None` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedEmaRow {
    pub asset_id: String,
    pub timestamp: DateTime<Utc>,
    pub timeframe_code: String,
    pub period: u32,
    pub alignment_source: AlignmentType,
    pub ema_value: f64,
    pub derivative_1: Option<f64>,
    pub derivative_2: Option<f64>,
    pub close_value: f64,
    pub is_canonical_close: bool,
    /// Rolling only.
    pub roll_window_days: Option<i64>,
    /// Calendar and calendar-anchored.
    pub calendar_window_start: Option<NaiveDate>,
    /// Calendar and calendar-anchored.
    pub realized_days: Option<i64>,
    /// Calendar-anchored only.
    pub is_partial_start: Option<bool>,
    /// Calendar-anchored only.
    pub is_partial_end: Option<bool>,
    pub source_write_seq: i64,
    pub merged_at: DateTime<Utc>,
}

impl UnifiedEmaRow {
    pub fn from_source(row: &EmaRow, merged_at: DateTime<Utc>) -> Self {
        let mut unified = Self {
            asset_id: row.asset_id.clone(),
            timestamp: row.timestamp,
            timeframe_code: row.timeframe_code.clone(),
            period: row.period,
            alignment_source: row.alignment_source,
            ema_value: row.ema_value,
            derivative_1: row.derivative_1,
            derivative_2: row.derivative_2,
            close_value: row.close_value,
            is_canonical_close: row.is_canonical_close,
            roll_window_days: None,
            calendar_window_start: None,
            realized_days: None,
            is_partial_start: None,
            is_partial_end: None,
            source_write_seq: row.write_seq,
            merged_at,
        };
        match row.alignment_source {
            AlignmentType::Rolling => {
                unified.roll_window_days = row.realized_days;
            }
            AlignmentType::Calendar => {
                unified.calendar_window_start = row.window_start;
                unified.realized_days = row.realized_days;
            }
            AlignmentType::CalendarAnchored => {
                unified.calendar_window_start = row.window_start;
                unified.realized_days = row.realized_days;
                unified.is_partial_start = Some(row.is_partial_start);
                unified.is_partial_end = Some(row.is_partial_end);
            }
        }
        unified
    }

    /// Natural key of the unified table.
    pub fn natural_key(&self) -> (String, DateTime<Utc>, String, u32, AlignmentType) {
        (
            self.asset_id.clone(),
            self.timestamp,
            self.timeframe_code.clone(),
            self.period,
            self.alignment_source,
        )
    }
}

/// Merge progress of one alignment source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeWatermark {
    pub alignment_source: AlignmentType,
    /// Highest source write sequence already merged.
    pub last_write_seq: i64,
    pub rows_merged: i64,
    pub updated_at: DateTime<Utc>,
}

/// Canonical rows of one (asset, timeframe, period) series inside a time range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalCount {
    pub asset_id: String,
    pub timeframe_code: String,
    pub period: u32,
    pub alignment_source: AlignmentType,
    pub count: i64,
}
