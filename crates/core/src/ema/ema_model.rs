//! EMA output models shared by all alignment strategies.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::refresh_state::RefreshKey;
use crate::timeframes::AlignmentType;

/// One persisted EMA observation of a per-strategy output table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmaRow {
    pub asset_id: String,
    pub timestamp: DateTime<Utc>,
    pub timeframe_code: String,
    pub period: u32,
    pub alignment_source: AlignmentType,
    pub ema_value: f64,
    pub derivative_1: Option<f64>,
    pub derivative_2: Option<f64>,
    /// Close price the observation was computed from.
    pub close_value: f64,
    pub is_canonical_close: bool,
    pub window_start: Option<NaiveDate>,
    pub realized_days: Option<i64>,
    pub is_partial_start: bool,
    pub is_partial_end: bool,
    /// Assigned by the store on insert; zero until then.
    pub write_seq: i64,
    pub computed_at: DateTime<Utc>,
}

impl EmaRow {
    pub fn key(&self) -> RefreshKey {
        RefreshKey::new(
            self.asset_id.clone(),
            self.timeframe_code.clone(),
            self.period,
            self.alignment_source,
        )
    }

    /// A partial final period still open. Replaced when the period completes.
    pub fn is_provisional(&self) -> bool {
        self.is_partial_end
    }

    /// Compares the computed content, ignoring store bookkeeping.
    pub fn same_values(&self, other: &EmaRow) -> bool {
        self.asset_id == other.asset_id
            && self.timestamp == other.timestamp
            && self.timeframe_code == other.timeframe_code
            && self.period == other.period
            && self.alignment_source == other.alignment_source
            && approx_eq(self.ema_value, other.ema_value)
            && opt_approx_eq(self.derivative_1, other.derivative_1)
            && opt_approx_eq(self.derivative_2, other.derivative_2)
            && approx_eq(self.close_value, other.close_value)
            && self.is_canonical_close == other.is_canonical_close
            && self.window_start == other.window_start
            && self.realized_days == other.realized_days
            && self.is_partial_start == other.is_partial_start
            && self.is_partial_end == other.is_partial_end
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

fn opt_approx_eq(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => approx_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// A bar reduced to its trading date and close.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// One period boundary that produced a canonical observation.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalClose {
    /// Boundary date; the row timestamp is this date at midnight UTC.
    pub date: NaiveDate,
    /// First day of the realized window.
    pub window_start: NaiveDate,
    pub close: f64,
    pub realized_days: i64,
    pub is_partial_start: bool,
    pub is_partial_end: bool,
}

/// A period boundary left out of canonical output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedWindow {
    pub boundary: NaiveDate,
    pub reason: String,
}

/// Canonical closes at or after the dirty-window start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloseSeries {
    pub closes: Vec<CanonicalClose>,
    pub excluded: Vec<ExcludedWindow>,
}

/// Latest stored canonical observation before the dirty window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaSeed {
    pub timestamp: DateTime<Utc>,
    pub ema_value: f64,
    pub derivative_1: Option<f64>,
}

/// Delete-and-rewrite instruction for one series.
#[derive(Debug, Clone)]
pub struct WindowWrite {
    pub key: RefreshKey,
    /// Every stored row of `key` at or after this instant is replaced.
    pub from: DateTime<Utc>,
    pub rows: Vec<EmaRow>,
}
