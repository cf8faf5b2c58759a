//! Row model shared by the three per-strategy EMA tables.

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Bool, Double, Integer, Nullable, Text};

use crate::errors::StorageError;
use crate::utils::{format_date, format_timestamp, parse_date, parse_timestamp};
use emaflow_core::ema::EmaRow;
use emaflow_core::timeframes::AlignmentType;

/// Column list in the order `EmaRowDB` is read back.
pub const EMA_COLUMNS: &str = "write_seq, asset_id, timestamp, timeframe_code, period, \
    ema_value, derivative_1, derivative_2, close_value, is_canonical_close, \
    window_start, realized_days, is_partial_start, is_partial_end, computed_at";

/// Output table owned by an alignment source.
pub fn table_for(source: AlignmentType) -> &'static str {
    match source {
        AlignmentType::Rolling => "ema_rolling",
        AlignmentType::Calendar => "ema_calendar",
        AlignmentType::CalendarAnchored => "ema_calendar_anchored",
    }
}

/// The tables are structurally identical, so rows are read with `sql_query`
/// and the table name chosen at runtime.
#[derive(QueryableByName, Debug, Clone)]
pub struct EmaRowDB {
    #[diesel(sql_type = BigInt)]
    pub write_seq: i64,
    #[diesel(sql_type = Text)]
    pub asset_id: String,
    #[diesel(sql_type = Text)]
    pub timestamp: String,
    #[diesel(sql_type = Text)]
    pub timeframe_code: String,
    #[diesel(sql_type = Integer)]
    pub period: i32,
    #[diesel(sql_type = Double)]
    pub ema_value: f64,
    #[diesel(sql_type = Nullable<Double>)]
    pub derivative_1: Option<f64>,
    #[diesel(sql_type = Nullable<Double>)]
    pub derivative_2: Option<f64>,
    #[diesel(sql_type = Double)]
    pub close_value: f64,
    #[diesel(sql_type = Bool)]
    pub is_canonical_close: bool,
    #[diesel(sql_type = Nullable<Text>)]
    pub window_start: Option<String>,
    #[diesel(sql_type = Nullable<BigInt>)]
    pub realized_days: Option<i64>,
    #[diesel(sql_type = Bool)]
    pub is_partial_start: bool,
    #[diesel(sql_type = Bool)]
    pub is_partial_end: bool,
    #[diesel(sql_type = Text)]
    pub computed_at: String,
}

impl From<&EmaRow> for EmaRowDB {
    fn from(row: &EmaRow) -> Self {
        Self {
            write_seq: row.write_seq,
            asset_id: row.asset_id.clone(),
            timestamp: format_timestamp(row.timestamp),
            timeframe_code: row.timeframe_code.clone(),
            period: row.period as i32,
            ema_value: row.ema_value,
            derivative_1: row.derivative_1,
            derivative_2: row.derivative_2,
            close_value: row.close_value,
            is_canonical_close: row.is_canonical_close,
            window_start: row.window_start.map(format_date),
            realized_days: row.realized_days,
            is_partial_start: row.is_partial_start,
            is_partial_end: row.is_partial_end,
            computed_at: format_timestamp(row.computed_at),
        }
    }
}

impl EmaRowDB {
    pub fn into_row(self, source: AlignmentType) -> Result<EmaRow, StorageError> {
        let period = u32::try_from(self.period)
            .map_err(|_| StorageError::Decode(format!("negative period {}", self.period)))?;
        Ok(EmaRow {
            timestamp: parse_timestamp(&self.timestamp)?,
            computed_at: parse_timestamp(&self.computed_at)?,
            window_start: self.window_start.as_deref().map(parse_date).transpose()?,
            asset_id: self.asset_id,
            timeframe_code: self.timeframe_code,
            period,
            alignment_source: source,
            ema_value: self.ema_value,
            derivative_1: self.derivative_1,
            derivative_2: self.derivative_2,
            close_value: self.close_value,
            is_canonical_close: self.is_canonical_close,
            realized_days: self.realized_days,
            is_partial_start: self.is_partial_start,
            is_partial_end: self.is_partial_end,
            write_seq: self.write_seq,
        })
    }
}
