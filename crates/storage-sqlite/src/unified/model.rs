//! Database models for the unified EMA table.

use diesel::prelude::*;
use std::str::FromStr;

use crate::errors::StorageError;
use crate::utils::{format_date, format_timestamp, parse_date, parse_timestamp};
use emaflow_core::timeframes::AlignmentType;
use emaflow_core::unified::{MergeWatermark, UnifiedEmaRow};

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::ema_unified)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UnifiedEmaRowDB {
    pub asset_id: String,
    pub timestamp: String,
    pub timeframe_code: String,
    pub period: i32,
    pub alignment_source: String,
    pub ema_value: f64,
    pub derivative_1: Option<f64>,
    pub derivative_2: Option<f64>,
    pub close_value: f64,
    pub is_canonical_close: bool,
    pub roll_window_days: Option<i64>,
    pub calendar_window_start: Option<String>,
    pub realized_days: Option<i64>,
    pub is_partial_start: Option<bool>,
    pub is_partial_end: Option<bool>,
    pub source_write_seq: i64,
    pub merged_at: String,
}

impl From<&UnifiedEmaRow> for UnifiedEmaRowDB {
    fn from(row: &UnifiedEmaRow) -> Self {
        Self {
            asset_id: row.asset_id.clone(),
            timestamp: format_timestamp(row.timestamp),
            timeframe_code: row.timeframe_code.clone(),
            period: row.period as i32,
            alignment_source: row.alignment_source.as_str().to_string(),
            ema_value: row.ema_value,
            derivative_1: row.derivative_1,
            derivative_2: row.derivative_2,
            close_value: row.close_value,
            is_canonical_close: row.is_canonical_close,
            roll_window_days: row.roll_window_days,
            calendar_window_start: row.calendar_window_start.map(format_date),
            realized_days: row.realized_days,
            is_partial_start: row.is_partial_start,
            is_partial_end: row.is_partial_end,
            source_write_seq: row.source_write_seq,
            merged_at: format_timestamp(row.merged_at),
        }
    }
}

impl TryFrom<UnifiedEmaRowDB> for UnifiedEmaRow {
    type Error = emaflow_core::Error;

    fn try_from(db: UnifiedEmaRowDB) -> Result<Self, Self::Error> {
        let period = u32::try_from(db.period)
            .map_err(|_| StorageError::Decode(format!("negative period {}", db.period)))?;
        Ok(Self {
            timestamp: parse_timestamp(&db.timestamp)?,
            merged_at: parse_timestamp(&db.merged_at)?,
            calendar_window_start: db
                .calendar_window_start
                .as_deref()
                .map(parse_date)
                .transpose()?,
            alignment_source: AlignmentType::from_str(&db.alignment_source)?,
            period,
            asset_id: db.asset_id,
            timeframe_code: db.timeframe_code,
            ema_value: db.ema_value,
            derivative_1: db.derivative_1,
            derivative_2: db.derivative_2,
            close_value: db.close_value,
            is_canonical_close: db.is_canonical_close,
            roll_window_days: db.roll_window_days,
            realized_days: db.realized_days,
            is_partial_start: db.is_partial_start,
            is_partial_end: db.is_partial_end,
            source_write_seq: db.source_write_seq,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::ema_merge_watermarks)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MergeWatermarkDB {
    pub alignment_source: String,
    pub last_write_seq: i64,
    pub rows_merged: i64,
    pub updated_at: String,
}

impl TryFrom<MergeWatermarkDB> for MergeWatermark {
    type Error = emaflow_core::Error;

    fn try_from(db: MergeWatermarkDB) -> Result<Self, Self::Error> {
        Ok(Self {
            alignment_source: AlignmentType::from_str(&db.alignment_source)?,
            last_write_seq: db.last_write_seq,
            rows_merged: db.rows_merged,
            updated_at: parse_timestamp(&db.updated_at)?,
        })
    }
}
