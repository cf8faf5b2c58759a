//! Utility functions for SQLite storage operations.
//!
//! Chunking helpers to stay under SQLite parameter limits, and the text
//! encodings used for timestamps and dates.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::errors::StorageError;

/// Bound parameters per statement, under SQLite's default limit of 999.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Splits `items` so that each `IN (...)` list stays under the parameter limit.
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}

/// Encodes an instant as RFC 3339 UTC with second precision.
///
/// The fixed width keeps lexical order equal to chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Decode(format!("timestamp '{}': {}", value, e)))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_date(value: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| StorageError::Decode(format!("date '{}': {}", value, e)))
}
