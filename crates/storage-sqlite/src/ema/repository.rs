use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Bool, Double, Integer, Nullable, Text};
use diesel::sqlite::{Sqlite, SqliteConnection};
use std::sync::Arc;

use super::model::{table_for, EmaRowDB, EMA_COLUMNS};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::utils::format_timestamp;
use emaflow_core::ema::{EmaRow, EmaSeed, EmaStore, WindowWrite};
use emaflow_core::refresh_state::RefreshKey;
use emaflow_core::timeframes::AlignmentType;
use emaflow_core::Result;

pub struct EmaRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl EmaRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn decode(rows: Vec<EmaRowDB>, source: AlignmentType) -> Result<Vec<EmaRow>> {
    Ok(rows
        .into_iter()
        .map(|r| r.into_row(source))
        .collect::<std::result::Result<Vec<_>, _>>()?)
}

fn insert_row(conn: &mut SqliteConnection, table: &str, row: &EmaRow) -> Result<usize> {
    let db = EmaRowDB::from(row);
    let sql = format!(
        "INSERT INTO {} (asset_id, timestamp, timeframe_code, period, ema_value, \
            derivative_1, derivative_2, close_value, is_canonical_close, window_start, \
            realized_days, is_partial_start, is_partial_end, computed_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        table
    );
    Ok(sql_query(sql)
        .bind::<Text, _>(db.asset_id)
        .bind::<Text, _>(db.timestamp)
        .bind::<Text, _>(db.timeframe_code)
        .bind::<Integer, _>(db.period)
        .bind::<Double, _>(db.ema_value)
        .bind::<Nullable<Double>, _>(db.derivative_1)
        .bind::<Nullable<Double>, _>(db.derivative_2)
        .bind::<Double, _>(db.close_value)
        .bind::<Bool, _>(db.is_canonical_close)
        .bind::<Nullable<Text>, _>(db.window_start)
        .bind::<Nullable<BigInt>, _>(db.realized_days)
        .bind::<Bool, _>(db.is_partial_start)
        .bind::<Bool, _>(db.is_partial_end)
        .bind::<Text, _>(db.computed_at)
        .execute(conn)
        .map_err(StorageError::from)?)
}

fn delete_from(
    conn: &mut SqliteConnection,
    key: &RefreshKey,
    from: Option<DateTime<Utc>>,
) -> Result<usize> {
    let table = table_for(key.alignment_source);
    let mut sql = format!(
        "DELETE FROM {} WHERE asset_id = ? AND timeframe_code = ? AND period = ?",
        table
    );
    if from.is_some() {
        sql.push_str(" AND timestamp >= ?");
    }
    let mut query = sql_query(sql)
        .into_boxed::<Sqlite>()
        .bind::<Text, _>(key.asset_id.clone())
        .bind::<Text, _>(key.timeframe_code.clone())
        .bind::<Integer, _>(key.period as i32);
    if let Some(from) = from {
        query = query.bind::<Text, _>(format_timestamp(from));
    }
    Ok(query.execute(conn).map_err(StorageError::from)?)
}

#[async_trait]
impl EmaStore for EmaRepository {
    fn latest_canonical_before(
        &self,
        key: &RefreshKey,
        before: DateTime<Utc>,
    ) -> Result<Option<EmaSeed>> {
        let mut conn = get_connection(&self.pool)?;
        let sql = format!(
            "SELECT {} FROM {} \
             WHERE asset_id = ? AND timeframe_code = ? AND period = ? \
               AND is_canonical_close = 1 AND is_partial_end = 0 AND timestamp < ? \
             ORDER BY timestamp DESC LIMIT 1",
            EMA_COLUMNS,
            table_for(key.alignment_source)
        );
        let row: Option<EmaRowDB> = sql_query(sql)
            .bind::<Text, _>(&key.asset_id)
            .bind::<Text, _>(&key.timeframe_code)
            .bind::<Integer, _>(key.period as i32)
            .bind::<Text, _>(format_timestamp(before))
            .get_result(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let row = row.into_row(key.alignment_source)?;
        Ok(Some(EmaSeed {
            timestamp: row.timestamp,
            ema_value: row.ema_value,
            derivative_1: row.derivative_1,
        }))
    }

    fn get_rows(&self, key: &RefreshKey, from: Option<DateTime<Utc>>) -> Result<Vec<EmaRow>> {
        let mut conn = get_connection(&self.pool)?;
        let mut sql = format!(
            "SELECT {} FROM {} WHERE asset_id = ? AND timeframe_code = ? AND period = ?",
            EMA_COLUMNS,
            table_for(key.alignment_source)
        );
        if from.is_some() {
            sql.push_str(" AND timestamp >= ?");
        }
        sql.push_str(" ORDER BY timestamp");

        let mut query = sql_query(sql)
            .into_boxed::<Sqlite>()
            .bind::<Text, _>(key.asset_id.clone())
            .bind::<Text, _>(key.timeframe_code.clone())
            .bind::<Integer, _>(key.period as i32);
        if let Some(from) = from {
            query = query.bind::<Text, _>(format_timestamp(from));
        }
        let rows = query
            .load::<EmaRowDB>(&mut conn)
            .map_err(StorageError::from)?;
        decode(rows, key.alignment_source)
    }

    fn get_asset_rows(
        &self,
        alignment_source: AlignmentType,
        asset_id: &str,
        from: DateTime<Utc>,
    ) -> Result<Vec<EmaRow>> {
        let mut conn = get_connection(&self.pool)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE asset_id = ? AND timestamp >= ? \
             ORDER BY timeframe_code, period, timestamp",
            EMA_COLUMNS,
            table_for(alignment_source)
        );
        let rows = sql_query(sql)
            .bind::<Text, _>(asset_id)
            .bind::<Text, _>(format_timestamp(from))
            .load::<EmaRowDB>(&mut conn)
            .map_err(StorageError::from)?;
        decode(rows, alignment_source)
    }

    fn rows_written_after(
        &self,
        alignment_source: AlignmentType,
        after_seq: i64,
        limit: usize,
    ) -> Result<Vec<EmaRow>> {
        let mut conn = get_connection(&self.pool)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE write_seq > ? ORDER BY write_seq LIMIT ?",
            EMA_COLUMNS,
            table_for(alignment_source)
        );
        let rows = sql_query(sql)
            .bind::<BigInt, _>(after_seq)
            .bind::<BigInt, _>(i64::try_from(limit).unwrap_or(i64::MAX))
            .load::<EmaRowDB>(&mut conn)
            .map_err(StorageError::from)?;
        decode(rows, alignment_source)
    }

    async fn replace_windows(&self, writes: Vec<WindowWrite>) -> Result<usize> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut inserted = 0;
                for write in &writes {
                    delete_from(conn, &write.key, Some(write.from))?;
                    let table = table_for(write.key.alignment_source);
                    for row in &write.rows {
                        inserted += insert_row(conn, table, row)?;
                    }
                }
                Ok(inserted)
            })
            .await
    }

    async fn delete_series(&self, key: &RefreshKey) -> Result<usize> {
        let key = key.clone();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                delete_from(conn, &key, None)
            })
            .await
    }
}
