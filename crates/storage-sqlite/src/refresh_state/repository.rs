use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::collections::HashMap;
use std::sync::Arc;

use super::model::RefreshStateDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::refresh_state::dsl as rs_dsl;
use crate::utils::{chunk_for_sqlite, format_timestamp, parse_timestamp};
use emaflow_core::refresh_state::{RefreshKey, RefreshState, RefreshStateStore};
use emaflow_core::timeframes::AlignmentType;
use emaflow_core::Result;

pub struct RefreshStateRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl RefreshStateRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn find_state(conn: &mut SqliteConnection, key: &RefreshKey) -> Result<Option<RefreshStateDB>> {
    Ok(rs_dsl::refresh_state
        .find((
            key.asset_id.as_str(),
            key.timeframe_code.as_str(),
            key.period as i32,
            key.alignment_source.as_str(),
        ))
        .select(RefreshStateDB::as_select())
        .first(conn)
        .optional()
        .map_err(StorageError::from)?)
}

macro_rules! key_filter {
    ($key:expr) => {
        rs_dsl::refresh_state
            .filter(rs_dsl::asset_id.eq($key.asset_id.as_str()))
            .filter(rs_dsl::timeframe_code.eq($key.timeframe_code.as_str()))
            .filter(rs_dsl::period.eq($key.period as i32))
            .filter(rs_dsl::alignment_source.eq($key.alignment_source.as_str()))
    };
}

#[async_trait]
impl RefreshStateStore for RefreshStateRepository {
    fn load_state(
        &self,
        asset_ids: &[String],
        timeframe_codes: &[String],
        periods: &[u32],
        alignment_source: AlignmentType,
    ) -> Result<HashMap<RefreshKey, RefreshState>> {
        if asset_ids.is_empty() || timeframe_codes.is_empty() || periods.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = get_connection(&self.pool)?;
        let periods: Vec<i32> = periods.iter().map(|p| *p as i32).collect();

        let mut states = HashMap::new();
        for chunk in chunk_for_sqlite(asset_ids) {
            let rows = rs_dsl::refresh_state
                .filter(rs_dsl::alignment_source.eq(alignment_source.as_str()))
                .filter(rs_dsl::asset_id.eq_any(chunk))
                .filter(rs_dsl::timeframe_code.eq_any(timeframe_codes))
                .filter(rs_dsl::period.eq_any(&periods))
                .select(RefreshStateDB::as_select())
                .load(&mut conn)
                .map_err(StorageError::from)?;
            for row in rows {
                let state = RefreshState::try_from(row)?;
                states.insert(state.key.clone(), state);
            }
        }
        Ok(states)
    }

    fn get_state(&self, key: &RefreshKey) -> Result<Option<RefreshState>> {
        let mut conn = get_connection(&self.pool)?;
        find_state(&mut conn, key)?
            .map(RefreshState::try_from)
            .transpose()
    }

    async fn save_state(
        &self,
        key: &RefreshKey,
        watermark: DateTime<Utc>,
        bar_sequence: i64,
        refreshed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let key = key.clone();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let refreshed_at = format_timestamp(refreshed_at);
                let Some(existing) = find_state(conn, &key)? else {
                    let row = RefreshStateDB {
                        asset_id: key.asset_id.clone(),
                        timeframe_code: key.timeframe_code.clone(),
                        period: key.period as i32,
                        alignment_source: key.alignment_source.as_str().to_string(),
                        last_contiguous_timestamp: format_timestamp(watermark),
                        last_bar_sequence: bar_sequence,
                        recompute_from: None,
                        updated_at: refreshed_at,
                    };
                    diesel::insert_into(rs_dsl::refresh_state)
                        .values(&row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                    return Ok(true);
                };

                if watermark > parse_timestamp(&existing.last_contiguous_timestamp)? {
                    diesel::update(key_filter!(key))
                        .set((
                            rs_dsl::last_contiguous_timestamp.eq(format_timestamp(watermark)),
                            rs_dsl::last_bar_sequence.eq(bar_sequence),
                            rs_dsl::updated_at.eq(&refreshed_at),
                        ))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                    Ok(true)
                } else {
                    diesel::update(key_filter!(key))
                        .set(rs_dsl::updated_at.eq(&refreshed_at))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                    Ok(false)
                }
            })
            .await
    }

    async fn request_recompute(&self, key: &RefreshKey, from: DateTime<Utc>) -> Result<bool> {
        let key = key.clone();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let Some(existing) = find_state(conn, &key)? else {
                    return Ok(false);
                };
                let earliest = match existing.recompute_from.as_deref() {
                    Some(current) => parse_timestamp(current)?.min(from),
                    None => from,
                };
                diesel::update(key_filter!(key))
                    .set(rs_dsl::recompute_from.eq(Some(format_timestamp(earliest))))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(true)
            })
            .await
    }

    async fn clear_override(&self, key: &RefreshKey) -> Result<()> {
        let key = key.clone();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::update(key_filter!(key))
                    .set(rs_dsl::recompute_from.eq(None::<String>))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn reset_state(&self, key: &RefreshKey) -> Result<bool> {
        let key = key.clone();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let deleted = diesel::delete(key_filter!(key))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(deleted > 0)
            })
            .await
    }
}
