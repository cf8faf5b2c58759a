use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Integer, Text};
use diesel::sqlite::SqliteConnection;
use std::str::FromStr;
use std::sync::Arc;

use super::model::{MergeWatermarkDB, UnifiedEmaRowDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::ema_merge_watermarks::dsl as mw_dsl;
use crate::schema::ema_unified::dsl as u_dsl;
use crate::utils::{format_timestamp, SQLITE_MAX_PARAMS_CHUNK};
use emaflow_core::timeframes::AlignmentType;
use emaflow_core::unified::{CanonicalCount, MergeWatermark, UnifiedEmaRow, UnifiedEmaStore};
use emaflow_core::Result;

/// Rows per multi-row insert; each row binds seventeen parameters.
const UNIFIED_INSERT_CHUNK: usize = SQLITE_MAX_PARAMS_CHUNK / 17;

#[derive(QueryableByName, Debug)]
struct CanonicalCountDB {
    #[diesel(sql_type = Text)]
    timeframe_code: String,
    #[diesel(sql_type = Integer)]
    period: i32,
    #[diesel(sql_type = Text)]
    alignment_source: String,
    #[diesel(sql_type = BigInt)]
    count: i64,
}

pub struct UnifiedEmaRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl UnifiedEmaRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

fn insert_ignore(conn: &mut SqliteConnection, rows: &[UnifiedEmaRowDB]) -> Result<usize> {
    let mut inserted = 0;
    for chunk in rows.chunks(UNIFIED_INSERT_CHUNK) {
        inserted += diesel::insert_or_ignore_into(u_dsl::ema_unified)
            .values(chunk)
            .execute(conn)
            .map_err(StorageError::from)?;
    }
    Ok(inserted)
}

#[async_trait]
impl UnifiedEmaStore for UnifiedEmaRepository {
    fn get_merge_watermark(
        &self,
        alignment_source: AlignmentType,
    ) -> Result<Option<MergeWatermark>> {
        let mut conn = get_connection(&self.pool)?;
        mw_dsl::ema_merge_watermarks
            .find(alignment_source.as_str())
            .select(MergeWatermarkDB::as_select())
            .first(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(MergeWatermark::try_from)
            .transpose()
    }

    async fn merge_batch(
        &self,
        alignment_source: AlignmentType,
        rows: Vec<UnifiedEmaRow>,
        high_write_seq: i64,
    ) -> Result<usize> {
        let rows: Vec<UnifiedEmaRowDB> = rows.iter().map(UnifiedEmaRowDB::from).collect();
        let source = alignment_source.as_str().to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let inserted = insert_ignore(conn, &rows)?;

                let existing = mw_dsl::ema_merge_watermarks
                    .find(&source)
                    .select(MergeWatermarkDB::as_select())
                    .first(conn)
                    .optional()
                    .map_err(StorageError::from)?;
                let (last_write_seq, rows_merged) = existing
                    .map(|w| (w.last_write_seq, w.rows_merged))
                    .unwrap_or((0, 0));

                // The watermark never moves backwards.
                let watermark = MergeWatermarkDB {
                    alignment_source: source,
                    last_write_seq: last_write_seq.max(high_write_seq),
                    rows_merged: rows_merged + inserted as i64,
                    updated_at: format_timestamp(Utc::now()),
                };
                diesel::replace_into(mw_dsl::ema_merge_watermarks)
                    .values(&watermark)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(inserted)
            })
            .await
    }

    async fn replace_asset_rows(
        &self,
        alignment_source: AlignmentType,
        asset_id: &str,
        from: DateTime<Utc>,
        rows: Vec<UnifiedEmaRow>,
    ) -> Result<(usize, usize)> {
        let rows: Vec<UnifiedEmaRowDB> = rows.iter().map(UnifiedEmaRowDB::from).collect();
        let source = alignment_source.as_str().to_string();
        let asset_id = asset_id.to_string();
        let from = format_timestamp(from);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<(usize, usize)> {
                let deleted = diesel::delete(
                    u_dsl::ema_unified
                        .filter(u_dsl::alignment_source.eq(&source))
                        .filter(u_dsl::asset_id.eq(&asset_id))
                        .filter(u_dsl::timestamp.ge(&from)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                let inserted = insert_ignore(conn, &rows)?;
                Ok((deleted, inserted))
            })
            .await
    }

    fn get_rows(
        &self,
        asset_id: &str,
        alignment_source: Option<AlignmentType>,
    ) -> Result<Vec<UnifiedEmaRow>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = u_dsl::ema_unified
            .filter(u_dsl::asset_id.eq(asset_id))
            .into_boxed();
        if let Some(source) = alignment_source {
            query = query.filter(u_dsl::alignment_source.eq(source.as_str()));
        }
        let rows = query
            .order((
                u_dsl::alignment_source.asc(),
                u_dsl::timeframe_code.asc(),
                u_dsl::period.asc(),
                u_dsl::timestamp.asc(),
            ))
            .select(UnifiedEmaRowDB::as_select())
            .load(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(UnifiedEmaRow::try_from).collect()
    }

    fn list_asset_ids(&self) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        Ok(u_dsl::ema_unified
            .select(u_dsl::asset_id)
            .distinct()
            .order(u_dsl::asset_id.asc())
            .load::<String>(&mut conn)
            .map_err(StorageError::from)?)
    }

    fn count_canonical(
        &self,
        asset_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CanonicalCount>> {
        let mut conn = get_connection(&self.pool)?;
        let counts: Vec<CanonicalCountDB> = sql_query(
            "SELECT timeframe_code, period, alignment_source, \
                    CAST(COALESCE(SUM(CASE WHEN is_canonical_close = 1 \
                        AND timestamp >= ? AND timestamp <= ? THEN 1 ELSE 0 END), 0) \
                    AS BIGINT) AS count \
             FROM ema_unified \
             WHERE asset_id = ? \
             GROUP BY alignment_source, timeframe_code, period \
             ORDER BY timeframe_code, period, alignment_source",
        )
        .bind::<Text, _>(format_timestamp(from))
        .bind::<Text, _>(format_timestamp(to))
        .bind::<Text, _>(asset_id)
        .load(&mut conn)
        .map_err(StorageError::from)?;

        counts
            .into_iter()
            .map(|c| -> Result<CanonicalCount> {
                Ok(CanonicalCount {
                    asset_id: asset_id.to_string(),
                    period: u32::try_from(c.period).map_err(|_| {
                        StorageError::Decode(format!("negative period {}", c.period))
                    })?,
                    alignment_source: AlignmentType::from_str(&c.alignment_source)?,
                    timeframe_code: c.timeframe_code,
                    count: c.count,
                })
            })
            .collect()
    }
}
