use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::{count_star, max, min};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use super::model::{AssetProfileDB, PriceBarDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::asset_profiles::dsl as ap_dsl;
use crate::schema::price_bars::dsl as pb_dsl;
use crate::utils::{format_timestamp, parse_timestamp, SQLITE_MAX_PARAMS_CHUNK};
use emaflow_core::bars::{AssetProfile, BarBounds, BarStore, PriceBar};
use emaflow_core::Result;

/// Bars per multi-row insert; each bar binds eight parameters.
const BAR_INSERT_CHUNK: usize = SQLITE_MAX_PARAMS_CHUNK / 8;

pub struct BarRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl BarRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl BarStore for BarRepository {
    fn list_asset_ids(&self) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        Ok(ap_dsl::asset_profiles
            .select(ap_dsl::asset_id)
            .order(ap_dsl::asset_id.asc())
            .load::<String>(&mut conn)
            .map_err(StorageError::from)?)
    }

    fn get_asset_profile(&self, asset_id: &str) -> Result<Option<AssetProfile>> {
        let mut conn = get_connection(&self.pool)?;
        let row = ap_dsl::asset_profiles
            .find(asset_id)
            .select(AssetProfileDB::as_select())
            .first(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(AssetProfile::from))
    }

    fn get_bar_bounds(&self, asset_id: &str) -> Result<Option<BarBounds>> {
        let mut conn = get_connection(&self.pool)?;
        let (first, last, count): (Option<String>, Option<String>, i64) = pb_dsl::price_bars
            .filter(pb_dsl::asset_id.eq(asset_id))
            .select((min(pb_dsl::timestamp), max(pb_dsl::timestamp), count_star()))
            .first(&mut conn)
            .map_err(StorageError::from)?;
        match (first, last) {
            (Some(first), Some(last)) => Ok(Some(BarBounds {
                first: parse_timestamp(&first)?,
                last: parse_timestamp(&last)?,
                count,
            })),
            _ => Ok(None),
        }
    }

    fn get_bars(&self, asset_id: &str, from: Option<DateTime<Utc>>) -> Result<Vec<PriceBar>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = pb_dsl::price_bars
            .filter(pb_dsl::asset_id.eq(asset_id))
            .into_boxed();
        if let Some(from) = from {
            query = query.filter(pb_dsl::timestamp.ge(format_timestamp(from)));
        }
        let rows = query
            .order(pb_dsl::timestamp.asc())
            .select(PriceBarDB::as_select())
            .load(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows
            .into_iter()
            .map(PriceBar::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn count_bars_before(&self, asset_id: &str, before: DateTime<Utc>) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        Ok(pb_dsl::price_bars
            .filter(pb_dsl::asset_id.eq(asset_id))
            .filter(pb_dsl::timestamp.lt(format_timestamp(before)))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?)
    }

    fn earliest_revised_since(
        &self,
        asset_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let mut conn = get_connection(&self.pool)?;
        let earliest: Option<String> = pb_dsl::price_bars
            .filter(pb_dsl::asset_id.eq(asset_id))
            .filter(pb_dsl::updated_at.gt(format_timestamp(since)))
            .select(min(pb_dsl::timestamp))
            .first(&mut conn)
            .map_err(StorageError::from)?;
        Ok(earliest.as_deref().map(parse_timestamp).transpose()?)
    }

    async fn upsert_bars(&self, bars: Vec<PriceBar>) -> Result<usize> {
        let rows: Vec<PriceBarDB> = bars.iter().map(PriceBarDB::from).collect();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut written = 0;
                for chunk in rows.chunks(BAR_INSERT_CHUNK) {
                    written += diesel::replace_into(pb_dsl::price_bars)
                        .values(chunk)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(written)
            })
            .await
    }

    async fn upsert_asset_profile(&self, profile: AssetProfile) -> Result<()> {
        let row = AssetProfileDB::from(profile);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::replace_into(ap_dsl::asset_profiles)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}
