use diesel::prelude::*;
use std::str::FromStr;

use crate::errors::StorageError;
use crate::utils::parse_timestamp;
use emaflow_core::refresh_state::{RefreshKey, RefreshState};
use emaflow_core::timeframes::AlignmentType;

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::refresh_state)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RefreshStateDB {
    pub asset_id: String,
    pub timeframe_code: String,
    pub period: i32,
    pub alignment_source: String,
    pub last_contiguous_timestamp: String,
    pub last_bar_sequence: i64,
    pub recompute_from: Option<String>,
    pub updated_at: String,
}

impl TryFrom<RefreshStateDB> for RefreshState {
    type Error = emaflow_core::Error;

    fn try_from(db: RefreshStateDB) -> Result<Self, Self::Error> {
        let period = u32::try_from(db.period)
            .map_err(|_| StorageError::Decode(format!("negative period {}", db.period)))?;
        Ok(Self {
            key: RefreshKey::new(
                db.asset_id,
                db.timeframe_code,
                period,
                AlignmentType::from_str(&db.alignment_source)?,
            ),
            last_contiguous_timestamp: parse_timestamp(&db.last_contiguous_timestamp)?,
            last_bar_sequence: db.last_bar_sequence,
            recompute_from: db.recompute_from.as_deref().map(parse_timestamp).transpose()?,
            updated_at: parse_timestamp(&db.updated_at)?,
        })
    }
}
