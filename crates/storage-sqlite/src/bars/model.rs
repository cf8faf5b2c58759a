//! Database models for source bars and asset profiles.

use diesel::prelude::*;

use crate::errors::StorageError;
use crate::utils::{format_timestamp, parse_timestamp};
use emaflow_core::bars::{AssetProfile, PriceBar};

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::price_bars)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PriceBarDB {
    pub asset_id: String,
    pub timestamp: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub updated_at: String,
}

impl From<&PriceBar> for PriceBarDB {
    fn from(bar: &PriceBar) -> Self {
        Self {
            asset_id: bar.asset_id.clone(),
            timestamp: format_timestamp(bar.timestamp),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            updated_at: format_timestamp(bar.updated_at),
        }
    }
}

impl TryFrom<PriceBarDB> for PriceBar {
    type Error = StorageError;

    fn try_from(db: PriceBarDB) -> Result<Self, Self::Error> {
        Ok(Self {
            timestamp: parse_timestamp(&db.timestamp)?,
            updated_at: parse_timestamp(&db.updated_at)?,
            asset_id: db.asset_id,
            open: db.open,
            high: db.high,
            low: db.low,
            close: db.close,
            volume: db.volume,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::asset_profiles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AssetProfileDB {
    pub asset_id: String,
    pub asset_class: String,
    pub region: String,
    pub venue: String,
    pub asset_key_type: String,
    pub asset_key: String,
}

impl From<AssetProfile> for AssetProfileDB {
    fn from(p: AssetProfile) -> Self {
        Self {
            asset_id: p.asset_id,
            asset_class: p.asset_class,
            region: p.region,
            venue: p.venue,
            asset_key_type: p.asset_key_type,
            asset_key: p.asset_key,
        }
    }
}

impl From<AssetProfileDB> for AssetProfile {
    fn from(db: AssetProfileDB) -> Self {
        Self {
            asset_id: db.asset_id,
            asset_class: db.asset_class,
            region: db.region,
            venue: db.venue,
            asset_key_type: db.asset_key_type,
            asset_key: db.asset_key,
        }
    }
}
