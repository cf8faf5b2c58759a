//! Database model for the session dimension.

use chrono::NaiveTime;
use diesel::prelude::*;

use crate::errors::StorageError;
use emaflow_core::sessions::{SessionDefinition, SessionKey};

const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SessionDB {
    pub asset_class: String,
    pub region: String,
    pub venue: String,
    pub asset_key_type: String,
    pub asset_key: String,
    pub session_type: String,
    pub timezone: String,
    pub open_local: String,
    pub close_local: String,
    pub is_24h: bool,
    pub weekdays_only: bool,
}

impl From<&SessionDefinition> for SessionDB {
    fn from(def: &SessionDefinition) -> Self {
        Self {
            asset_class: def.key.asset_class.clone(),
            region: def.key.region.clone(),
            venue: def.key.venue.clone(),
            asset_key_type: def.key.asset_key_type.clone(),
            asset_key: def.key.asset_key.clone(),
            session_type: def.key.session_type.clone(),
            timezone: def.timezone.clone(),
            open_local: def.open_local.format(TIME_FORMAT).to_string(),
            close_local: def.close_local.format(TIME_FORMAT).to_string(),
            is_24h: def.is_24h,
            weekdays_only: def.weekdays_only,
        }
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, StorageError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|e| StorageError::Decode(format!("session time '{}': {}", value, e)))
}

impl TryFrom<SessionDB> for SessionDefinition {
    type Error = StorageError;

    fn try_from(db: SessionDB) -> Result<Self, Self::Error> {
        Ok(Self {
            open_local: parse_time(&db.open_local)?,
            close_local: parse_time(&db.close_local)?,
            timezone: db.timezone,
            is_24h: db.is_24h,
            weekdays_only: db.weekdays_only,
            key: SessionKey::new(
                db.asset_class,
                db.region,
                db.venue,
                db.asset_key_type,
                db.asset_key,
                db.session_type,
            ),
        })
    }
}
