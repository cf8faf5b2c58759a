//! Database model for the timeframe dimension.

use diesel::prelude::*;

use emaflow_core::timeframes::TimeframeDefinition;
use emaflow_core::{Error, Result};

#[derive(Queryable, Identifiable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::timeframes)]
#[diesel(primary_key(code))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TimeframeDB {
    pub code: String,
    pub base_unit: String,
    pub quantity: i32,
    pub nominal_length_days: i64,
    pub alignment_type: String,
    pub calendar_anchor: Option<String>,
    pub calendar_scheme: String,
    pub canonical: bool,
    pub allow_partial_start: bool,
    pub allow_partial_end: bool,
    pub tf_days_min: Option<i64>,
    pub tf_days_max: Option<i64>,
    pub is_intraday: bool,
    pub sort_order: i32,
    pub description: String,
}

impl From<&TimeframeDefinition> for TimeframeDB {
    fn from(def: &TimeframeDefinition) -> Self {
        Self {
            code: def.code.clone(),
            base_unit: def.base_unit.as_str().to_string(),
            quantity: i32::try_from(def.quantity).unwrap_or(i32::MAX),
            nominal_length_days: def.nominal_length_days,
            alignment_type: def.alignment_type.as_str().to_string(),
            calendar_anchor: def.calendar_anchor.map(|a| a.as_str().to_string()),
            calendar_scheme: def.calendar_scheme.as_str().to_string(),
            canonical: def.canonical,
            allow_partial_start: def.allow_partial_start,
            allow_partial_end: def.allow_partial_end,
            tf_days_min: def.tf_days_min,
            tf_days_max: def.tf_days_max,
            is_intraday: def.is_intraday,
            sort_order: def.sort_order,
            description: def.description.clone(),
        }
    }
}

impl TryFrom<TimeframeDB> for TimeframeDefinition {
    type Error = Error;

    fn try_from(db: TimeframeDB) -> Result<Self> {
        Ok(Self {
            base_unit: db.base_unit.parse()?,
            quantity: u32::try_from(db.quantity).unwrap_or(0),
            nominal_length_days: db.nominal_length_days,
            alignment_type: db.alignment_type.parse()?,
            calendar_anchor: db.calendar_anchor.as_deref().map(str::parse).transpose()?,
            calendar_scheme: db.calendar_scheme.parse()?,
            canonical: db.canonical,
            allow_partial_start: db.allow_partial_start,
            allow_partial_end: db.allow_partial_end,
            tf_days_min: db.tf_days_min,
            tf_days_max: db.tf_days_max,
            is_intraday: db.is_intraday,
            sort_order: db.sort_order,
            description: db.description,
            code: db.code,
        })
    }
}
