use diesel::prelude::*;
use std::str::FromStr;

use crate::errors::StorageError;
use emaflow_core::timeframes::AlignmentType;
use emaflow_core::validation::{ValidationResult, ValidationStatus};

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = crate::schema::validation_audit)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ValidationAuditDB {
    pub id: i64,
    pub run_id: String,
    pub checked_at: String,
    pub asset_id: String,
    pub timeframe_code: String,
    pub period: i32,
    pub alignment_source: String,
    pub expected_count: i64,
    pub actual_count: i64,
    pub status: String,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::validation_audit)]
pub struct NewValidationAuditDB {
    pub run_id: String,
    pub checked_at: String,
    pub asset_id: String,
    pub timeframe_code: String,
    pub period: i32,
    pub alignment_source: String,
    pub expected_count: i64,
    pub actual_count: i64,
    pub status: String,
}

impl NewValidationAuditDB {
    pub fn new(run_id: &str, checked_at: &str, result: &ValidationResult) -> Self {
        Self {
            run_id: run_id.to_string(),
            checked_at: checked_at.to_string(),
            asset_id: result.asset_id.clone(),
            timeframe_code: result.timeframe_code.clone(),
            period: result.period as i32,
            alignment_source: result.alignment_source.as_str().to_string(),
            expected_count: result.expected_count,
            actual_count: result.actual_count,
            status: result.status.as_str().to_string(),
        }
    }
}

impl TryFrom<ValidationAuditDB> for ValidationResult {
    type Error = emaflow_core::Error;

    fn try_from(db: ValidationAuditDB) -> Result<Self, Self::Error> {
        Ok(Self {
            period: u32::try_from(db.period)
                .map_err(|_| StorageError::Decode(format!("negative period {}", db.period)))?,
            alignment_source: AlignmentType::from_str(&db.alignment_source)?,
            status: ValidationStatus::from_str(&db.status)?,
            asset_id: db.asset_id,
            timeframe_code: db.timeframe_code,
            expected_count: db.expected_count,
            actual_count: db.actual_count,
        })
    }
}
