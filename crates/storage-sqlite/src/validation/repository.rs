use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use super::model::{NewValidationAuditDB, ValidationAuditDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::validation_audit::dsl as va_dsl;
use crate::utils::format_timestamp;
use emaflow_core::validation::{ValidationAuditStore, ValidationResult};
use emaflow_core::Result;

pub struct ValidationAuditRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ValidationAuditRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl ValidationAuditStore for ValidationAuditRepository {
    async fn append_results(
        &self,
        run_id: &str,
        checked_at: DateTime<Utc>,
        results: Vec<ValidationResult>,
    ) -> Result<usize> {
        let checked_at = format_timestamp(checked_at);
        let rows: Vec<NewValidationAuditDB> = results
            .iter()
            .map(|r| NewValidationAuditDB::new(run_id, &checked_at, r))
            .collect();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut inserted = 0;
                for row in &rows {
                    inserted += diesel::insert_into(va_dsl::validation_audit)
                        .values(row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(inserted)
            })
            .await
    }

    fn list_results(&self, run_id: &str) -> Result<Vec<ValidationResult>> {
        let mut conn = get_connection(&self.pool)?;
        va_dsl::validation_audit
            .filter(va_dsl::run_id.eq(run_id))
            .order(va_dsl::id.asc())
            .select(ValidationAuditDB::as_select())
            .load(&mut conn)
            .map_err(StorageError::from)?
            .into_iter()
            .map(ValidationResult::try_from)
            .collect()
    }
}
