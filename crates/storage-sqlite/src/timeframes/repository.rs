use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use super::model::TimeframeDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::timeframes::dsl as tf_dsl;
use emaflow_core::timeframes::{TimeframeDefinition, TimeframeRepositoryTrait};
use emaflow_core::Result;

pub struct TimeframeRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl TimeframeRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl TimeframeRepositoryTrait for TimeframeRepository {
    fn list(&self) -> Result<Vec<TimeframeDefinition>> {
        let mut conn = get_connection(&self.pool)?;
        tf_dsl::timeframes
            .load::<TimeframeDB>(&mut conn)
            .map_err(StorageError::from)?
            .into_iter()
            .map(TimeframeDefinition::try_from)
            .collect()
    }

    fn get_by_code(&self, code: &str) -> Result<Option<TimeframeDefinition>> {
        let mut conn = get_connection(&self.pool)?;
        tf_dsl::timeframes
            .find(code)
            .first::<TimeframeDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(TimeframeDefinition::try_from)
            .transpose()
    }

    async fn insert(&self, definition: TimeframeDefinition) -> Result<TimeframeDefinition> {
        let row = TimeframeDB::from(&definition);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<TimeframeDefinition> {
                diesel::insert_into(tf_dsl::timeframes)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(definition)
            })
            .await
    }

    async fn seed(&self, definitions: Vec<TimeframeDefinition>) -> Result<usize> {
        let rows: Vec<TimeframeDB> = definitions.iter().map(TimeframeDB::from).collect();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut inserted = 0;
                for row in &rows {
                    inserted += diesel::insert_into(tf_dsl::timeframes)
                        .values(row)
                        .on_conflict(tf_dsl::code)
                        .do_nothing()
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(inserted)
            })
            .await
    }
}
