use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use super::model::SessionDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::sessions::dsl as s_dsl;
use emaflow_core::sessions::{SessionDefinition, SessionKey, SessionRepositoryTrait};
use emaflow_core::Result;

pub struct SessionRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SessionRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl SessionRepositoryTrait for SessionRepository {
    fn get(&self, key: &SessionKey) -> Result<Option<SessionDefinition>> {
        let mut conn = get_connection(&self.pool)?;
        let row = s_dsl::sessions
            .filter(s_dsl::asset_class.eq(&key.asset_class))
            .filter(s_dsl::region.eq(&key.region))
            .filter(s_dsl::venue.eq(&key.venue))
            .filter(s_dsl::asset_key_type.eq(&key.asset_key_type))
            .filter(s_dsl::asset_key.eq(&key.asset_key))
            .filter(s_dsl::session_type.eq(&key.session_type))
            .select(SessionDB::as_select())
            .first(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(SessionDefinition::try_from).transpose()?)
    }

    fn list(&self) -> Result<Vec<SessionDefinition>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = s_dsl::sessions
            .select(SessionDB::as_select())
            .load(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows
            .into_iter()
            .map(SessionDefinition::try_from)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    async fn upsert(&self, definition: SessionDefinition) -> Result<SessionDefinition> {
        let row = SessionDB::from(&definition);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<SessionDefinition> {
                diesel::replace_into(s_dsl::sessions)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(definition)
            })
            .await
    }

    async fn seed(&self, definitions: Vec<SessionDefinition>) -> Result<usize> {
        let rows: Vec<SessionDB> = definitions.iter().map(SessionDB::from).collect();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let mut inserted = 0;
                for row in &rows {
                    inserted += diesel::insert_or_ignore_into(s_dsl::sessions)
                        .values(row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(inserted)
            })
            .await
    }
}
