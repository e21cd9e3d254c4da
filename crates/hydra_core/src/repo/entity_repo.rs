//! Host entity record contracts and SQLite implementation.
//!
//! Stands in for the host application's record storage: the attribute layer
//! only needs ids, the entity type, the bound set and an update timestamp.
//!
//! # Invariants
//! - `update_entity` always moves `updated_at` strictly forward.
//! - Deleting a record does not touch value tables; lifecycle hooks do that.

use crate::model::attribute::validate_entity_type;
use crate::model::entity::{EntityId, EntityRecord};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult, TOUCH_UPDATED_AT_SQL};
use rusqlite::{params, Connection, Row};

const ENTITY_SELECT_SQL: &str = "SELECT
    id,
    entity_type,
    hydra_set_id,
    created_at,
    updated_at
FROM entities";

/// Record storage contract consumed by entity lifecycle hooks.
pub trait EntityRepository {
    /// Inserts a new record and returns it with id and timestamps filled in.
    fn insert_entity(&self, record: &EntityRecord) -> RepoResult<EntityRecord>;
    /// Writes the bound set and touches `updated_at`.
    fn update_entity(&self, record: &EntityRecord) -> RepoResult<EntityRecord>;
    fn get_entity(&self, id: EntityId) -> RepoResult<Option<EntityRecord>>;
    fn delete_entity(&self, id: EntityId) -> RepoResult<()>;
}

/// SQLite-backed host record repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Creates a repository over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["entities"])?;
        Ok(Self { conn })
    }

    fn load_required(&self, id: EntityId) -> RepoResult<EntityRecord> {
        self.get_entity(id)?.ok_or(RepoError::EntityNotFound(id))
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn insert_entity(&self, record: &EntityRecord) -> RepoResult<EntityRecord> {
        validate_entity_type(&record.entity_type)?;
        self.conn.execute(
            "INSERT INTO entities (entity_type, hydra_set_id) VALUES (?1, ?2);",
            params![record.entity_type.as_str(), record.hydra_set_id],
        )?;
        self.load_required(self.conn.last_insert_rowid())
    }

    fn update_entity(&self, record: &EntityRecord) -> RepoResult<EntityRecord> {
        let id = record.id.ok_or_else(|| {
            RepoError::InvalidData("cannot update an entity record without id".to_string())
        })?;
        let changed = self.conn.execute(
            &format!(
                "UPDATE entities SET hydra_set_id = ?2, {TOUCH_UPDATED_AT_SQL} WHERE id = ?1;"
            ),
            params![id, record.hydra_set_id],
        )?;
        if changed == 0 {
            return Err(RepoError::EntityNotFound(id));
        }
        self.load_required(id)
    }

    fn get_entity(&self, id: EntityId) -> RepoResult<Option<EntityRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTITY_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entity_row(row)?));
        }
        Ok(None)
    }

    fn delete_entity(&self, id: EntityId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM entities WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::EntityNotFound(id));
        }
        Ok(())
    }
}

fn parse_entity_row(row: &Row<'_>) -> RepoResult<EntityRecord> {
    let mut record = EntityRecord::new(row.get::<_, String>("entity_type")?);
    record.id = Some(row.get("id")?);
    record.hydra_set_id = row.get("hydra_set_id")?;
    record.created_at = Some(row.get("created_at")?);
    record.updated_at = Some(row.get("updated_at")?);
    Ok(record)
}
