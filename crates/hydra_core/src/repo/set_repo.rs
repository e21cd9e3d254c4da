//! Attribute set and membership contracts with SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over `hydra_sets`.
//! - Maintain `hydra_attribute_sets` membership rows.
//! - Answer "which attributes does this set allow" for the association engine.
//!
//! # Invariants
//! - Membership rows only link attributes and sets of the same entity type.
//! - A missing set id means "no restriction"; every definition is allowed.
//! - Membership answers are read from storage on every call.

use crate::model::attribute::{validate_entity_type, AttributeId};
use crate::model::set::{HydraSet, SetId};
use crate::repo::attribute_repo::{AttributeRepository, SqliteAttributeRepository};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult, TOUCH_UPDATED_AT_SQL};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeSet;

const SET_SELECT_SQL: &str = "SELECT
    id,
    entity_type,
    name,
    created_at,
    updated_at
FROM hydra_sets";

/// Set catalog and membership index contract.
pub trait SetRepository {
    fn create_set(&self, entity_type: &str, name: &str) -> RepoResult<HydraSet>;
    fn rename_set(&self, id: SetId, name: &str) -> RepoResult<HydraSet>;
    /// Deletes a set and its memberships; host entities bound to it are unbound.
    fn delete_set(&self, id: SetId) -> RepoResult<()>;
    fn get_set(&self, id: SetId) -> RepoResult<Option<HydraSet>>;
    fn list_sets(&self, entity_type: &str) -> RepoResult<Vec<HydraSet>>;
    /// Adds one attribute to a set. Adding an existing member is a no-op.
    fn add_attribute(&self, set_id: SetId, attribute_id: AttributeId) -> RepoResult<()>;
    /// Removes one attribute from a set, returning whether it was a member.
    fn remove_attribute(&self, set_id: SetId, attribute_id: AttributeId) -> RepoResult<bool>;
    /// Attribute ids of `entity_type` that are members of `set_id`.
    fn allowed_attribute_ids(
        &self,
        entity_type: &str,
        set_id: SetId,
    ) -> RepoResult<BTreeSet<AttributeId>>;
    /// Whether `attribute_id` may be used by an entity bound to `set_id`.
    fn is_allowed(
        &self,
        entity_type: &str,
        set_id: Option<SetId>,
        attribute_id: AttributeId,
    ) -> RepoResult<bool>;
}

/// SQLite-backed set repository.
pub struct SqliteSetRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSetRepository<'conn> {
    /// Creates a repository over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &["hydra_sets", "hydra_attribute_sets", "hydra_attributes"],
        )?;
        Ok(Self { conn })
    }

    fn load_required(&self, id: SetId) -> RepoResult<HydraSet> {
        self.get_set(id)?.ok_or(RepoError::SetNotFound(id))
    }

    fn ensure_name_free(&self, entity_type: &str, name: &str) -> RepoResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM hydra_sets WHERE entity_type = ?1 AND name = ?2
            );",
            params![entity_type, name],
            |row| row.get(0),
        )?;
        if exists == 1 {
            return Err(RepoError::DuplicateSet {
                entity_type: entity_type.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

impl SetRepository for SqliteSetRepository<'_> {
    fn create_set(&self, entity_type: &str, name: &str) -> RepoResult<HydraSet> {
        validate_entity_type(entity_type)?;
        self.ensure_name_free(entity_type, name)?;

        self.conn.execute(
            "INSERT INTO hydra_sets (entity_type, name) VALUES (?1, ?2);",
            params![entity_type, name],
        )?;
        self.load_required(self.conn.last_insert_rowid())
    }

    fn rename_set(&self, id: SetId, name: &str) -> RepoResult<HydraSet> {
        let current = self.load_required(id)?;
        if current.name == name {
            return Ok(current);
        }
        self.ensure_name_free(&current.entity_type, name)?;

        self.conn.execute(
            &format!("UPDATE hydra_sets SET name = ?2, {TOUCH_UPDATED_AT_SQL} WHERE id = ?1;"),
            params![id, name],
        )?;
        self.load_required(id)
    }

    fn delete_set(&self, id: SetId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM hydra_sets WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::SetNotFound(id));
        }
        Ok(())
    }

    fn get_set(&self, id: SetId) -> RepoResult<Option<HydraSet>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SET_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_set_row(row)?));
        }
        Ok(None)
    }

    fn list_sets(&self, entity_type: &str) -> RepoResult<Vec<HydraSet>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SET_SELECT_SQL} WHERE entity_type = ?1 ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([entity_type])?;
        let mut sets = Vec::new();
        while let Some(row) = rows.next()? {
            sets.push(parse_set_row(row)?);
        }
        Ok(sets)
    }

    fn add_attribute(&self, set_id: SetId, attribute_id: AttributeId) -> RepoResult<()> {
        let set = self.load_required(set_id)?;
        let attribute = SqliteAttributeRepository::try_new(self.conn)?
            .get_attribute(attribute_id)?
            .ok_or(RepoError::AttributeNotFound(attribute_id))?;
        if attribute.entity_type != set.entity_type {
            return Err(RepoError::EntityTypeMismatch {
                attribute_id,
                set_id,
            });
        }

        self.conn.execute(
            "INSERT OR IGNORE INTO hydra_attribute_sets (hydra_attribute_id, hydra_set_id)
             VALUES (?1, ?2);",
            params![attribute_id, set_id],
        )?;
        Ok(())
    }

    fn remove_attribute(&self, set_id: SetId, attribute_id: AttributeId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM hydra_attribute_sets
             WHERE hydra_set_id = ?1 AND hydra_attribute_id = ?2;",
            params![set_id, attribute_id],
        )?;
        Ok(changed > 0)
    }

    fn allowed_attribute_ids(
        &self,
        entity_type: &str,
        set_id: SetId,
    ) -> RepoResult<BTreeSet<AttributeId>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id
             FROM hydra_attribute_sets m
             INNER JOIN hydra_attributes a ON a.id = m.hydra_attribute_id
             INNER JOIN hydra_sets s ON s.id = m.hydra_set_id
             WHERE m.hydra_set_id = ?1
               AND a.entity_type = ?2
               AND s.entity_type = ?2
             ORDER BY a.id ASC;",
        )?;
        let mut rows = stmt.query(params![set_id, entity_type])?;
        let mut ids = BTreeSet::new();
        while let Some(row) = rows.next()? {
            ids.insert(row.get::<_, AttributeId>(0)?);
        }
        Ok(ids)
    }

    fn is_allowed(
        &self,
        entity_type: &str,
        set_id: Option<SetId>,
        attribute_id: AttributeId,
    ) -> RepoResult<bool> {
        let Some(set_id) = set_id else {
            return Ok(true);
        };

        let allowed: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM hydra_attribute_sets m
                INNER JOIN hydra_attributes a ON a.id = m.hydra_attribute_id
                INNER JOIN hydra_sets s ON s.id = m.hydra_set_id
                WHERE m.hydra_set_id = ?1
                  AND m.hydra_attribute_id = ?3
                  AND a.entity_type = ?2
                  AND s.entity_type = ?2
            );",
            params![set_id, entity_type, attribute_id],
            |row| row.get(0),
        )?;
        Ok(allowed == 1)
    }
}

fn parse_set_row(row: &Row<'_>) -> RepoResult<HydraSet> {
    Ok(HydraSet {
        id: row.get("id")?,
        entity_type: row.get("entity_type")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
