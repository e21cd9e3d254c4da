//! Attribute catalog contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over `hydra_attributes`, the live attribute registry.
//! - Resolve attribute names for an entity type.
//!
//! # Invariants
//! - Every read goes to storage, so a committed mutation is visible to the
//!   very next read on the same connection.
//! - `(entity_type, name)` stays unique; duplicates surface as
//!   `RepoError::DuplicateAttribute` before hitting the constraint.
//! - Moving an attribute to another entity type drops its memberships in
//!   sets of the old entity type.

use crate::model::attribute::{AttributeId, BackendType, HydraAttribute, NewAttribute};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult, TOUCH_UPDATED_AT_SQL};
use rusqlite::{params, Connection, Row};

const ATTRIBUTE_SELECT_SQL: &str = "SELECT
    id,
    entity_type,
    name,
    backend_type,
    default_value,
    created_at,
    updated_at
FROM hydra_attributes";

/// Registry contract for attribute definitions.
pub trait AttributeRepository {
    /// Inserts a definition and returns the stored row.
    fn create_attribute(&self, attribute: &NewAttribute) -> RepoResult<HydraAttribute>;
    /// Writes name, entity type, backend type and default of an existing definition.
    fn update_attribute(&self, attribute: &HydraAttribute) -> RepoResult<HydraAttribute>;
    fn delete_attribute(&self, id: AttributeId) -> RepoResult<()>;
    fn get_attribute(&self, id: AttributeId) -> RepoResult<Option<HydraAttribute>>;
    /// Lists every definition of `entity_type` ordered by id.
    fn list_attributes(&self, entity_type: &str) -> RepoResult<Vec<HydraAttribute>>;
    /// Resolves one definition by name within `entity_type`.
    fn find_attribute(&self, entity_type: &str, name: &str)
        -> RepoResult<Option<HydraAttribute>>;
}

/// SQLite-backed attribute registry.
pub struct SqliteAttributeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttributeRepository<'conn> {
    /// Creates a repository over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["hydra_attributes", "hydra_attribute_sets"])?;
        Ok(Self { conn })
    }

    fn load_required(&self, id: AttributeId) -> RepoResult<HydraAttribute> {
        self.get_attribute(id)?
            .ok_or(RepoError::AttributeNotFound(id))
    }

    fn ensure_name_free(
        &self,
        entity_type: &str,
        name: &str,
        except: Option<AttributeId>,
    ) -> RepoResult<()> {
        match self.find_attribute(entity_type, name)? {
            Some(existing) if Some(existing.id) != except => Err(RepoError::DuplicateAttribute {
                entity_type: entity_type.to_string(),
                name: name.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl AttributeRepository for SqliteAttributeRepository<'_> {
    fn create_attribute(&self, attribute: &NewAttribute) -> RepoResult<HydraAttribute> {
        attribute.validate()?;
        self.ensure_name_free(&attribute.entity_type, &attribute.name, None)?;

        self.conn.execute(
            "INSERT INTO hydra_attributes (
                entity_type,
                name,
                backend_type,
                default_value
            ) VALUES (?1, ?2, ?3, ?4);",
            params![
                attribute.entity_type.as_str(),
                attribute.name.as_str(),
                attribute.backend_type.as_str(),
                attribute.default_value.as_deref(),
            ],
        )?;

        self.load_required(self.conn.last_insert_rowid())
    }

    fn update_attribute(&self, attribute: &HydraAttribute) -> RepoResult<HydraAttribute> {
        NewAttribute {
            entity_type: attribute.entity_type.clone(),
            name: attribute.name.clone(),
            backend_type: attribute.backend_type,
            default_value: attribute.default_value.clone(),
        }
        .validate()?;
        self.ensure_name_free(&attribute.entity_type, &attribute.name, Some(attribute.id))?;

        // Joins the caller's transaction when one is already open.
        let tx = if self.conn.is_autocommit() {
            Some(self.conn.unchecked_transaction()?)
        } else {
            None
        };
        let changed = self.conn.execute(
            &format!(
                "UPDATE hydra_attributes
                 SET
                    entity_type = ?2,
                    name = ?3,
                    backend_type = ?4,
                    default_value = ?5,
                    {TOUCH_UPDATED_AT_SQL}
                 WHERE id = ?1;"
            ),
            params![
                attribute.id,
                attribute.entity_type.as_str(),
                attribute.name.as_str(),
                attribute.backend_type.as_str(),
                attribute.default_value.as_deref(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::AttributeNotFound(attribute.id));
        }

        self.conn.execute(
            "DELETE FROM hydra_attribute_sets
             WHERE hydra_attribute_id = ?1
               AND hydra_set_id IN (
                 SELECT id FROM hydra_sets WHERE entity_type <> ?2
               );",
            params![attribute.id, attribute.entity_type.as_str()],
        )?;
        if let Some(tx) = tx {
            tx.commit()?;
        }

        self.load_required(attribute.id)
    }

    fn delete_attribute(&self, id: AttributeId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM hydra_attributes WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::AttributeNotFound(id));
        }
        Ok(())
    }

    fn get_attribute(&self, id: AttributeId) -> RepoResult<Option<HydraAttribute>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ATTRIBUTE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_attribute_row(row)?));
        }
        Ok(None)
    }

    fn list_attributes(&self, entity_type: &str) -> RepoResult<Vec<HydraAttribute>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ATTRIBUTE_SELECT_SQL} WHERE entity_type = ?1 ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([entity_type])?;
        let mut attributes = Vec::new();
        while let Some(row) = rows.next()? {
            attributes.push(parse_attribute_row(row)?);
        }
        Ok(attributes)
    }

    fn find_attribute(
        &self,
        entity_type: &str,
        name: &str,
    ) -> RepoResult<Option<HydraAttribute>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ATTRIBUTE_SELECT_SQL} WHERE entity_type = ?1 AND name = ?2;"
        ))?;
        let mut rows = stmt.query(params![entity_type, name])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_attribute_row(row)?));
        }
        Ok(None)
    }
}

fn parse_attribute_row(row: &Row<'_>) -> RepoResult<HydraAttribute> {
    let backend_text: String = row.get("backend_type")?;
    let backend_type = BackendType::parse(&backend_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid backend type `{backend_text}` in hydra_attributes.backend_type"
        ))
    })?;

    Ok(HydraAttribute {
        id: row.get("id")?,
        entity_type: row.get("entity_type")?,
        name: row.get("name")?,
        backend_type,
        default_value: row.get("default_value")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
