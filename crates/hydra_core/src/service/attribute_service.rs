//! Attribute registry use-case service.
//!
//! # Responsibility
//! - Provide the live registry: create, rename, retype, move, re-default and
//!   delete attribute definitions.
//! - Keep value tables in step with definition changes.
//!
//! # Invariants
//! - Every mutation is committed before the call returns; the next
//!   resolution sees it.
//! - A definition change and the purge of rows it makes unreachable commit
//!   together or not at all.

use crate::model::attribute::{
    validate_attribute_name, validate_entity_type, AttributeId, BackendType, HydraAttribute,
    NewAttribute,
};
use crate::repo::attribute_repo::AttributeRepository;
use crate::repo::value_repo::ValueStore;
use crate::repo::{RepoError, RepoResult};
use log::info;
use rusqlite::Connection;

/// Use-case service over the attribute registry and value store.
pub struct AttributeService<'a> {
    conn: &'a Connection,
    attributes: &'a dyn AttributeRepository,
    values: &'a dyn ValueStore,
}

impl<'a> AttributeService<'a> {
    pub fn new(
        conn: &'a Connection,
        attributes: &'a dyn AttributeRepository,
        values: &'a dyn ValueStore,
    ) -> Self {
        Self {
            conn,
            attributes,
            values,
        }
    }

    /// Registers a definition and makes sure its entity type has value tables.
    pub fn create(&self, attribute: &NewAttribute) -> RepoResult<HydraAttribute> {
        attribute.validate()?;
        let created = self.in_transaction(|| {
            self.values.ensure_tables(&attribute.entity_type)?;
            self.attributes.create_attribute(attribute)
        })?;
        info!(
            "event=attribute_create module=registry status=ok attribute_id={} entity_type={} backend_type={}",
            created.id, created.entity_type, created.backend_type
        );
        Ok(created)
    }

    /// Renames a definition. Stored values stay attached through the id.
    pub fn rename(&self, id: AttributeId, name: &str) -> RepoResult<HydraAttribute> {
        validate_attribute_name(name)?;
        let mut attribute = self.load_required(id)?;
        if attribute.name == name {
            return Ok(attribute);
        }
        attribute.name = name.to_string();
        let renamed = self.attributes.update_attribute(&attribute)?;
        info!(
            "event=attribute_rename module=registry status=ok attribute_id={}",
            renamed.id
        );
        Ok(renamed)
    }

    /// Changes the backend type. Rows in the old backend table are dropped.
    pub fn retype(&self, id: AttributeId, backend_type: BackendType) -> RepoResult<HydraAttribute> {
        let mut attribute = self.load_required(id)?;
        let previous = attribute.backend_type;
        if previous == backend_type {
            return Ok(attribute);
        }
        attribute.backend_type = backend_type;
        let (retyped, purged) = self.in_transaction(|| {
            let retyped = self.attributes.update_attribute(&attribute)?;
            let purged =
                self.values
                    .delete_all_for_attribute(&retyped.entity_type, previous, retyped.id)?;
            Ok((retyped, purged))
        })?;
        info!(
            "event=attribute_retype module=registry status=ok attribute_id={} from={} to={} purged_rows={}",
            retyped.id, previous, backend_type, purged
        );
        Ok(retyped)
    }

    /// Moves a definition to another entity type.
    ///
    /// Memberships in sets of the old entity type are removed and the old
    /// entity type's rows for this attribute are purged.
    pub fn reassign_entity_type(
        &self,
        id: AttributeId,
        entity_type: &str,
    ) -> RepoResult<HydraAttribute> {
        validate_entity_type(entity_type)?;
        let mut attribute = self.load_required(id)?;
        let previous = attribute.entity_type.clone();
        if previous == entity_type {
            return Ok(attribute);
        }
        attribute.entity_type = entity_type.to_string();
        let (moved, purged) = self.in_transaction(|| {
            self.values.ensure_tables(entity_type)?;
            let moved = self.attributes.update_attribute(&attribute)?;
            let purged = self
                .values
                .delete_all_for_attribute(&previous, moved.backend_type, moved.id)?;
            Ok((moved, purged))
        })?;
        info!(
            "event=attribute_reassign module=registry status=ok attribute_id={} from={} to={} purged_rows={}",
            moved.id, previous, moved.entity_type, purged
        );
        Ok(moved)
    }

    /// Replaces the raw default. Entities without a stored row read the new default.
    pub fn change_default(
        &self,
        id: AttributeId,
        default_value: Option<String>,
    ) -> RepoResult<HydraAttribute> {
        let mut attribute = self.load_required(id)?;
        if attribute.default_value == default_value {
            return Ok(attribute);
        }
        attribute.default_value = default_value;
        let updated = self.attributes.update_attribute(&attribute)?;
        info!(
            "event=attribute_default module=registry status=ok attribute_id={} has_default={}",
            updated.id,
            updated.default_value.is_some()
        );
        Ok(updated)
    }

    /// Deletes a definition together with its stored values and memberships.
    pub fn delete(&self, id: AttributeId) -> RepoResult<()> {
        let attribute = self.load_required(id)?;
        let purged = self.in_transaction(|| {
            let purged = self.values.delete_all_for_attribute(
                &attribute.entity_type,
                attribute.backend_type,
                attribute.id,
            )?;
            self.attributes.delete_attribute(id)?;
            Ok(purged)
        })?;
        info!(
            "event=attribute_delete module=registry status=ok attribute_id={} purged_rows={}",
            id, purged
        );
        Ok(())
    }

    pub fn get(&self, id: AttributeId) -> RepoResult<Option<HydraAttribute>> {
        self.attributes.get_attribute(id)
    }

    /// Current definitions of `entity_type`, ordered by id.
    pub fn definitions_for(&self, entity_type: &str) -> RepoResult<Vec<HydraAttribute>> {
        self.attributes.list_attributes(entity_type)
    }

    pub fn resolve(&self, entity_type: &str, name: &str) -> RepoResult<Option<HydraAttribute>> {
        self.attributes.find_attribute(entity_type, name)
    }

    fn in_transaction<T>(&self, work: impl FnOnce() -> RepoResult<T>) -> RepoResult<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = work()?;
        tx.commit()?;
        Ok(value)
    }

    fn load_required(&self, id: AttributeId) -> RepoResult<HydraAttribute> {
        self.attributes
            .get_attribute(id)?
            .ok_or(RepoError::AttributeNotFound(id))
    }
}
