//! Attribute set use-case service.
//!
//! # Responsibility
//! - Provide set CRUD and membership edits for callers.
//!
//! # Invariants
//! - Membership changes are visible to the next accessor check; nothing is
//!   cached between calls.

use crate::model::attribute::AttributeId;
use crate::model::set::{HydraSet, SetId};
use crate::repo::set_repo::SetRepository;
use crate::repo::RepoResult;
use log::info;
use std::collections::BTreeSet;

/// Use-case service over the set catalog and membership index.
pub struct SetService<'a> {
    sets: &'a dyn SetRepository,
}

impl<'a> SetService<'a> {
    pub fn new(sets: &'a dyn SetRepository) -> Self {
        Self { sets }
    }

    pub fn create(&self, entity_type: &str, name: &str) -> RepoResult<HydraSet> {
        let set = self.sets.create_set(entity_type, name)?;
        info!(
            "event=set_create module=sets status=ok set_id={} entity_type={}",
            set.id, set.entity_type
        );
        Ok(set)
    }

    /// Creates a set and adds `attribute_ids` to it.
    pub fn create_with_attributes(
        &self,
        entity_type: &str,
        name: &str,
        attribute_ids: &[AttributeId],
    ) -> RepoResult<HydraSet> {
        let set = self.create(entity_type, name)?;
        for attribute_id in attribute_ids {
            self.sets.add_attribute(set.id, *attribute_id)?;
        }
        Ok(set)
    }

    pub fn rename(&self, id: SetId, name: &str) -> RepoResult<HydraSet> {
        self.sets.rename_set(id, name)
    }

    /// Deletes a set; entities bound to it become unrestricted.
    pub fn delete(&self, id: SetId) -> RepoResult<()> {
        self.sets.delete_set(id)?;
        info!("event=set_delete module=sets status=ok set_id={}", id);
        Ok(())
    }

    pub fn get(&self, id: SetId) -> RepoResult<Option<HydraSet>> {
        self.sets.get_set(id)
    }

    pub fn list(&self, entity_type: &str) -> RepoResult<Vec<HydraSet>> {
        self.sets.list_sets(entity_type)
    }

    pub fn add_attribute(&self, set_id: SetId, attribute_id: AttributeId) -> RepoResult<()> {
        self.sets.add_attribute(set_id, attribute_id)?;
        info!(
            "event=set_member_add module=sets status=ok set_id={} attribute_id={}",
            set_id, attribute_id
        );
        Ok(())
    }

    pub fn remove_attribute(&self, set_id: SetId, attribute_id: AttributeId) -> RepoResult<bool> {
        let removed = self.sets.remove_attribute(set_id, attribute_id)?;
        info!(
            "event=set_member_remove module=sets status=ok set_id={} attribute_id={} removed={}",
            set_id, attribute_id, removed
        );
        Ok(removed)
    }

    /// Attribute ids of `entity_type` that `set_id` allows.
    pub fn attribute_ids(
        &self,
        entity_type: &str,
        set_id: SetId,
    ) -> RepoResult<BTreeSet<AttributeId>> {
        self.sets.allowed_attribute_ids(entity_type, set_id)
    }
}
