//! Host entity lifecycle with hydra attribute hooks.
//!
//! # Responsibility
//! - Save and destroy host records together with their attribute values.
//! - Expose accessor dispatch for one entity.
//!
//! # Invariants
//! - Save and destroy each run in one transaction.
//! - A failed save or destroy leaves the record and cached attribute state
//!   as they were before the call.
//! - A persisted record is only touched when an allowed hydra attribute is
//!   dirty or its set binding changed.

use crate::association::{AssociationResult, AttributeAssociation, ProxyOutput};
use crate::model::entity::{EntityId, EntityRecord};
use crate::model::set::SetId;
use crate::model::value::HydraValue;
use crate::repo::RepoError;
use crate::store::HydraStore;
use log::{info, warn};
use std::collections::BTreeMap;

/// Host record plus its hydra attribute association.
pub struct HydraEntity<'s> {
    store: &'s HydraStore<'s>,
    association: AttributeAssociation<'s, EntityRecord>,
    saved_set_id: Option<SetId>,
}

impl<'s> HydraEntity<'s> {
    pub(crate) fn new(store: &'s HydraStore<'s>, record: EntityRecord) -> Self {
        let saved_set_id = record.hydra_set_id;
        Self {
            store,
            association: store.association(record),
            saved_set_id,
        }
    }

    pub fn id(&self) -> Option<EntityId> {
        self.record().id
    }

    pub fn record(&self) -> &EntityRecord {
        self.association.entity()
    }

    pub fn is_new_record(&self) -> bool {
        self.record().id.is_none()
    }

    pub fn is_destroyed(&self) -> bool {
        self.record().is_destroyed()
    }

    pub fn hydra_set_id(&self) -> Option<SetId> {
        self.record().hydra_set_id
    }

    /// Rebinds the entity to a set; takes effect for the next accessor call.
    pub fn set_hydra_set_id(&mut self, set_id: Option<SetId>) {
        self.association.entity_mut().hydra_set_id = set_id;
    }

    pub fn association(&self) -> &AttributeAssociation<'s, EntityRecord> {
        &self.association
    }

    pub fn association_mut(&mut self) -> &mut AttributeAssociation<'s, EntityRecord> {
        &mut self.association
    }

    pub fn has_proxy_method(&self, method: &str) -> AssociationResult<bool> {
        self.association.has_proxy_method(method)
    }

    pub fn delegate(
        &mut self,
        method: &str,
        args: &[HydraValue],
    ) -> AssociationResult<ProxyOutput> {
        self.association.delegate(method, args)
    }

    pub fn get(&mut self, name: &str) -> AssociationResult<HydraValue> {
        self.association.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<HydraValue>) -> AssociationResult<()> {
        self.association.set(name, value)
    }

    pub fn was(&mut self, name: &str) -> AssociationResult<HydraValue> {
        self.association.was(name)
    }

    pub fn before_type_cast(&mut self, name: &str) -> AssociationResult<HydraValue> {
        self.association.before_type_cast(name)
    }

    pub fn is_present(&mut self, name: &str) -> AssociationResult<bool> {
        self.association.is_present(name)
    }

    pub fn hydra_attributes(&mut self) -> AssociationResult<BTreeMap<String, HydraValue>> {
        self.association.hydra_attributes()
    }

    pub fn hydra_attributes_before_type_cast(
        &mut self,
    ) -> AssociationResult<BTreeMap<String, HydraValue>> {
        self.association.hydra_attributes_before_type_cast()
    }

    pub fn changed_attributes(&mut self) -> AssociationResult<Vec<String>> {
        self.association.changed_attributes()
    }

    /// Assigns several attributes in order, stopping at the first failure.
    pub fn assign_attributes<I, K, V>(&mut self, values: I) -> AssociationResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<HydraValue>,
    {
        for (name, value) in values {
            self.association.set(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// Persists the record and flushes dirty attributes in one transaction.
    pub fn save(&mut self) -> AssociationResult<()> {
        if self.is_destroyed() {
            return Err(RepoError::InvalidData("cannot save a destroyed entity".to_string()).into());
        }
        let checkpoint = self.association.checkpoint();
        let (touched, flushed) = match self.save_in_transaction() {
            Ok(outcome) => outcome,
            Err(err) => {
                self.association.restore(checkpoint);
                warn!(
                    "event=entity_save module=entity status=error entity_type={} error={}",
                    self.record().entity_type,
                    err
                );
                return Err(err);
            }
        };

        self.saved_set_id = self.hydra_set_id();
        info!(
            "event=entity_save module=entity status=ok entity_type={} entity_id={} touched={} flushed={}",
            self.record().entity_type,
            self.id().unwrap_or_default(),
            touched,
            flushed
        );
        Ok(())
    }

    /// Deletes the record and all of its attribute rows in one transaction.
    pub fn destroy(&mut self) -> AssociationResult<()> {
        let Some(id) = self.id() else {
            self.association.reload();
            return Ok(());
        };
        if self.is_destroyed() {
            return Ok(());
        }
        let checkpoint = self.association.checkpoint();
        let removed = match self.destroy_in_transaction(id) {
            Ok(removed) => removed,
            Err(err) => {
                self.association.restore(checkpoint);
                warn!(
                    "event=entity_destroy module=entity status=error entity_id={} error={}",
                    id, err
                );
                return Err(err);
            }
        };

        self.association.entity_mut().mark_destroyed();
        info!(
            "event=entity_destroy module=entity status=ok entity_type={} entity_id={} removed_rows={}",
            self.record().entity_type,
            id,
            removed
        );
        Ok(())
    }

    // Record and cached state are updated in place; callers restore them on error.
    fn save_in_transaction(&mut self) -> AssociationResult<(bool, usize)> {
        let store = self.store;
        let tx = store
            .connection()
            .unchecked_transaction()
            .map_err(RepoError::from)?;
        let entities = store.entity_repository();

        let touched = if self.is_new_record() {
            let inserted = entities.insert_entity(self.record())?;
            *self.association.entity_mut() = inserted;
            true
        } else if self.association.before_save()? || self.hydra_set_id() != self.saved_set_id {
            let updated = entities.update_entity(self.record())?;
            *self.association.entity_mut() = updated;
            true
        } else {
            false
        };
        let flushed = self.association.after_save()?;
        tx.commit().map_err(RepoError::from)?;
        Ok((touched, flushed))
    }

    fn destroy_in_transaction(&mut self, id: EntityId) -> AssociationResult<usize> {
        let store = self.store;
        let tx = store
            .connection()
            .unchecked_transaction()
            .map_err(RepoError::from)?;
        store.entity_repository().delete_entity(id)?;
        let removed = self.association.after_destroy()?;
        tx.commit().map_err(RepoError::from)?;
        Ok(removed)
    }

    /// Re-reads the record and drops cached attribute state.
    pub fn reload(&mut self) -> AssociationResult<()> {
        if let Some(id) = self.id() {
            let record = self
                .store
                .entity_repository()
                .get_entity(id)?
                .ok_or(RepoError::EntityNotFound(id))?;
            self.saved_set_id = record.hydra_set_id;
            *self.association.entity_mut() = record;
        }
        self.association.reload();
        Ok(())
    }
}
