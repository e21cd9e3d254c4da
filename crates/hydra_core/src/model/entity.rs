//! Host entity contract and the bundled host record.
//!
//! # Responsibility
//! - Describe what the attribute layer needs from the entity it decorates.
//! - Provide a minimal host record backed by the `entities` table.
//!
//! # Invariants
//! - An entity is persisted once it has an id and has not been destroyed.
//! - `entity_type` never changes for a record's lifetime.

use crate::model::set::SetId;
use serde::{Deserialize, Serialize};

/// Stable identifier of a host entity row.
pub type EntityId = i64;

/// What the attribute layer reads from its host entity.
pub trait HostEntity {
    /// Row id, `None` until the host record is first saved.
    fn entity_id(&self) -> Option<EntityId>;
    /// Logical entity type name, e.g. `Product`.
    fn entity_type(&self) -> &str;
    fn is_persisted(&self) -> bool;
    /// Attribute set restricting this entity, if any.
    fn hydra_set_id(&self) -> Option<SetId>;
}

/// Host record stored in the `entities` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: Option<EntityId>,
    pub entity_type: String,
    pub hydra_set_id: Option<SetId>,
    /// Epoch milliseconds, `None` before the first save.
    pub created_at: Option<i64>,
    /// Epoch milliseconds, bumped whenever the record is touched.
    pub updated_at: Option<i64>,
    #[serde(skip)]
    destroyed: bool,
}

impl EntityRecord {
    /// Creates an unsaved record of `entity_type`.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            id: None,
            entity_type: entity_type.into(),
            hydra_set_id: None,
            created_at: None,
            updated_at: None,
            destroyed: false,
        }
    }

    /// Binds the record to an attribute set.
    pub fn with_hydra_set(mut self, set_id: SetId) -> Self {
        self.hydra_set_id = Some(set_id);
        self
    }

    /// Marks the record as removed from storage. The id is kept for reference.
    pub fn mark_destroyed(&mut self) {
        self.destroyed = true;
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl HostEntity for EntityRecord {
    fn entity_id(&self) -> Option<EntityId> {
        self.id
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn is_persisted(&self) -> bool {
        self.id.is_some() && !self.destroyed
    }

    fn hydra_set_id(&self) -> Option<SetId> {
        self.hydra_set_id
    }
}
