//! Attribute set model.
//!
//! An attribute set is a named, entity-type scoped whitelist of attribute
//! definitions. Entities bound to a set may only touch its members.

use serde::{Deserialize, Serialize};

/// Stable identifier of an attribute set.
pub type SetId = i64;

/// Attribute set as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydraSet {
    pub id: SetId,
    pub entity_type: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}
