//! Domain model for hydra attributes.
//!
//! # Responsibility
//! - Define attribute definitions, attribute sets and host entity records.
//! - Define dynamically typed values and their backend-type casting rules.
//!
//! # Invariants
//! - Definitions and sets are identified by stable integer ids.
//! - Values are always cast through the attribute's current backend type.

pub mod attribute;
pub mod entity;
pub mod set;
pub mod value;
