//! Runtime-defined entity attributes over SQLite.
//!
//! Attributes are registered per entity type at runtime, stored
//! entity-attribute-value style in one table per backend type, optionally
//! restricted per entity through attribute sets, and accessed through
//! dynamic accessor methods (`price`, `price=`, `price_was`, ...).

pub mod association;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use association::{
    AssociationError, AssociationResult, AttributeAssociation, ProxyMethod, ProxyOperation,
    ProxyOutput,
};
pub use config::{ConfigError, HydraConfig};
pub use db::{open_db, open_db_in_memory, open_db_with_config, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::attribute::{
    AttributeId, BackendType, HydraAttribute, NameValidationError, NewAttribute,
};
pub use model::entity::{EntityId, EntityRecord, HostEntity};
pub use model::set::{HydraSet, SetId};
pub use model::value::HydraValue;
pub use repo::{RepoError, RepoResult};
pub use rust_decimal::Decimal;
pub use service::attribute_service::AttributeService;
pub use service::entity_service::HydraEntity;
pub use service::set_service::SetService;
pub use store::HydraStore;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
