//! Storage facade wiring SQLite repositories into services and entities.
//!
//! # Responsibility
//! - Build every repository over one migrated connection.
//! - Hand out registry/set services, associations and host entities.

use crate::association::AttributeAssociation;
use crate::config::HydraConfig;
use crate::model::entity::{EntityId, EntityRecord, HostEntity};
use crate::repo::attribute_repo::SqliteAttributeRepository;
use crate::repo::entity_repo::{EntityRepository, SqliteEntityRepository};
use crate::repo::set_repo::SqliteSetRepository;
use crate::repo::value_repo::{SqliteValueStore, ValueStore};
use crate::repo::RepoResult;
use crate::service::attribute_service::AttributeService;
use crate::service::entity_service::HydraEntity;
use crate::service::set_service::SetService;
use log::info;
use rusqlite::Connection;

/// Repository bundle over one SQLite connection.
pub struct HydraStore<'conn> {
    conn: &'conn Connection,
    config: HydraConfig,
    attributes: SqliteAttributeRepository<'conn>,
    sets: SqliteSetRepository<'conn>,
    values: SqliteValueStore<'conn>,
    entities: SqliteEntityRepository<'conn>,
}

impl<'conn> HydraStore<'conn> {
    /// Wires repositories over a migrated connection.
    ///
    /// # Errors
    /// - `RepoError::UninitializedConnection` when migrations were not applied.
    /// - `RepoError::InvalidData` when `config` does not validate.
    pub fn try_new(conn: &'conn Connection, config: &HydraConfig) -> RepoResult<Self> {
        let store = Self {
            conn,
            config: config.clone(),
            attributes: SqliteAttributeRepository::try_new(conn)?,
            sets: SqliteSetRepository::try_new(conn)?,
            values: SqliteValueStore::try_new(conn, config)?,
            entities: SqliteEntityRepository::try_new(conn)?,
        };
        info!(
            "event=store_open module=store status=ok table_prefix={}",
            store.config.table_prefix
        );
        Ok(store)
    }

    pub fn config(&self) -> &HydraConfig {
        &self.config
    }

    pub(crate) fn connection(&self) -> &'conn Connection {
        self.conn
    }

    pub(crate) fn entity_repository(&self) -> &dyn EntityRepository {
        &self.entities
    }

    pub fn attribute_service(&self) -> AttributeService<'_> {
        AttributeService::new(self.conn, &self.attributes, &self.values)
    }

    pub fn set_service(&self) -> SetService<'_> {
        SetService::new(&self.sets)
    }

    /// Attaches hydra attribute state to any host entity.
    pub fn association<E: HostEntity>(&self, entity: E) -> AttributeAssociation<'_, E> {
        AttributeAssociation::new(entity, &self.attributes, &self.sets, &self.values)
    }

    /// Creates value tables for `entity_type` ahead of its first attribute.
    pub fn ensure_entity_tables(&self, entity_type: &str) -> RepoResult<()> {
        self.values.ensure_tables(entity_type)
    }

    /// Starts an unsaved entity of `entity_type`.
    pub fn new_entity(&self, entity_type: &str) -> HydraEntity<'_> {
        HydraEntity::new(self, EntityRecord::new(entity_type))
    }

    /// Loads a persisted entity. Attribute values hydrate on first access.
    pub fn find_entity(&self, id: EntityId) -> RepoResult<Option<HydraEntity<'_>>> {
        Ok(self
            .entities
            .get_entity(id)?
            .map(|record| HydraEntity::new(self, record)))
    }
}
