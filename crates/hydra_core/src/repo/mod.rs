//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define data access contracts for the attribute catalog, attribute sets,
//!   per-backend value tables and host entity records.
//! - Keep SQL details out of the association engine and services.
//!
//! # Invariants
//! - Catalog reads always hit storage; nothing here caches definitions.
//! - Repositories are only constructed over fully migrated connections.
//! - Storage failures are returned as `RepoError::Db`, never swallowed.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::schema::table_exists;
use crate::db::DbError;
use crate::model::attribute::{AttributeId, NameValidationError};
use crate::model::entity::EntityId;
use crate::model::set::SetId;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod attribute_repo;
pub mod entity_repo;
pub mod set_repo;
pub mod value_repo;

/// SQL fragment bumping `updated_at` strictly forward, even within one millisecond.
pub(crate) const TOUCH_UPDATED_AT_SQL: &str =
    "updated_at = MAX(updated_at + 1, (strftime('%s', 'now') * 1000))";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by catalog, set, value and entity repositories.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    AttributeNotFound(AttributeId),
    SetNotFound(SetId),
    EntityNotFound(EntityId),
    DuplicateAttribute {
        entity_type: String,
        name: String,
    },
    DuplicateSet {
        entity_type: String,
        name: String,
    },
    InvalidName(NameValidationError),
    /// Membership would link an attribute and a set of different entity types.
    EntityTypeMismatch {
        attribute_id: AttributeId,
        set_id: SetId,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// Value table for an entity type/backend pair has not been created.
    MissingValueTable(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::AttributeNotFound(id) => write!(f, "hydra attribute not found: {id}"),
            Self::SetNotFound(id) => write!(f, "hydra set not found: {id}"),
            Self::EntityNotFound(id) => write!(f, "entity not found: {id}"),
            Self::DuplicateAttribute { entity_type, name } => write!(
                f,
                "hydra attribute `{name}` already exists for entity type `{entity_type}`"
            ),
            Self::DuplicateSet { entity_type, name } => write!(
                f,
                "hydra set `{name}` already exists for entity type `{entity_type}`"
            ),
            Self::InvalidName(err) => write!(f, "{err}"),
            Self::EntityTypeMismatch {
                attribute_id,
                set_id,
            } => write!(
                f,
                "attribute ID {attribute_id} and set ID {set_id} belong to different entity types"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "hydra repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "hydra repository requires table `{table}`")
            }
            Self::MissingValueTable(table) => write!(f, "value table `{table}` does not exist"),
            Self::InvalidData(message) => write!(f, "invalid persisted hydra data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidName(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<NameValidationError> for RepoError {
    fn from(value: NameValidationError) -> Self {
        Self::InvalidName(value)
    }
}

/// Verifies the connection is migrated and carries `tables`.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables.iter().copied() {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}
