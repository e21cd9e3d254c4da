//! Per-entity-type value tables.
//!
//! # Responsibility
//! - Create one value table per backend type for an entity type.
//! - Answer table existence checks for repositories.
//!
//! # Invariants
//! - Every value table has shape `(entity_id, hydra_attribute_id, value)`
//!   with `(entity_id, hydra_attribute_id)` unique.
//! - Table names come from `HydraConfig::value_table_name` and are quoted.

use crate::config::HydraConfig;
use crate::db::{DbError, DbResult};
use crate::model::attribute::BackendType;
use log::debug;
use rusqlite::Connection;

/// Creates any missing value tables for `entity_type`.
///
/// Idempotent; existing tables and rows are left untouched.
pub fn ensure_value_tables(
    conn: &Connection,
    config: &HydraConfig,
    entity_type: &str,
) -> DbResult<()> {
    for backend in BackendType::ALL {
        let table = config
            .value_table_name(entity_type, backend)
            .map_err(|_| DbError::UnsafeIdentifier(entity_type.to_string()))?;
        conn.execute_batch(&value_table_ddl(&table, backend))?;
    }
    debug!(
        "event=value_tables_ensure module=db status=ok entity_type={}",
        entity_type
    );
    Ok(())
}

/// Returns whether a table named `table` exists.
pub fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn value_table_ddl(table: &str, backend: BackendType) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{table}\" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_id INTEGER NOT NULL,
            hydra_attribute_id INTEGER NOT NULL,
            value {sql_type},
            created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000),
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000),
            UNIQUE (entity_id, hydra_attribute_id)
        );
        CREATE INDEX IF NOT EXISTS \"idx_{table}_attribute\"
            ON \"{table}\" (hydra_attribute_id);",
        sql_type = backend.sql_type()
    )
}
