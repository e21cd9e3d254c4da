//! Catalog schema steps.
//!
//! # Responsibility
//! - List the catalog schema steps: attribute registry and sets, then host
//!   entity records.
//! - Bring a connection up to the latest step in one transaction.
//!
//! # Invariants
//! - Step versions start at 1 and grow by exactly one.
//! - The last applied step is mirrored to `PRAGMA user_version`.
//! - Per-entity value tables are created on demand by `db::schema`, never
//!   by a catalog step.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct CatalogStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const CATALOG_STEPS: &[CatalogStep] = &[
    CatalogStep {
        version: 1,
        name: "attribute_registry",
        sql: include_str!("0001_init.sql"),
    },
    CatalogStep {
        version: 2,
        name: "host_entities",
        sql: include_str!("0002_entities.sql"),
    },
];

/// Catalog version this build writes and understands.
pub fn latest_version() -> u32 {
    CATALOG_STEPS.last().map_or(0, |step| step.version)
}

/// Applies every catalog step newer than the connection's version.
///
/// Returns the number of steps applied; zero when already current.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the database was written by a newer build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    let from_version = current_user_version(conn)?;
    let latest = latest_version();
    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let pending: Vec<&CatalogStep> = CATALOG_STEPS
        .iter()
        .filter(|step| step.version > from_version)
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        debug!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} steps={}",
        from_version,
        latest,
        pending.len()
    );
    Ok(pending.len())
}

/// Catalog version recorded on the connection.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, current_user_version, latest_version, CATALOG_STEPS};
    use rusqlite::Connection;

    #[test]
    fn step_versions_are_contiguous_from_one() {
        for (index, step) in CATALOG_STEPS.iter().enumerate() {
            assert_eq!(step.version as usize, index + 1, "step {}", step.name);
        }
        assert_eq!(latest_version() as usize, CATALOG_STEPS.len());
    }

    #[test]
    fn apply_runs_pending_steps_once() {
        let mut conn = Connection::open_in_memory().expect("in-memory db should open");
        assert_eq!(current_user_version(&conn).expect("version"), 0);

        let applied = apply_migrations(&mut conn).expect("first apply");
        assert_eq!(applied, CATALOG_STEPS.len());
        assert_eq!(current_user_version(&conn).expect("version"), latest_version());

        assert_eq!(apply_migrations(&mut conn).expect("second apply"), 0);
    }

    #[test]
    fn apply_resumes_from_recorded_version() {
        let mut conn = Connection::open_in_memory().expect("in-memory db should open");
        conn.execute_batch(CATALOG_STEPS[0].sql)
            .expect("first step should apply");
        conn.pragma_update(None, "user_version", 1)
            .expect("version should be recorded");

        assert_eq!(apply_migrations(&mut conn).expect("resume"), CATALOG_STEPS.len() - 1);
        assert_eq!(current_user_version(&conn).expect("version"), latest_version());
    }
}
