//! Per-backend value store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Load attribute values for one entity in batches grouped by backend type.
//! - Persist values with default omission: rows exist only for values that
//!   differ from the attribute default.
//! - Remove an entity's or an attribute's rows across value tables.
//!
//! # Invariants
//! - `load_many` issues at most one query per backend type.
//! - A stored NULL is a real row and loads as `HydraValue::Null`.
//! - Deleting from a value table that does not exist is a no-op.

use crate::config::HydraConfig;
use crate::db::schema::{ensure_value_tables, table_exists};
use crate::model::attribute::{AttributeId, BackendType, HydraAttribute};
use crate::model::entity::EntityId;
use crate::model::value::{HydraValue, DATETIME_FORMAT};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use log::debug;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use std::collections::{BTreeMap, HashMap};

/// Outcome of a default-omitting write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueWrite {
    /// Value differs from the default; the row was inserted or updated.
    Upserted,
    /// Value equals the default; any existing row was removed.
    Deleted,
}

/// Storage contract for attribute values.
pub trait ValueStore {
    /// Creates missing value tables for `entity_type`.
    fn ensure_tables(&self, entity_type: &str) -> RepoResult<()>;
    /// Loads stored values for `entity_id`, one query per backend type.
    ///
    /// Attributes without a row are absent from the returned map.
    fn load_many(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        attribute_ids: &BTreeMap<BackendType, Vec<AttributeId>>,
    ) -> RepoResult<HashMap<AttributeId, HydraValue>>;
    /// Upserts `value`, or deletes the row when it equals the attribute default.
    fn save_or_delete(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        attribute: &HydraAttribute,
        value: &HydraValue,
    ) -> RepoResult<ValueWrite>;
    /// Deletes every row of `entity_id` across all value tables of `entity_type`.
    fn delete_all_for_entity(&self, entity_type: &str, entity_id: EntityId) -> RepoResult<usize>;
    /// Deletes every row of one attribute from one value table.
    fn delete_all_for_attribute(
        &self,
        entity_type: &str,
        backend: BackendType,
        attribute_id: AttributeId,
    ) -> RepoResult<usize>;
}

/// SQLite-backed value store.
pub struct SqliteValueStore<'conn> {
    conn: &'conn Connection,
    config: HydraConfig,
}

impl<'conn> SqliteValueStore<'conn> {
    /// Creates a store over a migrated connection.
    pub fn try_new(conn: &'conn Connection, config: &HydraConfig) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["hydra_attributes"])?;
        config
            .validate()
            .map_err(|err| RepoError::InvalidData(err.to_string()))?;
        Ok(Self {
            conn,
            config: config.clone(),
        })
    }

    fn table_name(&self, entity_type: &str, backend: BackendType) -> RepoResult<String> {
        Ok(self.config.value_table_name(entity_type, backend)?)
    }
}

impl ValueStore for SqliteValueStore<'_> {
    fn ensure_tables(&self, entity_type: &str) -> RepoResult<()> {
        ensure_value_tables(self.conn, &self.config, entity_type)?;
        Ok(())
    }

    fn load_many(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        attribute_ids: &BTreeMap<BackendType, Vec<AttributeId>>,
    ) -> RepoResult<HashMap<AttributeId, HydraValue>> {
        let mut values = HashMap::new();
        let mut queries = 0_usize;

        for (backend, ids) in attribute_ids {
            if ids.is_empty() {
                continue;
            }
            let table = self.table_name(entity_type, *backend)?;
            if !table_exists(self.conn, &table)? {
                continue;
            }

            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!(
                "SELECT hydra_attribute_id, value
                 FROM \"{table}\"
                 WHERE entity_id = ?
                   AND hydra_attribute_id IN ({placeholders});"
            );
            let mut bind_values: Vec<Value> = Vec::with_capacity(ids.len() + 1);
            bind_values.push(Value::Integer(entity_id));
            bind_values.extend(ids.iter().map(|id| Value::Integer(*id)));

            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values))?;
            queries += 1;
            while let Some(row) = rows.next()? {
                let attribute_id: AttributeId = row.get(0)?;
                let value = decode_value(*backend, row.get_ref(1)?, &table)?;
                values.insert(attribute_id, value);
            }
        }

        debug!(
            "event=values_load module=value_store status=ok entity_type={} entity_id={} queries={} rows={}",
            entity_type,
            entity_id,
            queries,
            values.len()
        );
        Ok(values)
    }

    fn save_or_delete(
        &self,
        entity_type: &str,
        entity_id: EntityId,
        attribute: &HydraAttribute,
        value: &HydraValue,
    ) -> RepoResult<ValueWrite> {
        let backend = attribute.backend_type;
        let table = self.table_name(entity_type, backend)?;
        let value = value.cast(backend);

        if value.same_as(&attribute.default_cast(), backend) {
            if table_exists(self.conn, &table)? {
                self.conn.execute(
                    &format!(
                        "DELETE FROM \"{table}\" WHERE entity_id = ?1 AND hydra_attribute_id = ?2;"
                    ),
                    params![entity_id, attribute.id],
                )?;
            }
            debug!(
                "event=value_write module=value_store status=ok action=delete table={} entity_id={} attribute_id={}",
                table, entity_id, attribute.id
            );
            return Ok(ValueWrite::Deleted);
        }

        if !table_exists(self.conn, &table)? {
            return Err(RepoError::MissingValueTable(table));
        }
        self.conn.execute(
            &format!(
                "INSERT INTO \"{table}\" (entity_id, hydra_attribute_id, value)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (entity_id, hydra_attribute_id) DO UPDATE SET
                    value = excluded.value,
                    updated_at = (strftime('%s', 'now') * 1000);"
            ),
            params![entity_id, attribute.id, encode_value(&value)],
        )?;
        debug!(
            "event=value_write module=value_store status=ok action=upsert table={} entity_id={} attribute_id={}",
            table, entity_id, attribute.id
        );
        Ok(ValueWrite::Upserted)
    }

    fn delete_all_for_entity(&self, entity_type: &str, entity_id: EntityId) -> RepoResult<usize> {
        let mut removed = 0;
        for backend in BackendType::ALL {
            let table = self.table_name(entity_type, backend)?;
            if !table_exists(self.conn, &table)? {
                continue;
            }
            removed += self.conn.execute(
                &format!("DELETE FROM \"{table}\" WHERE entity_id = ?1;"),
                [entity_id],
            )?;
        }
        debug!(
            "event=values_delete module=value_store status=ok scope=entity entity_type={} entity_id={} rows={}",
            entity_type, entity_id, removed
        );
        Ok(removed)
    }

    fn delete_all_for_attribute(
        &self,
        entity_type: &str,
        backend: BackendType,
        attribute_id: AttributeId,
    ) -> RepoResult<usize> {
        let table = self.table_name(entity_type, backend)?;
        if !table_exists(self.conn, &table)? {
            return Ok(0);
        }
        let removed = self.conn.execute(
            &format!("DELETE FROM \"{table}\" WHERE hydra_attribute_id = ?1;"),
            [attribute_id],
        )?;
        debug!(
            "event=values_delete module=value_store status=ok scope=attribute table={} attribute_id={} rows={}",
            table, attribute_id, removed
        );
        Ok(removed)
    }
}

fn encode_value(value: &HydraValue) -> Value {
    match value {
        HydraValue::Null => Value::Null,
        HydraValue::String(text) => Value::Text(text.clone()),
        HydraValue::Integer(number) => Value::Integer(*number),
        HydraValue::Float(number) => Value::Real(*number),
        HydraValue::Decimal(number) => Value::Text(number.normalize().to_string()),
        HydraValue::Boolean(flag) => Value::Integer(i64::from(*flag)),
        HydraValue::DateTime(datetime) => {
            Value::Text(datetime.format(DATETIME_FORMAT).to_string())
        }
    }
}

fn decode_value(backend: BackendType, raw: ValueRef<'_>, table: &str) -> RepoResult<HydraValue> {
    let value = match raw {
        ValueRef::Null => HydraValue::Null,
        ValueRef::Integer(number) => HydraValue::Integer(number),
        ValueRef::Real(number) => HydraValue::Float(number),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|_| {
                RepoError::InvalidData(format!("non UTF-8 text in {table}.value"))
            })?;
            HydraValue::String(text.to_string())
        }
        ValueRef::Blob(_) => {
            return Err(RepoError::InvalidData(format!(
                "unexpected blob in {table}.value"
            )));
        }
    };
    Ok(value.cast(backend))
}
