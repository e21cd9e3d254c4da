//! Runtime configuration for hydra attribute storage.
//!
//! # Responsibility
//! - Hold storage knobs (value table prefix, SQLite busy timeout).
//! - Load configuration from JSON documents.
//! - Derive value table names from entity types and backend types.
//!
//! # Invariants
//! - `table_prefix` is a lowercase SQL identifier.
//! - Value table names are `<prefix>_<backend>_<tableized entity type>`.

use crate::model::attribute::{validate_entity_type, BackendType, NameValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

const DEFAULT_TABLE_PREFIX: &str = "hydra";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

static TABLE_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid table prefix regex"));

/// Configuration loading/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Storage configuration shared by the value store and schema helpers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydraConfig {
    /// Leading segment of every value table name.
    pub table_prefix: String,
    /// SQLite busy timeout applied when opening connections.
    pub busy_timeout_ms: u64,
}

impl Default for HydraConfig {
    fn default() -> Self {
        Self {
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl HydraConfig {
    /// Parses and validates a JSON config document. Missing keys use defaults.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let config: HydraConfig = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !TABLE_PREFIX_RE.is_match(&self.table_prefix) {
            return Err(ConfigError::Invalid(format!(
                "table_prefix `{}` must match [a-z][a-z0-9_]*",
                self.table_prefix
            )));
        }
        Ok(())
    }

    /// Name of the value table holding `backend` values for `entity_type`.
    ///
    /// `Product` + `string` -> `hydra_string_products`.
    pub fn value_table_name(
        &self,
        entity_type: &str,
        backend: BackendType,
    ) -> Result<String, NameValidationError> {
        validate_entity_type(entity_type)?;
        Ok(format!(
            "{}_{}_{}",
            self.table_prefix,
            backend.as_str(),
            tableize(entity_type)
        ))
    }
}

/// Converts an entity type name into a pluralized snake_case table segment.
pub fn tableize(entity_type: &str) -> String {
    let mut snake = String::with_capacity(entity_type.len() + 4);
    let mut previous_lower = false;
    for ch in entity_type.chars() {
        if ch.is_ascii_uppercase() {
            if previous_lower {
                snake.push('_');
            }
            snake.push(ch.to_ascii_lowercase());
            previous_lower = false;
        } else {
            snake.push(ch);
            previous_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    pluralize(&snake)
}

fn pluralize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) && !stem.is_empty() {
            return format!("{stem}ies");
        }
    }
    if ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| word.ends_with(suffix))
    {
        return format!("{word}es");
    }
    format!("{word}s")
}
