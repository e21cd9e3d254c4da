//! Hydra attribute definition model.
//!
//! # Responsibility
//! - Define the attribute catalogue record and its backend type.
//! - Validate attribute and entity type names before they reach storage.
//!
//! # Invariants
//! - `(entity_type, name)` identifies at most one live definition.
//! - Attribute names never end in an accessor suffix, so every accessor
//!   method name parses to exactly one attribute.
//! - Entity type names are safe to embed in value table names.

use crate::model::value::HydraValue;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable identifier of a hydra attribute definition.
pub type AttributeId = i64;

static ATTRIBUTE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid attribute name regex"));
static ENTITY_TYPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid entity type regex"));

/// Accessor suffixes that attribute names may not end with.
pub(crate) const RESERVED_NAME_SUFFIXES: [&str; 2] = ["_was", "_before_type_cast"];

/// Physical storage bucket for attribute values.
///
/// Each backend type owns one value table per entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    String,
    Text,
    Integer,
    Float,
    Decimal,
    Boolean,
    Datetime,
}

impl BackendType {
    /// Every backend type, in table creation order.
    pub const ALL: [BackendType; 7] = [
        BackendType::String,
        BackendType::Text,
        BackendType::Integer,
        BackendType::Float,
        BackendType::Decimal,
        BackendType::Boolean,
        BackendType::Datetime,
    ];

    /// Name used in the catalog and in value table names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Datetime => "datetime",
        }
    }

    /// Parses the catalog representation.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|backend| backend.as_str() == value)
    }

    /// SQLite column affinity for the `value` column.
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::String | Self::Text | Self::Datetime | Self::Decimal => "TEXT",
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Float => "REAL",
        }
    }
}

impl Display for BackendType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute definition as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydraAttribute {
    pub id: AttributeId,
    /// Logical entity type the attribute applies to, e.g. `Product`.
    pub entity_type: String,
    pub name: String,
    pub backend_type: BackendType,
    /// Raw default; cast through `backend_type` when read.
    pub default_value: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl HydraAttribute {
    /// Default value exactly as stored, before casting.
    pub fn default_raw(&self) -> HydraValue {
        match &self.default_value {
            Some(value) => HydraValue::String(value.clone()),
            None => HydraValue::Null,
        }
    }

    /// Default value cast to the backend's native representation.
    pub fn default_cast(&self) -> HydraValue {
        self.default_raw().cast(self.backend_type)
    }
}

/// Input for creating a new attribute definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttribute {
    pub entity_type: String,
    pub name: String,
    pub backend_type: BackendType,
    pub default_value: Option<String>,
}

impl NewAttribute {
    pub fn new(
        entity_type: impl Into<String>,
        name: impl Into<String>,
        backend_type: BackendType,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            name: name.into(),
            backend_type,
            default_value: None,
        }
    }

    /// Sets the default value.
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    /// Validates names before persistence.
    pub fn validate(&self) -> Result<(), NameValidationError> {
        validate_entity_type(&self.entity_type)?;
        validate_attribute_name(&self.name)
    }
}

/// Name rule violations for attributes and entity types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameValidationError {
    InvalidAttributeName(String),
    ReservedSuffix { name: String, suffix: &'static str },
    InvalidEntityType(String),
}

impl Display for NameValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAttributeName(name) => write!(f, "invalid attribute name `{name}`"),
            Self::ReservedSuffix { name, suffix } => {
                write!(f, "attribute name `{name}` ends with reserved suffix `{suffix}`")
            }
            Self::InvalidEntityType(value) => write!(f, "invalid entity type `{value}`"),
        }
    }
}

impl Error for NameValidationError {}

/// Checks that `name` can be used as an attribute accessor base name.
pub fn validate_attribute_name(name: &str) -> Result<(), NameValidationError> {
    if !ATTRIBUTE_NAME_RE.is_match(name) {
        return Err(NameValidationError::InvalidAttributeName(name.to_string()));
    }
    if let Some(suffix) = RESERVED_NAME_SUFFIXES
        .into_iter()
        .find(|suffix| name.ends_with(suffix))
    {
        return Err(NameValidationError::ReservedSuffix {
            name: name.to_string(),
            suffix,
        });
    }
    Ok(())
}

/// Checks that `entity_type` is safe to embed in a table name.
pub fn validate_entity_type(entity_type: &str) -> Result<(), NameValidationError> {
    if ENTITY_TYPE_RE.is_match(entity_type) {
        Ok(())
    } else {
        Err(NameValidationError::InvalidEntityType(
            entity_type.to_string(),
        ))
    }
}
