//! Hydra attribute values and backend-type casting.
//!
//! # Responsibility
//! - Represent both raw accessor input and cast attribute values.
//! - Cast raw input into a backend type's native representation.
//! - Provide backend-aware equality and presence rules.
//!
//! # Invariants
//! - `cast` is total: input that cannot be represented becomes `Null`.
//! - `cast` is idempotent for a fixed backend type.
//! - `Null` casts to `Null` for every backend type.

use crate::model::attribute::BackendType;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Canonical datetime text layout used in value tables.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const DATETIME_PARSE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];
const FALSE_WORDS: [&str; 6] = ["0", "f", "false", "n", "no", "off"];
// 2^63; truncated floats must land in [-2^63, 2^63).
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Dynamically typed attribute value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum HydraValue {
    #[default]
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl HydraValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Converts this value into `backend`'s native representation.
    pub fn cast(&self, backend: BackendType) -> HydraValue {
        if self.is_null() {
            return Self::Null;
        }
        match backend {
            BackendType::String | BackendType::Text => self.cast_string(),
            BackendType::Integer => self.cast_integer(),
            BackendType::Float => self.cast_float(),
            BackendType::Decimal => self.cast_decimal(),
            BackendType::Boolean => self.cast_boolean(),
            BackendType::Datetime => self.cast_datetime(),
        }
    }

    /// Compares two values after casting both through `backend`.
    pub fn same_as(&self, other: &HydraValue, backend: BackendType) -> bool {
        self.cast(backend) == other.cast(backend)
    }

    /// Presence rule used by `N?` accessors.
    ///
    /// Blank strings and numeric zero are absent, booleans are themselves.
    pub fn is_present(&self) -> bool {
        match self {
            Self::Null => false,
            Self::String(value) => !value.trim().is_empty(),
            Self::Integer(value) => *value != 0,
            Self::Float(value) => *value != 0.0,
            Self::Decimal(value) => !value.is_zero(),
            Self::Boolean(value) => *value,
            Self::DateTime(_) => true,
        }
    }

    fn cast_string(&self) -> HydraValue {
        match self {
            Self::String(value) => Self::String(value.clone()),
            Self::DateTime(value) => Self::String(value.format(DATETIME_FORMAT).to_string()),
            other => Self::String(other.to_string()),
        }
    }

    fn cast_integer(&self) -> HydraValue {
        match self {
            Self::Integer(value) => Self::Integer(*value),
            Self::Float(value) => truncate_float(*value),
            Self::Decimal(value) => value.trunc().to_i64().map_or(Self::Null, Self::Integer),
            Self::Boolean(value) => Self::Integer(i64::from(*value)),
            Self::String(value) => {
                let trimmed = value.trim();
                match trimmed.parse::<i64>() {
                    Ok(parsed) => Self::Integer(parsed),
                    Err(_) => trimmed
                        .parse::<f64>()
                        .map(truncate_float)
                        .unwrap_or(Self::Null),
                }
            }
            Self::DateTime(value) => Self::Integer(value.and_utc().timestamp()),
            Self::Null => Self::Null,
        }
    }

    fn cast_float(&self) -> HydraValue {
        match self {
            Self::Float(value) if value.is_finite() => Self::Float(*value),
            Self::Float(_) => Self::Null,
            Self::Integer(value) => Self::Float(*value as f64),
            Self::Decimal(value) => value.to_f64().map_or(Self::Null, Self::Float),
            Self::Boolean(value) => Self::Float(if *value { 1.0 } else { 0.0 }),
            Self::String(value) => match value.trim().parse::<f64>() {
                Ok(parsed) if parsed.is_finite() => Self::Float(parsed),
                _ => Self::Null,
            },
            Self::DateTime(_) | Self::Null => Self::Null,
        }
    }

    fn cast_decimal(&self) -> HydraValue {
        match self {
            Self::Decimal(value) => Self::Decimal(*value),
            Self::Integer(value) => Self::Decimal(Decimal::from(*value)),
            // Shortest round-trip text keeps `2.5` as 2.5 rather than its binary expansion.
            Self::Float(value) if value.is_finite() => parse_decimal(&value.to_string()),
            Self::Float(_) => Self::Null,
            Self::Boolean(value) => Self::Decimal(Decimal::from(i64::from(*value))),
            Self::String(value) => parse_decimal(value.trim()),
            Self::DateTime(_) | Self::Null => Self::Null,
        }
    }

    fn cast_boolean(&self) -> HydraValue {
        match self {
            Self::Boolean(value) => Self::Boolean(*value),
            Self::Integer(value) => Self::Boolean(*value != 0),
            Self::Float(value) => Self::Boolean(*value != 0.0),
            Self::Decimal(value) => Self::Boolean(!value.is_zero()),
            Self::String(value) => {
                let normalized = value.trim().to_ascii_lowercase();
                if normalized.is_empty() {
                    Self::Null
                } else if FALSE_WORDS.contains(&normalized.as_str()) {
                    Self::Boolean(false)
                } else {
                    // Anything non-blank outside the false list reads as set.
                    Self::Boolean(true)
                }
            }
            Self::DateTime(_) => Self::Boolean(true),
            Self::Null => Self::Null,
        }
    }

    fn cast_datetime(&self) -> HydraValue {
        match self {
            Self::DateTime(value) => Self::DateTime(*value),
            Self::String(value) => parse_datetime(value.trim())
                .map(Self::DateTime)
                .unwrap_or(Self::Null),
            Self::Integer(value) => DateTime::from_timestamp(*value, 0)
                .map(|datetime| Self::DateTime(datetime.naive_utc()))
                .unwrap_or(Self::Null),
            Self::Float(_) | Self::Decimal(_) | Self::Boolean(_) | Self::Null => Self::Null,
        }
    }
}

impl Display for HydraValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::String(value) => f.write_str(value),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Decimal(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::DateTime(value) => write!(f, "{}", value.format(DATETIME_FORMAT)),
        }
    }
}

impl From<&str> for HydraValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for HydraValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for HydraValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for HydraValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for HydraValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Decimal> for HydraValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<bool> for HydraValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<NaiveDateTime> for HydraValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl<T: Into<HydraValue>> From<Option<T>> for HydraValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Parses the datetime layouts accepted by datetime attributes.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    DATETIME_PARSE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn truncate_float(value: f64) -> HydraValue {
    let truncated = value.trunc();
    if (-I64_BOUND..I64_BOUND).contains(&truncated) {
        HydraValue::Integer(truncated as i64)
    } else {
        HydraValue::Null
    }
}

fn parse_decimal(value: &str) -> HydraValue {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_or(HydraValue::Null, HydraValue::Decimal)
}

#[cfg(test)]
mod tests {
    use super::{parse_datetime, HydraValue};
    use crate::model::attribute::BackendType;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn decimal(value: &str) -> HydraValue {
        HydraValue::Decimal(Decimal::from_str(value).expect("decimal literal"))
    }

    #[test]
    fn numeric_strings_cast_to_numbers() {
        let raw = HydraValue::from("123456.1234");
        assert_eq!(raw.cast(BackendType::Decimal), decimal("123456.1234"));
        assert_eq!(raw.cast(BackendType::Float), HydraValue::Float(123456.1234));
        assert_eq!(raw.cast(BackendType::Integer), HydraValue::Integer(123456));
        assert_eq!(
            HydraValue::from(" 42 ").cast(BackendType::Integer),
            HydraValue::Integer(42)
        );
        assert_eq!(
            HydraValue::from("abc").cast(BackendType::Float),
            HydraValue::Null
        );
    }

    #[test]
    fn blank_strings_cast_to_null_for_non_text_backends() {
        for backend in [
            BackendType::Integer,
            BackendType::Decimal,
            BackendType::Boolean,
            BackendType::Datetime,
        ] {
            assert_eq!(HydraValue::from("  ").cast(backend), HydraValue::Null);
        }
        assert_eq!(
            HydraValue::from("").cast(BackendType::String),
            HydraValue::String(String::new())
        );
    }

    #[test]
    fn boolean_words_follow_false_list() {
        assert_eq!(
            HydraValue::from("No").cast(BackendType::Boolean),
            HydraValue::Boolean(false)
        );
        assert_eq!(
            HydraValue::from("yes").cast(BackendType::Boolean),
            HydraValue::Boolean(true)
        );
        assert_eq!(
            HydraValue::from("anything").cast(BackendType::Boolean),
            HydraValue::Boolean(true)
        );
        assert_eq!(
            HydraValue::Integer(0).cast(BackendType::Boolean),
            HydraValue::Boolean(false)
        );
    }

    #[test]
    fn datetime_accepts_short_layouts() {
        let expected = parse_datetime("2013-12-04 00:00:00").expect("full layout should parse");
        assert_eq!(parse_datetime("2013-12-04 00:00"), Some(expected));
        assert_eq!(parse_datetime("2013-12-04"), Some(expected));
        assert_eq!(parse_datetime("2013-12-04T00:00:00"), Some(expected));
        assert_eq!(parse_datetime("yesterday"), None);
    }

    #[test]
    fn datetime_renders_back_to_canonical_text() {
        let value = HydraValue::from("2013-12-04 10:30").cast(BackendType::Datetime);
        assert_eq!(
            value.cast(BackendType::String),
            HydraValue::String("2013-12-04 10:30:00".to_string())
        );
    }

    #[test]
    fn same_as_is_backend_aware() {
        assert!(HydraValue::from("5").same_as(&HydraValue::Integer(5), BackendType::Integer));
        assert!(HydraValue::from("5.0").same_as(&HydraValue::Float(5.0), BackendType::Decimal));
        assert!(HydraValue::from("5.00").same_as(&HydraValue::Integer(5), BackendType::Decimal));
        assert!(!HydraValue::from("5.0").same_as(&HydraValue::from("5"), BackendType::String));
    }

    #[test]
    fn presence_rules() {
        assert!(!HydraValue::Null.is_present());
        assert!(!HydraValue::from(" ").is_present());
        assert!(HydraValue::from("green").is_present());
        assert!(!HydraValue::Integer(0).is_present());
        assert!(HydraValue::Float(0.5).is_present());
        assert!(!HydraValue::Boolean(false).is_present());
    }

    #[test]
    fn decimals_keep_every_digit() {
        let raw = HydraValue::from("12345678901234567.89");
        let cast = raw.cast(BackendType::Decimal);
        assert_eq!(cast, decimal("12345678901234567.89"));
        assert_eq!(cast.to_string(), "12345678901234567.89");
        assert_eq!(cast.cast(BackendType::Decimal), cast);

        assert_eq!(
            HydraValue::Float(2.5).cast(BackendType::Decimal),
            decimal("2.5")
        );
        assert_eq!(
            HydraValue::from("1.5e3").cast(BackendType::Decimal),
            decimal("1500")
        );
        assert_eq!(
            HydraValue::from("abc").cast(BackendType::Decimal),
            HydraValue::Null
        );
        assert!(!decimal("0.00").is_present());
    }

    #[test]
    fn integer_cast_rejects_out_of_range_numbers() {
        assert_eq!(
            HydraValue::from("1e30").cast(BackendType::Integer),
            HydraValue::Null
        );
        assert_eq!(
            HydraValue::Float(-1e19).cast(BackendType::Integer),
            HydraValue::Null
        );
        assert_eq!(
            HydraValue::Float(9.2e18).cast(BackendType::Integer),
            HydraValue::Integer(9_200_000_000_000_000_000)
        );
        assert_eq!(
            decimal("-7.9").cast(BackendType::Integer),
            HydraValue::Integer(-7)
        );
    }

    #[test]
    fn option_converts_to_null() {
        let missing: Option<&str> = None;
        assert_eq!(HydraValue::from(missing), HydraValue::Null);
        assert_eq!(HydraValue::from(Some(3_i64)), HydraValue::Integer(3));
    }
}
