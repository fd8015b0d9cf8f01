//! Scalar values bound into filters and procedure calls.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A dynamically typed value that maps onto a SQL parameter.
///
/// Each variant binds with its own SQL type, so comparisons against typed
/// columns (`uuid`, `timestamptz`, integers) need no casts. Serialized with
/// an explicit `type` tag so a string that looks like a UUID or a timestamp
/// stays a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// A boolean value.
    Boolean(bool),
    /// An integer value.
    Integer(i64),
    /// A floating-point value.
    Float(f64),
    /// A UUID value.
    Uuid(Uuid),
    /// A UTC timestamp.
    Timestamp(DateTime<Utc>),
    /// A string value.
    String(String),
    /// A list of string values (for `IN` on text columns).
    StringList(Vec<String>),
    /// A list of integer values (for `IN` on numeric columns).
    IntegerList(Vec<i64>),
}

impl SqlValue {
    /// Whether this is `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this is a list value, only valid with `IN`.
    pub fn is_list(&self) -> bool {
        matches!(self, Self::StringList(_) | Self::IntegerList(_))
    }

    /// Compare a JSON-encoded column value against this value.
    ///
    /// Returns `None` when the two are not comparable (type mismatch or a
    /// `NULL` on either side), which mirrors SQL's unknown result.
    pub fn compare_json(&self, column: &serde_json::Value) -> Option<Ordering> {
        use serde_json::Value;

        match (self, column) {
            (Self::Null, _) | (_, Value::Null) => None,
            (Self::Boolean(b), Value::Bool(c)) => Some(c.cmp(b)),
            (Self::Integer(i), Value::Number(n)) => match n.as_i64() {
                Some(c) => Some(c.cmp(i)),
                None => n.as_f64().and_then(|c| c.partial_cmp(&(*i as f64))),
            },
            (Self::Float(f), Value::Number(n)) => n.as_f64().and_then(|c| c.partial_cmp(f)),
            (Self::Uuid(u), Value::String(s)) => Uuid::parse_str(s).ok().map(|c| c.cmp(u)),
            (Self::Timestamp(t), Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|c| c.with_timezone(&Utc).cmp(t)),
            (Self::String(v), Value::String(s)) => Some(s.as_str().cmp(v.as_str())),
            _ => None,
        }
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for SqlValue {
    fn from(value: Vec<String>) -> Self {
        Self::StringList(value)
    }
}

impl From<Vec<i64>> for SqlValue {
    fn from(value: Vec<i64>) -> Self {
        Self::IntegerList(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
