//! Dynamic column values carried by records and bound to statements.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single column value.
///
/// Records are untyped bags of these; the field descriptor's column type is
/// only consulted when a driver hands back a representation that needs
/// coercing (e.g. MySQL returning `boolean` columns as tiny integers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    /// Coerce a driver-decoded value into the shape a column type implies.
    ///
    /// Values that already match, or that cannot be converted losslessly,
    /// are returned unchanged.
    pub fn coerce(self, kind: ColumnKind) -> Value {
        match (kind, self) {
            (ColumnKind::Boolean, Value::Int(i)) => Value::Bool(i != 0),
            (ColumnKind::Real, Value::Int(i)) => Value::Float(i as f64),
            (ColumnKind::Integer, Value::Bool(b)) => Value::Int(i64::from(b)),
            (_, v) => v,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Broad storage class of a column type literal such as `varchar(50)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Boolean,
    Integer,
    Real,
    Text,
}

impl ColumnKind {
    /// Classify a column type literal. Unknown literals are treated as text.
    pub fn from_column_type(column_type: &str) -> Self {
        match base_type(column_type).as_str() {
            "bool" | "boolean" => ColumnKind::Boolean,
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" => {
                ColumnKind::Integer
            }
            "real" | "float" | "double" | "decimal" | "numeric" => ColumnKind::Real,
            _ => ColumnKind::Text,
        }
    }
}

/// Lowercased leading type word: `tinyint(1) unsigned` is `tinyint`,
/// `double precision` is `double`.
pub(crate) fn base_type(column_type: &str) -> String {
    column_type
        .trim()
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}
