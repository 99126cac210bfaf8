//! Field descriptors: metadata for one mapped attribute.

use std::fmt;
use std::sync::Arc;

use crate::value::{ColumnKind, Value};

/// Default applied when a record has no value for a field.
///
/// Both variants are evaluated lazily, when a record asks for the value, so a
/// producer like `next_id` yields a fresh value per record.
#[derive(Clone)]
pub enum DefaultValue {
    Static(Value),
    Producer(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn producer<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::Producer(Arc::new(f))
    }

    /// Produce the default. Invokes the producer on every call.
    pub fn resolve(&self) -> Value {
        match self {
            Self::Static(v) => v.clone(),
            Self::Producer(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Self::Producer(_) => f.write_str("Producer(<fn>)"),
        }
    }
}

/// Describes one mapped attribute. Immutable once built.
#[derive(Debug, Clone)]
pub struct Field {
    name: Option<String>,
    column_type: String,
    primary_key: bool,
    default: Option<DefaultValue>,
}

impl Field {
    pub fn new(column_type: impl Into<String>) -> Self {
        Self {
            name: None,
            column_type: column_type.into(),
            primary_key: false,
            default: None,
        }
    }

    /// `varchar(100)` unless overridden with [`Field::ddl`].
    pub fn string() -> Self {
        Self::new("varchar(100)")
    }

    pub fn boolean() -> Self {
        Self::new("boolean").default(false)
    }

    pub fn integer() -> Self {
        Self::new("bigint").default(0i64)
    }

    /// `real` with a `0.0` default. MySQL and SQLite store `real` as an
    /// 8-byte double; on PostgreSQL it is 4 bytes, so declare
    /// `.ddl("double precision")` for timestamps there.
    pub fn float() -> Self {
        Self::new("real").default(0.0)
    }

    pub fn text() -> Self {
        Self::new("text")
    }

    /// Column name, when it differs from the declaring attribute.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn ddl(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = column_type.into();
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn default(self, value: impl Into<Value>) -> Self {
        self.with_default(DefaultValue::Static(value.into()))
    }

    pub fn default_with<F>(self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.with_default(DefaultValue::producer(f))
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn column_type(&self) -> &str {
        &self.column_type
    }

    pub fn kind(&self) -> ColumnKind {
        ColumnKind::from_column_type(&self.column_type)
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{}, {}:{}>",
            if self.primary_key { "PrimaryKey" } else { "Field" },
            self.column_type,
            self.name.as_deref().unwrap_or("")
        )
    }
}
