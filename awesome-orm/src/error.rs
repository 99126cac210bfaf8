//! Structured error types for awesome-orm.
//!
//! Uses `thiserror` so library consumers get composable errors. The binary
//! (awesome-cli) wraps these in `anyhow` for convenience.

use thiserror::Error;

/// Main error type for mapper operations
#[derive(Error, Debug)]
pub enum OrmError {
    /// Schema registration failed (fatal at startup)
    #[error("Schema error for {type_name}: {reason}")]
    Schema { type_name: String, reason: String },

    /// A statement was attempted before the pool was initialized
    #[error("Database pool is not initialized")]
    PoolNotInitialized,

    /// `limit` was neither a row count nor an (offset, count) pair
    #[error("Invalid limit value: {value}")]
    InvalidLimit { value: String },

    /// Attribute is not declared by the record's schema
    #[error("Unknown field '{field}' for {type_name}")]
    UnknownField { type_name: String, field: String },

    /// Configuration could not be loaded
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Error surfaced unmodified from the database driver
    #[error("Database error: {0}")]
    Driver(#[from] sqlx::Error),
}

/// Result type alias for mapper operations
pub type Result<T> = std::result::Result<T, OrmError>;

impl OrmError {
    pub fn missing_primary_key(type_name: impl Into<String>) -> Self {
        Self::Schema {
            type_name: type_name.into(),
            reason: "missing primary key".to_string(),
        }
    }

    pub fn duplicate_primary_key(type_name: impl Into<String>, field: &str) -> Self {
        Self::Schema {
            type_name: type_name.into(),
            reason: format!("duplicate primary key for field: {field}"),
        }
    }

    pub fn already_registered(type_name: impl Into<String>) -> Self {
        Self::Schema {
            type_name: type_name.into(),
            reason: "already registered".to_string(),
        }
    }

    pub fn invalid_limit(value: impl Into<String>) -> Self {
        Self::InvalidLimit {
            value: value.into(),
        }
    }

    pub fn unknown_field(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// True for errors raised while building schemas
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }
}
