//! awesome-orm: a small async object-relational mapper.
//!
//! Record types are declared as ordered lists of [`Field`] descriptors and
//! compiled once into a [`Schema`] carrying its SELECT/INSERT/UPDATE/DELETE
//! templates. [`Record`] values run those templates through a pooled sqlx
//! connection held by a [`Database`] handle.

pub mod config;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod field;
pub mod models;
pub mod pool;
pub mod query;
pub mod record;
pub mod schema;
pub mod value;

pub use config::DbConfig;
pub use dialect::Dialect;
pub use error::{OrmError, Result};
pub use executor::{run_in_transaction, Row, WriteTransaction};
pub use field::{DefaultValue, Field};
pub use models::{next_id, now, register_models, Models};
pub use pool::Database;
pub use query::{FindOptions, Limit};
pub use record::Record;
pub use schema::{Schema, SchemaBuilder, SchemaRegistry};
pub use value::{ColumnKind, Value};
