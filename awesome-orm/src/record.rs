//! Record instances and the CRUD verbs built on the executor.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{OrmError, Result};
use crate::executor::Row;
use crate::field::Field;
use crate::pool::Database;
use crate::query::{build_find_all, build_find_by_key, build_find_count, FindOptions, COUNT_ALIAS};
use crate::schema::Schema;
use crate::value::Value;

/// One in-memory row bound to its schema.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<Schema>,
    values: HashMap<String, Value>,
}

impl Record {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            values: HashMap::new(),
        }
    }

    /// Build a record from named values. Every name must be declared.
    pub fn with_values<I, K, V>(schema: Arc<Schema>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = Self::new(schema);
        for (field, value) in values {
            record.set(field, value)?;
        }
        Ok(record)
    }

    /// Materialize a result row; absent fields are filled from defaults.
    pub fn from_row(schema: Arc<Schema>, row: Row) -> Self {
        let mut record = Self::new(schema);
        for (column, value) in row {
            let Some(attribute) = record.schema.attribute_for_column(&column) else {
                debug!("ignoring unmapped column {} for {}", column, record.schema.type_name());
                continue;
            };
            let kind = record.schema.field(attribute).map(|f| f.kind());
            let value = match kind {
                Some(kind) => value.coerce(kind),
                None => value,
            };
            record.values.insert(attribute.to_string(), value);
        }
        let schema = record.schema.clone();
        for attribute in schema.attributes() {
            if let Some(descriptor) = schema.field(attribute) {
                record.resolve(attribute, descriptor);
            }
        }
        record
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Current value, without consulting defaults.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let field = field.into();
        if !self.schema.has_field(&field) {
            return Err(OrmError::unknown_field(self.schema.type_name(), field));
        }
        self.values.insert(field, value.into());
        Ok(())
    }

    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    /// Current value, or the field's default when the record has none.
    ///
    /// A resolved default is stored on the record, so a producer runs at most
    /// once per record and field.
    pub fn value_or_default(&mut self, field: &str) -> Result<Value> {
        let schema = self.schema.clone();
        let descriptor = schema
            .field(field)
            .ok_or_else(|| OrmError::unknown_field(schema.type_name(), field))?;
        Ok(self.resolve(field, descriptor))
    }

    fn resolve(&mut self, field: &str, descriptor: &Field) -> Value {
        if let Some(value) = self.values.get(field).filter(|v| !v.is_null()) {
            return value.clone();
        }
        let Some(default) = descriptor.default_value() else {
            return Value::Null;
        };
        let value = default.resolve();
        debug!("using default value for {}: {}", field, value);
        self.values.insert(field.to_string(), value.clone());
        value
    }

    fn value(&self, field: &str) -> Value {
        self.values.get(field).cloned().unwrap_or_default()
    }

    /// Records matching `options`.
    pub async fn find_all(
        db: &Database,
        schema: &Arc<Schema>,
        options: FindOptions,
    ) -> Result<Vec<Record>> {
        let (sql, args) = build_find_all(schema, &options)?;
        let rows = db.query(&sql, &args, None).await?;
        Ok(rows
            .into_iter()
            .map(|row| Record::from_row(schema.clone(), row))
            .collect())
    }

    /// Scalar from `select <select_expr> _num_ from <table> [where ...]`;
    /// `None` when no row comes back.
    pub async fn find_count(
        db: &Database,
        schema: &Schema,
        select_expr: &str,
        where_clause: Option<&str>,
        args: &[Value],
    ) -> Result<Option<Value>> {
        let sql = build_find_count(schema, select_expr, where_clause);
        let rows = db.query(&sql, args, Some(1)).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.get(COUNT_ALIAS).cloned()))
    }

    /// The record with primary key `key`, if any.
    pub async fn find(
        db: &Database,
        schema: &Arc<Schema>,
        key: impl Into<Value>,
    ) -> Result<Option<Record>> {
        let sql = build_find_by_key(schema);
        let rows = db.query(&sql, &[key.into()], Some(1)).await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| Record::from_row(schema.clone(), row)))
    }

    /// Insert this record, resolving defaults first. Returns the affected
    /// rows; anything other than one is logged, not raised.
    pub async fn save(&mut self, db: &Database) -> Result<u64> {
        let schema = self.schema.clone();
        let mut args = Vec::with_capacity(schema.fields().len() + 1);
        for field in schema.fields() {
            args.push(self.value_or_default(field)?);
        }
        args.push(self.value_or_default(schema.primary_key())?);

        let rows = db.execute(schema.insert_sql(), &args).await?;
        if rows != 1 {
            warn!("failed to insert record: affected rows: {}", rows);
        }
        Ok(rows)
    }

    /// Write current values back by primary key. Defaults are not applied.
    pub async fn update(&self, db: &Database) -> Result<u64> {
        let mut args: Vec<Value> = self.schema.fields().iter().map(|f| self.value(f)).collect();
        args.push(self.value(self.schema.primary_key()));

        let rows = db.execute(self.schema.update_sql(), &args).await?;
        if rows != 1 {
            warn!("failed to update by primary key: affected rows: {}", rows);
        }
        Ok(rows)
    }

    pub async fn delete(&self, db: &Database) -> Result<u64> {
        let args = [self.value(self.schema.primary_key())];
        let rows = db.execute(self.schema.delete_sql(), &args).await?;
        if rows != 1 {
            warn!("failed to remove by primary key: affected rows: {}", rows);
        }
        Ok(rows)
    }
}
