//! Record schemas and the registry that builds them.
//!
//! A schema is compiled once per record type: the primary key is located,
//! the non-key fields are kept in declaration order, and the four statement
//! templates are rendered with backtick identifiers and `?` placeholders.
//! Translation to the connected driver's syntax happens in [`crate::dialect`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::error::{OrmError, Result};
use crate::field::Field;
use crate::value::{base_type, ColumnKind};

/// Compiled mapping plus generated SQL for one record type.
#[derive(Debug, Clone)]
pub struct Schema {
    type_name: String,
    table: String,
    primary_key: String,
    fields: Vec<String>,
    mappings: HashMap<String, Field>,
    select_sql: String,
    insert_sql: String,
    update_sql: String,
    delete_sql: String,
}

impl Schema {
    pub fn builder(type_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(type_name)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Attribute name of the primary key.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Non-key attribute names, in declaration order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.mappings.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.mappings.contains_key(name)
    }

    /// Primary key followed by the non-key fields: the SELECT column order.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary_key.as_str()).chain(self.fields.iter().map(String::as_str))
    }

    /// Column name for an attribute: the descriptor's explicit name, else the attribute.
    pub fn column<'a>(&'a self, attribute: &'a str) -> &'a str {
        self.mappings
            .get(attribute)
            .and_then(Field::name)
            .unwrap_or(attribute)
    }

    /// Reverse of [`Schema::column`], used when materializing rows.
    pub fn attribute_for_column(&self, column: &str) -> Option<&str> {
        self.attributes().find(|attr| self.column(attr) == column)
    }

    pub fn select_sql(&self) -> &str {
        &self.select_sql
    }

    pub fn insert_sql(&self) -> &str {
        &self.insert_sql
    }

    pub fn update_sql(&self) -> &str {
        &self.update_sql
    }

    pub fn delete_sql(&self) -> &str {
        &self.delete_sql
    }
}

/// Wraps an identifier in backticks.
pub fn quote(identifier: &str) -> String {
    format!("`{identifier}`")
}

/// `?, ?, ?` for `count` bound values.
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Ordered declaration of a record type's fields.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    type_name: String,
    table: Option<String>,
    declared: Vec<(String, Field)>,
}

impl SchemaBuilder {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            table: None,
            declared: Vec::new(),
        }
    }

    /// Table name override; defaults to the type name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn field(mut self, attribute: impl Into<String>, field: Field) -> Self {
        self.declared.push((attribute.into(), field));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Validate the declaration and render the statement templates.
    pub fn build(self) -> Result<Schema> {
        let table = self.table.unwrap_or_else(|| self.type_name.clone());
        info!("found model: {} (table: {})", self.type_name, table);

        let mut mappings = HashMap::with_capacity(self.declared.len());
        let mut fields = Vec::new();
        let mut primary_key: Option<String> = None;

        for (attribute, field) in self.declared {
            info!("  found mapping: {} ==> {}", attribute, field);
            if mappings.contains_key(&attribute) {
                return Err(OrmError::Schema {
                    type_name: self.type_name,
                    reason: format!("duplicate field: {attribute}"),
                });
            }
            if field.is_primary_key() {
                if primary_key.is_some() {
                    return Err(OrmError::duplicate_primary_key(self.type_name, &attribute));
                }
                primary_key = Some(attribute.clone());
            } else {
                fields.push(attribute.clone());
            }
            mappings.insert(attribute, field);
        }

        let primary_key = primary_key.ok_or_else(|| OrmError::missing_primary_key(&self.type_name))?;

        let mut schema = Schema {
            type_name: self.type_name,
            table,
            primary_key,
            fields,
            mappings,
            select_sql: String::new(),
            insert_sql: String::new(),
            update_sql: String::new(),
            delete_sql: String::new(),
        };
        schema.render_statements();
        Ok(schema)
    }
}

impl Schema {
    fn render_statements(&mut self) {
        let table = quote(&self.table);
        let pk = quote(self.column(&self.primary_key));
        let escaped: Vec<String> = self.fields.iter().map(|f| quote(self.column(f))).collect();

        let select_columns: Vec<String> = self
            .attributes()
            .map(|attr| select_column(self.mappings.get(attr), self.column(attr)))
            .collect();
        self.select_sql = format!("select {} from {}", select_columns.join(", "), table);

        let mut insert_columns = escaped.clone();
        insert_columns.push(pk.clone());
        self.insert_sql = format!(
            "insert into {} ({}) values ({})",
            table,
            insert_columns.join(", "),
            placeholders(escaped.len() + 1)
        );

        let assignments: Vec<String> = escaped.iter().map(|c| format!("{c}=?")).collect();
        self.update_sql = format!(
            "update {} set {} where {}=?",
            table,
            assignments.join(", "),
            pk
        );

        self.delete_sql = format!("delete from {} where {}=?", table, pk);
    }
}

/// Select-list entry for one column. Booleans and narrow integers come back
/// as plain integers under their own column name; the `Any` driver rejects
/// their native type codes (SQLite `BOOLEAN`, MySQL `TINY`/`INT24`).
fn select_column(field: Option<&Field>, column: &str) -> String {
    let quoted = quote(column);
    let Some(field) = field else {
        return quoted;
    };
    match field.kind() {
        ColumnKind::Boolean => {
            format!("case when {quoted} then 1 when not {quoted} then 0 end as {quoted}")
        }
        ColumnKind::Integer
            if matches!(base_type(field.column_type()).as_str(), "tinyint" | "mediumint") =>
        {
            format!("({quoted} + 0) as {quoted}")
        }
        _ => quoted,
    }
}

/// Registered schemas, keyed by type name.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and register a schema. Each type name registers once.
    pub fn register(&mut self, builder: SchemaBuilder) -> Result<Arc<Schema>> {
        if self.schemas.contains_key(builder.type_name()) {
            return Err(OrmError::already_registered(builder.type_name()));
        }
        let schema = Arc::new(builder.build()?);
        self.schemas
            .insert(schema.type_name().to_string(), schema.clone());
        Ok(schema)
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(type_name).cloned()
    }

    /// Lookup by table name, for callers that only know the table.
    pub fn by_table(&self, table: &str) -> Option<Arc<Schema>> {
        self.schemas.values().find(|s| s.table() == table).cloned()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Schema>> {
        self.schemas.values()
    }
}
