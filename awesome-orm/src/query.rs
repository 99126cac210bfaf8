//! SELECT statement assembly for record lookups.
//!
//! These functions only build SQL text and argument lists; nothing here
//! touches a connection, so malformed options fail before any statement is
//! issued.

use crate::error::{OrmError, Result};
use crate::schema::{quote, Schema};
use crate::value::Value;

/// Alias for the scalar column of a count query.
pub const COUNT_ALIAS: &str = "_num_";

/// Row limit of a `find_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Count(i64),
    Range { offset: i64, count: i64 },
}

impl Limit {
    /// Parse a limit from loosely typed input: one integer, or an
    /// (offset, count) pair of integers.
    pub fn from_values(values: &[Value]) -> Result<Self> {
        match values {
            [Value::Int(count)] if *count >= 0 => Ok(Limit::Count(*count)),
            [Value::Int(offset), Value::Int(count)] if *offset >= 0 && *count >= 0 => {
                Ok(Limit::Range {
                    offset: *offset,
                    count: *count,
                })
            }
            other => Err(OrmError::invalid_limit(format!("{other:?}"))),
        }
    }

    fn push(&self, sql: &mut Vec<String>, args: &mut Vec<Value>) {
        sql.push("limit".to_string());
        match *self {
            Limit::Count(count) => {
                sql.push("?".to_string());
                args.push(Value::Int(count));
            }
            Limit::Range { offset, count } => {
                sql.push("?, ?".to_string());
                args.push(Value::Int(offset));
                args.push(Value::Int(count));
            }
        }
    }
}

impl From<i64> for Limit {
    fn from(count: i64) -> Self {
        Limit::Count(count)
    }
}

impl From<(i64, i64)> for Limit {
    fn from((offset, count): (i64, i64)) -> Self {
        Limit::Range { offset, count }
    }
}

/// Optional clauses of a `find_all`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub where_clause: Option<String>,
    pub args: Vec<Value>,
    pub order_by: Option<String>,
    /// Raw limit values, validated when the statement is built.
    pub limit: Option<Vec<Value>>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, clause: impl Into<String>, args: Vec<Value>) -> Self {
        self.where_clause = Some(clause.into());
        self.args = args;
        self
    }

    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by = Some(clause.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<Limit>) -> Self {
        self.limit = Some(match limit.into() {
            Limit::Count(count) => vec![Value::Int(count)],
            Limit::Range { offset, count } => vec![Value::Int(offset), Value::Int(count)],
        });
        self
    }

    /// Untyped limit, e.g. straight from a request parameter.
    pub fn limit_values(mut self, values: Vec<Value>) -> Self {
        self.limit = Some(values);
        self
    }
}

/// `select ... [where ...] [order by ...] [limit ...]` plus its arguments.
pub fn build_find_all(schema: &Schema, options: &FindOptions) -> Result<(String, Vec<Value>)> {
    let limit = options
        .limit
        .as_deref()
        .map(Limit::from_values)
        .transpose()?;

    let mut sql = vec![schema.select_sql().to_string()];
    let mut args = options.args.clone();
    if let Some(clause) = &options.where_clause {
        sql.push("where".to_string());
        sql.push(clause.clone());
    }
    if let Some(order) = &options.order_by {
        sql.push("order by".to_string());
        sql.push(order.clone());
    }
    if let Some(limit) = limit {
        limit.push(&mut sql, &mut args);
    }
    Ok((sql.join(" "), args))
}

/// `select <expr> _num_ from <table> [where ...]`.
pub fn build_find_count(schema: &Schema, select_expr: &str, where_clause: Option<&str>) -> String {
    let mut sql = vec![format!(
        "select {} {} from {}",
        select_expr,
        COUNT_ALIAS,
        quote(schema.table())
    )];
    if let Some(clause) = where_clause {
        sql.push("where".to_string());
        sql.push(clause.to_string());
    }
    sql.join(" ")
}

/// The schema's SELECT narrowed to one primary key.
pub fn build_find_by_key(schema: &Schema) -> String {
    format!(
        "{} where {}=?",
        schema.select_sql(),
        quote(schema.column(schema.primary_key()))
    )
}
