//! Statement execution on pooled connections.
//!
//! Reads borrow a connection, fetch and release it. Writes borrow a
//! connection and, unless the pool is configured for autocommit, wrap the
//! statement in an explicit transaction that is rolled back on failure.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Column, Row as _, Transaction, TypeInfo, ValueRef};
use tracing::{info, warn};

use crate::error::Result;
use crate::pool::Database;
use crate::value::Value;

/// One result row: column names to values, in select order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, v)| (name.as_str(), v))
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

fn log_statement(sql: &str, args: &[Value]) {
    info!("SQL: {} args: {:?}", sql, args);
}

fn bind_all<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    args: &[Value],
) -> Query<'q, Any, AnyArguments<'q>> {
    for arg in args {
        query = match arg {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::Text(s) => query.bind(s.clone()),
        };
    }
    query
}

fn decode_row(row: &AnyRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.columns().len());
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_ascii_uppercase();
            match type_name.as_str() {
                "BOOLEAN" => Value::Bool(row.try_get(i)?),
                "SMALLINT" => Value::Int(i64::from(row.try_get::<i16, _>(i)?)),
                "INTEGER" => Value::Int(i64::from(row.try_get::<i32, _>(i)?)),
                "BIGINT" => Value::Int(row.try_get(i)?),
                "REAL" | "DOUBLE" => Value::Float(row.try_get(i)?),
                "BLOB" => {
                    let bytes: Vec<u8> = row.try_get(i)?;
                    Value::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::Text(row.try_get(i)?),
            }
        };
        columns.push((column.name().to_string(), value));
    }
    Ok(Row::new(columns))
}

impl Database {
    /// Run a read statement and return up to `limit` rows (all when `None`).
    ///
    /// Driver errors propagate unchanged; the connection is released either way.
    pub async fn query(&self, sql: &str, args: &[Value], limit: Option<usize>) -> Result<Vec<Row>> {
        log_statement(sql, args);
        let pool = self.pool()?;
        let sql = self.dialect().translate(sql);

        let mut conn = pool.acquire().await?;
        let query = bind_all(sqlx::query(&sql), args);
        let rows: Vec<AnyRow> = match limit {
            Some(n) => query.fetch(&mut *conn).take(n).try_collect().await?,
            None => query.fetch_all(&mut *conn).await?,
        };
        info!("rows returned: {}", rows.len());

        rows.iter().map(decode_row).collect()
    }

    /// Run a write statement and return the affected-row count.
    pub async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64> {
        log_statement(sql, args);
        let pool = self.pool()?;
        let sql = self.dialect().translate(sql);

        if self.autocommit() {
            let mut conn = pool.acquire().await?;
            let result = bind_all(sqlx::query(&sql), args)
                .execute(&mut *conn)
                .await?;
            return Ok(result.rows_affected());
        }

        let tx = pool.begin().await?;
        run_in_transaction(tx, &sql, args).await
    }
}

/// The transaction operations a write needs.
#[async_trait]
pub trait WriteTransaction: Send {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64>;
    async fn commit(self) -> Result<()>;
    async fn rollback(self) -> Result<()>;
}

#[async_trait]
impl WriteTransaction for Transaction<'static, Any> {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> Result<u64> {
        let result = bind_all(sqlx::query(sql), args).execute(&mut **self).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> Result<()> {
        Ok(Transaction::commit(self).await?)
    }

    async fn rollback(self) -> Result<()> {
        Ok(Transaction::rollback(self).await?)
    }
}

/// Execute inside `tx`: commit on success; on failure roll back once and
/// return the original error. A failed rollback returns the rollback error.
/// A failed commit leaves the rollback to the transaction's drop.
pub async fn run_in_transaction<T: WriteTransaction>(mut tx: T, sql: &str, args: &[Value]) -> Result<u64> {
    match tx.execute(sql, args).await {
        Ok(affected) => {
            tx.commit().await?;
            Ok(affected)
        }
        Err(err) => {
            warn!("statement failed, rolling back: {}", err);
            tx.rollback().await?;
            Err(err)
        }
    }
}
