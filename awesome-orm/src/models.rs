//! Models for users, blogs and comments.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;
use crate::field::Field;
use crate::schema::{Schema, SchemaBuilder, SchemaRegistry};
use crate::value::Value;

/// Time-ordered unique id: 15-digit millisecond timestamp, 32 hex digits of
/// a random UUID, and a `00` suffix. Fits `varchar(50)`.
pub fn next_id() -> String {
    format!(
        "{:015}{}00",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

/// Current time as fractional Unix seconds.
pub fn now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn id_field() -> Field {
    Field::string()
        .primary_key()
        .ddl("varchar(50)")
        .default_with(|| Value::Text(next_id()))
}

fn created_at_field() -> Field {
    Field::float().default_with(|| Value::Float(now()))
}

pub fn user_schema() -> SchemaBuilder {
    Schema::builder("User")
        .table("users")
        .field("id", id_field())
        .field("email", Field::string().ddl("varchar(50)"))
        .field("passwd", Field::string().ddl("varchar(50)"))
        .field("admin", Field::boolean())
        .field("name", Field::string().ddl("varchar(50)"))
        .field("image", Field::string().ddl("varchar(500)"))
        .field("created_at", created_at_field())
}

pub fn blog_schema() -> SchemaBuilder {
    Schema::builder("Blog")
        .table("blogs")
        .field("id", id_field())
        .field("user_id", Field::string().ddl("varchar(50)"))
        .field("user_name", Field::string().ddl("varchar(50)"))
        .field("user_image", Field::string().ddl("varchar(500)"))
        .field("name", Field::string().ddl("varchar(50)"))
        .field("summary", Field::string().ddl("varchar(200)"))
        .field("content", Field::text())
        .field("created_at", created_at_field())
}

pub fn comment_schema() -> SchemaBuilder {
    Schema::builder("Comment")
        .table("comments")
        .field("id", id_field())
        .field("blog_id", Field::string().ddl("varchar(50)"))
        .field("user_id", Field::string().ddl("varchar(50)"))
        .field("user_name", Field::string().ddl("varchar(50)"))
        .field("user_image", Field::string().ddl("varchar(500)"))
        .field("summary", Field::string().ddl("varchar(200)"))
        .field("content", Field::text())
        .field("created_at", created_at_field())
}

/// Handles to the registered application schemas.
#[derive(Debug, Clone)]
pub struct Models {
    pub user: Arc<Schema>,
    pub blog: Arc<Schema>,
    pub comment: Arc<Schema>,
}

/// Register the user, blog and comment schemas.
pub fn register_models(registry: &mut SchemaRegistry) -> Result<Models> {
    Ok(Models {
        user: registry.register(user_schema())?,
        blog: registry.register(blog_schema())?,
        comment: registry.register(comment_schema())?,
    })
}
