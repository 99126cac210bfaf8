//! CRUD against in-memory SQLite through the same `Any` pool used for MySQL.
//!
//! An in-memory SQLite database lives on a single connection, so every pool
//! here that needs shared data is capped at one connection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use awesome_orm::{
    register_models, Database, DbConfig, Field, FindOptions, OrmError, Record, Schema,
    SchemaRegistry, Value,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// `create table` from the schema's own column types.
fn create_table_sql(schema: &Schema) -> String {
    let columns: Vec<String> = schema
        .attributes()
        .map(|attr| {
            let field = schema.field(attr).expect("declared field");
            let key = if field.is_primary_key() { " primary key" } else { "" };
            format!("`{}` {}{}", schema.column(attr), field.column_type(), key)
        })
        .collect();
    format!("create table `{}` ({})", schema.table(), columns.join(", "))
}

async fn single_connection_db(autocommit: bool) -> Database {
    init_tracing();
    let config = DbConfig::from_url("sqlite::memory:")
        .with_pool_size(1, 1)
        .with_autocommit(autocommit);
    Database::connect(config).await.expect("pool creation failed")
}

async fn user_db() -> (Database, Arc<Schema>) {
    let db = single_connection_db(false).await;
    let mut registry = SchemaRegistry::new();
    let models = register_models(&mut registry).unwrap();
    db.execute(&create_table_sql(&models.user), &[])
        .await
        .expect("create table failed");
    (db, models.user)
}

async fn count_users(db: &Database, schema: &Schema) -> i64 {
    Record::find_count(db, schema, "count(`id`)", None, &[])
        .await
        .unwrap()
        .and_then(|v| v.as_i64())
        .unwrap()
}

#[tokio::test]
async fn saved_record_round_trips() {
    let (db, user) = user_db().await;

    let mut record = Record::with_values(
        user.clone(),
        [
            ("id", Value::from("u1")),
            ("email", Value::from("a@b.com")),
            ("admin", Value::from(false)),
        ],
    )
    .unwrap();
    assert_eq!(record.save(&db).await.unwrap(), 1);

    let found = Record::find(&db, &user, "u1").await.unwrap().expect("row exists");
    assert_eq!(found.get("id"), Some(&Value::from("u1")));
    assert_eq!(found.get("email"), Some(&Value::from("a@b.com")));
    assert_eq!(found.get("admin"), Some(&Value::Bool(false)));
    assert_eq!(found.get("created_at"), record.get("created_at"));

    assert!(Record::find(&db, &user, "missing").await.unwrap().is_none());
}

#[tokio::test]
async fn boolean_and_narrow_integer_columns_read_back() {
    let (db, user) = user_db().await;
    assert!(create_table_sql(&user).contains("`admin` boolean"));

    for (id, admin) in [("u1", true), ("u2", false)] {
        let mut record = Record::with_values(
            user.clone(),
            [
                ("id", Value::from(id)),
                ("admin", Value::from(admin)),
                ("created_at", Value::from(1_700_000_000.123_456)),
            ],
        )
        .unwrap();
        record.save(&db).await.unwrap();
    }

    let admins = Record::find_all(
        &db,
        &user,
        FindOptions::new().filter("`admin` = ?", vec![true.into()]),
    )
    .await
    .unwrap();
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].get("id"), Some(&Value::from("u1")));
    assert_eq!(admins[0].get("admin"), Some(&Value::Bool(true)));
    assert_eq!(
        admins[0].get("created_at"),
        Some(&Value::Float(1_700_000_000.123_456))
    );

    let plain = Record::find(&db, &user, "u2").await.unwrap().expect("row exists");
    assert_eq!(plain.get("admin"), Some(&Value::Bool(false)));

    let flags = Arc::new(
        Schema::builder("Flag")
            .table("flags")
            .field("id", Field::integer().primary_key())
            .field("level", Field::integer().ddl("tinyint"))
            .build()
            .unwrap(),
    );
    db.execute(&create_table_sql(&flags), &[]).await.unwrap();
    let mut flag = Record::with_values(flags.clone(), [("id", 1i64), ("level", 3i64)]).unwrap();
    flag.save(&db).await.unwrap();
    let found = Record::find(&db, &flags, 1i64).await.unwrap().expect("row exists");
    assert_eq!(found.get("level"), Some(&Value::Int(3)));
}

#[tokio::test]
async fn save_generates_key_and_timestamp() {
    let db = single_connection_db(false).await;
    let schema = Arc::new(
        Schema::builder("Event")
            .table("events")
            .field(
                "id",
                Field::string()
                    .primary_key()
                    .default_with(|| Value::Text(awesome_orm::next_id())),
            )
            .field("name", Field::string())
            .field("created_at", Field::float().default_with(|| Value::Float(awesome_orm::now())))
            .build()
            .unwrap(),
    );
    db.execute(&create_table_sql(&schema), &[]).await.unwrap();

    let before = awesome_orm::now();
    let mut record = Record::with_values(schema.clone(), [("name", "test")]).unwrap();
    assert_eq!(record.save(&db).await.unwrap(), 1);

    let rows = Record::find_all(&db, &schema, FindOptions::new()).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    let id = row.get("id").and_then(Value::as_str).unwrap();
    assert_eq!(Some(id), record.get("id").and_then(Value::as_str));
    assert_eq!(id.len(), 49);
    let created_at = row.get("created_at").and_then(Value::as_f64).unwrap();
    assert!(created_at >= before - 1.0);
}

#[tokio::test]
async fn find_all_filters_orders_and_limits() {
    let (db, user) = user_db().await;
    for (id, name) in [("u1", "carol"), ("u2", "alice"), ("u3", "bob"), ("u4", "dave")] {
        let mut record = Record::with_values(
            user.clone(),
            [("id", id), ("name", name), ("email", "x@y.z")],
        )
        .unwrap();
        record.save(&db).await.unwrap();
    }

    let all = Record::find_all(&db, &user, FindOptions::new().order_by("`name`"))
        .await
        .unwrap();
    let names: Vec<_> = all
        .iter()
        .map(|r| r.get("name").and_then(Value::as_str).unwrap().to_string())
        .collect();
    assert_eq!(names, ["alice", "bob", "carol", "dave"]);

    let page = Record::find_all(
        &db,
        &user,
        FindOptions::new().order_by("`name`").limit((1i64, 2i64)),
    )
    .await
    .unwrap();
    let names: Vec<_> = page
        .iter()
        .map(|r| r.get("name").and_then(Value::as_str).unwrap())
        .collect();
    assert_eq!(names, ["bob", "carol"]);

    let filtered = Record::find_all(
        &db,
        &user,
        FindOptions::new()
            .filter("`name` > ?", vec!["bob".into()])
            .limit(1i64),
    )
    .await
    .unwrap();
    assert_eq!(filtered.len(), 1);

    let counted = Record::find_count(&db, &user, "count(`id`)", Some("`name` < ?"), &["c".into()])
        .await
        .unwrap();
    assert_eq!(counted, Some(Value::Int(2)));
}

#[tokio::test]
async fn update_and_delete_report_affected_rows() {
    let (db, user) = user_db().await;
    let mut record = Record::with_values(user.clone(), [("id", "u1"), ("name", "before")]).unwrap();
    record.save(&db).await.unwrap();

    record.set("name", "after").unwrap();
    assert_eq!(record.update(&db).await.unwrap(), 1);
    let found = Record::find(&db, &user, "u1").await.unwrap().unwrap();
    assert_eq!(found.get("name"), Some(&Value::from("after")));

    assert_eq!(record.delete(&db).await.unwrap(), 1);
    // Soft failure: nothing left to delete, but no error.
    assert_eq!(record.delete(&db).await.unwrap(), 0);
    assert_eq!(count_users(&db, &user).await, 0);
}

#[tokio::test]
async fn invalid_limit_fails_before_any_statement() {
    let db = Database::new(DbConfig::from_url("sqlite::memory:")).unwrap();
    let mut registry = SchemaRegistry::new();
    let models = register_models(&mut registry).unwrap();

    let err = Record::find_all(
        &db,
        &models.user,
        FindOptions::new().limit_values(vec![Value::from("x")]),
    )
    .await
    .unwrap_err();
    // The pool was never initialized, so reaching the executor would have
    // produced PoolNotInitialized instead.
    assert!(matches!(err, OrmError::InvalidLimit { .. }));

    let err = Record::find_all(&db, &models.user, FindOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::PoolNotInitialized));
}

#[tokio::test]
async fn failed_write_leaves_no_partial_rows() {
    for autocommit in [false, true] {
        let db = single_connection_db(autocommit).await;
        db.execute("create table `tags` (`id` text primary key)", &[])
            .await
            .unwrap();
        db.execute("insert into `tags` (`id`) values (?)", &["rust".into()])
            .await
            .unwrap();

        let err = db
            .execute(
                "insert into `tags` (`id`) values (?), (?)",
                &["sql".into(), "rust".into()],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Driver(_)));

        let rows = db.query("select `id` from `tags`", &[], None).await.unwrap();
        assert_eq!(rows.len(), 1, "autocommit={autocommit}");
    }
}

#[tokio::test]
async fn query_limit_truncates_rows() {
    let db = single_connection_db(true).await;
    db.execute("create table `n` (`v` integer)", &[]).await.unwrap();
    for v in 0..5i64 {
        db.execute("insert into `n` (`v`) values (?)", &[v.into()])
            .await
            .unwrap();
    }
    let rows = db
        .query("select `v` from `n` order by `v`", &[], Some(2))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get("v"), Some(&Value::Int(1)));
}

#[tokio::test]
async fn concurrent_saves_share_the_pool() {
    let (db, user) = user_db().await;

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let db = db.clone();
            let user = user.clone();
            tokio::spawn(async move {
                let mut record =
                    Record::with_values(user, [("name", format!("user{i}"))]).unwrap();
                record.save(&db).await.expect("concurrent save failed")
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.expect("task panicked"), 1);
    }
    assert_eq!(count_users(&db, &user).await, 10);
}

#[tokio::test]
async fn acquisition_beyond_max_size_waits_for_release() {
    init_tracing();
    let db = Database::connect(DbConfig::from_url("sqlite::memory:").with_pool_size(1, 2))
        .await
        .unwrap();

    let first = db.acquire().await.unwrap();
    let _second = db.acquire().await.unwrap();

    let acquired = Arc::new(AtomicUsize::new(0));
    let (release, _) = tokio::sync::broadcast::channel::<()>(1);
    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let db = db.clone();
            let acquired = acquired.clone();
            let mut released = release.subscribe();
            tokio::spawn(async move {
                let _conn = db.acquire().await.expect("acquire failed");
                acquired.fetch_add(1, Ordering::SeqCst);
                let _ = released.recv().await;
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(acquired.load(Ordering::SeqCst), 0);

    drop(first);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(acquired.load(Ordering::SeqCst), 1);
    assert!(db.size() <= 2);

    release.send(()).unwrap();
    for waiter in waiters {
        waiter.await.unwrap();
    }
    assert_eq!(acquired.load(Ordering::SeqCst), 2);
}
