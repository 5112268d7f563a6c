use auditrelay_store::{
    DbConfig, EntryStore, PersistenceStore, PlaceholderStyle, SqlExecutor, SqliteExecutor,
    StoreConfig,
};
use auditrelay_test_utils::{assert_err, assert_ok, fixed_time, temp_dir};
use auditrelay_types::{Entry, Payload};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::Row;
use std::sync::Arc;

async fn in_memory() -> Arc<SqliteExecutor> {
    Arc::new(assert_ok!(SqliteExecutor::connect(&DbConfig::new("sqlite::memory:")).await))
}

#[tokio::test]
async fn test_insert_round_trips_through_sqlite() {
    let executor = in_memory().await;
    let store = assert_ok!(PersistenceStore::new(executor.clone(), StoreConfig::default()));
    assert_eq!(store.placeholder(), PlaceholderStyle::Question);

    assert_ok!(store.ensure_schema().await);
    // Idempotent.
    assert_ok!(store.ensure_schema().await);

    let entry = Entry::new("login")
        .with_id("0123456789abcdef0123456789abcdef")
        .with_request_id("req-1")
        .with_actor("alice")
        .with_endpoint("  ")
        .with_request(Payload::json(json!({"user": "alice"})))
        .with_response(Payload::text("ok"))
        .with_created_at(fixed_time());
    assert_ok!(store.insert(&entry).await);

    let row = sqlx::query(
        "SELECT id, request_id, action, endpoint, request, response, created_at, created_by \
         FROM audit_trail",
    )
    .fetch_one(executor.pool())
    .await
    .unwrap();

    assert_eq!(row.get::<String, _>("id"), entry.id);
    assert_eq!(row.get::<Option<String>, _>("request_id").as_deref(), Some("req-1"));
    assert_eq!(row.get::<String, _>("action"), "login");
    assert_eq!(row.get::<Option<String>, _>("endpoint"), None);
    assert_eq!(
        row.get::<Option<String>, _>("request").as_deref(),
        Some(r#"{"user":"alice"}"#)
    );
    assert_eq!(row.get::<Option<String>, _>("response").as_deref(), Some("ok"));
    assert_eq!(row.get::<DateTime<Utc>, _>("created_at"), fixed_time());
    assert_eq!(row.get::<Option<String>, _>("created_by").as_deref(), Some("alice"));

    executor.close().await;
}

#[tokio::test]
async fn test_duplicate_id_surfaces_database_error() {
    let executor = in_memory().await;
    let store = assert_ok!(PersistenceStore::new(executor, StoreConfig::default()));
    assert_ok!(store.ensure_schema().await);

    let entry = Entry::new("login").with_id("dup").with_created_at(fixed_time());
    assert_ok!(store.insert(&entry).await);

    let err = assert_err!(store.insert(&entry).await);
    assert!(matches!(err, auditrelay_store::StoreError::Database(_)));
}

#[tokio::test]
async fn test_insert_without_table_fails() {
    let executor = in_memory().await;
    let store = assert_ok!(PersistenceStore::new(
        executor,
        StoreConfig::new("missing_table", PlaceholderStyle::Auto)
    ));

    let entry = Entry::new("login").with_id("a").with_created_at(fixed_time());
    assert_err!(store.insert(&entry).await);
}

#[tokio::test]
async fn test_file_database_persists_across_pools() {
    let dir = temp_dir();
    let url = format!("sqlite://{}", dir.path().join("audit.db").display());

    let first = Arc::new(assert_ok!(SqliteExecutor::connect(&DbConfig::new(url.clone())).await));
    let store = assert_ok!(PersistenceStore::new(first.clone(), StoreConfig::default()));
    assert_ok!(store.ensure_schema().await);
    assert_ok!(
        store
            .insert(&Entry::new("logout").with_id("x1").with_created_at(fixed_time()))
            .await
    );
    first.close().await;

    let second = assert_ok!(SqliteExecutor::connect(&DbConfig::new(url)).await);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_trail")
        .fetch_one(second.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}
