use auditrelay_store::{EntryStore, PersistenceStore, PlaceholderStyle, SqlValue, StoreConfig};
use auditrelay_test_utils::{assert_ok, fixed_time, RecordingExecutor};
use auditrelay_types::Entry;

fn entry() -> Entry {
    Entry::new("login")
        .with_id("abc")
        .with_request_id("req-1")
        .with_created_at(fixed_time())
}

#[tokio::test]
async fn test_dollar_and_question_bind_identical_values() {
    let pg = RecordingExecutor::postgres();
    let dollar = assert_ok!(PersistenceStore::new(pg.clone(), StoreConfig::default()));

    let lite = RecordingExecutor::sqlite();
    let question = assert_ok!(PersistenceStore::new(lite.clone(), StoreConfig::default()));

    assert_ok!(dollar.insert(&entry()).await);
    assert_ok!(question.insert(&entry()).await);

    let dollar_insert = &pg.inserts()[0];
    let question_insert = &lite.inserts()[0];

    assert!(dollar_insert
        .sql
        .ends_with("VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"));
    assert!(question_insert
        .sql
        .ends_with("VALUES (?, ?, ?, ?, ?, ?, ?, ?)"));
    assert_eq!(dollar_insert.values, question_insert.values);

    assert_eq!(
        dollar_insert.values,
        vec![
            SqlValue::Text("abc".into()),
            SqlValue::Text("req-1".into()),
            SqlValue::Text("login".into()),
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Null,
            SqlValue::Timestamp(fixed_time()),
            SqlValue::Null,
        ]
    );
}

#[tokio::test]
async fn test_explicit_style_overrides_driver() {
    let pg = RecordingExecutor::postgres();
    let store = assert_ok!(PersistenceStore::new(
        pg.clone(),
        StoreConfig::new("", PlaceholderStyle::Question)
    ));
    assert_ok!(store.insert(&entry()).await);

    assert!(pg.inserts()[0].sql.contains("?"));
    assert!(!pg.inserts()[0].sql.contains("$1"));
}

#[tokio::test]
async fn test_executor_failure_is_returned() {
    let lite = RecordingExecutor::sqlite();
    let store = assert_ok!(PersistenceStore::new(lite.clone(), StoreConfig::default()));
    lite.set_failing(true);

    assert!(store.insert(&entry()).await.is_err());
    assert!(lite.statements().is_empty());
}
