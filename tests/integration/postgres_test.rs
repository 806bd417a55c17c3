//! PostgreSQL executor integration tests.
//!
//! Skipped unless DATABASE_URL points at a reachable database.

use pretty_assertions::assert_eq;
use sql_assistant::config::DatabaseConfig;
use sql_assistant::db::{PostgresExecutor, SqlExecutor, Value};
use sql_assistant::error::ErrorKind;

/// Helper to create a test executor.
fn get_test_executor() -> Option<PostgresExecutor> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = DatabaseConfig {
        url: Some(url),
        ..Default::default()
    };
    PostgresExecutor::connect(&config).ok()
}

#[tokio::test]
async fn test_execute_simple_select() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let records = executor
        .execute("SELECT 1 AS num, 'hello' AS greeting, NULL::text AS nothing")
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    let columns: Vec<&str> = records[0].columns().collect();
    assert_eq!(columns, vec!["num", "greeting", "nothing"]);
    assert_eq!(records[0].get("num"), Some(&Value::Int(1)));
    assert_eq!(records[0].get("greeting"), Some(&Value::from("hello")));
    assert_eq!(records[0].get("nothing"), Some(&Value::Null));

    executor.close().await;
}

#[tokio::test]
async fn test_numeric_decodes_as_float() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let records = executor.execute("SELECT 12.5::numeric AS cost").await.unwrap();
    assert_eq!(records[0].get("cost"), Some(&Value::Float(12.5)));

    executor.close().await;
}

#[tokio::test]
async fn test_invalid_sql_is_execution_error() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = executor
        .execute("SELECT * FROM table_that_does_not_exist_xyz")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DatastoreExecution);
    assert_eq!(err.status_code(), 502);
    assert!(err.detail("sql_preview").is_some());
    assert!(err.detail("error_type").is_some());

    executor.close().await;
}

#[tokio::test]
async fn test_executor_rejects_unsafe_sql() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = executor.execute("DELETE FROM ai_services").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsafeStatement);

    executor.close().await;
}

#[tokio::test]
async fn test_introspect_unknown_tables_is_empty() {
    let Some(executor) = get_test_executor() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let schema = executor
        .introspect_schema(&["table_that_does_not_exist_xyz".to_string()])
        .await
        .unwrap();
    assert!(schema.is_empty());

    executor.close().await;
}
