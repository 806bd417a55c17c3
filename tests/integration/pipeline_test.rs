//! End-to-end pipeline tests against the in-memory collaborators.

use pretty_assertions::assert_eq;
use sql_assistant::db::{MockExecutor, Record, Value};
use sql_assistant::error::{AppError, ErrorKind};
use sql_assistant::llm::MockSqlGenerator;
use sql_assistant::query::{QueryPipeline, NO_RESULTS_MESSAGE};
use std::sync::Arc;

fn user_rows() -> Vec<Record> {
    vec![
        Record::new().with("user_name", "alice"),
        Record::new().with("user_name", "bob"),
    ]
}

#[tokio::test]
async fn test_question_to_table() {
    let generator = Arc::new(MockSqlGenerator::new());
    let executor = Arc::new(MockExecutor::with_rows(user_rows()));
    let pipeline = QueryPipeline::new(generator.clone(), executor.clone());

    let result = pipeline.process_question("Show all users").await.unwrap();

    assert_eq!(result.question(), "Show all users");
    assert_eq!(result.sql(), Some("SELECT user_name FROM ai_service_usage;"));
    assert_eq!(result.headers().to_vec(), vec!["user_name".to_string()]);
    assert_eq!(
        result.rows().to_vec(),
        vec![vec![Value::from("alice")], vec![Value::from("bob")]]
    );
    assert!(result.error().is_none());
    assert_eq!(generator.calls(), 1);
    assert_eq!(
        executor.executed_sql(),
        vec!["SELECT user_name FROM ai_service_usage;".to_string()]
    );
}

#[tokio::test]
async fn test_empty_rows_yield_no_results() {
    let pipeline = QueryPipeline::new(
        Arc::new(MockSqlGenerator::new()),
        Arc::new(MockExecutor::with_rows(vec![])),
    );

    let result = pipeline.process_question("Show all users").await.unwrap();

    assert!(result.headers().is_empty());
    assert!(result.rows().is_empty());
    assert_eq!(result.error(), Some(NO_RESULTS_MESSAGE));
    assert!(!result.has_results());
}

#[tokio::test]
async fn test_blank_question_never_reaches_generator() {
    let generator = Arc::new(MockSqlGenerator::new());
    let executor = Arc::new(MockExecutor::new());
    let pipeline = QueryPipeline::new(generator.clone(), executor.clone());

    let err = pipeline.process_question(" \t\n").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::EmptyInput);
    assert_eq!(err.status_code(), 400);
    assert_eq!(generator.calls(), 0);
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_destructive_statement_is_blocked() {
    let executor = Arc::new(MockExecutor::new());
    let pipeline = QueryPipeline::new(Arc::new(MockSqlGenerator::new()), executor.clone());

    let err = pipeline
        .process_question("Please drop the usage table")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsafeStatement);
    assert_eq!(err.status_code(), 403);
    assert_eq!(err.detail("sql_preview").unwrap(), "DROP TABLE ai_service_usage;");
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_execution_failure_carries_context() {
    let pipeline = QueryPipeline::new(
        Arc::new(MockSqlGenerator::new()),
        Arc::new(MockExecutor::failing(|sql| AppError::datastore_execution(Some(sql)))),
    );

    let err = pipeline.process_question("Show all users").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DatastoreExecution);
    assert_eq!(err.status_code(), 502);
    assert_eq!(
        err.detail("sql_query").unwrap(),
        "SELECT user_name FROM ai_service_usage;"
    );
    assert!(err.detail("execution_time_ms").unwrap().is_u64());
}

#[tokio::test]
async fn test_upstream_failure_keeps_its_kind() {
    let executor = Arc::new(MockExecutor::new());
    let pipeline = QueryPipeline::new(
        Arc::new(MockSqlGenerator::failing(|_| {
            AppError::upstream_service("OpenAI", true).with_detail("api_error", "rate limited")
        })),
        executor.clone(),
    );

    let err = pipeline.process_question("Show all users").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UpstreamService);
    assert_eq!(err.status_code(), 503);
    assert_eq!(err.detail("api_error").unwrap(), "rate limited");
    assert!(err.detail("sql_query").unwrap().is_null());
    assert_eq!(executor.calls(), 0);
}
