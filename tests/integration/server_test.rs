//! HTTP surface tests.
//!
//! Requests are driven straight into the router; no socket is bound.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::Value as JsonValue;
use sql_assistant::db::{MockExecutor, Record};
use sql_assistant::dispatch::{ErrorCounters, UNEXPECTED_ERROR_MESSAGE};
use sql_assistant::error::ErrorKind;
use sql_assistant::llm::MockSqlGenerator;
use sql_assistant::query::QueryPipeline;
use sql_assistant::report::PdfReportGenerator;
use sql_assistant::server::{build_router, AppState};
use sql_assistant::voice::MockTranscriber;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "sql-assistant-test-boundary";

struct TestApp {
    router: Router,
    executor: Arc<MockExecutor>,
    counters: Arc<ErrorCounters>,
}

fn app_with(generator: MockSqlGenerator) -> TestApp {
    let executor = Arc::new(MockExecutor::with_rows(vec![
        Record::new().with("user_name", "alice"),
        Record::new().with("user_name", "bob"),
    ]));
    let counters = Arc::new(ErrorCounters::new());
    let state = AppState::new(
        QueryPipeline::new(Arc::new(generator), executor.clone()),
        Arc::new(MockTranscriber::default()),
        Arc::new(PdfReportGenerator::new()),
        counters.clone(),
    );
    TestApp {
        router: build_router(state),
        executor,
        counters,
    }
}

fn app() -> TestApp {
    app_with(MockSqlGenerator::new())
}

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn upload_request(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/ask-voice")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, JsonValue) {
    let (status, bytes) = send(router, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let request = Request::get("/health").body(Body::empty()).unwrap();

    let (status, body) = send_json(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_ask_returns_display_rows() {
    let app = app();

    let (status, body) =
        send_json(&app.router, form_request("/ask", "question=Show+all+users")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["question"], "Show all users");
    assert_eq!(body["sql"], "SELECT user_name FROM ai_service_usage;");
    assert_eq!(body["headers"], serde_json::json!(["user_name"]));
    assert_eq!(body["rows"], serde_json::json!([["alice"], ["bob"]]));
    assert!(body["error"].is_null());
}

#[tokio::test]
async fn test_ask_blank_question() {
    let app = app();

    let (status, body) = send_json(&app.router, form_request("/ask", "question=+++")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "EMPTY_QUESTION");
    assert_eq!(app.counters.get(ErrorKind::EmptyInput), 1);
}

#[tokio::test]
async fn test_ask_missing_question_is_validation_error() {
    let app = app();

    let (status, body) = send_json(&app.router, form_request("/ask", "")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST_DATA");
    assert_eq!(body["error"]["validation_errors"][0]["loc"], "body.question");
    assert_eq!(app.counters.get(ErrorKind::InvalidRequestData), 1);
}

#[tokio::test]
async fn test_ask_blocks_unsafe_sql() {
    let app = app();

    let (status, body) = send_json(
        &app.router,
        form_request("/ask", "question=Please+drop+the+usage+table"),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "UNSAFE_SQL_DETECTED");
    assert_eq!(body["error"]["sql_preview"], "DROP TABLE ai_service_usage;");
    assert!(body["error"]["correlation_id"].is_string());
    assert_eq!(app.executor.calls(), 0);
}

#[tokio::test]
async fn test_ask_voice_runs_transcript() {
    let app = app();

    let (status, body) =
        send_json(&app.router, upload_request("file", "question.wav", b"RIFF....WAVE")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["question"], "Show all users");
    assert_eq!(body["rows"], serde_json::json!([["alice"], ["bob"]]));
}

#[tokio::test]
async fn test_ask_voice_rejects_unknown_format() {
    let app = app();

    let (status, body) =
        send_json(&app.router, upload_request("file", "notes.txt", b"hello")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FILE_FORMAT");
    assert_eq!(body["error"]["file_type"], "txt");
    assert_eq!(app.executor.calls(), 0);
}

#[tokio::test]
async fn test_ask_voice_rejects_empty_upload() {
    let app = app();

    let (status, body) = send_json(&app.router, upload_request("file", "q.mp3", b"")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FILE_FORMAT");
    assert_eq!(body["error"]["reason"], "Empty file");
    assert_eq!(body["error"]["file_size"], 0);
}

#[tokio::test]
async fn test_ask_voice_requires_file_field() {
    let app = app();

    let (status, body) =
        send_json(&app.router, upload_request("audio", "q.wav", b"RIFF")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST_DATA");
    assert_eq!(body["error"]["validation_errors"][0]["loc"], "body.file");
}

#[tokio::test]
async fn test_download_report_pdf() {
    let app = app();
    let rows = r#"[{"user_name":"alice","tokens":10},{"user_name":"bob","tokens":null}]"#;
    let body = format!(
        "rows_json={}&question=Top+users+by+tokens&sql=SELECT+1",
        encode(rows)
    );

    let response = app
        .router
        .clone()
        .oneshot(form_request("/download-report-pdf", &body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"report_Top_users_by_tokens.pdf\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_download_report_pdf_without_rows() {
    let app = app();

    let (status, body) = send_json(
        &app.router,
        form_request("/download-report-pdf", "rows_json=%5B%5D&question=q"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST_DATA");
    assert_eq!(body["error"]["field"], "rows_json");
}

#[tokio::test]
async fn test_error_stats_counts_by_code() {
    let app = app();
    send(&app.router, form_request("/ask", "question=")).await;
    send(&app.router, form_request("/ask", "question=")).await;
    send(
        &app.router,
        form_request("/ask", "question=drop+everything"),
    )
    .await;

    let request = Request::get("/stats/errors").body(Body::empty()).unwrap();
    let (status, body) = send_json(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({"EMPTY_QUESTION": 2, "UNSAFE_SQL_DETECTED": 1})
    );
}

#[tokio::test]
async fn test_panic_becomes_internal_error() {
    let app = app_with(MockSqlGenerator::failing(|_| panic!("generator exploded")));

    let (status, body) =
        send_json(&app.router, form_request("/ask", "question=Show+all+users")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_SERVER_ERROR");
    assert_eq!(body["error"]["message"], UNEXPECTED_ERROR_MESSAGE);
    assert!(!body.to_string().contains("exploded"));
    assert_eq!(app.counters.get(ErrorKind::Internal), 1);
}

#[tokio::test]
async fn test_unknown_route_uses_error_envelope() {
    let app = app();
    let request = Request::get("/nope").body(Body::empty()).unwrap();

    let (status, body) = send_json(&app.router, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "INTERNAL_SERVER_ERROR");
    assert_eq!(body["error"]["http_status"], 404);
    assert!(body["error"]["correlation_id"].is_string());
    assert_eq!(app.counters.get(ErrorKind::Internal), 1);
}

#[tokio::test]
async fn test_wrong_method_uses_error_envelope() {
    let app = app();
    let request = Request::get("/ask").body(Body::empty()).unwrap();

    let (status, body) = send_json(&app.router, request).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"]["code"], "INTERNAL_SERVER_ERROR");
    assert_eq!(body["error"]["message"], "Method Not Allowed");
    assert_eq!(body["error"]["http_status"], 405);
    assert_eq!(app.counters.get(ErrorKind::Internal), 1);
}

/// Percent-encodes a form value.
fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'*' => {
                (b as char).to_string()
            }
            b' ' => "+".to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}
