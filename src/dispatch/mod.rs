//! Error dispatch.
//!
//! Turns an [`AppError`] into the wire response, logs it at a level chosen
//! from its status and counts it per kind.

mod counters;

pub use counters::ErrorCounters;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, warn};

use crate::error::AppError;

/// Message returned for faults that escaped the error taxonomy.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

/// One request-validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// Location of the offending input, e.g. `body.question`.
    pub loc: String,
    pub msg: String,
}

impl FieldViolation {
    pub fn new(loc: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            loc: loc.into(),
            msg: msg.into(),
        }
    }
}

/// Status code plus JSON error envelope.
#[derive(Debug, Clone)]
pub struct WireResponse {
    status: u16,
    body: JsonValue,
}

impl WireResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &JsonValue {
        &self.body
    }
}

impl IntoResponse for WireResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.body)).into_response()
    }
}

/// Maps errors to wire responses and records them.
#[derive(Debug, Clone)]
pub struct ErrorDispatcher {
    counters: Arc<ErrorCounters>,
}

impl ErrorDispatcher {
    pub fn new(counters: Arc<ErrorCounters>) -> Self {
        Self { counters }
    }

    pub fn counters(&self) -> &Arc<ErrorCounters> {
        &self.counters
    }

    /// Logs, counts and serializes `err`.
    ///
    /// Server faults (5xx) are logged at error level with their cause chain,
    /// client faults at warn level.
    pub fn dispatch(&self, err: AppError) -> WireResponse {
        let status = err.status_code();
        self.dispatch_at(err, status)
    }

    /// Reports a transport-level HTTP failure, such as an unknown route.
    ///
    /// The error carries the internal-error code with the original status in
    /// `http_status`, and the response keeps that status.
    pub fn dispatch_http_status(&self, status: StatusCode) -> WireResponse {
        let message = status.canonical_reason().unwrap_or("HTTP error occurred");
        let err = AppError::internal_with_message(message).with_detail("http_status", status.as_u16());
        self.dispatch_at(err, status.as_u16())
    }

    /// Logs at the level chosen by `status`, counts and serializes `err`
    /// into a response with that status.
    fn dispatch_at(&self, err: AppError, status: u16) -> WireResponse {
        let details = JsonValue::Object(err.details().clone());

        if status >= 500 {
            error!(
                correlation_id = %err.correlation_id(),
                code = %err.kind(),
                details = %details,
                cause = %cause_chain(&err),
                "Server error: {}",
                err.message()
            );
        } else {
            warn!(
                correlation_id = %err.correlation_id(),
                code = %err.kind(),
                details = %details,
                "Client error: {}",
                err.message()
            );
        }

        self.counters.increment(err.kind());

        WireResponse {
            status,
            body: err.to_wire_format(),
        }
    }

    /// Reports request fields that failed to parse or validate.
    pub fn dispatch_validation(&self, violations: &[FieldViolation]) -> WireResponse {
        let reason = if violations.is_empty() {
            "Validation error".to_string()
        } else {
            violations
                .iter()
                .map(|v| format!("{}: {}", v.loc, v.msg))
                .collect::<Vec<_>>()
                .join("; ")
        };

        let err = AppError::invalid_request_data("request_body", reason)
            .with_detail("validation_errors", serde_json::json!(violations));
        self.dispatch(err)
    }

    /// Reports a fault that is not an [`AppError`].
    ///
    /// The client only sees a generic message and a fresh correlation id; the
    /// fault itself goes to the log.
    pub fn dispatch_unexpected(&self, fault: anyhow::Error) -> WireResponse {
        let err = AppError::internal_with_message(UNEXPECTED_ERROR_MESSAGE)
            .with_boxed_source(fault.into());
        self.dispatch(err)
    }
}

/// Renders the cause chain as `a: b: c`, or `-` when there is none.
fn cause_chain(err: &AppError) -> String {
    let mut parts = Vec::new();
    let mut current = err.cause().map(|c| c as &(dyn std::error::Error + 'static));
    while let Some(cause) = current {
        parts.push(cause.to_string());
        current = cause.source();
    }
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join(": ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn dispatcher() -> ErrorDispatcher {
        ErrorDispatcher::new(Arc::new(ErrorCounters::new()))
    }

    #[test]
    fn test_dispatch_uses_error_status_and_envelope() {
        let dispatcher = dispatcher();
        let err = AppError::unsafe_statement(Some("DROP TABLE t"));
        let correlation_id = err.correlation_id().to_string();

        let response = dispatcher.dispatch(err);

        assert_eq!(response.status(), 403);
        assert_eq!(response.body()["error"]["code"], "UNSAFE_SQL_DETECTED");
        assert_eq!(response.body()["error"]["correlation_id"], correlation_id.as_str());
        assert_eq!(dispatcher.counters().get(ErrorKind::UnsafeStatement), 1);
    }

    #[test]
    fn test_dispatch_upstream_statuses() {
        let dispatcher = dispatcher();
        assert_eq!(
            dispatcher.dispatch(AppError::upstream_service("OpenAI", true)).status(),
            503
        );
        assert_eq!(
            dispatcher.dispatch(AppError::upstream_service("OpenAI", false)).status(),
            502
        );
        assert_eq!(dispatcher.counters().get(ErrorKind::UpstreamService), 2);
    }

    #[test]
    fn test_dispatch_validation() {
        let dispatcher = dispatcher();
        let response = dispatcher.dispatch_validation(&[
            FieldViolation::new("body.question", "field required"),
            FieldViolation::new("body.file", "expected a file"),
        ]);

        assert_eq!(response.status(), 400);
        let body = &response.body()["error"];
        assert_eq!(body["code"], "INVALID_REQUEST_DATA");
        assert_eq!(body["field"], "request_body");
        assert_eq!(
            body["message"],
            "Invalid request_body: body.question: field required; body.file: expected a file"
        );
        assert_eq!(
            body["validation_errors"],
            serde_json::json!([
                {"loc": "body.question", "msg": "field required"},
                {"loc": "body.file", "msg": "expected a file"},
            ])
        );
    }

    #[test]
    fn test_dispatch_unexpected_hides_fault() {
        let dispatcher = dispatcher();
        let response = dispatcher.dispatch_unexpected(anyhow::anyhow!("secret connection string"));

        assert_eq!(response.status(), 500);
        let body = &response.body()["error"];
        assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
        assert_eq!(body["message"], UNEXPECTED_ERROR_MESSAGE);
        assert!(!response.body().to_string().contains("secret"));
        assert_eq!(dispatcher.counters().get(ErrorKind::Internal), 1);
    }

    #[test]
    fn test_dispatch_unexpected_mints_distinct_ids() {
        let dispatcher = dispatcher();
        let a = dispatcher.dispatch_unexpected(anyhow::anyhow!("a"));
        let b = dispatcher.dispatch_unexpected(anyhow::anyhow!("b"));
        assert_ne!(
            a.body()["error"]["correlation_id"],
            b.body()["error"]["correlation_id"]
        );
    }

    #[test]
    fn test_cause_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = AppError::internal().with_source(io);
        assert_eq!(cause_chain(&err), "disk gone");
        assert_eq!(cause_chain(&AppError::internal()), "-");
    }

    #[test]
    fn test_dispatch_http_status_keeps_status() {
        let dispatcher = dispatcher();

        let response = dispatcher.dispatch_http_status(StatusCode::NOT_FOUND);

        assert_eq!(response.status(), 404);
        let body = &response.body()["error"];
        assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
        assert_eq!(body["message"], "Not Found");
        assert_eq!(body["http_status"], 404);
        assert_eq!(dispatcher.counters().get(ErrorKind::Internal), 1);
    }

    #[tokio::test]
    async fn test_into_response_status() {
        let response = dispatcher()
            .dispatch(AppError::datastore_connection())
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
