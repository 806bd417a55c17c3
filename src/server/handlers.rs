use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::FormRejection;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::dispatch::{FieldViolation, WireResponse};
use crate::query::{prepare_report_result, QueryResult};
use crate::voice::StagedUpload;

use super::AppState;

/// Characters of the question kept in a report filename.
const FILENAME_QUESTION_CHARS: usize = 30;

/// Query outcome as returned to HTTP clients, with every cell as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskResponse {
    pub question: String,
    pub sql: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub execution_time_ms: u64,
    pub error: Option<String>,
}

impl From<&QueryResult> for AskResponse {
    fn from(result: &QueryResult) -> Self {
        Self {
            question: result.question().to_string(),
            sql: result.sql().map(str::to_string),
            headers: result.headers().to_vec(),
            rows: result.display_rows(),
            execution_time_ms: result.execution_time_ms(),
            error: result.error().map(str::to_string),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct AskForm {
    question: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ReportForm {
    rows_json: String,
    headers_json: Option<String>,
    question: String,
    sql: Option<String>,
}

pub(super) async fn health() -> Json<JsonValue> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub(super) async fn ask(
    State(state): State<AppState>,
    form: std::result::Result<Form<AskForm>, FormRejection>,
) -> std::result::Result<Json<AskResponse>, WireResponse> {
    let Form(form) = form.map_err(|rejection| {
        state
            .dispatcher
            .dispatch_validation(&[violation(rejection.body_text())])
    })?;

    info!("Received question: {}", form.question);
    let result = state
        .pipeline
        .process_question(&form.question)
        .await
        .map_err(|e| state.dispatcher.dispatch(e))?;

    Ok(Json(AskResponse::from(&result)))
}

pub(super) async fn ask_voice(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Json<AskResponse>, WireResponse> {
    let mut multipart = multipart.map_err(|rejection| {
        state
            .dispatcher
            .dispatch_validation(&[FieldViolation::new("body", rejection.body_text())])
    })?;

    let multipart_failure = |e: MultipartError| {
        state
            .dispatcher
            .dispatch_validation(&[FieldViolation::new("body.file", e.body_text())])
    };

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_failure)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_failure)?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(state
            .dispatcher
            .dispatch_validation(&[FieldViolation::new("body.file", "field required")]));
    };

    let staged = StagedUpload::stage_async(filename, bytes)
        .await
        .map_err(|e| state.dispatcher.dispatch(e))?;
    debug!("Received audio upload of {} bytes", staged.size());

    let question = state
        .transcriber
        .transcribe(staged.path())
        .await
        .map_err(|e| state.dispatcher.dispatch(e))?;
    info!("Transcribed question: {}", question);

    let result = state
        .pipeline
        .process_question(&question)
        .await
        .map_err(|e| state.dispatcher.dispatch(e))?;

    Ok(Json(AskResponse::from(&result)))
}

pub(super) async fn download_report_pdf(
    State(state): State<AppState>,
    form: std::result::Result<Form<ReportForm>, FormRejection>,
) -> std::result::Result<Response, WireResponse> {
    let Form(form) = form.map_err(|rejection| {
        state
            .dispatcher
            .dispatch_validation(&[violation(rejection.body_text())])
    })?;

    let result = prepare_report_result(
        Some(&form.question),
        form.sql.as_deref(),
        &form.rows_json,
        form.headers_json.as_deref(),
    )
    .map_err(|e| state.dispatcher.dispatch(e))?;

    let pdf = state
        .reports
        .generate_report(&result)
        .await
        .map_err(|e| state.dispatcher.dispatch(e))?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        report_filename(result.question())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, pdf.len().to_string()),
        ],
        pdf,
    )
        .into_response())
}

pub(super) async fn error_stats(State(state): State<AppState>) -> Json<BTreeMap<&'static str, u64>> {
    Json(state.dispatcher.counters().snapshot())
}

pub(super) async fn not_found(State(state): State<AppState>) -> WireResponse {
    state.dispatcher.dispatch_http_status(StatusCode::NOT_FOUND)
}

pub(super) async fn method_not_allowed(State(state): State<AppState>) -> WireResponse {
    state
        .dispatcher
        .dispatch_http_status(StatusCode::METHOD_NOT_ALLOWED)
}

/// `report_` plus the first 30 characters of the question with spaces
/// replaced by underscores.
///
/// Characters that cannot appear in a quoted header value become underscores
/// too.
pub fn report_filename(question: &str) -> String {
    let stem: String = question
        .chars()
        .take(FILENAME_QUESTION_CHARS)
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    format!("report_{stem}.pdf")
}

/// Turns a form rejection message into a violation located at the offending
/// field when serde names one.
fn violation(text: String) -> FieldViolation {
    static MISSING_FIELD: OnceLock<Option<Regex>> = OnceLock::new();
    let missing = MISSING_FIELD
        .get_or_init(|| Regex::new(r"missing field `([^`]+)`").ok())
        .as_ref()
        .and_then(|re| re.captures(&text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    match missing {
        Some(field) => FieldViolation::new(format!("body.{field}"), "field required"),
        None => FieldViolation::new("body", text),
    }
}
