//! Error types for the SQL assistant.
//!
//! Every failure is an [`AppError`]: a closed [`ErrorKind`] plus structured
//! details, serialized into one wire format regardless of where it was raised.

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value as JsonValue};
use std::fmt;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Maximum characters of SQL kept in a `sql_preview` detail.
pub const SQL_PREVIEW_CHARS: usize = 50;

/// Maximum characters of question text kept in a `question_preview` detail.
pub const QUESTION_PREVIEW_CHARS: usize = 100;

/// Audio container formats accepted for voice questions.
pub const SUPPORTED_AUDIO_FORMATS: [&str; 7] = ["mp3", "mp4", "mpeg", "mpga", "m4a", "wav", "webm"];

/// Wire fields owned by the error envelope. Details may not use these keys.
const RESERVED_KEYS: [&str; 4] = ["code", "message", "correlation_id", "timestamp"];

/// Boxed underlying fault carried as an error's cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// The question was empty or whitespace only.
    EmptyInput,
    /// An uploaded file has an unsupported or missing format.
    InvalidFileFormat,
    /// Request payload could not be understood.
    InvalidRequestData,
    /// Generated SQL failed the safety gate.
    UnsafeStatement,
    /// Caller attempted an operation it is not allowed to perform.
    UnauthorizedOperation,
    /// Natural-language to SQL generation failed.
    GenerationFailed,
    /// Speech-to-text failed.
    TranscriptionFailed,
    /// Report rendering failed.
    ReportGenerationFailed,
    /// A remote API (LLM, transcription) failed.
    UpstreamService,
    /// The database could not be reached.
    DatastoreConnection,
    /// The database rejected or failed the statement.
    DatastoreExecution,
    /// Unexpected internal failure.
    Internal,
    /// Missing or invalid configuration.
    Configuration,
}

impl ErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [ErrorKind; 13] = [
        Self::EmptyInput,
        Self::InvalidFileFormat,
        Self::InvalidRequestData,
        Self::UnsafeStatement,
        Self::UnauthorizedOperation,
        Self::GenerationFailed,
        Self::TranscriptionFailed,
        Self::ReportGenerationFailed,
        Self::UpstreamService,
        Self::DatastoreConnection,
        Self::DatastoreExecution,
        Self::Internal,
        Self::Configuration,
    ];

    /// Returns the stable wire code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "EMPTY_QUESTION",
            Self::InvalidFileFormat => "INVALID_FILE_FORMAT",
            Self::InvalidRequestData => "INVALID_REQUEST_DATA",
            Self::UnsafeStatement => "UNSAFE_SQL_DETECTED",
            Self::UnauthorizedOperation => "UNAUTHORIZED_OPERATION",
            Self::GenerationFailed => "SQL_GENERATION_FAILED",
            Self::TranscriptionFailed => "VOICE_TRANSCRIPTION_FAILED",
            Self::ReportGenerationFailed => "REPORT_GENERATION_FAILED",
            Self::UpstreamService => "UPSTREAM_SERVICE_ERROR",
            Self::DatastoreConnection => "DATABASE_CONNECTION_ERROR",
            Self::DatastoreExecution => "DATABASE_EXECUTION_ERROR",
            Self::Internal => "INTERNAL_SERVER_ERROR",
            Self::Configuration => "CONFIGURATION_ERROR",
        }
    }

    /// Returns the canonical human message for this kind.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::EmptyInput => "Question cannot be empty",
            Self::InvalidFileFormat => "Invalid file format",
            Self::InvalidRequestData => "Invalid request data",
            Self::UnsafeStatement => "Only SELECT queries are allowed for security reasons",
            Self::UnauthorizedOperation => "Operation is not allowed",
            Self::GenerationFailed => "Failed to generate SQL query from the question",
            Self::TranscriptionFailed => "Failed to transcribe voice input",
            Self::ReportGenerationFailed => "Failed to generate report",
            Self::UpstreamService => "External service is temporarily unavailable",
            Self::DatastoreConnection => "Database connection failed",
            Self::DatastoreExecution => "Database query execution failed",
            Self::Internal => "An internal server error occurred",
            Self::Configuration => "Configuration error",
        }
    }

    /// Returns the severity class a fresh error of this kind starts with.
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::EmptyInput | Self::InvalidFileFormat | Self::InvalidRequestData => {
                Severity::ClientFault
            }
            Self::UnsafeStatement | Self::UnauthorizedOperation => Severity::Forbidden,
            Self::GenerationFailed | Self::TranscriptionFailed | Self::ReportGenerationFailed => {
                Severity::Unprocessable
            }
            Self::UpstreamService | Self::DatastoreConnection => Severity::UpstreamUnavailable,
            Self::DatastoreExecution => Severity::UpstreamRejected,
            Self::Internal | Self::Configuration => Severity::Internal,
        }
    }

    /// Position of this kind in [`ErrorKind::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Severity class of an error; decides the transport status and log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    ClientFault,
    Forbidden,
    Unprocessable,
    UpstreamUnavailable,
    UpstreamRejected,
    Internal,
}

impl Severity {
    /// HTTP-equivalent status code.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ClientFault => 400,
            Self::Forbidden => 403,
            Self::Unprocessable => 422,
            Self::UpstreamRejected => 502,
            Self::UpstreamUnavailable => 503,
            Self::Internal => 500,
        }
    }

    /// Returns true for the 5xx-equivalent classes.
    pub fn is_server_fault(&self) -> bool {
        self.status_code() >= 500
    }
}

/// The uniform error object raised by every component.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    kind: ErrorKind,
    message: String,
    severity: Severity,
    details: Map<String, JsonValue>,
    correlation_id: String,
    timestamp: String,
    #[source]
    cause: Option<BoxError>,
}

impl AppError {
    /// Raises an error of `kind` with a freshly minted correlation id.
    pub fn raise(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::raise_correlated(kind, message, Uuid::new_v4().to_string())
    }

    /// Raises an error that reuses an existing correlation id.
    pub fn raise_correlated(
        kind: ErrorKind,
        message: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            severity: kind.default_severity(),
            details: Map::new(),
            correlation_id: correlation_id.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
            cause: None,
        }
    }

    /// Adds one detail field.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.insert_detail(key, value);
        self
    }

    /// Adds every field of `details`.
    pub fn with_details(mut self, details: Map<String, JsonValue>) -> Self {
        for (key, value) in details {
            self.insert_detail(key, value);
        }
        self
    }

    /// Attaches the underlying fault.
    pub fn with_source<E>(mut self, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Attaches an already boxed underlying fault.
    pub fn with_boxed_source(mut self, cause: BoxError) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Overrides the severity derived from the kind.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Inserts a detail in place, used by callers enriching an error up the stack.
    ///
    /// Keys that would shadow an envelope field are dropped.
    pub fn insert_detail(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        let key = key.into();
        if RESERVED_KEYS.contains(&key.as_str()) {
            warn!(key = %key, code = %self.kind, "Dropping error detail that collides with an envelope field");
            return;
        }
        self.details.insert(key, value.into());
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// HTTP-equivalent status code for this error.
    pub fn status_code(&self) -> u16 {
        self.severity.status_code()
    }

    pub fn details(&self) -> &Map<String, JsonValue> {
        &self.details
    }

    /// Returns a single detail value.
    pub fn detail(&self, key: &str) -> Option<&JsonValue> {
        self.details.get(key)
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Serializes the error into the wire envelope.
    ///
    /// Detail fields are spread flat next to the four fixed fields.
    pub fn to_wire_format(&self) -> JsonValue {
        let mut body = Map::with_capacity(RESERVED_KEYS.len() + self.details.len());
        body.insert("code".to_string(), json!(self.kind.code()));
        body.insert("message".to_string(), json!(self.message));
        body.insert("correlation_id".to_string(), json!(self.correlation_id));
        body.insert("timestamp".to_string(), json!(self.timestamp));
        for (key, value) in &self.details {
            body.insert(key.clone(), value.clone());
        }
        json!({ "error": body })
    }
}

// Domain constructors. Each pins the kind, the canonical message and the
// detail keys it populates.
impl AppError {
    /// Question was empty after trimming.
    pub fn empty_question() -> Self {
        Self::raise(ErrorKind::EmptyInput, ErrorKind::EmptyInput.default_message())
            .with_detail("field", "question")
    }

    /// Uploaded file format is unsupported or missing.
    pub fn invalid_file_format(file_type: Option<&str>) -> Self {
        let message = match file_type {
            Some(ext) => format!("Invalid file format: {ext}"),
            None => ErrorKind::InvalidFileFormat.default_message().to_string(),
        };
        let err = Self::raise(ErrorKind::InvalidFileFormat, message).with_detail("field", "file");
        match file_type {
            Some(ext) => err
                .with_detail("file_type", ext)
                .with_detail("supported_formats", json!(SUPPORTED_AUDIO_FORMATS)),
            None => err,
        }
    }

    /// A request field could not be understood.
    pub fn invalid_request_data(field: &str, reason: impl fmt::Display) -> Self {
        Self::raise(
            ErrorKind::InvalidRequestData,
            format!("Invalid {field}: {reason}"),
        )
        .with_detail("field", field)
    }

    /// Statement rejected by the safety gate.
    pub fn unsafe_statement(sql: Option<&str>) -> Self {
        let err = Self::raise(
            ErrorKind::UnsafeStatement,
            ErrorKind::UnsafeStatement.default_message(),
        )
        .with_detail("blocked_operation", "sql_execution");
        match sql {
            Some(sql) if !sql.is_empty() => {
                err.with_detail("sql_preview", preview(sql, SQL_PREVIEW_CHARS))
            }
            _ => err,
        }
    }

    /// Caller tried an operation that is not permitted.
    pub fn unauthorized_operation(operation: &str) -> Self {
        Self::raise(
            ErrorKind::UnauthorizedOperation,
            ErrorKind::UnauthorizedOperation.default_message(),
        )
        .with_detail("blocked_operation", operation)
    }

    /// SQL generation failed for `question`.
    pub fn generation_failed(question: Option<&str>) -> Self {
        let err = Self::raise(
            ErrorKind::GenerationFailed,
            ErrorKind::GenerationFailed.default_message(),
        )
        .with_detail("stage", "sql_generation");
        match question {
            Some(q) if !q.is_empty() => {
                err.with_detail("question_preview", preview(q, QUESTION_PREVIEW_CHARS))
            }
            _ => err,
        }
    }

    /// Transcription failed; callers add `file_path`, `file_size` and `error`.
    pub fn transcription_failed() -> Self {
        Self::raise(
            ErrorKind::TranscriptionFailed,
            ErrorKind::TranscriptionFailed.default_message(),
        )
        .with_detail("stage", "voice_transcription")
    }

    /// Rendering a report of `report_type` failed.
    pub fn report_generation_failed(report_type: &str) -> Self {
        Self::raise(
            ErrorKind::ReportGenerationFailed,
            format!("Failed to generate {report_type} report"),
        )
        .with_detail("stage", "report_generation")
        .with_detail("report_type", report_type)
    }

    /// A remote service failed. Temporary failures map to 503, others to 502.
    pub fn upstream_service(service: &str, is_temporary: bool) -> Self {
        let (message, severity) = if is_temporary {
            (
                format!("{service} service is temporarily unavailable"),
                Severity::UpstreamUnavailable,
            )
        } else {
            (
                format!("{service} service rejected the request"),
                Severity::UpstreamRejected,
            )
        };
        Self::raise(ErrorKind::UpstreamService, message)
            .with_severity(severity)
            .with_detail("service", service)
            .with_detail("is_temporary", is_temporary)
    }

    /// The database could not be reached.
    pub fn datastore_connection() -> Self {
        Self::raise(
            ErrorKind::DatastoreConnection,
            ErrorKind::DatastoreConnection.default_message(),
        )
        .with_detail("service", "PostgreSQL")
        .with_detail("is_temporary", true)
    }

    /// The database failed to execute `sql`.
    pub fn datastore_execution(sql: Option<&str>) -> Self {
        let err = Self::raise(
            ErrorKind::DatastoreExecution,
            ErrorKind::DatastoreExecution.default_message(),
        )
        .with_detail("service", "PostgreSQL")
        .with_detail("is_temporary", false);
        match sql {
            Some(sql) if !sql.is_empty() => {
                err.with_detail("sql_preview", preview(sql, SQL_PREVIEW_CHARS))
            }
            _ => err,
        }
    }

    /// A configuration value is missing or invalid.
    pub fn configuration(config_key: &str) -> Self {
        Self::raise(
            ErrorKind::Configuration,
            format!("Configuration error: {config_key} not found or invalid"),
        )
        .with_detail("config_key", config_key)
    }

    /// Generic internal failure.
    pub fn internal() -> Self {
        Self::raise(ErrorKind::Internal, ErrorKind::Internal.default_message())
    }

    /// Internal failure with a specific, non-leaking message.
    pub fn internal_with_message(message: impl Into<String>) -> Self {
        Self::raise(ErrorKind::Internal, message)
    }
}

/// Truncates `text` to `max_chars` characters, appending `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;
