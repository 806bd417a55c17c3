//! HTTP surface.
//!
//! Builds the axum router and the shared state its handlers run against.

mod handlers;

pub use handlers::{report_filename, AskResponse};

use axum::extract::DefaultBodyLimit;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{MockExecutor, PostgresExecutor, Schema, SqlExecutor};
use crate::dispatch::{ErrorCounters, ErrorDispatcher};
use crate::error::Result;
use crate::llm::{create_generator, LlmProvider, MockSqlGenerator};
use crate::query::QueryPipeline;
use crate::report::{PdfReportGenerator, ReportGenerator};
use crate::voice::{MockTranscriber, Transcriber, WhisperTranscriber, MAX_AUDIO_BYTES};

/// Headroom over the audio limit for multipart framing.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<QueryPipeline>,
    pub transcriber: Arc<dyn Transcriber>,
    pub reports: Arc<dyn ReportGenerator>,
    pub dispatcher: ErrorDispatcher,
}

impl AppState {
    pub fn new(
        pipeline: QueryPipeline,
        transcriber: Arc<dyn Transcriber>,
        reports: Arc<dyn ReportGenerator>,
        counters: Arc<ErrorCounters>,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            transcriber,
            reports,
            dispatcher: ErrorDispatcher::new(counters),
        }
    }

    /// State backed entirely by in-memory collaborators.
    pub fn mock() -> Self {
        let pipeline = QueryPipeline::new(
            Arc::new(MockSqlGenerator::new()),
            Arc::new(MockExecutor::new()),
        );
        Self::new(
            pipeline,
            Arc::new(MockTranscriber::default()),
            Arc::new(PdfReportGenerator::new()),
            Arc::new(ErrorCounters::new()),
        )
    }

    /// Wires the real collaborators from configuration.
    ///
    /// The prompt schema is introspected from the database; when that fails
    /// the built-in schema is used instead.
    pub async fn from_config(config: &Config, provider: LlmProvider) -> Result<Self> {
        let executor = PostgresExecutor::connect(&config.database)?;

        let schema = match executor
            .introspect_schema(&config.database.include_tables)
            .await
        {
            Ok(schema) if !schema.is_empty() => {
                info!("Introspected {} tables for the prompt", schema.tables.len());
                schema
            }
            Ok(_) => {
                warn!("No configured tables found, using built-in schema");
                Schema::builtin()
            }
            Err(e) => {
                warn!("Schema introspection failed ({}), using built-in schema", e);
                Schema::builtin()
            }
        };

        let generator = create_generator(provider, &config.llm, schema)?;
        let transcriber: Arc<dyn Transcriber> = match provider {
            LlmProvider::OpenAi => Arc::new(WhisperTranscriber::from_config(
                &config.llm,
                &config.transcription,
            )?),
            LlmProvider::Mock => Arc::new(MockTranscriber::default()),
        };
        let executor: Arc<dyn SqlExecutor> = Arc::new(executor);

        Ok(Self::new(
            QueryPipeline::new(generator, executor),
            transcriber,
            Arc::new(PdfReportGenerator::new()),
            Arc::new(ErrorCounters::new()),
        ))
    }
}

/// Builds the router with request tracing and panic recovery.
///
/// Unknown routes and methods answer with the JSON error envelope too.
pub fn build_router(state: AppState) -> Router {
    let dispatcher = state.dispatcher.clone();
    let on_panic = move |panic: Box<dyn Any + Send + 'static>| -> Response {
        let detail = panic
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| panic.downcast_ref::<&str>().copied())
            .unwrap_or("unknown panic payload");
        dispatcher
            .dispatch_unexpected(anyhow::anyhow!("handler panicked: {detail}"))
            .into_response()
    };

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ask", post(handlers::ask))
        .route("/ask-voice", post(handlers::ask_voice))
        .route("/download-report-pdf", post(handlers::download_report_pdf))
        .route("/stats/errors", get(handlers::error_stats))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(DefaultBodyLimit::max(
            MAX_AUDIO_BYTES as usize + MULTIPART_OVERHEAD_BYTES,
        ))
        .layer(CatchPanicLayer::custom(on_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
