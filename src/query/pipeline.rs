//! Question processing pipeline.
//!
//! Validate, generate, gate, execute and shape, in that order. Every failure
//! after validation leaves the pipeline carrying `execution_time_ms` and
//! `sql_query` so callers can tell how far the question got.

use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::db::{Record, SqlExecutor};
use crate::error::{AppError, ErrorKind, Result};
use crate::llm::SqlGenerator;
use crate::query::{to_table, QueryResult};
use crate::safety;

/// Orchestrates a question through generation and execution.
#[derive(Clone)]
pub struct QueryPipeline {
    generator: Arc<dyn SqlGenerator>,
    executor: Arc<dyn SqlExecutor>,
}

impl QueryPipeline {
    pub fn new(generator: Arc<dyn SqlGenerator>, executor: Arc<dyn SqlExecutor>) -> Self {
        Self {
            generator,
            executor,
        }
    }

    /// Answers `question` with a table of results.
    ///
    /// An empty result is not an error: it comes back flagged with the
    /// "no results" summary.
    pub async fn process_question(&self, question: &str) -> Result<QueryResult> {
        if question.trim().is_empty() {
            return Err(AppError::empty_question());
        }

        let started = Instant::now();
        let mut sql = None;

        let records = match self.generate_and_execute(question, &mut sql).await {
            Ok(records) => records,
            Err(mut err) => {
                err.insert_detail("execution_time_ms", elapsed_ms(started));
                err.insert_detail("sql_query", sql.map_or(JsonValue::Null, JsonValue::String));
                return Err(err);
            }
        };

        let execution_time_ms = elapsed_ms(started);
        info!("Query processed in {} ms", execution_time_ms);

        // Generation succeeded if we got this far.
        let sql = sql.unwrap_or_default();

        if records.is_empty() {
            return Ok(QueryResult::no_results(question, execution_time_ms).with_sql(sql));
        }

        Ok(QueryResult::new(question, to_table(records), execution_time_ms).with_sql(sql))
    }

    /// Runs generation, the safety gate and execution.
    ///
    /// `sql` is filled as soon as generation succeeds.
    async fn generate_and_execute(
        &self,
        question: &str,
        sql: &mut Option<String>,
    ) -> Result<Vec<Record>> {
        let generated = self
            .generator
            .generate_sql(question)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::UpstreamService | ErrorKind::GenerationFailed => e,
                other => AppError::generation_failed(Some(question))
                    .with_detail("error_type", other.code())
                    .with_source(e),
            })?;
        info!("Generated SQL: {}", generated);
        let statement: &str = sql.insert(generated);

        if !safety::is_safe(statement) {
            warn!(
                keyword = safety::find_forbidden_keyword(statement).unwrap_or("non-SELECT"),
                "Blocked unsafe SQL"
            );
            return Err(AppError::unsafe_statement(Some(statement)));
        }

        let records = self.executor.execute(statement).await?;
        debug!("Executor returned {} rows", records.len());
        Ok(records)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
