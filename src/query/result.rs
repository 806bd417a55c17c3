//! The outcome of a successfully processed question.

use serde::Serialize;

use crate::db::Row;
use crate::query::shaper::Table;

/// Message carried by a result whose query produced no rows.
pub const NO_RESULTS_MESSAGE: &str = "No results found for this query";

/// Tabular outcome of a question.
///
/// Failures are reported through [`AppError`](crate::error::AppError)
/// instead; a result only ever carries the "no results" summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    question: String,
    headers: Vec<String>,
    rows: Vec<Row>,
    execution_time_ms: u64,
    sql: Option<String>,
    error: Option<String>,
}

impl QueryResult {
    /// Creates a result holding `table`.
    pub fn new(question: impl Into<String>, table: Table, execution_time_ms: u64) -> Self {
        Self {
            question: question.into(),
            headers: table.headers,
            rows: table.rows,
            execution_time_ms,
            sql: None,
            error: None,
        }
    }

    /// Creates an empty result flagged with the "no results" summary.
    pub fn no_results(question: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            error: Some(NO_RESULTS_MESSAGE.to_string()),
            ..Self::new(question, Table::default(), execution_time_ms)
        }
    }

    /// Attaches the statement that produced the rows.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }

    pub fn sql(&self) -> Option<&str> {
        self.sql.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True when there is at least one column, one row and no summary error.
    pub fn has_results(&self) -> bool {
        !self.headers.is_empty() && !self.rows.is_empty() && self.error.is_none()
    }

    /// Rows rendered as display text, `NULL` for null.
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|value| value.to_display_string()).collect())
            .collect()
    }
}
