//! Mock SQL executor for testing.
//!
//! Provides an in-memory executor so the pipeline and the HTTP surface can be
//! exercised without a database.

use super::{Record, SqlExecutor};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type FailureFn = Box<dyn Fn(&str) -> AppError + Send + Sync>;

/// A mock executor that returns predefined rows.
#[derive(Default)]
pub struct MockExecutor {
    /// Rows returned for SQL containing a pattern (case-insensitive).
    responses: Vec<(String, Vec<Record>)>,
    /// Rows returned when no pattern matches.
    default_rows: Option<Vec<Record>>,
    failure: Option<FailureFn>,
    calls: AtomicUsize,
    executed: Mutex<Vec<String>>,
}

impl MockExecutor {
    /// Creates a mock that echoes the statement back in a single `result` column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that always returns `rows`.
    pub fn with_rows(rows: Vec<Record>) -> Self {
        Self {
            default_rows: Some(rows),
            ..Self::default()
        }
    }

    /// Creates a mock that fails every call with the error built by `failure`.
    pub fn failing<F>(failure: F) -> Self
    where
        F: Fn(&str) -> AppError + Send + Sync + 'static,
    {
        Self {
            failure: Some(Box::new(failure)),
            ..Self::default()
        }
    }

    /// Adds rows returned for statements containing `pattern`.
    pub fn with_response(mut self, pattern: impl Into<String>, rows: Vec<Record>) -> Self {
        self.responses.push((pattern.into().to_lowercase(), rows));
        self
    }

    /// Number of times `execute` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Statements received, in call order.
    pub fn executed_sql(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl SqlExecutor for MockExecutor {
    async fn execute(&self, sql: &str) -> Result<Vec<Record>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sql.to_string());

        if let Some(failure) = &self.failure {
            return Err(failure(sql));
        }

        let sql_lower = sql.to_lowercase();
        if let Some((_, rows)) = self
            .responses
            .iter()
            .find(|(pattern, _)| sql_lower.contains(pattern))
        {
            return Ok(rows.clone());
        }

        match &self.default_rows {
            Some(rows) => Ok(rows.clone()),
            None => Ok(vec![Record::new().with("result", format!("Mock result for: {sql}"))]),
        }
    }
}
