//! Mock SQL generator for testing.
//!
//! Provides deterministic SQL based on input patterns.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{AppError, Result};
use crate::llm::{extract_sql, SqlGenerator};

type FailureFn = Box<dyn Fn(&str) -> AppError + Send + Sync>;

/// Mock generator that returns canned SQL based on input patterns.
///
/// Used for unit testing and `--mock` mode without making real API calls.
#[derive(Default)]
pub struct MockSqlGenerator {
    /// Custom response mappings (pattern -> reply).
    custom_responses: Vec<(String, String)>,
    failure: Option<FailureFn>,
    calls: AtomicUsize,
}

impl MockSqlGenerator {
    /// Creates a new mock generator with default responses.
    pub fn new() -> Self {
        Self::default()
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

    /// Adds a custom response mapping.
    ///
    /// When the question contains `pattern`, the mock replies with `response`.
    pub fn with_response(
        mut self,
        pattern: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        self.custom_responses
            .push((pattern.into(), response.into()));
        self
    }

    /// Number of times `generate_sql` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Generates a mock reply based on the question.
    fn mock_response(&self, question: &str) -> String {
        let input_lower = question.to_lowercase();

        // Check custom responses first
        for (pattern, response) in &self.custom_responses {
            if input_lower.contains(&pattern.to_lowercase()) {
                return response.clone();
            }
        }

        if input_lower.contains("users") {
            return "```sql\nSELECT user_name FROM ai_service_usage;\n```".to_string();
        }

        if input_lower.contains("count") && input_lower.contains("usage") {
            return "SELECT COUNT(*) AS usage_count FROM ai_service_usage;".to_string();
        }

        if input_lower.contains("countries") || input_lower.contains("country") {
            return "SELECT DISTINCT COALESCE(p.country, 'Unknown') AS country\nFROM ai_projects p;"
                .to_string();
        }

        if input_lower.contains("model") {
            return "SELECT COALESCE(s.model, 'Unknown') AS model, COUNT(u.id) AS usage_count\nFROM ai_service_usage u\nLEFT JOIN ai_services s ON u.service_id = s.id\nGROUP BY s.model;"
                .to_string();
        }

        if input_lower.contains("delete") || input_lower.contains("drop") {
            return "DROP TABLE ai_service_usage;".to_string();
        }

        "SELECT * FROM ai_services LIMIT 10;".to_string()
    }
}

#[async_trait]
impl SqlGenerator for MockSqlGenerator {
    async fn generate_sql(&self, question: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = &self.failure {
            return Err(failure(question));
        }

        Ok(extract_sql(&self.mock_response(question)))
    }
}
