//! Text-to-SQL generation.
//!
//! Provides the [`SqlGenerator`] trait and implementations backed by the
//! OpenAI chat-completions API or canned responses.

pub mod factory;
pub mod mock;
pub mod openai;
pub mod parser;
pub mod prompt;

pub use factory::create_generator;
pub use mock::MockSqlGenerator;
pub use openai::OpenAiSqlGenerator;
pub use parser::extract_sql;
pub use prompt::build_prompt;

use async_trait::async_trait;
use std::str::FromStr;

use crate::error::Result;

/// Turns a natural-language question into a single SQL statement.
///
/// Implementations raise `UpstreamService` when the remote model is
/// unavailable or rejects the call, and `GenerationFailed` when it answers
/// without usable SQL.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(&self, question: &str) -> Result<String>;
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    /// OpenAI chat completions
    #[default]
    OpenAi,
    /// Canned responses (no API key required)
    Mock,
}

impl LlmProvider {
    /// Returns the provider as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_str() {
        assert_eq!(
            "openai".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAi
        );
        assert_eq!(
            "OpenAI".parse::<LlmProvider>().unwrap(),
            LlmProvider::OpenAi
        );
        assert_eq!("mock".parse::<LlmProvider>().unwrap(), LlmProvider::Mock);
        assert!("anthropic".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_provider_display() {
        assert_eq!(format!("{}", LlmProvider::OpenAi), "openai");
        assert_eq!(LlmProvider::Mock.to_string(), "mock");
    }

    #[test]
    fn test_provider_default() {
        assert_eq!(LlmProvider::default(), LlmProvider::OpenAi);
    }

    #[tokio::test]
    async fn test_mock_generator_implements_trait() {
        let generator: Box<dyn SqlGenerator> = Box::new(MockSqlGenerator::new());
        let sql = generator.generate_sql("Show all users").await.unwrap();
        assert!(sql.starts_with("SELECT"));
    }
}
