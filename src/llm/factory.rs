//! SQL generator factory.
//!
//! Centralizes provider-specific logic for creating generators.

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::db::Schema;
use crate::error::Result;
use crate::llm::openai::OpenAiConfig;
use crate::llm::{LlmProvider, MockSqlGenerator, OpenAiSqlGenerator, SqlGenerator};

/// Creates a SQL generator for the given provider.
///
/// The OpenAI provider needs `llm.api_key` (usually from `OPENAI_API_KEY`);
/// a missing key is a configuration error.
pub fn create_generator(
    provider: LlmProvider,
    config: &LlmConfig,
    schema: Schema,
) -> Result<Arc<dyn SqlGenerator>> {
    match provider {
        LlmProvider::OpenAi => {
            let openai = OpenAiConfig::from_llm_config(config)?;
            Ok(Arc::new(OpenAiSqlGenerator::new(openai, schema)?))
        }
        LlmProvider::Mock => Ok(Arc::new(MockSqlGenerator::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_create_mock_generator() {
        let generator = create_generator(LlmProvider::Mock, &LlmConfig::default(), Schema::new());
        assert!(generator.is_ok());
    }

    #[test]
    fn test_create_openai_without_key_fails() {
        let result = create_generator(LlmProvider::OpenAi, &LlmConfig::default(), Schema::builtin());
        let err = result.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_create_openai_with_key() {
        let config = LlmConfig {
            api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        let result = create_generator(LlmProvider::OpenAi, &config, Schema::builtin());
        assert!(result.is_ok());
    }
}
