//! OpenAI SQL generator.
//!
//! Implements [`SqlGenerator`] over the OpenAI chat-completions API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::LlmConfig;
use crate::db::Schema;
use crate::error::{AppError, Result};
use crate::llm::{build_prompt, extract_sql, SqlGenerator};

/// Service name reported in upstream errors.
const SERVICE_NAME: &str = "OpenAI";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Upper bound on generated tokens; a single statement fits comfortably.
const MAX_TOKENS: u32 = 150;

/// OpenAI generator configuration.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Model to use (e.g., "gpt-4o").
    pub model: String,
    /// API base URL, without the endpoint path.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    /// Creates a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Builds the config from the `[llm]` section, requiring an API key.
    pub fn from_llm_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.require_api_key()?;
        Ok(Self::new(api_key, config.model.clone())
            .with_base_url(config.base_url.clone())
            .with_timeout(config.timeout_secs))
    }

    /// Sets the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// OpenAI-backed SQL generator.
#[derive(Debug, Clone)]
pub struct OpenAiSqlGenerator {
    config: OpenAiConfig,
    client: Client,
    schema: Schema,
}

impl OpenAiSqlGenerator {
    /// Creates a generator that describes `schema` to the model.
    pub fn new(config: OpenAiConfig, schema: Schema) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AppError::internal_with_message("Failed to create HTTP client").with_source(e)
            })?;

        Ok(Self {
            config,
            client,
            schema,
        })
    }

    /// Maps a non-success API response to an upstream error.
    ///
    /// Rate limiting and server-side failures are temporary.
    fn parse_error(status: StatusCode, body: &str) -> AppError {
        let is_temporary = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();

        let api_error = match serde_json::from_str::<OpenAiErrorResponse>(body) {
            Ok(response) => response.error.message,
            Err(_) if status == StatusCode::UNAUTHORIZED => {
                "Authentication failed. Check your OPENAI_API_KEY.".to_string()
            }
            Err(_) => format!("OpenAI API error ({}): {}", status, body),
        };

        AppError::upstream_service(SERVICE_NAME, is_temporary)
            .with_detail("api_error", api_error)
            .with_detail("http_status", status.as_u16())
    }

    /// Maps a transport failure to an upstream error.
    fn request_error(e: reqwest::Error) -> AppError {
        let is_temporary = e.is_timeout() || e.is_connect();
        let api_error = if e.is_timeout() {
            "Request timed out".to_string()
        } else if e.is_connect() {
            "Failed to connect to OpenAI API".to_string()
        } else {
            format!("Request failed: {}", e)
        };

        AppError::upstream_service(SERVICE_NAME, is_temporary)
            .with_detail("api_error", api_error)
            .with_source(e)
    }

    /// Extracts the statement from a successful response body.
    fn decode_completion(body: &str, question: &str) -> Result<String> {
        let response: OpenAiResponse = serde_json::from_str(body).map_err(|e| {
            AppError::generation_failed(Some(question))
                .with_detail("error_type", "DecodeError")
                .with_detail("question_length", question.chars().count())
                .with_source(e)
        })?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        let sql = extract_sql(&content);
        if sql.is_empty() {
            return Err(AppError::generation_failed(Some(question))
                .with_detail("reason", "OpenAI returned empty content"));
        }

        Ok(sql)
    }
}

#[async_trait]
impl SqlGenerator for OpenAiSqlGenerator {
    async fn generate_sql(&self, question: &str) -> Result<String> {
        info!("Generating SQL for question: {}", question);

        let request = OpenAiRequest {
            model: self.config.model.clone(),
            messages: vec![OpenAiMessage {
                role: "user".to_string(),
                content: Some(build_prompt(&self.schema, question)),
            }],
            temperature: 0.0,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("OpenAI request failed: {}", e);
                Self::request_error(e).with_detail("question_length", question.chars().count())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            Self::request_error(e).with_detail("question_length", question.chars().count())
        })?;

        if !status.is_success() {
            error!("OpenAI API error ({}): {}", status, body);
            return Err(Self::parse_error(status, &body)
                .with_detail("question_length", question.chars().count()));
        }

        let sql = Self::decode_completion(&body, question)?;
        debug!("Generated SQL: {}", sql);
        Ok(sql)
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}
