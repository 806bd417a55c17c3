//! OpenAI Whisper transcription client.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

use crate::config::{LlmConfig, TranscriptionConfig};
use crate::error::{AppError, Result};
use crate::voice::{inspect_audio_file, Transcriber};

/// Service name reported in upstream errors.
const SERVICE_NAME: &str = "Whisper";

/// Transcribes audio through the `/audio/transcriptions` endpoint.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    language: String,
}

impl WhisperTranscriber {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        config: &TranscriptionConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                AppError::internal_with_message("Failed to create HTTP client").with_source(e)
            })?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: config.model.clone(),
            language: config.language.clone(),
        })
    }

    /// Builds a transcriber sharing the OpenAI key and base URL of `llm`.
    pub fn from_config(llm: &LlmConfig, transcription: &TranscriptionConfig) -> Result<Self> {
        let api_key = llm.require_api_key()?;
        Self::new(api_key, llm.base_url.clone(), transcription)
    }

    fn transcriptions_url(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String> {
        info!("Transcribing audio file: {}", audio.display());
        let file_size = inspect_audio_file(audio).await?;
        let file_path = audio.display().to_string();

        let bytes = tokio::fs::read(audio).await.map_err(|e| {
            AppError::transcription_failed()
                .with_detail("file_path", file_path.as_str())
                .with_detail("file_size", file_size)
                .with_detail("error", format!("Cannot read file: {e}"))
                .with_source(e)
        })?;

        let file_name = audio
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        let form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "text")
            .text("language", self.language.clone())
            .part("file", Part::bytes(bytes).file_name(file_name));

        let upstream = |is_temporary: bool, api_error: String| {
            AppError::upstream_service(SERVICE_NAME, is_temporary)
                .with_detail("api_error", api_error)
                .with_detail("file_size", file_size)
                .with_detail("file_path", file_path.as_str())
        };

        let response = self
            .client
            .post(self.transcriptions_url())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Whisper request failed: {}", e);
                upstream(e.is_timeout() || e.is_connect(), e.to_string()).with_source(e)
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| upstream(e.is_timeout(), e.to_string()).with_source(e))?;

        if !status.is_success() {
            error!("Whisper API error ({}): {}", status, body);
            let is_temporary = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            return Err(upstream(is_temporary, format!("Whisper API error ({status}): {body}"))
                .with_detail("http_status", status.as_u16()));
        }

        let transcript = body.trim();
        if transcript.is_empty() {
            return Err(AppError::transcription_failed()
                .with_detail("file_path", file_path.as_str())
                .with_detail("file_size", file_size)
                .with_detail("reason", "No speech detected in audio"));
        }

        info!("Successfully transcribed: {} characters", transcript.chars().count());
        Ok(transcript.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::Router;
    use std::io::Write;

    async fn serve_transcription(status: u16, body: &'static str) -> String {
        let app = Router::new().route(
            "/audio/transcriptions",
            post(move || async move {
                (AxumStatus::from_u16(status).unwrap_or(AxumStatus::OK), body)
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn audio_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    fn transcriber(base_url: String) -> WhisperTranscriber {
        WhisperTranscriber::new("sk-test", base_url, &TranscriptionConfig::default()).unwrap()
    }

    #[test]
    fn test_from_config_requires_key() {
        let err = WhisperTranscriber::from_config(&LlmConfig::default(), &TranscriptionConfig::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_transcribe_returns_trimmed_text() {
        let base_url = serve_transcription(200, "  Show all users\n").await;
        let file = audio_file(b"RIFF....WAVE");

        let text = transcriber(base_url).transcribe(file.path()).await.unwrap();
        assert_eq!(text, "Show all users");
    }

    #[tokio::test]
    async fn test_blank_transcript_is_transcription_failure() {
        let base_url = serve_transcription(200, "   ").await;
        let file = audio_file(b"RIFF....WAVE");

        let err = transcriber(base_url).transcribe(file.path()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TranscriptionFailed);
        assert_eq!(err.detail("reason").unwrap(), "No speech detected in audio");
        assert_eq!(err.detail("file_size").unwrap(), 12);
    }

    #[tokio::test]
    async fn test_api_rejection_is_upstream_error() {
        let base_url = serve_transcription(400, "bad audio").await;
        let file = audio_file(b"RIFF....WAVE");

        let err = transcriber(base_url).transcribe(file.path()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamService);
        assert_eq!(err.status_code(), 502);
        assert_eq!(err.detail("service").unwrap(), "Whisper");
        assert!(err.detail("api_error").unwrap().as_str().unwrap().contains("bad audio"));
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_request() {
        let err = transcriber("http://127.0.0.1:1".to_string())
            .transcribe(Path::new("/nonexistent/q.wav"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TranscriptionFailed);
        assert_eq!(err.detail("error").unwrap(), "File not found");
    }
}
