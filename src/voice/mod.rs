//! Voice input: upload staging and speech-to-text.

pub mod upload;
pub mod whisper;

pub use upload::{audio_extension, StagedUpload};
pub use whisper::WhisperTranscriber;

use async_trait::async_trait;
use std::path::Path;

use crate::error::{AppError, Result};

/// Largest audio file accepted for transcription (25 MiB).
pub const MAX_AUDIO_BYTES: u64 = 25 * 1024 * 1024;

/// Converts recorded speech into question text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribes the audio file at `audio`.
    ///
    /// Missing, empty or oversized files fail with `TranscriptionFailed`
    /// before any remote call is made.
    async fn transcribe(&self, audio: &Path) -> Result<String>;
}

/// Checks that `path` is a readable, non-empty file within the size limit,
/// returning its size.
pub async fn inspect_audio_file(path: &Path) -> Result<u64> {
    let file_path = path.display().to_string();
    let failure = |error: String| {
        AppError::transcription_failed()
            .with_detail("file_path", file_path.as_str())
            .with_detail("error", error)
    };

    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(failure("File not found".to_string()));
        }
        Err(e) => return Err(failure(format!("Cannot access file: {e}")).with_source(e)),
    };
    let size = metadata.len();

    if size == 0 {
        return Err(failure("Empty file".to_string()).with_detail("file_size", size));
    }
    if size > MAX_AUDIO_BYTES {
        return Err(failure("File too large (>25MB)".to_string()).with_detail("file_size", size));
    }

    Ok(size)
}

/// Transcriber that returns a fixed transcript.
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    transcript: String,
}

impl MockTranscriber {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
        }
    }
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new("Show all users")
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String> {
        let file_size = inspect_audio_file(audio).await?;

        let transcript = self.transcript.trim();
        if transcript.is_empty() {
            return Err(AppError::transcription_failed()
                .with_detail("file_path", audio.display().to_string())
                .with_detail("file_size", file_size)
                .with_detail("reason", "No speech detected in audio"));
        }

        Ok(transcript.to_string())
    }
}
