//! Staging of uploaded audio on disk.

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{AppError, Result, SUPPORTED_AUDIO_FORMATS};

/// Returns the lower-cased extension of `filename` if it is a supported
/// audio format.
pub fn audio_extension(filename: Option<&str>) -> Result<String> {
    let Some(name) = filename.filter(|name| !name.trim().is_empty()) else {
        return Err(AppError::invalid_file_format(None).with_detail("reason", "No filename provided"));
    };

    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    if !SUPPORTED_AUDIO_FORMATS.contains(&extension.as_str()) {
        return Err(AppError::invalid_file_format(Some(&extension)));
    }

    Ok(extension)
}

/// An uploaded audio file written to a temporary location.
///
/// The file is removed when the value is dropped, whichever way the request
/// ends.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
    size: u64,
}

impl StagedUpload {
    /// Validates and writes an upload.
    ///
    /// The staged file keeps the original extension so the transcription
    /// service can detect the format.
    pub fn stage(filename: Option<&str>, bytes: &[u8]) -> Result<Self> {
        let extension = audio_extension(filename)?;

        if bytes.is_empty() {
            return Err(AppError::invalid_file_format(None)
                .with_detail("reason", "Empty file")
                .with_detail("file_size", 0));
        }

        let file = tempfile::Builder::new()
            .prefix("upload_")
            .suffix(&format!(".{extension}"))
            .tempfile()
            .and_then(|mut file| file.write_all(bytes).map(|_| file))
            .and_then(|mut file| file.flush().map(|_| file))
            .map_err(|e| {
                AppError::internal_with_message("Failed to stage uploaded file").with_source(e)
            })?;

        debug!("Staged {} byte upload at {}", bytes.len(), file.path().display());
        Ok(Self {
            file,
            size: bytes.len() as u64,
        })
    }

    /// Runs [`stage`](Self::stage) on the blocking thread pool so large
    /// uploads do not stall the async workers.
    pub async fn stage_async<B>(filename: Option<String>, bytes: B) -> Result<Self>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        tokio::task::spawn_blocking(move || Self::stage(filename.as_deref(), bytes.as_ref()))
            .await
            .map_err(|e| {
                AppError::internal_with_message("Failed to stage uploaded file").with_source(e)
            })?
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}
