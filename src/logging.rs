//! Logging setup.
//!
//! Logs go to stderr unless a log file is configured, in which case they are
//! appended to that file without ANSI colors.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes the global subscriber, writing to `file` when given.
///
/// If the file cannot be opened, logging falls back to stderr with a warning.
pub fn init(file: Option<&Path>) {
    let Some(path) = file else {
        init_stderr_logging();
        return;
    };

    match open_log_file(path) {
        Ok(log_file) => tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(log_file)
            .with_ansi(false)
            .init(),
        Err(e) => {
            eprintln!("Warning: Could not open log file {}: {e}", path.display());
            init_stderr_logging();
        }
    }
}

/// Initializes logging to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
}

/// Opens `path` for appending, creating it and its parent directory.
fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
