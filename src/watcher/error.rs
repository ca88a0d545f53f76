//! Watcher error types.

use std::path::PathBuf;

/// Errors that can occur while watching a single file.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    /// Watched file does not exist.
    #[error("Watched file not found: {0}")]
    FileNotFound(PathBuf),

    /// Permission denied accessing file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File is permanently gone after the rotation grace period.
    #[error("Watch lost, file did not reappear: {0}")]
    WatchLost(PathBuf),

    /// The change-event source stopped yielding events.
    #[error("Change source closed for {0}")]
    SourceClosed(PathBuf),

    /// Notify watcher error.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatcherError {
    /// Classify an I/O error raised while opening `path`.
    pub(crate) fn from_open(path: &std::path::Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io(err),
        }
    }

    /// Whether the error ends the watch rather than a single cycle.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::WatchLost(_) | Self::SourceClosed(_))
    }
}
