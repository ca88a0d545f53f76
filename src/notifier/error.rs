//! Delivery error types.

use std::path::PathBuf;

/// Errors raised by a [`NotificationSink`](super::NotificationSink).
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    /// No recipients were given.
    #[error("No recipients")]
    NoRecipients,

    /// The mail command could not be started.
    #[error("Failed to start {command}: {source}")]
    Spawn {
        command: PathBuf,
        source: std::io::Error,
    },

    /// The transport exited unsuccessfully.
    #[error("Transport rejected message: {0}")]
    Rejected(String),

    /// A simulator file path was not absolute.
    #[error("Path should be absolute: {0}")]
    RelativePath(PathBuf),

    /// I/O error while writing the message.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
