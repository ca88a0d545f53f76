//! LogSentry - watch log files and send rate-limited notifications.

pub mod config;
pub mod notifier;
pub mod supervisor;
pub mod watcher;
