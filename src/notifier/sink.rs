//! Notification sink trait and non-mail implementations.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;

use super::error::DeliveryError;

/// Delivers a composed message to a set of recipients.
///
/// Sinks are shared by every watch task and must tolerate concurrent calls.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Deliver `message` to `recipients`.
    async fn notify(&self, message: &str, recipients: &[String]) -> Result<(), DeliveryError>;
}

/// Records deliveries instead of sending mail.
///
/// With a file path, appends one summary line per message to that file;
/// otherwise the summary goes to the log.
#[derive(Debug, Clone, Default)]
pub struct SimulatorSink {
    path: Option<PathBuf>,
}

impl SimulatorSink {
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Summary line written for a delivery.
    #[must_use]
    pub fn summary(at: DateTime<Utc>, message: &str, recipients: &[String]) -> String {
        format!(
            "{}: get message ({} symbols) for [{}]",
            at.to_rfc3339(),
            message.chars().count(),
            recipients.join(", ")
        )
    }
}

#[async_trait]
impl NotificationSink for SimulatorSink {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn notify(&self, message: &str, recipients: &[String]) -> Result<(), DeliveryError> {
        let line = Self::summary(Utc::now(), message, recipients);
        let Some(path) = &self.path else {
            tracing::info!(summary = %line, "Simulated notification");
            return Ok(());
        };
        if !path.is_absolute() {
            return Err(DeliveryError::RelativePath(path.clone()));
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// A delivery captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub message: String,
    pub recipients: Vec<String>,
}

/// Keeps deliveries in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    deliveries: Mutex<Vec<Delivery>>,
    fail: bool,
    delivered: Notify,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records every attempt and then reports failure.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Snapshot of recorded deliveries.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `count` deliveries were recorded.
    ///
    /// Returns `false` if `timeout` elapses first.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.delivered.notified();
                if self.len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn notify(&self, message: &str, recipients: &[String]) -> Result<(), DeliveryError> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Delivery {
                message: message.to_string(),
                recipients: recipients.to_vec(),
            });
        self.delivered.notify_waiters();
        if self.fail {
            return Err(DeliveryError::Rejected("memory sink set to fail".to_string()));
        }
        Ok(())
    }
}
