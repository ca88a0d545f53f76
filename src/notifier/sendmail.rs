//! Mail delivery through a local sendmail-compatible command.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::error::DeliveryError;
use super::message::NOTIFICATION_SUBJECT;
use super::sink::NotificationSink;

/// Default MTA command.
pub const DEFAULT_SENDMAIL: &str = "/usr/sbin/sendmail";

/// Build the RFC 5322 message handed to the MTA.
#[must_use]
pub fn compose_mail(from: &str, recipients: &[String], body: &str) -> String {
    format!(
        "From: {from}\r\nTo: {}\r\nSubject: {NOTIFICATION_SUBJECT}\r\n\
         MIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{body}\r\n",
        recipients.join(", ")
    )
}

/// Pipes messages to a sendmail-compatible command.
///
/// The command is invoked as `<command> <args...> -- <recipients...>` with the
/// full message on stdin.
#[derive(Debug, Clone)]
pub struct SendmailSink {
    command: PathBuf,
    args: Vec<String>,
    from: String,
}

impl SendmailSink {
    /// Create a sink using the standard `-i -f <from>` arguments.
    #[must_use]
    pub fn new(command: impl Into<PathBuf>, from: impl Into<String>) -> Self {
        let from = from.into();
        Self {
            command: command.into(),
            args: vec!["-i".to_string(), "-f".to_string(), from.clone()],
            from,
        }
    }

    /// Replace the arguments placed before the recipients.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn command(&self) -> &PathBuf {
        &self.command
    }
}

#[async_trait]
impl NotificationSink for SendmailSink {
    fn name(&self) -> &str {
        "sendmail"
    }

    async fn notify(&self, message: &str, recipients: &[String]) -> Result<(), DeliveryError> {
        if recipients.is_empty() {
            return Err(DeliveryError::NoRecipients);
        }

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg("--")
            .args(recipients)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DeliveryError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let mail = compose_mail(&self.from, recipients, message);
            stdin.write_all(mail.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeliveryError::Rejected(format!(
                "{}: {}",
                output.status,
                stderr.trim()
            )));
        }

        tracing::debug!(recipients = recipients.len(), "Mail handed to MTA");
        Ok(())
    }
}
