//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::notifier::DEFAULT_SENDMAIL;
use crate::watcher::{PatternMatcher, TaskSettings, WindowPolicy, DEFAULT_DEBOUNCE};

use super::ConfigError;

/// One configured file under watch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchTarget {
    /// Unique target name, used in reports.
    pub name: String,
    /// Absolute path of the watched file.
    #[serde(alias = "file")]
    pub path: PathBuf,
    /// Regular expression matched against each new line.
    pub pattern: String,
    /// Matches within a period that trigger a notification. Must be non-zero.
    pub boundary: u64,
    /// Double the boundary after each notification.
    #[serde(default, alias = "increase")]
    pub increasing: bool,
    /// Notification addresses.
    #[serde(alias = "emails")]
    pub recipients: Vec<String>,
    /// Maximum notifications per period.
    pub limit: u64,
    /// Period length in seconds.
    #[serde(rename = "period")]
    pub period_seconds: u64,
}

impl WatchTarget {
    /// Check the target and compile its pattern.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first invariant that fails.
    pub fn validate(&self) -> Result<CompiledTarget, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if !self.path.is_absolute() {
            return Err(ConfigError::RelativePath(self.path.clone()));
        }
        std::fs::metadata(&self.path).map_err(|source| ConfigError::MissingFile {
            path: self.path.clone(),
            source,
        })?;
        let matcher = PatternMatcher::compile(&self.pattern)?;
        if self.period_seconds == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.boundary == 0 {
            return Err(ConfigError::ZeroBoundary);
        }

        let mut recipients: Vec<String> = Vec::with_capacity(self.recipients.len());
        for address in &self.recipients {
            let address = address.trim();
            if !address.is_empty() && !recipients.iter().any(|r| r == address) {
                recipients.push(address.to_string());
            }
        }
        if recipients.is_empty() {
            return Err(ConfigError::NoRecipients);
        }

        Ok(CompiledTarget {
            name: self.name.clone(),
            path: self.path.clone(),
            matcher,
            policy: WindowPolicy {
                boundary: self.boundary,
                increasing: self.increasing,
                limit: self.limit,
                period: Duration::from_secs(self.period_seconds),
            },
            recipients,
        })
    }
}

/// A validated target ready to be watched.
#[derive(Debug, Clone)]
pub struct CompiledTarget {
    pub name: String,
    pub path: PathBuf,
    pub matcher: PatternMatcher,
    pub policy: WindowPolicy,
    /// Distinct, non-empty addresses.
    pub recipients: Vec<String>,
}

/// Mail sender settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Envelope and header sender address.
    #[serde(default = "default_from")]
    pub from: String,
    /// Sendmail-compatible command.
    #[serde(default = "default_command")]
    pub command: PathBuf,
}

fn default_from() -> String {
    "logsentry@localhost".to_string()
}

fn default_command() -> PathBuf {
    PathBuf::from(DEFAULT_SENDMAIL)
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            from: default_from(),
            command: default_command(),
        }
    }
}

impl SenderConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSenderField`] for an empty field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.from.trim().is_empty() {
            return Err(ConfigError::MissingSenderField("from"));
        }
        if self.command.as_os_str().is_empty() {
            return Err(ConfigError::MissingSenderField("command"));
        }
        Ok(())
    }
}

/// Engine timing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Wait before treating a removed file as gone.
    pub rotation_grace_secs: u64,
    /// Maximum wait for tasks to stop.
    pub stop_timeout_secs: u64,
    /// Maximum wait when releasing a file watch.
    pub release_timeout_ms: u64,
    /// Debounce window for file events.
    pub debounce_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rotation_grace_secs: 2,
            stop_timeout_secs: 10,
            release_timeout_ms: 1000,
            debounce_ms: u64::try_from(DEFAULT_DEBOUNCE.as_millis()).unwrap_or(100),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn task_settings(&self) -> TaskSettings {
        TaskSettings {
            rotation_grace: Duration::from_secs(self.rotation_grace_secs),
            release_timeout: Duration::from_millis(self.release_timeout_ms),
        }
    }

    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSentryConfig {
    /// Where the configuration was loaded from.
    #[serde(skip)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub sender: SenderConfig,
    #[serde(default, rename = "target", alias = "targets")]
    pub targets: Vec<WatchTarget>,
    #[serde(default)]
    pub settings: Settings,
}

impl std::fmt::Display for LogSentryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = self
            .path
            .as_ref()
            .map_or_else(|| "<memory>".to_string(), |p| p.display().to_string());
        write!(f, "Config [{source}]:")?;
        for target in &self.targets {
            write!(f, "\n\t{}: {}", target.name, target.path.display())?;
        }
        Ok(())
    }
}
