//! Point-in-time supervisor statistics.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::watcher::TaskState;

/// State of one registered task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStatus {
    pub name: String,
    pub path: PathBuf,
    pub state: TaskState,
}

/// Snapshot returned by [`Supervisor::status`](super::Supervisor::status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupervisorStatus {
    pub name: String,
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime: Option<Duration>,
    /// Targets skipped as invalid at start.
    pub skipped: usize,
    pub tasks: Vec<TaskStatus>,
}

impl SupervisorStatus {
    pub(crate) fn idle(name: &str) -> Self {
        Self {
            name: name.to_string(),
            running: false,
            started_at: None,
            uptime: None,
            skipped: 0,
            tasks: Vec::new(),
        }
    }

    /// Tasks that have not stopped.
    #[must_use]
    pub fn active(&self) -> usize {
        self.tasks.iter().filter(|t| t.state.is_active()).count()
    }
}

impl std::fmt::Display for SupervisorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        match (self.started_at, self.uptime) {
            (Some(started_at), Some(uptime)) => write!(
                f,
                " (since {} [{}s]) {}/{} tasks active",
                started_at.format("%Y-%m-%d %H:%M:%S"),
                uptime.as_secs(),
                self.active(),
                self.tasks.len()
            ),
            _ if self.running => write!(f, " (stopping)"),
            _ => write!(f, " (idle)"),
        }
    }
}
