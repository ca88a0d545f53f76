//! Watch task lifecycle states.

use serde::{Deserialize, Serialize};

/// Current state of a watch task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Created, not yet subscribed to change events.
    #[default]
    Idle,
    /// Waiting for a change event or shutdown.
    Watching,
    /// Reading new lines and updating counters.
    Scanning,
    /// Handing a message to the notification sink.
    Notifying,
    /// Terminated; the file watch is released.
    Stopped,
}

impl TaskState {
    /// Whether the task is still alive.
    #[must_use]
    pub fn is_active(self) -> bool {
        self != Self::Stopped
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Watching => "watching",
            Self::Scanning => "scanning",
            Self::Notifying => "notifying",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
