//! Supervisor control-path errors.

/// Errors returned synchronously from [`Supervisor`](super::Supervisor)
/// start and stop.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    /// `start` was called while a run is active.
    #[error("Process is already running")]
    AlreadyRunning,

    /// `stop` was called without an active run.
    #[error("Process is already stopped")]
    NotRunning,

    /// No target passed validation.
    #[error("Empty task queue, no valid targets")]
    EmptyTaskSet,

    /// The shutdown handle belongs to a previous run.
    #[error("Shutdown handle does not belong to the current run")]
    ForeignHandle,
}
