//! Supervisor module tests.

mod runner_test;

/// Verify the public supervisor types are exported from the library.
#[test]
fn test_all_supervisor_types_exported() {
    use logsentry::supervisor::{
        ShutdownHandle, Supervisor, SupervisorError, SupervisorOptions, SupervisorStatus,
        TaskStatus, DEFAULT_STOP_TIMEOUT,
    };

    let _ = SupervisorOptions::default();
    let _: fn() -> SupervisorError = || SupervisorError::EmptyTaskSet;
    let _: Option<ShutdownHandle> = None;
    let _: Option<(SupervisorStatus, TaskStatus)> = None;
    assert_eq!(SupervisorOptions::default().stop_timeout, DEFAULT_STOP_TIMEOUT);

    let sup = Supervisor::new(std::sync::Arc::new(logsentry::notifier::MemorySink::new()));
    assert!(!sup.is_running());
    assert_eq!(sup.name(), "LogSentry");
}
