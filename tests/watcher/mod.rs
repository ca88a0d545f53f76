//! Watch task tests.

mod release_test;
mod rotation_test;
mod threshold_test;

use logsentry::watcher::{TaskContext, TaskSettings, TaskState, WatchTask};
use tokio::sync::watch;

use crate::common::{LogDir, TEST_GRACE};

fn spawn_ctx(logs: &LogDir) -> TaskContext {
    TaskContext {
        sink: logs.sink.clone(),
        sources: logs.sources.clone(),
        settings: TaskSettings {
            rotation_grace: TEST_GRACE,
            ..TaskSettings::default()
        },
    }
}

fn new_task(
    logs: &LogDir,
    target: &logsentry::config::WatchTarget,
) -> (WatchTask, watch::Receiver<TaskState>) {
    let compiled = target.validate().expect("Target should be valid");
    WatchTask::new(compiled, spawn_ctx(logs))
}
