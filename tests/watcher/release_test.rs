use std::sync::Arc;
use std::time::Duration;

use logsentry::watcher::{TaskContext, TaskSettings, TaskState, WatchTask};
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use crate::common::{target, wait_for_state, LogDir, StuckSourceFactory, TEST_GRACE};

const HOLD: Duration = Duration::from_secs(1);
const RELEASE: Duration = Duration::from_millis(50);

#[tokio::test]
async fn hung_release_does_not_block_stop() {
    let logs = LogDir::new();
    let path = logs.log("stuck.log");
    let compiled = target("stuck", &path, 1, 1).validate().unwrap();
    let (task, mut rx) = WatchTask::new(
        compiled,
        TaskContext {
            sink: logs.sink.clone(),
            sources: Arc::new(StuckSourceFactory { hold: HOLD }),
            settings: TaskSettings {
                rotation_grace: TEST_GRACE,
                release_timeout: RELEASE,
            },
        },
    );
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(task.run(shutdown.clone()));
    wait_for_state(&mut rx, TaskState::Watching).await;

    let started = tokio::time::Instant::now();
    shutdown.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("Task should finish")
        .unwrap();

    assert_ok!(result);
    assert!(started.elapsed() < HOLD, "Release should give up after its timeout");
    assert_eq!(*rx.borrow(), TaskState::Stopped);
}
