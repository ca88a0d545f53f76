use std::time::Duration;

use logsentry::watcher::{ChangeEvent, TaskState, WatcherError};
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use super::new_task;
use crate::common::{append, eventually, target, wait_for_state, LogDir, TEST_GRACE};

#[tokio::test]
async fn recreated_file_is_rescanned_from_start() {
    let logs = LogDir::new();
    let path = logs.log("app.log");
    append(&path, &["INFO boot", "ERROR old"]);

    let (task, mut rx) = new_task(&logs, &target("app", &path, 1, 10));
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(task.run(shutdown.clone()));
    wait_for_state(&mut rx, TaskState::Watching).await;

    logs.sources.emit(&path, ChangeEvent::Modified);
    assert!(logs.sink.wait_for(1, Duration::from_secs(2)).await);
    assert!(logs.sink.deliveries()[0].message.contains("2: ERROR old"));

    // Rotate: move away, then recreate with fresh content.
    std::fs::rename(&path, logs.dir.path().join("app.log.1")).unwrap();
    logs.sources.emit(&path, ChangeEvent::AttributeChanged);
    std::fs::write(&path, "ERROR fresh\n").unwrap();

    assert!(logs.sink.wait_for(2, Duration::from_secs(5)).await);
    let message = &logs.sink.deliveries()[1].message;
    assert!(message.contains("1: ERROR fresh"));
    assert_eq!(logs.sources.subscription_count(&path), 2);
    assert!(rx.borrow().is_active());

    shutdown.cancel();
    assert_ok!(handle.await.unwrap());
    assert_eq!(*rx.borrow(), TaskState::Stopped);
}

#[tokio::test]
async fn removed_file_is_lost_after_grace() {
    let logs = LogDir::new();
    let path = logs.log("gone.log");

    let (task, mut rx) = new_task(&logs, &target("gone", &path, 1, 1));
    let handle = tokio::spawn(task.run(CancellationToken::new()));
    wait_for_state(&mut rx, TaskState::Watching).await;

    std::fs::remove_file(&path).unwrap();
    let started = tokio::time::Instant::now();
    logs.sources.emit(&path, ChangeEvent::AttributeChanged);

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("Task should end after the grace period")
        .unwrap();
    assert!(started.elapsed() >= TEST_GRACE);
    let err = assert_err!(result);
    assert!(matches!(err, WatcherError::WatchLost(_)));
    assert!(err.is_fatal());
    assert_eq!(*rx.borrow(), TaskState::Stopped);
    assert!(logs.sink.is_empty());
}

#[tokio::test]
async fn shutdown_during_grace_stops_cleanly() {
    let logs = LogDir::new();
    let path = logs.log("slow.log");

    let (task, mut rx) = new_task(&logs, &target("slow", &path, 1, 1));
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(task.run(shutdown.clone()));
    wait_for_state(&mut rx, TaskState::Watching).await;

    std::fs::remove_file(&path).unwrap();
    logs.sources.emit(&path, ChangeEvent::AttributeChanged);
    assert!(eventually(|| logs.sources.subscription_count(&path) == 1).await);
    shutdown.cancel();

    assert_ok!(handle.await.unwrap());
    assert_eq!(*rx.borrow(), TaskState::Stopped);
}

#[tokio::test]
async fn truncated_file_restarts_line_numbers() {
    let logs = LogDir::new();
    let path = logs.log("copy.log");
    append(&path, &["ERROR a", "ERROR b", "ERROR c"]);

    let (task, mut rx) = new_task(&logs, &target("copy", &path, 1, 10));
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(task.run(shutdown.clone()));
    wait_for_state(&mut rx, TaskState::Watching).await;

    logs.sources.emit(&path, ChangeEvent::Modified);
    assert!(logs.sink.wait_for(1, Duration::from_secs(2)).await);

    // Copy-truncate keeps the inode, so only a modification is reported.
    std::fs::write(&path, "ERROR z\n").unwrap();
    logs.sources.emit(&path, ChangeEvent::Modified);
    assert!(logs.sink.wait_for(2, Duration::from_secs(2)).await);
    assert!(logs.sink.deliveries()[1].message.contains("1: ERROR z"));

    shutdown.cancel();
    assert_ok!(handle.await.unwrap());
}
