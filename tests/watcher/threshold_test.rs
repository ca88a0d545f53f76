use std::time::Duration;

use logsentry::watcher::{ChangeEvent, TaskState};
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use super::new_task;
use crate::common::{append, target, wait_for_state, LogDir};

#[tokio::test]
async fn notifies_once_boundary_is_reached() {
    let logs = LogDir::new();
    let path = logs.log("web.log");
    let (task, mut rx) = new_task(&logs, &target("web", &path, 3, 1));
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(task.run(shutdown.clone()));
    wait_for_state(&mut rx, TaskState::Watching).await;

    append(&path, &["ERROR one", "INFO fine"]);
    logs.sources.emit(&path, ChangeEvent::Modified);
    append(&path, &["ERROR two"]);
    logs.sources.emit(&path, ChangeEvent::Modified);
    assert!(!logs.sink.wait_for(1, Duration::from_millis(300)).await);

    append(&path, &["ERROR three"]);
    logs.sources.emit(&path, ChangeEvent::Modified);
    assert!(logs.sink.wait_for(1, Duration::from_secs(2)).await);

    let message = &logs.sink.deliveries()[0].message;
    assert!(message.contains("Report for \"web\" (3 new items)"));
    assert!(message.contains("4: ERROR three"));
    assert!(!message.contains("1: ERROR one"));

    shutdown.cancel();
    assert_ok!(handle.await.unwrap());
}

#[tokio::test]
async fn limit_caps_notifications_per_period() {
    let logs = LogDir::new();
    let path = logs.log("api.log");
    let (task, mut rx) = new_task(&logs, &target("api", &path, 1, 2));
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(task.run(shutdown.clone()));
    wait_for_state(&mut rx, TaskState::Watching).await;

    for i in 0..4 {
        append(&path, &[&format!("ERROR {i}")]);
        logs.sources.emit(&path, ChangeEvent::Modified);
    }

    assert!(logs.sink.wait_for(2, Duration::from_secs(2)).await);
    assert!(!logs.sink.wait_for(3, Duration::from_millis(300)).await);

    shutdown.cancel();
    assert_ok!(handle.await.unwrap());
    assert_eq!(*rx.borrow(), TaskState::Stopped);
}

#[tokio::test]
async fn failed_delivery_does_not_stop_task() {
    let logs = LogDir {
        sink: std::sync::Arc::new(logsentry::notifier::MemorySink::failing()),
        ..LogDir::new()
    };
    let path = logs.log("db.log");
    let (task, mut rx) = new_task(&logs, &target("db", &path, 1, 5));
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(task.run(shutdown.clone()));
    wait_for_state(&mut rx, TaskState::Watching).await;

    append(&path, &["ERROR disk"]);
    logs.sources.emit(&path, ChangeEvent::Modified);
    append(&path, &["ERROR disk again"]);
    logs.sources.emit(&path, ChangeEvent::Modified);

    assert!(logs.sink.wait_for(2, Duration::from_secs(2)).await);
    assert!(rx.borrow().is_active());

    shutdown.cancel();
    assert_ok!(handle.await.unwrap());
}
