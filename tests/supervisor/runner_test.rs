use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use logsentry::supervisor::{Supervisor, SupervisorError, SupervisorOptions};
use logsentry::watcher::{ChangeEvent, TaskSettings, TaskState};
use tokio_test::assert_ok;

use crate::common::{append, eventually, target, LogDir, StuckSourceFactory, TEST_GRACE};

fn supervisor(logs: &LogDir) -> Supervisor {
    Supervisor::with_sources(logs.sink.clone(), logs.sources.clone())
        .with_options(SupervisorOptions {
            task: TaskSettings {
                rotation_grace: TEST_GRACE,
                ..TaskSettings::default()
            },
            stop_timeout: Duration::from_secs(5),
        })
}

#[tokio::test]
async fn start_spawns_one_task_per_valid_target() {
    let logs = LogDir::new();
    let a = logs.log("a.log");
    let b = logs.log("b.log");
    let sup = supervisor(&logs);

    let handle = sup
        .start(&[
            target("a", &a, 1, 1),
            target("b", &b, 1, 1),
            target("c", &PathBuf::from("/nonexistent/logsentry-c.log"), 1, 1),
        ])
        .unwrap();

    assert!(sup.is_running());
    let status = sup.status();
    assert_eq!(status.tasks.len(), 2);
    assert_eq!(status.skipped, 1);
    assert!(sup.task_state("c").is_none());
    assert!(eventually(|| sup.active_count() == 2).await);
    assert!(eventually(|| logs.sources.is_subscribed(&a) && logs.sources.is_subscribed(&b)).await);

    assert_ok!(sup.stop(handle).await);
}

#[tokio::test]
async fn second_start_is_rejected() {
    let logs = LogDir::new();
    let a = logs.log("a.log");
    let sup = supervisor(&logs);
    let targets = [target("a", &a, 1, 1)];

    let handle = sup.start(&targets).unwrap();
    assert_eq!(sup.start(&targets).unwrap_err(), SupervisorError::AlreadyRunning);

    assert_ok!(sup.stop(handle).await);
    assert_eq!(
        sup.stop(sup.start(&targets).unwrap()).await,
        Ok(())
    );
}

#[tokio::test]
async fn stop_waits_for_every_task() {
    let logs = LogDir::new();
    let a = logs.log("a.log");
    let b = logs.log("b.log");
    let sup = supervisor(&logs);

    let handle = sup
        .start(&[target("a", &a, 1, 1), target("b", &b, 1, 1)])
        .unwrap();
    let mut a_state = sup.subscribe_task("a").unwrap();
    let mut b_state = sup.subscribe_task("b").unwrap();
    assert!(eventually(|| sup.active_count() == 2).await);

    assert_ok!(sup.stop(handle).await);

    assert_eq!(*a_state.borrow_and_update(), TaskState::Stopped);
    assert_eq!(*b_state.borrow_and_update(), TaskState::Stopped);
    assert!(!sup.is_running());
    assert_eq!(sup.active_count(), 0);
    assert!(sup.status().tasks.is_empty());
}

#[tokio::test]
async fn lost_task_does_not_affect_siblings() {
    let logs = LogDir::new();
    let a = logs.log("a.log");
    let b = logs.log("b.log");
    let sup = supervisor(&logs);

    let handle = sup
        .start(&[target("a", &a, 1, 5), target("b", &b, 1, 5)])
        .unwrap();
    assert!(eventually(|| logs.sources.is_subscribed(&a) && logs.sources.is_subscribed(&b)).await);

    std::fs::remove_file(&a).unwrap();
    logs.sources.emit(&a, ChangeEvent::AttributeChanged);
    assert!(eventually(|| sup.task_state("a") == Some(TaskState::Stopped)).await);
    assert_eq!(sup.active_count(), 1);

    append(&b, &["ERROR still here"]);
    logs.sources.emit(&b, ChangeEvent::Modified);
    assert!(logs.sink.wait_for(1, Duration::from_secs(2)).await);
    assert!(logs.sink.deliveries()[0].message.contains("Report for \"b\""));

    assert!(sup.is_running());
    assert_ok!(sup.stop(handle).await);
}

#[tokio::test]
async fn status_display_reflects_run() {
    let logs = LogDir::new();
    let a = logs.log("a.log");
    let sup = supervisor(&logs).with_name("Sentry");
    assert!(sup.status().to_string().contains("(idle)"));

    let handle = sup.start(&[target("a", &a, 1, 1)]).unwrap();
    assert!(eventually(|| sup.active_count() == 1).await);
    assert!(sup.status().to_string().contains("1/1 tasks active"));

    assert_ok!(sup.stop(handle).await);
}

#[tokio::test]
async fn stop_aborts_tasks_past_timeout() {
    let logs = LogDir::new();
    let a = logs.log("a.log");
    let stop_timeout = Duration::from_millis(100);
    let sup = Supervisor::with_sources(
        logs.sink.clone(),
        Arc::new(StuckSourceFactory {
            hold: Duration::from_secs(2),
        }),
    )
    .with_options(SupervisorOptions {
        task: TaskSettings {
            rotation_grace: TEST_GRACE,
            release_timeout: Duration::from_secs(10),
        },
        stop_timeout,
    });

    let handle = sup.start(&[target("a", &a, 1, 1)]).unwrap();
    let mut state = sup.subscribe_task("a").unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == TaskState::Watching),
    )
    .await
    .unwrap()
    .unwrap();

    let started = tokio::time::Instant::now();
    assert_ok!(sup.stop(handle).await);
    let elapsed = started.elapsed();
    assert!(elapsed >= stop_timeout);
    assert!(elapsed < Duration::from_secs(1), "stop took {elapsed:?}");
    assert!(!sup.is_running());
    assert_eq!(sup.active_count(), 0);
}
