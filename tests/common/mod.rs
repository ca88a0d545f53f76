//! Shared fixtures for integration tests.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use logsentry::config::WatchTarget;
use logsentry::notifier::MemorySink;
use logsentry::watcher::{
    ChangeEvent, ChangeSource, ChangeSourceFactory, ChannelSourceFactory, TaskState, WatcherError,
};
use tempfile::TempDir;
use tokio::sync::watch;

/// Rotation grace used by tests instead of the two second default.
pub const TEST_GRACE: Duration = Duration::from_millis(200);

pub struct LogDir {
    pub dir: TempDir,
    pub sink: Arc<MemorySink>,
    pub sources: Arc<ChannelSourceFactory>,
}

impl LogDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
            sink: Arc::new(MemorySink::new()),
            sources: Arc::new(ChannelSourceFactory::new()),
        }
    }

    /// Create an empty log file and return its path.
    pub fn log(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, "").expect("Failed to create log file");
        path
    }
}

pub fn target(name: &str, path: &Path, boundary: u64, limit: u64) -> WatchTarget {
    WatchTarget {
        name: name.to_string(),
        path: path.to_path_buf(),
        pattern: "ERROR".to_string(),
        boundary,
        increasing: false,
        recipients: vec!["ops@example.com".to_string()],
        limit,
        period_seconds: 3600,
    }
}

pub fn append(path: &Path, lines: &[&str]) {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .expect("Failed to open log file");
    for line in lines {
        writeln!(file, "{line}").expect("Failed to append");
    }
}

pub async fn wait_for_state(rx: &mut watch::Receiver<TaskState>, state: TaskState) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == state))
        .await
        .expect("Timed out waiting for task state")
        .expect("Task state channel closed");
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Change source that never yields and blocks the dropping thread for `hold`.
pub struct StuckSource {
    hold: Duration,
}

#[async_trait]
impl ChangeSource for StuckSource {
    async fn next_event(&mut self) -> Option<ChangeEvent> {
        std::future::pending().await
    }
}

impl Drop for StuckSource {
    fn drop(&mut self) {
        std::thread::sleep(self.hold);
    }
}

/// Hands out [`StuckSource`]s, emulating a watch primitive that hangs on release.
pub struct StuckSourceFactory {
    pub hold: Duration,
}

impl ChangeSourceFactory for StuckSourceFactory {
    fn subscribe(&self, _path: &Path) -> Result<Box<dyn ChangeSource>, WatcherError> {
        Ok(Box::new(StuckSource { hold: self.hold }))
    }
}
