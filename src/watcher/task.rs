//! Per-file watch task.
//!
//! A [`WatchTask`] owns the cursor and counter of one target and runs the
//! scan, count, notify cycle every time its change source reports an event.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::CompiledTarget;
use crate::notifier::{Notification, NotificationSink};

use super::cursor::FileCursor;
use super::error::WatcherError;
use super::source::{ChangeEvent, ChangeSource, ChangeSourceFactory};
use super::state::TaskState;
use super::window::WindowCounter;

/// Wait before deciding whether a removed file was rotated or is gone.
pub const ROTATION_GRACE: Duration = Duration::from_secs(2);

/// Upper bound on releasing an OS file watch.
pub const RELEASE_TIMEOUT: Duration = Duration::from_secs(1);

/// Timing knobs shared by all tasks of a supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSettings {
    pub rotation_grace: Duration,
    pub release_timeout: Duration,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            rotation_grace: ROTATION_GRACE,
            release_timeout: RELEASE_TIMEOUT,
        }
    }
}

/// Collaborators handed to every task.
#[derive(Clone)]
pub struct TaskContext {
    pub sink: Arc<dyn NotificationSink>,
    pub sources: Arc<dyn ChangeSourceFactory>,
    pub settings: TaskSettings,
}

enum Recheck {
    Present(Box<dyn ChangeSource>),
    Lost,
    Shutdown,
}

/// Watches a single target until shutdown or a fatal file error.
pub struct WatchTask {
    target: CompiledTarget,
    cursor: FileCursor,
    counter: WindowCounter,
    ctx: TaskContext,
    state: watch::Sender<TaskState>,
}

impl WatchTask {
    /// Create an idle task for `target`.
    ///
    /// Returns the task and a receiver that follows its state.
    #[must_use]
    pub fn new(target: CompiledTarget, ctx: TaskContext) -> (Self, watch::Receiver<TaskState>) {
        let (state, state_rx) = watch::channel(TaskState::Idle);
        let cursor = FileCursor::new(target.path.clone());
        let counter = WindowCounter::new(target.policy);
        (
            Self {
                target,
                cursor,
                counter,
                ctx,
                state,
            },
            state_rx,
        )
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.target.name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.target.path
    }

    #[must_use]
    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn cursor(&self) -> &FileCursor {
        &self.cursor
    }

    #[must_use]
    pub fn counter(&self) -> &WindowCounter {
        &self.counter
    }

    /// Run until `shutdown` is cancelled or the watch is lost.
    ///
    /// The task always ends in [`TaskState::Stopped`] with its file watch
    /// released.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::WatchLost`] if the file does not reappear after
    /// the rotation grace period, [`WatcherError::SourceClosed`] if the change
    /// source ends, or the subscription error if watching cannot start.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), WatcherError> {
        let span = tracing::info_span!("watch", target_name = %self.target.name);
        async move {
            let result = self.watch(&shutdown).await;
            if let Err(ref e) = result {
                tracing::error!(path = %self.target.path.display(), error = %e, "Watch terminated");
            }
            self.transition(TaskState::Stopped);
            result
        }
        .instrument(span)
        .await
    }

    async fn watch(&mut self, shutdown: &CancellationToken) -> Result<(), WatcherError> {
        let mut source = self.ctx.sources.subscribe(&self.target.path)?;
        self.transition(TaskState::Watching);

        let result = loop {
            let event = tokio::select! {
                biased;

                () = shutdown.cancelled() => break Ok(()),
                event = source.next_event() => event,
            };

            match event {
                None => break Err(WatcherError::SourceClosed(self.target.path.clone())),
                Some(ChangeEvent::Error(message)) => {
                    tracing::warn!(error = %message, "File watcher error");
                    continue;
                }
                Some(ChangeEvent::AttributeChanged) => {
                    tracing::info!(
                        path = %self.target.path.display(),
                        "File was deleted or moved"
                    );
                    match self.recheck(shutdown).await {
                        Ok(Recheck::Present(fresh)) => {
                            let old = std::mem::replace(&mut source, fresh);
                            self.release(old).await;
                            self.cursor.reset();
                        }
                        Ok(Recheck::Lost) => {
                            break Err(WatcherError::WatchLost(self.target.path.clone()))
                        }
                        Ok(Recheck::Shutdown) => break Ok(()),
                        Err(e) => break Err(e),
                    }
                }
                Some(ChangeEvent::Modified) => {}
            }

            self.check().await;
            self.transition(TaskState::Watching);
        };

        self.release(source).await;
        result
    }

    /// Wait out the rotation grace period and resubscribe if the file is back.
    async fn recheck(&self, shutdown: &CancellationToken) -> Result<Recheck, WatcherError> {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => return Ok(Recheck::Shutdown),
            () = tokio::time::sleep(self.ctx.settings.rotation_grace) => {}
        }

        if !tokio::fs::try_exists(&self.target.path).await.unwrap_or(false) {
            return Ok(Recheck::Lost);
        }

        let fresh = self.ctx.sources.subscribe(&self.target.path)?;
        tracing::debug!(path = %self.target.path.display(), "Watch re-created");
        Ok(Recheck::Present(fresh))
    }

    /// One scan, count and notify cycle. Scan failures abort the cycle only.
    async fn check(&mut self) {
        self.transition(TaskState::Scanning);

        let report = match self.cursor.scan(&self.target.matcher).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(path = %self.target.path.display(), error = %e, "Scan failed");
                return;
            }
        };

        let update = self
            .counter
            .update(self.cursor.elapsed(), report.match_count);

        tracing::debug!(
            sent = update.should_notify,
            new = report.match_count,
            found = update.found_in_period,
            boundary = self.counter.escalated_boundary(),
            counter = self.counter.notifications_sent_in_period(),
            limit = self.counter.policy().limit,
            "Check done"
        );

        if update.should_notify {
            self.transition(TaskState::Notifying);
            let notification = Notification::new(
                &self.target.name,
                &self.target.path,
                update.found_in_period,
                &report,
            );
            self.dispatch(notification.to_string());
        }
    }

    /// Hand a message to the sink without waiting for delivery.
    fn dispatch(&self, message: String) {
        let sink = Arc::clone(&self.ctx.sink);
        let recipients = self.target.recipients.clone();
        tokio::spawn(
            async move {
                if let Err(e) = sink.notify(&message, &recipients).await {
                    tracing::warn!(sink = sink.name(), error = %e, "Notification delivery failed");
                }
            }
            .in_current_span(),
        );
    }

    /// Drop a change source on a blocking thread, bounded by the release timeout.
    async fn release(&self, source: Box<dyn ChangeSource>) {
        let handle = tokio::task::spawn_blocking(move || drop(source));
        if tokio::time::timeout(self.ctx.settings.release_timeout, handle)
            .await
            .is_err()
        {
            tracing::warn!(
                path = %self.target.path.display(),
                "Timed out releasing file watch"
            );
        }
    }

    fn transition(&self, next: TaskState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            tracing::debug!(from = %prev, to = %next, "State transition");
        }
    }
}
