//! Supervisor owning one watch task per configured target.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{CompiledTarget, ConfigError, Settings, WatchTarget};
use crate::notifier::NotificationSink;
use crate::watcher::{
    ChangeSourceFactory, NotifySourceFactory, TaskContext, TaskSettings, TaskState, WatchTask,
    WatcherError,
};

use super::error::SupervisorError;
use super::status::{SupervisorStatus, TaskStatus};

/// Default bound on waiting for tasks during [`Supervisor::stop`].
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Timing options for a supervisor and its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorOptions {
    pub task: TaskSettings,
    pub stop_timeout: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            task: TaskSettings::default(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl From<&Settings> for SupervisorOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            task: settings.task_settings(),
            stop_timeout: settings.stop_timeout(),
        }
    }
}

/// Broadcasts shutdown to every task of one run.
///
/// Closing the handle cancels the tasks; [`Supervisor::stop`] also waits
/// for them.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    generation: u64,
    token: CancellationToken,
}

impl ShutdownHandle {
    /// Signal shutdown without waiting.
    pub fn close(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
struct TaskEntry {
    path: PathBuf,
    state: watch::Receiver<TaskState>,
}

struct ActiveRun {
    generation: u64,
    started_at: DateTime<Utc>,
    started: Instant,
    skipped: usize,
    tasks: BTreeMap<String, TaskEntry>,
    join_set: JoinSet<(String, Result<(), WatcherError>)>,
}

enum Phase {
    Idle,
    Running(ActiveRun),
    Stopping,
}

struct Inner {
    phase: Phase,
    generation: u64,
}

/// Starts and stops the watch tasks for a set of targets as a group.
pub struct Supervisor {
    name: String,
    sink: Arc<dyn NotificationSink>,
    sources: Arc<dyn ChangeSourceFactory>,
    options: SupervisorOptions,
    inner: Mutex<Inner>,
}

impl Supervisor {
    /// Create a supervisor watching files through the OS notification
    /// facility.
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_sources(sink, Arc::new(NotifySourceFactory::default()))
    }

    /// Create a supervisor with an explicit change source.
    #[must_use]
    pub fn with_sources(
        sink: Arc<dyn NotificationSink>,
        sources: Arc<dyn ChangeSourceFactory>,
    ) -> Self {
        Self {
            name: "LogSentry".to_string(),
            sink,
            sources,
            options: SupervisorOptions::default(),
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                generation: 0,
            }),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: SupervisorOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn options(&self) -> &SupervisorOptions {
        &self.options
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate `targets` and spawn one task per valid target.
    ///
    /// Invalid targets are logged and skipped. Must be called from within a
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::AlreadyRunning`] if a run is active or
    /// stopping, and [`SupervisorError::EmptyTaskSet`] if no target is valid.
    pub fn start(&self, targets: &[WatchTarget]) -> Result<ShutdownHandle, SupervisorError> {
        let mut inner = self.lock();
        if !matches!(inner.phase, Phase::Idle) {
            return Err(SupervisorError::AlreadyRunning);
        }

        let (compiled, skipped) = validate_targets(targets);
        if compiled.is_empty() {
            return Err(SupervisorError::EmptyTaskSet);
        }

        inner.generation += 1;
        let token = CancellationToken::new();
        let ctx = TaskContext {
            sink: Arc::clone(&self.sink),
            sources: Arc::clone(&self.sources),
            settings: self.options.task,
        };

        let mut tasks = BTreeMap::new();
        let mut join_set = JoinSet::new();
        for target in compiled {
            tracing::info!(
                target_name = %target.name,
                path = %target.path.display(),
                pattern = %target.matcher,
                "Target prepared"
            );
            let name = target.name.clone();
            let path = target.path.clone();
            let (task, state) = WatchTask::new(target, ctx.clone());
            let shutdown = token.clone();
            let task_name = name.clone();
            join_set.spawn(async move { (task_name, task.run(shutdown).await) });
            tasks.insert(name, TaskEntry { path, state });
        }

        tracing::info!(
            supervisor = %self.name,
            watched = tasks.len(),
            skipped,
            "Supervisor started"
        );

        inner.phase = Phase::Running(ActiveRun {
            generation: inner.generation,
            started_at: Utc::now(),
            started: Instant::now(),
            skipped,
            tasks,
            join_set,
        });

        Ok(ShutdownHandle {
            generation: inner.generation,
            token,
        })
    }

    /// Broadcast shutdown and wait for every task to stop.
    ///
    /// Tasks still running after the stop timeout are aborted.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotRunning`] if no run is active and
    /// [`SupervisorError::ForeignHandle`] if `handle` belongs to another run.
    pub async fn stop(&self, handle: ShutdownHandle) -> Result<(), SupervisorError> {
        let mut run = {
            let mut inner = self.lock();
            match std::mem::replace(&mut inner.phase, Phase::Stopping) {
                Phase::Running(run) if run.generation == handle.generation => run,
                Phase::Running(run) => {
                    inner.phase = Phase::Running(run);
                    return Err(SupervisorError::ForeignHandle);
                }
                other => {
                    inner.phase = other;
                    return Err(SupervisorError::NotRunning);
                }
            }
        };

        let idle_guard = StoppingGuard(self);
        handle.close();

        let join_all = async {
            while let Some(joined) = run.join_set.join_next().await {
                match joined {
                    Ok((name, Ok(()))) => tracing::debug!(target_name = %name, "Task stopped"),
                    Ok((name, Err(e))) => {
                        tracing::debug!(target_name = %name, error = %e, "Task had terminated");
                    }
                    Err(e) => tracing::warn!(error = %e, "Task join error"),
                }
            }
        };
        if tokio::time::timeout(self.options.stop_timeout, join_all)
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = run.join_set.len(),
                "Tasks did not stop in time, aborting"
            );
            run.join_set.abort_all();
            while run.join_set.join_next().await.is_some() {}
        }

        drop(run);
        drop(idle_guard);
        tracing::info!(supervisor = %self.name, "Supervisor stopped");
        Ok(())
    }

    /// True from a successful `start` until `stop` completes.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !matches!(self.lock().phase, Phase::Idle)
    }

    /// Number of tasks not yet stopped.
    #[must_use]
    pub fn active_count(&self) -> usize {
        match &self.lock().phase {
            Phase::Running(run) => run
                .tasks
                .values()
                .filter(|t| t.state.borrow().is_active())
                .count(),
            _ => 0,
        }
    }

    /// Current state of the task watching `name`.
    #[must_use]
    pub fn task_state(&self, name: &str) -> Option<TaskState> {
        match &self.lock().phase {
            Phase::Running(run) => run.tasks.get(name).map(|t| *t.state.borrow()),
            _ => None,
        }
    }

    /// Follow the state of the task watching `name`.
    #[must_use]
    pub fn subscribe_task(&self, name: &str) -> Option<watch::Receiver<TaskState>> {
        match &self.lock().phase {
            Phase::Running(run) => run.tasks.get(name).map(|t| t.state.clone()),
            _ => None,
        }
    }

    /// Snapshot of the running state.
    #[must_use]
    pub fn status(&self) -> SupervisorStatus {
        let inner = self.lock();
        match &inner.phase {
            Phase::Running(run) => SupervisorStatus {
                name: self.name.clone(),
                running: true,
                started_at: Some(run.started_at),
                uptime: Some(run.started.elapsed()),
                skipped: run.skipped,
                tasks: run
                    .tasks
                    .iter()
                    .map(|(name, entry)| TaskStatus {
                        name: name.clone(),
                        path: entry.path.clone(),
                        state: *entry.state.borrow(),
                    })
                    .collect(),
            },
            Phase::Stopping => SupervisorStatus {
                running: true,
                ..SupervisorStatus::idle(&self.name)
            },
            Phase::Idle => SupervisorStatus::idle(&self.name),
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("name", &self.name)
            .field("sink", &self.sink.name())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Returns the supervisor to idle when a stop completes or is cancelled.
///
/// A cancelled stop drops its `JoinSet`, which aborts the remaining tasks.
struct StoppingGuard<'a>(&'a Supervisor);

impl Drop for StoppingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.0.lock();
        if matches!(inner.phase, Phase::Stopping) {
            inner.phase = Phase::Idle;
        }
    }
}

/// Split `targets` into compiled ones and a count of skipped ones.
///
/// The first target of a given name wins.
fn validate_targets(targets: &[WatchTarget]) -> (Vec<CompiledTarget>, usize) {
    let mut names = HashSet::new();
    let mut compiled = Vec::with_capacity(targets.len());
    let mut skipped = 0;

    for target in targets {
        let result = if names.contains(&target.name) {
            Err(ConfigError::DuplicateName(target.name.clone()))
        } else {
            target.validate()
        };
        match result {
            Ok(t) => {
                names.insert(t.name.clone());
                compiled.push(t);
            }
            Err(e) => {
                tracing::warn!(
                    target_name = %target.name,
                    path = %target.path.display(),
                    error = %e,
                    "Incorrect target was skipped"
                );
                skipped += 1;
            }
        }
    }

    (compiled, skipped)
}
