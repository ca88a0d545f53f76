//! Change-event sources for watched files.
//!
//! A [`ChangeSourceFactory`] subscribes to a path and returns a
//! [`ChangeSource`] yielding [`ChangeEvent`]s. The OS-backed implementation
//! uses notify-debouncer-full and bridges events into a tokio channel.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use notify_debouncer_full::{
    new_debouncer,
    notify::{event::ModifyKind, EventKind, RecommendedWatcher, RecursiveMode},
    DebounceEventResult, DebouncedEvent, Debouncer, RecommendedCache,
};
use tokio::sync::mpsc;

use super::error::WatcherError;

/// Default debounce window for OS file events.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// A change observed on a watched path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// File content changed.
    Modified,
    /// File attributes changed, or it was moved, deleted or recreated.
    AttributeChanged,
    /// The underlying watch reported an error.
    Error(String),
}

/// A subscription to change events for one path.
#[async_trait]
pub trait ChangeSource: Send {
    /// Wait for the next event. `None` means the source is closed.
    async fn next_event(&mut self) -> Option<ChangeEvent>;
}

/// Creates change subscriptions.
pub trait ChangeSourceFactory: Send + Sync {
    /// Subscribe to changes of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established.
    fn subscribe(&self, path: &Path) -> Result<Box<dyn ChangeSource>, WatcherError>;
}

/// OS-backed change source factory.
#[derive(Debug, Clone)]
pub struct NotifySourceFactory {
    debounce: Duration,
}

impl NotifySourceFactory {
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self { debounce }
    }
}

impl Default for NotifySourceFactory {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl ChangeSourceFactory for NotifySourceFactory {
    fn subscribe(&self, path: &Path) -> Result<Box<dyn ChangeSource>, WatcherError> {
        Ok(Box::new(NotifyChangeSource::new(
            path.to_path_buf(),
            self.debounce,
        )?))
    }
}

/// Change source backed by a notify debouncer.
///
/// Watches the parent directory so that the subscription survives the file
/// being removed and recreated.
pub struct NotifyChangeSource {
    path: PathBuf,
    event_rx: mpsc::UnboundedReceiver<ChangeEvent>,
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl NotifyChangeSource {
    /// Start watching `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the notify watcher cannot be created.
    pub fn new(path: PathBuf, debounce: Duration) -> Result<Self, WatcherError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let filter_path = path.clone();

        let mut debouncer = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    for event in &events {
                        if let Some(change) = classify(event, &filter_path) {
                            let _ = event_tx.send(change);
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        let _ = event_tx.send(ChangeEvent::Error(error.to_string()));
                    }
                }
            }
        })?;

        let watch_target = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(&path)
            .to_path_buf();
        debouncer.watch(&watch_target, RecursiveMode::NonRecursive)?;

        tracing::debug!(path = %path.display(), "Subscribed to file changes");

        Ok(Self {
            path,
            event_rx,
            _debouncer: debouncer,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ChangeSource for NotifyChangeSource {
    async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.event_rx.recv().await
    }
}

/// Map a debounced notify event to a change on `path`.
fn classify(event: &DebouncedEvent, path: &Path) -> Option<ChangeEvent> {
    if !event.paths.iter().any(|p| p == path) {
        return None;
    }
    match event.kind {
        EventKind::Modify(ModifyKind::Metadata(_) | ModifyKind::Name(_))
        | EventKind::Remove(_)
        | EventKind::Create(_) => Some(ChangeEvent::AttributeChanged),
        EventKind::Modify(_) => Some(ChangeEvent::Modified),
        _ => None,
    }
}

/// In-process change source factory driven by explicit calls to
/// [`ChannelSourceFactory::emit`].
///
/// Each `subscribe` replaces the previous subscription for the same path.
#[derive(Debug, Default)]
pub struct ChannelSourceFactory {
    senders: Mutex<HashMap<PathBuf, mpsc::UnboundedSender<ChangeEvent>>>,
    subscriptions: Mutex<HashMap<PathBuf, usize>>,
}

impl ChannelSourceFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to the current subscriber of `path`.
    ///
    /// Returns `false` if nobody is subscribed.
    pub fn emit(&self, path: &Path, event: ChangeEvent) -> bool {
        let senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders
            .get(path)
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Close the current subscription of `path`.
    pub fn close(&self, path: &Path) {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
    }

    /// Whether a live subscriber exists for `path`.
    #[must_use]
    pub fn is_subscribed(&self, path: &Path) -> bool {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .is_some_and(|tx| !tx.is_closed())
    }

    /// How many times `path` has been subscribed.
    #[must_use]
    pub fn subscription_count(&self, path: &Path) -> usize {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

impl ChangeSourceFactory for ChannelSourceFactory {
    fn subscribe(&self, path: &Path) -> Result<Box<dyn ChangeSource>, WatcherError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), tx);
        *self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_path_buf())
            .or_insert(0) += 1;
        Ok(Box::new(ChannelChangeSource { event_rx: rx }))
    }
}

/// Receiving half of a [`ChannelSourceFactory`] subscription.
#[derive(Debug)]
pub struct ChannelChangeSource {
    event_rx: mpsc::UnboundedReceiver<ChangeEvent>,
}

#[async_trait]
impl ChangeSource for ChannelChangeSource {
    async fn next_event(&mut self) -> Option<ChangeEvent> {
        self.event_rx.recv().await
    }
}
