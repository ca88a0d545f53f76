//! Per-file watch engine.
//!
//! Scans watched files incrementally, counts pattern matches over rolling
//! periods and drives one task per file.

mod cursor;
mod error;
mod pattern;
mod source;
mod state;
mod task;
mod window;

pub use cursor::{scan_file, FileCursor, MatchedLine, ScanPosition, ScanReport, MAX_SAMPLE_LINES};
pub use error::WatcherError;
pub use pattern::{PatternError, PatternMatcher};
pub use source::{
    ChangeEvent, ChangeSource, ChangeSourceFactory, ChannelChangeSource, ChannelSourceFactory,
    NotifyChangeSource, NotifySourceFactory, DEFAULT_DEBOUNCE,
};
pub use state::TaskState;
pub use task::{TaskContext, TaskSettings, WatchTask, RELEASE_TIMEOUT, ROTATION_GRACE};
pub use window::{WindowCounter, WindowPolicy, WindowUpdate};
