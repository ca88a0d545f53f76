//! Notification message composition.

use std::path::{Path, PathBuf};

use crate::watcher::{MatchedLine, ScanReport};

/// Subject line used for every notification.
pub const NOTIFICATION_SUBJECT: &str = "LogSentry notification";

/// A threshold report for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Target name.
    pub target: String,
    /// Watched file.
    pub path: PathBuf,
    /// Matches counted in the current period.
    pub found: u64,
    /// Sampled matched lines from the triggering scan.
    pub lines: Vec<MatchedLine>,
    /// More matches exist than were sampled.
    pub more: bool,
}

impl Notification {
    #[must_use]
    pub fn new(target: &str, path: &Path, found: u64, report: &ScanReport) -> Self {
        Self {
            target: target.to_string(),
            path: path.to_path_buf(),
            found,
            lines: report.sampled.clone(),
            more: report.has_more(),
        }
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{NOTIFICATION_SUBJECT}.")?;
        writeln!(f)?;
        writeln!(
            f,
            "Report for \"{}\" ({} new items): {}",
            self.target,
            self.found,
            self.path.display()
        )?;
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        if self.more {
            writeln!(f, "...")?;
        }
        writeln!(f)?;
        writeln!(f, "--")?;
        write!(f, "LogSentry")
    }
}
