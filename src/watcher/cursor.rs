//! Incremental line scanner for a watched log file.
//!
//! Reads only the unseen tail of a file and classifies each new line with a
//! [`PatternMatcher`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::Instant;

use super::error::WatcherError;
use super::pattern::PatternMatcher;

/// Maximum number of matched lines kept verbatim per scan.
pub const MAX_SAMPLE_LINES: usize = 10;

/// A matched line with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedLine {
    /// Absolute line number in the file.
    pub line_number: u64,
    /// Line text without the trailing newline.
    pub text: String,
}

impl std::fmt::Display for MatchedLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.line_number, self.text)
    }
}

/// Position already consumed in a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanPosition {
    /// Bytes consumed, always at a line boundary.
    pub byte_offset: u64,
    /// Complete lines consumed.
    pub line_offset: u64,
}

impl ScanPosition {
    /// A position known only by line count.
    ///
    /// The scan reads from the start of the file and skips the first `line`
    /// lines.
    #[must_use]
    pub fn at_line(line: u64) -> Self {
        Self {
            byte_offset: 0,
            line_offset: line,
        }
    }
}

/// Result of scanning the unseen tail of a file.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// First matched lines, at most [`MAX_SAMPLE_LINES`].
    pub sampled: Vec<MatchedLine>,
    /// Every match found in this scan, sampled or not.
    pub match_count: u64,
    /// Total complete lines in the file as of this scan.
    pub total_lines: u64,
    /// Position after this scan.
    pub end: ScanPosition,
    /// The file had shrunk below the starting position and was rescanned
    /// from the beginning.
    pub truncated: bool,
}

impl ScanReport {
    /// Whether matches exist beyond the sampled lines.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.match_count > self.sampled.len() as u64
    }
}

/// Scan `path` starting after `from`.
///
/// Only newline-terminated lines are consumed. A trailing partial line is
/// left for a later scan.
///
/// # Errors
///
/// Returns [`WatcherError::FileNotFound`] or [`WatcherError::PermissionDenied`]
/// if the file cannot be opened, and [`WatcherError::Io`] on read failures.
pub async fn scan_file(
    path: &Path,
    from: ScanPosition,
    matcher: &PatternMatcher,
) -> Result<ScanReport, WatcherError> {
    let mut file = File::open(path)
        .await
        .map_err(|e| WatcherError::from_open(path, e))?;

    let file_len = file.metadata().await?.len();

    let mut start = from;
    let mut truncated = false;
    if file_len < start.byte_offset {
        tracing::warn!(
            path = %path.display(),
            old_offset = start.byte_offset,
            new_len = file_len,
            "File truncated, rescanning from the start"
        );
        start = ScanPosition::default();
        truncated = true;
    }

    if file_len == start.byte_offset && start.byte_offset > 0 {
        return Ok(ScanReport {
            total_lines: start.line_offset,
            end: start,
            truncated,
            ..ScanReport::default()
        });
    }

    let resume = start.byte_offset > 0;
    if resume {
        file.seek(std::io::SeekFrom::Start(start.byte_offset)).await?;
    }

    let mut reader = BufReader::new(file);
    let mut report = ScanReport {
        truncated,
        ..ScanReport::default()
    };
    let mut byte_offset = start.byte_offset;
    let mut line_number = if resume { start.line_offset } else { 0 };
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let bytes_read = reader.read_until(b'\n', &mut buf).await?;
        if bytes_read == 0 || buf.last() != Some(&b'\n') {
            break;
        }

        byte_offset += bytes_read as u64;
        line_number += 1;
        if line_number <= start.line_offset {
            continue;
        }

        let text = String::from_utf8_lossy(&buf);
        let text = text.trim_end_matches(['\n', '\r']);
        if matcher.is_match(text) {
            if report.sampled.len() < MAX_SAMPLE_LINES {
                report.sampled.push(MatchedLine {
                    line_number,
                    text: text.to_string(),
                });
            }
            report.match_count += 1;
        }
    }

    report.total_lines = line_number;
    report.end = ScanPosition {
        byte_offset,
        line_offset: line_number,
    };
    Ok(report)
}

/// Read position and watch start time for one file.
///
/// Owned exclusively by the task watching the file.
#[derive(Debug)]
pub struct FileCursor {
    path: PathBuf,
    position: ScanPosition,
    start_time: Instant,
}

impl FileCursor {
    /// Create a cursor at the start of `path`.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            position: ScanPosition::default(),
            start_time: Instant::now(),
        }
    }

    /// Create a cursor that resumes at `position`.
    #[must_use]
    pub fn with_position(path: PathBuf, position: ScanPosition) -> Self {
        Self {
            path,
            position,
            start_time: Instant::now(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn position(&self) -> ScanPosition {
        self.position
    }

    #[must_use]
    pub fn byte_offset(&self) -> u64 {
        self.position.byte_offset
    }

    #[must_use]
    pub fn line_offset(&self) -> u64 {
        self.position.line_offset
    }

    /// When the watch began.
    #[must_use]
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Time since the watch began.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Scan new lines and advance past them.
    ///
    /// The position is left untouched when the scan fails.
    ///
    /// # Errors
    ///
    /// See [`scan_file`].
    pub async fn scan(&mut self, matcher: &PatternMatcher) -> Result<ScanReport, WatcherError> {
        let report = scan_file(&self.path, self.position, matcher).await?;
        self.position = report.end;
        Ok(report)
    }

    /// Rewind to the start of the file, keeping the start time.
    pub fn reset(&mut self) {
        self.position = ScanPosition::default();
    }

    /// Rewind and restart the watch clock.
    pub fn restart(&mut self) {
        self.reset();
        self.start_time = Instant::now();
    }
}
