//! Tail of the gateway's date-stamped log file.
//!
//! The file name is derived from the local calendar date at call time, so a
//! read just after midnight switches to the new (possibly empty) file with no
//! carry-over from the previous day.

use std::fs::File;
use std::io::{Read as _, Seek as _, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::core::diagnostics::{Degradation, Diagnostics};
use crate::core::errors::{GwError, Result};

/// Bytes first read from the end of the file. The window doubles while it
/// holds fewer matching lines than requested.
pub const TAIL_WINDOW_BYTES: u64 = 256 * 1024;

/// Largest window a single tail grows to. Tails that need more than this are
/// truncated at the oldest end.
pub const MAX_TAIL_WINDOW_BYTES: u64 = 16 * 1024 * 1024;

/// Locates and tails `<dir>/<service>-<YYYY-MM-DD>.<ext>`.
pub struct LogReader {
    dir: PathBuf,
    service: String,
    extension: String,
    diagnostics: Arc<Diagnostics>,
}

impl LogReader {
    /// Reader for `<dir>/<service>-<date>.<extension>` files.
    #[must_use]
    pub fn new(
        dir: impl Into<PathBuf>,
        service: impl Into<String>,
        extension: impl Into<String>,
        diagnostics: Arc<Diagnostics>,
    ) -> Self {
        Self {
            dir: dir.into(),
            service: service.into(),
            extension: extension.into(),
            diagnostics,
        }
    }

    /// Log path for a given calendar date.
    #[must_use]
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{}-{}.{}",
            self.service,
            date.format("%Y-%m-%d"),
            self.extension
        ))
    }

    /// Today's log path (local date).
    #[must_use]
    pub fn today_path(&self) -> PathBuf {
        self.path_for(Local::now().date_naive())
    }

    /// Up to `max_lines` non-empty lines from today's file, oldest first.
    #[must_use]
    pub fn read_tail(&self, max_lines: usize) -> Vec<String> {
        self.read_tail_filtered(max_lines, None)
    }

    /// Like [`Self::read_tail`], keeping only lines that contain `filter`
    /// (case-insensitive) before the line budget is applied.
    #[must_use]
    pub fn read_tail_filtered(&self, max_lines: usize, filter: Option<&str>) -> Vec<String> {
        self.read_tail_at(&self.today_path(), max_lines, filter)
    }

    /// Tail an explicit file. Missing or unreadable files yield nothing.
    #[must_use]
    pub fn read_tail_at(&self, path: &Path, max_lines: usize, filter: Option<&str>) -> Vec<String> {
        if max_lines == 0 {
            return Vec::new();
        }
        match read_growing_tail(path, max_lines, filter, TAIL_WINDOW_BYTES, MAX_TAIL_WINDOW_BYTES) {
            Ok(tail) => tail,
            Err(err) => {
                self.diagnostics.record(Degradation::LogUnavailable);
                tracing::debug!(code = err.code(), error = %err, "log file unavailable");
                Vec::new()
            }
        }
    }
}

/// Tail from a trailing window that starts at `initial` bytes and doubles up
/// to `limit` until it yields `max_lines` lines or covers the whole file.
fn read_growing_tail(
    path: &Path,
    max_lines: usize,
    filter: Option<&str>,
    initial: u64,
    limit: u64,
) -> Result<Vec<String>> {
    let mut window = initial.max(1).min(limit);
    loop {
        let (text, whole_file) = read_window(path, window)?;
        let tail = tail_lines(&text, max_lines, filter);
        if tail.len() >= max_lines || whole_file || window >= limit {
            return Ok(tail);
        }
        window = window.saturating_mul(2).min(limit);
    }
}

/// Read at most `window` trailing bytes, and report whether that covered the
/// whole file. When the read starts mid-file, the partial first line is
/// dropped.
fn read_window(path: &Path, window: u64) -> Result<(String, bool)> {
    let mut file = File::open(path).map_err(|e| GwError::io(path, e))?;
    let len = file.metadata().map_err(|e| GwError::io(path, e))?.len();
    let offset = len.saturating_sub(window);
    if offset > 0 {
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| GwError::io(path, e))?;
    }
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| GwError::io(path, e))?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    if offset == 0 {
        return Ok((text, true));
    }
    let rest = text
        .split_once('\n')
        .map(|(_, rest)| rest.to_string())
        .unwrap_or_default();
    Ok((rest, false))
}

/// Last `max_lines` non-empty (and, if given, matching) lines in order.
#[must_use]
pub fn tail_lines(text: &str, max_lines: usize, filter: Option<&str>) -> Vec<String> {
    let needle = filter.map(str::to_lowercase).filter(|n| !n.is_empty());
    let mut lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| {
            needle
                .as_deref()
                .is_none_or(|n| line.to_lowercase().contains(n))
        })
        .collect();
    let skip = lines.len().saturating_sub(max_lines);
    lines.drain(..skip);
    lines.into_iter().map(str::to_string).collect()
}
