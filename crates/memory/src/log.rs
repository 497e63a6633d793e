//! The per-agent memory log.
//!
//! Format (UTF-8, entries concatenated in append order):
//!
//! ```text
//! ## <RFC3339 UTC timestamp>
//! **Task:** <single line>
//! **Result:** <text, truncated past 1000 chars>
//!
//! ```
//!
//! Any text before the first `## ` marker is not a valid entry; bounded
//! reads and trimming discard it. The file is never locked — two
//! overlapping runs of the same agent can race, and a trim racing an append
//! can lose the appended entry. That risk is accepted; what the log does
//! guarantee is that trimming never leaves a partially written file.

use chrono::{DateTime, SecondsFormat, Utc};
use foreman_core::error::MemoryError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Marker that opens every entry.
pub const ENTRY_MARKER: &str = "## ";

/// Result text beyond this many characters is cut and marked.
pub const RESULT_LIMIT: usize = 1000;

const TRUNCATION_MARKER: &str = "... [truncated]";

/// Outcome of a retention trim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimOutcome {
    /// Oldest entries removed
    pub removed: usize,
    /// Entries remaining in the file
    pub kept: usize,
}

/// Handle to one agent's memory log file.
pub struct MemoryLog {
    path: PathBuf,
    clock: fn() -> DateTime<Utc>,
}

impl MemoryLog {
    /// Open a log handle. The file itself is created lazily on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            clock: Utc::now,
        }
    }

    /// Swap the time source. Test-only hook; the default is the real clock.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. Existing content is never rewritten or reordered.
    pub fn append(&self, task: &str, result: &str) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MemoryError::Storage(format!("Failed to create memory directory: {e}"))
            })?;
        }

        let timestamp = (self.clock)().to_rfc3339_opts(SecondsFormat::Secs, true);
        let block = format!(
            "{ENTRY_MARKER}{timestamp}\n**Task:** {}\n**Result:** {}\n\n",
            single_line(task),
            truncate_result(result),
        );

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(block.as_bytes())?;

        debug!(path = %self.path.display(), "Appended memory entry");
        Ok(())
    }

    /// Read the tail of the log.
    ///
    /// `n == 0` returns the whole file verbatim (including any preamble
    /// before the first marker). `n > 0` returns the last `n` entries,
    /// byte-identical to their serialized form. Absent or empty files read
    /// as an empty string, not an error.
    pub fn load_tail(&self, n: usize) -> Result<String, MemoryError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
            Err(e) => return Err(e.into()),
        };

        if n == 0 {
            return Ok(content);
        }

        let starts = entry_starts(&content);
        if starts.is_empty() {
            return Ok(String::new());
        }
        let from = starts[starts.len().saturating_sub(n)];
        Ok(content[from..].to_string())
    }

    /// Count entries; 0 for an absent or empty file.
    pub fn count(&self) -> Result<usize, MemoryError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        Ok(entry_starts(&content).len())
    }

    /// Remove the oldest entries beyond `keep_n`, atomically.
    ///
    /// `keep_n == 0` means "no trim target", not "delete everything": the
    /// file is untouched and zero removals are reported. Otherwise the kept
    /// tail is written to a temporary file in the same directory (so the
    /// rename is atomic on every supported platform), the original's
    /// permission bits are copied onto it, and the rename replaces the
    /// original. Any failure up to and including the rename leaves the
    /// original byte-identical; the temp file is cleaned up on drop.
    pub fn trim(&self, keep_n: usize) -> Result<TrimOutcome, MemoryError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(TrimOutcome { removed: 0, kept: 0 });
            }
            Err(e) => return Err(e.into()),
        };

        let starts = entry_starts(&content);
        let total = starts.len();
        if keep_n == 0 || total <= keep_n {
            return Ok(TrimOutcome {
                removed: 0,
                kept: total,
            });
        }

        // Same tail selection as load_tail(keep_n).
        let tail = &content[starts[total - keep_n]..];

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(|e| MemoryError::Storage(format!("Failed to create temp file: {e}")))?;
        tmp.write_all(tail.as_bytes())?;
        tmp.flush()?;

        // Temp files are created with restrictive permissions; carry the
        // original's bits over before the rename.
        let perms = std::fs::metadata(&self.path)?.permissions();
        std::fs::set_permissions(tmp.path(), perms)?;

        tmp.persist(&self.path)
            .map_err(|e| MemoryError::Storage(format!("Failed to replace memory log: {e}")))?;

        let removed = total - keep_n;
        debug!(
            path = %self.path.display(),
            removed,
            kept = keep_n,
            "Trimmed memory log"
        );
        Ok(TrimOutcome {
            removed,
            kept: keep_n,
        })
    }
}

/// Byte offsets where entries begin: lines starting with `## `.
fn entry_starts(content: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    if content.starts_with(ENTRY_MARKER) {
        starts.push(0);
    }
    let mut from = 0;
    while let Some(pos) = content[from..].find('\n') {
        let line_start = from + pos + 1;
        if content[line_start..].starts_with(ENTRY_MARKER) {
            starts.push(line_start);
        }
        from = line_start;
    }
    starts
}

/// Collapse embedded newlines so the task stays on one line.
fn single_line(task: &str) -> String {
    task.replace(['\n', '\r'], " ")
}

/// Cap result text at [`RESULT_LIMIT`] characters, preserving newlines.
fn truncate_result(result: &str) -> String {
    if result.chars().count() <= RESULT_LIMIT {
        return result.to_string();
    }
    let cut: String = result.chars().take(RESULT_LIMIT).collect();
    format!("{cut}{TRUNCATION_MARKER}")
}
