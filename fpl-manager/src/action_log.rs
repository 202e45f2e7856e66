// Append-only plain-text log of actions taken and weekly summaries.
//
// One line per entry: `[YYYY-MM-DD HH:MM:SS] message`. The file is opened,
// appended and closed on every write, so two concurrent runs may interleave
// lines. It doubles as the resume marker for the gameweek summary phase.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::warn;

/// Prefix of the first line of every gameweek summary block.
pub const SUMMARY_MARKER: &str = "Gameweek Summary for GW";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct ActionLog {
    path: PathBuf,
}

impl ActionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry stamped with the local time. A write failure is
    /// reported and swallowed; it never aborts the caller.
    pub fn append(&self, message: &str) {
        if let Err(e) = self.append_at(Local::now().naive_local(), message) {
            warn!(path = %self.path.display(), "failed to write action log: {e}");
        }
    }

    /// Append one entry with an explicit timestamp.
    pub fn append_at(&self, at: NaiveDateTime, message: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "[{}] {}", at.format(TIMESTAMP_FORMAT), message)
    }

    /// Highest gameweek that already has a summary in the log, or 0 when the
    /// log is missing or holds no summary.
    pub fn last_logged_gameweek(&self) -> u32 {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => text.lines().rev().filter_map(parse_summary_marker).max().unwrap_or(0),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => {
                warn!(path = %self.path.display(), "failed to read action log: {e}");
                0
            }
        }
    }
}

/// Extract `N` from a line containing `Gameweek Summary for GW<N>`.
fn parse_summary_marker(line: &str) -> Option<u32> {
    let (_, rest) = line.split_once(SUMMARY_MARKER)?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
