//! Worklog Store
//!
//! Append-only, timestamped text log keyed by a worklog id (a file name or
//! path). Every entry is one line, `[YYYY-MM-DD HH:MM:SS] text`, written with
//! a single `O_APPEND` write so concurrent writers (tool server and CLI)
//! never interleave partial lines and nothing ever rewrites existing bytes.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

/// Timestamp layout used in every worklog line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One worklog line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorklogEntry {
    pub timestamp: NaiveDateTime,
    pub text: String,
}

impl WorklogEntry {
    /// Build an entry; embedded line breaks are flattened to spaces
    pub fn new(timestamp: NaiveDateTime, text: impl AsRef<str>) -> Self {
        let text = text
            .as_ref()
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join(" ");
        Self { timestamp, text }
    }

    /// Entry stamped with the local wall-clock time
    pub fn now(text: impl AsRef<str>) -> Self {
        Self::new(Local::now().naive_local(), text)
    }

    /// Parse a `[YYYY-MM-DD HH:MM:SS] text` line
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('[')?;
        let (stamp, text) = rest.split_once("] ")?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            timestamp,
            text: text.trim_end_matches(['\r', '\n']).to_string(),
        })
    }
}

impl std::fmt::Display for WorklogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format(TIMESTAMP_FORMAT), self.text)
    }
}

/// File-backed worklog store.
///
/// Worklog ids are resolved relative to `root`; an absolute id is used as-is.
#[derive(Clone, Debug, Default)]
pub struct WorklogStore {
    root: PathBuf,
}

impl WorklogStore {
    /// Store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store resolving ids against the process working directory
    pub fn in_working_dir() -> Self {
        Self::default()
    }

    /// On-disk location of a worklog
    pub fn path_for(&self, worklog_id: &str) -> PathBuf {
        self.root.join(worklog_id)
    }

    /// Whether the worklog already has a file
    pub fn exists(&self, worklog_id: &str) -> bool {
        self.path_for(worklog_id).is_file()
    }

    /// Append one entry stamped with the current time
    pub fn append(&self, worklog_id: &str, text: impl AsRef<str>) -> io::Result<()> {
        self.append_entry(worklog_id, &WorklogEntry::now(text))
    }

    /// Append one entry with an explicit timestamp
    pub fn append_at(
        &self,
        worklog_id: &str,
        timestamp: NaiveDateTime,
        text: impl AsRef<str>,
    ) -> io::Result<()> {
        self.append_entry(worklog_id, &WorklogEntry::new(timestamp, text))
    }

    fn append_entry(&self, worklog_id: &str, entry: &WorklogEntry) -> io::Result<()> {
        let path = self.path_for(worklog_id);
        ensure_parent(&path)?;

        // Whole line in one buffer so the append is a single write.
        let line = format!("{entry}\n");
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;

        tracing::trace!(worklog = %path.display(), "appended worklog entry");
        Ok(())
    }

    /// Full worklog text for replay; empty when the log does not exist yet
    pub fn read_all(&self, worklog_id: &str) -> io::Result<String> {
        match std::fs::read_to_string(self.path_for(worklog_id)) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    /// Parsed entries; lines that do not follow the entry layout are skipped
    pub fn entries(&self, worklog_id: &str) -> io::Result<Vec<WorklogEntry>> {
        Ok(self
            .read_all(worklog_id)?
            .lines()
            .filter_map(WorklogEntry::parse)
            .collect())
    }
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}
