//! Persistent tailing of the OTRS daemon logs
//!
//! Keeps one byte cursor per watched file and returns only lines appended
//! since the previous poll. Cursors are written to an offset file after every
//! poll so a restarted exporter neither replays nor skips lines.
//!
//! The watched source is either a plain path or a path whose file name holds
//! `*`/`?` wildcards, e.g. `/opt/otrs/var/log/Daemon/*`.

use crate::error::{CollectorError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default watched daemon log pattern
pub const DEFAULT_LOG_PATH: &str = "/opt/otrs/var/log/Daemon/*";

/// Default location of the persisted cursors
pub const DEFAULT_OFFSET_PATH: &str = "/var/lib/otrs-exporter/daemon-log.offset";

/// Read position within one log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogCursor {
    /// File identity, used to detect rotation
    pub inode: u64,
    /// Bytes already consumed
    pub offset: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CursorFile {
    files: BTreeMap<PathBuf, LogCursor>,
}

/// Tails a log file or wildcard set of log files
pub struct LogTailReader {
    pattern: String,
    offset_path: PathBuf,
    cursors: BTreeMap<PathBuf, LogCursor>,
}

impl LogTailReader {
    /// Create a reader, resuming from the cursors stored at `offset_path`
    pub fn new(pattern: impl Into<String>, offset_path: impl Into<PathBuf>) -> Self {
        let offset_path = offset_path.into();
        let cursors = match load_cursors(&offset_path) {
            Ok(cursors) => cursors,
            Err(e) => {
                warn!(path = %offset_path.display(), error = %e, "Failed to load log cursors, starting fresh");
                BTreeMap::new()
            }
        };

        Self {
            pattern: pattern.into(),
            offset_path,
            cursors,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Current cursor for `path`, if it has been read before
    pub fn cursor(&self, path: &Path) -> Option<LogCursor> {
        self.cursors.get(path).copied()
    }

    /// New complete lines since the last poll, empty if the log is unavailable
    pub fn poll_new_lines(&mut self) -> Vec<String> {
        match self.try_poll() {
            Ok(lines) => lines,
            Err(e) => {
                warn!(pattern = %self.pattern, error = %e, "Log tail unavailable");
                Vec::new()
            }
        }
    }

    /// New complete lines since the last poll
    ///
    /// A trailing line without a newline is held back until it is completed.
    pub fn try_poll(&mut self) -> Result<Vec<String>> {
        let files = resolve_files(&self.pattern)?;
        let mut lines = Vec::new();
        let mut next = BTreeMap::new();

        for path in files {
            let previous = self
                .cursors
                .get(&path)
                .copied()
                .or_else(|| self.moved_cursor(&path));
            match read_appended(&path, previous) {
                Ok((mut appended, cursor)) => {
                    lines.append(&mut appended);
                    next.insert(path, cursor);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read log file");
                    if let Some(cursor) = previous {
                        next.insert(path, cursor);
                    }
                }
            }
        }

        if next != self.cursors {
            self.cursors = next;
            if let Err(e) = self.persist() {
                warn!(error = %e, "Log cursor not persisted, will retry on next poll");
            }
        }

        Ok(lines)
    }

    /// Cursor of a file that was renamed to `path`, found by its inode
    fn moved_cursor(&self, path: &Path) -> Option<LogCursor> {
        let inode = fs::metadata(path).ok().map(|m| file_identity(&m))?;
        if inode == 0 {
            return None;
        }

        let (from, cursor) = self
            .cursors
            .iter()
            .find(|(_, cursor)| cursor.inode == inode)?;
        debug!(
            from = %from.display(),
            to = %path.display(),
            offset = cursor.offset,
            "Log file renamed, keeping its cursor"
        );
        Some(*cursor)
    }

    /// Write the cursors to the offset file via a temporary file and rename
    pub fn persist(&self) -> Result<()> {
        let persist_err = |source| CollectorError::CursorPersist {
            path: self.offset_path.clone(),
            source,
        };

        if let Some(parent) = self.offset_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(persist_err)?;
            }
        }

        let state = CursorFile {
            files: self.cursors.clone(),
        };
        let json = serde_json::to_vec_pretty(&state)
            .map_err(|e| persist_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let tmp_path = self.offset_path.with_extension("tmp");
        fs::write(&tmp_path, json).map_err(persist_err)?;
        fs::rename(&tmp_path, &self.offset_path).map_err(persist_err)?;

        debug!(path = %self.offset_path.display(), files = self.cursors.len(), "Persisted log cursors");
        Ok(())
    }
}

fn load_cursors(path: &Path) -> std::io::Result<BTreeMap<PathBuf, LogCursor>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let bytes = fs::read(path)?;
    let state: CursorFile = serde_json::from_slice(&bytes)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(state.files)
}

/// Expand the watched pattern into existing files, sorted
fn resolve_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(pattern);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !file_name.contains(&['*', '?'][..]) {
        return if path.is_file() {
            Ok(vec![path.to_path_buf()])
        } else {
            Err(CollectorError::LogSourceUnavailable(pattern.to_string()))
        };
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let matcher = wildcard_regex(&file_name);

    let entries = fs::read_dir(dir)
        .map_err(|_| CollectorError::LogSourceUnavailable(pattern.to_string()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.file_name()
                .map(|n| matcher.is_match(&n.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(CollectorError::LogSourceUnavailable(pattern.to_string()));
    }
    Ok(files)
}

/// Translate a file name wildcard into an anchored regex
fn wildcard_regex(pattern: &str) -> Regex {
    let mut expr = String::from("^");
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                expr.push_str(&regex::escape(&literal));
                literal.clear();
                expr.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    expr.push_str(&regex::escape(&literal));
    expr.push('$');

    // Only escaped literals and `.`/`.*` are emitted
    Regex::new(&expr).expect("escaped wildcard is a valid regex")
}

/// Read bytes appended to `path` since `previous`, up to the last newline
fn read_appended(path: &Path, previous: Option<LogCursor>) -> Result<(Vec<String>, LogCursor)> {
    let io_err = |source| CollectorError::LogIo {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(io_err)?;
    let metadata = file.metadata().map_err(io_err)?;
    let inode = file_identity(&metadata);
    let len = metadata.len();

    let start = match previous {
        Some(cursor) if cursor.inode == inode && cursor.offset <= len => cursor.offset,
        Some(cursor) => {
            info!(
                event = "log_rotated",
                path = %path.display(),
                previous_offset = cursor.offset,
                size = len,
                "Log file rotated, reading from start"
            );
            0
        }
        None => 0,
    };

    file.seek(SeekFrom::Start(start)).map_err(io_err)?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(io_err)?;

    let complete = buf
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);

    let lines = String::from_utf8_lossy(&buf[..complete])
        .lines()
        .map(str::to_owned)
        .collect();

    Ok((
        lines,
        LogCursor {
            inode,
            offset: start + complete as u64,
        },
    ))
}

#[cfg(unix)]
fn file_identity(metadata: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino()
}

#[cfg(not(unix))]
fn file_identity(_metadata: &fs::Metadata) -> u64 {
    0
}
