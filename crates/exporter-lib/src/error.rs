//! Error types for the collection pipeline
//!
//! None of these errors escape a scrape. The console runner and the log tail
//! reader surface them to their callers, which degrade them into empty text,
//! empty line batches, or default metric values.

use std::path::PathBuf;
use std::string::FromUtf8Error;
use std::time::Duration;
use thiserror::Error;

/// Failures encountered while gathering OTRS facts
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The console binary could not be started
    #[error("failed to run console command {command}: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The console command did not finish within its deadline
    #[error("console command {command} timed out after {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    /// The console wrote something that is not UTF-8
    #[error("console command {command} produced invalid UTF-8: {source}")]
    CommandDecode {
        command: String,
        #[source]
        source: FromUtf8Error,
    },

    /// No file matched the watched log path or pattern
    #[error("log source {0} is unavailable")]
    LogSourceUnavailable(String),

    /// Reading a watched log file failed
    #[error("failed to read log file {}: {source}", path.display())]
    LogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tail cursor could not be written to disk
    #[error("failed to persist log cursor to {}: {source}", path.display())]
    CursorPersist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rendering the metric batch failed
    #[error("metric exposition failed: {0}")]
    Exposition(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, CollectorError>;
