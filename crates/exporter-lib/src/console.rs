//! OTRS console invocation
//!
//! Runs one diagnostic subcommand of `otrs.Console.pl` and captures its
//! standard output. Callers only ever see text: every failure (missing
//! binary, timeout, undecodable output) collapses to an empty string, which
//! all parsers treat as "no match".

use crate::error::{CollectorError, Result};
use crate::models::DiagnosticCommand;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default location of the OTRS console
pub const DEFAULT_CONSOLE_PATH: &str = "/opt/otrs/bin/otrs.Console.pl";

/// Default deadline for a single console command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for running diagnostic console commands
#[async_trait]
pub trait DiagnosticRunner: Send + Sync {
    /// Run `command` and return its standard output, or `""` on failure
    async fn run(&self, command: &DiagnosticCommand) -> String;
}

/// Runs commands through the real OTRS console binary
#[derive(Debug, Clone)]
pub struct ConsoleRunner {
    console_path: PathBuf,
    timeout: Duration,
}

impl Default for ConsoleRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CONSOLE_PATH, DEFAULT_COMMAND_TIMEOUT)
    }
}

impl ConsoleRunner {
    pub fn new(console_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            console_path: console_path.into(),
            timeout,
        }
    }

    pub fn console_path(&self) -> &std::path::Path {
        &self.console_path
    }

    /// Run `command`, reporting why it produced no usable output
    ///
    /// The exit status is not inspected: the console exits non-zero for
    /// failing checks while still printing the report we parse.
    pub async fn try_run(&self, command: &DiagnosticCommand) -> Result<String> {
        let mut cmd = Command::new(&self.console_path);
        cmd.arg(command.name)
            .args(command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|source| CollectorError::CommandSpawn {
                command: command.to_string(),
                source,
            })?,
            Err(_) => {
                return Err(CollectorError::CommandTimeout {
                    command: command.to_string(),
                    timeout: self.timeout,
                })
            }
        };

        if !output.status.success() {
            debug!(
                command = %command,
                status = ?output.status,
                "Console exited unsuccessfully, inspecting output anyway"
            );
        }

        String::from_utf8(output.stdout).map_err(|source| CollectorError::CommandDecode {
            command: command.to_string(),
            source,
        })
    }
}

#[async_trait]
impl DiagnosticRunner for ConsoleRunner {
    async fn run(&self, command: &DiagnosticCommand) -> String {
        match self.try_run(command).await {
            Ok(text) => text,
            Err(e) => {
                warn!(command = %command, error = %e, "Diagnostic command failed");
                String::new()
            }
        }
    }
}
