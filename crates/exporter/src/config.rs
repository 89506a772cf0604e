//! Exporter configuration

use anyhow::Result;
use exporter_lib::{cache, console, logtail};
use serde::Deserialize;
use std::time::Duration;

/// Prefix of every environment variable the exporter reads
pub const ENV_PREFIX: &str = "OTRS_EXP";

/// Exporter configuration, read from `OTRS_EXP_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// Address to bind the metrics server to
    #[serde(default = "default_ip")]
    pub ip: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Log at debug level unless `RUST_LOG` says otherwise
    #[serde(default)]
    pub debug: bool,

    /// Daemon log file, or a wildcard in the file name
    #[serde(default = "default_log_path")]
    pub log_path: String,

    /// Where the log tail cursors are persisted
    #[serde(default = "default_offset_path")]
    pub offset_path: String,

    #[serde(default = "default_console_path")]
    pub console_path: String,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// How long a database check result is reused
    #[serde(default = "default_cache_window")]
    pub cache_window_secs: u64,

    #[serde(default = "default_db_user")]
    pub db_user: String,

    #[serde(default)]
    pub db_pw: Option<String>,

    #[serde(default = "default_db_name")]
    pub db_name: String,

    #[serde(default = "default_db_host")]
    pub db_host: String,
}

fn default_ip() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9875
}

fn default_log_path() -> String {
    logtail::DEFAULT_LOG_PATH.to_string()
}

fn default_offset_path() -> String {
    logtail::DEFAULT_OFFSET_PATH.to_string()
}

fn default_console_path() -> String {
    console::DEFAULT_CONSOLE_PATH.to_string()
}

fn default_command_timeout() -> u64 {
    console::DEFAULT_COMMAND_TIMEOUT.as_secs()
}

fn default_cache_window() -> u64 {
    cache::DEFAULT_CACHE_WINDOW.as_secs()
}

fn default_db_user() -> String {
    "otrs".to_string()
}

fn default_db_name() -> String {
    "otrs".to_string()
}

fn default_db_host() -> String {
    "127.0.0.1".to_string()
}

impl ExporterConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment.try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(self.cache_window_secs)
    }
}
