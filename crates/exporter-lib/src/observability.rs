//! Observability infrastructure for the exporter itself
//!
//! Provides:
//! - Prometheus self-metrics (scrape latency, console failures, cache hits, log volume)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for scrape latency (in seconds); console calls are slow
const SCRAPE_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ExporterMetricsInner> = OnceLock::new();

struct ExporterMetricsInner {
    scrape_duration_seconds: Histogram,
    command_failures: IntCounterVec,
    database_cache_hits: IntCounter,
    log_lines_read: IntCounter,
}

impl ExporterMetricsInner {
    fn new() -> Self {
        Self {
            scrape_duration_seconds: register_histogram!(
                "otrs_exporter_scrape_duration_seconds",
                "Time spent collecting all OTRS signals for one scrape",
                SCRAPE_BUCKETS.to_vec()
            )
            .expect("Failed to register scrape_duration_seconds"),

            command_failures: register_int_counter_vec!(
                "otrs_exporter_command_failures_total",
                "Console commands that produced no output",
                &["command"]
            )
            .expect("Failed to register command_failures_total"),

            database_cache_hits: register_int_counter!(
                "otrs_exporter_database_cache_hits_total",
                "Scrapes answered from the cached database check"
            )
            .expect("Failed to register database_cache_hits_total"),

            log_lines_read: register_int_counter!(
                "otrs_exporter_log_lines_read_total",
                "Daemon log lines consumed by the mail error tail"
            )
            .expect("Failed to register log_lines_read_total"),
        }
    }
}

/// Exporter self-metrics
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ExporterMetrics {
    _private: (),
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ExporterMetricsInner {
        GLOBAL_METRICS.get_or_init(ExporterMetricsInner::new)
    }

    pub fn observe_scrape_duration(&self, duration: Duration) {
        self.inner()
            .scrape_duration_seconds
            .observe(duration.as_secs_f64());
    }

    pub fn inc_command_failures(&self, command: &str) {
        self.inner()
            .command_failures
            .with_label_values(&[command])
            .inc();
    }

    pub fn command_failures(&self, command: &str) -> u64 {
        self.inner()
            .command_failures
            .with_label_values(&[command])
            .get()
    }

    pub fn inc_database_cache_hits(&self) {
        self.inner().database_cache_hits.inc();
    }

    pub fn add_log_lines_read(&self, lines: usize) {
        self.inner().log_lines_read.inc_by(lines as u64);
    }
}

/// Structured logger for exporter lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log exporter startup
    pub fn log_startup(&self, version: &str, console: &str, log_pattern: &str) {
        info!(
            event = "exporter_started",
            instance = %self.instance,
            exporter_version = %version,
            console = %console,
            log_pattern = %log_pattern,
            "OTRS exporter started"
        );
    }

    /// Log exporter shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "exporter_shutdown",
            instance = %self.instance,
            reason = %reason,
            "OTRS exporter shutting down"
        );
    }

    /// Log a completed scrape
    pub fn log_scrape(&self, samples: usize, failed_commands: usize, elapsed: Duration) {
        if failed_commands > 0 {
            warn!(
                event = "scrape_completed",
                instance = %self.instance,
                samples = samples,
                failed_commands = failed_commands,
                elapsed_ms = elapsed.as_millis() as u64,
                "Scrape completed with console failures"
            );
        } else {
            info!(
                event = "scrape_completed",
                instance = %self.instance,
                samples = samples,
                elapsed_ms = elapsed.as_millis() as u64,
                "Scrape completed"
            );
        }
    }

    /// Warn when the database password is missing
    pub fn log_database_settings(&self, user: &str, host: &str, name: &str, has_password: bool) {
        if has_password {
            info!(
                event = "database_settings",
                instance = %self.instance,
                db_user = %user,
                db_host = %host,
                db_name = %name,
                "Database settings loaded"
            );
        } else {
            warn!(
                event = "database_settings",
                instance = %self.instance,
                db_user = %user,
                db_host = %host,
                db_name = %name,
                "No database password provided in OTRS_EXP_DB_PW"
            );
        }
    }
}
