//! Metric collection from an OTRS installation
//!
//! [`OtrsCollector`] runs one full pass per scrape: it polls the daemon log
//! tail, runs each console check once, parses the output, and maps every fact
//! onto the stable `otrs_*` metric schema. The expensive database check is
//! served from a 15-minute cache. A failing command never aborts the pass;
//! its signals fall back to the parser's default.

#[cfg(test)]
mod tests;

use crate::cache::{Clock, SystemClock, TimedCache, DEFAULT_CACHE_WINDOW};
use crate::console::DiagnosticRunner;
use crate::health::{components, ComponentHealth, HealthRegistry};
use crate::logtail::LogTailReader;
use crate::models::{
    commands, sanitize_name, DiagnosticCommand, MetricBatch, MetricSample, StatKind, Statistic,
};
use crate::observability::{ExporterMetrics, StructuredLogger};
use crate::{parsers, stats};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Exported metric names
pub mod names {
    pub const MAIL_ERROR: &str = "otrs_mail_error";
    pub const MAIL_QUEUE_EMPTY: &str = "otrs_mail_queue_empty";
    pub const CRON_JOBS: &str = "otrs_daemon_cron_jobs";
    pub const CONFIG_VALID: &str = "otrs_config_valid";
    pub const DB_STATUS_OK: &str = "otrs_db_status_ok";
    pub const DB_STATS_PREFIX: &str = "otrs_daemon_additional_db_stats";
    pub const DAEMON_SUMMARY: &str = "otrs_daemon_summary";
    pub const ELASTIC_STATUS_OK: &str = "otrs_elastic_status_ok";
    pub const ELASTIC_CLUSTER_STATUS: &str = "otrs_elastic_cluster_status";
    pub const ELASTIC_FAILED_NODES: &str = "otrs_elastic_failed_nodes";
    pub const ELASTIC_NODE_STATUS: &str = "otrs_elastic_node_status";
    pub const ELASTIC_INDEX_STATES_PREFIX: &str = "otrs_elastic_index_states";
    pub const ELASTIC_INDEX_PREFIX: &str = "otrs_elastic_index";
}

/// Parsed result of `Maint::Database::Check`, cached as one unit
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseReport {
    pub connected: bool,
    pub stats: Vec<Statistic>,
}

impl DatabaseReport {
    pub fn from_output(text: &str) -> Self {
        Self {
            connected: parsers::connection_ok(text),
            stats: stats::normalize(&parsers::database_stats(text)),
        }
    }
}

/// Console calls made during one scrape
#[derive(Debug, Default)]
struct CommandTally {
    total: usize,
    failed: usize,
}

/// Builds the OTRS metric batch on every scrape
pub struct OtrsCollector {
    runner: Arc<dyn DiagnosticRunner>,
    log: LogTailReader,
    clock: Arc<dyn Clock>,
    database: TimedCache<DatabaseReport>,
    mail_errors: u64,
    health: Option<HealthRegistry>,
    metrics: ExporterMetrics,
    logger: StructuredLogger,
}

impl OtrsCollector {
    pub fn new(runner: Arc<dyn DiagnosticRunner>, log: LogTailReader) -> Self {
        Self {
            runner,
            log,
            clock: Arc::new(SystemClock),
            database: TimedCache::new(DEFAULT_CACHE_WINDOW),
            mail_errors: 0,
            health: None,
            metrics: ExporterMetrics::new(),
            logger: StructuredLogger::new("otrs-exporter"),
        }
    }

    /// Use a different time source for cache decisions
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Reuse the database check result for `window`
    pub fn with_cache_window(mut self, window: Duration) -> Self {
        self.database = TimedCache::new(window);
        self
    }

    /// Report console and log tail health after every scrape
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Running total of mail errors seen in the daemon log
    pub fn mail_errors(&self) -> u64 {
        self.mail_errors
    }

    /// Run one full collection pass
    pub async fn collect(&mut self) -> MetricBatch {
        let started = Instant::now();
        let mut tally = CommandTally::default();
        let mut samples = Vec::with_capacity(24);

        let mail_errors = self.poll_mail_errors().await;
        samples.push(MetricSample::numeric(
            names::MAIL_ERROR,
            "Mail processing problems found in the OTRS daemon logs",
            mail_errors as f64,
        ));

        let queue = self.run(&commands::MAIL_QUEUE, &mut tally).await;
        samples.push(MetricSample::flag(
            names::MAIL_QUEUE_EMPTY,
            "Is the OTRS mail queue empty",
            parsers::mail_queue_empty(&queue),
        ));

        let summary = self.run(&commands::DAEMON_SUMMARY, &mut tally).await;
        samples.push(MetricSample::info(
            names::CRON_JOBS,
            "Failing OTRS daemon cron jobs",
            sanitize_labels(parsers::failed_cron_jobs(&summary)),
        ));

        let config = self.run(&commands::CONFIG_LIST_INVALID, &mut tally).await;
        samples.push(MetricSample::flag(
            names::CONFIG_VALID,
            "Is the OTRS config valid",
            parsers::config_valid(&config),
        ));

        let database = self.database_report(&mut tally).await;
        samples.push(MetricSample::flag(
            names::DB_STATUS_OK,
            "Can OTRS connect to its database",
            database.connected,
        ));
        samples.extend(database.stats.iter().map(stat_sample));

        samples.push(MetricSample::numeric(
            names::DAEMON_SUMMARY,
            "Share of successful OTRS daemon task runs",
            parsers::daemon_success_rate(&summary),
        ));

        let search = self.run(&commands::SEARCH_CHECK, &mut tally).await;
        samples.push(MetricSample::flag(
            names::ELASTIC_STATUS_OK,
            "Can OTRS connect to its search cluster",
            parsers::connection_ok(&search),
        ));
        samples.push(MetricSample::state(
            names::ELASTIC_CLUSTER_STATUS,
            "Search cluster health",
            parsers::cluster_status(&search),
        ));
        let nodes = parsers::node_states(&search)
            .into_iter()
            .map(|n| (n.node, n.status))
            .collect();
        samples.push(MetricSample::info(
            names::ELASTIC_FAILED_NODES,
            "Status of every search cluster node",
            sanitize_labels(nodes),
        ));
        samples.push(MetricSample::state(
            names::ELASTIC_NODE_STATUS,
            "Overall search node health",
            parsers::overall_node_status(&parsers::node_statuses(&search)),
        ));

        let indices = self.run(&commands::SEARCH_INDEX_STATUS, &mut tally).await;
        for index in parsers::index_states(&indices) {
            let name = sanitize_name(&index.name);
            let mut labels = BTreeMap::new();
            labels.insert("available".to_string(), index.available.to_string());
            labels.insert("indexed".to_string(), index.indexed.to_string());

            samples.push(MetricSample::info(
                format!("{}_{}", names::ELASTIC_INDEX_STATES_PREFIX, name),
                format!("Indexing state of the {} search index", index.name),
                labels,
            ));
            samples.push(MetricSample::numeric(
                format!("{}_{}_percentage", names::ELASTIC_INDEX_PREFIX, name),
                format!("Percentage of {} objects indexed", index.name),
                index.indexed_percentage(),
            ));
        }

        if let Some(health) = &self.health {
            health
                .update(
                    components::CONSOLE,
                    ComponentHealth::from_command_failures(tally.failed, tally.total),
                )
                .await;
        }

        let elapsed = started.elapsed();
        self.metrics.observe_scrape_duration(elapsed);
        self.logger.log_scrape(samples.len(), tally.failed, elapsed);

        MetricBatch::new(samples)
    }

    async fn run(&self, command: &DiagnosticCommand, tally: &mut CommandTally) -> String {
        let text = self.runner.run(command).await;
        tally.total += 1;
        if text.is_empty() {
            tally.failed += 1;
            self.metrics.inc_command_failures(command.name);
            debug!(command = %command, "Console returned no output, using defaults");
        }
        text
    }

    async fn database_report(&mut self, tally: &mut CommandTally) -> DatabaseReport {
        let now = self.clock.now();
        if let Some(report) = self.database.get(now) {
            self.metrics.inc_database_cache_hits();
            return report.clone();
        }

        let text = self.run(&commands::DATABASE_CHECK, tally).await;
        let report = DatabaseReport::from_output(&text);
        self.database.store(now, report.clone());
        report
    }

    /// Add new mail errors from the log tail to the running total
    async fn poll_mail_errors(&mut self) -> u64 {
        match self.log.try_poll() {
            Ok(lines) => {
                self.metrics.add_log_lines_read(lines.len());
                self.mail_errors += parsers::count_mail_errors(&lines) as u64;
                if let Some(health) = &self.health {
                    health.set_healthy(components::LOG_TAIL).await;
                }
            }
            Err(e) => {
                warn!(pattern = %self.log.pattern(), error = %e, "Daemon log unavailable, mail error count unchanged");
                if let Some(health) = &self.health {
                    health
                        .set_degraded(components::LOG_TAIL, e.to_string())
                        .await;
                }
            }
        }
        self.mail_errors
    }
}

/// One database statistic as a gauge, a healthy flag or an info sample
fn stat_sample(stat: &Statistic) -> MetricSample {
    let name = format!("{}_{}", names::DB_STATS_PREFIX, sanitize_name(&stat.name));
    let help = format!("OTRS database check: {}", stat.name);

    match &stat.kind {
        StatKind::Numeric(value) => MetricSample::numeric(name, help, *value),
        StatKind::Healthy => MetricSample::flag(name, help, true),
        StatKind::Info(value) => {
            let mut labels = BTreeMap::new();
            labels.insert("value".to_string(), value.clone());
            labels.insert("status".to_string(), stat.tag.clone());
            MetricSample::info(name, help, labels)
        }
        StatKind::Failed => {
            let mut labels = BTreeMap::new();
            labels.insert("status".to_string(), stat.tag.clone());
            MetricSample::info(name, help, labels)
        }
    }
}

/// Turn console-derived keys into valid label names
fn sanitize_labels(raw: BTreeMap<String, String>) -> BTreeMap<String, String> {
    raw.into_iter()
        .map(|(key, value)| (sanitize_name(&key), value))
        .collect()
}
