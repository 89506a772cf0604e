//! Tests for a full collection pass
//!
//! A scripted runner stands in for the OTRS console and a manual clock drives
//! the database cache, so every scrape is deterministic.

use super::*;
use crate::cache::ManualClock;
use crate::console::DiagnosticRunner;
use crate::health::ComponentStatus;
use crate::models::{MetricValue, TrafficLight};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

const MAIL_QUEUE: &str = "Mail queue is empty.\n";

const CONFIG: &str = "All settings are valid.\n";

const DATABASE: &str = r#"Trying to connect to database...
Connection successful.
Table count: 120 (OK)
Database size: 512 MB (OK)
Database version: MySQL 5.7.44 (Info)
Invalid tables: 2 (Failed)
"#;

const DAEMON_SUMMARY: &str = r#"
 Recurrent cron tasks:
 +-----------------------------+---------------------+---------+
 | Name                        | Last Execution      | Status  |
 +-----------------------------+---------------------+---------+
 | ArticleSearchIndexRebuild   | 2024-03-01 12:00:00 | Success |
 | EscalationCheck             | 2024-03-01 12:01:00 | Fail    |
 | CoreCacheCleanup            | 2024-03-01 12:02:00 | Success |
 | MailAccountFetch            | 2024-03-01 12:03:00 | Success |
 +-----------------------------+---------------------+---------+
"#;

const SEARCH_CHECK: &str = r#"Trying to connect to cluster...
Connection successful.

  +--------+-------------------+
  | Cluster                    |
  +--------+-------------------+
  | Name   | otrs-search       |
  | Status | Yellow            |
  +--------+-------------------+

  +--------+-------------------+
  | Node   | node1             |
  | Status | On-line           |
  | Node   | node2             |
  | Status | Off-line          |
  +--------+-------------------+
"#;

const INDEX_STATUS: &str = r#"
  +---------------+-----------+---------+
  | Index         | Available | Indexed |
  +---------------+-----------+---------+
  | Ticket        | 1200      | 1100    |
  | CustomerUser  | 40        | 40      |
  +---------------+-----------+---------+
"#;

/// Console stand-in returning canned output and counting invocations
#[derive(Default)]
struct ScriptedRunner {
    outputs: HashMap<&'static str, &'static str>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedRunner {
    fn healthy() -> Self {
        let mut outputs = HashMap::new();
        outputs.insert(commands::MAIL_QUEUE.name, MAIL_QUEUE);
        outputs.insert(commands::CONFIG_LIST_INVALID.name, CONFIG);
        outputs.insert(commands::DATABASE_CHECK.name, DATABASE);
        outputs.insert(commands::DAEMON_SUMMARY.name, DAEMON_SUMMARY);
        outputs.insert(commands::SEARCH_CHECK.name, SEARCH_CHECK);
        outputs.insert(commands::SEARCH_INDEX_STATUS.name, INDEX_STATUS);
        Self {
            outputs,
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn calls(&self, command: &DiagnosticCommand) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(command.name)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl DiagnosticRunner for ScriptedRunner {
    async fn run(&self, command: &DiagnosticCommand) -> String {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(command.name.to_string())
            .or_default() += 1;
        self.outputs
            .get(command.name)
            .map(|text| text.to_string())
            .unwrap_or_default()
    }
}

fn log_reader(dir: &TempDir) -> LogTailReader {
    LogTailReader::new(
        dir.path().join("Daemon").join("*.log").display().to_string(),
        dir.path().join("offset.json"),
    )
}

fn append_log(path: &Path, text: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

fn numeric(batch: &MetricBatch, name: &str) -> f64 {
    match batch.get(name).map(|s| &s.value) {
        Some(MetricValue::Numeric(value)) => *value,
        other => panic!("{name} is not numeric: {other:?}"),
    }
}

fn labels(batch: &MetricBatch, name: &str) -> BTreeMap<String, String> {
    match batch.get(name).map(|s| &s.value) {
        Some(MetricValue::Info(labels)) => labels.clone(),
        other => panic!("{name} is not info: {other:?}"),
    }
}

fn state(batch: &MetricBatch, name: &str) -> TrafficLight {
    match batch.get(name).map(|s| &s.value) {
        Some(MetricValue::State(state)) => *state,
        other => panic!("{name} is not a state: {other:?}"),
    }
}

#[tokio::test]
async fn test_healthy_installation() {
    let dir = TempDir::new().unwrap();
    append_log(&dir.path().join("Daemon/main.log"), "daemon started\n");
    let runner = Arc::new(ScriptedRunner::healthy());
    let mut collector = OtrsCollector::new(runner.clone(), log_reader(&dir));

    let batch = collector.collect().await;

    assert_eq!(numeric(&batch, names::MAIL_ERROR), 0.0);
    assert_eq!(numeric(&batch, names::MAIL_QUEUE_EMPTY), 1.0);
    assert_eq!(numeric(&batch, names::CONFIG_VALID), 1.0);
    assert_eq!(numeric(&batch, names::DB_STATUS_OK), 1.0);
    assert_eq!(numeric(&batch, names::DAEMON_SUMMARY), 0.75);
    assert_eq!(numeric(&batch, names::ELASTIC_STATUS_OK), 1.0);

    let crons = labels(&batch, names::CRON_JOBS);
    assert_eq!(crons.len(), 1);
    assert_eq!(crons["EscalationCheck"], "failed");

    assert_eq!(
        state(&batch, names::ELASTIC_CLUSTER_STATUS),
        TrafficLight::Yellow
    );
    assert_eq!(state(&batch, names::ELASTIC_NODE_STATUS), TrafficLight::Yellow);
    let nodes = labels(&batch, names::ELASTIC_FAILED_NODES);
    assert_eq!(nodes["node1"], "On-line");
    assert_eq!(nodes["node2"], "Off-line");
}

#[tokio::test]
async fn test_database_statistics_exported_by_kind() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::healthy());
    let mut collector = OtrsCollector::new(runner, log_reader(&dir));

    let batch = collector.collect().await;

    // Numeric values tagged OK report health, not their magnitude
    assert_eq!(
        numeric(&batch, "otrs_daemon_additional_db_stats_table_count"),
        1.0
    );
    assert_eq!(
        numeric(&batch, "otrs_daemon_additional_db_stats_database_size"),
        1.0
    );

    let version = labels(&batch, "otrs_daemon_additional_db_stats_database_version");
    assert_eq!(version["value"], "MySQL 5.7.44");
    assert_eq!(version["status"], "Info");

    let invalid = labels(&batch, "otrs_daemon_additional_db_stats_invalid_tables");
    assert_eq!(invalid["status"], "Failed");
    assert!(!invalid.contains_key("value"));
}

#[tokio::test]
async fn test_index_states_and_percentages() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::healthy());
    let mut collector = OtrsCollector::new(runner, log_reader(&dir));

    let batch = collector.collect().await;

    let ticket = labels(&batch, "otrs_elastic_index_states_ticket");
    assert_eq!(ticket["available"], "1200");
    assert_eq!(ticket["indexed"], "1100");

    let percentage = numeric(&batch, "otrs_elastic_index_ticket_percentage");
    assert!((percentage - 91.666_666).abs() < 1e-3);
    assert_eq!(
        numeric(&batch, "otrs_elastic_index_customer_user_percentage"),
        100.0
    );
}

#[tokio::test]
async fn test_samples_emitted_in_stable_order() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::healthy());
    let mut collector = OtrsCollector::new(runner, log_reader(&dir));

    let batch = collector.collect().await;
    let order: Vec<&str> = batch.iter().map(|s| s.name.as_str()).collect();

    assert_eq!(order[0], names::MAIL_ERROR);
    assert_eq!(order[1], names::MAIL_QUEUE_EMPTY);
    assert_eq!(order[2], names::CRON_JOBS);
    assert_eq!(order[3], names::CONFIG_VALID);
    assert_eq!(order[4], names::DB_STATUS_OK);
    assert_eq!(order[9], names::DAEMON_SUMMARY);
    assert_eq!(order[10], names::ELASTIC_STATUS_OK);
    assert_eq!(order[11], names::ELASTIC_CLUSTER_STATUS);
    assert_eq!(order[12], names::ELASTIC_FAILED_NODES);
    assert_eq!(order[13], names::ELASTIC_NODE_STATUS);
    assert_eq!(order[14], "otrs_elastic_index_states_ticket");
    assert_eq!(order.len(), 18);
}

#[tokio::test]
async fn test_failing_console_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::default());
    let health = HealthRegistry::new();
    let mut collector =
        OtrsCollector::new(runner, log_reader(&dir)).with_health(health.clone());

    let batch = collector.collect().await;

    assert_eq!(numeric(&batch, names::MAIL_QUEUE_EMPTY), 0.0);
    assert_eq!(numeric(&batch, names::CONFIG_VALID), 0.0);
    assert_eq!(numeric(&batch, names::DB_STATUS_OK), 0.0);
    assert_eq!(numeric(&batch, names::DAEMON_SUMMARY), 0.0);
    assert_eq!(numeric(&batch, names::ELASTIC_STATUS_OK), 0.0);
    assert!(labels(&batch, names::CRON_JOBS).is_empty());
    assert!(labels(&batch, names::ELASTIC_FAILED_NODES).is_empty());
    assert_eq!(state(&batch, names::ELASTIC_CLUSTER_STATUS), TrafficLight::Red);
    assert_eq!(state(&batch, names::ELASTIC_NODE_STATUS), TrafficLight::Red);
    assert!(batch
        .iter()
        .all(|s| !s.name.starts_with(names::DB_STATS_PREFIX)));

    let report = health.health().await;
    assert_eq!(
        report.components[components::CONSOLE].status,
        ComponentStatus::Unhealthy
    );
}

#[tokio::test]
async fn test_each_command_runs_once_per_scrape() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::healthy());
    let mut collector = OtrsCollector::new(runner.clone(), log_reader(&dir));

    collector.collect().await;

    for command in [
        commands::MAIL_QUEUE,
        commands::DAEMON_SUMMARY,
        commands::CONFIG_LIST_INVALID,
        commands::DATABASE_CHECK,
        commands::SEARCH_CHECK,
        commands::SEARCH_INDEX_STATUS,
    ] {
        assert_eq!(runner.calls(&command), 1, "{command}");
    }
}

#[tokio::test]
async fn test_database_check_reused_within_window() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::healthy());
    let clock = Arc::new(ManualClock::new());
    let mut collector =
        OtrsCollector::new(runner.clone(), log_reader(&dir)).with_clock(clock.clone());

    let first = collector.collect().await;
    assert_eq!(runner.calls(&commands::DATABASE_CHECK), 1);

    clock.advance(Duration::from_secs(899));
    let second = collector.collect().await;
    assert_eq!(runner.calls(&commands::DATABASE_CHECK), 1);
    assert_eq!(runner.calls(&commands::CONFIG_LIST_INVALID), 2);
    assert_eq!(
        numeric(&second, names::DB_STATUS_OK),
        numeric(&first, names::DB_STATUS_OK)
    );
    assert_eq!(
        numeric(&second, "otrs_daemon_additional_db_stats_table_count"),
        1.0
    );

    clock.advance(Duration::from_secs(2));
    collector.collect().await;
    assert_eq!(runner.calls(&commands::DATABASE_CHECK), 2);
}

#[tokio::test]
async fn test_custom_cache_window() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::healthy());
    let clock = Arc::new(ManualClock::new());
    let mut collector = OtrsCollector::new(runner.clone(), log_reader(&dir))
        .with_clock(clock.clone())
        .with_cache_window(Duration::from_secs(60));

    collector.collect().await;
    clock.advance(Duration::from_secs(61));
    collector.collect().await;

    assert_eq!(runner.calls(&commands::DATABASE_CHECK), 2);
}

#[tokio::test]
async fn test_mail_errors_accumulate_across_scrapes() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("Daemon/mail.log");
    append_log(&log, "PostMaster: Got no email\nunrelated line\n");

    let runner = Arc::new(ScriptedRunner::healthy());
    let mut collector = OtrsCollector::new(runner, log_reader(&dir));

    let batch = collector.collect().await;
    assert_eq!(numeric(&batch, names::MAIL_ERROR), 1.0);

    append_log(
        &log,
        "S/MIME signature invalid\nCould not re-process email 42\n",
    );
    let batch = collector.collect().await;
    assert_eq!(numeric(&batch, names::MAIL_ERROR), 3.0);

    // Nothing new: the running total stays put
    let batch = collector.collect().await;
    assert_eq!(numeric(&batch, names::MAIL_ERROR), 3.0);
    assert_eq!(collector.mail_errors(), 3);
}

#[tokio::test]
async fn test_missing_log_keeps_count_and_degrades_health() {
    let dir = TempDir::new().unwrap();
    let runner = Arc::new(ScriptedRunner::healthy());
    let health = HealthRegistry::new();
    let mut collector =
        OtrsCollector::new(runner, log_reader(&dir)).with_health(health.clone());

    let batch = collector.collect().await;

    assert_eq!(numeric(&batch, names::MAIL_ERROR), 0.0);
    let report = health.health().await;
    assert_eq!(
        report.components[components::LOG_TAIL].status,
        ComponentStatus::Degraded
    );
    assert_eq!(
        report.components[components::CONSOLE].status,
        ComponentStatus::Healthy
    );
}

#[test]
fn test_database_report_from_output() {
    let report = DatabaseReport::from_output(DATABASE);
    assert!(report.connected);
    assert_eq!(report.stats.len(), 4);

    let empty = DatabaseReport::from_output("");
    assert!(!empty.connected);
    assert!(empty.stats.is_empty());
}
