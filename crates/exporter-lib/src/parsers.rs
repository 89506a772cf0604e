//! Parsers for OTRS console output
//!
//! Every function here is pure: it takes the captured text of one console
//! command and extracts a typed fact. Empty or unrecognized text always yields
//! the negative/default result, never an error. Table output is matched line by
//! line against `|`-delimited cell patterns.

use crate::models::{IndexState, NodeState, StatLine, TrafficLight};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

const CONFIG_VALID_MARKER: &str = "All settings are valid.";
const CONNECTION_OK_MARKER: &str = "Connection successful.";
const MAIL_QUEUE_EMPTY_MARKER: &str = "Mail queue is empty.";
const NODE_ONLINE: &str = "On-line";

/// Daemon log substrings that indicate a mail processing problem
pub const MAIL_ERROR_MARKERS: [&str; 4] = [
    "Got no email",
    "S/MIME",
    "Could not re-process email",
    "PostMaster",
];

static STAT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(\w[\w ]+): (.*)$").expect("valid stat line regex"));

static FAILED_CRON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*\|\s*([A-Za-z0-9]+)\s*\|\s*[\s\d:\-]*\|\s*Fail")
        .expect("valid cron table regex")
});

static CLUSTER_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s+\|\s+Status\s+\|\s+(\w+)\s+\|\s*$").expect("valid cluster status regex")
});

static NODE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s+\|\s+Node\s+\|\s+(\w+)\s+\|\s*$").expect("valid node name regex")
});

static NODE_STATUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s+\|\s+Status\s+\|\s+(\w+\W\w+)\s+\|\s*$").expect("valid node status regex")
});

static INDEX_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s+\|\s+(\w+)\s+\|\s+(\d+)\s+\|\s+(\d+)\s+\|.*$").expect("valid index row regex")
});

/// `Admin::Config::ListInvalid`: true only when every setting is valid
pub fn config_valid(text: &str) -> bool {
    text.contains(CONFIG_VALID_MARKER)
}

/// `Maint::Database::Check` and `Maint::DocumentSearch::Check` connectivity
pub fn connection_ok(text: &str) -> bool {
    text.contains(CONNECTION_OK_MARKER)
}

/// `Maint::Email::MailQueue --list`: true when nothing is waiting to be sent
pub fn mail_queue_empty(text: &str) -> bool {
    text.contains(MAIL_QUEUE_EMPTY_MARKER)
}

/// Extract every `<label>: <value>` line of the database check
///
/// Labels are lower-cased with spaces turned into underscores. Values lose
/// their surrounding spaces and parentheses, and an inner `" ("` becomes
/// `" - "` so the trailing status reads as a separate token.
pub fn database_stats(text: &str) -> Vec<StatLine> {
    STAT_LINE
        .captures_iter(text)
        .map(|caps| {
            let name = caps[1].to_lowercase().replace(' ', "_");
            let value = caps[2]
                .trim_end_matches('\r')
                .trim_matches(' ')
                .trim_matches('(')
                .trim_matches(')')
                .replace(" (", " - ");
            StatLine { name, value }
        })
        .collect()
}

/// Share of successful daemon task runs in `Maint::Daemon::Summary`
///
/// Counts raw `Success` and `Fail` substrings. With nothing counted the rate
/// is 0.
pub fn daemon_success_rate(text: &str) -> f64 {
    let success = text.matches("Success").count();
    let total = success + text.matches("Fail").count();
    if total == 0 {
        return 0.0;
    }
    success as f64 / total as f64
}

/// Cron tasks whose last run failed, mapped to `"failed"`
pub fn failed_cron_jobs(text: &str) -> BTreeMap<String, String> {
    FAILED_CRON
        .captures_iter(text)
        .map(|caps| (caps[1].to_string(), "failed".to_string()))
        .collect()
}

/// Cluster health from the `Status` cell of `Maint::DocumentSearch::Check`
///
/// The last matching cell wins. A missing or unknown value is Red.
pub fn cluster_status(text: &str) -> TrafficLight {
    CLUSTER_STATUS
        .captures_iter(text)
        .last()
        .map(|caps| TrafficLight::from_status(&caps[1]))
        .unwrap_or(TrafficLight::Red)
}

/// Every node status cell (`On-line`, `Off-line`, ...) in file order
pub fn node_statuses(text: &str) -> Vec<String> {
    NODE_STATUS
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Pair node names with node statuses by position
///
/// The n-th `Node` cell goes with the n-th node `Status` cell. Unpaired
/// trailing entries of the longer list are dropped.
pub fn node_states(text: &str) -> Vec<NodeState> {
    NODE_NAME
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .zip(node_statuses(text))
        .map(|(node, status)| NodeState { node, status })
        .collect()
}

/// Roll node statuses up into one traffic light
///
/// Red when no node is `On-line`, Yellow when statuses disagree, else Green.
pub fn overall_node_status<S: AsRef<str>>(statuses: &[S]) -> TrafficLight {
    let unique: BTreeSet<&str> = statuses.iter().map(|s| s.as_ref()).collect();

    if !unique.contains(NODE_ONLINE) {
        TrafficLight::Red
    } else if unique.len() > 1 {
        TrafficLight::Yellow
    } else {
        TrafficLight::Green
    }
}

/// Rows of the `--index-status all` table with snake-cased index names
pub fn index_states(text: &str) -> Vec<IndexState> {
    INDEX_ROW
        .captures_iter(text)
        .filter_map(|caps| {
            Some(IndexState {
                name: camel_to_snake(&caps[1]),
                available: caps[2].parse().ok()?,
                indexed: caps[3].parse().ok()?,
            })
        })
        .collect()
}

/// `CustomerUser` becomes `customer_user`
pub fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if i > 0 && c.is_uppercase() {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Number of log lines mentioning a mail processing problem
pub fn count_mail_errors<S: AsRef<str>>(lines: &[S]) -> usize {
    lines
        .iter()
        .filter(|line| {
            let line = line.as_ref();
            MAIL_ERROR_MARKERS.iter().any(|marker| line.contains(marker))
        })
        .count()
}
