//! Core data models for the OTRS exporter

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One read-only subcommand of the OTRS console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagnosticCommand {
    /// Console subcommand, e.g. `Maint::Database::Check`
    pub name: &'static str,
    /// Fixed arguments passed after the subcommand
    pub args: &'static [&'static str],
}

impl DiagnosticCommand {
    pub const fn new(name: &'static str) -> Self {
        Self { name, args: &[] }
    }

    pub const fn with_args(name: &'static str, args: &'static [&'static str]) -> Self {
        Self { name, args }
    }
}

impl fmt::Display for DiagnosticCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)?;
        for arg in self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Console commands polled on every scrape
pub mod commands {
    use super::DiagnosticCommand;

    pub const CONFIG_LIST_INVALID: DiagnosticCommand =
        DiagnosticCommand::new("Admin::Config::ListInvalid");
    pub const DAEMON_SUMMARY: DiagnosticCommand = DiagnosticCommand::new("Maint::Daemon::Summary");
    pub const DATABASE_CHECK: DiagnosticCommand = DiagnosticCommand::new("Maint::Database::Check");
    pub const SEARCH_CHECK: DiagnosticCommand =
        DiagnosticCommand::new("Maint::DocumentSearch::Check");
    pub const SEARCH_INDEX_STATUS: DiagnosticCommand = DiagnosticCommand::with_args(
        "Maint::DocumentSearch::IndexManagement",
        &["--index-status", "all"],
    );
    pub const MAIL_QUEUE: DiagnosticCommand =
        DiagnosticCommand::with_args("Maint::Email::MailQueue", &["--list"]);
}

/// A `<label>: <value>` line from the database check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatLine {
    pub name: String,
    pub value: String,
}

/// One search-cluster node and its reported status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    pub node: String,
    pub status: String,
}

/// One row of the search index status table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexState {
    pub name: String,
    pub available: u64,
    pub indexed: u64,
}

impl IndexState {
    /// Share of available objects already indexed, 0 when nothing is available
    pub fn indexed_percentage(&self) -> f64 {
        if self.available == 0 {
            return 0.0;
        }
        self.indexed as f64 / self.available as f64 * 100.0
    }
}

/// How a normalized database statistic is exported
#[derive(Debug, Clone, PartialEq)]
pub enum StatKind {
    /// A magnitude from an `Info` check, byte sizes already converted
    Numeric(f64),
    /// A numeric value the check tagged `OK`
    Healthy,
    /// Free-form text reported by a healthy check
    Info(String),
    /// The check reported something other than `OK` or `Info`
    Failed,
}

/// A normalized database statistic
#[derive(Debug, Clone, PartialEq)]
pub struct Statistic {
    pub name: String,
    /// Value text after unit conversion
    pub value: String,
    /// Trailing classification token, e.g. `OK`, `Info`, `Problem`
    pub tag: String,
    pub kind: StatKind,
}

/// Three-valued health state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLight {
    Red,
    Yellow,
    Green,
}

impl TrafficLight {
    pub const ALL: [TrafficLight; 3] = [TrafficLight::Red, TrafficLight::Yellow, TrafficLight::Green];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficLight::Red => "red",
            TrafficLight::Yellow => "yellow",
            TrafficLight::Green => "green",
        }
    }

    /// Parse a console status word; anything unrecognized is Red
    pub fn from_status(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "green" => TrafficLight::Green,
            "yellow" => TrafficLight::Yellow,
            _ => TrafficLight::Red,
        }
    }
}

/// The value carried by one exported sample
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Numeric(f64),
    Info(BTreeMap<String, String>),
    State(TrafficLight),
}

/// One metric handed to the exposition layer
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub help: String,
    pub value: MetricValue,
}

impl MetricSample {
    pub fn numeric(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            value: MetricValue::Numeric(value),
        }
    }

    pub fn flag(name: impl Into<String>, help: impl Into<String>, healthy: bool) -> Self {
        Self::numeric(name, help, if healthy { 1.0 } else { 0.0 })
    }

    pub fn info(
        name: impl Into<String>,
        help: impl Into<String>,
        labels: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            value: MetricValue::Info(labels),
        }
    }

    pub fn state(name: impl Into<String>, help: impl Into<String>, state: TrafficLight) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            value: MetricValue::State(state),
        }
    }
}

/// All samples produced by one scrape
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricBatch {
    samples: Vec<MetricSample>,
}

impl MetricBatch {
    pub fn new(samples: Vec<MetricSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MetricSample> {
        self.samples.iter()
    }

    /// Look up a sample by its exported name
    pub fn get(&self, name: &str) -> Option<&MetricSample> {
        self.samples.iter().find(|s| s.name == name)
    }
}

impl<'a> IntoIterator for &'a MetricBatch {
    type Item = &'a MetricSample;
    type IntoIter = std::slice::Iter<'a, MetricSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Make a console-derived string usable as a metric or label name
///
/// Invalid characters become `_`, a leading digit gets a `_` prefix and the
/// reserved `__` prefix is collapsed.
pub fn sanitize_name(raw: &str) -> String {
    let mut name: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    while name.starts_with("__") {
        name.remove(0);
    }
    name
}
