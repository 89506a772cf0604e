//! Prometheus exporter library for OTRS
//!
//! This crate provides the core functionality for:
//! - Running `otrs.Console.pl` diagnostic commands
//! - Tailing the OTRS daemon logs for mail errors
//! - Parsing console output into typed facts
//! - Building and exposing the `otrs_*` metric batch
//! - Health checks and observability

pub mod api;
pub mod cache;
pub mod collector;
pub mod console;
pub mod error;
pub mod exposition;
pub mod health;
pub mod logtail;
pub mod models;
pub mod observability;
pub mod parsers;
pub mod stats;

pub use collector::OtrsCollector;
pub use console::{ConsoleRunner, DiagnosticRunner};
pub use error::{CollectorError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use logtail::LogTailReader;
pub use models::*;
pub use observability::{ExporterMetrics, StructuredLogger};
