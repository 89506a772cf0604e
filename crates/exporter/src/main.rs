//! OTRS Exporter - Prometheus metrics for an OTRS installation
//!
//! Serves `/metrics` on demand: every scrape runs the OTRS console checks,
//! reads new daemon log lines and renders the results.

use exporter_lib::{
    api::{self, AppState},
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    ConsoleRunner, LogTailReader, OtrsCollector,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::ExporterConfig::load()?;

    // Initialize tracing with JSON output and env filter
    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().json())
        .init();

    let logger = StructuredLogger::new(config.listen_addr());
    logger.log_startup(EXPORTER_VERSION, &config.console_path, &config.log_path);
    logger.log_database_settings(
        &config.db_user,
        &config.db_host,
        &config.db_name,
        config.db_pw.is_some(),
    );

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(components::CONSOLE).await;
    health_registry.register(components::LOG_TAIL).await;

    let runner = Arc::new(ConsoleRunner::new(
        &config.console_path,
        config.command_timeout(),
    ));
    let log = LogTailReader::new(&config.log_path, &config.offset_path);
    let collector = OtrsCollector::new(runner, log)
        .with_cache_window(config.cache_window())
        .with_health(health_registry.clone())
        .with_logger(logger.clone());

    let app_state = Arc::new(AppState::new(health_registry.clone(), collector));

    // Mark exporter as ready after initialization
    health_registry.set_ready(true).await;

    let server = tokio::spawn(api::serve(config.listen_addr(), app_state));

    tokio::select! {
        result = server => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("server stopped"),
                Ok(Err(e)) => {
                    error!(error = %e, "Metrics server failed");
                    return Err(e);
                }
                Err(e) => return Err(e.into()),
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
