//! Prometheus text exposition of a metric batch
//!
//! Each scrape's batch is registered into a throwaway [`Registry`] so that
//! label sets from the previous scrape (a cron job that has since recovered,
//! a node that left the cluster) never linger. The exporter's own metrics
//! from the default registry are appended to the same response.

use crate::error::Result;
use crate::models::{MetricBatch, MetricSample, MetricValue, TrafficLight};
use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use tracing::warn;

/// Content type of the text exposition format
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Build a fresh registry holding every sample of `batch`
///
/// A sample that cannot be registered (invalid or duplicate name) is logged
/// and skipped; the rest of the batch is still exported.
pub fn registry_for(batch: &MetricBatch) -> Registry {
    let registry = Registry::new();
    for sample in batch {
        let collector = match build_collector(sample) {
            Ok(collector) => collector,
            Err(e) => {
                warn!(metric = %sample.name, error = %e, "Skipping metric that cannot be built");
                continue;
            }
        };
        if let Err(e) = registry.register(collector) {
            warn!(metric = %sample.name, error = %e, "Skipping metric that cannot be registered");
        }
    }
    registry
}

fn build_collector(sample: &MetricSample) -> Result<Box<dyn Collector>> {
    match &sample.value {
        MetricValue::Numeric(value) => {
            let gauge = Gauge::with_opts(Opts::new(sample.name.as_str(), sample.help.as_str()))?;
            gauge.set(*value);
            Ok(Box::new(gauge))
        }
        MetricValue::Info(labels) => {
            let opts = Opts::new(format!("{}_info", sample.name), sample.help.as_str());
            if labels.is_empty() {
                let gauge = Gauge::with_opts(opts)?;
                gauge.set(1.0);
                return Ok(Box::new(gauge));
            }

            let names: Vec<&str> = labels.keys().map(String::as_str).collect();
            let values: Vec<&str> = labels.values().map(String::as_str).collect();
            let gauge = GaugeVec::new(opts, &names)?;
            gauge.get_metric_with_label_values(&values)?.set(1.0);
            Ok(Box::new(gauge))
        }
        MetricValue::State(current) => {
            let opts = Opts::new(sample.name.as_str(), sample.help.as_str());
            let gauge = GaugeVec::new(opts, &[sample.name.as_str()])?;
            for state in TrafficLight::ALL {
                let value = if state == *current { 1.0 } else { 0.0 };
                gauge
                    .get_metric_with_label_values(&[state.as_str()])?
                    .set(value);
            }
            Ok(Box::new(gauge))
        }
    }
}

/// Metric families of the batch followed by the exporter's own metrics
pub fn gather(batch: &MetricBatch) -> Vec<MetricFamily> {
    let mut families = registry_for(batch).gather();
    families.extend(prometheus::gather());
    families
}

/// Encode the batch and the exporter's own metrics as Prometheus text
pub fn render(batch: &MetricBatch) -> Result<Vec<u8>> {
    let families = gather(batch);
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    Ok(buffer)
}
