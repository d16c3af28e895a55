//! Monitoring module for the Admiral control plane.
//!
//! Components record metrics through the [`MetricsCollector`] trait so that
//! production wiring (the `metrics` facade) and tests (an in-memory collector
//! with read-back) can be swapped freely.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use tracing::info;

pub mod logging;
pub mod metrics;

/// Type of metric for collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    /// Counter metrics accumulate values
    Counter,
    /// Gauge metrics move up or down; recorded values are deltas
    Gauge,
    /// Histogram metrics observe distributions
    Histogram,
    /// Summary metrics collect observations with quantiles
    Summary,
}

/// Interface for collecting metrics
pub trait MetricsCollector: Send + Sync {
    /// Record a metric with the given name, value, type, and labels
    fn record_metric(&self, name: &str, value: f64, metric_type: MetricType, labels: HashMap<String, String>);

    /// Flush metrics to the backend
    fn flush(&self) -> BoxFuture<'static, Result<(), String>>;

    /// Convert to Any for downcasting in tests
    fn as_any(&self) -> &dyn Any;
}

/// Build a label map from string pairs
pub fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Configuration for initializing the monitoring system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Service name attached to startup logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Log level filter (e.g., "info,admiral_core=debug")
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Emit JSON logs instead of the pretty format
    #[serde(default)]
    pub json_logs: bool,
    /// Prefix prepended to every metric name
    #[serde(default = "default_metrics_prefix")]
    pub metrics_prefix: String,
}

fn default_service_name() -> String {
    "admiral".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_metrics_prefix() -> String {
    "admiral".to_string()
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_filter: default_log_filter(),
            json_logs: false,
            metrics_prefix: default_metrics_prefix(),
        }
    }
}

/// Initialize monitoring system
pub fn init(config: &MonitoringConfig) -> anyhow::Result<()> {
    logging::init_logging(config)?;
    info!(service_name = %config.service_name, prefix = %config.metrics_prefix, "Monitoring initialized");
    Ok(())
}

/// Install the Prometheus exporter as the global `metrics` recorder
#[cfg(feature = "prometheus")]
pub fn install_prometheus_exporter(addr: std::net::SocketAddr) -> anyhow::Result<()> {
    use anyhow::Context;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!(%addr, "Prometheus exporter listening");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MonitoringConfig::default();
        assert_eq!(config.service_name, "admiral");
        assert_eq!(config.metrics_prefix, "admiral");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_labels() {
        let labels = labels(&[("project", "p"), ("domain", "d")]);
        assert_eq!(labels.get("project").map(String::as_str), Some("p"));
        assert_eq!(labels.len(), 2);
    }
}

// Exported types
pub use crate::metrics::*;
