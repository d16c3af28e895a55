//! Metrics collectors and project/domain scoped stop watches.

use crate::{MetricType, MetricsCollector};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Forwards every metric to the global `metrics` recorder.
#[derive(Debug, Clone)]
pub struct FacadeMetricsCollector {
    prefix: String,
}

impl FacadeMetricsCollector {
    /// Create a collector that prefixes names with `prefix:`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    fn full_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}:{}", self.prefix, name)
        }
    }
}

impl MetricsCollector for FacadeMetricsCollector {
    fn record_metric(&self, name: &str, value: f64, metric_type: MetricType, labels: HashMap<String, String>) {
        let name = self.full_name(name);
        let labels: Vec<::metrics::Label> = labels
            .into_iter()
            .map(|(k, v)| ::metrics::Label::new(k, v))
            .collect();
        match metric_type {
            MetricType::Counter => ::metrics::counter!(name, labels).increment(value.max(0.0) as u64),
            MetricType::Gauge => ::metrics::gauge!(name, labels).increment(value),
            MetricType::Histogram | MetricType::Summary => ::metrics::histogram!(name, labels).record(value),
        }
    }

    fn flush(&self) -> BoxFuture<'static, Result<(), String>> {
        // The recorder owns export; nothing is buffered here.
        Box::pin(async { Ok(()) })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Canonical key: name plus labels sorted by key.
fn metric_key(name: &str, labels: &HashMap<String, String>) -> String {
    let sorted: BTreeMap<_, _> = labels.iter().collect();
    let mut key = name.to_string();
    for (k, v) in sorted {
        key.push('|');
        key.push_str(k);
        key.push('=');
        key.push_str(v);
    }
    key
}

/// Collector that keeps everything in memory for read-back in tests.
#[derive(Debug, Default)]
pub struct InMemoryMetricsCollector {
    values: DashMap<String, f64>,
    observations: DashMap<String, Vec<f64>>,
    totals: DashMap<String, f64>,
}

impl InMemoryMetricsCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of counter/gauge values for a name across all label sets
    pub fn value(&self, name: &str) -> f64 {
        self.totals.get(name).map(|v| *v).unwrap_or(0.0)
    }

    /// Counter/gauge value for one exact label set
    pub fn value_with_labels(&self, name: &str, labels: &HashMap<String, String>) -> f64 {
        self.values
            .get(&metric_key(name, labels))
            .map(|v| *v)
            .unwrap_or(0.0)
    }

    /// Histogram/summary observations for a name across all label sets
    pub fn observations(&self, name: &str) -> Vec<f64> {
        self.observations
            .iter()
            .filter(|entry| entry.key() == name || entry.key().starts_with(&format!("{}|", name)))
            .flat_map(|entry| entry.value().clone())
            .collect()
    }

    /// Observations for one exact label set
    pub fn observations_with_labels(&self, name: &str, labels: &HashMap<String, String>) -> Vec<f64> {
        self.observations
            .get(&metric_key(name, labels))
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

impl MetricsCollector for InMemoryMetricsCollector {
    fn record_metric(&self, name: &str, value: f64, metric_type: MetricType, labels: HashMap<String, String>) {
        let key = metric_key(name, &labels);
        match metric_type {
            MetricType::Counter | MetricType::Gauge => {
                *self.values.entry(key).or_insert(0.0) += value;
                *self.totals.entry(name.to_string()).or_insert(0.0) += value;
            }
            MetricType::Histogram | MetricType::Summary => {
                self.observations.entry(key).or_default().push(value);
            }
        }
    }

    fn flush(&self) -> BoxFuture<'static, Result<(), String>> {
        Box::pin(async { Ok(()) })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Records the elapsed time between two instants as a summary observation.
pub struct StopWatch {
    name: String,
    labels: HashMap<String, String>,
    collector: Arc<dyn MetricsCollector>,
}

impl StopWatch {
    /// Create a stop watch for a metric name and fixed label set
    pub fn new(name: impl Into<String>, labels: HashMap<String, String>, collector: Arc<dyn MetricsCollector>) -> Self {
        Self {
            name: name.into(),
            labels,
            collector,
        }
    }

    /// Observe `end - start` in seconds. Negative spans are recorded as-is.
    pub fn observe(&self, start: DateTime<Utc>, end: DateTime<Utc>) {
        let elapsed = end.signed_duration_since(start);
        let seconds = elapsed.num_milliseconds() as f64 / 1000.0;
        self.collector
            .record_metric(&self.name, seconds, MetricType::Summary, self.labels.clone());
    }
}

/// Lazily created stop watches keyed by (project, domain).
///
/// Creation goes through `DashMap::entry`, so concurrent first use for the same
/// key yields one shared instrument.
pub struct ScopedStopWatches {
    name: String,
    collector: Arc<dyn MetricsCollector>,
    watches: DashMap<(String, String), Arc<StopWatch>>,
}

impl ScopedStopWatches {
    /// Create an empty map for the given metric name
    pub fn new(name: impl Into<String>, collector: Arc<dyn MetricsCollector>) -> Self {
        Self {
            name: name.into(),
            collector,
            watches: DashMap::new(),
        }
    }

    /// Get the stop watch for a project/domain pair, creating it on first use
    pub fn get_or_create(&self, project: &str, domain: &str) -> Arc<StopWatch> {
        self.watches
            .entry((project.to_string(), domain.to_string()))
            .or_insert_with(|| {
                debug!(metric = %self.name, project, domain, "creating scoped stop watch");
                Arc::new(StopWatch::new(
                    self.name.clone(),
                    crate::labels(&[("project", project), ("domain", domain)]),
                    self.collector.clone(),
                ))
            })
            .clone()
    }

    /// Observe a span for a project/domain pair
    pub fn observe(&self, project: &str, domain: &str, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.get_or_create(project, domain).observe(start, end);
    }

    /// Number of instruments created so far
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    /// True when no instrument exists yet
    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}
