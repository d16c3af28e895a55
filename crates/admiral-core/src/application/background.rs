//!
//! Bounded pool for detached, best-effort side effects such as delay and
//! duration metrics. Work is rejected rather than queued when the pool is full.
//!

use admiral_monitoring::{labels, MetricType, MetricsCollector};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::application::metrics::BACKGROUND_TASKS_REJECTED;

/// Runs detached tasks with a cap on how many run at once
pub struct BackgroundPool {
    /// Permits for concurrently running tasks
    semaphore: Arc<Semaphore>,
    /// Total permits
    capacity: usize,
    metrics: Arc<dyn MetricsCollector>,
}

impl BackgroundPool {
    /// Create a pool running at most `capacity` tasks at once (at least one)
    pub fn new(capacity: usize, metrics: Arc<dyn MetricsCollector>) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            metrics,
        }
    }

    /// Spawn `task` unless the pool is saturated. Returns whether it was accepted.
    ///
    /// Accepted tasks are detached: they outlive the caller and its cancellation.
    pub fn submit<F>(&self, name: &'static str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => {
                tokio::spawn(async move {
                    task.await;
                    drop(permit);
                });
                true
            }
            Err(_) => {
                warn!(task = name, capacity = self.capacity, "background pool saturated, dropping task");
                self.metrics.record_metric(
                    BACKGROUND_TASKS_REJECTED,
                    1.0,
                    MetricType::Counter,
                    labels(&[("task", name)]),
                );
                false
            }
        }
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait until every running task has finished
    pub async fn drain(&self) {
        if let Ok(permits) = self.semaphore.acquire_many(self.capacity as u32).await {
            drop(permits);
        }
    }
}
