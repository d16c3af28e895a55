//! Queue routing rules read from a YAML file and refreshed in the background.
//!
//! Allocation decisions take a snapshot, so a reload never changes the rules
//! halfway through one decision. A file that fails to read or parse leaves
//! the previous snapshot in place.

use admiral_core::{QueueConfig, QueueConfigProvider};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ServerError, ServerResult};

/// Queue rules backed by a file
#[derive(Debug)]
pub struct FileQueueConfigProvider {
    path: PathBuf,
    current: RwLock<Arc<QueueConfig>>,
}

impl FileQueueConfigProvider {
    /// Read the initial rules; an unreadable file is an error at startup
    pub fn load(path: impl Into<PathBuf>) -> ServerResult<Self> {
        let path = path.into();
        let config = read_queue_config(&path)?;
        info!(
            path = %path.display(),
            execution_queues = config.execution_queues.len(),
            workflow_configs = config.workflow_configs.len(),
            "Queue configuration loaded"
        );
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// Re-read the file, keeping the previous rules if it is invalid.
    ///
    /// Returns whether the snapshot changed.
    pub fn reload(&self) -> bool {
        let config = match read_queue_config(&self.path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Keeping previous queue configuration");
                return false;
            }
        };

        let mut current = self.current.write();
        if **current == config {
            debug!(path = %self.path.display(), "Queue configuration unchanged");
            return false;
        }
        *current = Arc::new(config);
        info!(path = %self.path.display(), "Queue configuration reloaded");
        true
    }

    /// Reload on a fixed interval until the handle is aborted
    pub fn spawn_refresh(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let provider = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; the file was just read.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                provider.reload();
            }
        })
    }
}

impl QueueConfigProvider for FileQueueConfigProvider {
    fn snapshot(&self) -> Arc<QueueConfig> {
        self.current.read().clone()
    }
}

/// Parse a queue routing file
pub fn read_queue_config(path: &Path) -> ServerResult<QueueConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|err| ServerError::QueueConfigError(format!("{}: {}", path.display(), err)))?;
    parse_queue_config(&contents)
}

/// Parse queue routing rules from YAML
pub fn parse_queue_config(contents: &str) -> ServerResult<QueueConfig> {
    if contents.trim().is_empty() {
        return Ok(QueueConfig::default());
    }
    serde_yaml::from_str(contents).map_err(|err| ServerError::QueueConfigError(err.to_string()))
}
