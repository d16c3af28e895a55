//!
//! Admiral Server - wires the control plane together and runs it
//!
//! The server owns the process-level concerns: configuration, the queue
//! routing reload loop, the notification processor and shutdown. All
//! lifecycle behavior lives in `admiral-core`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use admiral_content_store::{InMemoryContentStore, InlineRemoteUrl};
use admiral_core::{ExecutionManager, NodeExecutionManager, QueueConfigProvider, StaticQueueConfig};
use admiral_monitoring::{FacadeMetricsCollector, MetricsCollector};
use admiral_notifications::{topic, Emailer, LoggingEmailer, NotificationProcessor};
use admiral_state_inmemory::InMemoryStateStoreProvider;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Configuration module
pub mod config;

/// Error module
pub mod error;

/// Workflow executor without a remote engine
pub mod executor;

/// File-backed queue routing
pub mod queue_config;

/// Public operations
pub mod service;

// Re-export key types
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use executor::LocalWorkflowExecutor;
pub use queue_config::FileQueueConfigProvider;
pub use service::AdminService;

/// A wired control plane, ready to start
pub struct AdmiralServer {
    config: ServerConfig,
    /// Registered entities and recorded executions
    pub state: InMemoryStateStoreProvider,
    /// Public operations
    pub service: AdminService,
    processor: Arc<NotificationProcessor>,
    file_queue_config: Option<Arc<FileQueueConfigProvider>>,
}

/// Handles of a started server
pub struct RunningServer {
    processor: JoinHandle<Result<(), admiral_notifications::NotificationError>>,
    refresh: Option<JoinHandle<()>>,
}

impl AdmiralServer {
    /// Build with the production collaborators: `metrics` facade and logging emailer
    pub fn build(config: ServerConfig) -> ServerResult<Self> {
        let collector = Arc::new(FacadeMetricsCollector::new(config.metrics_prefix.clone()));
        Self::build_with(config, collector, Arc::new(LoggingEmailer::default()))
    }

    /// Build with the given metrics collector and emailer
    pub fn build_with(
        config: ServerConfig,
        collector: Arc<dyn MetricsCollector>,
        emailer: Arc<dyn Emailer>,
    ) -> ServerResult<Self> {
        config.validate()?;

        let state = InMemoryStateStoreProvider::new();
        let repositories = state.create_repositories();
        let store = Arc::new(InMemoryContentStore::with_base(config.storage_base.clone()));
        let remote_url = Arc::new(InlineRemoteUrl::new(store.clone()));
        let executor = Arc::new(LocalWorkflowExecutor::new(config.default_cluster.clone()));

        let file_queue_config = match &config.queue_config_path {
            Some(path) => Some(Arc::new(FileQueueConfigProvider::load(path)?)),
            None => None,
        };
        let queue_config: Arc<dyn QueueConfigProvider> = match &file_queue_config {
            Some(provider) => provider.clone() as Arc<dyn QueueConfigProvider>,
            None => Arc::new(StaticQueueConfig::default()),
        };

        let (publisher, subscriber) = topic(config.notification_queue_capacity);
        let processor = Arc::new(NotificationProcessor::new(Arc::new(subscriber), emailer, collector.clone()));

        let executions = Arc::new(ExecutionManager::new(
            repositories.clone(),
            Arc::new(config.application.clone()),
            store,
            remote_url.clone(),
            executor,
            queue_config,
            Arc::new(publisher),
            collector.clone(),
        ));
        let nodes = Arc::new(NodeExecutionManager::new(repositories, remote_url, collector));

        Ok(Self {
            config,
            state,
            service: AdminService::new(executions, nodes),
            processor,
            file_queue_config,
        })
    }

    /// Configuration the server was built with
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start the notification processor and the queue routing refresh loop
    pub fn start(&self) -> RunningServer {
        let processor = self.processor.clone();
        let processor = tokio::spawn(async move { processor.run().await });
        let refresh = self
            .file_queue_config
            .as_ref()
            .map(|provider| provider.spawn_refresh(self.config.queue_refresh_interval()));
        info!(
            cluster = %self.config.default_cluster,
            storage_base = %self.config.storage_base,
            queue_config = self.config.queue_config_path.as_deref().unwrap_or("<static>"),
            "Admiral server started"
        );
        RunningServer { processor, refresh }
    }

    /// Stop background work and wait for it to finish.
    ///
    /// Notifications already queued are not delivered after a stop.
    pub async fn shutdown(&self, running: RunningServer) -> ServerResult<()> {
        if let Some(refresh) = running.refresh {
            refresh.abort();
        }
        self.service.executions().background().drain().await;

        self.processor.stop().await?;
        match running.processor.await {
            Ok(result) => result?,
            Err(err) => return Err(ServerError::InternalError(format!("notification processor panicked: {}", err))),
        }
        info!("Admiral server stopped");
        Ok(())
    }
}

/// Run function
pub async fn run(config: ServerConfig) -> ServerResult<()> {
    let server = AdmiralServer::build(config)?;
    let running = server.start();

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for shutdown signal");
    }
    info!("Shutdown requested");
    server.shutdown(running).await
}
