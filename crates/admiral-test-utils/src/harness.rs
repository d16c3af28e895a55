//! Both lifecycle managers wired over the in-memory stack.

use crate::builders::{LaunchPlanBuilder, WorkflowBuilder};
use crate::implementations::{RecordingPublisher, RecordingWorkflowExecutor};
use admiral_content_store::{InMemoryContentStore, InlineRemoteUrl};
use admiral_core::domain::identifier::Identifier;
use admiral_core::domain::launch_plan::LaunchPlan;
use admiral_core::domain::workflow::Workflow;
use admiral_core::{
    ApplicationConfig, ExecutionManager, NodeExecutionManager, QueueConfig, Repositories, StaticQueueConfig,
};
use admiral_monitoring::metrics::InMemoryMetricsCollector;
use admiral_state_inmemory::InMemoryStateStoreProvider;
use std::sync::Arc;

/// A fully wired control plane with recording collaborators
pub struct TestHarness {
    /// Backing state
    pub provider: InMemoryStateStoreProvider,
    /// Repositories over `provider`
    pub repositories: Repositories,
    /// Offloaded payloads
    pub store: Arc<InMemoryContentStore>,
    /// Dispatch and termination log
    pub executor: Arc<RecordingWorkflowExecutor>,
    /// Published notifications
    pub publisher: Arc<RecordingPublisher>,
    /// Metric read-back
    pub metrics: Arc<InMemoryMetricsCollector>,
    /// Workflow execution manager
    pub executions: ExecutionManager,
    /// Node execution manager
    pub nodes: NodeExecutionManager,
}

impl TestHarness {
    /// Default configuration, no queue rules
    pub fn new() -> Self {
        Self::with_config(ApplicationConfig::default(), QueueConfig::default())
    }

    /// Default configuration with the given queue rules
    pub fn with_queue_config(queue_config: QueueConfig) -> Self {
        Self::with_config(ApplicationConfig::default(), queue_config)
    }

    /// Custom configuration
    pub fn with_config(config: ApplicationConfig, queue_config: QueueConfig) -> Self {
        let provider = InMemoryStateStoreProvider::new();
        let repositories = provider.create_repositories();
        let store = Arc::new(InMemoryContentStore::new());
        let executor = Arc::new(RecordingWorkflowExecutor::default());
        let publisher = Arc::new(RecordingPublisher::new());
        let metrics = Arc::new(InMemoryMetricsCollector::new());
        let remote_url = Arc::new(InlineRemoteUrl::new(store.clone()));

        let executions = ExecutionManager::new(
            repositories.clone(),
            Arc::new(config),
            store.clone(),
            remote_url.clone(),
            executor.clone(),
            Arc::new(StaticQueueConfig::new(queue_config)),
            publisher.clone(),
            metrics.clone(),
        );
        let nodes = NodeExecutionManager::new(repositories.clone(), remote_url, metrics.clone());

        Self {
            provider,
            repositories,
            store,
            executor,
            publisher,
            metrics,
            executions,
            nodes,
        }
    }

    /// Register a launch plan and its workflow
    pub async fn register(&self, launch_plan: LaunchPlan, workflow: Workflow) {
        self.provider.add_workflow(workflow).await;
        self.provider.add_launch_plan(launch_plan).await;
    }

    /// Register a launch plan `name` over an empty workflow of the same name
    pub async fn register_default(&self, name: &str) -> Identifier {
        let workflow = WorkflowBuilder::new(name).build();
        let launch_plan = LaunchPlanBuilder::new(name, &workflow.id).build();
        let id = launch_plan.id.clone();
        self.register(launch_plan, workflow).await;
        id
    }

    /// Wait for detached metric tasks
    pub async fn drain_background(&self) {
        self.executions.background().drain().await;
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
