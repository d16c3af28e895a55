use admiral_content_store::{ContentStorage, DataReference};
use admiral_core::application::metrics::{
    ACTIVE_NODE_EXECUTIONS, MISSING_WORKFLOW_EXECUTION, NODE_EXECUTIONS_CREATED, NODE_EXECUTIONS_TERMINATED,
    NODE_EXECUTION_EVENTS_CREATED,
};
use admiral_content_store::InlineRemoteUrl;
use admiral_core::domain::execution::EventOutput;
use admiral_core::domain::list::ListResourceInput;
use admiral_core::domain::literal::LiteralMap;
use admiral_core::domain::node_execution::{
    NodeExecution, NodeExecutionEventRecord, NodeExecutionForTaskListRequest, NodeExecutionListRequest, TaskExecution,
    WorkflowNodeMetadata,
};
use admiral_core::domain::repository::{NodeExecutionRepository, Repositories};
use admiral_core::{CoreError, ErrorKind, NodeEventOutcome, NodeExecutionId, NodeExecutionManager, NodeExecutionPhase};
use admiral_test_utils::builders::{
    child_node_event, create_request, execution_id, node_event, node_id, task_execution_id,
};
use admiral_test_utils::TestHarness;
use async_trait::async_trait;
use chrono::Utc;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Node store that misses a number of reads and rejects a number of
/// updates as conflicting before behaving normally
struct RacingNodeRepository {
    inner: Arc<dyn NodeExecutionRepository>,
    missed_reads: AtomicUsize,
    conflicts: AtomicUsize,
}

impl RacingNodeRepository {
    fn new(inner: Arc<dyn NodeExecutionRepository>, missed_reads: usize, conflicts: usize) -> Self {
        Self {
            inner,
            missed_reads: AtomicUsize::new(missed_reads),
            conflicts: AtomicUsize::new(conflicts),
        }
    }
}

fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl NodeExecutionRepository for RacingNodeRepository {
    async fn create(&self, event: NodeExecutionEventRecord, node: NodeExecution) -> Result<NodeExecution, CoreError> {
        self.inner.create(event, node).await
    }

    async fn get(&self, id: &NodeExecutionId) -> Result<NodeExecution, CoreError> {
        if take(&self.missed_reads) {
            return Err(CoreError::NotFound(id.to_string()));
        }
        self.inner.get(id).await
    }

    async fn update_with_event(
        &self,
        event: NodeExecutionEventRecord,
        node: &NodeExecution,
        expected_phase: NodeExecutionPhase,
    ) -> Result<(), CoreError> {
        if take(&self.conflicts) {
            return Err(CoreError::ConcurrentModification(node.id.to_string()));
        }
        self.inner.update_with_event(event, node, expected_phase).await
    }

    async fn list(&self, input: &ListResourceInput) -> Result<Vec<NodeExecution>, CoreError> {
        self.inner.list(input).await
    }

    async fn list_events(&self, id: &NodeExecutionId) -> Result<Vec<NodeExecutionEventRecord>, CoreError> {
        self.inner.list_events(id).await
    }
}

/// A node manager over the harness state whose node store races as configured
fn racing_manager(harness: &TestHarness, missed_reads: usize, conflicts: usize) -> NodeExecutionManager {
    let repositories = Repositories {
        node_executions: Arc::new(RacingNodeRepository::new(
            harness.repositories.node_executions.clone(),
            missed_reads,
            conflicts,
        )),
        ..harness.repositories.clone()
    };
    NodeExecutionManager::new(
        repositories,
        Arc::new(InlineRemoteUrl::new(harness.store.clone())),
        harness.metrics.clone(),
    )
}

async fn harness_with_execution(name: &str) -> TestHarness {
    let harness = TestHarness::new();
    let lp = harness.register_default("lp").await;
    harness
        .executions
        .create_execution(create_request(name, &lp, LiteralMap::new()), Utc::now())
        .await
        .expect("execution created");
    harness
}

#[tokio::test]
async fn test_first_event_creates_then_updates() -> Result<(), CoreError> {
    let harness = harness_with_execution("run-1").await;
    let id = node_id("run-1", "n0");

    let created = harness
        .nodes
        .apply_node_event(node_event(&id, "r1", NodeExecutionPhase::Queued))
        .await?;
    assert_eq!(created, NodeEventOutcome::Created);
    let updated = harness
        .nodes
        .apply_node_event(node_event(&id, "r2", NodeExecutionPhase::Running))
        .await?;
    assert_eq!(updated, NodeEventOutcome::Updated);

    let node = harness.nodes.get_node_execution(&id).await?;
    assert_eq!(node.phase(), NodeExecutionPhase::Running);
    assert!(node.closure.started_at.is_some());
    assert_eq!(harness.repositories.node_executions.list_events(&id).await?.len(), 2);

    assert_eq!(harness.metrics.value(NODE_EXECUTIONS_CREATED), 1.0);
    assert_eq!(harness.metrics.value(NODE_EXECUTION_EVENTS_CREATED), 2.0);
    assert_eq!(harness.metrics.value(ACTIVE_NODE_EXECUTIONS), 1.0);

    harness
        .nodes
        .record_node_event(node_event(&id, "r3", NodeExecutionPhase::Succeeded))
        .await?;
    assert_eq!(harness.metrics.value(ACTIVE_NODE_EXECUTIONS), 0.0);
    assert_eq!(harness.metrics.value(NODE_EXECUTIONS_TERMINATED), 1.0);
    Ok(())
}

#[tokio::test]
async fn test_event_for_missing_execution() {
    let harness = TestHarness::new();
    let id = node_id("ghost", "n0");

    let error = harness
        .nodes
        .record_node_event(node_event(&id, "r1", NodeExecutionPhase::Queued))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert_eq!(
        error.to_string(),
        "Not found: failed to get existing execution id: [project/development/ghost]"
    );
    assert_eq!(harness.metrics.value(MISSING_WORKFLOW_EXECUTION), 1.0);
    assert_eq!(harness.provider.node_execution_count().await, 0);
}

#[tokio::test]
async fn test_terminal_node_refuses_new_phases() -> Result<(), CoreError> {
    let harness = harness_with_execution("run-1").await;
    let id = node_id("run-1", "n0");
    harness
        .nodes
        .record_node_event(node_event(&id, "r1", NodeExecutionPhase::Failed))
        .await?;

    let outcome = harness
        .nodes
        .apply_node_event(node_event(&id, "r2", NodeExecutionPhase::Running))
        .await?;
    assert_eq!(
        outcome,
        NodeEventOutcome::AlreadyTerminal {
            current: NodeExecutionPhase::Failed
        }
    );

    let error = harness
        .nodes
        .record_node_event(node_event(&id, "r3", NodeExecutionPhase::Succeeded))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::FailedPrecondition);
    assert_eq!(error.current_phase(), Some("FAILED"));

    let duplicate = harness
        .nodes
        .record_node_event(node_event(&id, "r4", NodeExecutionPhase::Failed))
        .await
        .unwrap_err();
    assert_eq!(duplicate.kind(), ErrorKind::AlreadyExists);

    // Refused events are not counted.
    assert_eq!(harness.metrics.value(NODE_EXECUTION_EVENTS_CREATED), 1.0);
    assert_eq!(harness.repositories.node_executions.list_events(&id).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_child_execution_must_exist() -> Result<(), CoreError> {
    let harness = harness_with_execution("run-1").await;
    let id = node_id("run-1", "n0");
    harness
        .nodes
        .record_node_event(node_event(&id, "r1", NodeExecutionPhase::Queued))
        .await?;

    let mut launch = node_event(&id, "r2", NodeExecutionPhase::Running);
    launch.event.workflow_node_metadata = Some(WorkflowNodeMetadata {
        execution_id: execution_id("missing-child"),
    });
    let error = harness.nodes.record_node_event(launch.clone()).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);

    launch.event.workflow_node_metadata = Some(WorkflowNodeMetadata {
        execution_id: execution_id("run-1"),
    });
    harness.nodes.record_node_event(launch).await?;
    let node = harness.nodes.get_node_execution(&id).await?;
    assert_eq!(
        node.closure.workflow_node_metadata.map(|m| m.execution_id),
        Some(execution_id("run-1"))
    );
    Ok(())
}

#[tokio::test]
async fn test_terminal_node_wins_over_missing_child() -> Result<(), CoreError> {
    let harness = harness_with_execution("run-1").await;
    let id = node_id("run-1", "n0");
    harness
        .nodes
        .record_node_event(node_event(&id, "r1", NodeExecutionPhase::Succeeded))
        .await?;

    let mut late = node_event(&id, "r2", NodeExecutionPhase::Running);
    late.event.workflow_node_metadata = Some(WorkflowNodeMetadata {
        execution_id: execution_id("missing-child"),
    });
    let outcome = harness.nodes.apply_node_event(late.clone()).await?;
    assert_eq!(
        outcome,
        NodeEventOutcome::AlreadyTerminal {
            current: NodeExecutionPhase::Succeeded
        }
    );
    let error = harness.nodes.record_node_event(late).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::FailedPrecondition);

    let mut duplicate = node_event(&id, "r3", NodeExecutionPhase::Succeeded);
    duplicate.event.workflow_node_metadata = Some(WorkflowNodeMetadata {
        execution_id: execution_id("missing-child"),
    });
    let error = harness.nodes.record_node_event(duplicate).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::AlreadyExists);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_first_events_create_one_node() -> Result<(), CoreError> {
    let harness = harness_with_execution("run-1").await;
    let id = node_id("run-1", "n0");

    let (queued, running) = tokio::join!(
        harness
            .nodes
            .apply_node_event(node_event(&id, "r1", NodeExecutionPhase::Queued)),
        harness
            .nodes
            .apply_node_event(node_event(&id, "r2", NodeExecutionPhase::Running)),
    );
    let mut outcomes = vec![queued?, running?];
    outcomes.sort_by_key(|outcome| *outcome != NodeEventOutcome::Created);
    assert_eq!(outcomes, vec![NodeEventOutcome::Created, NodeEventOutcome::Updated]);

    assert_eq!(harness.provider.node_execution_count().await, 1);
    assert_eq!(harness.metrics.value(NODE_EXECUTIONS_CREATED), 1.0);
    assert_eq!(harness.metrics.value(NODE_EXECUTION_EVENTS_CREATED), 2.0);
    assert_eq!(harness.repositories.node_executions.list_events(&id).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_lost_create_race_becomes_update() -> Result<(), CoreError> {
    let harness = harness_with_execution("run-1").await;
    let id = node_id("run-1", "n0");
    harness
        .nodes
        .record_node_event(node_event(&id, "r1", NodeExecutionPhase::Queued))
        .await?;

    // The lookup misses the node another writer just created.
    let nodes = racing_manager(&harness, 1, 0);
    let outcome = nodes
        .apply_node_event(node_event(&id, "r2", NodeExecutionPhase::Running))
        .await?;
    assert_eq!(outcome, NodeEventOutcome::Updated);

    assert_eq!(harness.provider.node_execution_count().await, 1);
    assert_eq!(harness.metrics.value(NODE_EXECUTIONS_CREATED), 1.0);
    assert_eq!(
        harness.nodes.get_node_execution(&id).await?.closure.phase,
        NodeExecutionPhase::Running
    );
    assert_eq!(harness.repositories.node_executions.list_events(&id).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_conflicting_update_is_retried() -> Result<(), CoreError> {
    let harness = harness_with_execution("run-1").await;
    let id = node_id("run-1", "n0");
    harness
        .nodes
        .record_node_event(node_event(&id, "r1", NodeExecutionPhase::Queued))
        .await?;

    let nodes = racing_manager(&harness, 0, 2);
    let outcome = nodes
        .apply_node_event(node_event(&id, "r2", NodeExecutionPhase::Running))
        .await?;
    assert_eq!(outcome, NodeEventOutcome::Updated);
    assert_eq!(
        harness.nodes.get_node_execution(&id).await?.closure.phase,
        NodeExecutionPhase::Running
    );

    // Every attempt conflicts: the last conflict is returned and nothing changes.
    let nodes = racing_manager(&harness, 0, 3);
    let error = nodes
        .apply_node_event(node_event(&id, "r3", NodeExecutionPhase::Succeeded))
        .await
        .unwrap_err();
    assert!(matches!(error, CoreError::ConcurrentModification(_)), "{}", error);
    assert_eq!(
        harness.nodes.get_node_execution(&id).await?.closure.phase,
        NodeExecutionPhase::Running
    );
    assert_eq!(harness.repositories.node_executions.list_events(&id).await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_child_nodes_listed_by_parent_task() -> Result<(), CoreError> {
    let harness = harness_with_execution("run-1").await;
    let parent_task = task_execution_id("run-1", "n0", "dynamic");
    harness
        .provider
        .add_task_execution(TaskExecution {
            internal_id: 42,
            id: parent_task.clone(),
            ..Default::default()
        })
        .await;

    harness
        .nodes
        .record_node_event(node_event(&node_id("run-1", "n0"), "r1", NodeExecutionPhase::Running))
        .await?;
    for child in ["n0-0", "n0-1"] {
        harness
            .nodes
            .record_node_event(child_node_event(
                &node_id("run-1", child),
                "r1",
                NodeExecutionPhase::Queued,
                &parent_task,
            ))
            .await?;
    }

    let mut request = NodeExecutionListRequest {
        workflow_execution_id: execution_id("run-1"),
        limit: 10,
        ..Default::default()
    };
    let roots = harness.nodes.list_node_executions(request.clone()).await?;
    assert_eq!(roots.node_executions.len(), 1);
    assert_eq!(roots.node_executions[0].id.node_id, "n0");
    assert_eq!(roots.token, "");

    request.include_child_nodes = true;
    assert_eq!(harness.nodes.list_node_executions(request).await?.node_executions.len(), 3);

    let children = harness
        .nodes
        .list_node_executions_for_task(NodeExecutionForTaskListRequest {
            task_execution_id: parent_task,
            limit: 1,
            ..Default::default()
        })
        .await?;
    assert_eq!(children.node_executions.len(), 1);
    assert_eq!(children.node_executions[0].parent_task_execution_id, Some(42));
    assert_eq!(children.token, "1");
    Ok(())
}

#[tokio::test]
async fn test_unknown_parent_task_is_rejected() {
    let harness = harness_with_execution("run-1").await;
    let error = harness
        .nodes
        .record_node_event(child_node_event(
            &node_id("run-1", "n0-0"),
            "r1",
            NodeExecutionPhase::Queued,
            &task_execution_id("run-1", "n0", "dynamic"),
        ))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert_eq!(harness.provider.node_execution_count().await, 0);
}

#[tokio::test]
async fn test_node_execution_data() -> Result<(), CoreError> {
    let harness = harness_with_execution("run-1").await;
    let id = node_id("run-1", "n0");
    let event = node_event(&id, "r1", NodeExecutionPhase::Running);
    harness
        .store
        .write_opaque(&DataReference::new(event.event.input_uri.clone()), vec![0; 16])
        .await?;
    harness.nodes.record_node_event(event.clone()).await?;

    let data = harness.nodes.get_node_execution_data(&id).await?;
    assert_eq!(data.inputs.url, event.event.input_uri);
    assert_eq!(data.inputs.bytes, 16);
    assert_eq!(data.outputs.url, "");

    let outputs = DataReference::new("mem://admiral/outputs/run-1/n0");
    harness.store.write_opaque(&outputs, vec![0; 4]).await?;
    let mut done = node_event(&id, "r2", NodeExecutionPhase::Succeeded);
    done.event.output = Some(EventOutput::Uri(outputs.as_str().to_string()));
    harness.nodes.record_node_event(done).await?;

    let data = harness.nodes.get_node_execution_data(&id).await?;
    assert_eq!(data.outputs.bytes, 4);
    Ok(())
}
