use admiral_content_store::{InMemoryContentStore, InlineRemoteUrl};
use admiral_core::domain::literal::LiteralMap;
use admiral_core::domain::notification::{NotificationSetting, EMAIL_NOTIFICATION_TYPE};
use admiral_core::{ApplicationConfig, CoreError, ExecutionManager, QueueConfig, StaticQueueConfig, WorkflowExecutionPhase};
use admiral_monitoring::metrics::InMemoryMetricsCollector;
use admiral_state_inmemory::InMemoryStateStoreProvider;
use admiral_test_utils::builders::{create_request, execution_event, LaunchPlanBuilder, WorkflowBuilder};
use admiral_test_utils::mocks::accepting_executor;
use admiral_test_utils::{MockPublisher, MockWorkflowExecutor};
use chrono::Utc;
use std::sync::Arc;

fn manager(
    provider: &InMemoryStateStoreProvider,
    executor: MockWorkflowExecutor,
    publisher: MockPublisher,
) -> ExecutionManager {
    let store = Arc::new(InMemoryContentStore::new());
    ExecutionManager::new(
        provider.create_repositories(),
        Arc::new(ApplicationConfig::default()),
        store.clone(),
        Arc::new(InlineRemoteUrl::new(store)),
        Arc::new(executor),
        Arc::new(StaticQueueConfig::new(QueueConfig::default())),
        Arc::new(publisher),
        Arc::new(InMemoryMetricsCollector::new()),
    )
}

#[tokio::test]
async fn test_publishes_once_per_triggered_setting() -> Result<(), CoreError> {
    let provider = InMemoryStateStoreProvider::new();
    let workflow = WorkflowBuilder::new("wf").build();
    let launch_plan = LaunchPlanBuilder::new("lp", &workflow.id)
        .notification(NotificationSetting::email(
            vec![WorkflowExecutionPhase::Failed],
            vec!["oncall@x.com".to_string()],
        ))
        .notification(NotificationSetting::pager(
            vec![WorkflowExecutionPhase::Succeeded],
            vec!["pager@x.com".to_string()],
        ))
        .build();
    let lp = launch_plan.id.clone();
    provider.add_workflow(workflow).await;
    provider.add_launch_plan(launch_plan).await;

    let mut publisher = MockPublisher::new();
    publisher
        .expect_publish()
        .withf(|notification_type, message| {
            notification_type.to_string() == EMAIL_NOTIFICATION_TYPE && message.recipients_email == vec!["pager@x.com".to_string()]
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let manager = manager(&provider, accepting_executor("cluster-7"), publisher);
    let id = manager
        .create_execution(create_request("run-1", &lp, LiteralMap::new()), Utc::now())
        .await?;
    manager
        .record_execution_event(execution_event(&id, "r1", WorkflowExecutionPhase::Succeeded))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_dispatch_error_skips_persistence() {
    let provider = InMemoryStateStoreProvider::new();
    let workflow = WorkflowBuilder::new("wf").build();
    let launch_plan = LaunchPlanBuilder::new("lp", &workflow.id).build();
    let lp = launch_plan.id.clone();
    provider.add_workflow(workflow).await;
    provider.add_launch_plan(launch_plan).await;

    let mut executor = MockWorkflowExecutor::new();
    executor
        .expect_execute_workflow()
        .times(1)
        .returning(|_| Err(CoreError::WorkflowExecutorError("no capacity".to_string())));
    executor.expect_terminate_workflow_execution().never();
    let mut publisher = MockPublisher::new();
    publisher.expect_publish().never();

    let manager = manager(&provider, executor, publisher);
    let error = manager
        .create_execution(create_request("run-1", &lp, LiteralMap::new()), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(error, CoreError::WorkflowExecutorError(_)));
    assert_eq!(provider.execution_count().await, 0);
}
