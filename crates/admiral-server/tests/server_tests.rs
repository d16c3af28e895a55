use admiral_core::application::metrics::PUBLISH_ERROR;
use admiral_core::config::QueueConfig;
use admiral_core::domain::execution::{ExecutionRelaunchRequest, ExecutionTerminateRequest, ResourceListRequest};
use admiral_core::domain::literal::LiteralMap;
use admiral_core::domain::node_execution::NodeExecutionListRequest;
use admiral_core::domain::notification::NotificationSetting;
use admiral_core::{ErrorKind, NodeExecutionPhase, QueueConfigProvider, WorkflowExecutionPhase};
use admiral_monitoring::InMemoryMetricsCollector;
use admiral_notifications::processor::MESSAGE_OK;
use admiral_server::{AdmiralServer, FileQueueConfigProvider, ServerConfig, ServerError};
use admiral_test_utils::builders::{
    container_task, create_request, execution_event, failed_event, node_event, node_id, LaunchPlanBuilder, WorkflowBuilder,
};
use admiral_test_utils::RecordingEmailer;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const GPU_QUEUES: &str = r#"
executionQueues:
  - primary: gpu_primary
    dynamic: gpu_dynamic
    attributes: [gpu]
"#;

/// A file under the temp dir unique to this process and test
fn temp_file(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("admiral-{}-{}", std::process::id(), name));
    std::fs::write(&path, contents).unwrap();
    path
}

fn build(config: ServerConfig) -> (AdmiralServer, Arc<InMemoryMetricsCollector>, Arc<RecordingEmailer>) {
    let metrics = Arc::new(InMemoryMetricsCollector::new());
    let emailer = Arc::new(RecordingEmailer::new());
    let server = AdmiralServer::build_with(config, metrics.clone(), emailer.clone()).unwrap();
    (server, metrics, emailer)
}

#[test]
fn test_config_file_overrides_defaults() {
    let path = temp_file(
        "server.yaml",
        r#"
default_cluster: cluster-9
storage_base: mem://fleet
queue_refresh_interval_secs: 5
application:
  metadata_prefix: meta
  registration:
    max_label_entries: 4
"#,
    );

    let config = ServerConfig::load_from(path.to_str()).unwrap();
    assert_eq!(config.default_cluster, "cluster-9");
    assert_eq!(config.storage_base, "mem://fleet");
    assert_eq!(config.queue_refresh_interval(), Duration::from_secs(5));
    assert_eq!(config.application.metadata_prefix, "meta");
    assert_eq!(config.application.registration.max_label_entries, 4);
    // Untouched sections keep their defaults.
    assert_eq!(config.application.background_workers, 16);
    assert_eq!(config.notification_queue_capacity, 1024);
    std::fs::remove_file(path).unwrap();
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let path = temp_file("invalid.yaml", "queue_refresh_interval_secs: 0\n");
    assert!(matches!(
        ServerConfig::load_from(path.to_str()),
        Err(ServerError::ConfigError(_))
    ));
    std::fs::remove_file(path).unwrap();

    let missing = std::env::temp_dir().join("admiral-does-not-exist.yaml");
    assert!(ServerConfig::load_from(missing.to_str()).is_err());
}

#[test]
fn test_queue_reload_keeps_last_good_rules() {
    let path = temp_file("queues.yaml", GPU_QUEUES);
    let provider = FileQueueConfigProvider::load(&path).unwrap();
    let first = provider.snapshot();
    assert_eq!(first.execution_queues[0].primary, "gpu_primary");

    std::fs::write(&path, "executionQueues: {primary").unwrap();
    assert!(!provider.reload());
    assert!(Arc::ptr_eq(&first, &provider.snapshot()));

    std::fs::write(&path, "").unwrap();
    assert!(provider.reload());
    assert_eq!(*provider.snapshot(), QueueConfig::default());
    // A snapshot taken before the reload is unaffected.
    assert_eq!(first.execution_queues.len(), 1);

    assert!(!provider.reload());
    std::fs::remove_file(path).unwrap();
}

#[test]
fn test_missing_queue_file_fails_startup() {
    let config = ServerConfig {
        queue_config_path: Some("/nonexistent/admiral/queues.yaml".to_string()),
        ..Default::default()
    };
    let result = AdmiralServer::build_with(
        config,
        Arc::new(InMemoryMetricsCollector::new()),
        Arc::new(RecordingEmailer::new()),
    );
    assert!(matches!(result, Err(ServerError::QueueConfigError(_))));
}

#[tokio::test]
async fn test_execution_lifecycle_through_service() {
    admiral_test_utils::init_test_logging();
    let path = temp_file("lifecycle-queues.yaml", GPU_QUEUES);
    let (server, _metrics, _emailer) = build(ServerConfig {
        default_cluster: "cluster-9".to_string(),
        storage_base: "mem://fleet".to_string(),
        queue_config_path: path.to_str().map(str::to_string),
        ..Default::default()
    });
    let workflow = WorkflowBuilder::new("wf").task(container_task("train", &["gpu"])).build();
    let launch_plan = LaunchPlanBuilder::new("lp", &workflow.id).build();
    let lp = launch_plan.id.clone();
    server.state.add_workflow(workflow).await;
    server.state.add_launch_plan(launch_plan).await;

    let id = server
        .service
        .create_execution(create_request("run-1", &lp, LiteralMap::new()))
        .await
        .unwrap();
    let execution = server.service.get_execution(&id).await.unwrap();
    assert_eq!(execution.closure.cluster, "cluster-9");
    assert_eq!(execution.closure.phase, WorkflowExecutionPhase::Undefined);

    let data = server.service.get_execution_data(&id).await.unwrap();
    assert_eq!(data.inputs.url, "mem://fleet/metadata/project/development/run-1/inputs");

    server
        .service
        .record_node_event(node_event(&node_id("run-1", "n0"), "n1", NodeExecutionPhase::Running))
        .await
        .unwrap();
    let node = server.service.get_node_execution(&node_id("run-1", "n0")).await.unwrap();
    assert_eq!(node.closure.phase, NodeExecutionPhase::Running);

    server
        .service
        .terminate_execution(ExecutionTerminateRequest {
            id: id.clone(),
            cause: "no longer needed".to_string(),
        })
        .await
        .unwrap();
    let execution = server.service.get_execution(&id).await.unwrap();
    assert_eq!(execution.closure.abort_cause.as_deref(), Some("no longer needed"));

    server
        .service
        .record_execution_event(failed_event(&id, "r1", "aborted"))
        .await
        .unwrap();
    let error = server
        .service
        .record_execution_event(execution_event(&id, "r2", WorkflowExecutionPhase::Succeeded))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::FailedPrecondition);
    std::fs::remove_file(path).unwrap();
}

#[tokio::test]
async fn test_notifications_reach_the_emailer() {
    let (server, metrics, emailer) = build(ServerConfig::default());
    let workflow = WorkflowBuilder::new("wf").build();
    let launch_plan = LaunchPlanBuilder::new("lp", &workflow.id)
        .notification(NotificationSetting::email(
            vec![WorkflowExecutionPhase::Succeeded],
            vec!["oncall@x.com".to_string()],
        ))
        .build();
    let lp = launch_plan.id.clone();
    server.state.add_workflow(workflow).await;
    server.state.add_launch_plan(launch_plan).await;
    let running = server.start();

    let id = server
        .service
        .create_execution(create_request("run-1", &lp, LiteralMap::new()))
        .await
        .unwrap();
    server
        .service
        .record_execution_event(execution_event(&id, "r1", WorkflowExecutionPhase::Succeeded))
        .await
        .unwrap();

    for _ in 0..100 {
        if !emailer.sent().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let sent = emailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipients_email, vec!["oncall@x.com".to_string()]);
    assert_eq!(
        sent[0].subject_line,
        "Notice: Execution \"run-1\" has succeeded in \"development\"."
    );

    server.shutdown(running).await.unwrap();
    assert_eq!(metrics.value(MESSAGE_OK), 1.0);
}

#[tokio::test]
async fn test_full_notification_queue_does_not_hold_up_events() {
    let (server, metrics, emailer) = build(ServerConfig {
        notification_queue_capacity: 1,
        ..Default::default()
    });
    let workflow = WorkflowBuilder::new("wf").build();
    let launch_plan = LaunchPlanBuilder::new("lp", &workflow.id)
        .notification(NotificationSetting::email(
            vec![WorkflowExecutionPhase::Succeeded],
            vec!["oncall@x.com".to_string()],
        ))
        .build();
    let lp = launch_plan.id.clone();
    server.state.add_workflow(workflow).await;
    server.state.add_launch_plan(launch_plan).await;

    // Nothing consumes the topic, so the second notification finds it full.
    for name in ["run-1", "run-2"] {
        let id = server
            .service
            .create_execution(create_request(name, &lp, LiteralMap::new()))
            .await
            .unwrap();
        let recorded = tokio::time::timeout(
            Duration::from_secs(2),
            server
                .service
                .record_execution_event(execution_event(&id, "r1", WorkflowExecutionPhase::Succeeded)),
        )
        .await
        .expect("event waited on the notification queue");
        recorded.unwrap();
        assert_eq!(
            server.service.get_execution(&id).await.unwrap().closure.phase,
            WorkflowExecutionPhase::Succeeded
        );
    }

    assert_eq!(metrics.value(PUBLISH_ERROR), 1.0);
    assert!(emailer.sent().is_empty());
}

#[tokio::test]
async fn test_shutdown_without_traffic() {
    let (server, metrics, emailer) = build(ServerConfig::default());
    let running = server.start();
    server.shutdown(running).await.unwrap();
    assert!(emailer.sent().is_empty());
    assert_eq!(metrics.value(MESSAGE_OK), 0.0);
}

#[tokio::test]
async fn test_relaunch_and_listing_through_service() {
    let (server, _metrics, _emailer) = build(ServerConfig::default());
    let workflow = WorkflowBuilder::new("wf").build();
    let launch_plan = LaunchPlanBuilder::new("lp", &workflow.id).build();
    let lp = launch_plan.id.clone();
    server.state.add_workflow(workflow).await;
    server.state.add_launch_plan(launch_plan).await;

    let first = server
        .service
        .create_execution(create_request("run-1", &lp, LiteralMap::new()))
        .await
        .unwrap();
    let second = server
        .service
        .relaunch_execution(ExecutionRelaunchRequest {
            id: first.clone(),
            name: "run-2".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(second.name, "run-2");

    let page = server
        .service
        .list_executions(ResourceListRequest {
            project: first.project.clone(),
            domain: first.domain.clone(),
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.executions.len(), 2);
    assert_eq!(page.token, "");

    server
        .service
        .record_node_event(node_event(&node_id("run-2", "n0"), "n1", NodeExecutionPhase::Queued))
        .await
        .unwrap();
    let nodes = server
        .service
        .list_node_executions(NodeExecutionListRequest {
            workflow_execution_id: second,
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(nodes.node_executions.len(), 1);
}
