use admiral_core::domain::notification::{EmailMessage, EMAIL_NOTIFICATION_TYPE};
use admiral_core::Publisher;
use admiral_monitoring::metrics::InMemoryMetricsCollector;
use admiral_notifications::processor::{
    CHANNEL_CLOSED_ERROR, MESSAGE_DATA_ERROR, MESSAGE_DECODING_ERROR, MESSAGE_DONE_ERROR, MESSAGE_OK,
    MESSAGE_PROCESSING_ERROR, MESSAGE_TOTAL, STOP_ERROR,
};
use admiral_notifications::{envelope, topic, NotificationError, NotificationProcessor, Subscriber};
use admiral_test_utils::{MockEmailer, RecordingEmailer, RecordingSubscriber};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn message(recipient: &str) -> EmailMessage {
    EmailMessage {
        recipients_email: vec![recipient.to_string()],
        sender_email: "admiral@x.com".to_string(),
        subject_line: "Execution finished".to_string(),
        body: "done".to_string(),
    }
}

#[tokio::test]
async fn test_delivers_until_channel_closes() {
    admiral_test_utils::init_test_logging();
    let (publisher, subscriber) = topic(16);
    let subscriber = Arc::new(RecordingSubscriber::new(subscriber));
    let emailer = Arc::new(RecordingEmailer::new());
    let metrics = Arc::new(InMemoryMetricsCollector::new());

    publisher.publish(EMAIL_NOTIFICATION_TYPE, &message("a@x.com")).await.unwrap();
    publisher.publish(EMAIL_NOTIFICATION_TYPE, &message("b@x.com")).await.unwrap();
    drop(publisher);

    let processor = NotificationProcessor::new(subscriber.clone(), emailer.clone(), metrics.clone());
    processor.run().await.unwrap();

    assert_eq!(emailer.sent(), vec![message("a@x.com"), message("b@x.com")]);
    assert_eq!(subscriber.acked(), vec![1, 2]);
    assert_eq!(metrics.value(MESSAGE_TOTAL), 2.0);
    assert_eq!(metrics.value(MESSAGE_OK), 2.0);
}

#[tokio::test]
async fn test_poison_messages_are_acked_and_counted() {
    let (publisher, subscriber) = topic(16);
    let subscriber = Arc::new(RecordingSubscriber::new(subscriber));
    let emailer = Arc::new(RecordingEmailer::new());
    let metrics = Arc::new(InMemoryMetricsCollector::new());

    let poison = [
        b"not json".to_vec(),
        br#"{"Type":"email_notification"}"#.to_vec(),
        br#"{"Message":42}"#.to_vec(),
        br#"{"Message":"%%% not base64"}"#.to_vec(),
        format!(r#"{{"Message":"{}"}}"#, base64::encode(b"\"just a string\"")).into_bytes(),
    ];
    for body in poison {
        publisher.publish_raw(body).await.unwrap();
    }
    publisher
        .publish_raw(envelope::encode(EMAIL_NOTIFICATION_TYPE, &message("a@x.com")).unwrap())
        .await
        .unwrap();
    drop(publisher);

    NotificationProcessor::new(subscriber.clone(), emailer.clone(), metrics.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(metrics.value(MESSAGE_TOTAL), 6.0);
    assert_eq!(metrics.value(MESSAGE_DECODING_ERROR), 3.0);
    assert_eq!(metrics.value(MESSAGE_DATA_ERROR), 2.0);
    assert_eq!(metrics.value(MESSAGE_OK), 1.0);
    assert_eq!(subscriber.acked(), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(emailer.sent(), vec![message("a@x.com")]);
}

#[tokio::test]
async fn test_send_failures_are_acked() {
    let (publisher, subscriber) = topic(16);
    let subscriber = Arc::new(RecordingSubscriber::new(subscriber));
    let metrics = Arc::new(InMemoryMetricsCollector::new());

    let mut emailer = MockEmailer::new();
    emailer
        .expect_send_email()
        .times(2)
        .returning(|_| Err(NotificationError::Emailer("smtp down".to_string())));

    publisher.publish(EMAIL_NOTIFICATION_TYPE, &message("a@x.com")).await.unwrap();
    publisher.publish(EMAIL_NOTIFICATION_TYPE, &message("b@x.com")).await.unwrap();
    drop(publisher);

    NotificationProcessor::new(subscriber.clone(), Arc::new(emailer), metrics.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(metrics.value(MESSAGE_PROCESSING_ERROR), 2.0);
    assert_eq!(metrics.value(MESSAGE_OK), 0.0);
    assert_eq!(subscriber.acked(), vec![1, 2]);
}

#[tokio::test]
async fn test_ack_failures_are_counted() {
    let (publisher, subscriber) = topic(16);
    let subscriber = Arc::new(RecordingSubscriber::new(subscriber));
    let emailer = Arc::new(RecordingEmailer::new());
    let metrics = Arc::new(InMemoryMetricsCollector::new());
    subscriber.fail_acks("lease expired");

    publisher.publish(EMAIL_NOTIFICATION_TYPE, &message("a@x.com")).await.unwrap();
    drop(publisher);

    NotificationProcessor::new(subscriber.clone(), emailer.clone(), metrics.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(metrics.value(MESSAGE_DONE_ERROR), 1.0);
    assert_eq!(emailer.sent().len(), 1);
    assert!(subscriber.acked().is_empty());
}

#[tokio::test]
async fn test_returns_subscriber_error() {
    let (_publisher, subscriber) = topic(16);
    let subscriber = Arc::new(subscriber);
    let metrics = Arc::new(InMemoryMetricsCollector::new());
    let processor = NotificationProcessor::new(subscriber.clone(), Arc::new(RecordingEmailer::new()), metrics.clone());

    subscriber.close_with_error(NotificationError::Subscriber("connection reset".to_string()));
    let result = processor.run().await;

    assert_eq!(
        result,
        Err(NotificationError::Subscriber("connection reset".to_string()))
    );
    assert_eq!(metrics.value(CHANNEL_CLOSED_ERROR), 1.0);
}

#[tokio::test]
async fn test_stop_ends_the_loop() {
    let (_publisher, subscriber) = topic(16);
    let subscriber = Arc::new(subscriber);
    let metrics = Arc::new(InMemoryMetricsCollector::new());
    let processor = Arc::new(NotificationProcessor::new(
        subscriber.clone(),
        Arc::new(RecordingEmailer::new()),
        metrics.clone(),
    ));

    let running = tokio::spawn({
        let processor = processor.clone();
        async move { processor.run().await }
    });
    processor.stop().await.unwrap();
    assert_eq!(running.await.unwrap(), Ok(()));

    // A second stop is refused and counted.
    assert!(processor.stop().await.is_err());
    assert_eq!(metrics.value(STOP_ERROR), 1.0);
    assert_eq!(subscriber.terminal_error(), None);
}
