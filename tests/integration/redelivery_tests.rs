use super::*;
use site_tracker::models::{Notification, NotificationStatus};
use site_tracker::queue::{BatchHandler, MessageQueue};
use site_tracker::storage::SiteStore;

fn notification(email: &str) -> String {
    serde_json::to_string(&Notification {
        email: email.to_string(),
        url: "https://shop.example.com/widget".to_string(),
        message: r#"value changed from "$10" to "12""#.to_string(),
        status: NotificationStatus::Changed,
    })
    .unwrap()
}

#[tokio::test]
async fn test_failed_delivery_is_retried() -> anyhow::Result<()> {
    let sender = Arc::new(RecordingMailSender::rejecting("broken@example.com"));
    let app = create_test_app(sender.clone()).await?;

    app.notifications.send(&notification("owner@example.com")).await?;
    app.notifications.send(&notification("broken@example.com")).await?;

    let stats = app.mail_consumer().poll_once().await?;
    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.failed, 1);

    let redelivered = app.notifications.receive(10).await?;
    assert_eq!(redelivered.len(), 1);
    assert!(redelivered[0].body.contains("broken@example.com"));
    assert_eq!(redelivered[0].receive_count, 2);
    assert_eq!(sender.sent().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_undeliverable_mail_is_dead_lettered() -> anyhow::Result<()> {
    let sender = Arc::new(RecordingMailSender::rejecting("broken@example.com"));
    let app = create_test_app(sender).await?;
    app.notifications.send(&notification("broken@example.com")).await?;

    // max_receive_count is 3 in the test config
    for _ in 0..3 {
        assert_eq!(app.mail_consumer().poll_once().await?.failed, 1);
    }
    assert_eq!(app.mail_consumer().poll_once().await?.received, 0);

    assert_eq!(app.notifications.len().await?, 0);
    assert_eq!(app.notifications.dead_letter_len().await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_malformed_notification_is_dropped() -> anyhow::Result<()> {
    let sender = Arc::new(RecordingMailSender::default());
    let app = create_test_app(sender.clone()).await?;
    app.notifications.send("{\"email\": ").await?;

    let stats = app.mail_consumer().poll_once().await?;

    assert_eq!(stats.deleted, 1);
    assert_eq!(app.notifications.len().await?, 0);
    assert!(sender.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_redelivered_check_request_is_harmless() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve_page(&server, "/widget", &price_page("12")).await;
    let url = format!("{}/widget", server.uri());

    let sender = Arc::new(RecordingMailSender::default());
    let app = create_test_app(sender.clone()).await?;
    app.store.put(&create_test_site("s1", &url, "$10", "owner@example.com")).await?;
    app.producer.scan().await?;

    // Handle the same delivery twice, as after a lost delete
    let batch = app.check_requests.receive(10).await?;
    assert!(app.worker.handle_batch(&batch).await.is_empty());
    assert!(app.worker.handle_batch(&batch).await.is_empty());

    assert!(!app.store.get("s1").await?.eligible);
    assert_eq!(app.notifications.len().await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_pipeline_runs_until_shutdown() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve_page(&server, "/widget", &price_page("12")).await;
    let url = format!("{}/widget", server.uri());

    let sender = Arc::new(RecordingMailSender::default());
    let app = create_test_app(sender.clone()).await?;
    app.store.put(&create_test_site("s1", &url, "$10", "owner@example.com")).await?;
    app.producer.scan().await?;

    let (tx, rx) = tokio::sync::watch::channel(false);
    let worker = Arc::new(app.worker_consumer());
    let mailer = Arc::new(app.mail_consumer());
    let handles = vec![
        tokio::spawn({
            let rx = rx.clone();
            async move { worker.run(rx).await }
        }),
        tokio::spawn(async move { mailer.run(rx).await }),
    ];

    let delivered = {
        let sender = sender.clone();
        wait_for(move || !sender.sent().is_empty(), 5).await
    };
    tx.send(true)?;
    for handle in handles {
        handle.await?;
    }

    assert!(delivered);
    assert_eq!(sender.sent().len(), 1);
    Ok(())
}

async fn wait_for<F: Fn() -> bool>(condition: F, timeout_seconds: u64) -> bool {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(timeout_seconds);
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    false
}
