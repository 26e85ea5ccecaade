use super::*;
use site_tracker::decision::Classification;
use site_tracker::models::{CheckRequest, Notification, NotificationStatus};
use site_tracker::queue::{ConsumerStats, MessageQueue};
use site_tracker::storage::SiteStore;

#[tokio::test]
async fn test_changed_value_reaches_owner() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve_page(&server, "/widget", &price_page("12")).await;
    let url = format!("{}/widget", server.uri());

    let sender = Arc::new(RecordingMailSender::default());
    let app = create_test_app(sender.clone()).await?;
    app.store.put(&create_test_site("s1", &url, "$10", "owner@example.com")).await?;

    assert_eq!(app.producer.scan().await?, 1);

    let stats = app.worker_consumer().poll_once().await?;
    assert_eq!(stats, ConsumerStats { received: 1, deleted: 1, failed: 0 });
    assert!(!app.store.get("s1").await?.eligible);

    let stats = app.mail_consumer().poll_once().await?;
    assert_eq!(stats.deleted, 1);

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "owner@example.com");
    assert_eq!(sent[0].subject, "Site Tracker");
    assert_eq!(
        sent[0].body,
        format!("Status: changed\n\n{}\n\nvalue changed from \"$10\" to \"12\"", url)
    );

    // Checked sites stay quiet until re-armed
    assert_eq!(app.producer.scan().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_unchanged_value_stays_eligible() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve_page(&server, "/widget", &price_page("10")).await;
    let url = format!("{}/widget", server.uri());

    let sender = Arc::new(RecordingMailSender::default());
    let app = create_test_app(sender.clone()).await?;
    app.store.put(&create_test_site("s1", &url, "10", "owner@example.com")).await?;

    app.producer.scan().await?;
    app.worker_consumer().poll_once().await?;

    assert!(app.store.get("s1").await?.eligible);
    assert_eq!(app.notifications.len().await?, 0);
    assert_eq!(app.producer.scan().await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_error_status_reports_failure() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let url = format!("{}/gone", server.uri());

    let sender = Arc::new(RecordingMailSender::default());
    let app = create_test_app(sender.clone()).await?;
    app.store.put(&create_test_site("s1", &url, "$10", "owner@example.com")).await?;

    app.producer.scan().await?;
    app.worker_consumer().poll_once().await?;

    let queued = app.notifications.receive(10).await?;
    let notification: Notification = serde_json::from_str(&queued[0].body)?;
    assert_eq!(notification.status, NotificationStatus::Failed);
    assert_eq!(notification.message, format!("{} returned 500", url));
    assert!(!app.store.get("s1").await?.eligible);
    Ok(())
}

#[tokio::test]
async fn test_missing_element_reports_failure() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve_page(&server, "/widget", "<html><body><p>Sold out</p></body></html>").await;
    let url = format!("{}/widget", server.uri());

    let sender = Arc::new(RecordingMailSender::default());
    let app = create_test_app(sender.clone()).await?;
    app.store.put(&create_test_site("s1", &url, "$10", "owner@example.com")).await?;

    app.producer.scan().await?;
    app.worker_consumer().poll_once().await?;
    app.mail_consumer().poll_once().await?;

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.starts_with("Status: failed\n\n"));
    assert!(sent[0].body.ends_with("selector not found"));
    Ok(())
}

#[tokio::test]
async fn test_regex_without_match_reports_na() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve_page(&server, "/widget", r#"<span class="price">call us</span>"#).await;
    let url = format!("{}/widget", server.uri());

    let sender = Arc::new(RecordingMailSender::default());
    let app = create_test_app(sender.clone()).await?;
    let site = create_test_site("s1", &url, "$10", "owner@example.com");

    let inspection = app.worker.inspect(&CheckRequest::from(&site)).await;
    assert_eq!(inspection.decision.classification, Classification::Changed);
    assert_eq!(
        inspection.decision.message.as_deref(),
        Some(r#"value changed from "$10" to "N/A""#)
    );
    Ok(())
}

#[tokio::test]
async fn test_malformed_item_does_not_fail_batch() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve_page(&server, "/a", &price_page("12")).await;
    serve_page(&server, "/b", &price_page("15")).await;

    let sender = Arc::new(RecordingMailSender::default());
    let app = create_test_app(sender.clone()).await?;
    let first = create_test_site("a", &format!("{}/a", server.uri()), "$10", "a@example.com");
    let third = create_test_site("b", &format!("{}/b", server.uri()), "$10", "b@example.com");
    app.store.put(&first).await?;
    app.store.put(&third).await?;

    app.check_requests.send(&serde_json::to_string(&CheckRequest::from(&first))?).await?;
    app.check_requests.send("this is not json").await?;
    app.check_requests.send(&serde_json::to_string(&CheckRequest::from(&third))?).await?;

    let stats = app.worker_consumer().poll_once().await?;
    assert_eq!(stats, ConsumerStats { received: 3, deleted: 3, failed: 0 });
    assert_eq!(app.check_requests.len().await?, 0);

    app.mail_consumer().poll_once().await?;
    let mut recipients: Vec<String> = sender.sent().into_iter().map(|m| m.to).collect();
    recipients.sort();
    assert_eq!(recipients, vec!["a@example.com", "b@example.com"]);
    Ok(())
}

#[tokio::test]
async fn test_rearm_with_new_expected_value() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve_page(&server, "/widget", &price_page("12")).await;
    let url = format!("{}/widget", server.uri());

    let sender = Arc::new(RecordingMailSender::default());
    let app = create_test_app(sender.clone()).await?;
    app.store.put(&create_test_site("s1", &url, "$10", "owner@example.com")).await?;

    app.producer.scan().await?;
    app.worker_consumer().poll_once().await?;
    assert_eq!(app.notifications.len().await?, 1);

    let site = app.store.rearm("s1", Some("12")).await?;
    assert!(site.eligible);
    assert_eq!(site.expected, "12");

    assert_eq!(app.producer.scan().await?, 1);
    app.worker_consumer().poll_once().await?;

    assert_eq!(app.notifications.len().await?, 1);
    assert!(app.store.get("s1").await?.eligible);
    Ok(())
}

#[tokio::test]
async fn test_check_unknown_site() -> anyhow::Result<()> {
    let sender = Arc::new(RecordingMailSender::default());
    let app = create_test_app(sender).await?;

    let report = app.worker.check_site("missing").await?;

    assert_eq!(report.decision.classification, Classification::Failed);
    assert_eq!(report.decision.message.as_deref(), Some("item not found"));
    assert_eq!(app.notifications.len().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_archive_keeps_changed_documents() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let html = price_page("12");
    serve_page(&server, "/widget", &html).await;
    let dir = tempfile::tempdir()?;

    let mut config = get_test_config();
    config.diagnostics.html_dir = Some(dir.path().to_string_lossy().into_owned());
    let app = create_test_app_with(config, Arc::new(RecordingMailSender::default())).await?;
    let url = format!("{}/widget", server.uri());
    app.store.put(&create_test_site("s1", &url, "$10", "owner@example.com")).await?;

    app.producer.scan().await?;
    app.worker_consumer().poll_once().await?;

    assert_eq!(std::fs::read_to_string(dir.path().join("s1.html"))?, html);
    Ok(())
}
