// Integration tests for Site Tracker
// These tests drive the scan, scrape and mail stages against a real
// database and a local HTTP server.

pub mod pipeline_tests;
pub mod redelivery_tests;

use async_trait::async_trait;
use std::sync::Mutex;
use site_tracker::{
    App, AppConfig, AppError,
    config::{
        DatabaseConfig, DiagnosticsConfig, LoggingConfig, MailConfig, MailTransport, MetricsConfig,
        QueuesConfig, SchedulerConfig, ScraperConfig,
    },
    mailer::MailSender,
    models::{NewTrackedSite, TrackedSite},
    scraper::HttpFetcher,
};

pub use std::sync::Arc;
pub use wiremock::matchers::{method, path};
pub use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test configuration for integration tests
pub fn get_test_config() -> AppConfig {
    AppConfig {
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        queues: QueuesConfig {
            check_requests: "check-requests".to_string(),
            notifications: "notifications".to_string(),
            batch_size: 10,
            // Undeleted messages come back on the next receive
            visibility_timeout_secs: 0,
            max_receive_count: 3,
            poll_interval_ms: 10,
        },
        scraper: ScraperConfig {
            max_concurrent_checks: 2,
            request_timeout: 5,
            user_agent: "SiteTracker-Test/1.0".to_string(),
        },
        scheduler: SchedulerConfig {
            scan_schedule: "0 0 * * * *".to_string(),
        },
        mail: MailConfig {
            transport: MailTransport::Log,
            from_address: "tracker@example.com".to_string(),
            from_name: "Site Tracker Test".to_string(),
            smtp_host: "localhost".to_string(),
            smtp_port: 2525,
            username: None,
            password: None,
            use_tls: false,
        },
        diagnostics: DiagnosticsConfig::default(),
        logging: LoggingConfig {
            level: "debug".to_string(),
            directory: None,
        },
        metrics: MetricsConfig {
            enabled: false,
            port: 9001,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Keeps every message instead of sending it. Fails for one chosen recipient.
#[derive(Default)]
pub struct RecordingMailSender {
    pub sent: Mutex<Vec<SentMail>>,
    pub reject: Option<String>,
}

impl RecordingMailSender {
    pub fn rejecting(recipient: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject: Some(recipient.to_string()),
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> site_tracker::Result<()> {
        if self.reject.as_deref() == Some(to) {
            return Err(AppError::Mail(format!("mailbox unavailable: {}", to)));
        }
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Create a fully wired app on a fresh in-memory database
pub async fn create_test_app(sender: Arc<RecordingMailSender>) -> anyhow::Result<App> {
    create_test_app_with(get_test_config(), sender).await
}

pub async fn create_test_app_with(config: AppConfig, sender: Arc<RecordingMailSender>) -> anyhow::Result<App> {
    let fetcher = Arc::new(HttpFetcher::new(&config.scraper)?);
    Ok(App::with_components(config, fetcher, sender).await?)
}

/// Serve an HTML page at the given path
pub async fn serve_page(server: &MockServer, page: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(ResponseTemplate::new(200).set_body_string(html.to_string()))
        .mount(server)
        .await;
}

pub fn price_page(price: &str) -> String {
    format!(
        r#"<html><body><h1>Widget</h1><span class="price">${}</span></body></html>"#,
        price
    )
}

/// Helper to create a tracked site watching `.price` for a dollar amount
pub fn create_test_site(id: &str, url: &str, expected: &str, email: &str) -> TrackedSite {
    TrackedSite::new(NewTrackedSite {
        url: url.to_string(),
        selector: ".price".to_string(),
        pattern: r"\$(\d+)".to_string(),
        expected: expected.to_string(),
        notify_target: email.to_string(),
    })
    .with_id(id)
}
