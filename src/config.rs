use config::{Config, ConfigError, Environment, File};
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub queues: QueuesConfig,
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    pub mail: MailConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuesConfig {
    pub check_requests: String,
    pub notifications: String,
    pub batch_size: usize,
    pub visibility_timeout_secs: u64,
    pub max_receive_count: u32,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub max_concurrent_checks: usize,
    pub request_timeout: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Six-field cron expression (seconds first).
    pub scan_schedule: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    Smtp,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub from_address: String,
    pub from_name: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Where fetched documents are kept for non-unchanged checks. Disabled when unset.
    pub html_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl MailConfig {
    pub fn sender(&self) -> Result<Mailbox, ConfigError> {
        Mailbox::from_str(&format!("{} <{}>", self.from_name, self.from_address))
            .map_err(|e| ConfigError::Message(format!("Invalid mail from_address: {}", e)))
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, ignored by git
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("SITE_TRACKER").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if self.queues.check_requests.trim().is_empty() || self.queues.notifications.trim().is_empty() {
            return Err(ConfigError::Message("Queue names must not be empty".into()));
        }

        if self.queues.check_requests == self.queues.notifications {
            return Err(ConfigError::Message("Check-request and notification queues must differ".into()));
        }

        if self.queues.batch_size == 0 {
            return Err(ConfigError::Message("Queue batch_size must be greater than 0".into()));
        }

        if self.queues.max_receive_count == 0 {
            return Err(ConfigError::Message("Queue max_receive_count must be greater than 0".into()));
        }

        if self.scraper.max_concurrent_checks == 0 {
            return Err(ConfigError::Message("Scraper max_concurrent_checks must be greater than 0".into()));
        }

        if !Self::is_valid_cron(&self.scheduler.scan_schedule) {
            return Err(ConfigError::Message("Invalid cron expression in scheduler.scan_schedule".into()));
        }

        if self.mail.transport == MailTransport::Smtp {
            if self.mail.smtp_port == 0 {
                return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
            }
            self.mail.sender()?;
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }

    /// Shape check only; the scheduler does the full parse.
    pub fn is_valid_cron(cron_expr: &str) -> bool {
        let parts: Vec<&str> = cron_expr.split_whitespace().collect();
        if parts.len() != 6 {
            return false;
        }

        parts.iter().all(|part| {
            part.chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '*' | '-' | ',' | '/' | '?'))
        })
    }
}
