use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::MailConfig;
use crate::utils::error::AppError;
use crate::Result;

/// Outbound mail capability: one plain-text message to one recipient.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

pub struct SmtpMailSender {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailSender {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let from = config.sender()?;

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .map_err(|e| AppError::Mail(format!("Invalid SMTP relay {}: {}", config.smtp_host, e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        }
        .port(config.smtp_port);

        let builder = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            from,
            transport: builder.build(),
        })
    }

    pub fn build_message(from: &Mailbox, to: &str, subject: &str, body: &str) -> Result<Message> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::Validation(format!("Invalid recipient '{}': {}", to, e)))?;

        Message::builder()
            .from(from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Mail(format!("Failed to build message: {}", e)))
    }
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = Self::build_message(&self.from, to, subject, body)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Mail(format!("Failed to send email: {}", e)))?;
        Ok(())
    }
}

/// Writes mail to the log instead of sending it.
pub struct LogMailSender {
    from: String,
}

impl LogMailSender {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            from: config.from_address.clone(),
        }
    }
}

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if to.trim().is_empty() {
            return Err(AppError::Validation("Missing recipient".to_string()));
        }
        info!(from = %self.from, to, subject, "mail:\n{}", body);
        Ok(())
    }
}
