use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::models::Notification;
use crate::queue::{BatchHandler, BatchResponse, QueueMessage};
use crate::Result;

pub mod sender;

pub use sender::{LogMailSender, MailSender, SmtpMailSender};

pub const MAIL_SUBJECT: &str = "Site Tracker";

/// Consumes notifications and hands them to the mail sender.
pub struct Mailer {
    sender: Arc<dyn MailSender>,
    concurrency: usize,
}

impl Mailer {
    pub fn new(sender: Arc<dyn MailSender>, concurrency: usize) -> Self {
        Self {
            sender,
            concurrency: concurrency.max(1),
        }
    }

    pub fn format_body(notification: &Notification) -> String {
        format!(
            "Status: {}\n\n{}\n\n{}",
            notification.status, notification.url, notification.message
        )
    }

    pub async fn deliver(&self, notification: &Notification) -> Result<()> {
        let body = Self::format_body(notification);
        self.sender.send(&notification.email, MAIL_SUBJECT, &body).await
    }

    /// `None` when the message went out or was dropped, otherwise the id to redeliver.
    /// Only transient send errors are redelivered.
    async fn handle_message(&self, message: &QueueMessage) -> Option<String> {
        info!(message_id = %message.message_id, body = %message.body, "notification received");

        let notification: Notification = match serde_json::from_str(&message.body) {
            Ok(notification) => notification,
            Err(e) => {
                warn!(message_id = %message.message_id, "failed to parse notification, dropping: {}", e);
                metrics::counter!("site_tracker_mail_total", "result" => "dropped").increment(1);
                return None;
            }
        };

        match self.deliver(&notification).await {
            Ok(()) => {
                metrics::counter!("site_tracker_mail_total", "result" => "sent").increment(1);
                None
            }
            Err(e) if e.is_transient() => {
                error!(message_id = %message.message_id, to = %notification.email, "failed to send email: {}", e);
                metrics::counter!("site_tracker_mail_total", "result" => "error").increment(1);
                Some(message.message_id.clone())
            }
            Err(e) => {
                warn!(message_id = %message.message_id, to = %notification.email, "undeliverable email, dropping: {}", e);
                metrics::counter!("site_tracker_mail_total", "result" => "dropped").increment(1);
                None
            }
        }
    }
}

#[async_trait]
impl BatchHandler for Mailer {
    fn name(&self) -> &str {
        "mailer"
    }

    async fn handle_batch(&self, messages: &[QueueMessage]) -> BatchResponse {
        let deliveries: Vec<_> = messages.iter().map(|message| self.handle_message(message)).collect();
        let failures: Vec<Option<String>> = stream::iter(deliveries)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut response = BatchResponse::default();
        for message_id in failures.into_iter().flatten() {
            response.fail(message_id);
        }
        response
    }
}
