use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use crate::Result;

pub mod consumer;
pub mod sqlite;

pub use consumer::{ConsumerStats, QueueConsumer};
pub use sqlite::{QueueSettings, SqliteQueue};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub body: String,
    /// Deliveries so far, this one included.
    pub receive_count: u32,
}

/// At-least-once message queue. A received message stays hidden for the
/// visibility timeout and comes back unless it is deleted first.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the id assigned to the message.
    async fn send(&self, body: &str) -> Result<String>;

    async fn receive(&self, max_messages: usize) -> Result<Vec<QueueMessage>>;

    async fn delete(&self, message_id: &str) -> Result<()>;
}

#[async_trait]
impl<T: MessageQueue + ?Sized> MessageQueue for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn send(&self, body: &str) -> Result<String> {
        (**self).send(body).await
    }

    async fn receive(&self, max_messages: usize) -> Result<Vec<QueueMessage>> {
        (**self).receive(max_messages).await
    }

    async fn delete(&self, message_id: &str) -> Result<()> {
        (**self).delete(message_id).await
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

/// What a consumer reports back for one delivered batch. Only the listed
/// items are redelivered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl BatchResponse {
    pub fn fail(&mut self, message_id: impl Into<String>) {
        self.batch_item_failures.push(BatchItemFailure {
            item_identifier: message_id.into(),
        });
    }

    pub fn failed_ids(&self) -> HashSet<&str> {
        self.batch_item_failures
            .iter()
            .map(|failure| failure.item_identifier.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.batch_item_failures.is_empty()
    }
}

#[async_trait]
pub trait BatchHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle_batch(&self, messages: &[QueueMessage]) -> BatchResponse;
}
