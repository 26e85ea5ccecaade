use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{BatchHandler, MessageQueue};
use crate::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub received: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Feeds batches from a queue to a handler and deletes what the handler
/// did not report as failed.
pub struct QueueConsumer {
    queue: Arc<dyn MessageQueue>,
    handler: Arc<dyn BatchHandler>,
    batch_size: usize,
    poll_interval: Duration,
}

impl QueueConsumer {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        handler: Arc<dyn BatchHandler>,
        batch_size: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            handler,
            batch_size,
            poll_interval,
        }
    }

    pub async fn poll_once(&self) -> Result<ConsumerStats> {
        let messages = self.queue.receive(self.batch_size).await?;
        if messages.is_empty() {
            return Ok(ConsumerStats::default());
        }

        debug!(queue = self.queue.name(), handler = self.handler.name(), count = messages.len(), "received batch");
        let response = self.handler.handle_batch(&messages).await;
        let failed = response.failed_ids();

        let mut stats = ConsumerStats {
            received: messages.len(),
            ..Default::default()
        };

        for message in &messages {
            if failed.contains(message.message_id.as_str()) {
                stats.failed += 1;
                continue;
            }
            // Left in place, the message reappears after its visibility timeout
            match self.queue.delete(&message.message_id).await {
                Ok(()) => stats.deleted += 1,
                Err(e) => warn!(queue = self.queue.name(), message_id = %message.message_id, "failed to delete message: {}", e),
            }
        }

        Ok(stats)
    }

    /// Polls until the shutdown flag flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(queue = self.queue.name(), handler = self.handler.name(), "consumer started");

        while !*shutdown.borrow() {
            let idle = match self.poll_once().await {
                Ok(stats) => {
                    if stats.failed > 0 {
                        warn!(queue = self.queue.name(), failed = stats.failed, "batch had failed items");
                    }
                    stats.received == 0
                }
                Err(e) => {
                    error!(queue = self.queue.name(), "failed to receive messages: {}", e);
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!(queue = self.queue.name(), handler = self.handler.name(), "consumer stopped");
    }
}
