use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use super::{MessageQueue, QueueMessage};
use crate::config::QueuesConfig;
use crate::Result;

#[derive(Debug, Clone, Copy)]
pub struct QueueSettings {
    pub visibility_timeout: Duration,
    /// Deliveries allowed before a message is parked on the dead-letter queue.
    pub max_receive_count: u32,
}

impl From<&QueuesConfig> for QueueSettings {
    fn from(config: &QueuesConfig) -> Self {
        Self {
            visibility_timeout: Duration::from_secs(config.visibility_timeout_secs),
            max_receive_count: config.max_receive_count,
        }
    }
}

#[derive(Debug, FromRow)]
struct MessageRow {
    seq: i64,
    message_id: String,
    body: String,
    receive_count: i64,
}

/// Queue kept in the `queue_messages` table, several named queues per database.
#[derive(Clone)]
pub struct SqliteQueue {
    pool: SqlitePool,
    name: String,
    dead_letter: String,
    settings: QueueSettings,
}

impl SqliteQueue {
    pub fn new(pool: SqlitePool, name: impl Into<String>, settings: QueueSettings) -> Self {
        let name = name.into();
        Self {
            pool,
            dead_letter: format!("{}-dead-letter", name),
            name,
            settings,
        }
    }

    pub fn dead_letter_name(&self) -> &str {
        &self.dead_letter
    }

    /// Messages in the queue, visible or not.
    pub async fn len(&self) -> Result<usize> {
        Self::count(&self.pool, &self.name).await
    }

    pub async fn dead_letter_len(&self) -> Result<usize> {
        Self::count(&self.pool, &self.dead_letter).await
    }

    async fn count(pool: &SqlitePool, queue: &str) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM queue_messages WHERE queue = ?")
            .bind(queue)
            .fetch_one(pool)
            .await?;
        Ok(count as usize)
    }
}

#[async_trait]
impl MessageQueue for SqliteQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, body: &str) -> Result<String> {
        let message_id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp_millis();

        sqlx::query(
            "INSERT INTO queue_messages (message_id, queue, body, receive_count, visible_at, enqueued_at)
             VALUES (?, ?, ?, 0, ?, ?)",
        )
        .bind(&message_id)
        .bind(&self.name)
        .bind(body)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(message_id)
    }

    async fn receive(&self, max_messages: usize) -> Result<Vec<QueueMessage>> {
        let now = Utc::now().timestamp_millis();
        let hidden_until = now + self.settings.visibility_timeout.as_millis() as i64;
        let max_receive_count = i64::from(self.settings.max_receive_count);

        // Single statements only: each takes the write lock up front and
        // waits on the busy timeout.
        let exhausted: Vec<(String, i64)> = sqlx::query_as(
            "UPDATE queue_messages SET queue = ?, visible_at = ?
             WHERE queue = ? AND visible_at <= ? AND receive_count >= ?
             RETURNING message_id, receive_count",
        )
        .bind(&self.dead_letter)
        .bind(now)
        .bind(&self.name)
        .bind(now)
        .bind(max_receive_count)
        .fetch_all(&self.pool)
        .await?;

        for (message_id, receive_count) in exhausted {
            warn!(
                queue = %self.name,
                %message_id,
                receive_count,
                "max receive count reached, moved to dead-letter queue"
            );
        }

        let mut rows: Vec<MessageRow> = sqlx::query_as(
            "UPDATE queue_messages SET receive_count = receive_count + 1, visible_at = ?
             WHERE seq IN (
                 SELECT seq FROM queue_messages
                 WHERE queue = ? AND visible_at <= ? AND receive_count < ?
                 ORDER BY seq
                 LIMIT ?
             )
             RETURNING seq, message_id, body, receive_count",
        )
        .bind(hidden_until)
        .bind(&self.name)
        .bind(now)
        .bind(max_receive_count)
        .bind(max_messages as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.sort_by_key(|row| row.seq);

        Ok(rows
            .into_iter()
            .map(|row| QueueMessage {
                message_id: row.message_id,
                body: row.body,
                receive_count: row.receive_count as u32,
            })
            .collect())
    }

    async fn delete(&self, message_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM queue_messages WHERE queue = ? AND message_id = ?")
            .bind(&self.name)
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
