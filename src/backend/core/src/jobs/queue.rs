//! Task-message queue for the async worker (C6, §5, §6).

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{CoreError, Result};
use crate::hooks::PayloadRef;
use crate::jobs::job::{JobId, JobMetadata};

/// The C6 queue payload wire format (§6): field names and shape are part of
/// the contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMessage {
    pub job_id: JobId,
    #[serde(default)]
    pub parent_job_id: Option<JobId>,
    pub root_input_id: String,
    pub plugin_id: String,
    pub hook: String,
    #[serde(default)]
    pub payload_ref: Option<PayloadRef>,
    pub metadata: JobMetadata,
}

/// A queue backend supporting time-bounded dequeue (§5): a `None` result
/// within the timeout means "idle, continue polling" and is not an error.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn push(&self, message: TaskMessage) -> Result<()>;
    async fn pop_timeout(&self, timeout: Duration) -> Result<Option<TaskMessage>>;
}

/// In-process queue for tests and single-binary hosts.
pub struct InMemoryJobQueue {
    queue: Mutex<VecDeque<TaskMessage>>,
    notify: tokio::sync::Notify,
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: tokio::sync::Notify::new(),
        }
    }
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn push(&self, message: TaskMessage) -> Result<()> {
        self.queue.lock().await.push_back(message);
        self.notify.notify_one();
        Ok(())
    }

    async fn pop_timeout(&self, timeout: Duration) -> Result<Option<TaskMessage>> {
        if let Some(message) = self.queue.lock().await.pop_front() {
            return Ok(Some(message));
        }
        let wait = self.notify.notified();
        if tokio::time::timeout(timeout, wait).await.is_err() {
            return Ok(None);
        }
        Ok(self.queue.lock().await.pop_front())
    }
}

/// Redis-backed queue backend: `RPUSH`/`BLPOP` against a single list key,
/// mirroring the teacher's Redis queue pattern.
pub struct RedisJobQueue {
    client: redis::Client,
    queue_key: String,
}

impl RedisJobQueue {
    pub fn new(client: redis::Client, queue_key: impl Into<String>) -> Self {
        Self {
            client,
            queue_key: queue_key.into(),
        }
    }

    async fn get_conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CoreError::backend_failure(format!("redis connection failed: {e}")))
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn push(&self, message: TaskMessage) -> Result<()> {
        let serialized = serde_json::to_string(&message)?;
        let mut conn = self.get_conn().await?;
        redis::cmd("RPUSH")
            .arg(&self.queue_key)
            .arg(&serialized)
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(|e| CoreError::backend_failure(format!("redis RPUSH failed: {e}")))?;
        Ok(())
    }

    async fn pop_timeout(&self, timeout: Duration) -> Result<Option<TaskMessage>> {
        let mut conn = self.get_conn().await?;
        let timeout_secs = timeout.as_secs().max(1);
        let result: Option<(String, String)> = redis::cmd("BLPOP")
            .arg(&self.queue_key)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| CoreError::backend_failure(format!("redis BLPOP failed: {e}")))?;

        match result {
            Some((_key, value)) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message() -> TaskMessage {
        TaskMessage {
            job_id: JobId::new(),
            parent_job_id: None,
            root_input_id: "root".to_string(),
            plugin_id: "p1".to_string(),
            hook: "ingest".to_string(),
            payload_ref: None,
            metadata: JobMetadata::new(Utc::now()),
        }
    }

    #[tokio::test]
    async fn push_then_pop_returns_the_message() {
        let queue = InMemoryJobQueue::new();
        let msg = message();
        let id = msg.job_id;
        queue.push(msg).await.unwrap();
        let popped = queue.pop_timeout(Duration::from_millis(50)).await.unwrap().unwrap();
        assert_eq!(popped.job_id, id);
    }

    #[tokio::test]
    async fn pop_on_empty_queue_times_out_to_none() {
        let queue = InMemoryJobQueue::new();
        let popped = queue.pop_timeout(Duration::from_millis(20)).await.unwrap();
        assert!(popped.is_none());
    }
}
