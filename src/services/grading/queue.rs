use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::redis::RedisHandle;

/// Message published for the worker; grading is keyed by submission id only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GradingJob {
    pub(crate) submission_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) enqueued_at: OffsetDateTime,
}

impl GradingJob {
    pub(crate) fn new(submission_id: &str) -> Self {
        Self { submission_id: submission_id.to_string(), enqueued_at: OffsetDateTime::now_utc() }
    }
}

#[derive(Debug, Error)]
pub(crate) enum QueueError {
    #[error("queue backend error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to encode grading job: {0}")]
    Codec(#[from] serde_json::Error),
}

#[async_trait]
pub(crate) trait GradingQueue: Send + Sync {
    /// Fire-and-forget publish of a grading job.
    async fn publish(&self, job: &GradingJob) -> Result<(), QueueError>;
}

#[derive(Clone)]
pub(crate) struct RedisGradingQueue {
    redis: RedisHandle,
    queue_name: String,
}

impl RedisGradingQueue {
    pub(crate) fn new(redis: RedisHandle, queue_name: impl Into<String>) -> Self {
        Self { redis, queue_name: queue_name.into() }
    }

    /// Takes the oldest job off the queue, if any.
    pub(crate) async fn pop(&self) -> Result<Option<GradingJob>, QueueError> {
        let Some(raw) = self.redis.pop(&self.queue_name).await? else {
            return Ok(None);
        };

        Ok(Some(serde_json::from_str(&raw)?))
    }
}

#[async_trait]
impl GradingQueue for RedisGradingQueue {
    async fn publish(&self, job: &GradingJob) -> Result<(), QueueError> {
        let payload = serde_json::to_string(job)?;
        self.redis.push(&self.queue_name, &payload).await?;
        tracing::debug!(
            submission_id = %job.submission_id,
            queue = %self.queue_name,
            "Grading job published"
        );
        Ok(())
    }
}
