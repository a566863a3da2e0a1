use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Message published on the analysis queue. Every artifact path is derived from
/// `content_id` on the worker side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub job_id: Uuid,
    pub content_id: Uuid,
}

#[async_trait]
pub trait JobPublisher: Send + Sync {
    async fn publish(&self, job: &AnalysisJob) -> Result<()>;
}

/// Publishes jobs as persistent JSON messages on a durable RabbitMQ queue.
#[derive(Clone)]
pub struct RabbitJobPublisher {
    mq: RabbitMqService,
    queue: String,
}

impl RabbitJobPublisher {
    pub fn new(mq: RabbitMqService, queue: impl Into<String>) -> Self {
        Self {
            mq,
            queue: queue.into(),
        }
    }
}

#[async_trait]
impl JobPublisher for RabbitJobPublisher {
    async fn publish(&self, job: &AnalysisJob) -> Result<()> {
        self.mq.publish_json(&self.queue, job).await?;
        info!("📤 Published analysis job {} for {}", job.job_id, job.content_id);
        Ok(())
    }
}
