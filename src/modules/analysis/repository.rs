use super::model::{JobRecord, JobStatus};
use crate::infrastructure::redis::client::RedisService;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

/// Job status registry shared by the API and the workers.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn save(&self, record: &JobRecord) -> Result<()>;

    async fn find(&self, job_id: Uuid) -> Result<Option<JobRecord>>;
}

#[derive(Clone)]
pub struct RedisJobStore {
    redis: RedisService,
    ttl_secs: u64,
}

impl RedisJobStore {
    pub fn new(redis: RedisService, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    fn key(job_id: Uuid) -> String {
        format!("posture_job:{}", job_id)
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn save(&self, record: &JobRecord) -> Result<()> {
        self.redis
            .set_json(&Self::key(record.job_id), record, self.ttl_secs)
            .await
    }

    async fn find(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        self.redis.get_json(&Self::key(job_id)).await
    }
}

pub struct JobRepository;

impl JobRepository {
    /// Moves a job to `next`, refusing transitions the lifecycle does not allow.
    pub async fn transition(
        store: &dyn JobStore,
        job_id: Uuid,
        next: JobStatus,
        message: Option<String>,
    ) -> Result<JobRecord> {
        let current = store
            .find(job_id)
            .await?
            .ok_or_else(|| anyhow!("Job not found: {}", job_id))?;

        if !current.status.can_transition_to(next) {
            warn!(
                "Refusing transition of job {} from {} to {}",
                job_id, current.status, next
            );
            return Err(anyhow!(
                "Job {} cannot move from {} to {}",
                job_id,
                current.status,
                next
            ));
        }

        let updated = current.advance(next, message);
        store.save(&updated).await?;
        Ok(updated)
    }
}
