use super::dto::{ResultResponse, StatusResponse, SubmitResponse};
use super::events::AnalysisJob;
use super::model::{AnalysisSummary, JobRecord, JobStatus};
use super::repository::JobRepository;
use crate::config::settings::PollSettings;
use crate::infrastructure::storage::local::ContentPaths;
use crate::state::AppState;
use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use futures_util::Stream;
use std::fmt::Display;
use std::path::Path;
use tokio::time::Instant;
use tracing::{error, info};
use url::Url;
use uuid::Uuid;

pub struct AnalysisService;

impl AnalysisService {
    /// Persists the upload under a fresh content id, records the job as queued
    /// and hands it to the workers. Nothing is returned unless all three succeed.
    pub async fn submit<S, E>(state: &AppState, upload: S) -> Result<SubmitResponse>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let (content_id, _) = state.storage.persist_upload(upload).await?;
        let job = AnalysisJob {
            job_id: Uuid::new_v4(),
            content_id,
        };

        if let Err(e) = state.jobs.save(&JobRecord::queued(job.job_id, content_id)).await {
            state.storage.remove_source(content_id).await;
            return Err(e.context("Failed to record job"));
        }

        if let Err(e) = state.publisher.publish(&job).await {
            error!("[{}] Failed to enqueue job {}: {}", content_id, job.job_id, e);
            let message = format!("Failed to enqueue job: {}", e);
            if let Err(mark) = JobRepository::transition(
                state.jobs.as_ref(),
                job.job_id,
                JobStatus::Failed,
                Some(message.clone()),
            )
            .await
            {
                error!("[{}] Failed to mark job {} as failed: {}", content_id, job.job_id, mark);
            }
            state.storage.remove_source(content_id).await;
            return Err(anyhow!(message));
        }

        info!("Queued job {} for content {}", job.job_id, content_id);
        Ok(SubmitResponse {
            job_id: job.job_id,
            content_id,
        })
    }

    pub async fn status(state: &AppState, job_id: Uuid) -> Result<Option<StatusResponse>> {
        Ok(state.jobs.find(job_id).await?.map(StatusResponse::from))
    }

    /// Waits up to the configured timeout for the summary of `content_id`.
    /// A missing summary is reported as still processing.
    pub async fn fetch_result(
        state: &AppState,
        content_id: Uuid,
        origin: &str,
    ) -> Result<ResultResponse> {
        let paths = state.storage.paths(content_id);
        if !wait_for_file(&paths.summary, state.config.poll).await {
            return Ok(ResultResponse::Processing);
        }

        let raw = tokio::fs::read(&paths.summary)
            .await
            .with_context(|| format!("Failed to read {}", paths.summary.display()))?;
        let result: AnalysisSummary = serde_json::from_slice(&raw)
            .with_context(|| format!("Malformed analysis result for {}", content_id))?;

        Ok(ResultResponse::Complete {
            result,
            video_url: video_url(origin, content_id)?,
        })
    }
}

/// Polls for `path` every `poll.interval()` until it exists or `poll.timeout()`
/// has elapsed.
pub async fn wait_for_file(path: &Path, poll: PollSettings) -> bool {
    let deadline = Instant::now() + poll.timeout();
    loop {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(poll.interval().min(deadline - now)).await;
    }
}

pub fn video_url(origin: &str, content_id: Uuid) -> Result<String> {
    let base = Url::parse(origin).map_err(|e| anyhow!("Invalid origin {}: {}", origin, e))?;
    let url = base.join(&format!(
        "results/{}",
        ContentPaths::final_video_name(content_id)
    ))?;
    Ok(url.to_string())
}
