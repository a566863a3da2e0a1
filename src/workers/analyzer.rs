use crate::infrastructure::storage::local::LocalStorage;
use crate::modules::analysis::events::AnalysisJob;
use crate::modules::analysis::model::{JobRecord, JobStatus};
use crate::modules::analysis::repository::{JobRepository, JobStore};
use crate::pipeline::AnalysisPipeline;
use crate::state::WorkerState;
use anyhow::Result;
use futures_util::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const CONSUMER_TAG: &str = "posture_worker";
const REQUEUE_DELAY: Duration = Duration::from_secs(2);
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// What to tell the broker about one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The job reached a terminal status, or the payload can never be processed.
    Ack,
    /// The registry could not record the outcome; hand the job back to the queue.
    Requeue,
}

/// Consumes the analysis queue one job at a time, resubscribing whenever the
/// consumer stream ends. Only fails when the broker cannot be reached at all.
pub async fn start_analysis_worker(state: WorkerState) -> Result<()> {
    let queue = state.config.analysis_queue.clone();

    loop {
        let mut consumer = state.queue.consume(&queue, CONSUMER_TAG).await?;
        info!("🧍 Analysis worker listening on '{}'", queue);

        while let Some(delivery) = consumer.next().await {
            let delivery = match delivery {
                Ok(d) => d,
                Err(e) => {
                    error!("Failed to receive delivery: {}", e);
                    continue;
                }
            };

            let disposition = handle_delivery(
                state.jobs.as_ref(),
                state.pipeline.clone(),
                &state.storage,
                &delivery.data,
            )
            .await;

            let settled = match disposition {
                Disposition::Ack => delivery.ack(BasicAckOptions::default()).await,
                Disposition::Requeue => {
                    tokio::time::sleep(REQUEUE_DELAY).await;
                    delivery
                        .nack(BasicNackOptions {
                            requeue: true,
                            ..BasicNackOptions::default()
                        })
                        .await
                }
            };
            if let Err(e) = settled {
                error!("Failed to settle delivery ({:?}): {}", disposition, e);
            }
        }

        warn!(
            "Analysis queue consumer closed, resubscribing in {:?}",
            RESUBSCRIBE_DELAY
        );
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}

/// Processes one raw delivery. Unparseable payloads are dropped; a job whose
/// status could not be recorded is requeued so it is never left dangling.
pub async fn handle_delivery(
    jobs: &dyn JobStore,
    pipeline: Arc<AnalysisPipeline>,
    storage: &LocalStorage,
    payload: &[u8],
) -> Disposition {
    let job = match serde_json::from_slice::<AnalysisJob>(payload) {
        Ok(job) => job,
        Err(e) => {
            error!("❌ Failed to parse job: {}", e);
            return Disposition::Ack;
        }
    };

    info!("📦 Received analysis job {}", job.job_id);
    match process_job(jobs, pipeline, storage, &job).await {
        Ok(status) => {
            info!("[{}] Job {} ended as {}", job.content_id, job.job_id, status);
            Disposition::Ack
        }
        Err(e) => {
            error!(
                "[{}] Job {} could not be recorded, requeueing: {:#}",
                job.content_id, job.job_id, e
            );
            Disposition::Requeue
        }
    }
}

/// Runs one job to a terminal status. Pipeline errors never escape: they are
/// logged with the content id and recorded as `failed`. Only registry errors
/// are returned.
pub async fn process_job(
    jobs: &dyn JobStore,
    pipeline: Arc<AnalysisPipeline>,
    storage: &LocalStorage,
    job: &AnalysisJob,
) -> Result<JobStatus> {
    let content_id = job.content_id;

    match jobs.find(job.job_id).await? {
        Some(record) if record.status.is_terminal() => {
            info!(
                "[{}] Job {} already {}, skipping redelivery",
                content_id, job.job_id, record.status
            );
            return Ok(record.status);
        }
        Some(record) if record.status == JobStatus::Running => {
            warn!("[{}] Job {} was interrupted, running it again", content_id, job.job_id);
        }
        Some(_) => {
            JobRepository::transition(jobs, job.job_id, JobStatus::Running, None).await?;
        }
        None => {
            warn!("[{}] No record for job {}, recreating it", content_id, job.job_id);
            jobs.save(&JobRecord::queued(job.job_id, content_id).advance(JobStatus::Running, None))
                .await?;
        }
    }

    info!("[{}] Job {} running", content_id, job.job_id);
    let paths = storage.paths(content_id);
    let outcome = tokio::task::spawn_blocking(move || pipeline.run(&paths))
        .await
        .map_err(|e| format!("Analysis task aborted: {}", e))
        .and_then(|r| r.map_err(|e| e.to_string()));

    let (next, message) = match outcome {
        Ok(summary) => {
            info!(
                "[{}] Analysis finished: {} frames, average angle {:.2}",
                content_id, summary.frames_analyzed, summary.average_angle
            );
            (JobStatus::Finished, None)
        }
        Err(message) => {
            error!("[{}] Analysis failed: {}", content_id, message);
            (JobStatus::Failed, Some(message))
        }
    };

    let record = JobRepository::transition(jobs, job.job_id, next, message).await?;
    Ok(record.status)
}
