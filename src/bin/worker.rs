use anyhow::{Context, anyhow};
use dotenvy::dotenv;
use posture_backend::config::settings::{AppConfig, MediaSettings};
use posture_backend::infrastructure::queue::rabbitmq::RabbitMqService;
use posture_backend::infrastructure::redis::client::RedisService;
use posture_backend::infrastructure::storage::local::LocalStorage;
use posture_backend::media::FfmpegCodec;
use posture_backend::modules::analysis::repository::RedisJobStore;
use posture_backend::pipeline::AnalysisPipeline;
use posture_backend::pose::DetectorBackend;
use posture_backend::state::WorkerState;
use posture_backend::workers::analyzer::start_analysis_worker;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "movenet")]
fn movenet_backend(media: &MediaSettings) -> Option<DetectorBackend> {
    media
        .movenet_model_path
        .clone()
        .map(|model_path| DetectorBackend::Movenet { model_path })
}

#[cfg(not(feature = "movenet"))]
fn movenet_backend(_media: &MediaSettings) -> Option<DetectorBackend> {
    None
}

fn detector_backend(media: &MediaSettings) -> anyhow::Result<DetectorBackend> {
    if let Some(backend) = movenet_backend(media) {
        return Ok(backend);
    }

    match &media.pose_detector_cmd {
        Some(command) => Ok(DetectorBackend::Pipe {
            command: command.clone(),
        }),
        None => Err(anyhow!("No pose detector configured, set POSE_DETECTOR_CMD")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting posture worker...");

    let config = AppConfig::new().context("Missing required environment variable")?;
    let detectors = detector_backend(&config.media)?;
    info!("Pose detector: {:?}", detectors);

    let storage = LocalStorage::new(&config.upload_dir, &config.result_dir);
    storage.ensure_dirs().await?;

    let redis = RedisService::new(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;
    let queue = RabbitMqService::new(&config.amqp_url).await?;

    let codec = FfmpegCodec::new(&config.media.ffmpeg_bin, &config.media.ffprobe_bin);
    let pipeline = AnalysisPipeline::new(Arc::new(codec), Arc::new(detectors));

    let state = WorkerState {
        jobs: Arc::new(RedisJobStore::new(redis, config.job_ttl_secs)),
        queue,
        storage,
        pipeline: Arc::new(pipeline),
        config,
    };

    start_analysis_worker(state).await
}
