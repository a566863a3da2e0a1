use anyhow::Context;
use dotenvy::dotenv;
use posture_backend::app;
use posture_backend::config::settings::AppConfig;
use posture_backend::infrastructure::queue::rabbitmq::RabbitMqService;
use posture_backend::infrastructure::redis::client::RedisService;
use posture_backend::infrastructure::storage::local::LocalStorage;
use posture_backend::modules::analysis::events::RabbitJobPublisher;
use posture_backend::modules::analysis::repository::RedisJobStore;
use posture_backend::state::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting posture API...");

    let config = AppConfig::new().context("Missing required environment variable")?;

    let storage = LocalStorage::new(&config.upload_dir, &config.result_dir);
    storage.ensure_dirs().await?;

    let redis = RedisService::new(&config.redis_url)
        .await
        .context("Failed to connect to Redis")?;
    let queue = RabbitMqService::new(&config.amqp_url).await?;

    let state = AppState::new(
        config.clone(),
        Arc::new(RedisJobStore::new(redis, config.job_ttl_secs)),
        Arc::new(RabbitJobPublisher::new(queue, &config.analysis_queue)),
        storage,
    );
    let app = app::create_app(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
