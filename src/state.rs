use crate::config::settings::AppConfig;
use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::infrastructure::storage::local::LocalStorage;
use crate::modules::analysis::events::JobPublisher;
use crate::modules::analysis::repository::JobStore;
use crate::pipeline::AnalysisPipeline;
use std::sync::Arc;

/// Handles shared by every API request.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub jobs: Arc<dyn JobStore>,
    pub publisher: Arc<dyn JobPublisher>,
    pub storage: LocalStorage,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        jobs: Arc<dyn JobStore>,
        publisher: Arc<dyn JobPublisher>,
        storage: LocalStorage,
    ) -> Self {
        Self {
            config,
            jobs,
            publisher,
            storage,
        }
    }
}

/// Handles owned by one worker process.
#[derive(Clone)]
pub struct WorkerState {
    pub config: AppConfig,
    pub jobs: Arc<dyn JobStore>,
    pub queue: RabbitMqService,
    pub storage: LocalStorage,
    pub pipeline: Arc<AnalysisPipeline>,
}
