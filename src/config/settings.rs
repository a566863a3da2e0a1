use crate::config::env::{self, EnvKey};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ANALYSIS_QUEUE: &str = "posture_analysis";

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub amqp_url: String,
    pub redis_url: String,
    pub analysis_queue: String,
    pub upload_dir: PathBuf,
    pub result_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub job_ttl_secs: u64,
    pub poll: PollSettings,
    pub media: MediaSettings,
}

/// Bounded wait used by the result endpoint.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct PollSettings {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            timeout_ms: 30_000,
        }
    }
}

/// External tools and detector backend used by the worker.
#[derive(Clone, Debug, Deserialize)]
pub struct MediaSettings {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub pose_detector_cmd: Option<String>,
    pub movenet_model_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn new() -> Result<Self, std::env::VarError> {
        Ok(Self {
            host: env::get_or(EnvKey::Host, "0.0.0.0"),
            port: env::get_parsed(EnvKey::Port, 8000),
            amqp_url: env::get(EnvKey::AmqpUrl)?,
            redis_url: env::get(EnvKey::RedisUrl)?,
            analysis_queue: env::get_or(EnvKey::AnalysisQueue, DEFAULT_ANALYSIS_QUEUE),
            upload_dir: PathBuf::from(env::get_or(EnvKey::UploadDir, "./uploads")),
            result_dir: PathBuf::from(env::get_or(EnvKey::ResultDir, "./results")),
            max_upload_bytes: env::get_parsed(EnvKey::MaxUploadBytes, 500 * 1024 * 1024),
            job_ttl_secs: env::get_parsed(EnvKey::JobTtlSecs, 24 * 60 * 60),
            poll: PollSettings {
                interval_ms: env::get_parsed(EnvKey::ResultPollIntervalMs, 2_000),
                timeout_ms: env::get_parsed(EnvKey::ResultPollTimeoutMs, 30_000),
            },
            media: MediaSettings {
                ffmpeg_bin: env::get_or(EnvKey::FfmpegBin, "ffmpeg"),
                ffprobe_bin: env::get_or(EnvKey::FfprobeBin, "ffprobe"),
                pose_detector_cmd: env::get_opt(EnvKey::PoseDetectorCmd),
                movenet_model_path: env::get_opt(EnvKey::MovenetModelPath).map(PathBuf::from),
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Origin used for video links when the request carries no usable Host header.
    pub fn fallback_origin(&self) -> String {
        let host = if self.host == "0.0.0.0" { "localhost" } else { &self.host };
        format!("http://{}:{}", host, self.port)
    }
}
