use std::env;
use std::str::FromStr;

pub enum EnvKey {
    Host,
    Port,
    AmqpUrl,
    RedisUrl,
    AnalysisQueue,
    UploadDir,
    ResultDir,
    FfmpegBin,
    FfprobeBin,
    PoseDetectorCmd,
    MovenetModelPath,
    ResultPollIntervalMs,
    ResultPollTimeoutMs,
    JobTtlSecs,
    MaxUploadBytes,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::Host => "HOST",
            EnvKey::Port => "PORT",
            EnvKey::AmqpUrl => "AMQP_URL",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::AnalysisQueue => "ANALYSIS_QUEUE",
            EnvKey::UploadDir => "UPLOAD_DIR",
            EnvKey::ResultDir => "RESULT_DIR",
            EnvKey::FfmpegBin => "FFMPEG_BIN",
            EnvKey::FfprobeBin => "FFPROBE_BIN",
            EnvKey::PoseDetectorCmd => "POSE_DETECTOR_CMD",
            EnvKey::MovenetModelPath => "MOVENET_MODEL_PATH",
            EnvKey::ResultPollIntervalMs => "RESULT_POLL_INTERVAL_MS",
            EnvKey::ResultPollTimeoutMs => "RESULT_POLL_TIMEOUT_MS",
            EnvKey::JobTtlSecs => "JOB_TTL_SECS",
            EnvKey::MaxUploadBytes => "MAX_UPLOAD_BYTES",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
