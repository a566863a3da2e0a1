use crate::media::{CodecError, FrameLayoutError};
use crate::pose::DetectorError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("video file not found at: {0}")]
    SourceMissing(PathBuf),

    #[error("failed to open video: {0}")]
    Open(#[source] CodecError),

    #[error("color conversion failed: {0}")]
    ColorConversion(#[from] FrameLayoutError),

    #[error("pose detector unavailable: {0}")]
    DetectorSetup(#[source] DetectorError),

    #[error("pose detection failed at frame {index}: {source}")]
    Detection {
        index: u64,
        #[source]
        source: DetectorError,
    },

    #[error("failed to write overlay video: {0}")]
    Encode(#[source] CodecError),

    #[error("decoding failed: {0}")]
    Decode(#[source] CodecError),

    #[error("finishing transcode failed: {0}")]
    Finishing(#[source] CodecError),

    #[error("failed to write summary: {0}")]
    Summary(#[from] std::io::Error),

    #[error("failed to serialize summary: {0}")]
    Serialize(#[from] serde_json::Error),
}
