use super::frame::{Frame, VideoInfo};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("video file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed (exit code {exit_code:?}): {stderr}")]
    Execution {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to read stream info of {path}: {reason}")]
    Metadata { path: PathBuf, reason: String },

    #[error("frame {index} is {actual_width}x{actual_height}, writer expects {width}x{height}")]
    FrameSize {
        index: u64,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ordered frame stream of one opened video.
pub trait FrameReader: Send {
    fn info(&self) -> VideoInfo;

    /// Next frame in source order, `None` once the stream is exhausted.
    fn read_frame(&mut self) -> Result<Option<Frame>, CodecError>;
}

/// Encoder for one output container.
pub trait FrameWriter: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), CodecError>;

    /// Flushes and closes the container. Dropping a writer without calling this
    /// abandons the output.
    fn finish(self: Box<Self>) -> Result<(), CodecError>;
}

/// Decode/encode capability the pipeline runs against.
pub trait VideoCodec: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameReader>, CodecError>;

    fn create(&self, path: &Path, info: &VideoInfo) -> Result<Box<dyn FrameWriter>, CodecError>;

    /// Re-encodes `src` into a browser-playable container at `dst`.
    fn transcode_for_playback(&self, src: &Path, dst: &Path) -> Result<(), CodecError>;
}
