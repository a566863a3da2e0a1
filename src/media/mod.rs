pub mod codec;
pub mod ffmpeg;
pub mod frame;
pub mod normalize;

pub use codec::{CodecError, FrameReader, FrameWriter, VideoCodec};
pub use ffmpeg::FfmpegCodec;
pub use frame::{Frame, FrameLayoutError, VideoInfo};
pub use normalize::normalize;
