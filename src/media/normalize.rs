//! Resolution normalization ahead of pose analysis.
//!
//! Narrow inputs are upscaled onto a fixed 1280x720 @ 30 fps canvas. The step is
//! best-effort: it never fails the job. When the first frame cannot be read, or
//! the upscale itself fails, the original path is returned and analysis runs on
//! the untouched source.

use super::codec::{CodecError, VideoCodec};
use super::frame::VideoInfo;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const TARGET_WIDTH: u32 = 1280;
pub const TARGET_HEIGHT: u32 = 720;
pub const TARGET_FPS: f64 = 30.0;

/// Returns the path analysis should read from: `source` itself, or `target`
/// once a resized copy has been written there.
pub fn normalize(codec: &dyn VideoCodec, source: &Path, target: &Path) -> PathBuf {
    let first = codec.open(source).and_then(|mut reader| reader.read_frame());

    let width = match first {
        Ok(Some(frame)) => frame.width,
        Ok(None) => {
            warn!("No readable first frame in {}, skipping normalization", source.display());
            return source.to_path_buf();
        }
        Err(e) => {
            warn!("Could not read first frame of {}: {}", source.display(), e);
            return source.to_path_buf();
        }
    };

    if width >= VideoInfo::MIN_ANALYSIS_WIDTH {
        return source.to_path_buf();
    }

    info!(
        "Upscaling {} from width {} to {}x{}",
        source.display(),
        width,
        TARGET_WIDTH,
        TARGET_HEIGHT
    );

    match upscale(codec, source, target) {
        Ok(frames) => {
            info!("Wrote {} normalized frames to {}", frames, target.display());
            target.to_path_buf()
        }
        Err(e) => {
            warn!(
                "Normalization of {} failed, analysing original: {}",
                source.display(),
                e
            );
            let _ = std::fs::remove_file(target);
            source.to_path_buf()
        }
    }
}

fn upscale(codec: &dyn VideoCodec, source: &Path, target: &Path) -> Result<u64, CodecError> {
    let mut reader = codec.open(source)?;
    let canvas = VideoInfo::new(TARGET_WIDTH, TARGET_HEIGHT, Some(TARGET_FPS));
    let mut writer = codec.create(target, &canvas)?;

    let mut written = 0;
    while let Some(frame) = reader.read_frame()? {
        let resized = frame
            .resized(TARGET_WIDTH, TARGET_HEIGHT)
            .map_err(|e| CodecError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        writer.write_frame(&resized)?;
        written += 1;
    }

    writer.finish()?;
    Ok(written)
}
