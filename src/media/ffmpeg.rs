//! Codec layer backed by the `ffmpeg` / `ffprobe` executables.
//!
//! Frames travel over pipes as packed BGR24 (`-f rawvideo -pix_fmt bgr24`), so
//! no codec library is linked into the worker.

use super::codec::{CodecError, FrameReader, FrameWriter, VideoCodec};
use super::frame::{Frame, VideoInfo};
use serde::Deserialize;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, warn};

const PIXEL_FORMAT: &str = "bgr24";

#[derive(Debug, Clone)]
pub struct FfmpegCodec {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegCodec {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn inspect(&self, path: &Path) -> Result<VideoInfo, CodecError> {
        if !path.exists() {
            return Err(CodecError::NotFound(path.to_path_buf()));
        }

        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,avg_frame_rate,r_frame_rate:stream_tags=rotate:stream_side_data=rotation",
                "-print_format",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|source| CodecError::Spawn {
                program: self.ffprobe.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CodecError::Execution {
                program: self.ffprobe.clone(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_stream_info(path, &output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct StreamReport {
    #[serde(default)]
    streams: Vec<StreamEntry>,
}

#[derive(Debug, Deserialize)]
struct StreamEntry {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    #[serde(default)]
    side_data_list: Vec<StreamSideData>,
    #[serde(default)]
    tags: StreamTags,
}

#[derive(Debug, Deserialize)]
struct StreamSideData {
    rotation: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamTags {
    rotate: Option<String>,
}

impl StreamEntry {
    /// Display rotation in degrees. The display matrix wins over the legacy
    /// `rotate` tag.
    fn rotation(&self) -> f64 {
        self.side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .or_else(|| self.tags.rotate.as_deref().and_then(|r| r.trim().parse().ok()))
            .unwrap_or(0.0)
    }

    /// ffmpeg autorotates while decoding, so quarter turns swap the axes.
    fn displayed_size(&self, width: u32, height: u32) -> (u32, u32) {
        let quarter_turns = (self.rotation() / 90.0).round().rem_euclid(4.0);
        if quarter_turns == 1.0 || quarter_turns == 3.0 {
            (height, width)
        } else {
            (width, height)
        }
    }
}

fn parse_stream_info(path: &Path, stdout: &[u8]) -> Result<VideoInfo, CodecError> {
    let parsed: StreamReport = serde_json::from_slice(stdout).map_err(|e| CodecError::Metadata {
        path: path.to_path_buf(),
        reason: format!("invalid ffprobe json: {e}"),
    })?;

    let stream = parsed.streams.into_iter().next().ok_or_else(|| CodecError::Metadata {
        path: path.to_path_buf(),
        reason: "no video stream".to_string(),
    })?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(CodecError::Metadata {
                path: path.to_path_buf(),
                reason: "video stream has no dimensions".to_string(),
            });
        }
    };

    let (width, height) = stream.displayed_size(width, height);
    let rotation = stream.rotation();
    if rotation != 0.0 {
        debug!(
            "{} carries a {} degree rotation, decoding as {}x{}",
            path.display(),
            rotation,
            width,
            height
        );
    }

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate));

    Ok(VideoInfo::new(width, height, fps))
}

/// Parses ffprobe rates such as `30/1` or `30000/1001`. `0/0` yields `None`.
fn parse_rate(raw: &str) -> Option<f64> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

fn drain_stderr(child: &mut Child) -> String {
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        let _ = pipe.read_to_string(&mut stderr);
    }
    stderr.trim().to_string()
}

impl VideoCodec for FfmpegCodec {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameReader>, CodecError> {
        let info = self.inspect(path)?;

        let mut child = Command::new(&self.ffmpeg)
            .args(["-nostdin", "-v", "error", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", PIXEL_FORMAT, "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| CodecError::Spawn {
                program: self.ffmpeg.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| CodecError::Execution {
            program: self.ffmpeg.clone(),
            exit_code: None,
            stderr: "decoder stdout unavailable".to_string(),
        })?;

        debug!(
            "Opened {} ({}x{} @ {:.2} fps)",
            path.display(),
            info.width,
            info.height,
            info.fps
        );

        Ok(Box::new(FfmpegReader {
            program: self.ffmpeg.clone(),
            child: Some(child),
            stdout,
            info,
            next_index: 0,
        }))
    }

    fn create(&self, path: &Path, info: &VideoInfo) -> Result<Box<dyn FrameWriter>, CodecError> {
        let mut child = Command::new(&self.ffmpeg)
            .args(["-y", "-nostdin", "-v", "error"])
            .args(["-f", "rawvideo", "-pix_fmt", PIXEL_FORMAT])
            .args(["-s", &format!("{}x{}", info.width, info.height)])
            .args(["-r", &format!("{}", info.fps)])
            .args(["-i", "-", "-an", "-c:v", "mpeg4", "-q:v", "3"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CodecError::Spawn {
                program: self.ffmpeg.clone(),
                source,
            })?;

        let stdin = child.stdin.take();

        Ok(Box::new(FfmpegWriter {
            program: self.ffmpeg.clone(),
            child: Some(child),
            stdin,
            info: *info,
        }))
    }

    fn transcode_for_playback(&self, src: &Path, dst: &Path) -> Result<(), CodecError> {
        let output = Command::new(&self.ffmpeg)
            .args(["-y", "-nostdin", "-v", "error", "-i"])
            .arg(src)
            .args([
                "-vf",
                "scale=trunc(iw/2)*2:trunc(ih/2)*2",
                "-c:v",
                "libx264",
                "-preset",
                "fast",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ])
            .arg(dst)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CodecError::Spawn {
                program: self.ffmpeg.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CodecError::Execution {
                program: self.ffmpeg.clone(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

pub struct FfmpegReader {
    program: String,
    child: Option<Child>,
    stdout: ChildStdout,
    info: VideoInfo,
    next_index: u64,
}

impl FfmpegReader {
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    fn reap(&mut self) -> Result<(), CodecError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait()?;
        if !status.success() && self.next_index == 0 {
            return Err(CodecError::Execution {
                program: self.program.clone(),
                exit_code: status.code(),
                stderr: "decoder produced no frames".to_string(),
            });
        }
        if !status.success() {
            warn!(
                "Decoder exited with {:?} after {} frames",
                status.code(),
                self.next_index
            );
        }
        Ok(())
    }
}

impl FrameReader for FfmpegReader {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CodecError> {
        if self.child.is_none() {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.info.frame_len()];
        let filled = self.fill(&mut buf)?;

        if filled < buf.len() {
            if filled > 0 {
                warn!("Dropping truncated trailing frame ({} of {} bytes)", filled, buf.len());
            }
            self.reap()?;
            return Ok(None);
        }

        let frame = Frame::new(self.next_index, self.info.width, self.info.height, buf);
        self.next_index += 1;
        Ok(Some(frame))
    }
}

impl Drop for FfmpegReader {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

pub struct FfmpegWriter {
    program: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    info: VideoInfo,
}

impl FfmpegWriter {
    fn fail(&mut self) -> CodecError {
        self.stdin.take();
        match self.child.take() {
            Some(mut child) => {
                let stderr = drain_stderr(&mut child);
                let exit_code = child.wait().ok().and_then(|s| s.code());
                CodecError::Execution {
                    program: self.program.clone(),
                    exit_code,
                    stderr,
                }
            }
            None => CodecError::Execution {
                program: self.program.clone(),
                exit_code: None,
                stderr: "encoder already closed".to_string(),
            },
        }
    }
}

impl FrameWriter for FfmpegWriter {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), CodecError> {
        if frame.width != self.info.width || frame.height != self.info.height {
            return Err(CodecError::FrameSize {
                index: frame.index,
                width: self.info.width,
                height: self.info.height,
                actual_width: frame.width,
                actual_height: frame.height,
            });
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(self.fail());
        };

        match stdin.write_all(&frame.data) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Err(self.fail()),
            Err(e) => Err(e.into()),
        }
    }

    fn finish(mut self: Box<Self>) -> Result<(), CodecError> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let stderr = drain_stderr(&mut child);
        let status = child.wait()?;
        if !status.success() {
            return Err(CodecError::Execution {
                program: self.program.clone(),
                exit_code: status.code(),
                stderr,
            });
        }

        Ok(())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
