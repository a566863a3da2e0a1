use super::landmarks::Landmarks;
use image::RgbImage;
use serde::Serialize;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("detector is not configured: {0}")]
    NotConfigured(String),

    #[error("failed to start detector `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("detector process exited unexpectedly")]
    Exited,

    #[error("detector I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid detector output: {0}")]
    Protocol(String),

    #[error("model inference failed: {0}")]
    Inference(String),
}

/// Single-person pose estimator. `Ok(None)` means no body was found in the frame.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<Landmarks>, DetectorError>;
}

/// Builds a fresh detector per job, so tracking state never leaks between videos.
pub trait DetectorProvider: Send + Sync {
    fn create(&self) -> Result<Box<dyn LandmarkDetector>, DetectorError>;
}

/// Detector backends the worker can be configured with.
#[derive(Debug, Clone)]
pub enum DetectorBackend {
    /// External pose-estimation process speaking the line protocol of [`PipeDetector`].
    Pipe { command: String },
    /// In-process MoveNet single-pose model.
    #[cfg(feature = "movenet")]
    Movenet { model_path: std::path::PathBuf },
}

impl DetectorProvider for DetectorBackend {
    fn create(&self) -> Result<Box<dyn LandmarkDetector>, DetectorError> {
        match self {
            DetectorBackend::Pipe { command } => Ok(Box::new(PipeDetector::spawn(command)?)),
            #[cfg(feature = "movenet")]
            DetectorBackend::Movenet { model_path } => {
                Ok(Box::new(super::movenet::MovenetDetector::new(model_path)?))
            }
        }
    }
}

#[derive(Serialize)]
struct FrameHeader {
    width: u32,
    height: u32,
}

/// Talks to a pose-estimation process over stdin/stdout.
///
/// For every frame the worker writes one JSON header line
/// `{"width":W,"height":H}` followed by `W*H*3` bytes of packed RGB. The process
/// answers with one line: `null` when nobody was found, otherwise an object keyed
/// by joint name, e.g. `{"left_shoulder":{"x":0.51,"y":0.32,"visibility":0.98}, ...}`
/// with coordinates normalized to the frame.
pub struct PipeDetector {
    command: String,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    line: String,
}

impl PipeDetector {
    pub fn spawn(command: &str) -> Result<Self, DetectorError> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| DetectorError::NotConfigured("empty detector command".to_string()))?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| DetectorError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(DetectorError::Exited);
        };

        info!("Started pose detector `{}`", command);

        Ok(Self {
            command: command.to_string(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
            line: String::new(),
        })
    }
}

impl LandmarkDetector for PipeDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<Landmarks>, DetectorError> {
        let header = serde_json::to_string(&FrameHeader {
            width: frame.width(),
            height: frame.height(),
        })
        .map_err(|e| DetectorError::Protocol(e.to_string()))?;

        self.stdin.write_all(header.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.write_all(frame.as_raw())?;
        self.stdin.flush()?;

        self.line.clear();
        if self.stdout.read_line(&mut self.line)? == 0 {
            return Err(DetectorError::Exited);
        }

        parse_reply(&self.line)
    }
}

fn parse_reply(line: &str) -> Result<Option<Landmarks>, DetectorError> {
    let landmarks: Option<Landmarks> = serde_json::from_str(line.trim())
        .map_err(|e| DetectorError::Protocol(format!("{e}: {}", line.trim())))?;
    Ok(landmarks.filter(|l| !l.is_empty()))
}

impl Drop for PipeDetector {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            warn!("Failed to stop detector `{}`: {}", self.command, e);
        }
        let _ = self.child.wait();
    }
}
