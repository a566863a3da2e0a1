#![allow(dead_code)]

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use image::RgbImage;
use posture_backend::config::settings::{AppConfig, MediaSettings, PollSettings};
use posture_backend::infrastructure::storage::local::LocalStorage;
use posture_backend::media::{CodecError, Frame, FrameReader, FrameWriter, VideoCodec, VideoInfo};
use posture_backend::modules::analysis::events::{AnalysisJob, JobPublisher};
use posture_backend::modules::analysis::model::JobRecord;
use posture_backend::modules::analysis::repository::JobStore;
use posture_backend::pose::{
    DetectorError, DetectorProvider, Joint, Landmark, LandmarkDetector, Landmarks,
};
use posture_backend::state::AppState;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Codec that keeps decoded frames in memory, keyed by path. Every container it
/// "writes" also leaves a small marker file on disk so path checks behave.
#[derive(Clone, Default)]
pub struct MemoryCodec {
    inner: Arc<Mutex<CodecInner>>,
}

#[derive(Default)]
struct CodecInner {
    videos: HashMap<PathBuf, (VideoInfo, Vec<Frame>)>,
    fail_finishing: bool,
    opened: usize,
}

impl MemoryCodec {
    pub fn insert(&self, path: &Path, info: VideoInfo, frames: Vec<Frame>) {
        std::fs::write(path, b"video").unwrap();
        self.inner
            .lock()
            .unwrap()
            .videos
            .insert(path.to_path_buf(), (info, frames));
    }

    pub fn video(&self, path: &Path) -> Option<(VideoInfo, Vec<Frame>)> {
        self.inner.lock().unwrap().videos.get(path).cloned()
    }

    pub fn fail_finishing(&self) {
        self.inner.lock().unwrap().fail_finishing = true;
    }

    pub fn opened(&self) -> usize {
        self.inner.lock().unwrap().opened
    }
}

struct MemoryReader {
    info: VideoInfo,
    frames: VecDeque<Frame>,
}

impl FrameReader for MemoryReader {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, CodecError> {
        Ok(self.frames.pop_front())
    }
}

struct MemoryWriter {
    path: PathBuf,
    info: VideoInfo,
    frames: Vec<Frame>,
    codec: MemoryCodec,
}

impl FrameWriter for MemoryWriter {
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
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), CodecError> {
        let MemoryWriter {
            path,
            info,
            frames,
            codec,
        } = *self;
        codec.insert(&path, info, frames);
        Ok(())
    }
}

impl VideoCodec for MemoryCodec {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameReader>, CodecError> {
        let mut inner = self.inner.lock().unwrap();
        inner.opened += 1;
        let (info, frames) = inner
            .videos
            .get(path)
            .cloned()
            .ok_or_else(|| CodecError::NotFound(path.to_path_buf()))?;
        Ok(Box::new(MemoryReader {
            info,
            frames: frames.into(),
        }))
    }

    fn create(&self, path: &Path, info: &VideoInfo) -> Result<Box<dyn FrameWriter>, CodecError> {
        // an encoder creates its output as soon as it starts
        std::fs::write(path, b"partial")?;
        Ok(Box::new(MemoryWriter {
            path: path.to_path_buf(),
            info: *info,
            frames: Vec::new(),
            codec: self.clone(),
        }))
    }

    fn transcode_for_playback(&self, src: &Path, dst: &Path) -> Result<(), CodecError> {
        if self.inner.lock().unwrap().fail_finishing {
            return Err(CodecError::Execution {
                program: "ffmpeg".into(),
                exit_code: Some(1),
                stderr: "Unknown encoder 'libx264'".into(),
            });
        }
        let (info, frames) = self
            .video(src)
            .ok_or_else(|| CodecError::NotFound(src.to_path_buf()))?;
        self.insert(dst, info, frames);
        Ok(())
    }
}

pub fn solid_frames(count: u64, width: u32, height: u32) -> Vec<Frame> {
    (0..count)
        .map(|i| Frame::new(i, width, height, vec![40; (width * height * 3) as usize]))
        .collect()
}

pub fn has_color(frame: &Frame, bgr: [u8; 3]) -> bool {
    frame.data.chunks_exact(3).any(|px| px == bgr)
}

/// Replays a fixed list of detections; once exhausted, it repeats the last one
/// when built with `always` and reports nobody otherwise. `failing_at` makes
/// the detector error on one frame.
#[derive(Clone)]
pub struct ScriptedDetectors {
    script: Vec<Option<Landmarks>>,
    repeat_last: bool,
    fail_at: Option<usize>,
}

impl ScriptedDetectors {
    pub fn sequence(script: Vec<Option<Landmarks>>) -> Self {
        Self {
            script,
            repeat_last: false,
            fail_at: None,
        }
    }

    pub fn always(detection: Option<Landmarks>) -> Self {
        Self {
            script: vec![detection],
            repeat_last: true,
            fail_at: None,
        }
    }

    pub fn failing_at(mut self, frame: usize) -> Self {
        self.fail_at = Some(frame);
        self
    }
}

struct ScriptedDetector {
    script: Vec<Option<Landmarks>>,
    repeat_last: bool,
    fail_at: Option<usize>,
    position: usize,
}

impl LandmarkDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &RgbImage) -> Result<Option<Landmarks>, DetectorError> {
        if self.fail_at == Some(self.position) {
            return Err(DetectorError::Protocol(format!(
                "no pose for frame {}",
                self.position
            )));
        }
        let next = match self.script.get(self.position) {
            Some(d) => d.clone(),
            None if self.repeat_last => self.script.last().cloned().flatten(),
            None => None,
        };
        self.position += 1;
        Ok(next)
    }
}

impl DetectorProvider for ScriptedDetectors {
    fn create(&self) -> Result<Box<dyn LandmarkDetector>, DetectorError> {
        Ok(Box::new(ScriptedDetector {
            script: self.script.clone(),
            repeat_last: self.repeat_last,
            fail_at: self.fail_at,
            position: 0,
        }))
    }
}

pub fn torso(shoulder: (f32, f32), hip: (f32, f32)) -> Landmarks {
    Landmarks::new()
        .with(Joint::LeftShoulder, Landmark::new(shoulder.0, shoulder.1))
        .with(Joint::LeftHip, Landmark::new(hip.0, hip.1))
}

pub fn upright() -> Landmarks {
    torso((0.5, 0.3), (0.5, 0.6))
        .with(Joint::Nose, Landmark::new(0.5, 0.15))
        .with(Joint::LeftKnee, Landmark::new(0.5, 0.8))
}

#[derive(Default)]
pub struct MemoryJobStore {
    records: Mutex<HashMap<Uuid, JobRecord>>,
}

impl MemoryJobStore {
    pub fn get(&self, job_id: Uuid) -> Option<JobRecord> {
        self.records.lock().unwrap().get(&job_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn save(&self, record: &JobRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(record.job_id, record.clone());
        Ok(())
    }

    async fn find(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        Ok(self.get(job_id))
    }
}

/// Memory store whose first `failures` saves are rejected.
#[derive(Default)]
pub struct FlakyJobStore {
    pub inner: MemoryJobStore,
    failures: AtomicUsize,
}

impl FlakyJobStore {
    pub fn failing_saves(failures: usize) -> Self {
        Self {
            inner: MemoryJobStore::default(),
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl JobStore for FlakyJobStore {
    async fn save(&self, record: &JobRecord) -> Result<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("registry unreachable"));
        }
        self.inner.save(record).await
    }

    async fn find(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        self.inner.find(job_id).await
    }
}

#[derive(Default)]
pub struct MemoryPublisher {
    pub published: Mutex<Vec<AnalysisJob>>,
    pub fail: bool,
}

impl MemoryPublisher {
    pub fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl JobPublisher for MemoryPublisher {
    async fn publish(&self, job: &AnalysisJob) -> Result<()> {
        if self.fail {
            return Err(anyhow!("broker unreachable"));
        }
        self.published.lock().unwrap().push(job.clone());
        Ok(())
    }
}

pub fn storage_in(dir: &Path) -> LocalStorage {
    let storage = LocalStorage::new(dir.join("uploads"), dir.join("results"));
    std::fs::create_dir_all(dir.join("uploads")).unwrap();
    std::fs::create_dir_all(dir.join("results")).unwrap();
    storage
}

pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 8000,
        amqp_url: "amqp://localhost:5672/%2f".into(),
        redis_url: "redis://localhost:6379".into(),
        analysis_queue: "posture_analysis_test".into(),
        upload_dir: dir.join("uploads"),
        result_dir: dir.join("results"),
        max_upload_bytes: 1024 * 1024,
        job_ttl_secs: 60,
        poll: PollSettings {
            interval_ms: 10,
            timeout_ms: 100,
        },
        media: MediaSettings {
            ffmpeg_bin: "ffmpeg".into(),
            ffprobe_bin: "ffprobe".into(),
            pose_detector_cmd: None,
            movenet_model_path: None,
        },
    }
}

pub fn app_state(
    dir: &Path,
    jobs: Arc<MemoryJobStore>,
    publisher: Arc<MemoryPublisher>,
) -> AppState {
    AppState::new(test_config(dir), jobs, publisher, storage_in(dir))
}
