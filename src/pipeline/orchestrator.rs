use super::error::PipelineError;
use super::extractor::PostureExtractor;
use crate::infrastructure::storage::local::{ContentPaths, write_atomic};
use crate::media::{VideoCodec, normalize};
use crate::modules::analysis::model::AnalysisSummary;
use crate::pose::DetectorProvider;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Normalize -> extract -> encode -> finish -> summary, for one content item.
#[derive(Clone)]
pub struct AnalysisPipeline {
    codec: Arc<dyn VideoCodec>,
    detectors: Arc<dyn DetectorProvider>,
}

impl AnalysisPipeline {
    pub fn new(codec: Arc<dyn VideoCodec>, detectors: Arc<dyn DetectorProvider>) -> Self {
        Self { codec, detectors }
    }

    /// Runs the whole analysis synchronously. Intermediate files are removed
    /// whatever the outcome; on failure no summary and no final video remain.
    pub fn run(&self, paths: &ContentPaths) -> Result<AnalysisSummary, PipelineError> {
        let result = self.run_stages(paths);

        remove_quietly(&paths.overlay);
        remove_quietly(&paths.normalized);
        if result.is_err() {
            remove_quietly(&paths.final_video);
        }

        result
    }

    fn run_stages(&self, paths: &ContentPaths) -> Result<AnalysisSummary, PipelineError> {
        let content_id = paths.content_id;
        info!("Analyzing posture for file: {}", paths.source.display());

        if !paths.source.exists() {
            return Err(PipelineError::SourceMissing(paths.source.clone()));
        }

        let input = normalize(self.codec.as_ref(), &paths.source, &paths.normalized);

        let mut reader = self.codec.open(&input).map_err(PipelineError::Open)?;
        let info = reader.info();
        if info.is_undersized() {
            warn!(
                "[{}] Analysing undersized input {}x{}",
                content_id, info.width, info.height
            );
        }
        let mut writer = self
            .codec
            .create(&paths.overlay, &info)
            .map_err(PipelineError::Encode)?;

        let mut detector = self.detectors.create().map_err(PipelineError::DetectorSetup)?;
        let mut extractor = PostureExtractor::new(detector.as_mut());

        while let Some(frame) = reader.read_frame().map_err(PipelineError::Decode)? {
            let annotated = extractor.process(frame)?;
            writer.write_frame(&annotated).map_err(PipelineError::Encode)?;
        }
        writer.finish().map_err(PipelineError::Encode)?;

        let summary = extractor.summary();
        info!(
            "[{}] {} frames decoded, {} with a pose, average angle {:.2}",
            content_id,
            extractor.frames_seen(),
            summary.frames_analyzed,
            summary.average_angle
        );
        drop(extractor);
        drop(detector);

        self.codec
            .transcode_for_playback(&paths.overlay, &paths.final_video)
            .map_err(PipelineError::Finishing)?;
        info!("Saved video overlay to {}", paths.final_video.display());

        let json = serde_json::to_vec_pretty(&summary)?;
        write_atomic(&paths.summary, &json)?;
        info!("Saved results to {}", paths.summary.display());

        Ok(summary)
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
