use super::error::PipelineError;
use crate::media::Frame;
use crate::modules::analysis::model::AnalysisSummary;
use crate::pose::{LandmarkDetector, overlay};
use tracing::debug;

/// Per-frame posture extraction and overlay rendering.
///
/// Every frame passed to [`process`](Self::process) comes back annotated, in the
/// same order; only frames with a detected torso contribute a sample.
pub struct PostureExtractor<'a> {
    detector: &'a mut dyn LandmarkDetector,
    samples: Vec<f64>,
    frames_seen: u64,
}

impl<'a> PostureExtractor<'a> {
    pub fn new(detector: &'a mut dyn LandmarkDetector) -> Self {
        Self {
            detector,
            samples: Vec::new(),
            frames_seen: 0,
        }
    }

    pub fn process(&mut self, frame: Frame) -> Result<Frame, PipelineError> {
        let index = frame.index;
        let mut rgb = frame.to_rgb()?;

        let landmarks = self
            .detector
            .detect(&rgb)
            .map_err(|source| PipelineError::Detection { index, source })?;

        let mut angle = 0.0;
        if let Some(landmarks) = landmarks {
            if let Some(measured) = landmarks.posture_angle() {
                angle = measured;
                self.samples.push(measured);
            }
            overlay::draw_skeleton(&mut rgb, &landmarks);
        } else {
            debug!("No pose at frame {}", index);
        }

        overlay::draw_angle(&mut rgb, angle);
        self.frames_seen += 1;

        Ok(Frame::from_rgb(index, &rgb))
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary::from_samples(&self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{DetectorError, Joint, Landmark, Landmarks};
    use image::RgbImage;

    struct Scripted(Vec<Option<Landmarks>>);

    impl LandmarkDetector for Scripted {
        fn detect(&mut self, _frame: &RgbImage) -> Result<Option<Landmarks>, DetectorError> {
            Ok(self.0.remove(0))
        }
    }

    fn torso(shoulder: (f32, f32), hip: (f32, f32)) -> Landmarks {
        Landmarks::new()
            .with(Joint::LeftShoulder, Landmark::new(shoulder.0, shoulder.1))
            .with(Joint::LeftHip, Landmark::new(hip.0, hip.1))
    }

    fn blank(index: u64) -> Frame {
        Frame::new(index, 320, 240, vec![0; 320 * 240 * 3])
    }

    #[test]
    fn only_detected_frames_are_sampled() {
        let mut detector = Scripted(vec![
            Some(torso((0.5, 0.2), (0.5, 0.7))),
            None,
            Some(torso((0.4, 0.3), (0.6, 0.5))),
            Some(Landmarks::new().with(Joint::Nose, Landmark::new(0.5, 0.1))),
        ]);
        let mut extractor = PostureExtractor::new(&mut detector);

        for i in 0..4 {
            let out = extractor.process(blank(i)).unwrap();
            assert_eq!(out.index, i);
            assert_eq!((out.width, out.height), (320, 240));
        }

        assert_eq!(extractor.frames_seen(), 4);
        assert_eq!(extractor.samples().len(), 2);
        let summary = extractor.summary();
        assert_eq!(summary.frames_analyzed, 2);
        assert!((summary.average_angle - 22.5).abs() < 1e-4);
    }

    #[test]
    fn undetected_frame_still_gets_a_label() {
        let mut detector = Scripted(vec![None]);
        let mut extractor = PostureExtractor::new(&mut detector);
        let out = extractor.process(blank(0)).unwrap();

        // green label pixels in BGR order
        assert!(out.data.chunks_exact(3).any(|px| px == [0, 255, 0]));
        // no skeleton
        assert!(!out.data.chunks_exact(3).any(|px| px == [255, 255, 255]));
    }

    #[test]
    fn malformed_frame_is_fatal() {
        let mut detector = Scripted(vec![None]);
        let mut extractor = PostureExtractor::new(&mut detector);
        let err = extractor.process(Frame::new(9, 320, 240, vec![0; 12])).unwrap_err();
        assert!(matches!(err, PipelineError::ColorConversion(_)));
    }
}
