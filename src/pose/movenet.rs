use super::detector::{DetectorError, LandmarkDetector};
use super::landmarks::{Joint, Landmark, Landmarks};
use image::{RgbImage, imageops};
use ndarray::Array4;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use std::path::Path;

/// MoveNet SinglePose Lightning input edge.
pub const MOVENET_INPUT_SIZE: u32 = 192;
/// Below this mean keypoint confidence the frame counts as "nobody found".
const MIN_POSE_CONFIDENCE: f32 = 0.2;
/// Individual keypoints below this are left out of the landmark set.
const MIN_KEYPOINT_CONFIDENCE: f32 = 0.3;

fn inference(e: impl std::fmt::Display) -> DetectorError {
    DetectorError::Inference(e.to_string())
}

pub struct MovenetDetector {
    session: Session,
}

impl MovenetDetector {
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self, DetectorError> {
        let session = Session::builder()
            .map_err(inference)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(inference)?
            .commit_from_file(model_path.as_ref())
            .map_err(inference)?;

        Ok(Self { session })
    }

    /// [1, 192, 192, 3] f32 tensor with raw 0-255 RGB values.
    fn preprocess(frame: &RgbImage) -> Array4<f32> {
        let size = MOVENET_INPUT_SIZE;
        let resized = imageops::resize(frame, size, size, imageops::FilterType::Triangle);
        let mut tensor = Array4::<f32>::zeros((1, size as usize, size as usize, 3));
        for (x, y, px) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, y as usize, x as usize, c]] = px.0[c] as f32;
            }
        }
        tensor
    }
}

impl LandmarkDetector for MovenetDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<Landmarks>, DetectorError> {
        let input = Tensor::from_array(Self::preprocess(frame))
            .map_err(inference)?;

        let outputs = self
            .session
            .run(ort::inputs!["serving_default_input_0" => input])
            .map_err(inference)?;

        // [1, 1, 17, 3] of (y, x, confidence)
        let output: ndarray::ArrayViewD<f32> = outputs["StatefulPartitionedCall_0"]
            .try_extract_array()
            .map_err(inference)?;

        let mut landmarks = Landmarks::new();
        let mut confidence_sum = 0.0;
        for (i, joint) in Joint::ALL.iter().enumerate() {
            let y = output[[0, 0, i, 0]];
            let x = output[[0, 0, i, 1]];
            let confidence = output[[0, 0, i, 2]];
            confidence_sum += confidence;

            if confidence >= MIN_KEYPOINT_CONFIDENCE {
                landmarks.insert(
                    *joint,
                    Landmark {
                        x,
                        y,
                        visibility: Some(confidence),
                    },
                );
            }
        }

        if confidence_sum / (Joint::COUNT as f32) < MIN_POSE_CONFIDENCE || landmarks.is_empty() {
            return Ok(None);
        }

        Ok(Some(landmarks))
    }
}
