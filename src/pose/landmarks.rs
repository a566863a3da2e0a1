use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The 17 COCO body joints shared by MoveNet and the MediaPipe body subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Joint {
    pub const COUNT: usize = 17;

    /// In COCO keypoint order.
    pub const ALL: [Joint; Joint::COUNT] = [
        Joint::Nose,
        Joint::LeftEye,
        Joint::RightEye,
        Joint::LeftEar,
        Joint::RightEar,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];
}

/// Bones drawn for the skeleton overlay.
pub const POSE_CONNECTIONS: [(Joint, Joint); 18] = [
    (Joint::LeftEar, Joint::LeftEye),
    (Joint::LeftEye, Joint::Nose),
    (Joint::Nose, Joint::RightEye),
    (Joint::RightEye, Joint::RightEar),
    (Joint::LeftShoulder, Joint::RightShoulder),
    (Joint::LeftShoulder, Joint::LeftElbow),
    (Joint::LeftElbow, Joint::LeftWrist),
    (Joint::RightShoulder, Joint::RightElbow),
    (Joint::RightElbow, Joint::RightWrist),
    (Joint::LeftShoulder, Joint::LeftHip),
    (Joint::RightShoulder, Joint::RightHip),
    (Joint::LeftHip, Joint::RightHip),
    (Joint::LeftHip, Joint::LeftKnee),
    (Joint::LeftKnee, Joint::LeftAnkle),
    (Joint::RightHip, Joint::RightKnee),
    (Joint::RightKnee, Joint::RightAnkle),
    (Joint::LeftEar, Joint::LeftShoulder),
    (Joint::RightEar, Joint::RightShoulder),
];

const PIXEL_MARGIN: f32 = 1.0;

/// A joint position in image-relative coordinates, `(0, 0)` top-left and
/// `(1, 1)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            visibility: None,
        }
    }

    /// Pixel position, with coordinates clamped to one frame's margin around
    /// the image so wild detector output stays drawable.
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        let clamp = |v: f32| {
            if v.is_finite() {
                v.clamp(-PIXEL_MARGIN, 1.0 + PIXEL_MARGIN)
            } else {
                0.0
            }
        };
        let px = (clamp(self.x) * width as f32).round() as i32;
        let py = (clamp(self.y) * height as f32).round() as i32;
        (px, py)
    }
}

/// Skeleton found in one frame. Joints the detector could not place are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Landmarks(BTreeMap<Joint, Landmark>);

impl Landmarks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, joint: Joint, landmark: Landmark) -> Self {
        self.insert(joint, landmark);
        self
    }

    pub fn insert(&mut self, joint: Joint, landmark: Landmark) {
        self.0.insert(joint, landmark);
    }

    pub fn get(&self, joint: Joint) -> Option<&Landmark> {
        self.0.get(&joint)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Joint, &Landmark)> {
        self.0.iter().map(|(j, l)| (*j, l))
    }
}

/// Lean of the torso from vertical, in degrees, measured from the left shoulder
/// to the left hip. 0 when the shoulder sits directly above the hip.
pub fn posture_angle(shoulder: &Landmark, hip: &Landmark) -> f64 {
    let dy = hip.y as f64 - shoulder.y as f64;
    let dx = hip.x as f64 - shoulder.x as f64;
    90.0 - dy.atan2(dx).to_degrees()
}

impl Landmarks {
    /// `None` unless both torso joints were placed.
    pub fn posture_angle(&self) -> Option<f64> {
        let shoulder = self.get(Joint::LeftShoulder)?;
        let hip = self.get(Joint::LeftHip)?;
        Some(posture_angle(shoulder, hip))
    }
}
