pub mod detector;
pub mod landmarks;
#[cfg(feature = "movenet")]
pub mod movenet;
pub mod overlay;

pub use detector::{DetectorBackend, DetectorError, DetectorProvider, LandmarkDetector, PipeDetector};
pub use landmarks::{Joint, Landmark, Landmarks, POSE_CONNECTIONS};
#[cfg(feature = "movenet")]
pub use movenet::MovenetDetector;
