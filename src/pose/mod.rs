pub mod detector;
pub mod keypoint;

pub use detector::{PoseEstimator, PrecomputedPose};
pub use keypoint::{Keypoint, KeypointSet, PartName, RawKeypoint, RawPosition};
