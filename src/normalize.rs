// src/normalize.rs - Estimator coordinates to floor-aligned scene space, plus
// the points the estimator does not provide
use crate::error::PoseError;
use crate::keypoints::{Keypoint, NormalizedPose, PoseFrame, RawKeypoint};
use nalgebra::Vector3;

/// Flips the estimator's y-down, z-away convention so the body stands upright
/// facing the viewer, then drops it onto y = 0 using its lowest foot point.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    /// Axis flip for a single landmark, before floor alignment.
    pub fn flip(raw: &RawKeypoint) -> Vector3<f64> {
        Vector3::new(raw.x, -raw.y + 1.0, -raw.z)
    }

    pub fn normalize(&self, raw: &[RawKeypoint]) -> Result<NormalizedPose, PoseError> {
        if raw.len() < Keypoint::RAW_COUNT {
            return Err(PoseError::TooFewKeypoints {
                found: raw.len(),
                expected: Keypoint::RAW_COUNT,
            });
        }

        for foot in Keypoint::FEET {
            if !raw[foot.index()].is_finite() {
                return Err(PoseError::MissingFootKeypoint(foot));
            }
        }

        let mut points = [Vector3::zeros(); Keypoint::RAW_COUNT];
        for (point, kp) in points.iter_mut().zip(raw) {
            *point = Self::flip(kp);
        }

        let floor_y = Keypoint::FEET
            .iter()
            .map(|foot| points[foot.index()].y)
            .fold(f64::INFINITY, f64::min);

        for point in points.iter_mut() {
            point.y -= floor_y;
        }

        Ok(NormalizedPose { points })
    }
}

fn midpoint(a: Vector3<f64>, b: Vector3<f64>) -> Vector3<f64> {
    (a + b) / 2.0
}

/// Appends the hip/chest centers, the head and the finger midpoints.
#[derive(Debug, Clone, Copy)]
pub struct Synthesizer {
    head_height: f64,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self { head_height: 0.3 }
    }
}

impl Synthesizer {
    pub fn new(head_height: f64) -> Self {
        Self { head_height }
    }

    pub fn synthesize(&self, pose: &NormalizedPose) -> PoseFrame {
        let p = &pose.points;
        let at = |kp: Keypoint| p[kp.index()];

        let mut points = [Vector3::zeros(); Keypoint::COUNT];
        points[..Keypoint::RAW_COUNT].copy_from_slice(p);

        let chest = midpoint(at(Keypoint::LeftShoulder), at(Keypoint::RightShoulder));
        points[Keypoint::HipCenter.index()] = midpoint(at(Keypoint::LeftHip), at(Keypoint::RightHip));
        points[Keypoint::ChestCenter.index()] = chest;
        points[Keypoint::Head.index()] = chest + Vector3::new(0.0, self.head_height, 0.0);
        points[Keypoint::LeftFinger.index()] = midpoint(at(Keypoint::LeftPinky), at(Keypoint::LeftIndex));
        points[Keypoint::RightFinger.index()] = midpoint(at(Keypoint::RightPinky), at(Keypoint::RightIndex));

        PoseFrame::from_points(points)
    }
}
