// src/keypoints.rs - Named body landmarks and the per-frame keypoint buffer
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Landmark indices. 0-32 come straight from the estimator, 33-37 are
/// synthesized from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum Keypoint {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftToe = 31,
    RightToe = 32,
    HipCenter = 33,
    ChestCenter = 34,
    Head = 35,
    LeftFinger = 36,
    RightFinger = 37,
}

impl Keypoint {
    /// Landmarks delivered by the estimator.
    pub const RAW_COUNT: usize = 33;
    /// Landmarks after synthesis.
    pub const COUNT: usize = 38;

    pub const ALL: [Keypoint; Keypoint::COUNT] = [
        Keypoint::Nose,
        Keypoint::LeftEyeInner,
        Keypoint::LeftEye,
        Keypoint::LeftEyeOuter,
        Keypoint::RightEyeInner,
        Keypoint::RightEye,
        Keypoint::RightEyeOuter,
        Keypoint::LeftEar,
        Keypoint::RightEar,
        Keypoint::MouthLeft,
        Keypoint::MouthRight,
        Keypoint::LeftShoulder,
        Keypoint::RightShoulder,
        Keypoint::LeftElbow,
        Keypoint::RightElbow,
        Keypoint::LeftWrist,
        Keypoint::RightWrist,
        Keypoint::LeftPinky,
        Keypoint::RightPinky,
        Keypoint::LeftIndex,
        Keypoint::RightIndex,
        Keypoint::LeftThumb,
        Keypoint::RightThumb,
        Keypoint::LeftHip,
        Keypoint::RightHip,
        Keypoint::LeftKnee,
        Keypoint::RightKnee,
        Keypoint::LeftAnkle,
        Keypoint::RightAnkle,
        Keypoint::LeftHeel,
        Keypoint::RightHeel,
        Keypoint::LeftToe,
        Keypoint::RightToe,
        Keypoint::HipCenter,
        Keypoint::ChestCenter,
        Keypoint::Head,
        Keypoint::LeftFinger,
        Keypoint::RightFinger,
    ];

    /// Keypoints whose lowest point defines the floor.
    pub const FEET: [Keypoint; 4] = [
        Keypoint::LeftHeel,
        Keypoint::LeftToe,
        Keypoint::RightHeel,
        Keypoint::RightToe,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_synthesized(self) -> bool {
        self.index() >= Self::RAW_COUNT
    }
}

pub const LEFT_LEG: [Keypoint; 5] = [
    Keypoint::LeftHip,
    Keypoint::LeftKnee,
    Keypoint::LeftAnkle,
    Keypoint::LeftHeel,
    Keypoint::LeftToe,
];

pub const RIGHT_LEG: [Keypoint; 5] = [
    Keypoint::RightHip,
    Keypoint::RightKnee,
    Keypoint::RightAnkle,
    Keypoint::RightHeel,
    Keypoint::RightToe,
];

pub const LEFT_ARM: [Keypoint; 4] = [
    Keypoint::LeftShoulder,
    Keypoint::LeftElbow,
    Keypoint::LeftWrist,
    Keypoint::LeftFinger,
];

pub const RIGHT_ARM: [Keypoint; 4] = [
    Keypoint::RightShoulder,
    Keypoint::RightElbow,
    Keypoint::RightWrist,
    Keypoint::RightFinger,
];

/// Closed torso outline running up to the head.
pub const BODY_OUTLINE: [Keypoint; 8] = [
    Keypoint::LeftShoulder,
    Keypoint::LeftHip,
    Keypoint::RightHip,
    Keypoint::RightShoulder,
    Keypoint::ChestCenter,
    Keypoint::Head,
    Keypoint::ChestCenter,
    Keypoint::LeftShoulder,
];

/// Limb chains that proportion correction may carry along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimbChain {
    LeftArm,
    RightArm,
    LeftLeg,
    RightLeg,
}

impl LimbChain {
    pub fn keypoints(self) -> &'static [Keypoint] {
        match self {
            LimbChain::LeftArm => &LEFT_ARM,
            LimbChain::RightArm => &RIGHT_ARM,
            LimbChain::LeftLeg => &LEFT_LEG,
            LimbChain::RightLeg => &RIGHT_LEG,
        }
    }
}

/// One landmark as the estimator reports it: y grows downward, z grows away
/// from the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawKeypoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub score: Option<f64>,
}

impl RawKeypoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, score: None }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A single body returned by the pose estimator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectedBody {
    pub keypoints: Vec<RawKeypoint>,
}

/// Floor-aligned estimator landmarks, before synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPose {
    pub(crate) points: [Vector3<f64>; Keypoint::RAW_COUNT],
}

impl NormalizedPose {
    pub fn get(&self, keypoint: Keypoint) -> Option<&Vector3<f64>> {
        self.points.get(keypoint.index())
    }

    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }
}

/// Every keypoint of one body at one instant, raw and synthesized.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseFrame {
    points: [Vector3<f64>; Keypoint::COUNT],
}

impl PoseFrame {
    pub fn from_points(points: [Vector3<f64>; Keypoint::COUNT]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Vector3<f64>] {
        &self.points
    }

    /// Vector from `start` to `end`.
    pub fn bone(&self, start: Keypoint, end: Keypoint) -> Vector3<f64> {
        self[end] - self[start]
    }

    pub fn distance(&self, a: Keypoint, b: Keypoint) -> f64 {
        self.bone(a, b).norm()
    }

    /// Points along a chain, for drawing skeleton lines.
    pub fn polyline(&self, chain: &[Keypoint]) -> Vec<Vector3<f64>> {
        chain.iter().map(|kp| self[*kp]).collect()
    }
}

impl Index<Keypoint> for PoseFrame {
    type Output = Vector3<f64>;

    fn index(&self, keypoint: Keypoint) -> &Self::Output {
        &self.points[keypoint.index()]
    }
}

impl IndexMut<Keypoint> for PoseFrame {
    fn index_mut(&mut self, keypoint: Keypoint) -> &mut Self::Output {
        &mut self.points[keypoint.index()]
    }
}
