// src/error.rs - Failure types for each pipeline stage
use crate::keypoints::Keypoint;
use thiserror::Error;

/// No usable body in the estimator output. The pass is skipped and the
/// previous visual pose stays on screen.
#[derive(Debug, Error, PartialEq)]
pub enum PoseError {
    #[error("No body detected in frame")]
    NoBodyDetected,

    #[error("Estimator returned {found} keypoints, expected at least {expected}")]
    TooFewKeypoints { found: usize, expected: usize },

    #[error("Foot keypoint {0:?} is missing or not finite")]
    MissingFootKeypoint(Keypoint),
}

/// A direction vector that cannot produce a rotation basis.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateGeometry {
    #[error("Direction vector has zero length")]
    ZeroLength,

    #[error("Direction vector is parallel to the reference pole")]
    ParallelToPole,

    #[error("Direction vector has a non-finite component")]
    NonFinite,
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Puppet assets are not loaded yet")]
    NotLoaded,

    #[error("Puppet model has {found} meshes, expected {expected}")]
    SegmentCountMismatch { found: usize, expected: usize },

    #[error("Mesh for segment slot {slot} has no extent along its bone axis")]
    FlatMesh { slot: usize },

    #[error("No outfit textures available")]
    NoOutfits,

    #[error("Asset loading failed: {0}")]
    Load(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that leave the ensemble core. Per-frame failures never do.
#[derive(Debug, Error)]
pub enum EnsembleError {
    #[error("Pose estimator initialization failed: {0}")]
    EstimatorInit(anyhow::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
