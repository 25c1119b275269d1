//! Pose retargeting for a puppet dance ensemble.
//!
//! Each tick, one estimated body is normalized, completed with synthesized
//! keypoints, fitted to the puppet mesh proportions and turned into one
//! transform per puppet segment. That pose is then copied onto every other
//! puppet in the ensemble with its own stage offset and scale.

pub mod assets;
pub mod basis;
pub mod config;
pub mod data;
pub mod error;
pub mod estimator;
pub mod keypoints;
pub mod normalize;
pub mod proportion;
pub mod puppet;
pub mod retarget;
pub mod segment;
pub mod solver;
pub mod tracking;

pub use basis::{Basis, BasisBuilder};
pub use config::{EnsembleConfig, HeadCalibration, Placement, ProportionRule, StageLayout};
pub use error::{AssetError, ConfigError, DegenerateGeometry, EnsembleError, PoseError};
pub use estimator::{DetectorContext, PoseEstimator, SimulatedEstimator, VideoFrame};
pub use keypoints::{DetectedBody, Keypoint, LimbChain, PoseFrame, RawKeypoint};
pub use puppet::{AssetLoader, Puppet, PuppetAssets, PuppetPose, RootTransform};
pub use retarget::PoseRetargeter;
pub use segment::{Segment, SegmentKind, SegmentTransformer, Transform, SEGMENTS, SEGMENT_COUNT};
pub use solver::PoseSolver;
pub use tracking::{EnsembleTracker, PassOutcome, SkipReason};
