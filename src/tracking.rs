// src/tracking.rs - Per-tick orchestration: estimate once, pose the ensemble
use crate::basis::BasisBuilder;
use crate::config::{EnsembleConfig, Placement};
use crate::estimator::{DetectorContext, VideoFrame};
use crate::puppet::{AssetLoader, Puppet, PuppetPose, RootTransform};
use crate::retarget::PoseRetargeter;
use crate::segment::{SegmentKind, SegmentTransformer, Transform, SEGMENT_COUNT};
use crate::solver::PoseSolver;
use nalgebra::Vector3;
use std::collections::VecDeque;
use std::time::Instant;
use tracing::{debug, info, warn};

const METRICS_WINDOW: usize = 30;

#[derive(Debug, Clone)]
pub struct PerformanceMetrics {
    pub avg_fps: f32,
    pub avg_processing_time: f32,
    pub passes: u64,
    frame_times: VecDeque<f32>,
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            avg_fps: 0.0,
            avg_processing_time: 0.0,
            passes: 0,
            frame_times: VecDeque::with_capacity(METRICS_WINDOW),
        }
    }

    fn record(&mut self, elapsed: f32) {
        self.passes += 1;
        self.frame_times.push_front(elapsed);
        if self.frame_times.len() > METRICS_WINDOW {
            self.frame_times.pop_back();
        }

        self.avg_processing_time = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        self.avg_fps = if self.avg_processing_time > 0.0 {
            1.0 / self.avg_processing_time
        } else {
            0.0
        };
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Estimator not initialized, or cleared.
    DetectorNotReady,
    /// Playback time has not moved since the last pass.
    UnchangedTimestamp,
    NoPuppetLoaded,
    EstimatorFailed,
    /// Estimator was replaced or cleared while estimating.
    Stale,
    /// No body, or the body lacks usable feet.
    MissingInput,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Applied {
        puppets_posed: usize,
        held_rotations: Vec<SegmentKind>,
    },
    Skipped(SkipReason),
}

impl PassOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PassOutcome::Applied { .. })
    }
}

/// Drives one retarget pass per animation tick for the whole ensemble. The
/// lead puppet stands at the stage's lead position; followers stand at their
/// offsets from it.
pub struct EnsembleTracker {
    detector: DetectorContext,
    puppets: Vec<Puppet>,
    placements: Vec<Placement>,
    lead_position: Vector3<f64>,
    solver: PoseSolver,
    transformer: SegmentTransformer,
    retargeter: PoseRetargeter,
    last_solved: Option<f64>,
    /// Segment transforms of the last applied pass, held across a change of
    /// source puppet.
    last_segments: Option<[Transform; SEGMENT_COUNT]>,
    metrics: PerformanceMetrics,
}

impl EnsembleTracker {
    pub fn new(config: &EnsembleConfig, detector: DetectorContext) -> Self {
        let placements = config.stage.placements();
        let puppets = placements.iter().map(|p| Puppet::new(p.face.clone())).collect();

        Self {
            detector,
            puppets,
            placements,
            lead_position: config.stage.lead_position,
            solver: PoseSolver::new(config),
            transformer: SegmentTransformer::new(BasisBuilder::new(config.basis_length), config.head),
            retargeter: PoseRetargeter,
            last_solved: None,
            last_segments: None,
            metrics: PerformanceMetrics::new(),
        }
    }

    pub fn detector(&self) -> &DetectorContext {
        &self.detector
    }

    pub fn solver(&self) -> &PoseSolver {
        &self.solver
    }

    pub fn transformer(&self) -> &SegmentTransformer {
        &self.transformer
    }

    /// Lead first, then followers in configured order.
    pub fn puppets(&self) -> &[Puppet] {
        &self.puppets
    }

    pub fn puppets_mut(&mut self) -> &mut [Puppet] {
        &mut self.puppets
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn last_solved(&self) -> Option<f64> {
        self.last_solved
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    /// Loads every puppet that is not loaded yet. Failures leave that puppet
    /// out of the ensemble; returns the number of loaded puppets.
    pub async fn load_puppets(&mut self, loader: &dyn AssetLoader) -> usize {
        for puppet in self.puppets.iter_mut().filter(|p| !p.is_loaded()) {
            if let Err(e) = puppet.load(loader).await {
                warn!("Puppet {} failed to load: {}", puppet.face(), e);
            }
        }
        self.puppets.iter().filter(|p| p.is_loaded()).count()
    }

    /// Runs one pass for `frame`. Per-frame failures are reported as skips and
    /// leave every puppet as it was.
    pub async fn solve_current(&mut self, frame: &VideoFrame, force: bool) -> PassOutcome {
        let start = Instant::now();
        let outcome = self.run_pass(frame, force).await;

        match &outcome {
            PassOutcome::Applied { puppets_posed, .. } => {
                self.metrics.record(start.elapsed().as_secs_f32());
                debug!("Posed {} puppets at t={:.3}", puppets_posed, frame.timestamp);
            }
            PassOutcome::Skipped(reason) => debug!("Pass skipped at t={:.3}: {:?}", frame.timestamp, reason),
        }
        outcome
    }

    async fn run_pass(&mut self, frame: &VideoFrame, force: bool) -> PassOutcome {
        let Some((estimator, generation)) = self.detector.snapshot().await else {
            return PassOutcome::Skipped(SkipReason::DetectorNotReady);
        };

        // Any change counts as new, so seeking backward re-solves.
        if !force && self.last_solved == Some(frame.timestamp) {
            return PassOutcome::Skipped(SkipReason::UnchangedTimestamp);
        }

        let Some(source) = self.puppets.iter().position(Puppet::is_loaded) else {
            return PassOutcome::Skipped(SkipReason::NoPuppetLoaded);
        };
        self.last_solved = Some(frame.timestamp);

        let bodies = match estimator.estimate(&frame.image).await {
            Ok(bodies) => bodies,
            Err(e) => {
                warn!("Pose estimation failed: {}", e);
                return PassOutcome::Skipped(SkipReason::EstimatorFailed);
            }
        };

        if !self.detector.is_current(generation) {
            info!("Discarding pose from a replaced estimator");
            return PassOutcome::Skipped(SkipReason::Stale);
        }

        let pose_frame = match self.solver.solve(&bodies) {
            Ok(pose_frame) => pose_frame,
            Err(e) => {
                debug!("No usable pose: {}", e);
                return PassOutcome::Skipped(SkipReason::MissingInput);
            }
        };

        // A newly chosen source starts from the ensemble's last pose.
        if let Some(last) = &self.last_segments {
            if let Err(e) = self.puppets[source].set_segment_transforms(last) {
                warn!("Source puppet {} unavailable: {}", self.puppets[source].face(), e);
                return PassOutcome::Skipped(SkipReason::NoPuppetLoaded);
            }
        }

        let report = match self.transformer.apply(&pose_frame, &mut self.puppets[source]) {
            Ok(report) => report,
            Err(e) => {
                warn!("Source puppet {} unavailable: {}", self.puppets[source].face(), e);
                return PassOutcome::Skipped(SkipReason::NoPuppetLoaded);
            }
        };
        if !report.held_rotations.is_empty() {
            debug!("Held rotations this frame: {:?}", report.held_rotations);
        }

        let segments = match self.puppets[source].pose() {
            Ok(pose) => pose.segments,
            Err(e) => {
                warn!("Source puppet {} unavailable: {}", self.puppets[source].face(), e);
                return PassOutcome::Skipped(SkipReason::NoPuppetLoaded);
            }
        };
        self.last_segments = Some(segments);
        let source_pose = PuppetPose {
            segments,
            root: RootTransform::at(self.lead_position),
        };

        let puppets_posed = self
            .retargeter
            .retarget_all(&source_pose, self.puppets.iter_mut().zip(self.placements.iter()));

        PassOutcome::Applied {
            puppets_posed,
            held_rotations: report.held_rotations,
        }
    }
}
