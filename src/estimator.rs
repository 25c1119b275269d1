// src/estimator.rs - Pose estimator seam, its lifecycle, and a simulated dancer
use crate::error::EnsembleError;
use crate::keypoints::{DetectedBody, Keypoint, RawKeypoint};
use async_trait::async_trait;
use image::DynamicImage;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

/// One decoded video frame and its playback time in seconds.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub image: DynamicImage,
    pub timestamp: f64,
}

impl VideoFrame {
    pub fn new(image: DynamicImage, timestamp: f64) -> Self {
        Self { image, timestamp }
    }
}

/// Anything that turns a frame into detected bodies, keypoints in the
/// estimator's own y-down, z-away convention.
#[async_trait]
pub trait PoseEstimator: Send + Sync {
    async fn estimate(&self, frame: &DynamicImage) -> anyhow::Result<Vec<DetectedBody>>;
}

#[derive(Default)]
struct DetectorState {
    estimator: RwLock<Option<Arc<dyn PoseEstimator>>>,
    generation: AtomicU64,
}

/// Shared handle to the current estimator. Every install or clear starts a new
/// generation, so a result computed by an estimator that has since been
/// replaced can be recognized and dropped.
#[derive(Clone, Default)]
pub struct DetectorContext {
    inner: Arc<DetectorState>,
}

impl DetectorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the one-time estimator setup. Does nothing when an estimator is
    /// already installed.
    pub async fn initialize<F, Fut>(&self, init: F) -> Result<(), EnsembleError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Arc<dyn PoseEstimator>>>,
    {
        if self.is_ready().await {
            info!("Pose estimator already initialized");
            return Ok(());
        }

        info!("Initializing pose estimator...");
        let estimator = init().await.map_err(EnsembleError::EstimatorInit)?;
        self.install(estimator).await;
        Ok(())
    }

    pub async fn install(&self, estimator: Arc<dyn PoseEstimator>) {
        let mut slot = self.inner.estimator.write().await;
        *slot = Some(estimator);
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Pose estimator ready (generation {})", generation);
    }

    /// Drops the estimator. Results still in flight become stale.
    pub async fn clear(&self) {
        let mut slot = self.inner.estimator.write().await;
        if slot.take().is_some() {
            info!("Pose estimator cleared");
        }
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn is_ready(&self) -> bool {
        self.inner.estimator.read().await.is_some()
    }

    /// Current estimator together with the generation it belongs to.
    pub async fn snapshot(&self) -> Option<(Arc<dyn PoseEstimator>, u64)> {
        let slot = self.inner.estimator.read().await;
        let estimator = slot.as_ref()?.clone();
        Some((estimator, self.inner.generation.load(Ordering::SeqCst)))
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }
}

/// A standing dancer swinging both arms, in estimator coordinates, at time `t`.
pub fn standing_body(t: f64) -> DetectedBody {
    let mut keypoints = vec![RawKeypoint::new(0.0, 0.0, 0.0); Keypoint::RAW_COUNT];
    let mut set = |kp: Keypoint, x: f64, y: f64, z: f64| {
        keypoints[kp.index()] = RawKeypoint {
            x,
            y,
            z,
            score: Some(0.9),
        };
    };

    set(Keypoint::Nose, 0.0, -0.65, -0.08);
    set(Keypoint::LeftEyeInner, 0.015, -0.68, -0.07);
    set(Keypoint::LeftEye, 0.03, -0.68, -0.06);
    set(Keypoint::LeftEyeOuter, 0.045, -0.68, -0.05);
    set(Keypoint::RightEyeInner, -0.015, -0.68, -0.07);
    set(Keypoint::RightEye, -0.03, -0.68, -0.06);
    set(Keypoint::RightEyeOuter, -0.045, -0.68, -0.05);
    set(Keypoint::LeftEar, 0.07, -0.66, 0.0);
    set(Keypoint::RightEar, -0.07, -0.66, 0.0);
    set(Keypoint::MouthLeft, 0.02, -0.61, -0.06);
    set(Keypoint::MouthRight, -0.02, -0.61, -0.06);

    let sway = 0.02 * t.sin();
    for (side, phase) in [(1.0, 0.0), (-1.0, std::f64::consts::PI)] {
        let (shoulder, elbow, wrist, pinky, index, thumb) = if side > 0.0 {
            (
                Keypoint::LeftShoulder,
                Keypoint::LeftElbow,
                Keypoint::LeftWrist,
                Keypoint::LeftPinky,
                Keypoint::LeftIndex,
                Keypoint::LeftThumb,
            )
        } else {
            (
                Keypoint::RightShoulder,
                Keypoint::RightElbow,
                Keypoint::RightWrist,
                Keypoint::RightPinky,
                Keypoint::RightIndex,
                Keypoint::RightThumb,
            )
        };

        let upper = 0.3 + 0.6 * (2.0 * t + phase).sin();
        let lower = upper + 0.4;
        let s = (side * 0.18 + sway, -0.5, 0.0);
        let e = (s.0 + side * 0.27 * upper.sin(), s.1 + 0.27 * upper.cos(), 0.02);
        let w = (e.0 + side * 0.25 * lower.sin(), e.1 + 0.25 * lower.cos(), -0.03);
        let hand = (side * lower.sin(), lower.cos());

        set(shoulder, s.0, s.1, s.2);
        set(elbow, e.0, e.1, e.2);
        set(wrist, w.0, w.1, w.2);
        set(pinky, w.0 + 0.08 * hand.0 + side * 0.01, w.1 + 0.08 * hand.1, w.2 + 0.01);
        set(index, w.0 + 0.08 * hand.0 - side * 0.01, w.1 + 0.08 * hand.1, w.2 - 0.01);
        set(thumb, w.0 + 0.05 * hand.0, w.1 + 0.05 * hand.1, w.2 - 0.03);
    }

    for (side, hip, knee, ankle, heel, toe) in [
        (
            1.0,
            Keypoint::LeftHip,
            Keypoint::LeftKnee,
            Keypoint::LeftAnkle,
            Keypoint::LeftHeel,
            Keypoint::LeftToe,
        ),
        (
            -1.0,
            Keypoint::RightHip,
            Keypoint::RightKnee,
            Keypoint::RightAnkle,
            Keypoint::RightHeel,
            Keypoint::RightToe,
        ),
    ] {
        set(hip, side * 0.1 + sway, 0.0, 0.0);
        set(knee, side * 0.11, 0.45, -0.02);
        set(ankle, side * 0.11, 0.85, 0.0);
        set(heel, side * 0.11, 0.9, 0.04);
        set(toe, side * 0.12, 0.92, -0.1);
    }

    DetectedBody { keypoints }
}

/// Stand-in estimator that ignores the image and animates `standing_body`
/// on its own clock.
pub struct SimulatedEstimator {
    clock: Mutex<f64>,
    step: f64,
}

impl Default for SimulatedEstimator {
    fn default() -> Self {
        Self::new(1.0 / 30.0)
    }
}

impl SimulatedEstimator {
    pub fn new(step: f64) -> Self {
        Self {
            clock: Mutex::new(0.0),
            step,
        }
    }
}

#[async_trait]
impl PoseEstimator for SimulatedEstimator {
    async fn estimate(&self, _frame: &DynamicImage) -> anyhow::Result<Vec<DetectedBody>> {
        let t = {
            let mut clock = self.clock.lock().await;
            let t = *clock;
            *clock += self.step;
            t
        };
        tokio::task::yield_now().await;
        Ok(vec![standing_body(t)])
    }
}
