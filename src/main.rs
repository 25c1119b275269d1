// src/main.rs
use anyhow::Result;
use image::DynamicImage;
use puppet_ensemble::assets::BuiltinAssetLoader;
use puppet_ensemble::data::PoseRecorder;
use puppet_ensemble::estimator::standing_body;
use puppet_ensemble::keypoints::{BODY_OUTLINE, LEFT_ARM};
use puppet_ensemble::{
    DetectorContext, EnsembleConfig, EnsembleTracker, PoseEstimator, SimulatedEstimator, VideoFrame,
};
use std::sync::Arc;
use tracing::{debug, info};

const CLIP_FRAMES: usize = 90;
const CLIP_FPS: f64 = 30.0;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading ensemble config from {}", path);
            EnsembleConfig::load(&path)?
        }
        None => EnsembleConfig::default(),
    };

    let detector = DetectorContext::new();
    let mut tracker = EnsembleTracker::new(&config, detector.clone());

    let loaded = tracker.load_puppets(&BuiltinAssetLoader::default()).await;
    info!("{} of {} puppets loaded", loaded, tracker.puppets().len());

    detector
        .initialize(|| async { Ok(Arc::new(SimulatedEstimator::default()) as Arc<dyn PoseEstimator>) })
        .await?;

    let mut recorder = PoseRecorder::new(PoseRecorder::default_output_dir(), None);
    let image = DynamicImage::new_rgb8(640, 360);

    // First frame is forced, like a freshly loaded clip.
    for i in 0..CLIP_FRAMES {
        // every tenth tick repeats the previous playback time, as when the
        // render loop outruns the video
        let frame_index = if i % 10 == 9 { i - 1 } else { i };
        let frame = VideoFrame::new(image.clone(), frame_index as f64 / CLIP_FPS);

        let outcome = tracker.solve_current(&frame, i == 0).await;
        if outcome.is_applied() {
            recorder.add_frame(frame.timestamp, tracker.puppets());
        }
    }

    // Skeleton lines and axis gizmos for the rest pose
    if let Ok(frame) = tracker.solver().solve(&[standing_body(0.0)]) {
        debug!("Left arm line: {:?}", frame.polyline(&LEFT_ARM));
        debug!("Body outline: {:?}", frame.polyline(&BODY_OUTLINE));
        for (segment, axes) in tracker.transformer().axes(&frame) {
            debug!("{} axes: {:?}", segment.name(), axes.map(|t| t.rotation));
        }
    }

    let metrics = tracker.metrics();
    info!(
        "{} passes, avg {:.3} ms ({:.0} passes/s)",
        metrics.passes,
        metrics.avg_processing_time * 1000.0,
        metrics.avg_fps
    );

    let csv_path = recorder.export_csv()?;
    info!("Recorded {} frames to {}", recorder.frame_count(), csv_path.display());

    detector.clear().await;
    Ok(())
}
