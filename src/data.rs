// src/data.rs - Records ensemble poses and exports them as CSV
use crate::puppet::{Puppet, PuppetPose};
use crate::segment::SEGMENTS;
use anyhow::Result;
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct PoseRecord<'a> {
    timestamp: f64,
    frame: usize,
    puppet: &'a str,
    segment: &'a str,

    position_x: f64,
    position_y: f64,
    position_z: f64,

    rotation_x: f64,
    rotation_y: f64,
    rotation_z: f64,
    rotation_w: f64,

    scale_x: f64,
    scale_y: f64,
    scale_z: f64,

    root_x: f64,
    root_y: f64,
    root_z: f64,
    root_scale: f64,
}

struct RecordedFrame {
    timestamp: f64,
    poses: Vec<(String, PuppetPose)>,
}

pub struct PoseRecorder {
    output_dir: PathBuf,
    session_name: String,
    frames: Vec<RecordedFrame>,
}

impl PoseRecorder {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            frames: Vec::new(),
        }
    }

    /// `<documents>/PuppetEnsemble`, or `./output` when there is no
    /// documents directory.
    pub fn default_output_dir() -> PathBuf {
        directories::UserDirs::new()
            .and_then(|dirs| dirs.document_dir().map(|p| p.join("PuppetEnsemble")))
            .unwrap_or_else(|| PathBuf::from("./output"))
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Snapshots every visible puppet. Puppets that are hidden or not loaded
    /// are left out.
    pub fn add_frame(&mut self, timestamp: f64, puppets: &[Puppet]) {
        let poses = puppets
            .iter()
            .filter(|p| p.is_visible())
            .filter_map(|p| p.pose().ok().map(|pose| (p.face().to_string(), pose)))
            .collect();
        self.frames.push(RecordedFrame { timestamp, poses });
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.output_dir
            .join(&self.session_name)
            .join("puppet_pose.csv");

        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&csv_path)?;
        let mut writer = Writer::from_writer(file);

        for (frame, recorded) in self.frames.iter().enumerate() {
            for (face, pose) in &recorded.poses {
                for segment in &SEGMENTS {
                    let t = &pose.segments[segment.kind.slot()];
                    let q = t.rotation.quaternion();
                    writer.serialize(PoseRecord {
                        timestamp: recorded.timestamp,
                        frame,
                        puppet: face,
                        segment: segment.kind.name(),
                        position_x: t.position.x,
                        position_y: t.position.y,
                        position_z: t.position.z,
                        rotation_x: q.i,
                        rotation_y: q.j,
                        rotation_z: q.k,
                        rotation_w: q.w,
                        scale_x: t.scale.x,
                        scale_y: t.scale.y,
                        scale_z: t.scale.z,
                        root_x: pose.root.position.x,
                        root_y: pose.root.position.y,
                        root_z: pose.root.position.z,
                        root_scale: pose.root.scale,
                    })?;
                }
            }
        }

        writer.flush()?;
        Ok(csv_path)
    }
}
