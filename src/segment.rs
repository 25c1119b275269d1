// src/segment.rs - Puppet body segments and their per-frame transforms
use crate::basis::BasisBuilder;
use crate::config::HeadCalibration;
use crate::error::{AssetError, DegenerateGeometry};
use crate::keypoints::{Keypoint, PoseFrame};
use crate::puppet::{Puppet, SegmentGeometry};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SEGMENT_COUNT: usize = 14;

/// Rigid puppet parts, in the order the model stores its meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    LeftUpperLeg = 0,
    LeftLowerLeg = 1,
    LeftFoot = 2,
    RightUpperLeg = 3,
    RightLowerLeg = 4,
    RightFoot = 5,
    LeftUpperArm = 6,
    LeftLowerArm = 7,
    LeftHand = 8,
    RightUpperArm = 9,
    RightLowerArm = 10,
    RightHand = 11,
    Body = 12,
    Head = 13,
}

impl SegmentKind {
    /// Index of this segment's mesh in the model.
    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            SegmentKind::LeftUpperLeg => "left_upper_leg",
            SegmentKind::LeftLowerLeg => "left_lower_leg",
            SegmentKind::LeftFoot => "left_foot",
            SegmentKind::RightUpperLeg => "right_upper_leg",
            SegmentKind::RightLowerLeg => "right_lower_leg",
            SegmentKind::RightFoot => "right_foot",
            SegmentKind::LeftUpperArm => "left_upper_arm",
            SegmentKind::LeftLowerArm => "left_lower_arm",
            SegmentKind::LeftHand => "left_hand",
            SegmentKind::RightUpperArm => "right_upper_arm",
            SegmentKind::RightLowerArm => "right_lower_arm",
            SegmentKind::RightHand => "right_hand",
            SegmentKind::Body => "body",
            SegmentKind::Head => "head",
        }
    }
}

/// A segment is placed at `start` and points toward `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub start: Keypoint,
    pub end: Keypoint,
}

const fn seg(kind: SegmentKind, start: Keypoint, end: Keypoint) -> Segment {
    Segment { kind, start, end }
}

/// Indexed by `SegmentKind::slot`.
pub const SEGMENTS: [Segment; SEGMENT_COUNT] = [
    seg(SegmentKind::LeftUpperLeg, Keypoint::LeftHip, Keypoint::LeftKnee),
    seg(SegmentKind::LeftLowerLeg, Keypoint::LeftKnee, Keypoint::LeftAnkle),
    seg(SegmentKind::LeftFoot, Keypoint::LeftAnkle, Keypoint::LeftHeel),
    seg(SegmentKind::RightUpperLeg, Keypoint::RightHip, Keypoint::RightKnee),
    seg(SegmentKind::RightLowerLeg, Keypoint::RightKnee, Keypoint::RightAnkle),
    seg(SegmentKind::RightFoot, Keypoint::RightAnkle, Keypoint::RightHeel),
    seg(SegmentKind::LeftUpperArm, Keypoint::LeftShoulder, Keypoint::LeftElbow),
    seg(SegmentKind::LeftLowerArm, Keypoint::LeftElbow, Keypoint::LeftWrist),
    seg(SegmentKind::LeftHand, Keypoint::LeftWrist, Keypoint::LeftFinger),
    seg(SegmentKind::RightUpperArm, Keypoint::RightShoulder, Keypoint::RightElbow),
    seg(SegmentKind::RightLowerArm, Keypoint::RightElbow, Keypoint::RightWrist),
    seg(SegmentKind::RightHand, Keypoint::RightWrist, Keypoint::RightFinger),
    seg(SegmentKind::Body, Keypoint::HipCenter, Keypoint::ChestCenter),
    seg(SegmentKind::Head, Keypoint::ChestCenter, Keypoint::Head),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
    pub scale: Vector3<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

/// Outcome of posing one puppet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformReport {
    /// Segments whose bone was degenerate and kept last frame's rotation.
    pub held_rotations: Vec<SegmentKind>,
}

/// Places, orients and stretches each segment mesh along its bone.
#[derive(Debug, Clone)]
pub struct SegmentTransformer {
    basis: BasisBuilder,
    head: HeadCalibration,
}

impl SegmentTransformer {
    pub fn new(basis: BasisBuilder, head: HeadCalibration) -> Self {
        Self { basis, head }
    }

    /// Stretch along the bone axis so a mesh of `intrinsic_length` spans `bone_length`.
    pub fn bone_scale(bone_length: f64, intrinsic_length: f64) -> f64 {
        bone_length / intrinsic_length
    }

    /// Transform for a single segment. The second value is false when the bone
    /// was degenerate and the geometry's current rotation was kept. A bone with
    /// a non-finite end keeps the whole current transform.
    pub fn segment_transform(
        &self,
        frame: &PoseFrame,
        segment: &Segment,
        geometry: &SegmentGeometry,
    ) -> (Transform, bool) {
        let bone = frame.bone(segment.start, segment.end);
        let mut position = frame[segment.start];

        let (rotation, oriented) = match self.basis.build(&bone) {
            Ok(basis) => (basis.rotation(), true),
            Err(DegenerateGeometry::NonFinite) => {
                debug!("Holding transform of {}: non-finite keypoint", segment.kind.name());
                return (geometry.transform, false);
            }
            Err(e) => {
                debug!("Holding rotation of {}: {}", segment.kind.name(), e);
                (geometry.transform.rotation, false)
            }
        };

        let scale = if segment.kind == SegmentKind::Head {
            position.y += self.head.offset_y;
            Vector3::repeat(self.head.scale)
        } else {
            let mut scale = geometry.authored_scale;
            scale.z = Self::bone_scale(bone.norm(), geometry.intrinsic_length());
            scale
        };

        (
            Transform {
                position,
                rotation,
                scale,
            },
            oriented,
        )
    }

    /// Writes every segment transform onto the puppet's geometry.
    pub fn apply(&self, frame: &PoseFrame, puppet: &mut Puppet) -> Result<TransformReport, AssetError> {
        let geometry = puppet.segments_mut()?;
        let mut report = TransformReport::default();

        for segment in &SEGMENTS {
            let slot = &mut geometry[segment.kind.slot()];
            let (transform, oriented) = self.segment_transform(frame, segment, slot);
            if !oriented {
                report.held_rotations.push(segment.kind);
            }
            slot.transform = transform;
        }

        Ok(report)
    }

    /// Position and orientation of each segment without stretch, for drawing
    /// axis gizmos. Degenerate bones yield `None`.
    pub fn axes(&self, frame: &PoseFrame) -> Vec<(SegmentKind, Option<Transform>)> {
        SEGMENTS
            .iter()
            .map(|segment| {
                let bone = frame.bone(segment.start, segment.end);
                let transform = self.basis.build(&bone).ok().map(|basis| Transform {
                    position: frame[segment.start],
                    rotation: basis.rotation(),
                    scale: Vector3::new(1.0, 1.0, 1.0),
                });
                (segment.kind, transform)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puppet::{Material, MeshBounds};

    const TOLERANCE: f64 = 1e-9;

    fn unit_geometry() -> SegmentGeometry {
        SegmentGeometry::new(
            MeshBounds::new(Vector3::new(-0.1, -0.2, 0.0), Vector3::new(0.1, 0.2, 1.0)),
            Material::Outfit("outfit_1".to_string()),
        )
        .unwrap()
    }

    fn frame_with(start: Keypoint, start_pos: Vector3<f64>, end: Keypoint, end_pos: Vector3<f64>) -> PoseFrame {
        let mut frame = PoseFrame::from_points([Vector3::zeros(); Keypoint::COUNT]);
        frame[start] = start_pos;
        frame[end] = end_pos;
        frame
    }

    fn transformer() -> SegmentTransformer {
        SegmentTransformer::new(BasisBuilder::default(), HeadCalibration::default())
    }

    #[test]
    fn test_table_matches_slots() {
        for (i, segment) in SEGMENTS.iter().enumerate() {
            assert_eq!(segment.kind.slot(), i);
        }
    }

    #[test]
    fn test_segment_keypoints_exist_after_synthesis() {
        for segment in &SEGMENTS {
            assert!(segment.start.index() < Keypoint::COUNT);
            assert!(segment.end.index() < Keypoint::COUNT);
            assert_ne!(segment.start, segment.end);
        }
    }

    #[test]
    fn test_scale_factor_from_intrinsic_length() {
        assert_eq!(SegmentTransformer::bone_scale(2.0, 1.0), 2.0);

        let frame = frame_with(
            Keypoint::LeftShoulder,
            Vector3::new(0.0, 2.0, 0.0),
            Keypoint::LeftElbow,
            Vector3::new(0.0, 0.0, 0.0),
        );
        let (t, oriented) = transformer().segment_transform(&frame, &SEGMENTS[6], &unit_geometry());
        assert!(oriented);
        assert!((t.scale.z - 2.0).abs() < TOLERANCE);
        assert_eq!(t.scale.x, 1.0);
        assert_eq!(t.scale.y, 1.0);
        assert_eq!(t.position, Vector3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_rotation_points_local_z_along_bone() {
        let start = Vector3::new(0.1, 1.0, 0.2);
        let end = Vector3::new(0.3, 0.6, 0.1);
        let frame = frame_with(Keypoint::LeftKnee, start, Keypoint::LeftAnkle, end);
        let (t, _) = transformer().segment_transform(&frame, &SEGMENTS[1], &unit_geometry());
        let axis = t.rotation * Vector3::z();
        assert!((axis - (end - start).normalize()).norm() < TOLERANCE);
    }

    #[test]
    fn test_head_override() {
        let chest = Vector3::new(0.0, 1.4, 0.0);
        let frame = frame_with(Keypoint::ChestCenter, chest, Keypoint::Head, chest + Vector3::new(0.0, 0.3, 0.0));
        let (t, _) = transformer().segment_transform(&frame, &SEGMENTS[13], &unit_geometry());
        assert!((t.position.y - 1.3).abs() < TOLERANCE);
        assert_eq!(t.scale, Vector3::new(2.5, 2.5, 2.5));
    }

    #[test]
    fn test_degenerate_bone_holds_rotation() {
        let mut geometry = unit_geometry();
        let previous = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
        geometry.transform.rotation = previous;

        let p = Vector3::new(0.2, 0.5, 0.0);
        let frame = frame_with(Keypoint::LeftWrist, p, Keypoint::LeftFinger, p);
        let (t, oriented) = transformer().segment_transform(&frame, &SEGMENTS[8], &geometry);
        assert!(!oriented);
        assert_eq!(t.rotation, previous);
        assert_eq!(t.position, p);
    }

    #[test]
    fn test_non_finite_bone_holds_transform() {
        let mut geometry = unit_geometry();
        geometry.transform = Transform {
            position: Vector3::new(0.1, 1.2, 0.0),
            rotation: UnitQuaternion::from_euler_angles(0.3, 0.0, 0.1),
            scale: Vector3::new(1.0, 1.0, 0.8),
        };

        let mut frame = frame_with(
            Keypoint::LeftShoulder,
            Vector3::new(0.2, 1.4, 0.0),
            Keypoint::LeftElbow,
            Vector3::new(0.3, 1.1, 0.0),
        );
        frame[Keypoint::LeftElbow].x = f64::NAN;

        let upper = transformer().segment_transform(&frame, &SEGMENTS[6], &geometry);
        assert_eq!(upper, (geometry.transform, false));
        let lower = transformer().segment_transform(&frame, &SEGMENTS[7], &geometry);
        assert_eq!(lower, (geometry.transform, false));
    }

    #[test]
    fn test_axes_skip_degenerate_bones() {
        let frame = PoseFrame::from_points([Vector3::zeros(); Keypoint::COUNT]);
        let axes = transformer().axes(&frame);
        assert_eq!(axes.len(), SEGMENT_COUNT);
        assert!(axes.iter().all(|(_, t)| t.is_none()));
    }
}
