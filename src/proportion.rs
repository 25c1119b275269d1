// src/proportion.rs - Fits estimated shoulder and hip widths to the puppet mesh
use crate::basis::BasisBuilder;
use crate::config::ProportionRule;
use crate::error::DegenerateGeometry;
use crate::keypoints::{Keypoint, PoseFrame};
use nalgebra::Vector3;
use tracing::warn;

const MIN_DISTANCE: f64 = 1e-9;

/// Moves a joint along its anchor axis until it sits at a target distance,
/// carrying every downstream keypoint of the limb by the same displacement.
///
/// The displacement is found in the anchor's local basis: the joint is
/// expressed there, only the bone-aligned axis is scaled, and the result is
/// brought back to world space. Applying one displacement to the whole chain
/// keeps the limb's internal proportions intact. A mis-set target therefore
/// shifts the entire limb, not just the joint.
#[derive(Debug, Clone)]
pub struct ProportionCorrector {
    basis: BasisBuilder,
    rules: Vec<ProportionRule>,
}

impl ProportionCorrector {
    pub fn new(basis: BasisBuilder, rules: Vec<ProportionRule>) -> Self {
        Self { basis, rules }
    }

    pub fn rules(&self) -> &[ProportionRule] {
        &self.rules
    }

    /// Returns the applied scale factor.
    pub fn correct(
        &self,
        frame: &mut PoseFrame,
        anchor: Keypoint,
        joint: Keypoint,
        chain: &[Keypoint],
        target: f64,
    ) -> Result<f64, DegenerateGeometry> {
        let offset = frame.bone(anchor, joint);
        if !offset.iter().all(|c| c.is_finite()) {
            return Err(DegenerateGeometry::NonFinite);
        }
        let current = offset.norm();
        if current < MIN_DISTANCE {
            return Err(DegenerateGeometry::ZeroLength);
        }
        let scale = target / current;

        let displacement = match self.basis.build(&offset) {
            Ok(basis) => {
                let rotation = basis.rotation();
                let local = rotation.inverse_transform_vector(&offset);
                let scaled = Vector3::new(local.x, local.y, local.z * scale);
                rotation.transform_vector(&scaled) - offset
            }
            // Along the pole the local z axis is the offset itself.
            Err(DegenerateGeometry::ParallelToPole) => offset * (scale - 1.0),
            Err(e) => return Err(e),
        };

        for kp in chain {
            frame[*kp] += displacement;
        }

        Ok(scale)
    }

    /// Runs every configured rule. A rule whose anchor and joint coincide is
    /// skipped for this frame.
    pub fn apply(&self, frame: &mut PoseFrame) {
        for rule in &self.rules {
            if let Err(e) = self.correct(frame, rule.anchor, rule.joint, rule.chain.keypoints(), rule.target) {
                warn!(
                    "Skipping proportion correction {:?} -> {:?}: {}",
                    rule.anchor, rule.joint, e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnsembleConfig;
    use crate::keypoints::{LEFT_ARM, LEFT_LEG, RIGHT_ARM, RIGHT_LEG};

    const TOLERANCE: f64 = 1e-9;

    fn standing_frame() -> PoseFrame {
        let mut frame = PoseFrame::from_points([Vector3::zeros(); Keypoint::COUNT]);
        frame[Keypoint::ChestCenter] = Vector3::new(0.0, 1.4, 0.0);
        frame[Keypoint::LeftShoulder] = Vector3::new(0.19, 1.41, 0.02);
        frame[Keypoint::LeftElbow] = Vector3::new(0.22, 1.15, 0.05);
        frame[Keypoint::LeftWrist] = Vector3::new(0.24, 0.92, 0.12);
        frame[Keypoint::LeftFinger] = Vector3::new(0.25, 0.84, 0.14);
        frame[Keypoint::RightShoulder] = Vector3::new(-0.17, 1.39, -0.01);
        frame[Keypoint::RightElbow] = Vector3::new(-0.25, 1.17, 0.0);
        frame[Keypoint::RightWrist] = Vector3::new(-0.3, 0.95, -0.06);
        frame[Keypoint::RightFinger] = Vector3::new(-0.31, 0.87, -0.08);
        frame[Keypoint::HipCenter] = Vector3::new(0.0, 0.9, 0.0);
        frame[Keypoint::LeftHip] = Vector3::new(0.11, 0.9, 0.01);
        frame[Keypoint::LeftKnee] = Vector3::new(0.12, 0.5, 0.03);
        frame[Keypoint::LeftAnkle] = Vector3::new(0.12, 0.1, 0.0);
        frame[Keypoint::LeftHeel] = Vector3::new(0.12, 0.05, -0.04);
        frame[Keypoint::LeftToe] = Vector3::new(0.13, 0.0, 0.1);
        frame[Keypoint::RightHip] = Vector3::new(-0.12, 0.89, 0.0);
        frame[Keypoint::RightKnee] = Vector3::new(-0.13, 0.5, 0.02);
        frame[Keypoint::RightAnkle] = Vector3::new(-0.12, 0.1, 0.01);
        frame[Keypoint::RightHeel] = Vector3::new(-0.12, 0.04, -0.03);
        frame[Keypoint::RightToe] = Vector3::new(-0.14, 0.0, 0.1);
        frame
    }

    fn corrector() -> ProportionCorrector {
        let config = EnsembleConfig::default();
        ProportionCorrector::new(BasisBuilder::new(config.basis_length), config.proportions)
    }

    #[test]
    fn test_all_rules_hit_target_distance() {
        let mut frame = standing_frame();
        let corrector = corrector();
        corrector.apply(&mut frame);

        for rule in corrector.rules() {
            let d = frame.distance(rule.anchor, rule.joint);
            assert!((d - rule.target).abs() < TOLERANCE, "{:?}: {d}", rule.joint);
        }
    }

    #[test]
    fn test_direction_unchanged() {
        let before = standing_frame();
        let mut after = before.clone();
        corrector().apply(&mut after);

        for (anchor, joint) in [
            (Keypoint::ChestCenter, Keypoint::LeftShoulder),
            (Keypoint::HipCenter, Keypoint::RightHip),
        ] {
            let a = before.bone(anchor, joint).normalize();
            let b = after.bone(anchor, joint).normalize();
            assert!((a - b).norm() < TOLERANCE);
        }
    }

    #[test]
    fn test_downstream_distances_preserved() {
        let before = standing_frame();
        let mut after = before.clone();
        corrector().apply(&mut after);

        for chain in [&LEFT_ARM[..], &RIGHT_ARM[..], &LEFT_LEG[..], &RIGHT_LEG[..]] {
            for pair in chain.windows(2) {
                let d0 = before.distance(pair[0], pair[1]);
                let d1 = after.distance(pair[0], pair[1]);
                assert!((d0 - d1).abs() < TOLERANCE, "{:?}-{:?}", pair[0], pair[1]);
            }
        }
        let d0 = before.distance(Keypoint::LeftElbow, Keypoint::LeftWrist);
        let d1 = after.distance(Keypoint::LeftElbow, Keypoint::LeftWrist);
        assert!((d0 - d1).abs() < TOLERANCE);
    }

    #[test]
    fn test_arm_and_leg_corrections_do_not_interfere() {
        let config = EnsembleConfig::default();
        let basis = BasisBuilder::default();
        let arms = ProportionCorrector::new(basis, config.proportions[..2].to_vec());
        let legs = ProportionCorrector::new(basis, config.proportions[2..].to_vec());

        let mut arms_only = standing_frame();
        arms.apply(&mut arms_only);
        let mut both = arms_only.clone();
        legs.apply(&mut both);

        for kp in LEFT_ARM.iter().chain(RIGHT_ARM.iter()) {
            assert_eq!(arms_only[*kp], both[*kp]);
        }
        assert_eq!(arms_only[Keypoint::ChestCenter], both[Keypoint::ChestCenter]);
    }

    #[test]
    fn test_anchor_not_moved() {
        let before = standing_frame();
        let mut after = before.clone();
        corrector().apply(&mut after);
        assert_eq!(before[Keypoint::ChestCenter], after[Keypoint::ChestCenter]);
        assert_eq!(before[Keypoint::HipCenter], after[Keypoint::HipCenter]);
    }

    #[test]
    fn test_pole_parallel_offset_still_corrected() {
        let mut frame = standing_frame();
        frame[Keypoint::LeftShoulder] = frame[Keypoint::ChestCenter] + Vector3::new(0.0, 0.0, 0.3);
        let scale = corrector()
            .correct(&mut frame, Keypoint::ChestCenter, Keypoint::LeftShoulder, &LEFT_ARM, 0.1)
            .unwrap();
        assert!((scale - 1.0 / 3.0).abs() < TOLERANCE);
        assert!((frame.distance(Keypoint::ChestCenter, Keypoint::LeftShoulder) - 0.1).abs() < TOLERANCE);
    }

    #[test]
    fn test_coincident_points_are_skipped() {
        let mut frame = standing_frame();
        frame[Keypoint::RightHip] = frame[Keypoint::HipCenter];
        let before = frame.clone();
        let result = corrector().correct(&mut frame, Keypoint::HipCenter, Keypoint::RightHip, &RIGHT_LEG, 0.075);
        assert_eq!(result, Err(DegenerateGeometry::ZeroLength));
        assert_eq!(frame, before);
    }

    #[test]
    fn test_non_finite_joint_leaves_chain_untouched() {
        let mut frame = standing_frame();
        frame[Keypoint::LeftShoulder].x = f64::NAN;
        let before_elbow = frame[Keypoint::LeftElbow];

        let result = corrector().correct(&mut frame, Keypoint::ChestCenter, Keypoint::LeftShoulder, &LEFT_ARM, 0.1);
        assert_eq!(result, Err(DegenerateGeometry::NonFinite));
        assert_eq!(frame[Keypoint::LeftElbow], before_elbow);

        // the other rules still run
        corrector().apply(&mut frame);
        let d = frame.distance(Keypoint::ChestCenter, Keypoint::RightShoulder);
        assert!((d - 0.1).abs() < TOLERANCE);
        assert!(frame[Keypoint::LeftWrist].iter().all(|c| c.is_finite()));
    }
}
