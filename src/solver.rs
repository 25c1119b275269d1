// src/solver.rs - Estimator output to a corrected, puppet-ready keypoint frame
use crate::basis::BasisBuilder;
use crate::config::EnsembleConfig;
use crate::error::PoseError;
use crate::keypoints::{DetectedBody, PoseFrame};
use crate::normalize::{Normalizer, Synthesizer};
use crate::proportion::ProportionCorrector;

/// Runs normalize, synthesize and proportion correction on the first detected
/// body. Each stage hands the next an owned value; nothing is shared.
#[derive(Debug, Clone)]
pub struct PoseSolver {
    normalizer: Normalizer,
    synthesizer: Synthesizer,
    corrector: ProportionCorrector,
}

impl PoseSolver {
    pub fn new(config: &EnsembleConfig) -> Self {
        Self {
            normalizer: Normalizer,
            synthesizer: Synthesizer::new(config.head_height),
            corrector: ProportionCorrector::new(BasisBuilder::new(config.basis_length), config.proportions.clone()),
        }
    }

    pub fn solve(&self, bodies: &[DetectedBody]) -> Result<PoseFrame, PoseError> {
        let body = bodies.first().ok_or(PoseError::NoBodyDetected)?;
        let normalized = self.normalizer.normalize(&body.keypoints)?;
        let mut frame = self.synthesizer.synthesize(&normalized);
        self.corrector.apply(&mut frame);
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::standing_body;
    use crate::keypoints::{Keypoint, RawKeypoint};

    #[test]
    fn test_no_body() {
        let solver = PoseSolver::new(&EnsembleConfig::default());
        assert_eq!(solver.solve(&[]), Err(PoseError::NoBodyDetected));
    }

    #[test]
    fn test_standing_body_is_corrected() {
        let config = EnsembleConfig::default();
        let frame = PoseSolver::new(&config).solve(&[standing_body(0.0)]).unwrap();

        let shoulder = frame.distance(Keypoint::ChestCenter, Keypoint::LeftShoulder);
        let hip = frame.distance(Keypoint::HipCenter, Keypoint::RightHip);
        assert!((shoulder - 0.1).abs() < 1e-9);
        assert!((hip - 0.075).abs() < 1e-9);
        assert!(frame[Keypoint::Head].y > frame[Keypoint::ChestCenter].y);
    }

    #[test]
    fn test_only_first_body_used() {
        let solver = PoseSolver::new(&EnsembleConfig::default());
        let broken = DetectedBody {
            keypoints: vec![RawKeypoint::new(0.0, 0.0, 0.0); 5],
        };
        let first = solver.solve(&[standing_body(0.0), broken.clone()]);
        assert!(first.is_ok());
        let second = solver.solve(&[broken, standing_body(0.0)]);
        assert!(matches!(second, Err(PoseError::TooFewKeypoints { .. })));
    }
}
