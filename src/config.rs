// src/config.rs - Puppet-mesh constants and ensemble layout
use crate::error::ConfigError;
use crate::keypoints::{Keypoint, LimbChain};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed anchor-to-joint distance required by the puppet mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProportionRule {
    pub anchor: Keypoint,
    pub joint: Keypoint,
    pub chain: LimbChain,
    pub target: f64,
}

/// Head placement is calibrated to the model rather than derived from keypoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadCalibration {
    pub offset_y: f64,
    pub scale: f64,
}

impl Default for HeadCalibration {
    fn default() -> Self {
        Self {
            offset_y: -0.1,
            scale: 2.5,
        }
    }
}

/// Where a follower stands relative to the lead, and how large it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub face: String,
    pub offset: Vector3<f64>,
    pub scale: f64,
}

impl Placement {
    pub fn new(face: impl Into<String>, offset: Vector3<f64>, scale: f64) -> Self {
        Self {
            face: face.into(),
            offset,
            scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageLayout {
    pub lead_face: String,
    pub lead_position: Vector3<f64>,
    pub followers: Vec<Placement>,
}

impl Default for StageLayout {
    fn default() -> Self {
        Self {
            lead_face: "face_ambre".to_string(),
            lead_position: Vector3::new(0.5, 0.0, -0.5),
            followers: vec![
                Placement::new("face_manu", Vector3::new(-0.5, 0.0, -0.5), 1.0),
                Placement::new("face_lani", Vector3::new(-1.0, 0.0, 0.0), 0.75),
                Placement::new("face_marlo", Vector3::new(1.0, 0.0, 0.0), 0.5),
            ],
        }
    }
}

impl StageLayout {
    /// Placements for every puppet, lead first at zero offset.
    pub fn placements(&self) -> Vec<Placement> {
        let mut placements = Vec::with_capacity(self.followers.len() + 1);
        placements.push(Placement::new(self.lead_face.clone(), Vector3::zeros(), 1.0));
        placements.extend(self.followers.iter().cloned());
        placements
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Axis length used when building rotation bases
    #[serde(default = "default_basis_length")]
    pub basis_length: f64,
    /// Height of the synthesized head point above the chest center
    #[serde(default = "default_head_height")]
    pub head_height: f64,
    #[serde(default = "default_proportions")]
    pub proportions: Vec<ProportionRule>,
    #[serde(default)]
    pub head: HeadCalibration,
    #[serde(default)]
    pub stage: StageLayout,
}

fn default_basis_length() -> f64 {
    1.0
}

fn default_head_height() -> f64 {
    0.3
}

fn default_proportions() -> Vec<ProportionRule> {
    vec![
        ProportionRule {
            anchor: Keypoint::ChestCenter,
            joint: Keypoint::LeftShoulder,
            chain: LimbChain::LeftArm,
            target: 0.1,
        },
        ProportionRule {
            anchor: Keypoint::ChestCenter,
            joint: Keypoint::RightShoulder,
            chain: LimbChain::RightArm,
            target: 0.1,
        },
        ProportionRule {
            anchor: Keypoint::HipCenter,
            joint: Keypoint::LeftHip,
            chain: LimbChain::LeftLeg,
            target: 0.075,
        },
        ProportionRule {
            anchor: Keypoint::HipCenter,
            joint: Keypoint::RightHip,
            chain: LimbChain::RightLeg,
            target: 0.075,
        },
    ]
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            basis_length: default_basis_length(),
            head_height: default_head_height(),
            proportions: default_proportions(),
            head: HeadCalibration::default(),
            stage: StageLayout::default(),
        }
    }
}

impl EnsembleConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: EnsembleConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.validate()?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.basis_length.is_finite() && self.basis_length > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "basis_length must be positive, got {}",
                self.basis_length
            )));
        }

        if !self.head_height.is_finite() {
            return Err(ConfigError::Invalid("head_height must be finite".to_string()));
        }

        for rule in &self.proportions {
            if !(rule.target.is_finite() && rule.target > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "proportion target for {:?} -> {:?} must be positive, got {}",
                    rule.anchor, rule.joint, rule.target
                )));
            }
            if !rule.chain.keypoints().contains(&rule.joint) {
                return Err(ConfigError::Invalid(format!(
                    "joint {:?} is not part of chain {:?}",
                    rule.joint, rule.chain
                )));
            }
            if rule.chain.keypoints().contains(&rule.anchor) {
                return Err(ConfigError::Invalid(format!(
                    "anchor {:?} must not be part of chain {:?}",
                    rule.anchor, rule.chain
                )));
            }
        }

        if !(self.head.scale.is_finite() && self.head.scale > 0.0) || !self.head.offset_y.is_finite() {
            return Err(ConfigError::Invalid("head calibration must be finite with positive scale".to_string()));
        }

        let stage_finite = |v: &Vector3<f64>| v.iter().all(|c| c.is_finite());
        if !stage_finite(&self.stage.lead_position) {
            return Err(ConfigError::Invalid("lead_position must be finite".to_string()));
        }
        for follower in &self.stage.followers {
            if !stage_finite(&follower.offset) {
                return Err(ConfigError::Invalid(format!(
                    "offset for {} must be finite",
                    follower.face
                )));
            }
            if !(follower.scale.is_finite() && follower.scale > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "scale for {} must be positive, got {}",
                    follower.face, follower.scale
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = EnsembleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.proportions.len(), 4);
        assert_eq!(config.stage.followers.len(), 3);
    }

    #[test]
    fn test_placements_put_lead_first() {
        let placements = StageLayout::default().placements();
        assert_eq!(placements.len(), 4);
        assert_eq!(placements[0].face, "face_ambre");
        assert_eq!(placements[0].offset, Vector3::zeros());
        assert_eq!(placements[3].scale, 0.5);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = EnsembleConfig::default();
        config.proportions[0].target = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = EnsembleConfig::default();
        config.stage.followers[1].scale = -1.0;
        assert!(config.validate().is_err());

        let mut config = EnsembleConfig::default();
        config.proportions[2].chain = LimbChain::LeftArm;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EnsembleConfig = serde_json::from_str(r#"{ "head_height": 0.4 }"#).unwrap();
        assert_eq!(config.head_height, 0.4);
        assert_eq!(config.basis_length, 1.0);
        assert_eq!(config.head, HeadCalibration::default());
        assert_eq!(config.proportions, default_proportions());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("puppet_ensemble_{}", uuid::Uuid::new_v4()));
        let path = dir.join("ensemble.json");

        let mut config = EnsembleConfig::default();
        config.stage.lead_position = Vector3::new(0.0, 0.0, -1.0);
        config.save(&path).unwrap();

        let loaded = EnsembleConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(dir).ok();
    }
}
