// src/assets.rs - Puppet asset sources
use crate::puppet::{AssetLoader, MeshBounds, PuppetAssets};
use crate::segment::{SegmentKind, SEGMENTS};
use anyhow::{Context, Result};
use async_trait::async_trait;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// In-memory puppet with box meshes sized to an average adult.
#[derive(Debug, Clone)]
pub struct BuiltinAssetLoader {
    outfits: Vec<String>,
}

impl Default for BuiltinAssetLoader {
    fn default() -> Self {
        Self {
            outfits: (1..=6).map(|i| format!("outfit_{}", i)).collect(),
        }
    }
}

impl BuiltinAssetLoader {
    fn mesh_length(kind: SegmentKind) -> f64 {
        match kind {
            SegmentKind::LeftUpperLeg | SegmentKind::RightUpperLeg => 0.42,
            SegmentKind::LeftLowerLeg | SegmentKind::RightLowerLeg => 0.4,
            SegmentKind::LeftFoot | SegmentKind::RightFoot => 0.08,
            SegmentKind::LeftUpperArm | SegmentKind::RightUpperArm => 0.28,
            SegmentKind::LeftLowerArm | SegmentKind::RightLowerArm => 0.25,
            SegmentKind::LeftHand | SegmentKind::RightHand => 0.09,
            SegmentKind::Body => 0.5,
            SegmentKind::Head => 0.12,
        }
    }

    pub fn meshes() -> Vec<MeshBounds> {
        SEGMENTS
            .iter()
            .map(|segment| {
                let length = Self::mesh_length(segment.kind);
                MeshBounds::new(Vector3::new(-0.04, -0.04, 0.0), Vector3::new(0.04, 0.04, length))
            })
            .collect()
    }
}

#[async_trait]
impl AssetLoader for BuiltinAssetLoader {
    async fn load_puppet(&self, face: &str) -> Result<PuppetAssets> {
        Ok(PuppetAssets {
            meshes: Self::meshes(),
            outfits: self.outfits.clone(),
            face: face.to_string(),
        })
    }
}

/// On-disk description of a puppet model and its textures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PuppetManifest {
    pub meshes: Vec<MeshBounds>,
    pub outfits: Vec<String>,
    pub faces: Vec<String>,
}

/// Reads `<dir>/<model>.json` and checks that the requested face is listed.
#[derive(Debug, Clone)]
pub struct ManifestAssetLoader {
    dir: PathBuf,
    model: String,
}

impl ManifestAssetLoader {
    pub fn new(dir: impl AsRef<Path>, model: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            model: model.into(),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.model))
    }
}

#[async_trait]
impl AssetLoader for ManifestAssetLoader {
    async fn load_puppet(&self, face: &str) -> Result<PuppetAssets> {
        let path = self.manifest_path();
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read puppet manifest {}", path.display()))?;
        let manifest: PuppetManifest = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid puppet manifest {}", path.display()))?;

        if !manifest.faces.iter().any(|f| f == face) {
            return Err(anyhow::anyhow!("Face texture {} not found in {}", face, path.display()));
        }

        Ok(PuppetAssets {
            meshes: manifest.meshes,
            outfits: manifest.outfits,
            face: face.to_string(),
        })
    }
}
