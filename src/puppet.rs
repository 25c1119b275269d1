// src/puppet.rs - A posable puppet instance and its segment meshes
use crate::error::AssetError;
use crate::segment::{SegmentKind, Transform, SEGMENT_COUNT};
use async_trait::async_trait;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Axis-aligned bounds of a mesh in its own local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshBounds {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl MeshBounds {
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Self {
        Self { min, max }
    }

    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Material {
    Outfit(String),
    Face(String),
}

/// One segment mesh owned by a puppet.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentGeometry {
    pub transform: Transform,
    /// Scale the mesh was authored with; only the bone axis is overridden.
    pub authored_scale: Vector3<f64>,
    pub material: Material,
    intrinsic_length: f64,
}

impl SegmentGeometry {
    /// Fails when the mesh has no depth along its local z (bone) axis.
    pub fn new(bounds: MeshBounds, material: Material) -> Option<Self> {
        let intrinsic_length = bounds.extent().z;
        if !(intrinsic_length.is_finite() && intrinsic_length > 0.0) {
            return None;
        }
        Some(Self {
            transform: Transform::default(),
            authored_scale: Vector3::new(1.0, 1.0, 1.0),
            material,
            intrinsic_length,
        })
    }

    /// Mesh length along its bone axis, measured once at load.
    pub fn intrinsic_length(&self) -> f64 {
        self.intrinsic_length
    }
}

/// Everything a loader hands back for one puppet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuppetAssets {
    /// Mesh bounds in segment slot order
    pub meshes: Vec<MeshBounds>,
    pub outfits: Vec<String>,
    pub face: String,
}

#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load_puppet(&self, face: &str) -> anyhow::Result<PuppetAssets>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootTransform {
    pub position: Vector3<f64>,
    pub scale: f64,
}

impl Default for RootTransform {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            scale: 1.0,
        }
    }
}

impl RootTransform {
    pub fn at(position: Vector3<f64>) -> Self {
        Self { position, scale: 1.0 }
    }
}

/// Snapshot of a fully posed puppet.
#[derive(Debug, Clone, PartialEq)]
pub struct PuppetPose {
    pub segments: [Transform; SEGMENT_COUNT],
    pub root: RootTransform,
}

pub struct Puppet {
    id: Uuid,
    face: String,
    outfit: Option<String>,
    segments: Option<Box<[SegmentGeometry; SEGMENT_COUNT]>>,
    root: RootTransform,
    visible: bool,
}

impl Puppet {
    pub fn new(face: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            face: face.into(),
            outfit: None,
            segments: None,
            root: RootTransform::default(),
            visible: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn face(&self) -> &str {
        &self.face
    }

    pub fn outfit(&self) -> Option<&str> {
        self.outfit.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.segments.is_some()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn root(&self) -> RootTransform {
        self.root
    }

    pub fn set_root(&mut self, root: RootTransform) {
        self.root = root;
    }

    pub fn segments(&self) -> Result<&[SegmentGeometry; SEGMENT_COUNT], AssetError> {
        self.segments.as_deref().ok_or(AssetError::NotLoaded)
    }

    pub fn segments_mut(&mut self) -> Result<&mut [SegmentGeometry; SEGMENT_COUNT], AssetError> {
        self.segments.as_deref_mut().ok_or(AssetError::NotLoaded)
    }

    pub fn segment(&self, kind: SegmentKind) -> Result<&SegmentGeometry, AssetError> {
        Ok(&self.segments()?[kind.slot()])
    }

    pub async fn load(&mut self, loader: &dyn AssetLoader) -> Result<(), AssetError> {
        self.segments = None;
        let assets = loader.load_puppet(&self.face).await?;
        self.install(assets)
    }

    /// Builds the segment meshes from loaded assets. A random outfit dresses
    /// every segment; the head wears the face texture. The root stays hidden
    /// until the puppet is first posed.
    pub fn install(&mut self, assets: PuppetAssets) -> Result<(), AssetError> {
        if assets.meshes.len() != SEGMENT_COUNT {
            return Err(AssetError::SegmentCountMismatch {
                found: assets.meshes.len(),
                expected: SEGMENT_COUNT,
            });
        }
        if assets.outfits.is_empty() {
            return Err(AssetError::NoOutfits);
        }

        let outfit = assets.outfits[random_index(assets.outfits.len())].clone();

        let mut geometry = Vec::with_capacity(SEGMENT_COUNT);
        for (slot, bounds) in assets.meshes.iter().enumerate() {
            let material = if slot == SegmentKind::Head.slot() {
                Material::Face(assets.face.clone())
            } else {
                Material::Outfit(outfit.clone())
            };
            let segment = SegmentGeometry::new(*bounds, material).ok_or(AssetError::FlatMesh { slot })?;
            geometry.push(segment);
        }

        let segments: Box<[SegmentGeometry; SEGMENT_COUNT]> = geometry
            .into_boxed_slice()
            .try_into()
            .map_err(|rest: Box<[SegmentGeometry]>| AssetError::SegmentCountMismatch {
                found: rest.len(),
                expected: SEGMENT_COUNT,
            })?;

        info!("Puppet {} loaded wearing {}", self.face, outfit);
        self.segments = Some(segments);
        self.outfit = Some(outfit);
        self.visible = false;
        Ok(())
    }

    pub fn pose(&self) -> Result<PuppetPose, AssetError> {
        let geometry = self.segments()?;
        Ok(PuppetPose {
            segments: std::array::from_fn(|i| geometry[i].transform),
            root: self.root,
        })
    }

    /// Overwrites every segment transform, index for index.
    pub fn set_segment_transforms(&mut self, transforms: &[Transform; SEGMENT_COUNT]) -> Result<(), AssetError> {
        let geometry = self.segments_mut()?;
        for (slot, transform) in geometry.iter_mut().zip(transforms) {
            slot.transform = *transform;
        }
        Ok(())
    }
}

/// Uniform-enough pick in `0..len`. The top 48 bits of a v4 uuid are random;
/// the version and variant bits sit below them.
fn random_index(len: usize) -> usize {
    let (high, _) = Uuid::new_v4().as_u64_pair();
    ((high >> 16) % len as u64) as usize
}
