// src/retarget.rs - Copies a solved pose onto the rest of the ensemble
use crate::config::Placement;
use crate::error::AssetError;
use crate::puppet::{Puppet, PuppetPose, RootTransform};
use tracing::debug;

/// Copies segment transforms index for index and places the target's root.
/// Nothing is re-solved per target; the only per-target work is the root
/// offset and uniform scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseRetargeter;

impl PoseRetargeter {
    pub fn retarget(&self, source: &PuppetPose, target: &mut Puppet, placement: &Placement) -> Result<(), AssetError> {
        target.set_segment_transforms(&source.segments)?;
        target.set_root(RootTransform {
            position: source.root.position + placement.offset,
            scale: source.root.scale * placement.scale,
        });
        target.set_visible(true);
        Ok(())
    }

    /// Retargets onto every loaded target and returns how many were posed.
    /// Targets still loading are skipped.
    pub fn retarget_all<'a, I>(&self, source: &PuppetPose, targets: I) -> usize
    where
        I: IntoIterator<Item = (&'a mut Puppet, &'a Placement)>,
    {
        let mut posed = 0;
        for (target, placement) in targets {
            match self.retarget(source, target, placement) {
                Ok(()) => posed += 1,
                Err(e) => debug!("Skipping puppet {}: {}", target.face(), e),
            }
        }
        posed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::BuiltinAssetLoader;
    use crate::puppet::PuppetAssets;
    use crate::segment::{SegmentKind, Transform, SEGMENT_COUNT};
    use nalgebra::{UnitQuaternion, Vector3};

    fn loaded(face: &str) -> Puppet {
        let mut puppet = Puppet::new(face);
        puppet
            .install(PuppetAssets {
                meshes: BuiltinAssetLoader::meshes(),
                outfits: vec!["outfit_1".to_string()],
                face: face.to_string(),
            })
            .unwrap();
        puppet
    }

    fn source_pose() -> PuppetPose {
        let segments: [Transform; SEGMENT_COUNT] = std::array::from_fn(|i| Transform {
            position: Vector3::new(i as f64 * 0.1, 1.0, -0.2),
            rotation: UnitQuaternion::from_euler_angles(0.1 * i as f64, 0.2, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0 + i as f64 * 0.05),
        });
        PuppetPose {
            segments,
            root: RootTransform::at(Vector3::new(0.5, 0.0, -0.5)),
        }
    }

    #[test]
    fn test_root_offset_is_added_not_scaled() {
        let source = source_pose();
        let mut a = loaded("face_manu");
        let mut b = loaded("face_marlo");
        let pa = Placement::new("face_manu", Vector3::new(-0.5, 0.0, -0.5), 1.0);
        let pb = Placement::new("face_marlo", Vector3::new(1.0, 0.0, 0.0), 0.5);

        PoseRetargeter.retarget(&source, &mut a, &pa).unwrap();
        PoseRetargeter.retarget(&source, &mut b, &pb).unwrap();

        assert_eq!(a.root().position, source.root.position + pa.offset);
        assert_eq!(a.root().scale, 1.0);
        assert_eq!(b.root().position, source.root.position + pb.offset);
        assert_eq!(b.root().scale, 0.5);

        for puppet in [&a, &b] {
            let pose = puppet.pose().unwrap();
            assert_eq!(pose.segments, source.segments);
            assert!(puppet.is_visible());
        }
    }

    #[test]
    fn test_unloaded_targets_are_skipped() {
        let source = source_pose();
        let mut ready = loaded("face_manu");
        let mut pending = Puppet::new("face_lani");
        let placement = Placement::new("x", Vector3::zeros(), 1.0);

        let posed = PoseRetargeter.retarget_all(
            &source,
            vec![(&mut ready, &placement), (&mut pending, &placement)],
        );
        assert_eq!(posed, 1);
        assert!(!pending.is_visible());
        assert_eq!(
            ready.segment(SegmentKind::Head).unwrap().transform,
            source.segments[SegmentKind::Head.slot()]
        );
    }
}
