//! The rigid skeleton a clip animates.

use crate::core::error::{Error, Result};
use crate::math::{Quat, Transform, Vec3};

/// One bone of a skeleton. Bones are topologically ordered: a parent always
/// precedes its children, so `parent_index < own index`.
#[derive(Debug, Clone)]
pub struct RigidBone {
    pub name: String,
    /// `None` for root bones.
    pub parent_index: Option<u16>,
    pub bind_rotation: Quat,
    pub bind_translation: Vec3,
    /// Virtual vertex distance used by the hierarchical error function.
    pub vertex_distance: f64,
}

impl RigidBone {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_index: None,
            bind_rotation: Quat::identity(),
            bind_translation: Vec3::zero(),
            vertex_distance: 1.0,
        }
    }

    pub fn child_of(name: impl Into<String>, parent_index: u16) -> Self {
        Self {
            parent_index: Some(parent_index),
            ..Self::root(name)
        }
    }
}

/// An ordered, validated sequence of rigid bones.
#[derive(Debug, Clone)]
pub struct RigidSkeleton {
    bones: Vec<RigidBone>,
}

impl RigidSkeleton {
    /// Build a skeleton, validating the topological-order invariant and the
    /// bind pose.
    pub fn new(bones: Vec<RigidBone>) -> Result<Self> {
        if bones.is_empty() {
            return Err(Error::InvalidInput("skeleton has no bones".to_owned()));
        }
        if bones.len() > u16::MAX as usize {
            return Err(Error::InvalidInput(format!(
                "too many bones: {}",
                bones.len()
            )));
        }

        for (bone_index, bone) in bones.iter().enumerate() {
            if let Some(parent_index) = bone.parent_index {
                if usize::from(parent_index) >= bone_index {
                    return Err(Error::InvalidInput(format!(
                        "bone '{}' ({bone_index}) has parent index {parent_index}; parents must precede children",
                        bone.name
                    )));
                }
            }
            if !bone.bind_rotation.is_finite()
                || !bone.bind_translation.is_finite()
                || !bone.vertex_distance.is_finite()
            {
                return Err(Error::InvalidInput(format!(
                    "bone '{}' has non-finite bind pose values",
                    bone.name
                )));
            }
        }

        Ok(Self { bones })
    }

    #[inline]
    pub fn num_bones(&self) -> u16 {
        self.bones.len() as u16
    }

    #[inline]
    pub fn bones(&self) -> &[RigidBone] {
        &self.bones
    }

    #[inline]
    pub fn bone(&self, bone_index: u16) -> &RigidBone {
        &self.bones[usize::from(bone_index)]
    }

    pub fn find_bone(&self, name: &str) -> Option<u16> {
        self.bones
            .iter()
            .position(|bone| bone.name == name)
            .map(|index| index as u16)
    }
}

// ── Pose space conversion ────────────────────────────────────────────────────

/// Convert a local-space pose into object space. The buffers may alias
/// because bones are sorted parent first.
pub fn local_to_object_space(
    skeleton: &RigidSkeleton,
    local_pose: &[Transform],
    out_object_pose: &mut [Transform],
) {
    debug_assert_eq!(local_pose.len(), usize::from(skeleton.num_bones()));
    debug_assert_eq!(out_object_pose.len(), local_pose.len());

    for (bone_index, bone) in skeleton.bones().iter().enumerate() {
        out_object_pose[bone_index] = match bone.parent_index {
            None => local_pose[bone_index],
            Some(parent_index) => Transform::mul(
                local_pose[bone_index],
                out_object_pose[usize::from(parent_index)],
            ),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_unordered_skeletons() {
        assert!(RigidSkeleton::new(Vec::new()).is_err());

        let bones = vec![RigidBone::child_of("child", 1), RigidBone::root("root")];
        let err = RigidSkeleton::new(bones).unwrap_err();
        assert_eq!(err.name(), "InvalidInput");
    }

    #[test]
    fn object_space_chains_through_parents() {
        let skeleton = RigidSkeleton::new(vec![
            RigidBone::root("root"),
            RigidBone::child_of("spine", 0),
            RigidBone::child_of("head", 1),
        ])
        .unwrap();

        let step = Transform::new(Quat::identity(), Vec3::new(0.0, 1.0, 0.0), Vec3::one());
        let local_pose = vec![step; 3];
        let mut object_pose = vec![Transform::identity(); 3];
        local_to_object_space(&skeleton, &local_pose, &mut object_pose);

        assert!(object_pose[2]
            .translation
            .near_equal(Vec3::new(0.0, 3.0, 0.0), 1.0e-12));
    }
}
