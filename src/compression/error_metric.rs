//! The shell-distance error metric.
//!
//! Around each bone we place virtual vertices on a sphere whose radius is
//! the bone's vertex distance, and measure the maximum object-space
//! displacement of those vertices between the raw and the lossy pose. Two
//! probe axes are enough: they are orthogonal, so no rotation axis is
//! co-linear with both.
//!
//! Additive clips first combine the base pose with the delta pose per the
//! clip's additive kind, then measure the combined result.

use crate::compression::clip::AdditiveKind;
use crate::compression::skeleton::{local_to_object_space, RigidSkeleton};
use crate::math::{Quat, Transform, Vec3};

/// Which error measure drives the bit-rate search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMetric {
    /// Compare object-space transforms directly.
    #[default]
    Absolute,
    /// Combine with a base pose per the additive kind, then compare.
    Additive(AdditiveKind),
}

impl ErrorMetric {
    pub fn name(self) -> &'static str {
        match self {
            ErrorMetric::Absolute => "absolute",
            ErrorMetric::Additive(AdditiveKind::Relative) => "additive_relative",
            ErrorMetric::Additive(AdditiveKind::Additive0) => "additive0",
            ErrorMetric::Additive(AdditiveKind::Additive1) => "additive1",
        }
    }

    /// Whether poses must be combined with a base pose before measuring.
    #[inline]
    pub fn needs_conversion(self) -> bool {
        matches!(self, ErrorMetric::Additive(_))
    }

    /// The metric matching a clip's additive kind.
    pub fn for_additive_kind(kind: Option<AdditiveKind>) -> Self {
        match kind {
            None => ErrorMetric::Absolute,
            Some(kind) => ErrorMetric::Additive(kind),
        }
    }
}

/// Combine one bone's delta transform with its base transform.
pub fn apply_additive_to_base(kind: AdditiveKind, base: Transform, delta: Transform) -> Transform {
    match kind {
        AdditiveKind::Relative => Transform::mul(delta, base),
        AdditiveKind::Additive0 => Transform::new(
            Quat::mul(delta.rotation, base.rotation).normalize(),
            base.translation.add(delta.translation),
            base.scale.mul(delta.scale),
        ),
        AdditiveKind::Additive1 => Transform::new(
            Quat::mul(delta.rotation, base.rotation).normalize(),
            base.translation.add(delta.translation),
            base.scale.mul(delta.scale.add(Vec3::one())),
        ),
    }
}

/// Reusable pose buffers for error evaluation; one instance lives for the
/// whole compression call so the hot loop never allocates.
#[derive(Debug, Default)]
pub struct ErrorScratch {
    raw_combined: Vec<Transform>,
    lossy_combined: Vec<Transform>,
    raw_object: Vec<Transform>,
    lossy_object: Vec<Transform>,
}

impl ErrorScratch {
    pub fn new(num_bones: u16) -> Self {
        let num_bones = usize::from(num_bones);
        Self {
            raw_combined: vec![Transform::identity(); num_bones],
            lossy_combined: vec![Transform::identity(); num_bones],
            raw_object: vec![Transform::identity(); num_bones],
            lossy_object: vec![Transform::identity(); num_bones],
        }
    }
}

/// Maximum displacement of the two probe vertices of one bone between two
/// object-space transforms.
#[inline]
pub fn shell_distance(raw: Transform, lossy: Transform, vertex_distance: f64) -> f64 {
    let vtx0 = Vec3::new(vertex_distance, 0.0, 0.0);
    let vtx1 = Vec3::new(0.0, vertex_distance, 0.0);

    let error0 = raw.transform_point(vtx0).distance(lossy.transform_point(vtx0));
    let error1 = raw.transform_point(vtx1).distance(lossy.transform_point(vtx1));
    error0.max(error1)
}

/// Evaluate the per-bone shell-distance error between a raw and a lossy
/// local pose. For additive metrics `base_local_pose` must carry the base
/// clip pose at the same time.
pub fn calculate_error_per_bone(
    metric: ErrorMetric,
    skeleton: &RigidSkeleton,
    raw_local_pose: &[Transform],
    lossy_local_pose: &[Transform],
    base_local_pose: Option<&[Transform]>,
    scratch: &mut ErrorScratch,
    out_error_per_bone: &mut [f64],
) {
    let num_bones = usize::from(skeleton.num_bones());
    debug_assert_eq!(raw_local_pose.len(), num_bones);
    debug_assert_eq!(lossy_local_pose.len(), num_bones);
    debug_assert_eq!(out_error_per_bone.len(), num_bones);

    let (raw_local, lossy_local): (&[Transform], &[Transform]) = match metric {
        ErrorMetric::Absolute => (raw_local_pose, lossy_local_pose),
        ErrorMetric::Additive(kind) => {
            let base = base_local_pose.expect("additive metric requires a base pose");
            debug_assert_eq!(base.len(), num_bones);
            for bone_index in 0..num_bones {
                scratch.raw_combined[bone_index] =
                    apply_additive_to_base(kind, base[bone_index], raw_local_pose[bone_index]);
                scratch.lossy_combined[bone_index] =
                    apply_additive_to_base(kind, base[bone_index], lossy_local_pose[bone_index]);
            }
            (&scratch.raw_combined, &scratch.lossy_combined)
        }
    };

    local_to_object_space(skeleton, raw_local, &mut scratch.raw_object);
    local_to_object_space(skeleton, lossy_local, &mut scratch.lossy_object);

    for bone_index in 0..num_bones {
        out_error_per_bone[bone_index] = shell_distance(
            scratch.raw_object[bone_index],
            scratch.lossy_object[bone_index],
            skeleton.bones()[bone_index].vertex_distance,
        );
    }
}

/// Object-space transform of a single bone, walking its ancestor chain.
/// Used by the bit-rate search to re-evaluate one bone without rebuilding
/// the whole pose.
pub fn object_transform_of(
    skeleton: &RigidSkeleton,
    local_pose: &[Transform],
    bone_index: u16,
) -> Transform {
    // Compose root-down so the result matches `local_to_object_space` even
    // with non-uniform scale in the chain.
    match skeleton.bone(bone_index).parent_index {
        None => local_pose[usize::from(bone_index)],
        Some(parent_index) => Transform::mul(
            local_pose[usize::from(bone_index)],
            object_transform_of(skeleton, local_pose, parent_index),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::skeleton::RigidBone;

    fn two_bone_skeleton() -> RigidSkeleton {
        let mut root = RigidBone::root("root");
        root.vertex_distance = 1.0;
        let mut child = RigidBone::child_of("child", 0);
        child.vertex_distance = 1.0;
        RigidSkeleton::new(vec![root, child]).unwrap()
    }

    #[test]
    fn identical_poses_have_zero_error() {
        let skeleton = two_bone_skeleton();
        let pose = vec![Transform::identity(); 2];
        let mut scratch = ErrorScratch::new(2);
        let mut error = vec![f64::MAX; 2];

        calculate_error_per_bone(
            ErrorMetric::Absolute,
            &skeleton,
            &pose,
            &pose,
            None,
            &mut scratch,
            &mut error,
        );
        assert_eq!(error, vec![0.0, 0.0]);
    }

    #[test]
    fn translation_error_is_the_displacement() {
        let skeleton = two_bone_skeleton();
        let raw = vec![Transform::identity(); 2];
        let mut lossy = raw.clone();
        lossy[0].translation = Vec3::new(0.25, 0.0, 0.0);

        let mut scratch = ErrorScratch::new(2);
        let mut error = vec![0.0; 2];
        calculate_error_per_bone(
            ErrorMetric::Absolute,
            &skeleton,
            &raw,
            &lossy,
            None,
            &mut scratch,
            &mut error,
        );

        // A root translation displaces every descendant equally.
        assert!((error[0] - 0.25).abs() < 1.0e-12);
        assert!((error[1] - 0.25).abs() < 1.0e-12);
    }

    #[test]
    fn rotation_error_scales_with_vertex_distance() {
        let mut root = RigidBone::root("root");
        root.vertex_distance = 10.0;
        let skeleton = RigidSkeleton::new(vec![root]).unwrap();

        let raw = vec![Transform::identity()];
        let angle = 0.001;
        let lossy = vec![Transform::new(
            Quat::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), angle),
            Vec3::zero(),
            Vec3::one(),
        )];

        let mut scratch = ErrorScratch::new(1);
        let mut error = vec![0.0; 1];
        calculate_error_per_bone(
            ErrorMetric::Absolute,
            &skeleton,
            &raw,
            &lossy,
            None,
            &mut scratch,
            &mut error,
        );

        // Chord length of a 0.001 rad arc at radius 10.
        let expected = 2.0 * 10.0 * (angle / 2.0).sin();
        assert!((error[0] - expected).abs() < 1.0e-9);
    }

    #[test]
    fn rotation_about_a_probe_axis_is_still_detected() {
        // A rotation about X moves the Y probe even though the X probe is
        // co-linear with the axis.
        let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
        let raw = vec![Transform::identity()];
        let lossy = vec![Transform::new(
            Quat::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), 0.01),
            Vec3::zero(),
            Vec3::one(),
        )];

        let mut scratch = ErrorScratch::new(1);
        let mut error = vec![0.0; 1];
        calculate_error_per_bone(
            ErrorMetric::Absolute,
            &skeleton,
            &raw,
            &lossy,
            None,
            &mut scratch,
            &mut error,
        );
        assert!(error[0] > 0.009);
    }

    #[test]
    fn additive0_combines_before_measuring() {
        let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
        let base = vec![Transform::new(
            Quat::identity(),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::one(),
        )];
        // The raw delta cancels nothing; the lossy delta drifts by 0.125.
        let raw = vec![Transform::new(Quat::identity(), Vec3::new(0.5, 0.0, 0.0), Vec3::one())];
        let lossy = vec![Transform::new(Quat::identity(), Vec3::new(0.625, 0.0, 0.0), Vec3::one())];

        let mut scratch = ErrorScratch::new(1);
        let mut error = vec![0.0; 1];
        calculate_error_per_bone(
            ErrorMetric::Additive(AdditiveKind::Additive0),
            &skeleton,
            &raw,
            &lossy,
            Some(&base),
            &mut scratch,
            &mut error,
        );
        assert!((error[0] - 0.125).abs() < 1.0e-12);
    }

    #[test]
    fn additive1_scale_combines_around_zero() {
        let base = Transform::new(Quat::identity(), Vec3::zero(), Vec3::new(2.0, 2.0, 2.0));
        // A zero delta scale is neutral for additive1.
        let delta = Transform::new(Quat::identity(), Vec3::zero(), Vec3::zero());
        let combined = apply_additive_to_base(AdditiveKind::Additive1, base, delta);
        assert!(combined.scale.near_equal(Vec3::new(2.0, 2.0, 2.0), 1.0e-12));
    }

    #[test]
    fn object_transform_matches_full_conversion() {
        let skeleton = two_bone_skeleton();
        let local = vec![
            Transform::new(
                Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.5),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::one(),
            ),
            Transform::new(Quat::identity(), Vec3::new(0.0, 0.0, 1.0), Vec3::one()),
        ];

        let mut object = vec![Transform::identity(); 2];
        local_to_object_space(&skeleton, &local, &mut object);

        let single = object_transform_of(&skeleton, &local, 1);
        assert!(single.translation.near_equal(object[1].translation, 1.0e-12));
    }
}
