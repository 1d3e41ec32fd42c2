//! Constant and default track detection.
//!
//! A track whose samples never move beyond a per-channel threshold
//! collapses to its first sample. Rotation constancy is measured as a
//! geodesic angle between samples; vector constancy as the component-wise
//! range extent. A constant track whose retained sample sits at the
//! channel's neutral value is additionally marked default and contributes
//! no bytes at all.

use crate::compression::clip_context::ClipContext;
use crate::compression::settings::ConstantTrackThresholds;
use crate::compression::track_stream::TrackRange;
use crate::math::{Quat, Vec4};
use log::debug;

/// Detect and compact constant tracks. Must run while the context still
/// holds its single whole-clip segment, after the clip ranges were
/// extracted (the vector checks read them).
pub fn compact_constant_streams(context: &mut ClipContext, thresholds: &ConstantTrackThresholds) {
    let default_scale = Vec4::from_vec3(context.default_scale);
    let ranges = std::mem::take(&mut context.ranges);
    let mut num_constant = 0u32;
    let mut num_default = 0u32;

    let segment = context.single_segment_mut();
    let mut new_ranges = ranges;

    for (bone_stream, bone_range) in segment.bone_streams.iter_mut().zip(new_ranges.iter_mut()) {
        // Rotations compare against the first sample on the geodesic.
        let first_rotation = Quat::from_vec4(bone_stream.rotations.sample(0));
        let is_rotation_constant = (1..bone_stream.rotations.num_samples()).all(|sample_index| {
            let rotation = Quat::from_vec4(bone_stream.rotations.sample(sample_index));
            Quat::angle_between(first_rotation, rotation) < thresholds.rotation
        });
        if is_rotation_constant {
            bone_stream.rotations.compact_to_single_sample();
            bone_range.rotation = TrackRange::constant(bone_stream.rotations.sample(0));
            bone_stream.is_rotation_constant = true;
            bone_stream.is_rotation_default = first_rotation.near_identity();
            num_constant += 1;
            num_default += u32::from(bone_stream.is_rotation_default);
        }

        if bone_range.translation.is_constant(thresholds.translation) {
            bone_stream.translations.compact_to_single_sample();
            let translation = bone_stream.translations.sample(0);
            bone_range.translation = TrackRange::constant(translation);
            bone_stream.is_translation_constant = true;
            bone_stream.is_translation_default =
                translation.xyz().near_equal(crate::math::Vec3::zero(), thresholds.translation);
            num_constant += 1;
            num_default += u32::from(bone_stream.is_translation_default);
        }

        if bone_range.scale.is_constant(thresholds.scale) {
            bone_stream.scales.compact_to_single_sample();
            let scale = bone_stream.scales.sample(0);
            bone_range.scale = TrackRange::constant(scale);
            bone_stream.is_scale_constant = true;
            bone_stream.is_scale_default =
                scale.xyz().near_equal(default_scale.xyz(), thresholds.scale);
            num_constant += 1;
            num_default += u32::from(bone_stream.is_scale_default);
        }
    }

    context.ranges = new_ranges;
    debug!("constant track compaction: {num_constant} constant ({num_default} default)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::clip::{AnimationClip, BoneTracks};
    use crate::compression::ranges::extract_clip_bone_ranges;
    use crate::compression::skeleton::{RigidBone, RigidSkeleton};
    use crate::math::Vec3;

    fn compacted_context(tracks: BoneTracks, num_samples: u32) -> ClipContext {
        let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
        let clip =
            AnimationClip::new(&skeleton, "test", num_samples, 30, 0.01, vec![tracks]).unwrap();
        let mut context = ClipContext::from_clip(&clip, &skeleton).unwrap();
        extract_clip_bone_ranges(&mut context);
        compact_constant_streams(&mut context, &ConstantTrackThresholds::default());
        context
    }

    #[test]
    fn identity_tracks_become_default() {
        let context = compacted_context(BoneTracks::identity(10), 10);
        let bone = &context.single_segment().bone_streams[0];

        assert!(bone.is_rotation_constant && bone.is_rotation_default);
        assert!(bone.is_translation_constant && bone.is_translation_default);
        assert!(bone.is_scale_constant && bone.is_scale_default);
        assert_eq!(bone.rotations.num_samples(), 1);
        assert_eq!(bone.translations.num_samples(), 1);
    }

    #[test]
    fn constant_offset_is_kept_but_not_default() {
        let mut tracks = BoneTracks::identity(10);
        for translation in &mut tracks.translations {
            *translation = Vec3::new(0.0, 1.5, 0.0);
        }
        let context = compacted_context(tracks, 10);
        let bone = &context.single_segment().bone_streams[0];

        assert!(bone.is_translation_constant);
        assert!(!bone.is_translation_default);
        assert_eq!(bone.translations.sample(0).y, 1.5);
    }

    #[test]
    fn moving_tracks_stay_animated() {
        let mut tracks = BoneTracks::identity(10);
        for (sample_index, translation) in tracks.translations.iter_mut().enumerate() {
            *translation = Vec3::new(sample_index as f64 * 0.1, 0.0, 0.0);
        }
        let context = compacted_context(tracks, 10);
        let bone = &context.single_segment().bone_streams[0];

        assert!(!bone.is_translation_constant);
        assert!(bone.is_translation_animated());
        assert_eq!(bone.translations.num_samples(), 10);
    }

    #[test]
    fn rotation_jitter_below_threshold_is_constant() {
        let mut tracks = BoneTracks::identity(10);
        // Angular jitter of half a microradian around a fixed rotation.
        let base = crate::math::Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.4);
        for (sample_index, rotation) in tracks.rotations.iter_mut().enumerate() {
            let jitter = 0.5e-6 * (sample_index % 2) as f64;
            *rotation = crate::math::Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.4 + jitter);
        }
        let context = compacted_context(tracks, 10);
        let bone = &context.single_segment().bone_streams[0];

        assert!(bone.is_rotation_constant);
        assert!(!bone.is_rotation_default);
        let kept = bone.constant_rotation();
        assert!(crate::math::Quat::angle_between(kept, base) < 1.0e-5);
    }
}
