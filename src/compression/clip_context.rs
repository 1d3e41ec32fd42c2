//! Staging contexts for one compression call.
//!
//! A [`ClipContext`] owns the mutable per-segment streams the pipeline
//! transforms in place. It starts life as a single segment covering the
//! whole clip; segmenting replaces that with the final segment list.
//! Segments refer back to their clip through plain indices, never owning
//! pointers.

use crate::compression::clip::AnimationClip;
use crate::compression::skeleton::RigidSkeleton;
use crate::compression::track_stream::{BoneRanges, BoneStreams, TrackStream};
use crate::core::error::{Error, Result};
use crate::core::types::{BoneBitRate, RotationFormat};
use crate::math::{Vec3, Vec4};

/// One contiguous window of samples with its own streams, ranges, and bit
/// rates.
#[derive(Debug, Clone, Default)]
pub struct SegmentContext {
    pub bone_streams: Vec<BoneStreams>,
    /// Per-bone segment ranges; empty until extracted.
    pub ranges: Vec<BoneRanges>,
    /// Per-bone bit rates chosen by the quantizer.
    pub bit_rates: Vec<BoneBitRate>,

    pub segment_index: u16,
    pub num_samples: u32,
    /// First sample of this segment within the clip.
    pub clip_sample_offset: u32,

    /// Bits per frame of animated data; filled in after quantization.
    pub animated_pose_bit_size: u32,
    /// Bytes of bit-packed animated data; filled in after quantization.
    pub animated_data_size: u32,
    /// Bytes of the serialized segment range block.
    pub range_data_size: u32,

    pub are_rotations_normalized: bool,
    pub are_translations_normalized: bool,
    pub are_scales_normalized: bool,
}

/// The top-level staging object for one clip.
#[derive(Debug, Clone, Default)]
pub struct ClipContext {
    pub segments: Vec<SegmentContext>,
    /// Per-bone clip-level ranges; empty until extracted.
    pub ranges: Vec<BoneRanges>,

    pub num_bones: u16,
    pub num_samples: u32,
    pub sample_rate: u32,
    pub error_threshold: f64,
    /// Neutral scale for this clip's tracks (additive1 deltas use zero).
    pub default_scale: Vec3,
    pub has_scale: bool,

    pub are_rotations_normalized: bool,
    pub are_translations_normalized: bool,
    pub are_scales_normalized: bool,
}

impl ClipContext {
    /// Convert a clip into staging form: one segment holding every bone's
    /// samples as normalized quaternions and raw vectors.
    pub fn from_clip(clip: &AnimationClip, skeleton: &RigidSkeleton) -> Result<Self> {
        let num_bones = clip.num_bones();
        let num_samples = clip.num_samples();
        if num_bones == 0 {
            return Err(Error::InvalidInput("clip has no bones".to_owned()));
        }
        if num_bones != skeleton.num_bones() {
            return Err(Error::InvalidInput(format!(
                "clip animates {num_bones} bones but the skeleton has {}",
                skeleton.num_bones()
            )));
        }

        let default_scale = clip
            .additive_base()
            .map(|(kind, _)| kind.default_scale())
            .unwrap_or(Vec3::one());
        let default_scale_v4 = Vec4::from_vec3(default_scale);

        let mut has_scale = false;
        let mut bone_streams = Vec::with_capacity(usize::from(num_bones));
        for bone_index in 0..num_bones {
            let tracks = clip.bone(bone_index);

            let rotations: Vec<Vec4> = tracks
                .rotations
                .iter()
                .map(|rotation| rotation.normalize().to_vec4())
                .collect();
            let translations: Vec<Vec4> = tracks
                .translations
                .iter()
                .map(|&translation| Vec4::from_vec3(translation))
                .collect();
            let scales: Vec<Vec4> = tracks
                .scales
                .iter()
                .map(|&scale| Vec4::from_vec3(scale))
                .collect();

            has_scale |= scales
                .iter()
                .any(|&scale| !scale.xyz().near_equal(default_scale, 1.0e-9));

            bone_streams.push(BoneStreams {
                bone_index,
                parent_index: skeleton.bone(bone_index).parent_index,
                rotations: TrackStream::new(rotations),
                translations: TrackStream::new(translations),
                scales: TrackStream::new(scales),
                ..BoneStreams::default()
            });
        }

        let segment = SegmentContext {
            bone_streams,
            bit_rates: vec![BoneBitRate::default(); usize::from(num_bones)],
            num_samples,
            ..SegmentContext::default()
        };

        Ok(Self {
            segments: vec![segment],
            ranges: Vec::new(),
            num_bones,
            num_samples,
            sample_rate: clip.sample_rate(),
            error_threshold: clip.error_threshold(),
            default_scale,
            has_scale,
            are_rotations_normalized: false,
            are_translations_normalized: false,
            are_scales_normalized: false,
        })
    }

    /// The single whole-clip segment; only valid before segmenting runs.
    #[inline]
    pub fn single_segment(&self) -> &SegmentContext {
        debug_assert_eq!(self.segments.len(), 1, "clip context must hold a single segment");
        &self.segments[0]
    }

    #[inline]
    pub fn single_segment_mut(&mut self) -> &mut SegmentContext {
        debug_assert_eq!(self.segments.len(), 1, "clip context must hold a single segment");
        &mut self.segments[0]
    }
}

/// Fold drop-w rotations onto the positive-w cover, in place. Runs before
/// range extraction so ranges see the folded values; a decoder can then
/// reconstruct w without a sign.
pub fn convert_rotation_streams(context: &mut ClipContext, rotation_format: RotationFormat) {
    if !rotation_format.is_drop_w() {
        return;
    }

    for segment in &mut context.segments {
        for bone_stream in &mut segment.bone_streams {
            for sample_index in 0..bone_stream.rotations.num_samples() {
                let rotation = bone_stream.rotations.sample(sample_index);
                if rotation.w < 0.0 {
                    bone_stream
                        .rotations
                        .set_sample(sample_index, Vec4::new(-rotation.x, -rotation.y, -rotation.z, -rotation.w));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::clip::BoneTracks;
    use crate::compression::skeleton::RigidBone;
    use crate::math::Quat;

    fn make_clip(num_samples: u32) -> (RigidSkeleton, AnimationClip) {
        let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
        let tracks = BoneTracks::identity(num_samples as usize);
        let clip =
            AnimationClip::new(&skeleton, "test", num_samples, 30, 0.01, vec![tracks]).unwrap();
        (skeleton, clip)
    }

    #[test]
    fn context_starts_as_one_whole_clip_segment() {
        let (skeleton, clip) = make_clip(24);
        let context = ClipContext::from_clip(&clip, &skeleton).unwrap();

        assert_eq!(context.segments.len(), 1);
        assert_eq!(context.single_segment().num_samples, 24);
        assert_eq!(context.single_segment().clip_sample_offset, 0);
        assert!(!context.has_scale);
    }

    #[test]
    fn scale_is_detected_against_the_neutral_value() {
        let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
        let mut tracks = BoneTracks::identity(2);
        tracks.scales[1] = Vec3::new(1.0, 2.0, 1.0);
        let clip = AnimationClip::new(&skeleton, "scaled", 2, 30, 0.01, vec![tracks]).unwrap();

        let context = ClipContext::from_clip(&clip, &skeleton).unwrap();
        assert!(context.has_scale);
    }

    #[test]
    fn rotation_fold_makes_w_non_negative() {
        let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
        let mut tracks = BoneTracks::identity(4);
        let q = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.5);
        tracks.rotations = vec![q, q.neg(), q, q.neg()];
        let clip = AnimationClip::new(&skeleton, "cover", 4, 30, 0.01, vec![tracks]).unwrap();

        let mut context = ClipContext::from_clip(&clip, &skeleton).unwrap();
        convert_rotation_streams(&mut context, RotationFormat::QuatDropWVariable);

        let stream = &context.single_segment().bone_streams[0].rotations;
        for sample_index in 0..stream.num_samples() {
            assert!(stream.sample(sample_index).w >= 0.0);
        }
        // All four samples now agree exactly.
        assert_eq!(stream.sample(0), stream.sample(1));
    }
}
