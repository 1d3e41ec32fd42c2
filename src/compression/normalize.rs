//! Range reduction: map samples into [0, 1] against a (min, extent) pair.
//!
//! Normalization runs twice. The clip-level pass maps raw samples into
//! [0, 1] against the whole-clip range; the segment-level pass then maps
//! those values against each segment's (already normalized, already padded)
//! range. Constant tracks are never normalized; their retained sample is
//! stored at full precision.

use crate::compression::clip_context::ClipContext;
use crate::compression::track_stream::{BoneRanges, TrackRange, TrackStream};
use crate::core::range_reduction::{
    segment_range_rotation_size, segment_range_vector_size, RangeReductionFlags,
};
use crate::core::types::RotationFormat;
use crate::math::Vec4;

/// Extents below this are treated as zero; the normalized sample becomes
/// zero and the decoder reconstructs the min.
pub const ZERO_EXTENT_THRESHOLD: f64 = 1.0e-9;

/// Normalize one sample against a range, component-wise.
#[inline]
pub fn normalize_sample(sample: Vec4, range: &TrackRange) -> Vec4 {
    let min = range.min();
    let extent = range.extent();

    let mut normalized = Vec4::zero();
    for component in 0..4 {
        let e = extent.get(component);
        let value = if e < ZERO_EXTENT_THRESHOLD {
            0.0
        } else {
            // Clamp because the division might be imprecise.
            ((sample.get(component) - min.get(component)) / e).clamp(0.0, 1.0)
        };
        normalized.set(component, value);
    }
    normalized
}

fn normalize_track_stream(stream: &mut TrackStream, range: &TrackRange) {
    for sample_index in 0..stream.num_samples() {
        let normalized = normalize_sample(stream.sample(sample_index), range);
        stream.set_sample(sample_index, normalized);
    }
}

fn normalize_streams(
    bone_streams: &mut [crate::compression::track_stream::BoneStreams],
    bone_ranges: &[BoneRanges],
    flags: RangeReductionFlags,
) {
    for (bone_stream, bone_range) in bone_streams.iter_mut().zip(bone_ranges.iter()) {
        if flags.contains(RangeReductionFlags::ROTATIONS) && !bone_stream.is_rotation_constant {
            normalize_track_stream(&mut bone_stream.rotations, &bone_range.rotation);
        }
        if flags.contains(RangeReductionFlags::TRANSLATIONS) && !bone_stream.is_translation_constant
        {
            normalize_track_stream(&mut bone_stream.translations, &bone_range.translation);
        }
        if flags.contains(RangeReductionFlags::SCALES) && !bone_stream.is_scale_constant {
            normalize_track_stream(&mut bone_stream.scales, &bone_range.scale);
        }
    }
}

/// Clip-level pass. Must run while the context still holds its single
/// whole-clip segment, after the clip ranges were extracted.
pub fn normalize_clip_streams(context: &mut ClipContext, flags: RangeReductionFlags) {
    let has_scale = context.has_scale;
    let ranges = std::mem::take(&mut context.ranges);

    let segment = context.single_segment_mut();
    normalize_streams(&mut segment.bone_streams, &ranges, flags);

    context.ranges = ranges;
    context.are_rotations_normalized = flags.contains(RangeReductionFlags::ROTATIONS);
    context.are_translations_normalized = flags.contains(RangeReductionFlags::TRANSLATIONS);
    context.are_scales_normalized = has_scale && flags.contains(RangeReductionFlags::SCALES);
}

/// Segment-level pass over each segment's own padded ranges. Also settles
/// each segment's serialized range block size.
pub fn normalize_segment_streams(
    context: &mut ClipContext,
    flags: RangeReductionFlags,
    rotation_format: RotationFormat,
) {
    let has_scale = context.has_scale;

    for segment in &mut context.segments {
        let ranges = std::mem::take(&mut segment.ranges);
        normalize_streams(&mut segment.bone_streams, &ranges, flags);
        segment.ranges = ranges;

        segment.are_rotations_normalized = flags.contains(RangeReductionFlags::ROTATIONS);
        segment.are_translations_normalized = flags.contains(RangeReductionFlags::TRANSLATIONS);
        segment.are_scales_normalized = has_scale && flags.contains(RangeReductionFlags::SCALES);

        let mut range_data_size = 0;
        for bone_stream in &segment.bone_streams {
            if segment.are_rotations_normalized && !bone_stream.is_rotation_constant {
                range_data_size += segment_range_rotation_size(rotation_format);
            }
            if segment.are_translations_normalized && !bone_stream.is_translation_constant {
                range_data_size += segment_range_vector_size();
            }
            if segment.are_scales_normalized && !bone_stream.is_scale_constant {
                range_data_size += segment_range_vector_size();
            }
        }
        segment.range_data_size = range_data_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_maps_range_to_unit_interval() {
        let range = TrackRange::from_min_max(
            Vec4::new(-2.0, 0.0, 10.0, 0.0),
            Vec4::new(2.0, 1.0, 20.0, 0.0),
        );

        let low = normalize_sample(Vec4::new(-2.0, 0.0, 10.0, 0.0), &range);
        assert_eq!(low, Vec4::zero());

        let high = normalize_sample(Vec4::new(2.0, 1.0, 20.0, 0.0), &range);
        assert_eq!(high.xyz(), crate::math::Vec3::one());

        let mid = normalize_sample(Vec4::new(0.0, 0.5, 15.0, 0.0), &range);
        assert!((mid.x - 0.5).abs() < 1.0e-12);
        assert!((mid.y - 0.5).abs() < 1.0e-12);
        assert!((mid.z - 0.5).abs() < 1.0e-12);
    }

    #[test]
    fn zero_extent_components_become_zero() {
        let range = TrackRange::from_min_max(
            Vec4::new(3.0, 0.0, 0.0, 0.0),
            Vec4::new(3.0, 1.0, 0.0, 0.0),
        );
        let normalized = normalize_sample(Vec4::new(3.0, 0.25, 0.0, 0.0), &range);
        assert_eq!(normalized.x, 0.0);
        assert!((normalized.y - 0.25).abs() < 1.0e-12);
    }

    #[test]
    fn out_of_range_inputs_clamp() {
        // Division imprecision or padded ranges can land slightly outside.
        let range = TrackRange::from_min_max(Vec4::zero(), Vec4::splat(1.0));
        let normalized = normalize_sample(Vec4::new(-0.001, 1.001, 0.5, 0.0), &range);
        assert_eq!(normalized.x, 0.0);
        assert_eq!(normalized.y, 1.0);
    }
}
