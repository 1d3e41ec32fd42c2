//! Clip- and segment-level range extraction.
//!
//! Segment ranges are serialized with their min and extent quantized to 8
//! bits per component, so after extraction they are padded: the min rounds
//! down to a representable value at or below the true min, and the extent
//! rounds up far enough that `min + extent` still covers the true max.
//! Without the padding, a sample right at the range edge could decode
//! outside the stored range.

use crate::compression::clip_context::{ClipContext, SegmentContext};
use crate::compression::track_stream::{BoneRanges, TrackRange};
use crate::core::range_reduction::SEGMENT_RANGE_BITS_PER_COMPONENT;
use crate::math::Vec4;

fn extract_bone_ranges_impl(segment: &SegmentContext) -> Vec<BoneRanges> {
    segment
        .bone_streams
        .iter()
        .map(|bone_stream| BoneRanges {
            rotation: bone_stream.rotations.calculate_range(),
            translation: bone_stream.translations.calculate_range(),
            scale: bone_stream.scales.calculate_range(),
        })
        .collect()
}

/// Compute the whole-clip per-bone ranges. Must run while the context still
/// holds its single whole-clip segment.
pub fn extract_clip_bone_ranges(context: &mut ClipContext) {
    let ranges = extract_bone_ranges_impl(context.single_segment());
    context.ranges = ranges;
}

#[inline]
fn fixup_component(min: f64, max: f64, max_range_value: f64) -> (f64, f64) {
    // Pick the quantized min closest to the true min from below.
    let quantized_min0 = (min * max_range_value).floor().clamp(0.0, max_range_value);
    let padded_min0 = quantized_min0 / max_range_value;
    let padded_min = if padded_min0 <= min {
        padded_min0
    } else {
        (quantized_min0 - 1.0).max(0.0) / max_range_value
    };

    // The extent is stored instead of the max so a decode is one mul-add;
    // re-derive it from the padded min and round it up to cover the max.
    let extent = max - padded_min;
    let quantized_extent0 = (extent * max_range_value).ceil().clamp(0.0, max_range_value);
    let padded_extent0 = quantized_extent0 / max_range_value;
    let padded_extent = if padded_min + padded_extent0 >= max {
        padded_extent0
    } else {
        (quantized_extent0 + 1.0).min(max_range_value) / max_range_value
    };

    (padded_min, padded_extent)
}

/// Pad a normalized range so its 8-bit serialized form still encloses every
/// sample.
pub(crate) fn fixup_range(range: TrackRange) -> TrackRange {
    let max_range_value = f64::from((1u32 << SEGMENT_RANGE_BITS_PER_COMPONENT) - 1);

    let mut min = Vec4::zero();
    let mut extent = Vec4::zero();
    for component in 0..4 {
        let (padded_min, padded_extent) = fixup_component(
            range.min().get(component),
            range.max().get(component),
            max_range_value,
        );
        min.set(component, padded_min);
        extent.set(component, padded_extent);
    }
    TrackRange::from_min_extent(min, extent)
}

/// Compute per-segment per-bone ranges, padding the channels that were
/// normalized at the clip level (their samples live in [0, 1]).
pub fn extract_segment_bone_ranges(context: &mut ClipContext) {
    let are_rotations_normalized = context.are_rotations_normalized;
    let are_translations_normalized = context.are_translations_normalized;
    let are_scales_normalized = context.are_scales_normalized;

    for segment in &mut context.segments {
        let mut ranges = extract_bone_ranges_impl(segment);

        for (bone_stream, bone_range) in segment.bone_streams.iter().zip(ranges.iter_mut()) {
            if !bone_stream.is_rotation_constant && are_rotations_normalized {
                bone_range.rotation = fixup_range(bone_range.rotation);
            }
            if !bone_stream.is_translation_constant && are_translations_normalized {
                bone_range.translation = fixup_range(bone_range.translation);
            }
            if !bone_stream.is_scale_constant && are_scales_normalized {
                bone_range.scale = fixup_range(bone_range.scale);
            }
        }

        segment.ranges = ranges;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn quantize_8(value: f64) -> f64 {
        (value * 255.0).round().clamp(0.0, 255.0) / 255.0
    }

    #[test]
    fn fixup_min_rounds_down_extent_covers_max() {
        let range = TrackRange::from_min_max(
            Vec4::new(0.1234, 0.0, 0.999, 0.0),
            Vec4::new(0.8, 0.5, 1.0, 0.0),
        );
        let fixed = fixup_range(range);

        for component in 0..3 {
            let true_min = range.min().get(component);
            let true_max = range.max().get(component);
            let padded_min = fixed.min().get(component);
            let padded_extent = fixed.extent().get(component);

            assert!(padded_min <= true_min, "component {component} min not enclosed");
            assert!(
                padded_min + padded_extent >= true_max,
                "component {component} max not enclosed"
            );
            // The padded values are exactly representable on 8 bits.
            assert_eq!(padded_min, quantize_8(padded_min));
            assert_eq!(padded_extent, quantize_8(padded_extent));
        }
    }

    /// The primary serialization invariant: after fixup, every sample of a
    /// normalized track satisfies min <= sample <= min + extent.
    #[test]
    fn fixup_encloses_randomized_samples() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x5E67);

        for _ in 0..500 {
            let samples: Vec<f64> = (0..16).map(|_| rng.gen::<f64>()).collect();
            let true_min = samples.iter().cloned().fold(f64::MAX, f64::min);
            let true_max = samples.iter().cloned().fold(f64::MIN, f64::max);

            let range = TrackRange::from_min_max(Vec4::splat(true_min), Vec4::splat(true_max));
            let fixed = fixup_range(range);

            for &sample in &samples {
                assert!(fixed.min().x <= sample);
                assert!(fixed.min().x + fixed.extent().x >= sample);
            }
        }
    }

    #[test]
    fn fixup_is_identity_friendly_at_the_edges() {
        let range = TrackRange::from_min_max(Vec4::zero(), Vec4::splat(1.0));
        let fixed = fixup_range(range);
        assert_eq!(fixed.min().x, 0.0);
        assert_eq!(fixed.extent().x, 1.0);
    }
}
