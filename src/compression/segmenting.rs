//! Split a clip's time axis into fixed-size segments.
//!
//! The split aims for `ideal_num_samples` per segment and avoids a partial
//! trailing segment: when the leftovers of the last segment fit within the
//! slack of the earlier segments, the last segment is dropped and its
//! samples are redistributed round-robin. Every resulting segment holds
//! between `ideal` and `max` samples, segments tile the clip contiguously,
//! and constant tracks keep their single retained sample in every segment.

use crate::compression::clip_context::{ClipContext, SegmentContext};
use crate::compression::settings::SegmentingSettings;
use crate::compression::track_stream::{BoneStreams, TrackStream};
use crate::core::types::BoneBitRate;
use log::debug;

/// Partition the single whole-clip segment into the final segment list.
/// No-op when the clip already fits in one segment.
pub fn segment_streams(context: &mut ClipContext, settings: &SegmentingSettings) {
    debug_assert_eq!(context.segments.len(), 1, "clip context must hold a single segment");
    debug_assert!(settings.ideal_num_samples <= settings.max_num_samples);

    let num_samples = context.num_samples;
    let ideal = u32::from(settings.ideal_num_samples);
    let max = u32::from(settings.max_num_samples);

    if num_samples <= max {
        return;
    }

    // Plan the per-segment sample counts. A non-zero remainder means the
    // last segment would be undersized.
    let mut num_segments = num_samples.div_ceil(ideal);
    let mut num_samples_per_segment = vec![ideal; num_segments as usize];

    let num_leftover_samples = num_samples % ideal;
    if num_leftover_samples != 0 {
        num_samples_per_segment[num_segments as usize - 1] = num_leftover_samples;
    }

    let slack = max - ideal;
    if num_leftover_samples != 0 && (num_segments - 1) * slack >= num_leftover_samples {
        // Enough room in the earlier segments: fold the last one away.
        while num_samples_per_segment[num_segments as usize - 1] != 0 {
            for segment_index in 0..num_segments as usize - 1 {
                if num_samples_per_segment[num_segments as usize - 1] == 0 {
                    break;
                }
                num_samples_per_segment[segment_index] += 1;
                num_samples_per_segment[num_segments as usize - 1] -= 1;
            }
        }
        num_segments -= 1;
    }

    debug!(
        "segmenting {} samples into {} segments (ideal {}, max {})",
        num_samples, num_segments, ideal, max
    );

    // Carve the whole-clip streams into per-segment copies.
    let whole_clip = context.segments.pop().expect("single segment");
    let mut segments = Vec::with_capacity(num_segments as usize);
    let mut clip_sample_offset = 0u32;

    for segment_index in 0..num_segments {
        let segment_num_samples = num_samples_per_segment[segment_index as usize];

        let bone_streams: Vec<BoneStreams> = whole_clip
            .bone_streams
            .iter()
            .map(|clip_stream| {
                let slice_stream = |stream: &TrackStream, is_constant: bool| {
                    if is_constant {
                        // Constant tracks share their retained sample.
                        stream.clone()
                    } else {
                        let start = clip_sample_offset as usize;
                        let end = start + segment_num_samples as usize;
                        TrackStream::new(stream.samples()[start..end].to_vec())
                    }
                };

                BoneStreams {
                    bone_index: clip_stream.bone_index,
                    parent_index: clip_stream.parent_index,
                    rotations: slice_stream(&clip_stream.rotations, clip_stream.is_rotation_constant),
                    translations: slice_stream(
                        &clip_stream.translations,
                        clip_stream.is_translation_constant,
                    ),
                    scales: slice_stream(&clip_stream.scales, clip_stream.is_scale_constant),
                    is_rotation_constant: clip_stream.is_rotation_constant,
                    is_rotation_default: clip_stream.is_rotation_default,
                    is_translation_constant: clip_stream.is_translation_constant,
                    is_translation_default: clip_stream.is_translation_default,
                    is_scale_constant: clip_stream.is_scale_constant,
                    is_scale_default: clip_stream.is_scale_default,
                }
            })
            .collect();

        let num_bones = bone_streams.len();
        segments.push(SegmentContext {
            bone_streams,
            ranges: Vec::new(),
            bit_rates: vec![BoneBitRate::default(); num_bones],
            segment_index: segment_index as u16,
            num_samples: segment_num_samples,
            clip_sample_offset,
            ..SegmentContext::default()
        });

        clip_sample_offset += segment_num_samples;
    }

    debug_assert_eq!(clip_sample_offset, num_samples);
    context.segments = segments;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::clip::{AnimationClip, BoneTracks};
    use crate::compression::skeleton::{RigidBone, RigidSkeleton};
    use crate::math::Vec3;

    fn make_context(num_samples: u32) -> ClipContext {
        let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
        let mut tracks = BoneTracks::identity(num_samples as usize);
        for (sample_index, translation) in tracks.translations.iter_mut().enumerate() {
            *translation = Vec3::new(sample_index as f64, 0.0, 0.0);
        }
        let clip =
            AnimationClip::new(&skeleton, "test", num_samples, 30, 0.01, vec![tracks]).unwrap();
        ClipContext::from_clip(&clip, &skeleton).unwrap()
    }

    fn default_settings() -> SegmentingSettings {
        SegmentingSettings {
            enabled: true,
            ..SegmentingSettings::default()
        }
    }

    fn check_invariants(context: &ClipContext, settings: &SegmentingSettings) {
        let total: u32 = context.segments.iter().map(|s| s.num_samples).sum();
        assert_eq!(total, context.num_samples);

        let mut expected_offset = 0;
        for segment in &context.segments {
            assert!(segment.num_samples >= u32::from(settings.ideal_num_samples));
            assert!(segment.num_samples <= u32::from(settings.max_num_samples));
            assert_eq!(segment.clip_sample_offset, expected_offset);
            expected_offset += segment.num_samples;
        }
    }

    #[test]
    fn short_clips_stay_whole() {
        let mut context = make_context(31);
        segment_streams(&mut context, &default_settings());
        assert_eq!(context.segments.len(), 1);
    }

    #[test]
    fn sixty_four_samples_make_four_even_segments() {
        let mut context = make_context(64);
        let settings = default_settings();
        segment_streams(&mut context, &settings);

        assert_eq!(context.segments.len(), 4);
        for segment in &context.segments {
            assert_eq!(segment.num_samples, 16);
        }
        check_invariants(&context, &settings);
    }

    #[test]
    fn divisible_clips_keep_ideal_sized_segments() {
        let mut context = make_context(48);
        let settings = default_settings();
        segment_streams(&mut context, &settings);

        assert_eq!(context.segments.len(), 3);
        assert!(context.segments.iter().all(|s| s.num_samples == 16));
        check_invariants(&context, &settings);
    }

    #[test]
    fn trailing_partial_segment_is_redistributed() {
        let mut context = make_context(33);
        let settings = default_settings();
        segment_streams(&mut context, &settings);

        // 33 = 17 + 16: the one leftover sample folds into segment 0.
        assert_eq!(context.segments.len(), 2);
        assert_eq!(context.segments[0].num_samples, 17);
        assert_eq!(context.segments[1].num_samples, 16);
        check_invariants(&context, &settings);
    }

    #[test]
    fn segments_carry_their_own_sample_windows() {
        let mut context = make_context(48);
        let settings = default_settings();
        segment_streams(&mut context, &settings);
        check_invariants(&context, &settings);

        for segment in &context.segments {
            let stream = &segment.bone_streams[0].translations;
            assert_eq!(stream.num_samples(), segment.num_samples);
            // Sample values are the clip sample indices.
            assert_eq!(stream.sample(0).x, f64::from(segment.clip_sample_offset));
        }
    }

    #[test]
    fn randomized_sample_counts_honor_bounds() {
        let settings = default_settings();
        for num_samples in 32..400u32 {
            let mut context = make_context(num_samples);
            segment_streams(&mut context, &settings);
            check_invariants(&context, &settings);
        }
    }
}
