//! The variable bit-rate search.
//!
//! Each segment gets its own per-bone, per-channel bit rates. The search is
//! a monotonic hill climb:
//!
//! 1. Every variable track starts at the lowest bit rate, or rate 0 when
//!    its segment range has zero extent and there is nothing to store.
//! 2. Find the first bone, walking root-first, whose shell-distance error
//!    against the raw pose exceeds the clip threshold.
//! 3. Walk that bone's ancestor chain and evaluate a one-step upgrade of
//!    every upgradable track, keeping the upgrade that removes the most
//!    error on the offending frame. Ancestors are preferred because a
//!    parent's precision benefits every descendant.
//! 4. When no track in the chain can improve, lock the bone and accept it.
//!
//! Every iteration either raises a bit rate (bounded by the table) or locks
//! a bone (bounded by the bone count), so the search always terminates.

use crate::compression::clip::AnimationClip;
use crate::compression::clip_context::{ClipContext, SegmentContext};
use crate::compression::error_metric::{
    apply_additive_to_base, calculate_error_per_bone, object_transform_of, shell_distance,
    ErrorMetric, ErrorScratch,
};
use crate::compression::sample_streams::{sample_raw_transform, LossySampler};
use crate::compression::settings::CompressionSettings;
use crate::compression::skeleton::RigidSkeleton;
use crate::compression::track_stream::TrackRange;
use crate::core::types::{
    BoneBitRate, TrackType, HIGHEST_BIT_RATE, INVALID_BIT_RATE, LOWEST_BIT_RATE,
};
use crate::math::Transform;
use log::{debug, warn};

/// Extents below this leave nothing to quantize in a segment.
const SEGMENT_CONSTANT_THRESHOLD: f64 = 1.0e-9;

/// A bone the search could not bring under the error threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedBone {
    pub segment_index: u16,
    pub bone_index: u16,
    /// The residual error when the bone was locked.
    pub error_bits: u64,
}

impl LockedBone {
    pub fn error(&self) -> f64 {
        f64::from_bits(self.error_bits)
    }
}

/// Scratch buffers reused across every iteration of the search; reset, not
/// reallocated, between frames.
struct QuantizeScratch {
    raw_pose: Vec<Transform>,
    lossy_pose: Vec<Transform>,
    base_pose: Vec<Transform>,
    combined_raw: Vec<Transform>,
    combined_lossy: Vec<Transform>,
    error_per_bone: Vec<f64>,
    error_scratch: ErrorScratch,
}

impl QuantizeScratch {
    fn new(num_bones: u16) -> Self {
        let n = usize::from(num_bones);
        Self {
            raw_pose: vec![Transform::identity(); n],
            lossy_pose: vec![Transform::identity(); n],
            base_pose: vec![Transform::identity(); n],
            combined_raw: vec![Transform::identity(); n],
            combined_lossy: vec![Transform::identity(); n],
            error_per_bone: vec![0.0; n],
            error_scratch: ErrorScratch::new(num_bones),
        }
    }
}

/// Assign per-segment bit rates so that every bone's shell-distance error
/// stays within the clip threshold, minimizing total bits. Returns the
/// bones that could not be brought under the threshold.
pub fn quantize_streams(
    context: &mut ClipContext,
    raw_context: &ClipContext,
    skeleton: &RigidSkeleton,
    settings: &CompressionSettings,
    base_clip: Option<&AnimationClip>,
) -> Vec<LockedBone> {
    let is_rotation_variable = settings.rotation_format.is_variable();
    let is_translation_variable = settings.translation_format.is_variable();
    let is_scale_variable = settings.scale_format.is_variable();

    let num_bones = context.num_bones;
    let mut scratch = QuantizeScratch::new(num_bones);
    let mut locked_bones = Vec::new();

    let raw_segment = raw_context.single_segment();

    // Without any variable format there is nothing to search; the fixed
    // formats were chosen by the caller.
    let any_variable = is_rotation_variable || is_translation_variable || is_scale_variable;

    let num_segments = context.segments.len();
    for segment_index in 0..num_segments {
        initialize_bit_rates(context, segment_index, settings);
        if !any_variable {
            continue;
        }

        // Split borrows: the sampler reads the segment and context
        // immutably; the candidate bit rates live in a local copy.
        let segment = &context.segments[segment_index];
        let mut bit_rates = segment.bit_rates.clone();
        let mut locked = vec![false; usize::from(num_bones)];

        let sampler = LossySampler {
            context,
            segment,
            rotation_format: settings.rotation_format,
            translation_format: settings.translation_format,
            scale_format: settings.scale_format,
        };

        loop {
            let Some((bad_frame, bad_bone, bad_error)) = find_bad_bone(
                context,
                segment,
                raw_segment,
                skeleton,
                settings,
                base_clip,
                &sampler,
                &bit_rates,
                &locked,
                &mut scratch,
            ) else {
                break;
            };

            match select_upgrade(
                segment,
                raw_segment,
                skeleton,
                settings,
                base_clip,
                &sampler,
                &bit_rates,
                bad_frame,
                bad_bone,
                &mut scratch,
            ) {
                None => {
                    // Every track in the chain is already at its ceiling.
                    locked[usize::from(bad_bone)] = true;
                    locked_bones.push(LockedBone {
                        segment_index: segment.segment_index,
                        bone_index: bad_bone,
                        error_bits: bad_error.to_bits(),
                    });
                    warn!(
                        "segment {}: bone {} locked with residual error {:.6}",
                        segment.segment_index, bad_bone, bad_error
                    );
                }
                Some((target_bone, target_track)) => {
                    let rates = &mut bit_rates[usize::from(target_bone)];
                    match target_track {
                        TrackType::Rotation => rates.rotation += 1,
                        TrackType::Translation => rates.translation += 1,
                        TrackType::Scale => rates.scale += 1,
                    }
                }
            }
        }

        debug!(
            "segment {segment_index}: bit-rate search settled ({} locked so far)",
            locked_bones.len()
        );
        context.segments[segment_index].bit_rates = bit_rates;
    }

    locked_bones
}

/// Seed every track's starting bit rate for one segment.
fn initialize_bit_rates(
    context: &mut ClipContext,
    segment_index: usize,
    settings: &CompressionSettings,
) {
    let is_rotation_variable = settings.rotation_format.is_variable();
    let is_translation_variable = settings.translation_format.is_variable();
    let is_scale_variable = settings.scale_format.is_variable();
    let has_scale = context.has_scale;

    let segment = &mut context.segments[segment_index];
    let ranges = &segment.ranges;
    let rotations_normalized = segment.are_rotations_normalized;
    let translations_normalized = segment.are_translations_normalized;
    let scales_normalized = segment.are_scales_normalized;

    for (bone_index, bone_stream) in segment.bone_streams.iter().enumerate() {
        let segment_range = ranges.get(bone_index);
        // Rate 0 stores the value in the segment range minimum, so it is
        // only legal for channels with segment range reduction.
        let starting_rate =
            |is_variable: bool, is_animated: bool, normalized: bool, range: Option<&TrackRange>| {
                if !is_variable || !is_animated {
                    INVALID_BIT_RATE
                } else if normalized
                    && range.is_some_and(|r| r.is_constant(SEGMENT_CONSTANT_THRESHOLD))
                {
                    // Zero extent within the segment: the range minimum is
                    // the value, no animated bits needed.
                    0
                } else {
                    LOWEST_BIT_RATE
                }
            };

        segment.bit_rates[bone_index] = BoneBitRate {
            rotation: starting_rate(
                is_rotation_variable,
                bone_stream.is_rotation_animated(),
                rotations_normalized,
                segment_range.map(|r| &r.rotation),
            ),
            translation: starting_rate(
                is_translation_variable,
                bone_stream.is_translation_animated(),
                translations_normalized,
                segment_range.map(|r| &r.translation),
            ),
            scale: starting_rate(
                is_scale_variable,
                has_scale && bone_stream.is_scale_animated(),
                scales_normalized,
                segment_range.map(|r| &r.scale),
            ),
        };
    }
}

/// Scan the segment for the first (root-most) bone over the threshold.
/// Returns `(frame, bone, error)` or `None` when the segment converged.
/// At `High` and above the whole segment is scanned for the worst offender
/// instead of stopping at the first.
#[allow(clippy::too_many_arguments)]
fn find_bad_bone(
    context: &ClipContext,
    segment: &SegmentContext,
    raw_segment: &SegmentContext,
    skeleton: &RigidSkeleton,
    settings: &CompressionSettings,
    base_clip: Option<&AnimationClip>,
    sampler: &LossySampler<'_>,
    bit_rates: &[BoneBitRate],
    locked: &[bool],
    scratch: &mut QuantizeScratch,
) -> Option<(u32, u16, f64)> {
    let num_bones = usize::from(context.num_bones);
    let scan_whole_segment = settings.scan_whole_segment();
    let threshold = context.error_threshold;

    let mut found: Option<(u32, u16, f64)> = None;
    let mut worst_error = threshold;

    for frame in 0..segment.num_samples {
        let clip_sample_index = segment.clip_sample_offset + frame;
        for bone_index in 0..num_bones {
            scratch.raw_pose[bone_index] =
                sample_raw_transform(raw_segment, bone_index as u16, clip_sample_index);
        }
        sampler.sample_pose(bit_rates, frame, &mut scratch.lossy_pose);

        let has_base = fill_base_pose(context, base_clip, clip_sample_index, &mut scratch.base_pose);
        calculate_error_per_bone(
            settings.error_metric,
            skeleton,
            &scratch.raw_pose,
            &scratch.lossy_pose,
            if has_base { Some(scratch.base_pose.as_slice()) } else { None },
            &mut scratch.error_scratch,
            &mut scratch.error_per_bone,
        );

        for bone_index in 0..num_bones {
            let error = scratch.error_per_bone[bone_index];
            if error > worst_error && !locked[bone_index] {
                worst_error = error;
                found = Some((frame, bone_index as u16, error));
                // Root-first: deeper bones inherit this bone's error.
                break;
            }
        }

        if !scan_whole_segment && found.is_some() {
            break;
        }
    }

    found
}

/// Walk the offending bone's ancestor chain and pick the single one-step
/// upgrade with the largest error reduction on the offending frame.
/// Candidates are evaluated root first; among equal reductions rotation
/// wins over translation over scale.
#[allow(clippy::too_many_arguments)]
fn select_upgrade(
    segment: &SegmentContext,
    raw_segment: &SegmentContext,
    skeleton: &RigidSkeleton,
    settings: &CompressionSettings,
    base_clip: Option<&AnimationClip>,
    sampler: &LossySampler<'_>,
    bit_rates: &[BoneBitRate],
    bad_frame: u32,
    bad_bone: u16,
    scratch: &mut QuantizeScratch,
) -> Option<(u16, TrackType)> {
    let context = sampler.context;
    let clip_sample_index = segment.clip_sample_offset + bad_frame;
    let num_bones = usize::from(context.num_bones);

    // Rebuild the offending frame's poses.
    for bone_index in 0..num_bones {
        scratch.raw_pose[bone_index] =
            sample_raw_transform(raw_segment, bone_index as u16, clip_sample_index);
    }
    sampler.sample_pose(bit_rates, bad_frame, &mut scratch.lossy_pose);
    fill_base_pose(context, base_clip, clip_sample_index, &mut scratch.base_pose);

    combine_with_base(settings.error_metric, scratch);

    let vertex_distance = skeleton.bone(bad_bone).vertex_distance;
    let raw_object = object_transform_of(skeleton, &scratch.combined_raw, bad_bone);
    let current_error = shell_distance(
        raw_object,
        object_transform_of(skeleton, &scratch.combined_lossy, bad_bone),
        vertex_distance,
    );

    // Ancestor chain, root first.
    let mut chain = Vec::with_capacity(8);
    let mut current = Some(bad_bone);
    while let Some(bone_index) = current {
        chain.push(bone_index);
        current = skeleton.bone(bone_index).parent_index;
    }
    chain.reverse();

    // Any upgradable track is a candidate, even one that does not improve
    // this frame: the search must keep climbing toward raw rather than
    // lock a bone that higher rates would fix. Root-first iteration and
    // the strict comparison implement the tie-breaks.
    let mut best: Option<(u16, TrackType)> = None;
    let mut best_reduction = f64::NEG_INFINITY;

    for &chain_bone in &chain {
        for track in [TrackType::Rotation, TrackType::Translation, TrackType::Scale] {
            let rates = bit_rates[usize::from(chain_bone)];
            let current_rate = match track {
                TrackType::Rotation => rates.rotation,
                TrackType::Translation => rates.translation,
                TrackType::Scale => rates.scale,
            };
            // Rate 0 tracks are constant within the segment and raw tracks
            // are already exact; neither can improve.
            if current_rate == INVALID_BIT_RATE
                || current_rate == 0
                || current_rate >= HIGHEST_BIT_RATE
            {
                continue;
            }

            let mut candidate_rates = rates;
            match track {
                TrackType::Rotation => candidate_rates.rotation += 1,
                TrackType::Translation => candidate_rates.translation += 1,
                TrackType::Scale => candidate_rates.scale += 1,
            }

            // Counter-factual: re-sample only this bone at the higher rate
            // and re-measure the offending bone.
            let candidate_local = sampler.sample_bone(&candidate_rates, chain_bone, bad_frame);
            let saved = scratch.combined_lossy[usize::from(chain_bone)];
            scratch.combined_lossy[usize::from(chain_bone)] = match settings.error_metric {
                ErrorMetric::Absolute => candidate_local,
                ErrorMetric::Additive(kind) => apply_additive_to_base(
                    kind,
                    scratch.base_pose[usize::from(chain_bone)],
                    candidate_local,
                ),
            };

            let candidate_error = shell_distance(
                raw_object,
                object_transform_of(skeleton, &scratch.combined_lossy, bad_bone),
                vertex_distance,
            );
            scratch.combined_lossy[usize::from(chain_bone)] = saved;

            let reduction = current_error - candidate_error;
            if reduction > best_reduction {
                best_reduction = reduction;
                best = Some((chain_bone, track));
            }
        }
    }

    best
}

/// Sample the additive base pose for the current frame into `base_pose`;
/// returns whether a base clip exists.
fn fill_base_pose(
    context: &ClipContext,
    base_clip: Option<&AnimationClip>,
    clip_sample_index: u32,
    base_pose: &mut [Transform],
) -> bool {
    let Some(base_clip) = base_clip else {
        return false;
    };
    let sample_time = f64::from(clip_sample_index) / f64::from(context.sample_rate);
    base_clip.sample_pose(sample_time, base_pose);
    true
}

/// Populate `combined_raw` / `combined_lossy` from the raw and lossy local
/// poses, applying the additive base when the metric requires it.
fn combine_with_base(metric: ErrorMetric, scratch: &mut QuantizeScratch) {
    match metric {
        ErrorMetric::Absolute => {
            scratch.combined_raw.copy_from_slice(&scratch.raw_pose);
            scratch.combined_lossy.copy_from_slice(&scratch.lossy_pose);
        }
        ErrorMetric::Additive(kind) => {
            for bone_index in 0..scratch.raw_pose.len() {
                scratch.combined_raw[bone_index] = apply_additive_to_base(
                    kind,
                    scratch.base_pose[bone_index],
                    scratch.raw_pose[bone_index],
                );
                scratch.combined_lossy[bone_index] = apply_additive_to_base(
                    kind,
                    scratch.base_pose[bone_index],
                    scratch.lossy_pose[bone_index],
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::clip::BoneTracks;
    use crate::compression::constant_tracks::compact_constant_streams;
    use crate::compression::normalize::{normalize_clip_streams, normalize_segment_streams};
    use crate::compression::ranges::{extract_clip_bone_ranges, extract_segment_bone_ranges};
    use crate::compression::segmenting::segment_streams;
    use crate::compression::skeleton::RigidBone;
    use crate::math::{Quat, Vec3};

    fn prepare(
        clip: &AnimationClip,
        skeleton: &RigidSkeleton,
        settings: &CompressionSettings,
    ) -> (ClipContext, ClipContext) {
        let raw_context = ClipContext::from_clip(clip, skeleton).unwrap();
        let mut context = ClipContext::from_clip(clip, skeleton).unwrap();

        crate::compression::clip_context::convert_rotation_streams(
            &mut context,
            settings.rotation_format,
        );
        extract_clip_bone_ranges(&mut context);
        compact_constant_streams(&mut context, &settings.constant_thresholds);
        normalize_clip_streams(&mut context, settings.range_reduction);
        if settings.segmenting.enabled {
            segment_streams(&mut context, &settings.segmenting);
            if !settings.segmenting.range_reduction.is_empty() {
                extract_segment_bone_ranges(&mut context);
                normalize_segment_streams(
                    &mut context,
                    settings.segmenting.range_reduction,
                    settings.rotation_format,
                );
            }
        }
        (context, raw_context)
    }

    fn rotating_clip(num_samples: u32) -> (RigidSkeleton, AnimationClip) {
        let mut root = RigidBone::root("root");
        root.vertex_distance = 1.0;
        let mut child = RigidBone::child_of("child", 0);
        child.vertex_distance = 1.0;
        let skeleton = RigidSkeleton::new(vec![root, child]).unwrap();

        let mut root_tracks = BoneTracks::identity(num_samples as usize);
        for (sample_index, rotation) in root_tracks.rotations.iter_mut().enumerate() {
            let angle = sample_index as f64 / (num_samples - 1) as f64 * std::f64::consts::FRAC_PI_2;
            *rotation = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), angle);
        }
        let mut child_tracks = BoneTracks::identity(num_samples as usize);
        for translation in &mut child_tracks.translations {
            *translation = Vec3::new(0.0, 0.0, 1.0);
        }

        let clip = AnimationClip::new(
            &skeleton,
            "rotating",
            num_samples,
            30,
            0.01,
            vec![root_tracks, child_tracks],
        )
        .unwrap();
        (skeleton, clip)
    }

    #[test]
    fn search_converges_within_threshold() {
        let (skeleton, clip) = rotating_clip(30);
        let settings = CompressionSettings::default();
        let (mut context, raw_context) = prepare(&clip, &skeleton, &settings);

        let locked = quantize_streams(&mut context, &raw_context, &skeleton, &settings, None);
        assert!(locked.is_empty(), "locked bones: {locked:?}");

        // Verify the converged rates actually satisfy the threshold.
        let mut scratch = QuantizeScratch::new(context.num_bones);
        for segment in &context.segments {
            let sampler = LossySampler {
                context: &context,
                segment,
                rotation_format: settings.rotation_format,
                translation_format: settings.translation_format,
                scale_format: settings.scale_format,
            };
            for frame in 0..segment.num_samples {
                let clip_sample = segment.clip_sample_offset + frame;
                for bone_index in 0..usize::from(context.num_bones) {
                    scratch.raw_pose[bone_index] = sample_raw_transform(
                        raw_context.single_segment(),
                        bone_index as u16,
                        clip_sample,
                    );
                }
                sampler.sample_pose(&segment.bit_rates, frame, &mut scratch.lossy_pose);
                calculate_error_per_bone(
                    ErrorMetric::Absolute,
                    &skeleton,
                    &scratch.raw_pose,
                    &scratch.lossy_pose,
                    None,
                    &mut scratch.error_scratch,
                    &mut scratch.error_per_bone,
                );
                for (bone_index, &error) in scratch.error_per_bone.iter().enumerate() {
                    assert!(
                        error <= context.error_threshold,
                        "frame {frame} bone {bone_index}: error {error}"
                    );
                }
            }
        }
    }

    #[test]
    fn constant_tracks_are_not_assigned_animated_rates() {
        let (skeleton, clip) = rotating_clip(30);
        let settings = CompressionSettings::default();
        let (mut context, raw_context) = prepare(&clip, &skeleton, &settings);

        quantize_streams(&mut context, &raw_context, &skeleton, &settings, None);

        for segment in &context.segments {
            for (bone_stream, rates) in segment.bone_streams.iter().zip(segment.bit_rates.iter()) {
                if !bone_stream.is_rotation_animated() {
                    assert_eq!(rates.rotation, INVALID_BIT_RATE);
                }
                if !bone_stream.is_translation_animated() {
                    assert_eq!(rates.translation, INVALID_BIT_RATE);
                }
            }
        }
    }

    #[test]
    fn tight_threshold_raises_rates_monotonically() {
        let (skeleton, template) = rotating_clip(30);
        let bones = template.bones().to_vec();
        let clip_loose =
            AnimationClip::new(&skeleton, "loose", 30, 30, 0.05, bones.clone()).unwrap();
        let clip_tight =
            AnimationClip::new(&skeleton, "tight", 30, 30, 0.0001, bones).unwrap();

        let settings = CompressionSettings::default();
        let total_bits = |clip: &AnimationClip| -> u32 {
            let (mut context, raw_context) = prepare(clip, &skeleton, &settings);
            quantize_streams(&mut context, &raw_context, &skeleton, &settings, None);
            context
                .segments
                .iter()
                .flat_map(|segment| segment.bit_rates.iter())
                .map(|rates| {
                    let bits = |rate: u8| {
                        if rate == INVALID_BIT_RATE {
                            0
                        } else {
                            crate::core::types::num_bits_at_bit_rate(rate)
                        }
                    };
                    bits(rates.rotation) + bits(rates.translation) + bits(rates.scale)
                })
                .sum()
        };

        assert!(total_bits(&clip_tight) > total_bits(&clip_loose));
    }
}
