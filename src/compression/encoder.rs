//! The compression entry point: run the pipeline and serialize the result.
//!
//! Layout, in write order (every offset is relative to the clip header):
//!
//! ```text
//! sealed header (16 bytes)
//! clip header
//! segment headers
//! align(4)  default-tracks bitset
//!           constant-tracks bitset
//! align(4)  constant sample pool
//! align(4)  clip range block
//! per segment:
//!           per-track bit-rate bytes
//! align(2)  segment range block
//! align(4)  animated (bit-packed) data
//! ```
//!
//! The buffer is allocated once at its exact final size; empty blocks store
//! the invalid-offset sentinel so the decoder skips them. Alignment padding
//! stays zeroed. The final step seals the buffer with its size and CRC.

use crate::compression::clip::AnimationClip;
use crate::compression::clip_context::{convert_rotation_streams, ClipContext, SegmentContext};
use crate::compression::constant_tracks::compact_constant_streams;
use crate::compression::error_metric::ErrorMetric;
use crate::compression::normalize::{normalize_clip_streams, normalize_segment_streams};
use crate::compression::quantize::{quantize_streams, LockedBone};
use crate::compression::ranges::{extract_clip_bone_ranges, extract_segment_bone_ranges};
use crate::compression::segmenting::segment_streams;
use crate::compression::settings::CompressionSettings;
use crate::compression::skeleton::RigidSkeleton;
use crate::compression::track_stream::{BoneStreams, TrackRange};
use crate::core::bitset::{bitset_set, bitset_size};
use crate::core::buffer::{CompressedClip, SEALED_HEADER_SIZE};
use crate::core::error::{Error, Result};
use crate::core::headers::{
    align_to, write_f32_le, write_u32_le, ClipHeader, SegmentHeader, CLIP_HEADER_SIZE,
    INVALID_OFFSET, SEGMENT_HEADER_SIZE,
};
use crate::core::packing::{
    pack_vector3_32, pack_vector3_96, pack_vector3_sxx, pack_vector3_uxx, pack_vector4_128,
};
use crate::core::range_reduction::{
    clip_range_rotation_size, RangeReductionFlags, CLIP_RANGE_VECTOR3_SIZE,
};
use crate::core::types::{
    is_constant_bit_rate, is_raw_bit_rate, num_bits_at_bit_rate, AlgorithmType, RotationFormat,
    VectorFormat, INVALID_BIT_RATE,
};
use crate::math::Vec4;
use log::debug;
use std::time::{Duration, Instant};

/// Diagnostics produced alongside the compressed buffer.
#[derive(Debug, Clone)]
pub struct CompressionStats {
    pub compressed_size: u32,
    pub raw_size: u32,
    pub num_segments: u32,
    pub num_default_tracks: u32,
    pub num_constant_tracks: u32,
    pub num_animated_tracks: u32,
    /// Histogram over the variable bit-rate table, indexed by bit rate.
    pub bit_rate_counts: [u32; 19],
    pub locked_bones: Vec<LockedBone>,
    pub compression_time: Duration,
}

/// A compressed buffer plus its compression diagnostics.
#[derive(Debug)]
pub struct CompressionResult {
    pub compressed: CompressedClip,
    pub stats: CompressionStats,
}

/// Compress `clip` against `skeleton` under `settings`.
pub fn compress_clip(
    clip: &AnimationClip,
    skeleton: &RigidSkeleton,
    settings: &CompressionSettings,
) -> Result<CompressionResult> {
    let start_time = Instant::now();

    settings.is_valid()?;
    validate_error_metric(clip, settings)?;

    let num_bones = clip.num_bones();
    if num_bones == 0 {
        return Err(Error::InvalidInput("clip has no bones".to_owned()));
    }
    if clip.num_samples() == 0 {
        return Err(Error::InvalidInput("clip has no samples".to_owned()));
    }

    let base_clip = clip.additive_base().map(|(_, base)| base);

    // ── Pipeline ────────────────────────────────────────────────────────
    let raw_context = ClipContext::from_clip(clip, skeleton)?;
    let mut context = ClipContext::from_clip(clip, skeleton)?;

    convert_rotation_streams(&mut context, settings.rotation_format);

    // Clip ranges feed both constant detection and normalization.
    extract_clip_bone_ranges(&mut context);
    compact_constant_streams(&mut context, &settings.constant_thresholds);

    if !settings.range_reduction.is_empty() {
        normalize_clip_streams(&mut context, settings.range_reduction);
    }

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

    let locked_bones = quantize_streams(&mut context, &raw_context, skeleton, settings, base_clip);

    calculate_animated_data_sizes(&mut context, settings);

    // ── Layout ──────────────────────────────────────────────────────────
    let num_tracks_per_bone: u32 = if context.has_scale { 3 } else { 2 };
    let num_tracks = u32::from(num_bones) * num_tracks_per_bone;
    let bitset_words = bitset_size(num_tracks);

    let constant_data_size = constant_data_size(&context, settings.rotation_format);
    let clip_range_data_size = clip_range_data_size(&context, settings);
    let format_per_track_data_size = format_per_track_data_size(&context, settings);

    let mut offset = CLIP_HEADER_SIZE;
    let segment_headers_offset = offset;
    offset += context.segments.len() as u32 * SEGMENT_HEADER_SIZE;

    offset = align_to(offset, 4);
    let default_tracks_bitset_offset = offset;
    offset += 4 * bitset_words;
    let constant_tracks_bitset_offset = offset;
    offset += 4 * bitset_words;

    offset = align_to(offset, 4);
    let constant_track_data_offset = offset;
    offset += constant_data_size;

    offset = align_to(offset, 4);
    let clip_range_data_offset = offset;
    offset += clip_range_data_size;

    let mut segment_block_offsets = Vec::with_capacity(context.segments.len());
    for segment in &context.segments {
        let format_per_track_offset = offset;
        offset += format_per_track_data_size;
        offset = align_to(offset, 2);
        let range_offset = offset;
        offset += segment.range_data_size;
        offset = align_to(offset, 4);
        let track_data_offset = offset;
        offset += segment.animated_data_size;
        segment_block_offsets.push((format_per_track_offset, range_offset, track_data_offset));
    }

    let payload_size = offset as usize;
    let buffer_size = SEALED_HEADER_SIZE + payload_size;

    // ── Write ───────────────────────────────────────────────────────────
    let mut compressed = CompressedClip::with_size(buffer_size, AlgorithmType::UniformlySampled);
    let payload = &mut compressed.as_mut_slice()[SEALED_HEADER_SIZE..];

    let clip_header = ClipHeader {
        num_bones,
        num_segments: context.segments.len() as u16,
        rotation_format: settings.rotation_format,
        translation_format: settings.translation_format,
        scale_format: settings.scale_format,
        clip_range_reduction: settings.range_reduction,
        segment_range_reduction: settings.segmenting.range_reduction,
        has_scale: context.has_scale,
        num_samples: context.num_samples,
        sample_rate: context.sample_rate,
        segment_headers_offset,
        default_tracks_bitset_offset,
        constant_tracks_bitset_offset,
        constant_track_data_offset: if constant_data_size > 0 {
            constant_track_data_offset
        } else {
            INVALID_OFFSET
        },
        clip_range_data_offset: if clip_range_data_size > 0 {
            clip_range_data_offset
        } else {
            INVALID_OFFSET
        },
    };
    clip_header.write_to(payload);
    // The delta neutral scale: additive1 clips are deltas around zero.
    payload[10] = u8::from(context.default_scale.x == 0.0);

    for (segment, &(format_offset, range_offset, track_offset)) in
        context.segments.iter().zip(&segment_block_offsets)
    {
        let header = SegmentHeader {
            num_samples: segment.num_samples,
            animated_pose_bit_size: segment.animated_pose_bit_size,
            format_per_track_data_offset: if format_per_track_data_size > 0 {
                format_offset
            } else {
                INVALID_OFFSET
            },
            range_data_offset: if segment.range_data_size > 0 {
                range_offset
            } else {
                INVALID_OFFSET
            },
            track_data_offset: if segment.animated_data_size > 0 {
                track_offset
            } else {
                INVALID_OFFSET
            },
        };
        header.write_to(
            payload,
            (segment_headers_offset + u32::from(segment.segment_index) * SEGMENT_HEADER_SIZE)
                as usize,
        );
    }

    write_track_bitsets(
        &context,
        payload,
        default_tracks_bitset_offset as usize,
        constant_tracks_bitset_offset as usize,
        bitset_words,
    );

    if constant_data_size > 0 {
        write_constant_track_data(
            &context,
            settings.rotation_format,
            payload,
            constant_track_data_offset as usize,
            constant_data_size,
        );
    }

    if clip_range_data_size > 0 {
        write_clip_range_data(
            &context,
            settings,
            payload,
            clip_range_data_offset as usize,
            clip_range_data_size,
        );
    }

    for (segment, &(format_offset, range_offset, track_offset)) in
        context.segments.iter().zip(&segment_block_offsets)
    {
        if format_per_track_data_size > 0 {
            write_format_per_track_data(&context, segment, settings, payload, format_offset as usize);
        }
        if segment.range_data_size > 0 {
            write_segment_range_data(&context, segment, settings, payload, range_offset as usize);
        }
        if segment.animated_data_size > 0 {
            write_animated_track_data(&context, segment, settings, payload, track_offset as usize);
        }
    }

    compressed.seal();
    debug_assert!(compressed.is_valid(true).is_ok());

    // ── Stats ───────────────────────────────────────────────────────────
    let mut stats = CompressionStats {
        compressed_size: buffer_size as u32,
        raw_size: clip.raw_size(),
        num_segments: context.segments.len() as u32,
        num_default_tracks: 0,
        num_constant_tracks: 0,
        num_animated_tracks: 0,
        bit_rate_counts: [0; 19],
        locked_bones,
        compression_time: start_time.elapsed(),
    };
    collect_track_stats(&context, &mut stats);

    debug!(
        "compressed '{}': {} bytes ({} segments, {:.2}x)",
        clip.name(),
        stats.compressed_size,
        stats.num_segments,
        f64::from(stats.raw_size) / f64::from(stats.compressed_size),
    );

    Ok(CompressionResult { compressed, stats })
}

fn validate_error_metric(clip: &AnimationClip, settings: &CompressionSettings) -> Result<()> {
    let expected = ErrorMetric::for_additive_kind(clip.additive_base().map(|(kind, _)| kind));
    if settings.error_metric != expected {
        return Err(Error::InvalidConfig(format!(
            "error metric '{}' does not match the clip (expected '{}')",
            settings.error_metric.name(),
            expected.name()
        )));
    }
    if let Some((_, base)) = clip.additive_base() {
        if base.num_bones() != clip.num_bones() {
            return Err(Error::InvalidInput(format!(
                "additive base clip has {} bones, delta clip has {}",
                base.num_bones(),
                clip.num_bones()
            )));
        }
    }
    Ok(())
}

// ── Sizes ────────────────────────────────────────────────────────────────────

/// Bits per animated track sample for one bone channel.
fn rotation_sample_bit_size(format: RotationFormat, bit_rate: u8) -> u32 {
    if format.is_variable() {
        3 * num_bits_at_bit_rate(bit_rate)
    } else {
        format.fixed_sample_bit_size()
    }
}

fn vector_sample_bit_size(format: VectorFormat, bit_rate: u8) -> u32 {
    if format.is_variable() {
        3 * num_bits_at_bit_rate(bit_rate)
    } else {
        format.fixed_sample_bit_size()
    }
}

/// Settle each segment's animated pose bit size and byte size.
fn calculate_animated_data_sizes(context: &mut ClipContext, settings: &CompressionSettings) {
    let has_scale = context.has_scale;
    for segment in &mut context.segments {
        let mut pose_bit_size = 0u32;
        for (bone_stream, rates) in segment.bone_streams.iter().zip(segment.bit_rates.iter()) {
            if bone_stream.is_rotation_animated() {
                pose_bit_size += rotation_sample_bit_size(settings.rotation_format, rates.rotation);
            }
            if bone_stream.is_translation_animated() {
                pose_bit_size += vector_sample_bit_size(settings.translation_format, rates.translation);
            }
            if has_scale && bone_stream.is_scale_animated() {
                pose_bit_size += vector_sample_bit_size(settings.scale_format, rates.scale);
            }
        }
        segment.animated_pose_bit_size = pose_bit_size;
        segment.animated_data_size =
            ((u64::from(pose_bit_size) * u64::from(segment.num_samples)).div_ceil(8)) as u32;
    }
}

fn constant_data_size(context: &ClipContext, rotation_format: RotationFormat) -> u32 {
    let rotation_size: u32 = if rotation_format.is_drop_w() { 12 } else { 16 };
    let mut size = 0;
    for bone_stream in context.single_like_segment_bone_streams() {
        if bone_stream.is_rotation_constant && !bone_stream.is_rotation_default {
            size += rotation_size;
        }
        if bone_stream.is_translation_constant && !bone_stream.is_translation_default {
            size += 12;
        }
        if context.has_scale && bone_stream.is_scale_constant && !bone_stream.is_scale_default {
            size += 12;
        }
    }
    size
}

fn clip_range_data_size(context: &ClipContext, settings: &CompressionSettings) -> u32 {
    if settings.range_reduction.is_empty() {
        return 0;
    }
    let mut size = 0;
    for bone_stream in context.single_like_segment_bone_streams() {
        if settings.range_reduction.contains(RangeReductionFlags::ROTATIONS)
            && bone_stream.is_rotation_animated()
        {
            size += clip_range_rotation_size(settings.rotation_format);
        }
        if settings.range_reduction.contains(RangeReductionFlags::TRANSLATIONS)
            && bone_stream.is_translation_animated()
        {
            size += CLIP_RANGE_VECTOR3_SIZE;
        }
        if context.has_scale
            && settings.range_reduction.contains(RangeReductionFlags::SCALES)
            && bone_stream.is_scale_animated()
        {
            size += CLIP_RANGE_VECTOR3_SIZE;
        }
    }
    size
}

fn format_per_track_data_size(context: &ClipContext, settings: &CompressionSettings) -> u32 {
    let mut size = 0;
    for bone_stream in context.single_like_segment_bone_streams() {
        if settings.rotation_format.is_variable() && bone_stream.is_rotation_animated() {
            size += 1;
        }
        if settings.translation_format.is_variable() && bone_stream.is_translation_animated() {
            size += 1;
        }
        if context.has_scale
            && settings.scale_format.is_variable()
            && bone_stream.is_scale_animated()
        {
            size += 1;
        }
    }
    size
}

impl ClipContext {
    /// Bone streams of the first segment; constant/default flags are
    /// clip-wide, so any segment answers flag queries.
    fn single_like_segment_bone_streams(&self) -> &[BoneStreams] {
        &self.segments[0].bone_streams
    }
}

// ── Block writers ────────────────────────────────────────────────────────────

fn for_each_track_flag(
    context: &ClipContext,
    mut callback: impl FnMut(u32, bool, bool), // (track_index, is_default, is_constant)
) {
    let num_tracks_per_bone = if context.has_scale { 3 } else { 2 };
    for (bone_index, bone_stream) in context.single_like_segment_bone_streams().iter().enumerate() {
        let base = bone_index as u32 * num_tracks_per_bone;
        callback(base, bone_stream.is_rotation_default, bone_stream.is_rotation_constant);
        callback(
            base + 1,
            bone_stream.is_translation_default,
            bone_stream.is_translation_constant,
        );
        if context.has_scale {
            callback(base + 2, bone_stream.is_scale_default, bone_stream.is_scale_constant);
        }
    }
}

fn write_track_bitsets(
    context: &ClipContext,
    payload: &mut [u8],
    default_offset: usize,
    constant_offset: usize,
    bitset_words: u32,
) {
    let mut default_bits = vec![0u32; bitset_words as usize];
    let mut constant_bits = vec![0u32; bitset_words as usize];

    for_each_track_flag(context, |track_index, is_default, is_constant| {
        if is_default {
            bitset_set(&mut default_bits, track_index, true);
        }
        if is_constant {
            bitset_set(&mut constant_bits, track_index, true);
        }
    });

    for (word_index, &word) in default_bits.iter().enumerate() {
        write_u32_le(payload, default_offset + word_index * 4, word);
    }
    for (word_index, &word) in constant_bits.iter().enumerate() {
        write_u32_le(payload, constant_offset + word_index * 4, word);
    }
}

fn write_f32_components(payload: &mut [u8], offset: &mut usize, value: Vec4, num_components: usize) {
    for component in 0..num_components {
        write_f32_le(payload, *offset, value.get(component) as f32);
        *offset += 4;
    }
}

fn write_constant_track_data(
    context: &ClipContext,
    rotation_format: RotationFormat,
    payload: &mut [u8],
    mut offset: usize,
    size: u32,
) {
    let end = offset + size as usize;
    let rotation_components = if rotation_format.is_drop_w() { 3 } else { 4 };

    for bone_stream in context.single_like_segment_bone_streams() {
        if bone_stream.is_rotation_constant && !bone_stream.is_rotation_default {
            let sample = bone_stream.rotations.sample(0);
            write_f32_components(payload, &mut offset, sample, rotation_components);
        }
        if bone_stream.is_translation_constant && !bone_stream.is_translation_default {
            let sample = bone_stream.translations.sample(0);
            write_f32_components(payload, &mut offset, sample, 3);
        }
        if context.has_scale && bone_stream.is_scale_constant && !bone_stream.is_scale_default {
            let sample = bone_stream.scales.sample(0);
            write_f32_components(payload, &mut offset, sample, 3);
        }
    }

    debug_assert_eq!(offset, end, "constant pool size mismatch");
}

fn write_range_entry(payload: &mut [u8], offset: &mut usize, range: &TrackRange, num_components: usize) {
    let min = range.min();
    let extent = range.extent();
    for component in 0..num_components {
        write_f32_le(payload, *offset, min.get(component) as f32);
        *offset += 4;
    }
    for component in 0..num_components {
        write_f32_le(payload, *offset, extent.get(component) as f32);
        *offset += 4;
    }
}

fn write_clip_range_data(
    context: &ClipContext,
    settings: &CompressionSettings,
    payload: &mut [u8],
    mut offset: usize,
    size: u32,
) {
    let end = offset + size as usize;
    let rotation_components = if settings.rotation_format.is_drop_w() { 3 } else { 4 };

    for (bone_stream, bone_range) in context
        .single_like_segment_bone_streams()
        .iter()
        .zip(context.ranges.iter())
    {
        if settings.range_reduction.contains(RangeReductionFlags::ROTATIONS)
            && bone_stream.is_rotation_animated()
        {
            write_range_entry(payload, &mut offset, &bone_range.rotation, rotation_components);
        }
        if settings.range_reduction.contains(RangeReductionFlags::TRANSLATIONS)
            && bone_stream.is_translation_animated()
        {
            write_range_entry(payload, &mut offset, &bone_range.translation, 3);
        }
        if context.has_scale
            && settings.range_reduction.contains(RangeReductionFlags::SCALES)
            && bone_stream.is_scale_animated()
        {
            write_range_entry(payload, &mut offset, &bone_range.scale, 3);
        }
    }

    debug_assert_eq!(offset, end, "clip range block size mismatch");
}

fn write_format_per_track_data(
    context: &ClipContext,
    segment: &SegmentContext,
    settings: &CompressionSettings,
    payload: &mut [u8],
    mut offset: usize,
) {
    for (bone_stream, rates) in segment.bone_streams.iter().zip(segment.bit_rates.iter()) {
        if settings.rotation_format.is_variable() && bone_stream.is_rotation_animated() {
            payload[offset] = rates.rotation;
            offset += 1;
        }
        if settings.translation_format.is_variable() && bone_stream.is_translation_animated() {
            payload[offset] = rates.translation;
            offset += 1;
        }
        if context.has_scale
            && settings.scale_format.is_variable()
            && bone_stream.is_scale_animated()
        {
            payload[offset] = rates.scale;
            offset += 1;
        }
    }
}

fn write_segment_range_u8(payload: &mut [u8], offset: &mut usize, range: &TrackRange, num_components: usize) {
    let min = range.min();
    let extent = range.extent();
    for component in 0..num_components {
        payload[*offset] = (min.get(component) * 255.0).round().clamp(0.0, 255.0) as u8;
        *offset += 1;
    }
    for component in 0..num_components {
        payload[*offset] = (extent.get(component) * 255.0).round().clamp(0.0, 255.0) as u8;
        *offset += 1;
    }
}

fn write_segment_range_data(
    context: &ClipContext,
    segment: &SegmentContext,
    settings: &CompressionSettings,
    payload: &mut [u8],
    mut offset: usize,
) {
    let end = offset + segment.range_data_size as usize;
    let rotation_components = if settings.rotation_format.is_drop_w() { 3 } else { 4 };

    for (bone_stream, bone_range) in segment.bone_streams.iter().zip(segment.ranges.iter()) {
        if segment.are_rotations_normalized && !bone_stream.is_rotation_constant {
            write_segment_range_u8(payload, &mut offset, &bone_range.rotation, rotation_components);
        }
        if segment.are_translations_normalized && !bone_stream.is_translation_constant {
            write_segment_range_u8(payload, &mut offset, &bone_range.translation, 3);
        }
        if segment.are_scales_normalized && !bone_stream.is_scale_constant {
            write_segment_range_u8(payload, &mut offset, &bone_range.scale, 3);
        }
    }

    debug_assert_eq!(offset, end, "segment range block size mismatch");
}

/// Write the bit-packed animated block: time-major, bone-major,
/// channel-major at each track's format or bit rate.
fn write_animated_track_data(
    context: &ClipContext,
    segment: &SegmentContext,
    settings: &CompressionSettings,
    payload: &mut [u8],
    byte_offset: usize,
) {
    let normalized_rotations =
        context.are_rotations_normalized || segment.are_rotations_normalized;
    let normalized_translations =
        context.are_translations_normalized || segment.are_translations_normalized;
    let normalized_scales = context.are_scales_normalized || segment.are_scales_normalized;

    let mut bit_offset = (byte_offset as u64) * 8;
    for sample_index in 0..segment.num_samples {
        for (bone_stream, rates) in segment.bone_streams.iter().zip(segment.bit_rates.iter()) {
            if bone_stream.is_rotation_animated() {
                let sample = bone_stream.rotations.sample(sample_index);
                bit_offset = write_rotation_sample(
                    payload,
                    bit_offset,
                    sample,
                    settings.rotation_format,
                    rates.rotation,
                    normalized_rotations,
                );
            }
            if bone_stream.is_translation_animated() {
                let sample = bone_stream.translations.sample(sample_index);
                bit_offset = write_vector_sample(
                    payload,
                    bit_offset,
                    sample,
                    settings.translation_format,
                    rates.translation,
                    normalized_translations,
                );
            }
            if context.has_scale && bone_stream.is_scale_animated() {
                let sample = bone_stream.scales.sample(sample_index);
                bit_offset = write_vector_sample(
                    payload,
                    bit_offset,
                    sample,
                    settings.scale_format,
                    rates.scale,
                    normalized_scales,
                );
            }
        }
    }

    debug_assert_eq!(
        bit_offset.div_ceil(8),
        byte_offset as u64 + u64::from(segment.animated_data_size),
        "animated block size mismatch"
    );
}

fn write_rotation_sample(
    payload: &mut [u8],
    bit_offset: u64,
    sample: Vec4,
    format: RotationFormat,
    bit_rate: u8,
    normalized: bool,
) -> u64 {
    match format {
        RotationFormat::QuatDropWVariable => {
            debug_assert!(bit_rate != INVALID_BIT_RATE);
            if is_constant_bit_rate(bit_rate) {
                bit_offset
            } else if is_raw_bit_rate(bit_rate) {
                pack_vector3_96(sample, payload, bit_offset);
                bit_offset + 96
            } else {
                let num_bits = num_bits_at_bit_rate(bit_rate);
                pack_vector3_uxx(sample, num_bits, payload, bit_offset);
                bit_offset + 3 * u64::from(num_bits)
            }
        }
        RotationFormat::Quat128 => {
            pack_vector4_128(sample, payload, bit_offset);
            bit_offset + 128
        }
        RotationFormat::QuatDropW96 => {
            pack_vector3_96(sample, payload, bit_offset);
            bit_offset + 96
        }
        RotationFormat::QuatDropW48 => {
            if normalized {
                pack_vector3_uxx(sample, 16, payload, bit_offset);
            } else {
                pack_vector3_sxx(sample, 16, payload, bit_offset);
            }
            bit_offset + 48
        }
        RotationFormat::QuatDropW32 => {
            pack_vector3_32(sample, normalized, payload, bit_offset);
            bit_offset + 32
        }
    }
}

fn write_vector_sample(
    payload: &mut [u8],
    bit_offset: u64,
    sample: Vec4,
    format: VectorFormat,
    bit_rate: u8,
    normalized: bool,
) -> u64 {
    match format {
        VectorFormat::Vector3Variable => {
            debug_assert!(bit_rate != INVALID_BIT_RATE);
            if is_constant_bit_rate(bit_rate) {
                bit_offset
            } else if is_raw_bit_rate(bit_rate) {
                pack_vector3_96(sample, payload, bit_offset);
                bit_offset + 96
            } else {
                let num_bits = num_bits_at_bit_rate(bit_rate);
                pack_vector3_uxx(sample, num_bits, payload, bit_offset);
                bit_offset + 3 * u64::from(num_bits)
            }
        }
        VectorFormat::Vector3_96 => {
            pack_vector3_96(sample, payload, bit_offset);
            bit_offset + 96
        }
        VectorFormat::Vector3_48 => {
            if normalized {
                pack_vector3_uxx(sample, 16, payload, bit_offset);
            } else {
                pack_vector3_sxx(sample, 16, payload, bit_offset);
            }
            bit_offset + 48
        }
        VectorFormat::Vector3_32 => {
            pack_vector3_32(sample, normalized, payload, bit_offset);
            bit_offset + 32
        }
    }
}

fn collect_track_stats(context: &ClipContext, stats: &mut CompressionStats) {
    for_each_track_flag(context, |_, is_default, is_constant| {
        if is_default {
            stats.num_default_tracks += 1;
        } else if is_constant {
            stats.num_constant_tracks += 1;
        } else {
            stats.num_animated_tracks += 1;
        }
    });

    for segment in &context.segments {
        for rates in &segment.bit_rates {
            for rate in [rates.rotation, rates.translation, rates.scale] {
                if rate != INVALID_BIT_RATE {
                    stats.bit_rate_counts[usize::from(rate)] += 1;
                }
            }
        }
    }
}
