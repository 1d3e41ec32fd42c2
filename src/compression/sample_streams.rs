//! Sampling staging streams as the decoder would see them.
//!
//! The bit-rate search needs to know, for any candidate bit rate, what a
//! decoder will reconstruct. This module simulates the full serialize +
//! decode chain on the staging samples: quantize at the candidate width,
//! then undo segment range reduction, then undo clip range reduction
//! (narrowing through f32 exactly where the serialized format does).

use crate::compression::clip_context::{ClipContext, SegmentContext};
use crate::compression::track_stream::{BoneStreams, TrackRange};
use crate::core::packing::quantize_unsigned;
use crate::core::types::{
    is_constant_bit_rate, is_raw_bit_rate, num_bits_at_bit_rate, BoneBitRate, RotationFormat,
    VectorFormat, INVALID_BIT_RATE,
};
use crate::math::{Quat, Transform, Vec4};

/// Round-trip one component through the serialized f32 width.
#[inline]
fn through_f32(value: f64) -> f64 {
    f64::from(value as f32)
}

/// Undo one level of range reduction on the active components.
#[inline]
fn denormalize(sample: Vec4, range: &TrackRange, num_components: usize) -> Vec4 {
    let mut result = sample;
    for component in 0..num_components {
        // Ranges are serialized as f32 (clip level) or 8-bit fixed point
        // exactly representable in f32 (segment level); narrow to match.
        let min = through_f32(range.min().get(component));
        let extent = through_f32(range.extent().get(component));
        result.set(component, sample.get(component) * extent + min);
    }
    result
}

/// Quantize the active components of a normalized sample at `num_bits`.
#[inline]
fn quantize_components(sample: Vec4, num_bits: u32, num_components: usize) -> Vec4 {
    let mut result = sample;
    for component in 0..num_components {
        result.set(component, quantize_unsigned(sample.get(component), num_bits));
    }
    result
}

#[inline]
fn f32_components(sample: Vec4, num_components: usize) -> Vec4 {
    let mut result = sample;
    for component in 0..num_components {
        result.set(component, through_f32(sample.get(component)));
    }
    result
}

/// Quantize with a signed fixed-width codec ([-1, 1] domain); used by the
/// fixed quantized formats when range reduction is disabled.
#[inline]
fn quantize_signed_components(sample: Vec4, num_bits: u32, num_components: usize) -> Vec4 {
    let mut result = sample;
    for component in 0..num_components {
        let unsigned = sample.get(component) * 0.5 + 0.5;
        result.set(component, quantize_unsigned(unsigned, num_bits) * 2.0 - 1.0);
    }
    result
}

/// Reconstructs decoder-accurate transforms from one segment's streams.
pub struct LossySampler<'a> {
    pub context: &'a ClipContext,
    pub segment: &'a SegmentContext,
    pub rotation_format: RotationFormat,
    pub translation_format: VectorFormat,
    pub scale_format: VectorFormat,
}

impl LossySampler<'_> {
    /// The lossy local pose at `sample_index` (segment-relative) under the
    /// candidate `bit_rates`.
    pub fn sample_pose(
        &self,
        bit_rates: &[BoneBitRate],
        sample_index: u32,
        out_local_pose: &mut [Transform],
    ) {
        for bone_index in 0..self.segment.bone_streams.len() {
            out_local_pose[bone_index] =
                self.sample_bone(&bit_rates[bone_index], bone_index as u16, sample_index);
        }
    }

    /// The lossy local transform of one bone.
    pub fn sample_bone(
        &self,
        bit_rates: &BoneBitRate,
        bone_index: u16,
        sample_index: u32,
    ) -> Transform {
        let bone_stream = &self.segment.bone_streams[usize::from(bone_index)];
        let clip_range = self.context.ranges.get(usize::from(bone_index));
        let segment_range = self.segment.ranges.get(usize::from(bone_index));

        let rotation = self.sample_rotation(bone_stream, bone_index, bit_rates.rotation, sample_index);

        let translation = self.sample_vector(
            &VectorChannel {
                stream: &bone_stream.translations,
                is_constant: bone_stream.is_translation_constant,
                is_default: bone_stream.is_translation_default,
                default_value: Vec4::zero(),
                format: self.translation_format,
                clip_range: clip_range.map(|r| &r.translation),
                segment_range: segment_range.map(|r| &r.translation),
                clip_normalized: self.context.are_translations_normalized,
                segment_normalized: self.segment.are_translations_normalized,
            },
            bit_rates.translation,
            sample_index,
        );

        let scale = self.sample_vector(
            &VectorChannel {
                stream: &bone_stream.scales,
                is_constant: bone_stream.is_scale_constant || !self.context.has_scale,
                is_default: bone_stream.is_scale_default || !self.context.has_scale,
                default_value: Vec4::from_vec3(self.context.default_scale),
                format: self.scale_format,
                clip_range: clip_range.map(|r| &r.scale),
                segment_range: segment_range.map(|r| &r.scale),
                clip_normalized: self.context.are_scales_normalized,
                segment_normalized: self.segment.are_scales_normalized,
            },
            bit_rates.scale,
            sample_index,
        );

        Transform::new(rotation, translation.xyz(), scale.xyz())
    }

    fn sample_rotation(
        &self,
        bone_stream: &BoneStreams,
        bone_index: u16,
        bit_rate: u8,
        sample_index: u32,
    ) -> Quat {
        if bone_stream.is_rotation_default {
            return Quat::identity();
        }

        let num_components = if self.rotation_format.is_drop_w() { 3 } else { 4 };

        if bone_stream.is_rotation_constant {
            // Constant pool samples are stored as raw f32 components.
            let sample = f32_components(bone_stream.rotations.sample(0), num_components);
            return rebuild_rotation(sample, self.rotation_format);
        }

        let sample = bone_stream.rotations.sample(sample_index);
        let clip_range = self
            .context
            .ranges
            .get(usize::from(bone_index))
            .map(|r| &r.rotation);
        let segment_range = self
            .segment
            .ranges
            .get(usize::from(bone_index))
            .map(|r| &r.rotation);

        let reconstructed = reconstruct_components(
            sample,
            self.rotation_format.is_variable(),
            self.rotation_format.fixed_sample_bit_size(),
            bit_rate,
            num_components,
            clip_range,
            segment_range,
            self.context.are_rotations_normalized,
            self.segment.are_rotations_normalized,
        );
        rebuild_rotation(reconstructed, self.rotation_format)
    }

    fn sample_vector(&self, channel: &VectorChannel<'_>, bit_rate: u8, sample_index: u32) -> Vec4 {
        if channel.is_default {
            return channel.default_value;
        }
        if channel.is_constant {
            return f32_components(channel.stream.sample(0), 3);
        }

        let sample = channel.stream.sample(sample_index);
        reconstruct_components(
            sample,
            channel.format.is_variable(),
            channel.format.fixed_sample_bit_size(),
            bit_rate,
            3,
            channel.clip_range,
            channel.segment_range,
            channel.clip_normalized,
            channel.segment_normalized,
        )
    }
}

/// The shared quantize + denormalize chain.
#[allow(clippy::too_many_arguments)]
fn reconstruct_components(
    sample: Vec4,
    is_variable: bool,
    fixed_bit_size: u32,
    bit_rate: u8,
    num_components: usize,
    clip_range: Option<&TrackRange>,
    segment_range: Option<&TrackRange>,
    clip_normalized: bool,
    segment_normalized: bool,
) -> Vec4 {
    let mut value = if is_variable {
        debug_assert!(bit_rate != INVALID_BIT_RATE);
        if is_constant_bit_rate(bit_rate) {
            // No animated bits; the decoder reads the segment minimum,
            // which already lives in clip-normalized space.
            let range = segment_range.expect("constant bit rate requires segment ranges");
            let mut constant = Vec4::zero();
            for component in 0..num_components {
                constant.set(component, through_f32(range.min().get(component)));
            }
            return finish_clip_denormalize(constant, num_components, clip_range, clip_normalized);
        } else if is_raw_bit_rate(bit_rate) {
            f32_components(sample, num_components)
        } else {
            quantize_components(sample, num_bits_at_bit_rate(bit_rate), num_components)
        }
    } else {
        // Fixed formats: full-precision floats, or fixed-width fields
        // (unsigned over a normalized range, signed otherwise).
        let normalized = clip_normalized || segment_normalized;
        match fixed_bit_size {
            96 | 128 => f32_components(sample, num_components),
            48 => {
                if normalized {
                    quantize_components(sample, 16, num_components)
                } else {
                    quantize_signed_components(sample, 16, num_components)
                }
            }
            32 => {
                let mut result = sample;
                for component in 0..num_components {
                    let num_bits = if component == 2 { 10 } else { 11 };
                    let v = sample.get(component);
                    let q = if normalized {
                        quantize_unsigned(v, num_bits)
                    } else {
                        quantize_unsigned(v * 0.5 + 0.5, num_bits) * 2.0 - 1.0
                    };
                    result.set(component, q);
                }
                result
            }
            _ => unreachable!("unsupported fixed sample size: {fixed_bit_size}"),
        }
    };

    if segment_normalized {
        let range = segment_range.expect("segment-normalized track requires segment ranges");
        value = denormalize(value, range, num_components);
    }
    finish_clip_denormalize(value, num_components, clip_range, clip_normalized)
}

#[inline]
fn finish_clip_denormalize(
    value: Vec4,
    num_components: usize,
    clip_range: Option<&TrackRange>,
    clip_normalized: bool,
) -> Vec4 {
    if clip_normalized {
        let range = clip_range.expect("clip-normalized track requires clip ranges");
        denormalize(value, range, num_components)
    } else {
        value
    }
}

struct VectorChannel<'a> {
    stream: &'a crate::compression::track_stream::TrackStream,
    is_constant: bool,
    is_default: bool,
    default_value: Vec4,
    format: VectorFormat,
    clip_range: Option<&'a TrackRange>,
    segment_range: Option<&'a TrackRange>,
    clip_normalized: bool,
    segment_normalized: bool,
}

/// Rebuild a rotation from reconstructed components.
#[inline]
pub fn rebuild_rotation(components: Vec4, format: RotationFormat) -> Quat {
    if format.is_drop_w() {
        Quat::from_positive_w(components.x, components.y, components.z).normalize()
    } else {
        Quat::from_vec4(components).normalize()
    }
}

/// The raw local transform of one bone at a clip sample index, taken from
/// an untouched staging context.
pub fn sample_raw_transform(
    raw_segment: &SegmentContext,
    bone_index: u16,
    clip_sample_index: u32,
) -> Transform {
    let bone_stream = &raw_segment.bone_streams[usize::from(bone_index)];
    Transform::new(
        Quat::from_vec4(bone_stream.rotations.sample(clip_sample_index)),
        bone_stream.translations.sample(clip_sample_index).xyz(),
        bone_stream.scales.sample(clip_sample_index).xyz(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    #[test]
    fn rebuild_drop_w_recovers_the_scalar_part() {
        let q = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.8).ensure_positive_w();
        let rebuilt = rebuild_rotation(q.to_vec4(), RotationFormat::QuatDropWVariable);
        assert!(Quat::angle_between(q, rebuilt) < 1.0e-9);
    }

    #[test]
    fn f32_narrowing_matches_serialized_width() {
        let value = 0.123456789012345_f64;
        assert_eq!(through_f32(value), f64::from(0.123456789012345_f64 as f32));
    }

    #[test]
    fn denormalize_inverts_normalization_within_f32() {
        let range = TrackRange::from_min_max(
            Vec4::new(-1.5, 2.0, 0.0, 0.0),
            Vec4::new(2.5, 3.0, 1.0, 0.0),
        );
        let original = Vec4::new(0.5, 2.75, 0.125, 0.0);
        let normalized = crate::compression::normalize::normalize_sample(original, &range);
        let recovered = denormalize(normalized, &range, 3);

        assert!((recovered.x - original.x).abs() < 1.0e-6);
        assert!((recovered.y - original.y).abs() < 1.0e-6);
        assert!((recovered.z - original.z).abs() < 1.0e-6);
    }
}
