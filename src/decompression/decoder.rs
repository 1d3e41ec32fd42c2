//! Pose and single-bone decompression.
//!
//! Decoding walks the bones in index order, advancing a set of cursors
//! through the serialized blocks: the constant pool and clip range block
//! (clip-wide), and per seek key the bit-rate bytes, segment range block,
//! and bit-packed animated data of that key's segment. Both keys usually
//! land in the same segment; across a boundary each key simply carries its
//! own cursors.
//!
//! The reconstruction chain mirrors the encoder exactly: unpack at the
//! track's width, undo segment range reduction (8-bit min/extent), undo
//! clip range reduction (f32 min/extent), then rebuild rotations from
//! their packed components and interpolate.

use crate::core::bit_buffer::read_unsigned;
use crate::core::headers::read_f32_le;
use crate::core::packing::{unpack_scalar_signed, unpack_scalar_unsigned};
use crate::core::range_reduction::RangeReductionFlags;
use crate::core::types::{
    is_constant_bit_rate, is_raw_bit_rate, num_bits_at_bit_rate, RotationFormat,
};
use crate::decompression::context::DecompressionContext;
use crate::math::{Quat, Transform, Vec3, Vec4};

/// Decompress the whole pose at the seeked time into `out_pose` (one
/// transform per bone, in skeleton order).
pub fn decompress_pose(context: &DecompressionContext<'_>, out_pose: &mut [Transform]) {
    debug_assert_eq!(out_pose.len(), usize::from(context.num_bones()));

    let mut decoder = PoseDecoder::new(context);
    for bone_index in 0..context.num_bones() {
        let rotation = decoder.decode_rotation(true).unwrap_or_else(Quat::identity);
        let translation = decoder.decode_translation(true).unwrap_or_else(Vec3::zero);
        let scale = decoder.decode_scale(true).unwrap_or(decoder.default_scale);
        out_pose[usize::from(bone_index)] = Transform::new(rotation, translation, scale);
    }
}

/// Decompress a single bone, writing only the requested channels. Channels
/// that are not requested are skipped without unpacking their data.
pub fn decompress_bone(
    context: &DecompressionContext<'_>,
    bone_index: u16,
    out_rotation: Option<&mut Quat>,
    out_translation: Option<&mut Vec3>,
    out_scale: Option<&mut Vec3>,
) {
    debug_assert!(bone_index < context.num_bones());

    let want_rotation = out_rotation.is_some();
    let want_translation = out_translation.is_some();
    let want_scale = out_scale.is_some();

    let mut decoder = PoseDecoder::new(context);
    let default_scale = decoder.default_scale;
    let mut rotation = None;
    let mut translation = None;
    let mut scale = None;

    for current_bone in 0..=bone_index {
        let is_target = current_bone == bone_index;
        let r = decoder.decode_rotation(is_target && want_rotation);
        let t = decoder.decode_translation(is_target && want_translation);
        let s = decoder.decode_scale(is_target && want_scale);
        if is_target {
            rotation = r;
            translation = t;
            scale = s;
        }
    }

    if let Some(out) = out_rotation {
        *out = rotation.unwrap_or_else(Quat::identity);
    }
    if let Some(out) = out_translation {
        *out = translation.unwrap_or_else(Vec3::zero);
    }
    if let Some(out) = out_scale {
        *out = scale.unwrap_or(default_scale);
    }
}

// ── Cursor state ─────────────────────────────────────────────────────────────

/// Read cursors for one seek key's segment.
#[derive(Clone, Copy)]
struct KeyCursors {
    format_cursor: usize,
    range_cursor: usize,
    bit_cursor: u64,
}

struct PoseDecoder<'a, 'b> {
    context: &'b DecompressionContext<'a>,
    alpha: f64,
    default_scale: Vec3,

    track_index: u32,
    constant_cursor: usize,
    clip_range_cursor: usize,
    key0: KeyCursors,
    key1: KeyCursors,
    same_key: bool,
}

impl<'a, 'b> PoseDecoder<'a, 'b> {
    fn new(context: &'b DecompressionContext<'a>) -> Self {
        let make_cursors = |key: &crate::decompression::context::FrameKey| {
            let segment = &context.segment_headers[key.segment_index as usize];
            KeyCursors {
                format_cursor: segment.format_per_track_data_offset as usize,
                range_cursor: segment.range_data_offset as usize,
                bit_cursor: u64::from(segment.track_data_offset) * 8
                    + u64::from(key.sample_in_segment) * u64::from(segment.animated_pose_bit_size),
            }
        };

        let same_key = context.key0.segment_index == context.key1.segment_index
            && context.key0.sample_in_segment == context.key1.sample_in_segment;

        Self {
            context,
            alpha: context.interpolation_alpha,
            default_scale: if context.default_scale_is_zero {
                Vec3::zero()
            } else {
                Vec3::one()
            },
            track_index: 0,
            constant_cursor: context.header.constant_track_data_offset as usize,
            clip_range_cursor: context.header.clip_range_data_offset as usize,
            key0: make_cursors(&context.key0),
            key1: make_cursors(&context.key1),
            same_key,
        }
    }

    // ── Channels ────────────────────────────────────────────────────────

    fn decode_rotation(&mut self, want: bool) -> Option<Quat> {
        let header = &self.context.header;
        let format = header.rotation_format;
        let num_components = if format.is_drop_w() { 3 } else { 4 };

        let spec = ChannelSpec {
            num_components,
            is_variable: format.is_variable(),
            fixed_bit_size: format.fixed_sample_bit_size(),
            clip_range: self.context.has_clip_range(RangeReductionFlags::ROTATIONS),
            segment_range: self.context.has_segment_range(RangeReductionFlags::ROTATIONS),
        };

        let components = self.decode_channel(&spec, want)?;
        components.map(|(value0, value1)| {
            let q0 = rebuild_rotation(value0, format);
            let q1 = rebuild_rotation(value1, format);
            Quat::lerp(q0, q1, self.alpha)
        })
    }

    fn decode_translation(&mut self, want: bool) -> Option<Vec3> {
        let spec = ChannelSpec {
            num_components: 3,
            is_variable: self.context.header.translation_format.is_variable(),
            fixed_bit_size: self.context.header.translation_format.fixed_sample_bit_size(),
            clip_range: self.context.has_clip_range(RangeReductionFlags::TRANSLATIONS),
            segment_range: self.context.has_segment_range(RangeReductionFlags::TRANSLATIONS),
        };
        let components = self.decode_channel(&spec, want)?;
        components.map(|(value0, value1)| value0.xyz().lerp(value1.xyz(), self.alpha))
    }

    fn decode_scale(&mut self, want: bool) -> Option<Vec3> {
        if !self.context.header.has_scale {
            // The track index space does not include scale tracks.
            return None;
        }
        let spec = ChannelSpec {
            num_components: 3,
            is_variable: self.context.header.scale_format.is_variable(),
            fixed_bit_size: self.context.header.scale_format.fixed_sample_bit_size(),
            clip_range: self.context.has_clip_range(RangeReductionFlags::SCALES),
            segment_range: self.context.has_segment_range(RangeReductionFlags::SCALES),
        };
        let components = self.decode_channel(&spec, want)?;
        components.map(|(value0, value1)| value0.xyz().lerp(value1.xyz(), self.alpha))
    }

    // ── Shared decode chain ─────────────────────────────────────────────

    /// Decode (or skip) one track for both keys. The outer `Option` is
    /// `None` for default tracks and missing channels; the inner is `None`
    /// when `want` is false and the track was only skipped.
    fn decode_channel(
        &mut self,
        spec: &ChannelSpec,
        want: bool,
    ) -> Option<Option<(Vec4, Vec4)>> {
        let track_index = self.track_index;
        self.track_index += 1;

        if self.context.is_track_default(track_index) {
            return None;
        }

        if self.context.is_track_constant(track_index) {
            let value = if want {
                Some(self.read_constant_components(spec.num_components))
            } else {
                None
            };
            self.constant_cursor += 4 * spec.num_components;
            return Some(value.map(|v| (v, v)));
        }

        // Animated: each key reads through its own segment cursors.
        let value0 = self.read_animated(spec, Key::First, want);
        let value1 = if self.same_key {
            value0
        } else {
            self.read_animated(spec, Key::Second, want)
        };

        // The clip range entry is clip-wide: read once, apply to both keys.
        let result = if spec.clip_range {
            let entry_size = 8 * spec.num_components;
            let values = if want {
                let (value0, value1) = (value0.unwrap(), value1.unwrap());
                Some((
                    self.apply_clip_range(value0, spec.num_components),
                    self.apply_clip_range(value1, spec.num_components),
                ))
            } else {
                None
            };
            self.clip_range_cursor += entry_size;
            values
        } else if want {
            Some((value0.unwrap(), value1.unwrap()))
        } else {
            None
        };

        Some(result)
    }

    fn read_constant_components(&self, num_components: usize) -> Vec4 {
        let mut value = Vec4::zero();
        for component in 0..num_components {
            value.set(
                component,
                f64::from(read_f32_le(
                    self.context.payload,
                    self.constant_cursor + 4 * component,
                )),
            );
        }
        value
    }

    fn apply_clip_range(&self, value: Vec4, num_components: usize) -> Vec4 {
        let mut result = value;
        for component in 0..num_components {
            let min = f64::from(read_f32_le(
                self.context.payload,
                self.clip_range_cursor + 4 * component,
            ));
            let extent = f64::from(read_f32_le(
                self.context.payload,
                self.clip_range_cursor + 4 * (num_components + component),
            ));
            result.set(component, value.get(component) * extent + min);
        }
        result
    }

    /// Read one key's quantized value and undo segment range reduction.
    fn read_animated(&mut self, spec: &ChannelSpec, key: Key, want: bool) -> Option<Vec4> {
        let payload = self.context.payload;
        let cursors = match key {
            Key::First => &mut self.key0,
            Key::Second => &mut self.key1,
        };

        let bit_rate = if spec.is_variable {
            let rate = payload[cursors.format_cursor];
            cursors.format_cursor += 1;
            Some(rate)
        } else {
            None
        };

        // Segment range entry: num_components u8 mins then extents.
        let segment_range_offset = cursors.range_cursor;
        if spec.segment_range {
            cursors.range_cursor += 2 * spec.num_components;
        }

        let mut value = Vec4::zero();
        match bit_rate {
            Some(rate) if is_constant_bit_rate(rate) => {
                // Zero animated bits: the value is the segment minimum.
                if want {
                    for component in 0..spec.num_components {
                        let min = f64::from(
                            f32::from(payload[segment_range_offset + component]) / 255.0f32,
                        );
                        value.set(component, min);
                    }
                }
                return if want { Some(value) } else { None };
            }
            Some(rate) if is_raw_bit_rate(rate) => {
                if want {
                    for component in 0..spec.num_components {
                        let bits =
                            read_unsigned(payload, cursors.bit_cursor + 32 * component as u64, 32);
                        value.set(component, f64::from(f32::from_bits(bits)));
                    }
                }
                cursors.bit_cursor += 32 * spec.num_components as u64;
            }
            Some(rate) => {
                let num_bits = num_bits_at_bit_rate(rate);
                if want {
                    for component in 0..spec.num_components {
                        let packed = read_unsigned(
                            payload,
                            cursors.bit_cursor + u64::from(num_bits) * component as u64,
                            num_bits,
                        );
                        value.set(component, unpack_scalar_unsigned(packed, num_bits));
                    }
                }
                cursors.bit_cursor += u64::from(num_bits) * spec.num_components as u64;
            }
            None => {
                let normalized = spec.clip_range || spec.segment_range;
                let consumed = self.read_fixed_format(spec, key, want, normalized, &mut value);
                let cursors = match key {
                    Key::First => &mut self.key0,
                    Key::Second => &mut self.key1,
                };
                cursors.bit_cursor += consumed;
            }
        }

        if !want {
            return None;
        }

        if spec.segment_range {
            for component in 0..spec.num_components {
                let min =
                    f64::from(f32::from(payload[segment_range_offset + component]) / 255.0f32);
                let extent = f64::from(
                    f32::from(payload[segment_range_offset + spec.num_components + component])
                        / 255.0f32,
                );
                value.set(component, value.get(component) * extent + min);
            }
        }

        Some(value)
    }

    /// Unpack a fixed-format sample; returns the number of bits consumed.
    fn read_fixed_format(
        &self,
        spec: &ChannelSpec,
        key: Key,
        want: bool,
        normalized: bool,
        out_value: &mut Vec4,
    ) -> u64 {
        let payload = self.context.payload;
        let cursors = match key {
            Key::First => self.key0,
            Key::Second => self.key1,
        };
        let bit_cursor = cursors.bit_cursor;

        match spec.fixed_bit_size {
            128 | 96 => {
                let num_components = (spec.fixed_bit_size / 32) as usize;
                if want {
                    for component in 0..num_components {
                        let bits = read_unsigned(payload, bit_cursor + 32 * component as u64, 32);
                        out_value.set(component, f64::from(f32::from_bits(bits)));
                    }
                }
                u64::from(spec.fixed_bit_size)
            }
            48 => {
                if want {
                    for component in 0..3 {
                        let packed =
                            read_unsigned(payload, bit_cursor + 16 * component as u64, 16);
                        let value = if normalized {
                            unpack_scalar_unsigned(packed, 16)
                        } else {
                            unpack_scalar_signed(packed, 16)
                        };
                        out_value.set(component, value);
                    }
                }
                48
            }
            32 => {
                if want {
                    let fields = [(0u64, 11u32), (11, 11), (22, 10)];
                    for (component, &(field_offset, num_bits)) in fields.iter().enumerate() {
                        let packed = read_unsigned(payload, bit_cursor + field_offset, num_bits);
                        let value = if normalized {
                            unpack_scalar_unsigned(packed, num_bits)
                        } else {
                            unpack_scalar_signed(packed, num_bits)
                        };
                        out_value.set(component, value);
                    }
                }
                32
            }
            _ => unreachable!("unsupported fixed sample size: {}", spec.fixed_bit_size),
        }
    }
}

#[derive(Clone, Copy)]
enum Key {
    First,
    Second,
}

struct ChannelSpec {
    num_components: usize,
    is_variable: bool,
    fixed_bit_size: u32,
    clip_range: bool,
    segment_range: bool,
}

/// Rebuild a rotation from its reconstructed components.
#[inline]
fn rebuild_rotation(components: Vec4, format: RotationFormat) -> Quat {
    if format.is_drop_w() {
        Quat::from_positive_w(components.x, components.y, components.z).normalize()
    } else {
        Quat::from_vec4(components).normalize()
    }
}
