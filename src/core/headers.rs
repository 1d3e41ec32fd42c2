//! Serialized clip and segment headers.
//!
//! Both headers live in the payload that follows the 16-byte sealed header;
//! every offset they store is relative to the clip header base (payload
//! byte 0). Absent optional blocks store [`INVALID_OFFSET`]. All fields are
//! little-endian.

use crate::core::error::{Error, Result};
use crate::core::range_reduction::RangeReductionFlags;
use crate::core::types::{RotationFormat, VectorFormat};

/// Sentinel for an absent block offset.
pub const INVALID_OFFSET: u32 = u32::MAX;

/// Serialized size of [`ClipHeader`].
pub const CLIP_HEADER_SIZE: u32 = 40;

/// Serialized size of [`SegmentHeader`].
pub const SEGMENT_HEADER_SIZE: u32 = 20;

// ── Little-endian field helpers ──────────────────────────────────────────────

#[inline]
pub(crate) fn read_u16_le(buffer: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(buffer[offset..offset + 2].try_into().unwrap())
}

#[inline]
pub(crate) fn read_u32_le(buffer: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(buffer[offset..offset + 4].try_into().unwrap())
}

#[inline]
pub(crate) fn read_f32_le(buffer: &[u8], offset: usize) -> f32 {
    f32::from_bits(read_u32_le(buffer, offset))
}

#[inline]
pub(crate) fn write_u16_le(buffer: &mut [u8], offset: usize, value: u16) {
    buffer[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn write_u32_le(buffer: &mut [u8], offset: usize, value: u32) {
    buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn write_f32_le(buffer: &mut [u8], offset: usize, value: f32) {
    write_u32_le(buffer, offset, value.to_bits());
}

// ── Clip header ──────────────────────────────────────────────────────────────

/// The self-describing clip header.
///
/// Layout (offsets within the payload):
///
/// ```text
///  0  num_bones (u16)                2  num_segments (u16)
///  4  rotation_format (u8)           5  translation_format (u8)
///  6  scale_format (u8)              7  clip_range_reduction (u8)
///  8  segment_range_reduction (u8)   9  has_scale (u8)
/// 10  reserved (2 bytes, zero)
/// 12  num_samples (u32)             16  sample_rate (u32, Hz)
/// 20  segment_headers_offset        24  default_tracks_bitset_offset
/// 28  constant_tracks_bitset_offset 32  constant_track_data_offset
/// 36  clip_range_data_offset
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipHeader {
    pub num_bones: u16,
    pub num_segments: u16,
    pub rotation_format: RotationFormat,
    pub translation_format: VectorFormat,
    pub scale_format: VectorFormat,
    pub clip_range_reduction: RangeReductionFlags,
    pub segment_range_reduction: RangeReductionFlags,
    pub has_scale: bool,
    pub num_samples: u32,
    pub sample_rate: u32,
    pub segment_headers_offset: u32,
    pub default_tracks_bitset_offset: u32,
    pub constant_tracks_bitset_offset: u32,
    pub constant_track_data_offset: u32,
    pub clip_range_data_offset: u32,
}

impl ClipHeader {
    pub fn write_to(&self, payload: &mut [u8]) {
        write_u16_le(payload, 0, self.num_bones);
        write_u16_le(payload, 2, self.num_segments);
        payload[4] = self.rotation_format as u8;
        payload[5] = self.translation_format as u8;
        payload[6] = self.scale_format as u8;
        payload[7] = self.clip_range_reduction.bits();
        payload[8] = self.segment_range_reduction.bits();
        payload[9] = u8::from(self.has_scale);
        payload[10] = 0;
        payload[11] = 0;
        write_u32_le(payload, 12, self.num_samples);
        write_u32_le(payload, 16, self.sample_rate);
        write_u32_le(payload, 20, self.segment_headers_offset);
        write_u32_le(payload, 24, self.default_tracks_bitset_offset);
        write_u32_le(payload, 28, self.constant_tracks_bitset_offset);
        write_u32_le(payload, 32, self.constant_track_data_offset);
        write_u32_le(payload, 36, self.clip_range_data_offset);
    }

    pub fn read_from(payload: &[u8]) -> Result<Self> {
        if payload.len() < CLIP_HEADER_SIZE as usize {
            return Err(Error::InvalidFormat(format!(
                "payload too small for a clip header: {} bytes",
                payload.len()
            )));
        }

        Ok(Self {
            num_bones: read_u16_le(payload, 0),
            num_segments: read_u16_le(payload, 2),
            rotation_format: RotationFormat::from_u8(payload[4])?,
            translation_format: VectorFormat::from_u8(payload[5])?,
            scale_format: VectorFormat::from_u8(payload[6])?,
            clip_range_reduction: RangeReductionFlags::from_bits(payload[7]),
            segment_range_reduction: RangeReductionFlags::from_bits(payload[8]),
            has_scale: payload[9] != 0,
            num_samples: read_u32_le(payload, 12),
            sample_rate: read_u32_le(payload, 16),
            segment_headers_offset: read_u32_le(payload, 20),
            default_tracks_bitset_offset: read_u32_le(payload, 24),
            constant_tracks_bitset_offset: read_u32_le(payload, 28),
            constant_track_data_offset: read_u32_le(payload, 32),
            clip_range_data_offset: read_u32_le(payload, 36),
        })
    }

    /// Tracks per bone in the bitsets: rotation + translation, plus scale
    /// when the clip carries scale.
    #[inline]
    pub fn num_tracks_per_bone(&self) -> u32 {
        if self.has_scale {
            3
        } else {
            2
        }
    }
}

// ── Segment header ───────────────────────────────────────────────────────────

/// Per-segment directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Samples in this segment.
    pub num_samples: u32,
    /// Bits occupied by one frame of animated data (all animated tracks).
    pub animated_pose_bit_size: u32,
    /// Bit-rate byte block, or [`INVALID_OFFSET`].
    pub format_per_track_data_offset: u32,
    /// Segment range block, or [`INVALID_OFFSET`].
    pub range_data_offset: u32,
    /// Animated (bit-packed) track data, or [`INVALID_OFFSET`].
    pub track_data_offset: u32,
}

impl SegmentHeader {
    pub fn write_to(&self, payload: &mut [u8], offset: usize) {
        write_u32_le(payload, offset, self.num_samples);
        write_u32_le(payload, offset + 4, self.animated_pose_bit_size);
        write_u32_le(payload, offset + 8, self.format_per_track_data_offset);
        write_u32_le(payload, offset + 12, self.range_data_offset);
        write_u32_le(payload, offset + 16, self.track_data_offset);
    }

    pub fn read_from(payload: &[u8], offset: usize) -> Result<Self> {
        if payload.len() < offset + SEGMENT_HEADER_SIZE as usize {
            return Err(Error::InvalidFormat(
                "payload too small for a segment header".to_owned(),
            ));
        }

        Ok(Self {
            num_samples: read_u32_le(payload, offset),
            animated_pose_bit_size: read_u32_le(payload, offset + 4),
            format_per_track_data_offset: read_u32_le(payload, offset + 8),
            range_data_offset: read_u32_le(payload, offset + 12),
            track_data_offset: read_u32_le(payload, offset + 16),
        })
    }
}

/// Round `offset` up to the next multiple of `alignment` (a power of two).
#[inline]
pub const fn align_to(offset: u32, alignment: u32) -> u32 {
    (offset + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_header_roundtrip() {
        let header = ClipHeader {
            num_bones: 42,
            num_segments: 3,
            rotation_format: RotationFormat::QuatDropWVariable,
            translation_format: VectorFormat::Vector3Variable,
            scale_format: VectorFormat::Vector3Variable,
            clip_range_reduction: RangeReductionFlags::ALL_TRACKS,
            segment_range_reduction: RangeReductionFlags::ROTATIONS,
            has_scale: true,
            num_samples: 512,
            sample_rate: 30,
            segment_headers_offset: CLIP_HEADER_SIZE,
            default_tracks_bitset_offset: 100,
            constant_tracks_bitset_offset: 116,
            constant_track_data_offset: INVALID_OFFSET,
            clip_range_data_offset: 132,
        };

        let mut payload = vec![0u8; CLIP_HEADER_SIZE as usize];
        header.write_to(&mut payload);
        assert_eq!(ClipHeader::read_from(&payload).unwrap(), header);
    }

    #[test]
    fn segment_header_roundtrip() {
        let header = SegmentHeader {
            num_samples: 16,
            animated_pose_bit_size: 771,
            format_per_track_data_offset: 200,
            range_data_offset: 220,
            track_data_offset: 256,
        };

        let mut payload = vec![0u8; 64];
        header.write_to(&mut payload, 20);
        assert_eq!(SegmentHeader::read_from(&payload, 20).unwrap(), header);
    }

    #[test]
    fn alignment_rounds_up() {
        assert_eq!(align_to(0, 4), 0);
        assert_eq!(align_to(1, 4), 4);
        assert_eq!(align_to(4, 4), 4);
        assert_eq!(align_to(21, 2), 22);
        assert_eq!(align_to(17, 16), 32);
    }
}
