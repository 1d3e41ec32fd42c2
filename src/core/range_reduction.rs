//! Range-reduction flags and serialized range sizes.

use crate::core::types::RotationFormat;
use core::fmt;
use core::ops::{BitAnd, BitOr};

/// Bits per component of a segment range entry (min and extent each).
pub const SEGMENT_RANGE_BITS_PER_COMPONENT: u32 = 8;
/// Bytes per component of a segment range entry.
pub const SEGMENT_RANGE_BYTES_PER_COMPONENT: u32 = 1;
/// Serialized clip range entry for a 3-vector channel: 3 f32 min + 3 f32 extent.
pub const CLIP_RANGE_VECTOR3_SIZE: u32 = 4 * 6;
/// Serialized clip range entry for a full quaternion channel: 4 + 4 f32.
pub const CLIP_RANGE_QUAT_SIZE: u32 = 4 * 8;

/// Which channels have range reduction applied, as a bit field. The byte
/// value is serialized in the clip header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangeReductionFlags(u8);

impl RangeReductionFlags {
    pub const NONE: Self = Self(0x00);
    pub const ROTATIONS: Self = Self(0x01);
    pub const TRANSLATIONS: Self = Self(0x02);
    pub const SCALES: Self = Self(0x04);
    pub const ALL_TRACKS: Self = Self(0x07);

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x07)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for RangeReductionFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for RangeReductionFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for RangeReductionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        let mut first = true;
        for (flag, label) in [
            (Self::ROTATIONS, "Rotations"),
            (Self::TRANSLATIONS, "Translations"),
            (Self::SCALES, "Scales"),
        ] {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(label)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Serialized clip range entry size for an animated rotation channel.
#[inline]
pub fn clip_range_rotation_size(format: RotationFormat) -> u32 {
    if format.is_drop_w() {
        CLIP_RANGE_VECTOR3_SIZE
    } else {
        CLIP_RANGE_QUAT_SIZE
    }
}

/// Serialized segment range entry size for an animated rotation channel.
#[inline]
pub fn segment_range_rotation_size(format: RotationFormat) -> u32 {
    let num_components = if format.is_drop_w() { 6 } else { 8 };
    SEGMENT_RANGE_BYTES_PER_COMPONENT * num_components
}

/// Serialized segment range entry size for an animated vector channel.
#[inline]
pub const fn segment_range_vector_size() -> u32 {
    SEGMENT_RANGE_BYTES_PER_COMPONENT * 6
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_algebra() {
        let flags = RangeReductionFlags::ROTATIONS | RangeReductionFlags::SCALES;
        assert!(flags.contains(RangeReductionFlags::ROTATIONS));
        assert!(!flags.contains(RangeReductionFlags::TRANSLATIONS));
        assert_eq!(RangeReductionFlags::from_bits(flags.bits()), flags);
        assert_eq!(flags.to_string(), "Rotations | Scales");
        assert_eq!(RangeReductionFlags::ALL_TRACKS.bits(), 0x07);
    }

    #[test]
    fn range_sizes() {
        assert_eq!(clip_range_rotation_size(RotationFormat::QuatDropWVariable), 24);
        assert_eq!(clip_range_rotation_size(RotationFormat::Quat128), 32);
        assert_eq!(segment_range_rotation_size(RotationFormat::QuatDropW48), 6);
        assert_eq!(segment_range_rotation_size(RotationFormat::Quat128), 8);
        assert_eq!(segment_range_vector_size(), 6);
    }
}
