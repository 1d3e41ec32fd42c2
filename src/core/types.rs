//! Track formats, variable bit rates, and algorithm identifiers.
//!
//! These enums are serialized into the compressed data; their discriminant
//! values are part of the format and must not be renumbered without bumping
//! [`ALGORITHM_VERSION`](crate::core::buffer::ALGORITHM_VERSION).

use crate::core::error::{Error, Result};

// ── Rotation formats ─────────────────────────────────────────────────────────

/// How rotation samples are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum RotationFormat {
    /// Full precision quaternion, [x, y, z, w] stored as f32.
    #[default]
    Quat128 = 0,
    /// Full precision [x, y, z] as f32; w is dropped (kept non-negative).
    QuatDropW96 = 1,
    /// Quantized [x, y, z] with (16, 16, 16) bits; w is dropped.
    QuatDropW48 = 2,
    /// Quantized [x, y, z] with (11, 11, 10) bits; w is dropped.
    QuatDropW32 = 3,
    /// Quantized [x, y, z] with (N, N, N) bits per segment track; w is dropped.
    QuatDropWVariable = 4,
}

impl RotationFormat {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(RotationFormat::Quat128),
            1 => Ok(RotationFormat::QuatDropW96),
            2 => Ok(RotationFormat::QuatDropW48),
            3 => Ok(RotationFormat::QuatDropW32),
            4 => Ok(RotationFormat::QuatDropWVariable),
            _ => Err(Error::InvalidFormat(format!("unknown rotation format: {value}"))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RotationFormat::Quat128 => "Quat_128",
            RotationFormat::QuatDropW96 => "QuatDropW_96",
            RotationFormat::QuatDropW48 => "QuatDropW_48",
            RotationFormat::QuatDropW32 => "QuatDropW_32",
            RotationFormat::QuatDropWVariable => "QuatDropW_Variable",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Quat_128" => Some(RotationFormat::Quat128),
            "QuatDropW_96" => Some(RotationFormat::QuatDropW96),
            "QuatDropW_48" => Some(RotationFormat::QuatDropW48),
            "QuatDropW_32" => Some(RotationFormat::QuatDropW32),
            "QuatDropW_Variable" => Some(RotationFormat::QuatDropWVariable),
            _ => None,
        }
    }

    /// Whether samples drop the w component.
    #[inline]
    pub fn is_drop_w(self) -> bool {
        !matches!(self, RotationFormat::Quat128)
    }

    #[inline]
    pub fn is_variable(self) -> bool {
        matches!(self, RotationFormat::QuatDropWVariable)
    }

    /// Bits per sample for the fixed formats; variable tracks are sized by
    /// their bit rate instead.
    pub fn fixed_sample_bit_size(self) -> u32 {
        match self {
            RotationFormat::Quat128 => 128,
            RotationFormat::QuatDropW96 => 96,
            RotationFormat::QuatDropW48 => 48,
            RotationFormat::QuatDropW32 => 32,
            RotationFormat::QuatDropWVariable => 0,
        }
    }
}

// ── Vector formats ───────────────────────────────────────────────────────────

/// How translation and scale samples are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum VectorFormat {
    /// Full precision [x, y, z] stored as f32.
    #[default]
    Vector3_96 = 0,
    /// Quantized [x, y, z] with (16, 16, 16) bits.
    Vector3_48 = 1,
    /// Quantized [x, y, z] with (11, 11, 10) bits.
    Vector3_32 = 2,
    /// Quantized [x, y, z] with (N, N, N) bits per segment track.
    Vector3Variable = 3,
}

impl VectorFormat {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(VectorFormat::Vector3_96),
            1 => Ok(VectorFormat::Vector3_48),
            2 => Ok(VectorFormat::Vector3_32),
            3 => Ok(VectorFormat::Vector3Variable),
            _ => Err(Error::InvalidFormat(format!("unknown vector format: {value}"))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VectorFormat::Vector3_96 => "Vector3_96",
            VectorFormat::Vector3_48 => "Vector3_48",
            VectorFormat::Vector3_32 => "Vector3_32",
            VectorFormat::Vector3Variable => "Vector3_Variable",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Vector3_96" => Some(VectorFormat::Vector3_96),
            "Vector3_48" => Some(VectorFormat::Vector3_48),
            "Vector3_32" => Some(VectorFormat::Vector3_32),
            "Vector3_Variable" => Some(VectorFormat::Vector3Variable),
            _ => None,
        }
    }

    #[inline]
    pub fn is_variable(self) -> bool {
        matches!(self, VectorFormat::Vector3Variable)
    }

    pub fn fixed_sample_bit_size(self) -> u32 {
        match self {
            VectorFormat::Vector3_96 => 96,
            VectorFormat::Vector3_48 => 48,
            VectorFormat::Vector3_32 => 32,
            VectorFormat::Vector3Variable => 0,
        }
    }
}

// ── Track channels ───────────────────────────────────────────────────────────

/// The three channels of a bone transform track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    Rotation,
    Translation,
    Scale,
}

// ── Variable bit rates ───────────────────────────────────────────────────────

/// Bits per component for each bit-rate index. Rate 0 is reserved for
/// tracks that are constant within their segment; the last rate stores raw
/// f32 components.
pub const BIT_RATE_NUM_BITS: [u32; 19] = [
    0, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 32,
];

pub const INVALID_BIT_RATE: u8 = 0xFF;
pub const LOWEST_BIT_RATE: u8 = 1;
pub const HIGHEST_BIT_RATE: u8 = (BIT_RATE_NUM_BITS.len() - 1) as u8;
pub const NUM_BIT_RATES: u8 = BIT_RATE_NUM_BITS.len() as u8;

/// Bits per component at `bit_rate`.
#[inline]
pub fn num_bits_at_bit_rate(bit_rate: u8) -> u32 {
    debug_assert!(bit_rate <= HIGHEST_BIT_RATE, "invalid bit rate: {bit_rate}");
    BIT_RATE_NUM_BITS[bit_rate as usize]
}

/// The track is constant within its segment; its value lives in the segment
/// range data, not the animated stream.
#[inline]
pub const fn is_constant_bit_rate(bit_rate: u8) -> bool {
    bit_rate == 0
}

/// The track stores raw f32 components.
#[inline]
pub const fn is_raw_bit_rate(bit_rate: u8) -> bool {
    bit_rate == HIGHEST_BIT_RATE
}

/// Per-bone bit rates for one segment, one entry per channel.
/// [`INVALID_BIT_RATE`] marks channels with no animated data (constant,
/// default, or fixed-format tracks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoneBitRate {
    pub rotation: u8,
    pub translation: u8,
    pub scale: u8,
}

impl Default for BoneBitRate {
    fn default() -> Self {
        Self {
            rotation: INVALID_BIT_RATE,
            translation: INVALID_BIT_RATE,
            scale: INVALID_BIT_RATE,
        }
    }
}

// ── Algorithm identifiers ────────────────────────────────────────────────────

/// Compression algorithm identifier stored in the sealed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AlgorithmType {
    /// Every track sampled at the clip rate; the only algorithm.
    #[default]
    UniformlySampled = 0,
}

impl AlgorithmType {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(AlgorithmType::UniformlySampled),
            _ => Err(Error::InvalidFormat(format!("unknown algorithm type: {value}"))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AlgorithmType::UniformlySampled => "UniformlySampled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_rate_table_shape() {
        assert_eq!(NUM_BIT_RATES, 19);
        assert_eq!(num_bits_at_bit_rate(0), 0);
        assert_eq!(num_bits_at_bit_rate(LOWEST_BIT_RATE), 3);
        assert_eq!(num_bits_at_bit_rate(HIGHEST_BIT_RATE), 32);
        assert!(is_constant_bit_rate(0));
        assert!(is_raw_bit_rate(HIGHEST_BIT_RATE));
        // Strictly increasing between the reserved endpoints.
        for rate in 1..HIGHEST_BIT_RATE {
            assert!(num_bits_at_bit_rate(rate) < num_bits_at_bit_rate(rate + 1));
        }
    }

    #[test]
    fn format_discriminants_roundtrip() {
        for value in 0..=4u8 {
            let format = RotationFormat::from_u8(value).unwrap();
            assert_eq!(format as u8, value);
            assert_eq!(RotationFormat::from_name(format.name()), Some(format));
        }
        for value in 0..=3u8 {
            let format = VectorFormat::from_u8(value).unwrap();
            assert_eq!(format as u8, value);
            assert_eq!(VectorFormat::from_name(format.name()), Some(format));
        }
        assert!(RotationFormat::from_u8(5).is_err());
        assert!(VectorFormat::from_u8(4).is_err());
    }
}
