//! Scalar and vector quantization codecs.
//!
//! Scalars quantize a [0, 1] value into `num_bits` as
//! `round(value * (2^num_bits - 1))`; the inverse divides by the same
//! constant. Signed variants remap [-1, 1] through [0, 1]. Vector codecs
//! concatenate per-component fields most-significant-bit-first into a bit
//! stream (see [`crate::core::bit_buffer`]), which is what the animated
//! track block stores. Full-precision components store raw f32 bits in the
//! same bit stream.
//!
//! All arithmetic is f64 so that the widest field (32 bits) round-trips
//! exactly.

use crate::core::bit_buffer::{read_unsigned, write_unsigned};
use crate::math::Vec4;

// ── Scalar codecs ────────────────────────────────────────────────────────────

/// Quantize a [0, 1] scalar into `num_bits` (1..=32).
#[inline]
pub fn pack_scalar_unsigned(value: f64, num_bits: u32) -> u32 {
    debug_assert!(num_bits >= 1 && num_bits <= 32);
    let max_value = ((1u64 << num_bits) - 1) as f64;
    (value.clamp(0.0, 1.0) * max_value).round() as u32
}

/// Inverse of [`pack_scalar_unsigned`].
#[inline]
pub fn unpack_scalar_unsigned(value: u32, num_bits: u32) -> f64 {
    debug_assert!(num_bits >= 1 && num_bits <= 32);
    let max_value = ((1u64 << num_bits) - 1) as f64;
    f64::from(value) / max_value
}

/// Quantize a [-1, 1] scalar into `num_bits`.
#[inline]
pub fn pack_scalar_signed(value: f64, num_bits: u32) -> u32 {
    pack_scalar_unsigned(value * 0.5 + 0.5, num_bits)
}

/// Inverse of [`pack_scalar_signed`].
#[inline]
pub fn unpack_scalar_signed(value: u32, num_bits: u32) -> f64 {
    unpack_scalar_unsigned(value, num_bits) * 2.0 - 1.0
}

/// Quantize-dequantize round trip without touching a buffer. The lossy
/// pose sampler uses this to predict exactly what a decoder will read.
#[inline]
pub fn quantize_unsigned(value: f64, num_bits: u32) -> f64 {
    unpack_scalar_unsigned(pack_scalar_unsigned(value, num_bits), num_bits)
}

// ── Vector codecs over the bit stream ────────────────────────────────────────

/// Pack the x/y/z components of `v`, each normalized to [0, 1], into three
/// consecutive `num_bits` fields at `bit_offset`.
#[inline]
pub fn pack_vector3_uxx(v: Vec4, num_bits: u32, buffer: &mut [u8], bit_offset: u64) {
    write_unsigned(buffer, bit_offset, pack_scalar_unsigned(v.x, num_bits), num_bits);
    write_unsigned(
        buffer,
        bit_offset + u64::from(num_bits),
        pack_scalar_unsigned(v.y, num_bits),
        num_bits,
    );
    write_unsigned(
        buffer,
        bit_offset + 2 * u64::from(num_bits),
        pack_scalar_unsigned(v.z, num_bits),
        num_bits,
    );
}

/// Inverse of [`pack_vector3_uxx`].
#[inline]
pub fn unpack_vector3_uxx(buffer: &[u8], bit_offset: u64, num_bits: u32) -> Vec4 {
    let x = unpack_scalar_unsigned(read_unsigned(buffer, bit_offset, num_bits), num_bits);
    let y = unpack_scalar_unsigned(
        read_unsigned(buffer, bit_offset + u64::from(num_bits), num_bits),
        num_bits,
    );
    let z = unpack_scalar_unsigned(
        read_unsigned(buffer, bit_offset + 2 * u64::from(num_bits), num_bits),
        num_bits,
    );
    Vec4::new(x, y, z, 0.0)
}

/// Pack x/y/z in [-1, 1] into three consecutive signed `num_bits` fields.
#[inline]
pub fn pack_vector3_sxx(v: Vec4, num_bits: u32, buffer: &mut [u8], bit_offset: u64) {
    write_unsigned(buffer, bit_offset, pack_scalar_signed(v.x, num_bits), num_bits);
    write_unsigned(
        buffer,
        bit_offset + u64::from(num_bits),
        pack_scalar_signed(v.y, num_bits),
        num_bits,
    );
    write_unsigned(
        buffer,
        bit_offset + 2 * u64::from(num_bits),
        pack_scalar_signed(v.z, num_bits),
        num_bits,
    );
}

/// Inverse of [`pack_vector3_sxx`].
#[inline]
pub fn unpack_vector3_sxx(buffer: &[u8], bit_offset: u64, num_bits: u32) -> Vec4 {
    let x = unpack_scalar_signed(read_unsigned(buffer, bit_offset, num_bits), num_bits);
    let y = unpack_scalar_signed(
        read_unsigned(buffer, bit_offset + u64::from(num_bits), num_bits),
        num_bits,
    );
    let z = unpack_scalar_signed(
        read_unsigned(buffer, bit_offset + 2 * u64::from(num_bits), num_bits),
        num_bits,
    );
    Vec4::new(x, y, z, 0.0)
}

/// Pack x/y/z as (11, 11, 10) bit fields: 32 bits total.
#[inline]
pub fn pack_vector3_32(v: Vec4, is_unsigned: bool, buffer: &mut [u8], bit_offset: u64) {
    let (x, y, z) = if is_unsigned {
        (
            pack_scalar_unsigned(v.x, 11),
            pack_scalar_unsigned(v.y, 11),
            pack_scalar_unsigned(v.z, 10),
        )
    } else {
        (
            pack_scalar_signed(v.x, 11),
            pack_scalar_signed(v.y, 11),
            pack_scalar_signed(v.z, 10),
        )
    };
    write_unsigned(buffer, bit_offset, x, 11);
    write_unsigned(buffer, bit_offset + 11, y, 11);
    write_unsigned(buffer, bit_offset + 22, z, 10);
}

/// Inverse of [`pack_vector3_32`].
#[inline]
pub fn unpack_vector3_32(buffer: &[u8], bit_offset: u64, is_unsigned: bool) -> Vec4 {
    let x = read_unsigned(buffer, bit_offset, 11);
    let y = read_unsigned(buffer, bit_offset + 11, 11);
    let z = read_unsigned(buffer, bit_offset + 22, 10);
    if is_unsigned {
        Vec4::new(
            unpack_scalar_unsigned(x, 11),
            unpack_scalar_unsigned(y, 11),
            unpack_scalar_unsigned(z, 10),
            0.0,
        )
    } else {
        Vec4::new(
            unpack_scalar_signed(x, 11),
            unpack_scalar_signed(y, 11),
            unpack_scalar_signed(z, 10),
            0.0,
        )
    }
}

/// Pack x/y/z as three full-precision f32 components: 96 bits.
#[inline]
pub fn pack_vector3_96(v: Vec4, buffer: &mut [u8], bit_offset: u64) {
    write_unsigned(buffer, bit_offset, (v.x as f32).to_bits(), 32);
    write_unsigned(buffer, bit_offset + 32, (v.y as f32).to_bits(), 32);
    write_unsigned(buffer, bit_offset + 64, (v.z as f32).to_bits(), 32);
}

/// Inverse of [`pack_vector3_96`].
#[inline]
pub fn unpack_vector3_96(buffer: &[u8], bit_offset: u64) -> Vec4 {
    let x = f32::from_bits(read_unsigned(buffer, bit_offset, 32));
    let y = f32::from_bits(read_unsigned(buffer, bit_offset + 32, 32));
    let z = f32::from_bits(read_unsigned(buffer, bit_offset + 64, 32));
    Vec4::new(f64::from(x), f64::from(y), f64::from(z), 0.0)
}

/// Pack x/y/z/w as four full-precision f32 components: 128 bits.
#[inline]
pub fn pack_vector4_128(v: Vec4, buffer: &mut [u8], bit_offset: u64) {
    pack_vector3_96(v, buffer, bit_offset);
    write_unsigned(buffer, bit_offset + 96, (v.w as f32).to_bits(), 32);
}

/// Inverse of [`pack_vector4_128`].
#[inline]
pub fn unpack_vector4_128(buffer: &[u8], bit_offset: u64) -> Vec4 {
    let mut v = unpack_vector3_96(buffer, bit_offset);
    v.w = f64::from(f32::from_bits(read_unsigned(buffer, bit_offset + 96, 32)));
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn scalar_endpoints() {
        for num_bits in 1..=19u32 {
            let max_value = (1u32 << num_bits) - 1;
            assert_eq!(pack_scalar_unsigned(0.0, num_bits), 0);
            assert_eq!(pack_scalar_unsigned(1.0, num_bits), max_value);
            assert_eq!(unpack_scalar_unsigned(0, num_bits), 0.0);
            assert_eq!(unpack_scalar_unsigned(max_value, num_bits), 1.0);

            assert_eq!(pack_scalar_signed(-1.0, num_bits), 0);
            assert_eq!(pack_scalar_signed(1.0, num_bits), max_value);
        }
    }

    #[test]
    fn scalar_roundtrip_exhaustive_small_widths() {
        for num_bits in 1..=16u32 {
            let max_value = (1u32 << num_bits) - 1;
            for value in 0..=max_value {
                let unpacked = unpack_scalar_unsigned(value, num_bits);
                assert!((0.0..=1.0).contains(&unpacked));
                assert_eq!(pack_scalar_unsigned(unpacked, num_bits), value);

                let signed = unpack_scalar_signed(value, num_bits);
                assert!((-1.0..=1.0).contains(&signed));
                assert_eq!(pack_scalar_signed(signed, num_bits), value);
            }
        }
    }

    #[test]
    fn scalar_roundtrip_sampled_wide_widths() {
        let mut rng = ChaCha8Rng::seed_from_u64(0xACE5);
        for num_bits in [17u32, 18, 19, 32] {
            let max_value = ((1u64 << num_bits) - 1) as u32;
            for _ in 0..10_000 {
                let value = rng.gen_range(0..=max_value);
                assert_eq!(pack_scalar_unsigned(unpack_scalar_unsigned(value, num_bits), num_bits), value);
            }
            // Endpoints always.
            assert_eq!(pack_scalar_unsigned(unpack_scalar_unsigned(0, num_bits), num_bits), 0);
            assert_eq!(
                pack_scalar_unsigned(unpack_scalar_unsigned(max_value, num_bits), num_bits),
                max_value
            );
        }
    }

    #[test]
    fn scalar_quantization_error_is_bounded() {
        let mut rng = ChaCha8Rng::seed_from_u64(0xBEE5);
        for num_bits in 1..=19u32 {
            let max_value = ((1u32 << num_bits) - 1) as f64;
            for _ in 0..1000 {
                let value: f64 = rng.gen();
                let error = (quantize_unsigned(value, num_bits) - value).abs();
                assert!(error <= 1.0 / max_value, "error {error} at {num_bits} bits");
            }
        }
    }

    #[test]
    fn vector3_uxx_roundtrip_at_odd_offsets() {
        let v = Vec4::new(0.25, 0.5, 0.875, 0.0);
        for num_bits in [3u32, 8, 11, 16, 19] {
            for offset in [0u64, 1, 7, 13, 33] {
                let mut buffer = [0u8; 32];
                pack_vector3_uxx(v, num_bits, &mut buffer, offset);
                let out = unpack_vector3_uxx(&buffer, offset, num_bits);
                let tolerance = 1.0 / ((1u32 << num_bits) - 1) as f64;
                assert!((out.x - v.x).abs() <= tolerance);
                assert!((out.y - v.y).abs() <= tolerance);
                assert!((out.z - v.z).abs() <= tolerance);
            }
        }
    }

    #[test]
    fn vector3_32_field_split() {
        let v = Vec4::new(0.0, 1.0, 0.5, 0.0);
        let mut buffer = [0u8; 8];
        pack_vector3_32(v, true, &mut buffer, 0);
        let out = unpack_vector3_32(&buffer, 0, true);
        assert_eq!(out.x, 0.0);
        assert_eq!(out.y, 1.0);
        assert!((out.z - 0.5).abs() <= 1.0 / 1023.0);
    }

    #[test]
    fn vector_full_precision_is_f32_exact() {
        let v = Vec4::new(6123.123812, 19237.01293127, 0.913912387, 0.1816253);
        let mut buffer = [0u8; 20];
        pack_vector4_128(v, &mut buffer, 3);
        let out = unpack_vector4_128(&buffer, 3);
        assert_eq!(out.x, f64::from(v.x as f32));
        assert_eq!(out.y, f64::from(v.y as f32));
        assert_eq!(out.z, f64::from(v.z as f32));
        assert_eq!(out.w, f64::from(v.w as f32));
    }
}
