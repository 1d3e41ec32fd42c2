//! Bit-granular buffer primitives.
//!
//! All offsets are global bit offsets with most-significant-bit-first
//! ordering: bit 7 of byte 0 is global bit 0. [`memcpy_bits`] is the
//! foundation; the fixed-width read/write helpers are built on the same
//! addressing scheme and preserve the surrounding bits of partially
//! written bytes.

/// Copy `num_bits` bits from `src` starting at `src_bit_offset` into `dst`
/// starting at `dst_bit_offset`. Bits outside the destination window are
/// preserved.
pub fn memcpy_bits(
    dst: &mut [u8],
    mut dst_bit_offset: u64,
    src: &[u8],
    mut src_bit_offset: u64,
    mut num_bits_to_copy: u64,
) {
    while num_bits_to_copy > 0 {
        let src_byte_offset = (src_bit_offset / 8) as usize;
        let src_byte_bit_offset = (src_bit_offset % 8) as u32;
        let dst_byte_offset = (dst_bit_offset / 8) as usize;
        let dst_byte_bit_offset = (dst_bit_offset % 8) as u32;

        // Copy only as many bits as fit in both the current source byte and
        // the current destination byte.
        let num_bits_src_remain = 8 - src_byte_bit_offset;
        let num_bits_dst_remain = 8 - dst_byte_bit_offset;
        let num_bits_copied = num_bits_src_remain
            .min(num_bits_dst_remain)
            .min(num_bits_to_copy as u32);

        let dst_byte_mask: u8 =
            !(0xFFu8 >> dst_byte_bit_offset) | !(0xFFu8 << (8 - num_bits_copied - dst_byte_bit_offset));

        let src_shift = 8 - src_byte_bit_offset - num_bits_copied;
        let src_byte_mask: u8 = 0xFF >> (8 - num_bits_copied);
        let insert_shift = 8 - num_bits_copied - dst_byte_bit_offset;

        let partial_dst = dst[dst_byte_offset] & dst_byte_mask;
        let partial_src = (src[src_byte_offset] >> src_shift) & src_byte_mask;
        dst[dst_byte_offset] = partial_dst | (partial_src << insert_shift);

        num_bits_to_copy -= u64::from(num_bits_copied);
        dst_bit_offset += u64::from(num_bits_copied);
        src_bit_offset += u64::from(num_bits_copied);
    }
}

/// Read an unsigned integer of `num_bits` bits (1..=32) at `bit_offset`.
#[inline]
pub fn read_unsigned(buffer: &[u8], mut bit_offset: u64, num_bits: u32) -> u32 {
    debug_assert!(num_bits >= 1 && num_bits <= 32, "invalid field width: {num_bits}");

    let mut value: u64 = 0;
    let mut bits_remaining = num_bits;
    while bits_remaining > 0 {
        let byte_offset = (bit_offset / 8) as usize;
        let bit_in_byte = (bit_offset % 8) as u32;
        let take = (8 - bit_in_byte).min(bits_remaining);

        let shift = 8 - bit_in_byte - take;
        let mask: u8 = 0xFF >> (8 - take);
        let bits = (buffer[byte_offset] >> shift) & mask;

        value = (value << take) | u64::from(bits);
        bits_remaining -= take;
        bit_offset += u64::from(take);
    }

    value as u32
}

/// Write the low `num_bits` bits (1..=32) of `value` at `bit_offset`,
/// preserving surrounding bits.
#[inline]
pub fn write_unsigned(buffer: &mut [u8], mut bit_offset: u64, value: u32, num_bits: u32) {
    debug_assert!(num_bits >= 1 && num_bits <= 32, "invalid field width: {num_bits}");
    debug_assert!(
        num_bits == 32 || value < (1u32 << num_bits),
        "value {value} does not fit in {num_bits} bits"
    );

    let mut bits_remaining = num_bits;
    while bits_remaining > 0 {
        let byte_offset = (bit_offset / 8) as usize;
        let bit_in_byte = (bit_offset % 8) as u32;
        let take = (8 - bit_in_byte).min(bits_remaining);

        // The `take` bits to store are the current top bits of the field.
        let field_shift = bits_remaining - take;
        let bits = ((value >> field_shift) as u8) & (0xFF >> (8 - take));

        let insert_shift = 8 - bit_in_byte - take;
        let keep_mask: u8 = !((0xFF >> (8 - take)) << insert_shift);
        buffer[byte_offset] = (buffer[byte_offset] & keep_mask) | (bits << insert_shift);

        bits_remaining -= take;
        bit_offset += u64::from(take);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn read_write_roundtrip_at_odd_offsets() {
        let mut buffer = [0u8; 16];
        for num_bits in 1..=32u32 {
            for offset in [0u64, 1, 5, 7, 8, 13, 31, 32, 33, 63] {
                let value = if num_bits == 32 {
                    0xDEAD_BEEF
                } else {
                    0xDEAD_BEEF & ((1u32 << num_bits) - 1)
                };
                write_unsigned(&mut buffer, offset, value, num_bits);
                assert_eq!(read_unsigned(&buffer, offset, num_bits), value);
            }
        }
    }

    #[test]
    fn write_preserves_surrounding_bits() {
        let mut buffer = [0xFFu8; 8];
        write_unsigned(&mut buffer, 11, 0, 5);
        // Bits 11..16 cleared, everything else untouched.
        assert_eq!(buffer[0], 0xFF);
        assert_eq!(buffer[1], 0b1110_0000);
        assert_eq!(buffer[2], 0xFF);
    }

    #[test]
    fn msb_first_ordering() {
        let mut buffer = [0u8; 4];
        write_unsigned(&mut buffer, 0, 1, 1);
        assert_eq!(buffer[0], 0b1000_0000);

        let mut buffer = [0u8; 4];
        write_unsigned(&mut buffer, 7, 1, 1);
        assert_eq!(buffer[0], 0b0000_0001);
    }

    #[test]
    fn memcpy_bits_copies_across_byte_boundaries() {
        let src = [0b1010_1010u8, 0b1100_1100];
        let mut dst = [0u8; 4];
        memcpy_bits(&mut dst, 3, &src, 1, 12);
        // Source bits 1..13: 010101011001 inserted at destination bit 3.
        assert_eq!(read_unsigned(&dst, 3, 12), 0b0101_0101_1001);
    }

    /// Randomized copy-then-copy-back identity: surrounding bits survive and
    /// the copied bits reproduce the source.
    #[test]
    fn memcpy_bits_randomized_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x61C1);

        for _ in 0..2000 {
            let mut src = [0u8; 24];
            let mut dst = [0u8; 24];
            rng.fill(&mut src[..]);
            rng.fill(&mut dst[..]);
            let dst_orig = dst;

            let num_bits = rng.gen_range(1..=64u64);
            let src_offset = rng.gen_range(0..(24 * 8 - num_bits));
            let dst_offset = rng.gen_range(0..(24 * 8 - num_bits));

            memcpy_bits(&mut dst, dst_offset, &src, src_offset, num_bits);

            // The copied window matches the source window.
            for bit in 0..num_bits {
                let src_bit = read_unsigned(&src, src_offset + bit, 1);
                let dst_bit = read_unsigned(&dst, dst_offset + bit, 1);
                assert_eq!(src_bit, dst_bit, "bit {bit} of {num_bits} differs");
            }

            // Everything outside the window is untouched.
            for bit in 0..(24 * 8) as u64 {
                if bit >= dst_offset && bit < dst_offset + num_bits {
                    continue;
                }
                assert_eq!(
                    read_unsigned(&dst, bit, 1),
                    read_unsigned(&dst_orig, bit, 1),
                    "surrounding bit {bit} was clobbered"
                );
            }

            // Copying back restores the original source window.
            let mut src_back = src;
            memcpy_bits(&mut src_back, src_offset, &dst, dst_offset, num_bits);
            assert_eq!(src_back, src);
        }
    }
}
