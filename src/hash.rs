//! Thin wrapper around the `crc32fast` crate providing the CRC32 used to
//! seal compressed buffers.
//!
//! The seal covers every byte after the leading size+hash field, so a
//! corrupted or truncated buffer is rejected before the decoder touches it.

pub use crc32fast::Hasher as Crc32State;

/// One-shot CRC32 of `data`.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_incremental_hashing() {
        let data = b"uniformly sampled";
        let mut state = Crc32State::new();
        state.update(&data[..5]);
        state.update(&data[5..]);
        assert_eq!(state.finalize(), crc32(data));
    }

    #[test]
    fn detects_single_bit_flips() {
        let data = [0u8; 64];
        let mut tampered = data;
        tampered[17] ^= 0x04;
        assert_ne!(crc32(&data), crc32(&tampered));
    }
}
