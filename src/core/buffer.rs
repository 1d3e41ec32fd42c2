//! The sealed compressed-clip buffer.
//!
//! A [`CompressedClip`] is a single 16-byte-aligned allocation, sized
//! exactly, whose leading 16 bytes form the sealed header:
//!
//! ```text
//! byte  0..4   total size in bytes (u32, includes this header)
//! byte  4..8   CRC32 over bytes 8..end
//! byte  8..12  tag 0xAC10AC10
//! byte 12..14  algorithm version (u16)
//! byte 14      algorithm id (u8)
//! byte 15      reserved, zero
//! ```
//!
//! Once sealed the buffer is immutable and may be shared freely across
//! threads; decompression contexts only read it.

use crate::core::error::{Error, Result};
use crate::core::types::AlgorithmType;
use crate::hash::crc32;

/// Serialization tag identifying a compressed clip buffer.
pub const COMPRESSED_CLIP_TAG: u32 = 0xAC10_AC10;

/// Bumped whenever the serialized layout changes.
pub const ALGORITHM_VERSION: u16 = 3;

/// Size of the sealed header preceding the clip header.
pub const SEALED_HEADER_SIZE: usize = 16;

/// Required alignment of the whole buffer.
pub const BUFFER_ALIGNMENT: usize = 16;

#[repr(C, align(16))]
#[derive(Clone, Copy)]
struct AlignedChunk([u8; BUFFER_ALIGNMENT]);

/// An owned, aligned, sealed compressed clip.
pub struct CompressedClip {
    chunks: Vec<AlignedChunk>,
    len: usize,
}

impl CompressedClip {
    /// Allocate a zeroed buffer of exactly `size` bytes for the encoder to
    /// fill. The buffer is not valid until [`seal`](Self::seal) runs.
    pub(crate) fn with_size(size: usize, algorithm_type: AlgorithmType) -> Self {
        let num_chunks = size.div_ceil(BUFFER_ALIGNMENT);
        let mut clip = Self {
            chunks: vec![AlignedChunk([0; BUFFER_ALIGNMENT]); num_chunks],
            len: size,
        };

        let buffer = clip.as_mut_slice();
        buffer[8..12].copy_from_slice(&COMPRESSED_CLIP_TAG.to_le_bytes());
        buffer[12..14].copy_from_slice(&ALGORITHM_VERSION.to_le_bytes());
        buffer[14] = algorithm_type as u8;
        buffer[15] = 0;
        clip
    }

    /// Adopt an existing serialized buffer, validating it fully (including
    /// the CRC seal).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SEALED_HEADER_SIZE {
            return Err(Error::InvalidFormat(format!(
                "buffer too small for a sealed header: {} bytes",
                bytes.len()
            )));
        }

        let num_chunks = bytes.len().div_ceil(BUFFER_ALIGNMENT);
        let mut clip = Self {
            chunks: vec![AlignedChunk([0; BUFFER_ALIGNMENT]); num_chunks],
            len: bytes.len(),
        };
        clip.as_mut_slice().copy_from_slice(bytes);

        clip.is_valid(true)?;
        Ok(clip)
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // The chunk storage is contiguous; expose exactly `len` bytes of it.
        let base = self.chunks.as_ptr().cast::<u8>();
        unsafe { core::slice::from_raw_parts(base, self.len) }
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        let base = self.chunks.as_mut_ptr().cast::<u8>();
        unsafe { core::slice::from_raw_parts_mut(base, self.len) }
    }

    /// Total buffer size in bytes as recorded by the seal.
    #[inline]
    pub fn size(&self) -> u32 {
        u32::from_le_bytes(self.as_slice()[0..4].try_into().unwrap())
    }

    #[inline]
    pub fn hash(&self) -> u32 {
        u32::from_le_bytes(self.as_slice()[4..8].try_into().unwrap())
    }

    #[inline]
    fn tag(&self) -> u32 {
        u32::from_le_bytes(self.as_slice()[8..12].try_into().unwrap())
    }

    #[inline]
    pub fn version(&self) -> u16 {
        u16::from_le_bytes(self.as_slice()[12..14].try_into().unwrap())
    }

    #[inline]
    pub fn algorithm_type(&self) -> Result<AlgorithmType> {
        AlgorithmType::from_u8(self.as_slice()[14])
    }

    /// Validate tag, version, algorithm, recorded size, and (optionally)
    /// the CRC seal.
    pub fn is_valid(&self, check_hash: bool) -> Result<()> {
        if self.tag() != COMPRESSED_CLIP_TAG {
            return Err(Error::InvalidFormat(format!(
                "invalid tag: {:#010x}",
                self.tag()
            )));
        }
        if self.version() != ALGORITHM_VERSION {
            return Err(Error::InvalidFormat(format!(
                "unsupported version: {} (expected {})",
                self.version(),
                ALGORITHM_VERSION
            )));
        }
        self.algorithm_type()?;
        if self.size() as usize != self.len {
            return Err(Error::InvalidFormat(format!(
                "recorded size {} does not match buffer length {}",
                self.size(),
                self.len
            )));
        }
        if check_hash {
            let expected = crc32(&self.as_slice()[8..]);
            if self.hash() != expected {
                return Err(Error::InvalidFormat(format!(
                    "hash mismatch: stored {:#010x}, computed {expected:#010x}",
                    self.hash()
                )));
            }
        }
        Ok(())
    }

    /// Write the recorded size and CRC, completing the buffer.
    pub(crate) fn seal(&mut self) {
        let len = self.len as u32;
        let buffer = self.as_mut_slice();
        buffer[0..4].copy_from_slice(&len.to_le_bytes());
        let hash = crc32(&buffer[8..]);
        buffer[4..8].copy_from_slice(&hash.to_le_bytes());
    }

    /// The serialized payload following the sealed header (the clip header
    /// and everything after it).
    #[inline]
    pub(crate) fn payload(&self) -> &[u8] {
        &self.as_slice()[SEALED_HEADER_SIZE..]
    }
}

impl Clone for CompressedClip {
    fn clone(&self) -> Self {
        Self {
            chunks: self.chunks.clone(),
            len: self.len,
        }
    }
}

impl core::fmt::Debug for CompressedClip {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompressedClip")
            .field("size", &self.size())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_header_roundtrip() {
        let mut clip = CompressedClip::with_size(64, AlgorithmType::UniformlySampled);
        clip.seal();

        assert_eq!(clip.size(), 64);
        assert_eq!(clip.version(), ALGORITHM_VERSION);
        assert_eq!(clip.algorithm_type().unwrap(), AlgorithmType::UniformlySampled);
        clip.is_valid(true).unwrap();

        let adopted = CompressedClip::from_bytes(clip.as_slice()).unwrap();
        assert_eq!(adopted.as_slice(), clip.as_slice());
    }

    #[test]
    fn buffer_is_16_byte_aligned() {
        let clip = CompressedClip::with_size(120, AlgorithmType::UniformlySampled);
        assert_eq!(clip.as_slice().as_ptr() as usize % BUFFER_ALIGNMENT, 0);
        assert_eq!(clip.as_slice().len(), 120);
    }

    #[test]
    fn tampering_is_detected() {
        let mut clip = CompressedClip::with_size(64, AlgorithmType::UniformlySampled);
        clip.seal();

        let mut bytes = clip.as_slice().to_vec();
        bytes[40] ^= 0x10;
        let err = CompressedClip::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.name(), "InvalidFormat");
    }

    #[test]
    fn bad_tag_is_rejected_before_hash() {
        let mut clip = CompressedClip::with_size(64, AlgorithmType::UniformlySampled);
        clip.seal();

        let mut bytes = clip.as_slice().to_vec();
        bytes[8] = 0x00;
        let err = CompressedClip::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("invalid tag"));
    }
}
