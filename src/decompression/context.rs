//! Decompression context: stateless parse, then per-sample seek state.
//!
//! A context borrows a sealed buffer, validates it once, and precomputes
//! the segment directory so that every later read is bounds-checked by
//! construction. Seeking never fails after initialization. One context
//! serves one sampler; the underlying buffer may back any number of
//! contexts concurrently.

use crate::core::buffer::CompressedClip;
use crate::core::error::{Error, Result};
use crate::core::headers::{ClipHeader, SegmentHeader, INVALID_OFFSET, SEGMENT_HEADER_SIZE};
use crate::core::range_reduction::RangeReductionFlags;
use crate::core::bitset::bitset_size;

/// How a seek maps a time between two samples onto an interpolation alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingPolicy {
    /// Keep the fractional alpha (production sampling).
    #[default]
    None,
    /// Snap to the closest of the two samples.
    Nearest,
    /// Use the earlier sample.
    Floor,
    /// Use the later sample.
    Ceiling,
}

/// One of the two keys a seek resolves to.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FrameKey {
    pub segment_index: u32,
    pub sample_in_segment: u32,
}

/// A validated view over one compressed clip.
pub struct DecompressionContext<'a> {
    pub(crate) payload: &'a [u8],
    pub(crate) header: ClipHeader,
    pub(crate) segment_headers: Vec<SegmentHeader>,
    /// Start sample of each segment, plus the total as a sentinel.
    pub(crate) segment_start_samples: Vec<u32>,
    pub(crate) default_scale_is_zero: bool,

    // Seek state; mutated by `seek`, read by the decode calls.
    pub(crate) key0: FrameKey,
    pub(crate) key1: FrameKey,
    pub(crate) interpolation_alpha: f64,
}

impl<'a> DecompressionContext<'a> {
    /// Validate the buffer and precompute the segment directory.
    pub fn new(compressed: &'a CompressedClip) -> Result<Self> {
        compressed.is_valid(false)?;

        let payload = compressed.payload();
        let header = ClipHeader::read_from(payload)?;

        if header.num_bones == 0 {
            return Err(Error::InvalidFormat("clip header has zero bones".to_owned()));
        }
        if header.num_samples == 0 {
            return Err(Error::InvalidFormat("clip header has zero samples".to_owned()));
        }
        if header.num_segments == 0 {
            return Err(Error::InvalidFormat("clip header has zero segments".to_owned()));
        }
        if header.sample_rate == 0 {
            return Err(Error::InvalidFormat("clip header has zero sample rate".to_owned()));
        }

        let payload_len = payload.len() as u32;
        let check_block = |offset: u32, size: u32, what: &str| -> Result<()> {
            if offset == INVALID_OFFSET {
                return Ok(());
            }
            if offset.checked_add(size).map_or(true, |end| end > payload_len) {
                return Err(Error::InvalidFormat(format!(
                    "{what} block at {offset}+{size} escapes the buffer ({payload_len} bytes)"
                )));
            }
            Ok(())
        };

        let num_segments = u32::from(header.num_segments);
        check_block(
            header.segment_headers_offset,
            num_segments * SEGMENT_HEADER_SIZE,
            "segment header",
        )?;

        let bitset_bytes = 4 * bitset_size(u32::from(header.num_bones) * header.num_tracks_per_bone());
        check_block(header.default_tracks_bitset_offset, bitset_bytes, "default bitset")?;
        check_block(header.constant_tracks_bitset_offset, bitset_bytes, "constant bitset")?;
        check_block(header.constant_track_data_offset, 0, "constant pool")?;
        check_block(header.clip_range_data_offset, 0, "clip range")?;

        let mut segment_headers = Vec::with_capacity(num_segments as usize);
        let mut segment_start_samples = Vec::with_capacity(num_segments as usize + 1);
        let mut start_sample = 0u32;
        for segment_index in 0..num_segments {
            let segment_header = SegmentHeader::read_from(
                payload,
                (header.segment_headers_offset + segment_index * SEGMENT_HEADER_SIZE) as usize,
            )?;

            if segment_header.num_samples == 0 {
                return Err(Error::InvalidFormat(format!(
                    "segment {segment_index} has zero samples"
                )));
            }

            let animated_size = (u64::from(segment_header.animated_pose_bit_size)
                * u64::from(segment_header.num_samples))
            .div_ceil(8) as u32;
            check_block(segment_header.track_data_offset, animated_size, "animated")?;
            check_block(segment_header.range_data_offset, 0, "segment range")?;
            check_block(segment_header.format_per_track_data_offset, 0, "per-track format")?;

            segment_start_samples.push(start_sample);
            start_sample = start_sample
                .checked_add(segment_header.num_samples)
                .ok_or_else(|| Error::InvalidFormat("segment sample counts overflow".to_owned()))?;
            segment_headers.push(segment_header);
        }
        segment_start_samples.push(start_sample);

        if start_sample != header.num_samples {
            return Err(Error::InvalidFormat(format!(
                "segment samples sum to {start_sample}, clip header says {}",
                header.num_samples
            )));
        }

        let default_scale_is_zero = payload[10] != 0;

        Ok(Self {
            payload,
            header,
            segment_headers,
            segment_start_samples,
            default_scale_is_zero,
            key0: FrameKey::default(),
            key1: FrameKey::default(),
            interpolation_alpha: 0.0,
        })
    }

    #[inline]
    pub fn header(&self) -> &ClipHeader {
        &self.header
    }

    #[inline]
    pub fn num_bones(&self) -> u16 {
        self.header.num_bones
    }

    /// Clip duration in seconds.
    #[inline]
    pub fn duration(&self) -> f64 {
        f64::from(self.header.num_samples - 1) / f64::from(self.header.sample_rate)
    }

    /// Resolve a sample time to the two adjacent keys and the
    /// interpolation alpha. Never fails; the time is clamped to the clip.
    pub fn seek(&mut self, sample_time: f64, rounding: RoundingPolicy) {
        let clamped = sample_time.clamp(0.0, self.duration());
        let frame = clamped * f64::from(self.header.sample_rate);

        let mut sample0 = (frame.floor() as u32).min(self.header.num_samples - 1);
        let mut sample1 = (sample0 + 1).min(self.header.num_samples - 1);
        let fractional = frame - f64::from(sample0);

        let mut alpha = match rounding {
            RoundingPolicy::None => fractional,
            RoundingPolicy::Nearest => {
                if fractional >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            RoundingPolicy::Floor => 0.0,
            RoundingPolicy::Ceiling => {
                if sample1 > sample0 {
                    1.0
                } else {
                    0.0
                }
            }
        };

        // Collapse onto a single key when the blend lands on a sample, so
        // rounded seeks reproduce that sample bit-exactly.
        if alpha == 0.0 {
            sample1 = sample0;
        } else if alpha == 1.0 {
            sample0 = sample1;
            alpha = 0.0;
        }

        self.key0 = self.locate_sample(sample0);
        self.key1 = self.locate_sample(sample1);
        self.interpolation_alpha = alpha;
    }

    /// Map a clip sample index to its segment. Guesses from the average
    /// samples-per-segment, then walks the start-sample table; the walk is
    /// bounded and correct for any split the segmenter can produce.
    pub(crate) fn locate_sample(&self, sample_index: u32) -> FrameKey {
        let num_segments = self.segment_headers.len() as u32;
        let samples_per_segment = (self.header.num_samples / num_segments).max(1);
        let mut segment_index = (sample_index / samples_per_segment).min(num_segments - 1);

        while sample_index < self.segment_start_samples[segment_index as usize] {
            segment_index -= 1;
        }
        while sample_index >= self.segment_start_samples[segment_index as usize + 1] {
            segment_index += 1;
        }

        FrameKey {
            segment_index,
            sample_in_segment: sample_index - self.segment_start_samples[segment_index as usize],
        }
    }

    // ── Track metadata ──────────────────────────────────────────────────

    #[inline]
    pub(crate) fn read_bitset_bit(&self, bitset_offset: u32, track_index: u32) -> bool {
        let word_offset = (bitset_offset + 4 * (track_index / 32)) as usize;
        let word = crate::core::headers::read_u32_le(self.payload, word_offset);
        word & (1 << (31 - (track_index % 32))) != 0
    }

    #[inline]
    pub(crate) fn is_track_default(&self, track_index: u32) -> bool {
        self.read_bitset_bit(self.header.default_tracks_bitset_offset, track_index)
    }

    #[inline]
    pub(crate) fn is_track_constant(&self, track_index: u32) -> bool {
        self.read_bitset_bit(self.header.constant_tracks_bitset_offset, track_index)
    }

    #[inline]
    pub(crate) fn has_segment_range(&self, channel: RangeReductionFlags) -> bool {
        self.header.segment_range_reduction.contains(channel)
    }

    #[inline]
    pub(crate) fn has_clip_range(&self, channel: RangeReductionFlags) -> bool {
        self.header.clip_range_reduction.contains(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::clip::{AnimationClip, BoneTracks};
    use crate::compression::encoder::compress_clip;
    use crate::compression::settings::CompressionSettings;
    use crate::compression::skeleton::{RigidBone, RigidSkeleton};
    use crate::math::Vec3;

    fn compressed_fixture(num_samples: u32) -> crate::core::buffer::CompressedClip {
        let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
        let mut tracks = BoneTracks::identity(num_samples as usize);
        for (sample_index, translation) in tracks.translations.iter_mut().enumerate() {
            *translation = Vec3::new(sample_index as f64 * 0.01, 0.0, 0.0);
        }
        let clip =
            AnimationClip::new(&skeleton, "fixture", num_samples, 30, 0.01, vec![tracks]).unwrap();
        compress_clip(&clip, &skeleton, &CompressionSettings::default())
            .unwrap()
            .compressed
    }

    #[test]
    fn init_validates_and_precomputes_segments() {
        let compressed = compressed_fixture(64);
        let context = DecompressionContext::new(&compressed).unwrap();

        assert_eq!(context.num_bones(), 1);
        assert_eq!(context.segment_headers.len(), 4);
        assert_eq!(context.segment_start_samples, vec![0, 16, 32, 48, 64]);
        assert_eq!(context.duration(), 63.0 / 30.0);
    }

    #[test]
    fn locate_sample_covers_every_index() {
        let compressed = compressed_fixture(100);
        let context = DecompressionContext::new(&compressed).unwrap();

        for sample_index in 0..100u32 {
            let key = context.locate_sample(sample_index);
            let start = context.segment_start_samples[key.segment_index as usize];
            let end = context.segment_start_samples[key.segment_index as usize + 1];
            assert!(sample_index >= start && sample_index < end);
            assert_eq!(key.sample_in_segment, sample_index - start);
        }
    }

    #[test]
    fn seek_clamps_and_rounds() {
        let compressed = compressed_fixture(31);
        let mut context = DecompressionContext::new(&compressed).unwrap();

        // Halfway between samples 15 and 16.
        context.seek(15.5 / 30.0, RoundingPolicy::None);
        assert!((context.interpolation_alpha - 0.5).abs() < 1.0e-9);

        // Rounded seeks collapse onto a single key.
        context.seek(15.5 / 30.0, RoundingPolicy::Floor);
        assert_eq!(context.interpolation_alpha, 0.0);
        assert_eq!(context.key0.sample_in_segment, context.key1.sample_in_segment);
        assert_eq!(context.key0.sample_in_segment, 15);

        context.seek(15.6 / 30.0, RoundingPolicy::Nearest);
        assert_eq!(context.interpolation_alpha, 0.0);
        assert_eq!(context.key0.sample_in_segment, 16);
        assert_eq!(context.key1.sample_in_segment, 16);

        // Far past the end: clamps to the final sample.
        context.seek(1000.0, RoundingPolicy::None);
        assert_eq!(context.interpolation_alpha, 0.0);

        // Negative time clamps to zero.
        context.seek(-5.0, RoundingPolicy::Ceiling);
        assert_eq!(
            context.key0.segment_index, 0,
        );
        assert_eq!(context.key0.sample_in_segment, 0);
    }
}
