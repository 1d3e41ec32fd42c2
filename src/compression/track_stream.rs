//! Mutable staging streams for one bone's tracks.
//!
//! Every sample is held as a [`Vec4`] in double precision while the
//! pipeline transforms it (rotation folding, normalization); the packed
//! widths only materialize at serialization time. Rotation streams store
//! quaternions as [x, y, z, w]; vector streams leave w at zero.

use crate::math::{Quat, Vec4};

/// One channel's sample stream.
#[derive(Debug, Clone, Default)]
pub struct TrackStream {
    samples: Vec<Vec4>,
}

impl TrackStream {
    pub fn new(samples: Vec<Vec4>) -> Self {
        Self { samples }
    }

    #[inline]
    pub fn num_samples(&self) -> u32 {
        self.samples.len() as u32
    }

    #[inline]
    pub fn sample(&self, sample_index: u32) -> Vec4 {
        self.samples[sample_index as usize]
    }

    #[inline]
    pub fn set_sample(&mut self, sample_index: u32, sample: Vec4) {
        self.samples[sample_index as usize] = sample;
    }

    #[inline]
    pub fn samples(&self) -> &[Vec4] {
        &self.samples
    }

    /// Keep only the first sample; used when the track is constant.
    pub fn compact_to_single_sample(&mut self) {
        self.samples.truncate(1);
    }

    /// Component-wise (min, extent) over all samples.
    pub fn calculate_range(&self) -> TrackRange {
        let mut min = Vec4::splat(1.0e10);
        let mut max = Vec4::splat(-1.0e10);
        for &sample in &self.samples {
            min = min.min(sample);
            max = max.max(sample);
        }
        TrackRange::from_min_max(min, max)
    }
}

/// A component-wise sample range, stored as (min, extent).
///
/// For rotation tracks the range only describes the component values; the
/// min and extent are not themselves valid rotations.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackRange {
    min: Vec4,
    extent: Vec4,
}

impl TrackRange {
    #[inline]
    pub fn from_min_max(min: Vec4, max: Vec4) -> Self {
        Self {
            min,
            extent: max.sub(min),
        }
    }

    #[inline]
    pub fn from_min_extent(min: Vec4, extent: Vec4) -> Self {
        Self { min, extent }
    }

    /// The range of a constant track: zero extent around the sample.
    #[inline]
    pub fn constant(sample: Vec4) -> Self {
        Self {
            min: sample,
            extent: Vec4::zero(),
        }
    }

    #[inline]
    pub fn min(&self) -> Vec4 {
        self.min
    }

    #[inline]
    pub fn extent(&self) -> Vec4 {
        self.extent
    }

    #[inline]
    pub fn max(&self) -> Vec4 {
        self.min.add(self.extent)
    }

    /// Whether every component's extent is below `threshold`.
    #[inline]
    pub fn is_constant(&self, threshold: f64) -> bool {
        let e = self.extent.abs();
        e.x < threshold && e.y < threshold && e.z < threshold && e.w < threshold
    }
}

/// Per-bone (rotation, translation, scale) ranges.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoneRanges {
    pub rotation: TrackRange,
    pub translation: TrackRange,
    pub scale: TrackRange,
}

/// All staging state for one bone within one segment.
#[derive(Debug, Clone, Default)]
pub struct BoneStreams {
    pub bone_index: u16,
    pub parent_index: Option<u16>,

    pub rotations: TrackStream,
    pub translations: TrackStream,
    pub scales: TrackStream,

    pub is_rotation_constant: bool,
    pub is_rotation_default: bool,
    pub is_translation_constant: bool,
    pub is_translation_default: bool,
    pub is_scale_constant: bool,
    pub is_scale_default: bool,
}

impl BoneStreams {
    /// Animated tracks carry per-sample data in the compressed stream.
    #[inline]
    pub fn is_rotation_animated(&self) -> bool {
        !self.is_rotation_constant && !self.is_rotation_default
    }

    #[inline]
    pub fn is_translation_animated(&self) -> bool {
        !self.is_translation_constant && !self.is_translation_default
    }

    #[inline]
    pub fn is_scale_animated(&self) -> bool {
        !self.is_scale_constant && !self.is_scale_default
    }

    /// The retained rotation of a constant track.
    #[inline]
    pub fn constant_rotation(&self) -> Quat {
        Quat::from_vec4(self.rotations.sample(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_from_samples() {
        let stream = TrackStream::new(vec![
            Vec4::new(1.0, -2.0, 0.5, 0.0),
            Vec4::new(-1.0, 4.0, 0.5, 0.0),
            Vec4::new(0.0, 1.0, 0.5, 0.0),
        ]);
        let range = stream.calculate_range();
        assert_eq!(range.min(), Vec4::new(-1.0, -2.0, 0.5, 0.0));
        assert_eq!(range.extent(), Vec4::new(2.0, 6.0, 0.0, 0.0));
        assert_eq!(range.max(), Vec4::new(1.0, 4.0, 0.5, 0.0));
        assert!(!range.is_constant(1.0e-9));
    }

    #[test]
    fn constant_detection_uses_extent() {
        let stream = TrackStream::new(vec![Vec4::splat(0.25); 8]);
        assert!(stream.calculate_range().is_constant(1.0e-9));
    }

    #[test]
    fn compaction_keeps_the_first_sample() {
        let mut stream = TrackStream::new(vec![Vec4::splat(3.0), Vec4::splat(3.0)]);
        stream.compact_to_single_sample();
        assert_eq!(stream.num_samples(), 1);
        assert_eq!(stream.sample(0), Vec4::splat(3.0));
    }
}
