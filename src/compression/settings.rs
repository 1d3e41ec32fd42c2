//! Compression settings, levels, and validation.

use crate::compression::error_metric::ErrorMetric;
use crate::core::error::{Error, Result};
use crate::core::range_reduction::RangeReductionFlags;
use crate::core::types::{RotationFormat, VectorFormat};

// ── Compression level ────────────────────────────────────────────────────────

/// How aggressively the compressor trades compression time for memory
/// footprint. Levels at `Medium` and above use the variable bit-rate
/// formats; `High` and above additionally scan every frame of a segment for
/// the worst bone before each bit-rate upgrade instead of stopping at the
/// first offender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum CompressionLevel {
    Lowest,
    Low,
    #[default]
    Medium,
    High,
    Highest,
}

impl CompressionLevel {
    pub fn name(self) -> &'static str {
        match self {
            CompressionLevel::Lowest => "lowest",
            CompressionLevel::Low => "low",
            CompressionLevel::Medium => "medium",
            CompressionLevel::High => "high",
            CompressionLevel::Highest => "highest",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "lowest" => Some(CompressionLevel::Lowest),
            "low" => Some(CompressionLevel::Low),
            "medium" => Some(CompressionLevel::Medium),
            "high" => Some(CompressionLevel::High),
            "highest" => Some(CompressionLevel::Highest),
            _ => None,
        }
    }
}

// ── Segmenting ───────────────────────────────────────────────────────────────

/// Settings controlling how a clip is split into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentingSettings {
    pub enabled: bool,
    /// How many samples to aim for per segment.
    pub ideal_num_samples: u16,
    /// Hard cap on samples per segment.
    pub max_num_samples: u16,
    /// Which channels get per-segment range reduction.
    pub range_reduction: RangeReductionFlags,
}

impl Default for SegmentingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ideal_num_samples: 16,
            max_num_samples: 31,
            range_reduction: RangeReductionFlags::NONE,
        }
    }
}

impl SegmentingSettings {
    pub fn is_valid(&self) -> Result<()> {
        if self.ideal_num_samples < 8 {
            return Err(Error::InvalidConfig(
                "ideal_num_samples must be greater or equal to 8".to_owned(),
            ));
        }
        if self.ideal_num_samples > self.max_num_samples {
            return Err(Error::InvalidConfig(
                "ideal_num_samples must be smaller or equal to max_num_samples".to_owned(),
            ));
        }
        Ok(())
    }
}

// ── Constant-track thresholds ────────────────────────────────────────────────

/// Per-channel thresholds under which a track collapses to a single sample.
/// The rotation threshold is a geodesic angle in radians; the vector
/// thresholds are absolute per-component extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantTrackThresholds {
    pub rotation: f64,
    pub translation: f64,
    pub scale: f64,
}

impl Default for ConstantTrackThresholds {
    fn default() -> Self {
        // The translation threshold is unit-scale dependent; this default
        // assumes centimeters.
        Self {
            rotation: 0.00001,
            translation: 0.001,
            scale: 0.00001,
        }
    }
}

// ── Compression settings ─────────────────────────────────────────────────────

/// Everything the compressor needs besides the clip and skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionSettings {
    pub level: CompressionLevel,
    pub rotation_format: RotationFormat,
    pub translation_format: VectorFormat,
    pub scale_format: VectorFormat,
    /// Which channels get per-clip range reduction.
    pub range_reduction: RangeReductionFlags,
    pub segmenting: SegmentingSettings,
    pub constant_thresholds: ConstantTrackThresholds,
    pub error_metric: ErrorMetric,
}

impl Default for CompressionSettings {
    /// The recommended settings: variable bit rates everywhere with clip and
    /// segment range reduction.
    fn default() -> Self {
        Self::with_level(CompressionLevel::Medium)
    }
}

impl CompressionSettings {
    /// Raw settings: full-precision formats, no range reduction, no
    /// segmenting. Constant and default tracks are still dropped.
    pub fn raw() -> Self {
        Self {
            level: CompressionLevel::Lowest,
            rotation_format: RotationFormat::Quat128,
            translation_format: VectorFormat::Vector3_96,
            scale_format: VectorFormat::Vector3_96,
            range_reduction: RangeReductionFlags::NONE,
            segmenting: SegmentingSettings::default(),
            constant_thresholds: ConstantTrackThresholds::default(),
            error_metric: ErrorMetric::Absolute,
        }
    }

    /// The preset bundle for a compression level.
    pub fn with_level(level: CompressionLevel) -> Self {
        let mut settings = Self::raw();
        settings.level = level;
        match level {
            CompressionLevel::Lowest => {}
            CompressionLevel::Low => {
                settings.rotation_format = RotationFormat::QuatDropW48;
                settings.translation_format = VectorFormat::Vector3_48;
                settings.scale_format = VectorFormat::Vector3_48;
                settings.range_reduction = RangeReductionFlags::ALL_TRACKS;
            }
            CompressionLevel::Medium | CompressionLevel::High | CompressionLevel::Highest => {
                settings.rotation_format = RotationFormat::QuatDropWVariable;
                settings.translation_format = VectorFormat::Vector3Variable;
                settings.scale_format = VectorFormat::Vector3Variable;
                settings.range_reduction = RangeReductionFlags::ALL_TRACKS;
                settings.segmenting.enabled = true;
                settings.segmenting.range_reduction = RangeReductionFlags::ALL_TRACKS;
                if level == CompressionLevel::Highest {
                    // Shorter segments adapt their ranges more tightly.
                    settings.segmenting.ideal_num_samples = 8;
                    settings.segmenting.max_num_samples = 15;
                }
            }
        }
        settings
    }

    /// Whether the bit-rate search scans the whole segment for the worst
    /// bone before each upgrade.
    #[inline]
    pub fn scan_whole_segment(&self) -> bool {
        self.level >= CompressionLevel::High
    }

    /// Validate internal consistency.
    pub fn is_valid(&self) -> Result<()> {
        if self.segmenting.enabled {
            self.segmenting.is_valid()?;
        }

        if !self.segmenting.range_reduction.is_empty() {
            if !self.segmenting.enabled {
                return Err(Error::InvalidConfig(
                    "segment range reduction requires segmenting to be enabled".to_owned(),
                ));
            }
            if !self.range_reduction.contains(self.segmenting.range_reduction) {
                return Err(Error::InvalidConfig(
                    "segment range reduction requires the matching clip range reduction".to_owned(),
                ));
            }
        }

        // Quantized vector formats decode through a (min, extent) pair; the
        // raw value range is unbounded so range reduction is mandatory.
        if self.translation_format != VectorFormat::Vector3_96
            && !self.range_reduction.contains(RangeReductionFlags::TRANSLATIONS)
            && !self.segmenting.range_reduction.contains(RangeReductionFlags::TRANSLATIONS)
        {
            return Err(Error::InvalidConfig(format!(
                "{} translations require range reduction at the clip or segment level",
                self.translation_format.name()
            )));
        }
        if self.scale_format != VectorFormat::Vector3_96
            && !self.range_reduction.contains(RangeReductionFlags::SCALES)
            && !self.segmenting.range_reduction.contains(RangeReductionFlags::SCALES)
        {
            return Err(Error::InvalidConfig(format!(
                "{} scales require range reduction at the clip or segment level",
                self.scale_format.name()
            )));
        }
        if self.rotation_format == RotationFormat::QuatDropWVariable
            && !self.range_reduction.contains(RangeReductionFlags::ROTATIONS)
        {
            return Err(Error::InvalidConfig(
                "QuatDropW_Variable rotations require clip range reduction".to_owned(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid_and_variable() {
        let settings = CompressionSettings::default();
        settings.is_valid().unwrap();
        assert!(settings.rotation_format.is_variable());
        assert!(settings.segmenting.enabled);
    }

    #[test]
    fn every_level_bundle_is_valid() {
        for level in [
            CompressionLevel::Lowest,
            CompressionLevel::Low,
            CompressionLevel::Medium,
            CompressionLevel::High,
            CompressionLevel::Highest,
        ] {
            let settings = CompressionSettings::with_level(level);
            settings.is_valid().unwrap();
            assert_eq!(settings.level, level);
            assert_eq!(CompressionLevel::from_name(level.name()), Some(level));
        }
    }

    #[test]
    fn segmenting_bounds_are_enforced() {
        let mut settings = CompressionSettings::default();
        settings.segmenting.ideal_num_samples = 4;
        assert_eq!(settings.is_valid().unwrap_err().name(), "InvalidConfig");

        settings.segmenting.ideal_num_samples = 32;
        settings.segmenting.max_num_samples = 31;
        assert_eq!(settings.is_valid().unwrap_err().name(), "InvalidConfig");
    }

    #[test]
    fn segment_range_reduction_requires_clip_level() {
        let mut settings = CompressionSettings::default();
        settings.range_reduction = RangeReductionFlags::ROTATIONS | RangeReductionFlags::TRANSLATIONS;
        // Scales still flagged at the segment level.
        let err = settings.is_valid().unwrap_err();
        assert_eq!(err.name(), "InvalidConfig");
    }

    #[test]
    fn quantized_vectors_require_range_reduction() {
        let mut settings = CompressionSettings::raw();
        settings.translation_format = VectorFormat::Vector3_48;
        assert_eq!(settings.is_valid().unwrap_err().name(), "InvalidConfig");

        settings.range_reduction = RangeReductionFlags::TRANSLATIONS;
        settings.is_valid().unwrap();
    }
}
