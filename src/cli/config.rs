//! Compression settings file (`-config=`).
//!
//! A JSON document overriding parts of a level preset:
//!
//! ```json
//! {
//!   "level": "medium",
//!   "rotation_format": "QuatDropW_Variable",
//!   "translation_format": "Vector3_Variable",
//!   "scale_format": "Vector3_Variable",
//!   "range_reduction": ["rotations", "translations", "scales"],
//!   "segmenting": {
//!     "enabled": true,
//!     "ideal_num_samples": 16,
//!     "max_num_samples": 31,
//!     "range_reduction": ["rotations", "translations", "scales"]
//!   },
//!   "constant_rotation_threshold_angle": 0.00001,
//!   "constant_translation_threshold": 0.001,
//!   "constant_scale_threshold": 0.00001
//! }
//! ```

use acl::{
    CompressionLevel, CompressionSettings, RangeReductionFlags, RotationFormat, VectorFormat,
};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    level: Option<String>,
    rotation_format: Option<String>,
    translation_format: Option<String>,
    scale_format: Option<String>,
    range_reduction: Option<Vec<String>>,
    segmenting: Option<SegmentingDocument>,
    constant_rotation_threshold_angle: Option<f64>,
    constant_translation_threshold: Option<f64>,
    constant_scale_threshold: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SegmentingDocument {
    enabled: Option<bool>,
    ideal_num_samples: Option<u16>,
    max_num_samples: Option<u16>,
    range_reduction: Option<Vec<String>>,
}

fn parse_range_reduction(names: &[String]) -> Result<RangeReductionFlags> {
    let mut flags = RangeReductionFlags::NONE;
    for name in names {
        flags = flags
            | match name.as_str() {
                "rotations" => RangeReductionFlags::ROTATIONS,
                "translations" => RangeReductionFlags::TRANSLATIONS,
                "scales" => RangeReductionFlags::SCALES,
                other => return Err(anyhow!("unknown range reduction channel: '{other}'")),
            };
    }
    Ok(flags)
}

/// Build the effective settings from an optional config file and an
/// optional `-level=` override (the command line wins the level).
pub fn load_settings(
    config_path: Option<&Path>,
    level_override: Option<CompressionLevel>,
) -> Result<CompressionSettings> {
    let document: ConfigDocument = match config_path {
        None => ConfigDocument::default(),
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read config '{}'", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("cannot parse config '{}'", path.display()))?
        }
    };

    let config_level = document
        .level
        .as_deref()
        .map(|name| {
            CompressionLevel::from_name(name).ok_or_else(|| anyhow!("unknown level '{name}'"))
        })
        .transpose()?;
    let level = level_override
        .or(config_level)
        .unwrap_or(CompressionLevel::Medium);

    let mut settings = CompressionSettings::with_level(level);

    if let Some(name) = document.rotation_format.as_deref() {
        settings.rotation_format = RotationFormat::from_name(name)
            .ok_or_else(|| anyhow!("unknown rotation format '{name}'"))?;
    }
    if let Some(name) = document.translation_format.as_deref() {
        settings.translation_format = VectorFormat::from_name(name)
            .ok_or_else(|| anyhow!("unknown vector format '{name}'"))?;
    }
    if let Some(name) = document.scale_format.as_deref() {
        settings.scale_format = VectorFormat::from_name(name)
            .ok_or_else(|| anyhow!("unknown vector format '{name}'"))?;
    }
    if let Some(names) = &document.range_reduction {
        settings.range_reduction = parse_range_reduction(names)?;
    }
    if let Some(segmenting) = &document.segmenting {
        if let Some(enabled) = segmenting.enabled {
            settings.segmenting.enabled = enabled;
        }
        if let Some(ideal) = segmenting.ideal_num_samples {
            settings.segmenting.ideal_num_samples = ideal;
        }
        if let Some(max) = segmenting.max_num_samples {
            settings.segmenting.max_num_samples = max;
        }
        if let Some(names) = &segmenting.range_reduction {
            settings.segmenting.range_reduction = parse_range_reduction(names)?;
        }
    }
    if let Some(threshold) = document.constant_rotation_threshold_angle {
        settings.constant_thresholds.rotation = threshold;
    }
    if let Some(threshold) = document.constant_translation_threshold {
        settings.constant_thresholds.translation = threshold;
    }
    if let Some(threshold) = document.constant_scale_threshold {
        settings.constant_thresholds.scale = threshold;
    }

    settings.is_valid()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_the_medium_preset() {
        let settings = load_settings(None, None).unwrap();
        assert_eq!(settings.level, CompressionLevel::Medium);
        assert!(settings.rotation_format.is_variable());
    }

    #[test]
    fn command_line_level_wins() {
        let settings = load_settings(None, Some(CompressionLevel::Lowest)).unwrap();
        assert_eq!(settings.level, CompressionLevel::Lowest);
        assert_eq!(settings.rotation_format, RotationFormat::Quat128);
    }

    #[test]
    fn config_overrides_apply_and_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "level": "low",
                "rotation_format": "QuatDropW_32",
                "range_reduction": ["rotations", "translations", "scales"]
            }"#,
        )
        .unwrap();

        let settings = load_settings(Some(&path), None).unwrap();
        assert_eq!(settings.level, CompressionLevel::Low);
        assert_eq!(settings.rotation_format, RotationFormat::QuatDropW32);
    }

    #[test]
    fn invalid_combinations_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        // Variable translations without range reduction.
        std::fs::write(
            &path,
            r#"{"level": "lowest", "translation_format": "Vector3_Variable"}"#,
        )
        .unwrap();

        assert!(load_settings(Some(&path), None).is_err());
    }
}
