//! Compression diagnostics.
//!
//! Builds a JSON document describing one compression run: sizes, track
//! classification, the bit-rate histogram, locked bones, and the measured
//! round-trip error. The command-line tool emits this for `-stats`.

use crate::compression::clip::AnimationClip;
use crate::compression::encoder::CompressionResult;
use crate::compression::error_metric::{calculate_error_per_bone, ErrorMetric, ErrorScratch};
use crate::compression::skeleton::RigidSkeleton;
use crate::core::buffer::CompressedClip;
use crate::core::error::{Error, Result};
use crate::decompression::{decompress_pose, DecompressionContext, RoundingPolicy};
use crate::math::Transform;
use serde_json::json;
use std::path::Path;

/// The worst round-trip error found by [`measure_compression_error`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorMeasurement {
    pub max_error: f64,
    pub worst_bone: u16,
    pub worst_sample_time: f64,
}

/// Decompress every sample of `compressed` and measure the worst
/// shell-distance error against the raw clip.
pub fn measure_compression_error(
    clip: &AnimationClip,
    skeleton: &RigidSkeleton,
    compressed: &CompressedClip,
) -> Result<ErrorMeasurement> {
    let metric = ErrorMetric::for_additive_kind(clip.additive_base().map(|(kind, _)| kind));
    let base_clip = clip.additive_base().map(|(_, base)| base);

    let mut context = DecompressionContext::new(compressed)?;
    let num_bones = usize::from(skeleton.num_bones());

    let mut raw_pose = vec![Transform::identity(); num_bones];
    let mut lossy_pose = vec![Transform::identity(); num_bones];
    let mut base_pose = vec![Transform::identity(); num_bones];
    let mut error_per_bone = vec![0.0f64; num_bones];
    let mut scratch = ErrorScratch::new(skeleton.num_bones());

    let mut measurement = ErrorMeasurement {
        max_error: 0.0,
        worst_bone: 0,
        worst_sample_time: 0.0,
    };

    for sample_index in 0..clip.num_samples() {
        let sample_time = f64::from(sample_index) / f64::from(clip.sample_rate());

        clip.sample_pose(sample_time, &mut raw_pose);
        context.seek(sample_time, RoundingPolicy::Nearest);
        decompress_pose(&context, &mut lossy_pose);

        let base = base_clip.map(|base| {
            base.sample_pose(sample_time, &mut base_pose);
            base_pose.as_slice()
        });
        calculate_error_per_bone(
            metric,
            skeleton,
            &raw_pose,
            &lossy_pose,
            base,
            &mut scratch,
            &mut error_per_bone,
        );

        for (bone_index, &error) in error_per_bone.iter().enumerate() {
            if error > measurement.max_error {
                measurement.max_error = error;
                measurement.worst_bone = bone_index as u16;
                measurement.worst_sample_time = sample_time;
            }
        }
    }

    Ok(measurement)
}

/// Build the stats document for one compression run.
pub fn compression_stats_json(
    clip: &AnimationClip,
    skeleton: &RigidSkeleton,
    result: &CompressionResult,
) -> Result<serde_json::Value> {
    let stats = &result.stats;
    let measurement = measure_compression_error(clip, skeleton, &result.compressed)?;

    let bit_rates: Vec<serde_json::Value> = stats
        .bit_rate_counts
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > 0)
        .map(|(bit_rate, &count)| {
            json!({
                "bit_rate": bit_rate,
                "bits_per_component": crate::core::types::num_bits_at_bit_rate(bit_rate as u8),
                "num_tracks": count,
            })
        })
        .collect();

    let locked: Vec<serde_json::Value> = stats
        .locked_bones
        .iter()
        .map(|locked_bone| {
            json!({
                "segment": locked_bone.segment_index,
                "bone": skeleton.bone(locked_bone.bone_index).name,
                "error": locked_bone.error(),
            })
        })
        .collect();

    Ok(json!({
        "clip_name": clip.name(),
        "algorithm": "UniformlySampled",
        "num_bones": skeleton.num_bones(),
        "num_samples": clip.num_samples(),
        "sample_rate": clip.sample_rate(),
        "duration_seconds": clip.duration(),
        "error_threshold": clip.error_threshold(),
        "raw_size_bytes": stats.raw_size,
        "compressed_size_bytes": stats.compressed_size,
        "compression_ratio": f64::from(stats.raw_size) / f64::from(stats.compressed_size),
        "num_segments": stats.num_segments,
        "num_default_tracks": stats.num_default_tracks,
        "num_constant_tracks": stats.num_constant_tracks,
        "num_animated_tracks": stats.num_animated_tracks,
        "bit_rates": bit_rates,
        "locked_bones": locked,
        "max_error": measurement.max_error,
        "worst_bone": skeleton.bone(measurement.worst_bone).name,
        "worst_sample_time": measurement.worst_sample_time,
        "compression_time_ms": stats.compression_time.as_secs_f64() * 1000.0,
    }))
}

/// Write the stats document to a file, or pretty-print it to stdout when
/// `path` is `None`.
pub fn write_compression_stats(
    clip: &AnimationClip,
    skeleton: &RigidSkeleton,
    result: &CompressionResult,
    path: Option<&Path>,
) -> Result<()> {
    let document = compression_stats_json(clip, skeleton, result)?;
    let text = serde_json::to_string_pretty(&document)
        .map_err(|err| Error::InvalidInput(format!("cannot serialize stats: {err}")))?;

    match path {
        Some(path) => std::fs::write(path, text).map_err(|err| {
            Error::InvalidInput(format!("cannot write '{}': {err}", path.display()))
        }),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::clip::BoneTracks;
    use crate::compression::encoder::compress_clip;
    use crate::compression::settings::CompressionSettings;
    use crate::compression::skeleton::RigidBone;
    use crate::math::{Quat, Vec3};

    fn fixture() -> (RigidSkeleton, AnimationClip) {
        let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
        let mut tracks = BoneTracks::identity(40);
        for (sample_index, rotation) in tracks.rotations.iter_mut().enumerate() {
            *rotation =
                Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.02 * sample_index as f64);
        }
        let clip = AnimationClip::new(&skeleton, "stats", 40, 30, 0.01, vec![tracks]).unwrap();
        (skeleton, clip)
    }

    #[test]
    fn stats_document_has_the_headline_numbers() {
        let (skeleton, clip) = fixture();
        let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();
        let document = compression_stats_json(&clip, &skeleton, &result).unwrap();

        assert_eq!(document["clip_name"], "stats");
        assert_eq!(document["num_bones"], 1);
        assert_eq!(document["num_samples"], 40);
        assert!(document["compressed_size_bytes"].as_u64().unwrap() > 0);
        assert!(document["compression_ratio"].as_f64().unwrap() > 1.0);
        // Converged clips stay within their threshold.
        assert!(document["max_error"].as_f64().unwrap() <= 0.01);
    }

    #[test]
    fn measured_error_is_finite_and_small() {
        let (skeleton, clip) = fixture();
        let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();
        let measurement =
            measure_compression_error(&clip, &skeleton, &result.compressed).unwrap();

        assert!(measurement.max_error.is_finite());
        assert!(measurement.max_error <= clip.error_threshold());
    }
}
