//! Binary entry point for the `aclc` command-line compressor.
//!
//! Reads a clip document (or an already-compressed buffer), compresses it
//! under the selected settings, and optionally verifies, profiles, writes,
//! or sweeps configurations. Exit code 0 on success, -1 on any failure.

mod cli;

use acl::stats::{measure_compression_error, write_compression_stats};
use acl::{
    compress_clip, decompress_pose, AnimationClip, CompressedClip, CompressionSettings,
    DecompressionContext, ErrorMetric, RangeReductionFlags, RigidSkeleton, RotationFormat,
    RoundingPolicy, SegmentingSettings, Transform, VectorFormat,
};
use anyhow::{Context, Result};
use cli::args::{parse_options, print_usage, Options};
use cli::config::load_settings;
use std::path::Path;
use std::time::Instant;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .env()
        .init()
        .ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_options(&args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("aclc: {err}");
            print_usage();
            std::process::exit(-1);
        }
    };

    let exit_code = match run(&options) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("aclc: {err:#}");
            -1
        }
    };
    std::process::exit(exit_code);
}

fn run(options: &Options) -> Result<()> {
    if options.input_filename.ends_with(".acl.bin") {
        return run_on_compressed(options);
    }

    let (skeleton, clip) = acl::io::read_clip_file(Path::new(&options.input_filename))
        .with_context(|| format!("cannot load clip '{}'", options.input_filename))?;

    println!(
        "loaded '{}': {} bones, {} samples at {} Hz",
        clip.name(),
        clip.num_bones(),
        clip.num_samples(),
        clip.sample_rate()
    );

    if options.exhaustive {
        return run_exhaustive(&clip, &skeleton);
    }

    let mut settings = load_settings(
        options.config_filename.as_deref().map(Path::new),
        options.level,
    )?;
    // The metric follows the clip: additive clips measure combined error.
    settings.error_metric =
        ErrorMetric::for_additive_kind(clip.additive_base().map(|(kind, _)| kind));

    let result = compress_clip(&clip, &skeleton, &settings)?;
    println!(
        "compressed to {} bytes ({:.2}x, {} segments) in {:.2} ms",
        result.stats.compressed_size,
        f64::from(result.stats.raw_size) / f64::from(result.stats.compressed_size),
        result.stats.num_segments,
        result.stats.compression_time.as_secs_f64() * 1000.0
    );

    if options.output_stats {
        write_compression_stats(
            &clip,
            &skeleton,
            &result,
            options.stats_filename.as_deref().map(Path::new),
        )?;
    }

    if let Some(output) = &options.output_filename {
        std::fs::write(output, result.compressed.as_slice())
            .with_context(|| format!("cannot write '{output}'"))?;
        println!("wrote '{output}'");
    }

    if options.regression_test {
        regression_test(&clip, &skeleton, &result)?;
    }

    if options.profile_decompression {
        profile_decompression(&result.compressed)?;
    }

    Ok(())
}

/// `.acl.bin` inputs skip compression: validate, describe, and optionally
/// profile the buffer.
fn run_on_compressed(options: &Options) -> Result<()> {
    let bytes = std::fs::read(&options.input_filename)
        .with_context(|| format!("cannot read '{}'", options.input_filename))?;
    let compressed = CompressedClip::from_bytes(&bytes)?;
    let context = DecompressionContext::new(&compressed)?;

    println!(
        "loaded compressed clip: {} bytes, {} bones, {} samples at {} Hz, {} segments",
        compressed.size(),
        context.header().num_bones,
        context.header().num_samples,
        context.header().sample_rate,
        context.header().num_segments
    );

    if options.profile_decompression {
        profile_decompression(&compressed)?;
    }
    Ok(())
}

fn regression_test(
    clip: &AnimationClip,
    skeleton: &RigidSkeleton,
    result: &acl::CompressionResult,
) -> Result<()> {
    let measurement = measure_compression_error(clip, skeleton, &result.compressed)?;
    let threshold = clip.error_threshold();

    if measurement.max_error <= threshold {
        println!(
            "regression test passed: max error {:.6} <= {threshold}",
            measurement.max_error
        );
        return Ok(());
    }

    // Locked bones were reported by the compressor and are accepted.
    let is_locked = result
        .stats
        .locked_bones
        .iter()
        .any(|locked| locked.bone_index == measurement.worst_bone);
    if is_locked {
        println!(
            "regression test passed with warning: bone '{}' is locked at error {:.6}",
            skeleton.bone(measurement.worst_bone).name,
            measurement.max_error
        );
        return Ok(());
    }

    anyhow::bail!(
        "regression test failed: bone '{}' error {:.6} > {threshold} at {:.3}s",
        skeleton.bone(measurement.worst_bone).name,
        measurement.max_error,
        measurement.worst_sample_time
    );
}

fn profile_decompression(compressed: &CompressedClip) -> Result<()> {
    let mut context = DecompressionContext::new(compressed)?;
    let num_bones = usize::from(context.num_bones());
    let duration = context.duration();
    let mut pose = vec![Transform::identity(); num_bones];

    const NUM_ITERATIONS: u32 = 1000;
    let start = Instant::now();
    for iteration in 0..NUM_ITERATIONS {
        let sample_time = duration * f64::from(iteration) / f64::from(NUM_ITERATIONS);
        context.seek(sample_time, RoundingPolicy::None);
        decompress_pose(&context, &mut pose);
    }
    let elapsed = start.elapsed();

    println!(
        "decompressed {NUM_ITERATIONS} poses ({num_bones} bones) in {:.2} ms ({:.2} us/pose)",
        elapsed.as_secs_f64() * 1000.0,
        elapsed.as_secs_f64() * 1.0e6 / f64::from(NUM_ITERATIONS)
    );
    Ok(())
}

/// Compress under every supported configuration and report one line per
/// config.
fn run_exhaustive(clip: &AnimationClip, skeleton: &RigidSkeleton) -> Result<()> {
    let rotation_formats = [
        RotationFormat::Quat128,
        RotationFormat::QuatDropW96,
        RotationFormat::QuatDropW48,
        RotationFormat::QuatDropW32,
        RotationFormat::QuatDropWVariable,
    ];
    let vector_formats = [
        VectorFormat::Vector3_96,
        VectorFormat::Vector3_48,
        VectorFormat::Vector3_32,
        VectorFormat::Vector3Variable,
    ];
    let range_reductions = [
        (RangeReductionFlags::NONE, false),
        (RangeReductionFlags::ALL_TRACKS, false),
        (RangeReductionFlags::ALL_TRACKS, true),
    ];

    let metric = ErrorMetric::for_additive_kind(clip.additive_base().map(|(kind, _)| kind));
    let mut num_configs = 0u32;

    for rotation_format in rotation_formats {
        for vector_format in vector_formats {
            for (range_reduction, segment_range_reduction) in range_reductions {
                let mut settings = CompressionSettings::raw();
                settings.rotation_format = rotation_format;
                settings.translation_format = vector_format;
                settings.scale_format = vector_format;
                settings.range_reduction = range_reduction;
                settings.segmenting = SegmentingSettings {
                    enabled: segment_range_reduction,
                    range_reduction: if segment_range_reduction {
                        range_reduction
                    } else {
                        RangeReductionFlags::NONE
                    },
                    ..SegmentingSettings::default()
                };
                settings.error_metric = metric;

                if settings.is_valid().is_err() {
                    continue;
                }

                let result = compress_clip(clip, skeleton, &settings)?;
                let measurement = measure_compression_error(clip, skeleton, &result.compressed)?;
                println!(
                    "{:<20} {:<18} rr={:<40} segments={:<3} size={:<8} error={:.6}",
                    rotation_format.name(),
                    vector_format.name(),
                    format!(
                        "{}{}",
                        range_reduction,
                        if segment_range_reduction { "+segment" } else { "" }
                    ),
                    result.stats.num_segments,
                    result.stats.compressed_size,
                    measurement.max_error
                );
                num_configs += 1;
            }
        }
    }

    println!("swept {num_configs} configurations");
    Ok(())
}
