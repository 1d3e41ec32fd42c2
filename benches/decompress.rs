//! Pose decompression throughput.
//!
//! Builds a synthetic multi-bone clip, compresses it with the default
//! settings, and measures full-pose and single-bone sampling.

use acl::{
    compress_clip, decompress_bone, decompress_pose, AnimationClip, BoneTracks,
    CompressionSettings, DecompressionContext, Quat, RigidBone, RigidSkeleton, RoundingPolicy,
    Transform, Vec3,
};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn synthetic_clip(num_bones: u16, num_samples: u32) -> (RigidSkeleton, AnimationClip) {
    let mut bones = vec![RigidBone::root("bone_0")];
    for bone_index in 1..num_bones {
        bones.push(RigidBone::child_of(
            format!("bone_{bone_index}"),
            bone_index - 1,
        ));
    }
    let skeleton = RigidSkeleton::new(bones).unwrap();

    let mut tracks = Vec::new();
    for bone_index in 0..num_bones {
        let mut bone_tracks = BoneTracks::identity(num_samples as usize);
        for sample_index in 0..num_samples as usize {
            let phase = sample_index as f64 * 0.07 + f64::from(bone_index) * 0.3;
            bone_tracks.rotations[sample_index] =
                Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), phase.sin() * 0.6);
            bone_tracks.translations[sample_index] = Vec3::new(0.0, 0.1, phase.cos() * 0.05);
        }
        tracks.push(bone_tracks);
    }

    let clip = AnimationClip::new(&skeleton, "bench", num_samples, 30, 0.01, tracks).unwrap();
    (skeleton, clip)
}

fn bench_decompress_pose(c: &mut Criterion) {
    let mut group = c.benchmark_group("decompress_pose");

    for &num_bones in &[16u16, 64] {
        let (skeleton, clip) = synthetic_clip(num_bones, 120);
        let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();
        let mut context = DecompressionContext::new(&result.compressed).unwrap();
        let mut pose = vec![Transform::identity(); usize::from(num_bones)];
        let duration = clip.duration();

        group.bench_with_input(
            BenchmarkId::from_parameter(num_bones),
            &num_bones,
            |b, _| {
                let mut step = 0u32;
                b.iter(|| {
                    let sample_time = duration * f64::from(step % 100) / 100.0;
                    step += 1;
                    context.seek(sample_time, RoundingPolicy::None);
                    decompress_pose(&context, &mut pose);
                });
            },
        );
    }

    group.finish();
}

fn bench_decompress_bone(c: &mut Criterion) {
    let (skeleton, clip) = synthetic_clip(64, 120);
    let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();
    let mut context = DecompressionContext::new(&result.compressed).unwrap();
    context.seek(clip.duration() * 0.5, RoundingPolicy::None);

    c.bench_function("decompress_bone/last_of_64", |b| {
        let mut rotation = Quat::identity();
        let mut translation = Vec3::zero();
        b.iter(|| {
            decompress_bone(&context, 63, Some(&mut rotation), Some(&mut translation), None);
        });
    });
}

criterion_group!(benches, bench_decompress_pose, bench_decompress_bone);
criterion_main!(benches);
