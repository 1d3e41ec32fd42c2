//! E2E Test Suite: compression pipeline scenarios.
//!
//! Exercises the full compress path end to end over small hand-built
//! clips: default/constant collapsing, accuracy of rotating hierarchies,
//! segment layout, and serialization determinism.

use acl::{
    compress_clip, decompress_pose, AnimationClip, BoneTracks, CompressionSettings,
    DecompressionContext, Quat, RigidBone, RigidSkeleton, RoundingPolicy, Transform, Vec3,
};

fn decompress_at(
    compressed: &acl::CompressedClip,
    sample_time: f64,
    num_bones: u16,
) -> Vec<Transform> {
    let mut context = DecompressionContext::new(compressed).unwrap();
    context.seek(sample_time, RoundingPolicy::None);
    let mut pose = vec![Transform::identity(); usize::from(num_bones)];
    decompress_pose(&context, &mut pose);
    pose
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: a single identity bone collapses to default tracks
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn identity_bone_compresses_to_defaults_only() {
    let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
    let clip = AnimationClip::new(
        &skeleton,
        "identity",
        60,
        30,
        0.01,
        vec![BoneTracks::identity(60)],
    )
    .unwrap();

    let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();

    // Headers and two one-word bitsets; no constant pool, ranges, or
    // animated data.
    assert!(
        result.stats.compressed_size <= 128,
        "expected a near-empty buffer, got {} bytes",
        result.stats.compressed_size
    );
    assert_eq!(result.stats.num_animated_tracks, 0);
    assert_eq!(result.stats.num_default_tracks, 2);

    for sample_time in [0.0, 0.5, 1.0, 1.9666, 100.0] {
        let pose = decompress_at(&result.compressed, sample_time, 1);
        assert_eq!(pose[0].rotation, Quat::identity());
        assert_eq!(pose[0].translation, Vec3::zero());
        assert_eq!(pose[0].scale, Vec3::one());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: rotating parent, offset child, object-space accuracy
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn rotating_parent_keeps_child_within_threshold() {
    let mut root = RigidBone::root("root");
    root.vertex_distance = 1.0;
    let mut child = RigidBone::child_of("child", 0);
    child.vertex_distance = 1.0;
    let skeleton = RigidSkeleton::new(vec![root, child]).unwrap();

    // The parent sweeps Y at 90 degrees per second; the child sits one
    // unit down the parent's Z axis.
    let num_samples = 30u32;
    let mut parent_tracks = BoneTracks::identity(num_samples as usize);
    for (sample_index, rotation) in parent_tracks.rotations.iter_mut().enumerate() {
        let angle = sample_index as f64 / 30.0 * std::f64::consts::FRAC_PI_2;
        *rotation = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), angle);
    }
    let mut child_tracks = BoneTracks::identity(num_samples as usize);
    for translation in &mut child_tracks.translations {
        *translation = Vec3::new(0.0, 0.0, 1.0);
    }

    let clip = AnimationClip::new(
        &skeleton,
        "sweep",
        num_samples,
        30,
        0.01,
        vec![parent_tracks, child_tracks],
    )
    .unwrap();

    let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();
    assert!(result.stats.locked_bones.is_empty());

    // At 0.5 s the parent sits at exactly 45 degrees (sample 15).
    let pose = decompress_at(&result.compressed, 0.5, 2);

    let expected_parent =
        Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), std::f64::consts::FRAC_PI_4);
    assert!(
        Quat::angle_between(pose[0].rotation, expected_parent) < 0.01,
        "parent rotation drifted"
    );

    // Child object-space position: parent rotation applied to (0, 0, 1).
    let object_position = pose[0].rotation.rotate(pose[1].translation);
    let angle = std::f64::consts::FRAC_PI_4;
    let expected_position = Vec3::new(angle.sin(), 0.0, angle.cos());
    assert!(
        object_position.distance(expected_position) < 0.01,
        "child object position drifted: {object_position:?} vs {expected_position:?}"
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: 64 samples split into four segments of 16
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn sixty_four_samples_serialize_four_segments() {
    let skeleton = RigidSkeleton::new(vec![
        RigidBone::root("a"),
        RigidBone::child_of("b", 0),
        RigidBone::child_of("c", 1),
    ])
    .unwrap();

    let num_samples = 64u32;
    let mut bones = Vec::new();
    for bone_index in 0..3 {
        let mut tracks = BoneTracks::identity(num_samples as usize);
        for (sample_index, translation) in tracks.translations.iter_mut().enumerate() {
            *translation = Vec3::new(
                (sample_index as f64 * 0.01) + bone_index as f64,
                0.0,
                0.0,
            );
        }
        bones.push(tracks);
    }
    let clip = AnimationClip::new(&skeleton, "long", num_samples, 30, 0.01, bones).unwrap();

    let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();
    let context = DecompressionContext::new(&result.compressed).unwrap();

    assert_eq!(context.header().num_segments, 4);
    assert_eq!(context.header().num_samples, 64);

    // Every sample decodes to within the threshold of the raw values.
    for sample_index in 0..num_samples {
        let sample_time = f64::from(sample_index) / 30.0;
        let pose = decompress_at(&result.compressed, sample_time, 3);
        for (bone_index, transform) in pose.iter().enumerate() {
            let expected = (f64::from(sample_index) * 0.01) + bone_index as f64;
            assert!(
                (transform.translation.x - expected).abs() < 0.011,
                "sample {sample_index} bone {bone_index}"
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: an all-constant clip has no animated data
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn constant_clip_compacts_losslessly() {
    let skeleton = RigidSkeleton::new(vec![
        RigidBone::root("root"),
        RigidBone::child_of("arm", 0),
    ])
    .unwrap();

    let rotation = Quat::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), 0.25);
    let translation = Vec3::new(0.5, 1.25, -2.0);
    let num_samples = 40usize;

    let root_tracks = BoneTracks::identity(num_samples);
    let arm_tracks = BoneTracks {
        rotations: vec![rotation; num_samples],
        translations: vec![translation; num_samples],
        scales: vec![Vec3::one(); num_samples],
    };
    let clip = AnimationClip::new(
        &skeleton,
        "still",
        num_samples as u32,
        30,
        0.01,
        vec![root_tracks, arm_tracks],
    )
    .unwrap();

    let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();

    // Every track is constant: nothing animated survives.
    assert_eq!(result.stats.num_animated_tracks, 0);
    assert_eq!(
        result.stats.num_constant_tracks + result.stats.num_default_tracks,
        4
    );

    // Constant samples decode exactly (through the f32 pool width).
    let pose = decompress_at(&result.compressed, 0.7, 2);
    assert!(Quat::angle_between(pose[1].rotation, rotation) < 1.0e-6);
    let expected = Vec3::new(
        f64::from(translation.x as f32),
        f64::from(translation.y as f32),
        f64::from(translation.z as f32),
    );
    assert_eq!(pose[1].translation, expected);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: serialization is idempotent
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn identical_inputs_produce_identical_buffers() {
    let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
    let mut tracks = BoneTracks::identity(50);
    for (sample_index, rotation) in tracks.rotations.iter_mut().enumerate() {
        *rotation = Quat::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.03 * sample_index as f64);
    }
    let make_clip = || {
        AnimationClip::new(&skeleton, "repeat", 50, 30, 0.005, vec![tracks.clone()]).unwrap()
    };

    let settings = CompressionSettings::default();
    let first = compress_clip(&make_clip(), &skeleton, &settings).unwrap();
    let second = compress_clip(&make_clip(), &skeleton, &settings).unwrap();

    assert_eq!(first.compressed.as_slice(), second.compressed.as_slice());
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 6: scale tracks survive the round trip
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn animated_scale_roundtrips() {
    let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
    let num_samples = 20usize;
    let mut tracks = BoneTracks::identity(num_samples);
    for (sample_index, scale) in tracks.scales.iter_mut().enumerate() {
        let s = 1.0 + 0.05 * sample_index as f64;
        *scale = Vec3::new(s, s, 1.0);
    }
    let clip = AnimationClip::new(
        &skeleton,
        "grow",
        num_samples as u32,
        30,
        0.01,
        vec![tracks],
    )
    .unwrap();

    let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();

    for sample_index in 0..num_samples {
        let sample_time = sample_index as f64 / 30.0;
        let pose = decompress_at(&result.compressed, sample_time, 1);
        let expected = 1.0 + 0.05 * sample_index as f64;
        assert!(
            (pose[0].scale.x - expected).abs() < 0.011,
            "sample {sample_index}: {} vs {expected}",
            pose[0].scale.x
        );
        assert!((pose[0].scale.z - 1.0).abs() < 0.011);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 7: additive delta clips compress against their base
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn additive_delta_clip_roundtrips() {
    use acl::{AdditiveKind, ErrorMetric};

    let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
    let num_samples = 24usize;

    // The base holds a fixed offset; the delta animates on top of it.
    let mut base_tracks = BoneTracks::identity(num_samples);
    for translation in &mut base_tracks.translations {
        *translation = Vec3::new(1.0, 0.0, 0.0);
    }
    let base = AnimationClip::new(
        &skeleton,
        "base",
        num_samples as u32,
        30,
        0.01,
        vec![base_tracks],
    )
    .unwrap();

    let mut delta_tracks = BoneTracks::identity(num_samples);
    for (sample_index, translation) in delta_tracks.translations.iter_mut().enumerate() {
        *translation = Vec3::new(0.0, 0.01 * sample_index as f64, 0.0);
    }
    let mut delta = AnimationClip::new(
        &skeleton,
        "delta",
        num_samples as u32,
        30,
        0.01,
        vec![delta_tracks],
    )
    .unwrap();
    delta.set_additive_base(AdditiveKind::Additive0, base);

    let mut settings = CompressionSettings::default();
    settings.error_metric = ErrorMetric::Additive(AdditiveKind::Additive0);
    let result = compress_clip(&delta, &skeleton, &settings).unwrap();

    // The combined (base + delta) error stays within the threshold.
    let measurement =
        acl::stats::measure_compression_error(&delta, &skeleton, &result.compressed).unwrap();
    assert!(measurement.max_error <= delta.error_threshold() + 1.0e-6);

    // The decoder returns the delta domain; the runtime combines.
    let pose = decompress_at(&result.compressed, 10.0 / 30.0, 1);
    assert!((pose[0].translation.y - 0.1).abs() < 0.011);
    assert!(pose[0].translation.x.abs() < 0.011);

    // A mismatched metric is rejected up front.
    let err = compress_clip(&delta, &skeleton, &CompressionSettings::default()).unwrap_err();
    assert_eq!(err.name(), "InvalidConfig");
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 8: every compression level produces a decodable buffer
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn all_levels_roundtrip_within_threshold() {
    use acl::CompressionLevel;

    let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
    let num_samples = 48u32;
    let mut tracks = BoneTracks::identity(num_samples as usize);
    for (sample_index, rotation) in tracks.rotations.iter_mut().enumerate() {
        *rotation = Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 0.02 * sample_index as f64);
    }
    for (sample_index, translation) in tracks.translations.iter_mut().enumerate() {
        *translation = Vec3::new(0.0, 0.02 * sample_index as f64, 0.0);
    }
    let clip =
        AnimationClip::new(&skeleton, "levels", num_samples, 30, 0.01, vec![tracks]).unwrap();

    for level in [
        CompressionLevel::Lowest,
        CompressionLevel::Low,
        CompressionLevel::Medium,
        CompressionLevel::High,
        CompressionLevel::Highest,
    ] {
        let settings = CompressionSettings::with_level(level);
        let result = compress_clip(&clip, &skeleton, &settings).unwrap();
        let measurement =
            acl::stats::measure_compression_error(&clip, &skeleton, &result.compressed).unwrap();
        assert!(
            measurement.max_error <= clip.error_threshold() + 1.0e-6,
            "{}: error {}",
            level.name(),
            measurement.max_error
        );
    }
}
