//! E2E Test Suite: decoder behavior.
//!
//! Determinism, single-bone decoding, rounding policies, the quaternion
//! double-cover fold, the error-bound guarantee, and what the CRC seal
//! does and does not protect against.

use acl::core::headers::{ClipHeader, SegmentHeader, INVALID_OFFSET};
use acl::{
    compress_clip, decompress_bone, decompress_pose, AnimationClip, BoneTracks, CompressedClip,
    CompressionSettings, DecompressionContext, Quat, RigidBone, RigidSkeleton, RoundingPolicy,
    Transform, Vec3,
};

fn wiggly_clip(num_samples: u32) -> (RigidSkeleton, AnimationClip) {
    let skeleton = RigidSkeleton::new(vec![
        RigidBone::root("root"),
        RigidBone::child_of("mid", 0),
        RigidBone::child_of("tip", 1),
    ])
    .unwrap();

    let mut bones = Vec::new();
    for bone_index in 0..3u32 {
        let mut tracks = BoneTracks::identity(num_samples as usize);
        for sample_index in 0..num_samples as usize {
            let phase = sample_index as f64 * 0.1 + f64::from(bone_index);
            tracks.rotations[sample_index] =
                Quat::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), phase.sin() * 0.5);
            tracks.translations[sample_index] =
                Vec3::new(phase.cos() * 0.25, f64::from(bone_index), 0.0);
        }
        bones.push(tracks);
    }
    let clip = AnimationClip::new(&skeleton, "wiggle", num_samples, 30, 0.01, bones).unwrap();
    (skeleton, clip)
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: two contexts over one buffer decode bit-identically
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn decoding_is_deterministic_across_contexts() {
    let (skeleton, clip) = wiggly_clip(64);
    let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();

    let mut context_a = DecompressionContext::new(&result.compressed).unwrap();
    let mut context_b = DecompressionContext::new(&result.compressed).unwrap();

    let mut pose_a = vec![Transform::identity(); 3];
    let mut pose_b = vec![Transform::identity(); 3];

    for step in 0..50 {
        let sample_time = f64::from(step) * 0.04;
        context_a.seek(sample_time, RoundingPolicy::None);
        context_b.seek(sample_time, RoundingPolicy::None);
        decompress_pose(&context_a, &mut pose_a);
        decompress_pose(&context_b, &mut pose_b);
        assert_eq!(pose_a, pose_b, "poses diverged at {sample_time}");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: single-bone decode matches the full pose
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn decompress_bone_matches_decompress_pose() {
    let (skeleton, clip) = wiggly_clip(40);
    let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();

    let mut context = DecompressionContext::new(&result.compressed).unwrap();
    context.seek(0.63, RoundingPolicy::None);

    let mut pose = vec![Transform::identity(); 3];
    decompress_pose(&context, &mut pose);

    for bone_index in 0..3u16 {
        let mut rotation = Quat::identity();
        let mut translation = Vec3::zero();
        let mut scale = Vec3::zero();
        decompress_bone(
            &context,
            bone_index,
            Some(&mut rotation),
            Some(&mut translation),
            Some(&mut scale),
        );

        assert_eq!(rotation, pose[usize::from(bone_index)].rotation);
        assert_eq!(translation, pose[usize::from(bone_index)].translation);
        assert_eq!(scale, pose[usize::from(bone_index)].scale);
    }

    // Channel-selective decode leaves the other outputs untouched.
    let mut translation_only = Vec3::zero();
    decompress_bone(&context, 2, None, Some(&mut translation_only), None);
    assert_eq!(translation_only, pose[2].translation);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: rounding policies
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn rounding_policies_pick_the_expected_keys() {
    let (skeleton, clip) = wiggly_clip(31);
    let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();
    let mut context = DecompressionContext::new(&result.compressed).unwrap();
    let mut pose = vec![Transform::identity(); 3];

    let mut at = |sample_time: f64, rounding: RoundingPolicy| {
        context.seek(sample_time, rounding);
        decompress_pose(&context, &mut pose);
        pose[1].translation
    };

    // Three quarters of the way from sample 10 to sample 11.
    let sample_time = 10.75 / 30.0;
    let floor = at(sample_time, RoundingPolicy::Floor);
    let ceiling = at(sample_time, RoundingPolicy::Ceiling);
    let nearest = at(sample_time, RoundingPolicy::Nearest);
    let exact10 = at(10.0 / 30.0, RoundingPolicy::Nearest);
    let exact11 = at(11.0 / 30.0, RoundingPolicy::Nearest);
    let blended = at(sample_time, RoundingPolicy::None);

    assert_eq!(floor, exact10);
    assert_eq!(ceiling, exact11);
    assert_eq!(nearest, exact11);
    assert!(blended.x != floor.x || blended.x != ceiling.x);
    // The blend sits between its endpoints.
    let (low, high) = if floor.x <= ceiling.x {
        (floor.x, ceiling.x)
    } else {
        (ceiling.x, floor.x)
    };
    assert!(blended.x >= low - 1.0e-9 && blended.x <= high + 1.0e-9);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: double-cover rotations decode to the same orientation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn double_cover_boundary_rotations_survive() {
    let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();

    // Alternating q and -q: the same orientation under both signs.
    let q = Quat::from_axis_angle(Vec3::new(0.3, 0.9, 0.1).scale(1.0 / 0.9539392014169456), 2.5);
    let num_samples = 16usize;
    let mut tracks = BoneTracks::identity(num_samples);
    for (sample_index, rotation) in tracks.rotations.iter_mut().enumerate() {
        *rotation = if sample_index % 2 == 0 { q } else { q.neg() };
    }
    let clip = AnimationClip::new(
        &skeleton,
        "cover",
        num_samples as u32,
        30,
        0.01,
        vec![tracks],
    )
    .unwrap();

    let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();

    let mut context = DecompressionContext::new(&result.compressed).unwrap();
    let mut pose = vec![Transform::identity(); 1];
    for sample_index in 0..num_samples {
        context.seek(sample_index as f64 / 30.0, RoundingPolicy::Nearest);
        decompress_pose(&context, &mut pose);
        assert!(
            Quat::angle_between(pose[0].rotation, q) < 1.0e-6,
            "sample {sample_index} decoded off-orientation"
        );
        assert!(pose[0].rotation.w >= 0.0, "decoded rotation left the positive cover");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: error bound over every sample time
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn error_stays_within_threshold_at_all_times() {
    let (skeleton, clip) = wiggly_clip(96);
    let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();
    assert!(result.stats.locked_bones.is_empty());

    let measurement =
        acl::stats::measure_compression_error(&clip, &skeleton, &result.compressed).unwrap();
    assert!(
        measurement.max_error <= clip.error_threshold() + 1.0e-6,
        "max error {} at {}s",
        measurement.max_error,
        measurement.worst_sample_time
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 6: corruption: the seal catches flips, a re-sealed buffer does not
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn tampered_buffers_are_rejected_unless_resealed() {
    let (skeleton, clip) = wiggly_clip(48);
    let result = compress_clip(&clip, &skeleton, &CompressionSettings::default()).unwrap();
    let original = result.compressed.as_slice().to_vec();

    // Locate the first segment's animated data through the headers.
    let payload = &original[16..];
    let clip_header = ClipHeader::read_from(payload).unwrap();
    let segment_header = SegmentHeader::read_from(
        payload,
        clip_header.segment_headers_offset as usize,
    )
    .unwrap();
    assert_ne!(segment_header.track_data_offset, INVALID_OFFSET);

    let flip_index = 16 + segment_header.track_data_offset as usize;
    let mut tampered = original.clone();
    tampered[flip_index] ^= 0x80;

    // Without fixing the seal, adoption fails.
    assert!(CompressedClip::from_bytes(&tampered).is_err());

    // Re-seal: the CRC covers bytes 8..end.
    let crc = acl::hash::crc32(&tampered[8..]);
    tampered[4..8].copy_from_slice(&crc.to_le_bytes());
    let adopted = CompressedClip::from_bytes(&tampered).unwrap();

    // The decoder accepts the buffer; the flipped bit shows up as a
    // different first frame. Validation bounds corruption detection at the
    // seal, nothing deeper.
    let mut context = DecompressionContext::new(&adopted).unwrap();
    context.seek(0.0, RoundingPolicy::Nearest);
    let mut tampered_pose = vec![Transform::identity(); 3];
    decompress_pose(&context, &mut tampered_pose);

    let pristine = CompressedClip::from_bytes(&original).unwrap();
    let mut context = DecompressionContext::new(&pristine).unwrap();
    context.seek(0.0, RoundingPolicy::Nearest);
    let mut original_pose = vec![Transform::identity(); 3];
    decompress_pose(&context, &mut original_pose);

    assert_ne!(tampered_pose, original_pose);
}
