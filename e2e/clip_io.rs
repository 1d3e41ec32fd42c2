//! E2E Test Suite: clip file round trips.

use acl::io::{read_clip_file, write_clip_file};
use acl::{AdditiveKind, AnimationClip, BoneTracks, Quat, RigidBone, RigidSkeleton, Vec3};

fn fixture() -> (RigidSkeleton, AnimationClip) {
    let mut root = RigidBone::root("root");
    root.vertex_distance = 3.0;
    let mut arm = RigidBone::child_of("arm", 0);
    arm.vertex_distance = 1.5;
    arm.bind_translation = Vec3::new(0.0, 1.0, 0.0);
    let skeleton = RigidSkeleton::new(vec![root, arm]).unwrap();

    let num_samples = 8usize;
    let mut arm_tracks = BoneTracks::identity(num_samples);
    for (sample_index, rotation) in arm_tracks.rotations.iter_mut().enumerate() {
        *rotation = Quat::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), 0.1 * sample_index as f64);
    }
    let clip = AnimationClip::new(
        &skeleton,
        "swing",
        num_samples as u32,
        24,
        0.02,
        vec![BoneTracks::identity(num_samples), arm_tracks],
    )
    .unwrap();
    (skeleton, clip)
}

#[test]
fn file_roundtrip_preserves_everything() {
    let (skeleton, clip) = fixture();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("swing.acl.sjson");
    write_clip_file(&path, &skeleton, &clip).unwrap();

    let (skeleton2, clip2) = read_clip_file(&path).unwrap();

    assert_eq!(skeleton2.num_bones(), skeleton.num_bones());
    assert_eq!(skeleton2.bone(1).name, "arm");
    assert_eq!(skeleton2.bone(1).vertex_distance, 1.5);
    assert_eq!(clip2.name(), clip.name());
    assert_eq!(clip2.num_samples(), clip.num_samples());
    assert_eq!(clip2.sample_rate(), clip.sample_rate());
    assert_eq!(clip2.error_threshold(), clip.error_threshold());
    for sample_index in 0..clip.num_samples() as usize {
        assert_eq!(
            clip2.bone(1).rotations[sample_index],
            clip.bone(1).rotations[sample_index]
        );
    }
}

#[test]
fn additive_clips_roundtrip_with_their_base() {
    let (skeleton, mut clip) = fixture();
    let base = AnimationClip::new(
        &skeleton,
        "swing_base",
        4,
        24,
        0.02,
        vec![BoneTracks::identity(4), BoneTracks::identity(4)],
    )
    .unwrap();
    clip.set_additive_base(AdditiveKind::Additive0, base);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("delta.acl.sjson");
    write_clip_file(&path, &skeleton, &clip).unwrap();

    let (_, clip2) = read_clip_file(&path).unwrap();
    let (kind, base2) = clip2.additive_base().expect("additive base survived");
    assert_eq!(kind, AdditiveKind::Additive0);
    assert_eq!(base2.num_samples(), 4);
}

#[test]
fn missing_files_and_garbage_report_errors() {
    let err = read_clip_file(std::path::Path::new("/nonexistent/clip.acl.sjson")).unwrap_err();
    assert_eq!(err.name(), "Truncated");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.acl.sjson");
    std::fs::write(&path, "{ not json").unwrap();
    let err = read_clip_file(&path).unwrap_err();
    assert_eq!(err.name(), "Truncated");
}
