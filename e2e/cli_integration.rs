//! E2E Test Suite: `aclc` command-line integration.
//!
//! Drives the real binary over a temp directory and checks exit codes and
//! produced files.

use std::path::Path;
use std::process::Command;

fn aclc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_aclc"))
}

fn write_fixture_clip(dir: &Path) -> std::path::PathBuf {
    use acl::{AnimationClip, BoneTracks, Quat, RigidBone, RigidSkeleton, Vec3};

    let skeleton = RigidSkeleton::new(vec![RigidBone::root("root")]).unwrap();
    let num_samples = 32usize;
    let mut tracks = BoneTracks::identity(num_samples);
    for (sample_index, rotation) in tracks.rotations.iter_mut().enumerate() {
        *rotation = Quat::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), 0.05 * sample_index as f64);
    }
    let clip = AnimationClip::new(
        &skeleton,
        "cli_fixture",
        num_samples as u32,
        30,
        0.01,
        vec![tracks],
    )
    .unwrap();

    let path = dir.join("fixture.acl.sjson");
    acl::io::write_clip_file(&path, &skeleton, &clip).unwrap();
    path
}

#[test]
fn compress_test_and_emit_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let clip_path = write_fixture_clip(dir.path());
    let out_path = dir.path().join("fixture.acl.bin");
    let stats_path = dir.path().join("stats.json");

    let status = aclc()
        .arg(format!("-acl={}", clip_path.display()))
        .arg(format!("-out={}", out_path.display()))
        .arg(format!("-stats={}", stats_path.display()))
        .arg("-test")
        .status()
        .expect("failed to launch aclc");
    assert!(status.success());

    // The compressed buffer is adoptable and the stats parse.
    let bytes = std::fs::read(&out_path).unwrap();
    acl::CompressedClip::from_bytes(&bytes).unwrap();

    let stats: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&stats_path).unwrap()).unwrap();
    assert_eq!(stats["clip_name"], "cli_fixture");
    assert!(stats["max_error"].as_f64().unwrap() <= 0.01);
}

#[test]
fn compressed_inputs_are_described_and_profiled() {
    let dir = tempfile::tempdir().unwrap();
    let clip_path = write_fixture_clip(dir.path());
    let out_path = dir.path().join("fixture.acl.bin");

    let status = aclc()
        .arg(format!("-acl={}", clip_path.display()))
        .arg(format!("-out={}", out_path.display()))
        .status()
        .unwrap();
    assert!(status.success());

    let status = aclc()
        .arg(format!("-acl={}", out_path.display()))
        .arg("-decomp")
        .status()
        .unwrap();
    assert!(status.success());
}

#[test]
fn failures_exit_nonzero() {
    // No input at all.
    let status = aclc().status().unwrap();
    assert!(!status.success());

    // Missing file.
    let status = aclc().arg("-acl=/nonexistent.acl.sjson").status().unwrap();
    assert!(!status.success());

    // Unknown option.
    let dir = tempfile::tempdir().unwrap();
    let clip_path = write_fixture_clip(dir.path());
    let status = aclc()
        .arg(format!("-acl={}", clip_path.display()))
        .arg("-bogus")
        .status()
        .unwrap();
    assert!(!status.success());
}

#[test]
fn exhaustive_sweep_runs() {
    let dir = tempfile::tempdir().unwrap();
    let clip_path = write_fixture_clip(dir.path());

    let output = aclc()
        .arg(format!("-acl={}", clip_path.display()))
        .arg("-exhaustive")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("swept"));
}
