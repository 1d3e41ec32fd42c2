//! Clip file reader: JSON document → skeleton + clip.

use crate::compression::clip::{AdditiveKind, AnimationClip, BoneTracks};
use crate::compression::skeleton::{RigidBone, RigidSkeleton};
use crate::core::error::{Error, Result};
use crate::io::{ClipDocument, TrackDocument, CLIP_FILE_VERSION};
use crate::math::{Quat, Vec3};
use std::path::Path;

/// Read a clip file from disk.
pub fn read_clip_file(path: &Path) -> Result<(RigidSkeleton, AnimationClip)> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| Error::Truncated(format!("cannot read '{}': {err}", path.display())))?;
    read_clip_str(&text)
}

/// Parse a clip document from a string.
pub fn read_clip_str(text: &str) -> Result<(RigidSkeleton, AnimationClip)> {
    // serde_json reports the line and column of the failure.
    let document: ClipDocument =
        serde_json::from_str(text).map_err(|err| Error::Truncated(err.to_string()))?;

    if document.version != CLIP_FILE_VERSION {
        return Err(Error::InvalidInput(format!(
            "unsupported clip file version: {}",
            document.version
        )));
    }

    let skeleton = build_skeleton(&document)?;
    let clip = build_clip(&document, &skeleton)?;
    Ok((skeleton, clip))
}

fn build_skeleton(document: &ClipDocument) -> Result<RigidSkeleton> {
    let mut bones = Vec::with_capacity(document.bones.len());
    for bone_document in &document.bones {
        let parent_index = if bone_document.parent.is_empty() {
            None
        } else {
            let index = bones
                .iter()
                .position(|bone: &RigidBone| bone.name == bone_document.parent)
                .ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "bone '{}' references parent '{}' which does not precede it",
                        bone_document.name, bone_document.parent
                    ))
                })?;
            Some(index as u16)
        };

        let [x, y, z, w] = bone_document.bind_rotation;
        let [tx, ty, tz] = bone_document.bind_translation;
        bones.push(RigidBone {
            name: bone_document.name.clone(),
            parent_index,
            bind_rotation: Quat::new(x, y, z, w),
            bind_translation: Vec3::new(tx, ty, tz),
            vertex_distance: bone_document.vertex_distance,
        });
    }
    RigidSkeleton::new(bones)
}

fn build_tracks(
    track_documents: &[TrackDocument],
    skeleton: &RigidSkeleton,
    num_samples: u32,
) -> Result<Vec<BoneTracks>> {
    let mut tracks = vec![BoneTracks::identity(num_samples as usize); skeleton.bones().len()];

    for track_document in track_documents {
        let bone_index = skeleton.find_bone(&track_document.name).ok_or_else(|| {
            Error::InvalidInput(format!(
                "track '{}' does not match any bone",
                track_document.name
            ))
        })?;

        let bone_tracks = &mut tracks[usize::from(bone_index)];
        bone_tracks.rotations = track_document
            .rotations
            .iter()
            .map(|&[x, y, z, w]| Quat::new(x, y, z, w))
            .collect();
        bone_tracks.translations = track_document
            .translations
            .iter()
            .map(|&[x, y, z]| Vec3::new(x, y, z))
            .collect();
        if !track_document.scales.is_empty() {
            bone_tracks.scales = track_document
                .scales
                .iter()
                .map(|&[x, y, z]| Vec3::new(x, y, z))
                .collect();
        }
    }

    Ok(tracks)
}

fn build_clip(document: &ClipDocument, skeleton: &RigidSkeleton) -> Result<AnimationClip> {
    let header = &document.clip;
    let tracks = build_tracks(&document.tracks, skeleton, header.num_samples)?;
    let mut clip = AnimationClip::new(
        skeleton,
        header.name.clone(),
        header.num_samples,
        header.sample_rate,
        header.error_threshold,
        tracks,
    )?;

    if let Some(additive) = &document.additive {
        let kind = AdditiveKind::from_name(&additive.format).ok_or_else(|| {
            Error::InvalidInput(format!("unknown additive format: '{}'", additive.format))
        })?;
        let base_tracks = build_tracks(&additive.tracks, skeleton, additive.num_samples)?;
        let base_clip = AnimationClip::new(
            skeleton,
            format!("{}_base", header.name),
            additive.num_samples,
            additive.sample_rate,
            header.error_threshold,
            base_tracks,
        )?;
        clip.set_additive_base(kind, base_clip);
    }

    Ok(clip)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_CLIP: &str = r#"{
        "version": 1,
        "clip": {
            "name": "wave",
            "num_samples": 2,
            "sample_rate": 30,
            "error_threshold": 0.01
        },
        "bones": [
            {"name": "root", "vertex_distance": 3.0},
            {"name": "hand", "parent": "root", "vertex_distance": 1.0,
             "bind_translation": [0.0, 1.0, 0.0]}
        ],
        "tracks": [
            {"name": "hand",
             "rotations": [[0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0, 1.0]],
             "translations": [[0.0, 1.0, 0.0], [0.0, 1.5, 0.0]]}
        ]
    }"#;

    #[test]
    fn reads_a_minimal_document() {
        let (skeleton, clip) = read_clip_str(MINIMAL_CLIP).unwrap();

        assert_eq!(skeleton.num_bones(), 2);
        assert_eq!(skeleton.bone(1).parent_index, Some(0));
        assert_eq!(skeleton.bone(0).vertex_distance, 3.0);

        assert_eq!(clip.name(), "wave");
        assert_eq!(clip.num_samples(), 2);
        // The untracked root holds the neutral transform.
        assert_eq!(clip.bone(0).translations[0], Vec3::zero());
        assert_eq!(clip.bone(1).translations[1], Vec3::new(0.0, 1.5, 0.0));
    }

    #[test]
    fn truncated_documents_report_position() {
        let err = read_clip_str(&MINIMAL_CLIP[..60]).unwrap_err();
        assert_eq!(err.name(), "Truncated");
        // serde_json embeds "line N column M" in the message.
        assert!(err.to_string().contains("line"));
    }

    #[test]
    fn forward_parent_references_are_rejected() {
        let document = MINIMAL_CLIP.replace(
            r#"{"name": "root", "vertex_distance": 3.0}"#,
            r#"{"name": "root", "parent": "hand", "vertex_distance": 3.0}"#,
        );
        let err = read_clip_str(&document).unwrap_err();
        assert_eq!(err.name(), "InvalidInput");
    }

    #[test]
    fn unknown_additive_format_is_rejected() {
        let document = MINIMAL_CLIP.replace(
            r#""tracks": ["#,
            r#""additive": {"format": "banana", "num_samples": 2, "sample_rate": 30, "tracks": []},
               "tracks": ["#,
        );
        let err = read_clip_str(&document).unwrap_err();
        assert!(err.to_string().contains("additive"));
    }
}
