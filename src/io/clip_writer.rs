//! Clip file writer: skeleton + clip → JSON document.

use crate::compression::clip::AnimationClip;
use crate::compression::skeleton::RigidSkeleton;
use crate::core::error::{Error, Result};
use crate::io::{
    AdditiveDocument, BoneDocument, ClipDocument, ClipHeaderDocument, TrackDocument,
    CLIP_FILE_VERSION,
};
use std::path::Path;

/// Persist a clip document to disk.
pub fn write_clip_file(path: &Path, skeleton: &RigidSkeleton, clip: &AnimationClip) -> Result<()> {
    let text = write_clip_str(skeleton, clip)?;
    std::fs::write(path, text)
        .map_err(|err| Error::InvalidInput(format!("cannot write '{}': {err}", path.display())))
}

/// Render a clip document as a JSON string.
pub fn write_clip_str(skeleton: &RigidSkeleton, clip: &AnimationClip) -> Result<String> {
    let bones = skeleton
        .bones()
        .iter()
        .map(|bone| BoneDocument {
            name: bone.name.clone(),
            parent: bone
                .parent_index
                .map(|parent_index| skeleton.bone(parent_index).name.clone())
                .unwrap_or_default(),
            vertex_distance: bone.vertex_distance,
            bind_rotation: [
                bone.bind_rotation.x,
                bone.bind_rotation.y,
                bone.bind_rotation.z,
                bone.bind_rotation.w,
            ],
            bind_translation: [
                bone.bind_translation.x,
                bone.bind_translation.y,
                bone.bind_translation.z,
            ],
        })
        .collect();

    let document = ClipDocument {
        version: CLIP_FILE_VERSION,
        clip: ClipHeaderDocument {
            name: clip.name().to_owned(),
            num_samples: clip.num_samples(),
            sample_rate: clip.sample_rate(),
            error_threshold: clip.error_threshold(),
        },
        bones,
        tracks: clip_tracks(skeleton, clip),
        additive: clip.additive_base().map(|(kind, base)| AdditiveDocument {
            format: kind.name().to_owned(),
            num_samples: base.num_samples(),
            sample_rate: base.sample_rate(),
            tracks: clip_tracks(skeleton, base),
        }),
    };

    serde_json::to_string_pretty(&document)
        .map_err(|err| Error::InvalidInput(format!("cannot serialize clip: {err}")))
}

fn clip_tracks(skeleton: &RigidSkeleton, clip: &AnimationClip) -> Vec<TrackDocument> {
    skeleton
        .bones()
        .iter()
        .zip(clip.bones().iter())
        .map(|(bone, tracks)| TrackDocument {
            name: bone.name.clone(),
            rotations: tracks
                .rotations
                .iter()
                .map(|rotation| [rotation.x, rotation.y, rotation.z, rotation.w])
                .collect(),
            translations: tracks
                .translations
                .iter()
                .map(|translation| [translation.x, translation.y, translation.z])
                .collect(),
            scales: tracks
                .scales
                .iter()
                .map(|scale| [scale.x, scale.y, scale.z])
                .collect(),
        })
        .collect()
}
