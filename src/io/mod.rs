//! Reference clip file reading and writing.
//!
//! Clip files are self-describing JSON documents holding a skeleton, the
//! clip header, and the raw per-bone tracks. They are the interchange
//! format for test assets and the command-line compressor; the compressed
//! binary format lives in [`crate::core::buffer`].

mod clip_reader;
mod clip_writer;

pub use clip_reader::{read_clip_file, read_clip_str};
pub use clip_writer::{write_clip_file, write_clip_str};

use serde::{Deserialize, Serialize};

/// Current clip file format version.
pub const CLIP_FILE_VERSION: u32 = 1;

/// Top-level clip document.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClipDocument {
    pub version: u32,
    pub clip: ClipHeaderDocument,
    pub bones: Vec<BoneDocument>,
    pub tracks: Vec<TrackDocument>,
    /// Present when the tracks are a delta over a base clip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additive: Option<AdditiveDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClipHeaderDocument {
    pub name: String,
    pub num_samples: u32,
    pub sample_rate: u32,
    pub error_threshold: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BoneDocument {
    pub name: String,
    /// Empty string for root bones.
    #[serde(default)]
    pub parent: String,
    pub vertex_distance: f64,
    #[serde(default = "default_bind_rotation")]
    pub bind_rotation: [f64; 4],
    #[serde(default)]
    pub bind_translation: [f64; 3],
}

fn default_bind_rotation() -> [f64; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct TrackDocument {
    pub name: String,
    pub rotations: Vec<[f64; 4]>,
    pub translations: Vec<[f64; 3]>,
    /// Omitted tracks hold the neutral scale.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scales: Vec<[f64; 3]>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AdditiveDocument {
    /// One of `relative`, `additive0`, `additive1`.
    pub format: String,
    pub num_samples: u32,
    pub sample_rate: u32,
    pub tracks: Vec<TrackDocument>,
}
