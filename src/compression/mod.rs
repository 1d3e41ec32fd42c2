//! The compression pipeline.
//!
//! Stages run in a fixed order over a mutable staging context:
//! conversion → clip range extraction → constant compaction → clip
//! normalization → segmenting → segment range extraction → segment
//! normalization → bit-rate search → serialization.

pub mod clip;
pub mod clip_context;
pub mod constant_tracks;
pub mod encoder;
pub mod error_metric;
pub mod normalize;
pub mod quantize;
pub mod ranges;
pub mod sample_streams;
pub mod segmenting;
pub mod settings;
pub mod skeleton;
pub mod track_stream;

pub use clip::{AdditiveKind, AnimationClip, BoneTracks};
pub use encoder::{compress_clip, CompressionResult, CompressionStats};
pub use error_metric::ErrorMetric;
pub use quantize::LockedBone;
pub use settings::{CompressionLevel, CompressionSettings, SegmentingSettings};
pub use skeleton::{RigidBone, RigidSkeleton};
