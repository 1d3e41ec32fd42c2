//! Skeletal animation clip compression.
//!
//! Compresses uniformly sampled per-bone transform tracks into a compact,
//! self-describing, sealed binary buffer, and samples any pose back out of
//! that buffer without allocating. The centerpiece is a per-segment
//! variable bit-rate search that keeps every bone's object-space error
//! within a caller-specified shell distance while minimizing total bits.
//!
//! ```no_run
//! use acl::{
//!     compress_clip, decompress_pose, AnimationClip, CompressionSettings,
//!     DecompressionContext, RigidSkeleton, RoundingPolicy, Transform,
//! };
//!
//! # fn demo(clip: AnimationClip, skeleton: RigidSkeleton) -> acl::Result<()> {
//! let result = compress_clip(&clip, &skeleton, &CompressionSettings::default())?;
//!
//! let mut context = DecompressionContext::new(&result.compressed)?;
//! context.seek(0.5, RoundingPolicy::None);
//! let mut pose = vec![Transform::identity(); usize::from(skeleton.num_bones())];
//! decompress_pose(&context, &mut pose);
//! # Ok(())
//! # }
//! ```

pub mod compression;
pub mod core;
pub mod decompression;
pub mod hash;
pub mod io;
pub mod math;
pub mod stats;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common API entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// Library error type and result alias.
pub use crate::core::error::{Error, Result};

/// The sealed compressed buffer and its format constants.
pub use crate::core::buffer::{CompressedClip, ALGORITHM_VERSION, COMPRESSED_CLIP_TAG};

/// Serialized track formats and range-reduction flags.
pub use crate::core::range_reduction::RangeReductionFlags;
pub use crate::core::types::{AlgorithmType, RotationFormat, VectorFormat};

/// Compression inputs.
pub use crate::compression::{
    AdditiveKind, AnimationClip, BoneTracks, ErrorMetric, RigidBone, RigidSkeleton,
};

/// Compression entry point and its outputs.
pub use crate::compression::{
    compress_clip, CompressionLevel, CompressionResult, CompressionSettings, CompressionStats,
    SegmentingSettings,
};

/// Decompression entry points.
pub use crate::decompression::{
    decompress_bone, decompress_pose, DecompressionContext, RoundingPolicy,
};

/// Working math types shared by both sides.
pub use crate::math::{Quat, Transform, Vec3};

// ─────────────────────────────────────────────────────────────────────────────
// Version API
// ─────────────────────────────────────────────────────────────────────────────

pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 8;
pub const VERSION_PATCH: u32 = 0;
pub const VERSION_STRING: &str = "0.8.0";

/// Returns the library version string (e.g. `"0.8.0"`).
pub fn version_string() -> &'static str {
    VERSION_STRING
}
