//! Streaming decompression of sealed clip buffers.

pub mod context;
pub mod decoder;

pub use context::{DecompressionContext, RoundingPolicy};
pub use decoder::{decompress_bone, decompress_pose};
