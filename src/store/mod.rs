//! Sparse chunk storage.
//!
//! The map allocates voxel memory one region at a time. Each allocated
//! region is backed by a [`Chunk`] owning one contiguous byte buffer per
//! layer; the [`ChunkStore`] maps region coordinates to chunks, creating
//! them on demand and iterating them in insertion order.
//!
//! Chunks are addressed by stable arena index, so the ray-integration hot
//! loop never holds a buffer reference across an allocation that could move
//! it.

mod chunk;
mod storage;

pub use chunk::{Chunk, INVALID_VOXEL_INDEX};
pub use storage::ChunkStore;
