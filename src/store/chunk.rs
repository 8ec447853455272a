//! A single allocated region and its layer buffers.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::RegionCoord;
use crate::error::{MapError, Result};
use crate::layout::MapLayout;

/// Sentinel for "no voxel in this chunk has ever been written".
pub const INVALID_VOXEL_INDEX: u32 = u32::MAX;

/// The allocated backing of one region.
///
/// A chunk owns one byte buffer per layer, each sized
/// `region_voxel_count * layer_voxel_bytes`, plus write-tracking metadata.
/// Layer buffers are exclusively mutated by the map's single writer; only
/// the stamps are atomic, so background readers can detect writes with an
/// optimistic read-stamp-check-retry loop.
#[derive(Debug)]
pub struct Chunk {
    region: RegionCoord,
    layers: Vec<Vec<u8>>,
    dirty_stamp: u64,
    touched_stamps: Vec<AtomicU64>,
    first_valid_index: u32,
}

impl Chunk {
    /// Allocate a chunk for `region` with every layer at its initial
    /// pattern. Buffer allocation failure surfaces as
    /// [`MapError::Allocation`] rather than aborting.
    pub fn new(region: RegionCoord, layout: &MapLayout, voxel_count: u32) -> Result<Self> {
        let mut layers = Vec::with_capacity(layout.layer_count());
        let mut touched_stamps = Vec::with_capacity(layout.layer_count());
        for (index, desc) in layout.layers().enumerate() {
            let bytes = layout.bytes_per_layer(index, voxel_count);
            let mut buffer: Vec<u8> = Vec::new();
            buffer.try_reserve_exact(bytes).map_err(|e| {
                MapError::Allocation(format!(
                    "chunk {region:?} layer '{}' ({bytes} bytes): {e}",
                    desc.name()
                ))
            })?;
            buffer.resize(bytes, 0);
            desc.fill_initial(&mut buffer);
            layers.push(buffer);
            touched_stamps.push(AtomicU64::new(0));
        }
        Ok(Self {
            region,
            layers,
            dirty_stamp: 0,
            touched_stamps,
            first_valid_index: INVALID_VOXEL_INDEX,
        })
    }

    /// Coordinate of the region this chunk backs.
    #[inline]
    pub fn region(&self) -> RegionCoord {
        self.region
    }

    /// Shared view of a whole layer buffer.
    #[inline]
    pub fn layer(&self, layer_index: usize) -> &[u8] {
        &self.layers[layer_index]
    }

    /// Exclusive view of a whole layer buffer.
    #[inline]
    pub fn layer_mut(&mut self, layer_index: usize) -> &mut [u8] {
        &mut self.layers[layer_index]
    }

    /// Shared view of one voxel's bytes in a layer.
    #[inline]
    pub fn voxel_bytes(&self, layer_index: usize, voxel_index: u32, voxel_bytes: usize) -> &[u8] {
        let at = voxel_index as usize * voxel_bytes;
        &self.layers[layer_index][at..at + voxel_bytes]
    }

    /// Exclusive view of one voxel's bytes in a layer.
    #[inline]
    pub fn voxel_bytes_mut(
        &mut self,
        layer_index: usize,
        voxel_index: u32,
        voxel_bytes: usize,
    ) -> &mut [u8] {
        let at = voxel_index as usize * voxel_bytes;
        &mut self.layers[layer_index][at..at + voxel_bytes]
    }

    /// Read one f32 voxel value from a 4-byte layer.
    #[inline]
    pub fn read_f32(&self, layer_index: usize, voxel_index: u32) -> f32 {
        let b = self.voxel_bytes(layer_index, voxel_index, 4);
        f32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    /// Write one f32 voxel value into a 4-byte layer.
    #[inline]
    pub fn write_f32(&mut self, layer_index: usize, voxel_index: u32, value: f32) {
        self.voxel_bytes_mut(layer_index, voxel_index, 4)
            .copy_from_slice(&value.to_le_bytes());
    }

    /// Stamp of the most recent write to any layer of this chunk.
    #[inline]
    pub fn dirty_stamp(&self) -> u64 {
        self.dirty_stamp
    }

    /// Stamp of the most recent write to one layer. Relaxed load; see the
    /// module docs on the reader discipline.
    #[inline]
    pub fn touched_stamp(&self, layer_index: usize) -> u64 {
        self.touched_stamps[layer_index].load(Ordering::Relaxed)
    }

    /// Record a write to `layer_index` at `stamp`. The dirty stamp never
    /// decreases and always dominates every layer stamp.
    #[inline]
    pub fn touch_layer(&mut self, layer_index: usize, stamp: u64) {
        self.dirty_stamp = self.dirty_stamp.max(stamp);
        self.touched_stamps[layer_index].store(stamp, Ordering::Relaxed);
    }

    /// Linear index of the first voxel that may have been written, or
    /// [`INVALID_VOXEL_INDEX`] when the chunk is pristine. Iterators use
    /// this to skip leading never-written voxels.
    #[inline]
    pub fn first_valid_index(&self) -> u32 {
        self.first_valid_index
    }

    /// Lower the first-valid hint to cover `voxel_index`. Writers may only
    /// lower it.
    #[inline]
    pub fn update_first_valid(&mut self, voxel_index: u32) {
        if voxel_index < self.first_valid_index {
            self.first_valid_index = voxel_index;
        }
    }

    /// Rebuild this chunk's buffers for a new layout, preserving the
    /// contents and touched stamps of layers that survive by name and
    /// initialising new layers to their pattern.
    pub(super) fn remap_layout(
        &mut self,
        old_layout: &MapLayout,
        new_layout: &MapLayout,
        voxel_count: u32,
    ) -> Result<()> {
        let mut layers = Vec::with_capacity(new_layout.layer_count());
        let mut touched_stamps = Vec::with_capacity(new_layout.layer_count());
        for (index, desc) in new_layout.layers().enumerate() {
            match old_layout.layer_index(desc.name()) {
                Some(old_index)
                    if old_layout.layer(old_index).voxel_bytes() == desc.voxel_bytes() =>
                {
                    layers.push(std::mem::take(&mut self.layers[old_index]));
                    touched_stamps.push(AtomicU64::new(self.touched_stamps[old_index].load(
                        Ordering::Relaxed,
                    )));
                }
                _ => {
                    let bytes = new_layout.bytes_per_layer(index, voxel_count);
                    let mut buffer: Vec<u8> = Vec::new();
                    buffer.try_reserve_exact(bytes).map_err(|e| {
                        MapError::Allocation(format!(
                            "chunk {:?} layer '{}' ({bytes} bytes): {e}",
                            self.region,
                            desc.name()
                        ))
                    })?;
                    buffer.resize(bytes, 0);
                    desc.fill_initial(&mut buffer);
                    layers.push(buffer);
                    touched_stamps.push(AtomicU64::new(0));
                }
            }
        }
        self.layers = layers;
        self.touched_stamps = touched_stamps;
        Ok(())
    }
}
