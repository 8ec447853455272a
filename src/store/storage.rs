//! Region-coordinate to chunk mapping.

use std::collections::HashMap;

use crate::core::RegionCoord;
use crate::error::Result;
use crate::layout::MapLayout;

use super::chunk::Chunk;

/// Sparse store of allocated chunks, keyed by region coordinate.
///
/// Chunks live in an arena and are referenced by index; the side map only
/// resolves coordinates to indices. Exactly one chunk exists per region
/// coordinate, chunks are created lazily, and iteration follows insertion
/// order, which makes it deterministic for a given sequence of operations.
#[derive(Debug)]
pub struct ChunkStore {
    layout: MapLayout,
    voxel_count: u32,
    chunks: Vec<Chunk>,
    index: HashMap<RegionCoord, usize>,
}

impl ChunkStore {
    /// Create an empty store for the given layout and per-region voxel count.
    pub fn new(layout: MapLayout, voxel_count: u32) -> Self {
        Self {
            layout,
            voxel_count,
            chunks: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// The layer layout shared by every chunk.
    #[inline]
    pub fn layout(&self) -> &MapLayout {
        &self.layout
    }

    /// Voxels per region.
    #[inline]
    pub fn voxel_count(&self) -> u32 {
        self.voxel_count
    }

    /// Number of allocated chunks.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Arena index of the chunk for `region`, if allocated.
    #[inline]
    pub fn find(&self, region: RegionCoord) -> Option<usize> {
        self.index.get(&region).copied()
    }

    /// Arena index of the chunk for `region`, allocating it on demand.
    pub fn ensure(&mut self, region: RegionCoord) -> Result<usize> {
        if let Some(&at) = self.index.get(&region) {
            return Ok(at);
        }
        let chunk = Chunk::new(region, &self.layout, self.voxel_count)?;
        let at = self.chunks.len();
        self.chunks.push(chunk);
        self.index.insert(region, at);
        Ok(at)
    }

    /// Chunk by arena index.
    #[inline]
    pub fn chunk(&self, at: usize) -> &Chunk {
        &self.chunks[at]
    }

    /// Chunk by arena index, exclusively.
    #[inline]
    pub fn chunk_mut(&mut self, at: usize) -> &mut Chunk {
        &mut self.chunks[at]
    }

    /// Chunk for a region coordinate, if allocated.
    pub fn region(&self, region: RegionCoord) -> Option<&Chunk> {
        self.find(region).map(|at| &self.chunks[at])
    }

    /// Chunk for a region coordinate, exclusively, if allocated.
    pub fn region_mut(&mut self, region: RegionCoord) -> Option<&mut Chunk> {
        self.find(region).map(move |at| &mut self.chunks[at])
    }

    /// Iterate allocated chunks in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }

    /// Swap in a new layer layout, rebuilding every chunk's buffer set.
    ///
    /// Layers that survive by name and size keep their contents; new layers
    /// start at their initial pattern. Requires exclusive access, which the
    /// `&mut self` receiver enforces.
    pub fn update_layout(&mut self, new_layout: MapLayout) -> Result<()> {
        for chunk in &mut self.chunks {
            chunk.remap_layout(&self.layout, &new_layout, self.voxel_count)?;
        }
        log::debug!(
            "layout updated to {} layers across {} chunks",
            new_layout.layer_count(),
            self.chunks.len()
        );
        self.layout = new_layout;
        Ok(())
    }
}
