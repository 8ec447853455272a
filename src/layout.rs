//! Voxel layer layout.
//!
//! A map stores one or more named byte layers per chunk; the layout names
//! each layer, fixes its per-voxel byte size, and records the pattern a
//! fresh chunk is filled with. The layer set is fixed for the lifetime of a
//! map except through the administrative layout update on the map façade,
//! which requires exclusive access.

use crate::mean::VOXEL_MEAN_BYTES;
use crate::occupancy::UNOBSERVED_VALUE;

/// Name of the occupancy layer (f32 log-odds per voxel).
pub const OCCUPANCY_LAYER: &str = "occupancy";
/// Name of the voxel-mean layer (packed mean record per voxel).
pub const MEAN_LAYER: &str = "mean";

/// Describes one named layer: per-voxel byte size and initial fill pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerDesc {
    name: String,
    voxel_bytes: usize,
    initial_pattern: Vec<u8>,
}

impl LayerDesc {
    /// Create a layer descriptor. The initial pattern must be exactly
    /// `voxel_bytes` long.
    pub fn new(name: &str, voxel_bytes: usize, initial_pattern: Vec<u8>) -> Self {
        assert_eq!(initial_pattern.len(), voxel_bytes);
        Self {
            name: name.to_string(),
            voxel_bytes,
            initial_pattern,
        }
    }

    /// The occupancy layer: one f32 log-odds value per voxel, initialised to
    /// the unobserved sentinel.
    pub fn occupancy() -> Self {
        Self::new(
            OCCUPANCY_LAYER,
            4,
            UNOBSERVED_VALUE.to_le_bytes().to_vec(),
        )
    }

    /// The voxel-mean layer: one packed mean record per voxel, zeroed.
    pub fn voxel_mean() -> Self {
        Self::new(MEAN_LAYER, VOXEL_MEAN_BYTES, vec![0u8; VOXEL_MEAN_BYTES])
    }

    /// Layer name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes per voxel in this layer.
    #[inline]
    pub fn voxel_bytes(&self) -> usize {
        self.voxel_bytes
    }

    /// Fill `buffer` with the initial pattern, voxel by voxel.
    pub fn fill_initial(&self, buffer: &mut [u8]) {
        debug_assert_eq!(buffer.len() % self.voxel_bytes, 0);
        for voxel in buffer.chunks_exact_mut(self.voxel_bytes) {
            voxel.copy_from_slice(&self.initial_pattern);
        }
    }
}

/// Ordered set of layer descriptors for a map.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapLayout {
    layers: Vec<LayerDesc>,
}

impl MapLayout {
    /// Layout with the occupancy layer only.
    pub fn occupancy_only() -> Self {
        Self {
            layers: vec![LayerDesc::occupancy()],
        }
    }

    /// Layout with occupancy plus voxel-mean layers.
    pub fn with_voxel_mean() -> Self {
        Self {
            layers: vec![LayerDesc::occupancy(), LayerDesc::voxel_mean()],
        }
    }

    /// Number of layers.
    #[inline]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Descriptor of layer `index`.
    #[inline]
    pub fn layer(&self, index: usize) -> &LayerDesc {
        &self.layers[index]
    }

    /// Iterate the layer descriptors in order.
    pub fn layers(&self) -> impl Iterator<Item = &LayerDesc> {
        self.layers.iter()
    }

    /// Index of the layer with the given name.
    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name() == name)
    }

    /// Total bytes the layer needs for a region of `voxel_count` voxels.
    #[inline]
    pub fn bytes_per_layer(&self, index: usize, voxel_count: u32) -> usize {
        self.layers[index].voxel_bytes() * voxel_count as usize
    }

    /// Append the voxel-mean layer if absent. Returns true when added.
    pub fn add_voxel_mean_layer(&mut self) -> bool {
        if self.layer_index(MEAN_LAYER).is_some() {
            return false;
        }
        self.layers.push(LayerDesc::voxel_mean());
        true
    }

    /// Remove the named layer. Returns true when it existed.
    pub fn remove_layer(&mut self, name: &str) -> bool {
        match self.layer_index(name) {
            Some(index) => {
                self.layers.remove(index);
                true
            }
            None => false,
        }
    }
}
