//! The occupancy map façade.
//!
//! [`OccupancyMap`] owns the layer layout and chunk store exclusively and is
//! the only public surface for mutating voxels: ray batches go through
//! [`OccupancyMap::integrate_rays`], direct writes through the
//! `set_occupancy` / `set_voxel_position` calls. Read access hands out
//! short-lived [`Voxel`] handles that borrow the map for the duration of the
//! call.
//!
//! Sharing discipline: at most one thread mutates a map at a time (callers
//! serialise writers); concurrent readers watch the per-chunk touched stamps
//! and retry when a stamp moves under them.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{MapConfig, MapFlags};
use crate::core::{MapGeometry, VoxelKey, WorldPoint};
use crate::error::Result;
use crate::layout::{MEAN_LAYER, MapLayout, OCCUPANCY_LAYER};
use crate::mapper::{OccupancyRayMapper, RayFilter, RayFlags, RayMapper};
use crate::mean::{VOXEL_MEAN_BYTES, VoxelMean};
use crate::occupancy::{
    UNOBSERVED_VALUE, is_occupied_value, probability_to_value, value_to_probability,
};
use crate::store::{Chunk, ChunkStore};

/// A sparse probabilistic 3D occupancy map.
pub struct OccupancyMap {
    geometry: MapGeometry,
    store: ChunkStore,
    origin: WorldPoint,
    flags: MapFlags,
    hit_value: f32,
    miss_value: f32,
    occupancy_threshold_value: f32,
    min_voxel_value: f32,
    max_voxel_value: f32,
    saturate_at_min: bool,
    saturate_at_max: bool,
    stamp: AtomicU64,
    ray_filter: Option<RayFilter>,
}

impl OccupancyMap {
    /// Build a map from validated configuration.
    pub fn new(config: &MapConfig) -> Result<Self> {
        config.validate()?;
        let geometry = MapGeometry::new(config.resolution, config.region_voxel_dims);
        let layout = if config.flags.contains(MapFlags::VOXEL_MEAN) {
            MapLayout::with_voxel_mean()
        } else {
            MapLayout::occupancy_only()
        };
        let store = ChunkStore::new(layout, geometry.region_voxel_count());
        Ok(Self {
            geometry,
            store,
            origin: WorldPoint::ZERO,
            flags: config.flags,
            hit_value: probability_to_value(config.hit_probability),
            miss_value: probability_to_value(config.miss_probability),
            occupancy_threshold_value: probability_to_value(
                config.occupancy_threshold_probability,
            ),
            min_voxel_value: config
                .min_node_probability
                .map(probability_to_value)
                .unwrap_or(f32::MIN),
            max_voxel_value: config
                .max_node_probability
                .map(probability_to_value)
                .unwrap_or(f32::MAX),
            saturate_at_min: config.saturate_at_min,
            saturate_at_max: config.saturate_at_max,
            stamp: AtomicU64::new(0),
            ray_filter: None,
        })
    }

    // ── Parameters ──────────────────────────────────────────────────────

    /// Voxel edge length in meters.
    #[inline]
    pub fn resolution(&self) -> f64 {
        self.geometry.resolution()
    }

    /// Per-region voxel dimensions.
    #[inline]
    pub fn region_voxel_dims(&self) -> [u8; 3] {
        self.geometry.region_dims()
    }

    /// Copy of the map geometry, for walkers and key algebra.
    #[inline]
    pub fn geometry(&self) -> MapGeometry {
        self.geometry
    }

    /// Construction feature flags.
    #[inline]
    pub fn flags(&self) -> MapFlags {
        self.flags
    }

    /// World-frame offset of the map; all voxel algebra happens in the
    /// local frame `p - origin`.
    #[inline]
    pub fn origin(&self) -> WorldPoint {
        self.origin
    }

    /// Move the map origin. Does not touch stored voxels; the same keys
    /// simply describe different world positions afterwards.
    #[inline]
    pub fn set_origin(&mut self, origin: WorldPoint) {
        self.origin = origin;
    }

    /// Log-odds increment of a hit.
    #[inline]
    pub fn hit_value(&self) -> f32 {
        self.hit_value
    }

    /// Hit increment as a probability.
    #[inline]
    pub fn hit_probability(&self) -> f64 {
        value_to_probability(self.hit_value)
    }

    /// Log-odds increment of a miss (negative).
    #[inline]
    pub fn miss_value(&self) -> f32 {
        self.miss_value
    }

    /// Miss increment as a probability.
    #[inline]
    pub fn miss_probability(&self) -> f64 {
        value_to_probability(self.miss_value)
    }

    /// Log-odds value above which a voxel counts as occupied.
    #[inline]
    pub fn occupancy_threshold_value(&self) -> f32 {
        self.occupancy_threshold_value
    }

    /// Occupancy threshold as a probability.
    #[inline]
    pub fn occupancy_threshold_probability(&self) -> f64 {
        value_to_probability(self.occupancy_threshold_value)
    }

    /// Lower clamp on voxel values (`f32::MIN` when unclamped).
    #[inline]
    pub fn min_voxel_value(&self) -> f32 {
        self.min_voxel_value
    }

    /// Upper clamp on voxel values (`f32::MAX` when unclamped).
    #[inline]
    pub fn max_voxel_value(&self) -> f32 {
        self.max_voxel_value
    }

    /// Whether voxels latch at the lower clamp.
    #[inline]
    pub fn saturate_at_min(&self) -> bool {
        self.saturate_at_min
    }

    /// Whether voxels latch at the upper clamp.
    #[inline]
    pub fn saturate_at_max(&self) -> bool {
        self.saturate_at_max
    }

    // ── Stamps ──────────────────────────────────────────────────────────

    /// Allocate the next write stamp. Monotonic; dependants compare stamps
    /// to detect changes without scanning voxels.
    #[inline]
    pub fn touch(&self) -> u64 {
        self.stamp.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Current stamp value.
    #[inline]
    pub fn stamp(&self) -> u64 {
        self.stamp.load(Ordering::Relaxed)
    }

    // ── Key algebra (world frame) ───────────────────────────────────────

    /// Key of the voxel containing a world point.
    #[inline]
    pub fn voxel_key(&self, p: WorldPoint) -> VoxelKey {
        self.geometry.voxel_key(p - self.origin)
    }

    /// World-frame centre of a voxel.
    #[inline]
    pub fn voxel_centre_global(&self, key: VoxelKey) -> WorldPoint {
        self.geometry.voxel_centre_local(key) + self.origin
    }

    // ── Ray filter ──────────────────────────────────────────────────────

    /// Install or clear the ray filter invoked before each traversal.
    pub fn set_ray_filter(&mut self, filter: Option<RayFilter>) {
        self.ray_filter = filter;
    }

    /// The installed ray filter, if any.
    #[inline]
    pub fn ray_filter(&self) -> Option<&RayFilter> {
        self.ray_filter.as_ref()
    }

    // ── Integration ─────────────────────────────────────────────────────

    /// Integrate (origin, sample) ray pairs with the occupancy mapper.
    ///
    /// Returns the number of pairs accepted; see [`RayMapper`].
    pub fn integrate_rays(&mut self, rays: &[WorldPoint], flags: RayFlags) -> usize {
        OccupancyRayMapper::new(self).integrate_rays(rays, flags)
    }

    // ── Voxel access ────────────────────────────────────────────────────

    /// Read handle for the voxel at `key`, if its region is allocated.
    pub fn voxel(&self, key: VoxelKey) -> Option<Voxel<'_>> {
        let chunk = self.store.region(key.region())?;
        Some(Voxel {
            map: self,
            chunk,
            key,
            voxel_index: self.geometry.voxel_index(key),
        })
    }

    /// Directly set a voxel's occupancy value, allocating its region on
    /// demand.
    pub fn set_occupancy(&mut self, key: VoxelKey, value: f32) -> Result<()> {
        let layer = self.store.layout().layer_index(OCCUPANCY_LAYER);
        let Some(layer) = layer else {
            log::warn!("occupancy layer missing; write dropped");
            return Ok(());
        };
        let voxel_index = self.geometry.voxel_index(key);
        let stamp = self.touch();
        let at = self.store.ensure(key.region())?;
        let chunk = self.store.chunk_mut(at);
        chunk.write_f32(layer, voxel_index, value);
        chunk.update_first_valid(voxel_index);
        chunk.touch_layer(layer, stamp);
        Ok(())
    }

    /// Directly set a voxel's mean position to a world-frame point,
    /// resetting its sample count to one.
    ///
    /// Silently skipped (returning `Ok(false)`) when the mean layer is
    /// absent or mis-sized.
    pub fn set_voxel_position(&mut self, key: VoxelKey, position: WorldPoint) -> Result<bool> {
        let layout = self.store.layout();
        let layer = layout
            .layer_index(MEAN_LAYER)
            .filter(|&at| layout.layer(at).voxel_bytes() == VOXEL_MEAN_BYTES);
        let Some(layer) = layer else {
            return Ok(false);
        };
        let offset = position - self.voxel_centre_global(key);
        let resolution = self.geometry.resolution();
        let voxel_index = self.geometry.voxel_index(key);
        let stamp = self.touch();
        let at = self.store.ensure(key.region())?;
        let chunk = self.store.chunk_mut(at);
        let mean = VoxelMean::from_offset(offset, resolution);
        mean.encode(chunk.voxel_bytes_mut(layer, voxel_index, VOXEL_MEAN_BYTES));
        chunk.update_first_valid(voxel_index);
        chunk.touch_layer(layer, stamp);
        Ok(true)
    }

    /// Iterate every observed voxel (those whose occupancy has been
    /// written at least once), chunk by chunk in insertion order.
    pub fn observed_voxels(&self) -> impl Iterator<Item = Voxel<'_>> {
        let layer = self.store.layout().layer_index(OCCUPANCY_LAYER);
        self.store.iter().flat_map(move |chunk| {
            let first = chunk.first_valid_index();
            let count = self.store.voxel_count();
            let span = if first == crate::store::INVALID_VOXEL_INDEX {
                0..0
            } else {
                first..count
            };
            span.filter_map(move |voxel_index| {
                let layer = layer?;
                (chunk.read_f32(layer, voxel_index) != UNOBSERVED_VALUE).then(|| Voxel {
                    map: self,
                    chunk,
                    key: self.geometry.key_from_index(chunk.region(), voxel_index),
                    voxel_index,
                })
            })
        })
    }

    // ── Layers ──────────────────────────────────────────────────────────

    /// Whether the map carries the voxel-mean layer.
    pub fn voxel_mean_enabled(&self) -> bool {
        self.store.layout().layer_index(MEAN_LAYER).is_some()
    }

    /// Add the voxel-mean layer, re-allocating every chunk's buffer set.
    ///
    /// Existing layer contents are preserved; the new layer starts zeroed.
    /// Requires exclusive access, which the receiver enforces.
    pub fn add_voxel_mean_layer(&mut self) -> Result<()> {
        if self.voxel_mean_enabled() {
            return Ok(());
        }
        let mut layout = self.store.layout().clone();
        layout.add_voxel_mean_layer();
        self.store.update_layout(layout)?;
        self.flags |= MapFlags::VOXEL_MEAN;
        self.touch();
        Ok(())
    }

    /// Remove the voxel-mean layer, preserving the occupancy layer.
    pub fn remove_voxel_mean_layer(&mut self) -> Result<()> {
        if !self.voxel_mean_enabled() {
            return Ok(());
        }
        let mut layout = self.store.layout().clone();
        layout.remove_layer(MEAN_LAYER);
        self.store.update_layout(layout)?;
        self.flags = self.flags.without(MapFlags::VOXEL_MEAN);
        self.touch();
        Ok(())
    }

    // ── Statistics ──────────────────────────────────────────────────────

    /// Number of allocated regions.
    #[inline]
    pub fn region_count(&self) -> usize {
        self.store.chunk_count()
    }

    /// Total voxels across all allocated regions.
    #[inline]
    pub fn voxel_count(&self) -> usize {
        self.store.voxel_count() as usize * self.store.chunk_count()
    }

    /// Iterate allocated chunks in insertion order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.store.iter()
    }

    /// Approximate voxel memory in bytes across all allocated chunks.
    pub fn memory_use(&self) -> usize {
        let layout = self.store.layout();
        let per_chunk: usize = (0..layout.layer_count())
            .map(|at| layout.bytes_per_layer(at, self.store.voxel_count()))
            .sum();
        per_chunk * self.store.chunk_count()
    }

    // ── Internal ────────────────────────────────────────────────────────

    pub(crate) fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut ChunkStore {
        &mut self.store
    }
}

/// Read handle for one voxel; borrows the map for the duration of the call.
pub struct Voxel<'a> {
    map: &'a OccupancyMap,
    chunk: &'a Chunk,
    key: VoxelKey,
    voxel_index: u32,
}

impl Voxel<'_> {
    /// The voxel's key.
    #[inline]
    pub fn key(&self) -> VoxelKey {
        self.key
    }

    /// Raw log-odds occupancy value (the unobserved sentinel when never
    /// written).
    pub fn occupancy(&self) -> f32 {
        match self.map.store().layout().layer_index(OCCUPANCY_LAYER) {
            Some(layer) => self.chunk.read_f32(layer, self.voxel_index),
            None => UNOBSERVED_VALUE,
        }
    }

    /// Occupancy probability, or `None` while unobserved.
    pub fn probability(&self) -> Option<f64> {
        let value = self.occupancy();
        (value != UNOBSERVED_VALUE).then(|| value_to_probability(value))
    }

    /// True when observed and above the occupancy threshold.
    pub fn is_occupied(&self) -> bool {
        is_occupied_value(self.occupancy(), self.map.occupancy_threshold_value())
    }

    /// True when never written.
    pub fn is_unobserved(&self) -> bool {
        self.occupancy() == UNOBSERVED_VALUE
    }

    /// World-frame position of this voxel: the tracked sub-voxel mean when
    /// the mean layer is present, the voxel centre otherwise.
    pub fn position(&self) -> WorldPoint {
        let centre = self.map.voxel_centre_global(self.key);
        match self.mean() {
            Some(mean) if mean.count > 0 => {
                centre + mean.offset(self.map.resolution())
            }
            _ => centre,
        }
    }

    /// Number of samples folded into the mean (0 when the layer is absent).
    pub fn mean_count(&self) -> u32 {
        self.mean().map(|m| m.count).unwrap_or(0)
    }

    fn mean(&self) -> Option<VoxelMean> {
        let layout = self.map.store().layout();
        let layer = layout
            .layer_index(MEAN_LAYER)
            .filter(|&at| layout.layer(at).voxel_bytes() == VOXEL_MEAN_BYTES)?;
        Some(VoxelMean::decode(self.chunk.voxel_bytes(
            layer,
            self.voxel_index,
            VOXEL_MEAN_BYTES,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn map() -> OccupancyMap {
        OccupancyMap::new(&MapConfig::with_resolution(0.5)).unwrap()
    }

    fn mean_map() -> OccupancyMap {
        OccupancyMap::new(&MapConfig::with_resolution(0.5).with_voxel_mean()).unwrap()
    }

    #[test]
    fn test_construction_validates() {
        let mut config = MapConfig::default();
        config.resolution = -1.0;
        assert!(OccupancyMap::new(&config).is_err());
    }

    #[test]
    fn test_probability_values() {
        let m = map();
        assert!(m.hit_value() > 0.0);
        assert!(m.miss_value() < 0.0);
        assert_relative_eq!(m.occupancy_threshold_value(), 0.0);
        assert_relative_eq!(m.occupancy_threshold_probability(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_voxel_key_respects_origin() {
        let mut m = map();
        let key_before = m.voxel_key(WorldPoint::new(1.0, 1.0, 1.0));
        m.set_origin(WorldPoint::new(1.0, 1.0, 1.0));
        let key_after = m.voxel_key(WorldPoint::new(2.0, 2.0, 2.0));
        assert_eq!(key_before, key_after);
    }

    #[test]
    fn test_voxel_lookup_without_allocation() {
        let m = map();
        let key = m.voxel_key(WorldPoint::new(0.1, 0.1, 0.1));
        assert!(m.voxel(key).is_none());
        assert_eq!(m.region_count(), 0);
    }

    #[test]
    fn test_set_occupancy_creates_chunk() {
        let mut m = map();
        let key = m.voxel_key(WorldPoint::new(0.1, 0.1, 0.1));
        m.set_occupancy(key, 1.25).unwrap();
        assert_eq!(m.region_count(), 1);
        let voxel = m.voxel(key).unwrap();
        assert_eq!(voxel.occupancy(), 1.25);
        assert!(voxel.is_occupied());
        assert!(!voxel.is_unobserved());
    }

    #[test]
    fn test_touch_is_monotonic() {
        let m = map();
        let a = m.touch();
        let b = m.touch();
        assert!(b > a);
        assert_eq!(m.stamp(), b);
    }

    #[test]
    fn test_set_position_round_trip() {
        let mut m = mean_map();
        let key = m.voxel_key(WorldPoint::new(0.25, 0.25, 0.25));
        let target = WorldPoint::new(0.30, 0.20, 0.40);
        assert!(m.set_voxel_position(key, target).unwrap());

        let voxel = m.voxel(key).unwrap();
        assert_eq!(voxel.mean_count(), 1);
        let position = voxel.position();
        let tolerance = 0.5 / 1000.0;
        assert!((position.x - target.x).abs() < tolerance);
        assert!((position.y - target.y).abs() < tolerance);
        assert!((position.z - target.z).abs() < tolerance);
    }

    #[test]
    fn test_set_position_skipped_without_mean_layer() {
        let mut m = map();
        let key = m.voxel_key(WorldPoint::ZERO);
        assert!(!m.set_voxel_position(key, WorldPoint::ZERO).unwrap());
    }

    #[test]
    fn test_position_defaults_to_centre() {
        let mut m = mean_map();
        let key = m.voxel_key(WorldPoint::new(0.1, 0.1, 0.1));
        m.set_occupancy(key, 1.0).unwrap();
        let voxel = m.voxel(key).unwrap();
        assert_eq!(voxel.position(), m.voxel_centre_global(key));
    }

    #[test]
    fn test_observed_voxel_iteration() {
        let mut m = map();
        let keys = [
            m.voxel_key(WorldPoint::new(0.1, 0.1, 0.1)),
            m.voxel_key(WorldPoint::new(5.0, 5.0, 5.0)),
            m.voxel_key(WorldPoint::new(-20.0, 3.0, 1.0)),
        ];
        for (at, key) in keys.iter().enumerate() {
            m.set_occupancy(*key, at as f32 + 1.0).unwrap();
        }
        let seen: Vec<_> = m.observed_voxels().map(|v| v.key()).collect();
        assert_eq!(seen.len(), 3);
        for key in keys {
            assert!(seen.contains(&key));
        }
    }

    #[test]
    fn test_memory_accounting() {
        let mut m = map();
        assert_eq!(m.memory_use(), 0);
        m.set_occupancy(m.voxel_key(WorldPoint::ZERO), 0.5).unwrap();
        // One chunk, occupancy only: 32^3 voxels * 4 bytes.
        assert_eq!(m.memory_use(), 32 * 32 * 32 * 4);
    }

    #[test]
    fn test_voxel_count_tracks_regions() {
        let mut m = map();
        assert_eq!(m.voxel_count(), 0);
        m.set_occupancy(m.voxel_key(WorldPoint::ZERO), 0.5).unwrap();
        assert_eq!(m.voxel_count(), 32 * 32 * 32);
        // A second region doubles the total.
        m.set_occupancy(m.voxel_key(WorldPoint::new(20.0, 0.0, 0.0)), 0.5)
            .unwrap();
        assert_eq!(m.region_count(), 2);
        assert_eq!(m.voxel_count(), 2 * 32 * 32 * 32);
    }

    #[test]
    fn test_layer_toggle_preserves_occupancy() {
        let mut m = map();
        let key = m.voxel_key(WorldPoint::new(0.1, 0.1, 0.1));
        m.set_occupancy(key, 0.85).unwrap();

        m.add_voxel_mean_layer().unwrap();
        assert!(m.voxel_mean_enabled());
        assert!(m.flags().contains(MapFlags::VOXEL_MEAN));
        assert_eq!(m.voxel(key).unwrap().occupancy(), 0.85);

        m.remove_voxel_mean_layer().unwrap();
        assert!(!m.voxel_mean_enabled());
        assert!(!m.flags().contains(MapFlags::VOXEL_MEAN));
        assert_eq!(m.voxel(key).unwrap().occupancy(), 0.85);
    }
}
