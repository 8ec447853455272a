//! Log-odds occupancy ray integration.

use crate::core::{RegionCoord, WorldPoint};
use crate::layout::{MEAN_LAYER, OCCUPANCY_LAYER};
use crate::map::OccupancyMap;
use crate::mean::{VOXEL_MEAN_BYTES, VoxelMean};
use crate::occupancy::{is_occupied_value, occupancy_adjust_hit, occupancy_adjust_miss};
use crate::store::ChunkStore;
use crate::walk::SegmentWalk;

use super::{RayFilterFlags, RayFlags, RayMapper};

/// Integrates (origin, sample) ray pairs into a map's occupancy layer, with
/// the sub-voxel mean update at the sample voxel when the mean layer is
/// present.
///
/// Layer indices are resolved once at construction. A mean layer whose
/// per-voxel byte size does not match the packed record is treated as
/// absent, so mean updates are silently skipped rather than corrupting the
/// buffer.
pub struct OccupancyRayMapper<'a> {
    map: &'a mut OccupancyMap,
    occupancy_layer: Option<usize>,
    mean_layer: Option<usize>,
}

impl<'a> OccupancyRayMapper<'a> {
    /// Wrap a map for ray integration.
    pub fn new(map: &'a mut OccupancyMap) -> Self {
        let layout = map.store().layout();
        let occupancy_layer = layout.layer_index(OCCUPANCY_LAYER);
        let mean_layer = layout
            .layer_index(MEAN_LAYER)
            .filter(|&at| layout.layer(at).voxel_bytes() == VOXEL_MEAN_BYTES);
        Self {
            map,
            occupancy_layer,
            mean_layer,
        }
    }

    /// True when this mapper will maintain sub-voxel means.
    #[inline]
    pub fn voxel_mean_enabled(&self) -> bool {
        self.mean_layer.is_some()
    }

    /// Resolve the chunk for `region`, reusing the previous resolution when
    /// consecutive voxels share a region.
    #[inline]
    fn resolve_chunk(
        store: &mut ChunkStore,
        last: &mut Option<(RegionCoord, usize)>,
        region: RegionCoord,
    ) -> crate::error::Result<usize> {
        if let Some((cached_region, at)) = *last
            && cached_region == region
        {
            return Ok(at);
        }
        let at = store.ensure(region)?;
        *last = Some((region, at));
        Ok(at)
    }
}

impl RayMapper for OccupancyRayMapper<'_> {
    fn integrate_rays(&mut self, rays: &[WorldPoint], flags: RayFlags) -> usize {
        let Some(occupancy_layer) = self.occupancy_layer else {
            log::warn!("occupancy layer missing; rays dropped");
            return 0;
        };
        let mean_layer = self.mean_layer;

        // Snapshot every parameter the per-voxel loop needs. One stamp per
        // batch: readers only need to see that a write happened.
        let geometry = self.map.geometry();
        let origin = self.map.origin();
        let resolution = geometry.resolution();
        let hit_value = self.map.hit_value();
        let miss_value = self.map.miss_value();
        let threshold = self.map.occupancy_threshold_value();
        let voxel_min = self.map.min_voxel_value();
        let voxel_max = self.map.max_voxel_value();
        let saturation_min = if self.map.saturate_at_min() {
            voxel_min
        } else {
            f32::MIN
        };
        let saturation_max = if self.map.saturate_at_max() {
            voxel_max
        } else {
            f32::MAX
        };
        let touch_stamp = self.map.touch();

        let end_point_as_free = flags.contains(RayFlags::END_POINT_AS_FREE);
        let stop_on_first_occupied = flags.contains(RayFlags::STOP_ON_FIRST_OCCUPIED);
        let clear_only = flags.contains(RayFlags::CLEAR_ONLY);
        let exclude_ray = flags.contains(RayFlags::EXCLUDE_RAY);
        let exclude_sample = flags.contains(RayFlags::EXCLUDE_SAMPLE);

        let mut last_chunk: Option<(RegionCoord, usize)> = None;
        let mut accepted = 0usize;

        'rays: for pair in rays.chunks_exact(2) {
            let mut start = pair[0];
            let mut end = pair[1];
            let mut filter_flags = RayFilterFlags::default();

            if let Some(filter) = self.map.ray_filter()
                && !filter(&mut start, &mut end, &mut filter_flags)
            {
                // Bad ray; skipped without counting.
                continue;
            }

            // A clipped, declared-free or clear-only sample carries no
            // surface evidence: fold it into the miss pass instead of the
            // hit pass.
            let include_sample_in_ray = filter_flags.contains(RayFilterFlags::CLIPPED_END)
                || end_point_as_free
                || clear_only;

            let mut stop = false;
            if !exclude_ray {
                let walk = SegmentWalk::new(
                    start - origin,
                    end - origin,
                    include_sample_in_ray,
                    &geometry,
                );
                for key in walk {
                    let chunk_at = match Self::resolve_chunk(
                        self.map.store_mut(),
                        &mut last_chunk,
                        key.region(),
                    ) {
                        Ok(at) => at,
                        Err(e) => {
                            log::warn!("ray integration aborted: {e}");
                            break 'rays;
                        }
                    };
                    let voxel_index = geometry.voxel_index(key);
                    let chunk = self.map.store_mut().chunk_mut(chunk_at);
                    let current = chunk.read_f32(occupancy_layer, voxel_index);
                    let occupied = is_occupied_value(current, threshold);
                    let inhibit = stop || (clear_only && !occupied);
                    let adjusted = occupancy_adjust_miss(
                        current,
                        miss_value,
                        voxel_min,
                        saturation_min,
                        saturation_max,
                        inhibit,
                    );
                    chunk.write_f32(occupancy_layer, voxel_index, adjusted);
                    chunk.update_first_valid(voxel_index);
                    chunk.touch_layer(occupancy_layer, touch_stamp);
                    stop = stop || (stop_on_first_occupied && occupied);
                }
            }

            if !stop && !include_sample_in_ray && !clear_only && !exclude_sample {
                let key = geometry.voxel_key(end - origin);
                let chunk_at = match Self::resolve_chunk(
                    self.map.store_mut(),
                    &mut last_chunk,
                    key.region(),
                ) {
                    Ok(at) => at,
                    Err(e) => {
                        log::warn!("ray integration aborted: {e}");
                        break 'rays;
                    }
                };
                let voxel_index = geometry.voxel_index(key);
                let centre = geometry.voxel_centre_local(key) + origin;
                let chunk = self.map.store_mut().chunk_mut(chunk_at);
                let current = chunk.read_f32(occupancy_layer, voxel_index);
                let adjusted = occupancy_adjust_hit(
                    current,
                    hit_value,
                    voxel_max,
                    saturation_min,
                    saturation_max,
                    stop,
                );
                chunk.write_f32(occupancy_layer, voxel_index, adjusted);

                if let Some(mean_layer) = mean_layer {
                    let bytes = chunk.voxel_bytes_mut(mean_layer, voxel_index, VOXEL_MEAN_BYTES);
                    let mean = VoxelMean::decode(bytes).with_sample(end - centre, resolution);
                    mean.encode(bytes);
                    chunk.touch_layer(mean_layer, touch_stamp);
                }

                chunk.update_first_valid(voxel_index);
                chunk.touch_layer(occupancy_layer, touch_stamp);
            }

            accepted += 1;
        }

        accepted
    }
}
