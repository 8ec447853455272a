//! Map geometry: the pure algebra between world coordinates, region
//! coordinates and voxel keys.
//!
//! All functions here operate in the map-local frame (world coordinates with
//! the map origin already subtracted). Cells are half-open `[min, min + res)`
//! on every axis, and region assignment rounds toward negative infinity, so
//! keys are stable across the origin: a point exactly on a boundary belongs
//! to the voxel whose minimum corner it is.

use super::key::{RegionCoord, VoxelKey};
use super::point::WorldPoint;

/// Voxel resolution plus per-region voxel dimensions.
///
/// This is the only geometric state the ray walker needs; it carries no map
/// or storage knowledge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapGeometry {
    resolution: f64,
    region_dims: [u8; 3],
}

impl MapGeometry {
    /// Create a geometry from voxel edge length and region voxel dimensions.
    ///
    /// Callers validate inputs; this type assumes `resolution > 0` and every
    /// dimension `>= 1`.
    #[inline]
    pub fn new(resolution: f64, region_dims: [u8; 3]) -> Self {
        Self {
            resolution,
            region_dims,
        }
    }

    /// Voxel edge length in meters.
    #[inline]
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Per-region voxel dimensions.
    #[inline]
    pub fn region_dims(&self) -> [u8; 3] {
        self.region_dims
    }

    /// Total voxels per region.
    #[inline]
    pub fn region_voxel_count(&self) -> u32 {
        self.region_dims[0] as u32 * self.region_dims[1] as u32 * self.region_dims[2] as u32
    }

    /// Spatial edge length of a region on `axis`, in meters.
    #[inline]
    pub fn region_spatial_size(&self, axis: usize) -> f64 {
        self.region_dims[axis] as f64 * self.resolution
    }

    /// Partition a map-local point into its voxel key.
    pub fn voxel_key(&self, p: WorldPoint) -> VoxelKey {
        let mut region = [0i16; 3];
        let mut local = [0u16; 3];
        for axis in 0..3 {
            let coord = p.axis(axis);
            let region_size = self.region_spatial_size(axis);
            let region_index = (coord / region_size).floor();
            let region_min = region_index * region_size;
            // Guard against division rounding landing exactly on the upper
            // boundary; the voxel index must stay inside the region.
            let max_index = self.region_dims[axis] as i64 - 1;
            let voxel = (((coord - region_min) / self.resolution).floor() as i64)
                .clamp(0, max_index);
            region[axis] = region_index as i16;
            local[axis] = voxel as u16;
        }
        VoxelKey::new(RegionCoord::new(region[0], region[1], region[2]), local)
    }

    /// Centre of a voxel in the map-local frame.
    pub fn voxel_centre_local(&self, key: VoxelKey) -> WorldPoint {
        let mut c = [0.0f64; 3];
        for axis in 0..3 {
            let region_min = key.region().axis(axis) as f64 * self.region_spatial_size(axis);
            c[axis] = region_min + (key.local_axis(axis) as f64 + 0.5) * self.resolution;
        }
        WorldPoint::new(c[0], c[1], c[2])
    }

    /// Minimum corner of a voxel in the map-local frame.
    pub fn voxel_min_corner_local(&self, key: VoxelKey) -> WorldPoint {
        let mut c = [0.0f64; 3];
        for axis in 0..3 {
            let region_min = key.region().axis(axis) as f64 * self.region_spatial_size(axis);
            c[axis] = region_min + key.local_axis(axis) as f64 * self.resolution;
        }
        WorldPoint::new(c[0], c[1], c[2])
    }

    /// Linear index of a voxel within its region's layer buffers.
    ///
    /// Row-major with x fastest: `z * dx * dy + y * dx + x`.
    #[inline]
    pub fn voxel_index(&self, key: VoxelKey) -> u32 {
        let dx = self.region_dims[0] as u32;
        let dy = self.region_dims[1] as u32;
        key.local_axis(2) as u32 * dx * dy + key.local_axis(1) as u32 * dx + key.local_axis(0) as u32
    }

    /// Inverse of [`voxel_index`](Self::voxel_index): rebuild the key for a
    /// linear index within `region`.
    #[inline]
    pub fn key_from_index(&self, region: RegionCoord, voxel_index: u32) -> VoxelKey {
        let dx = self.region_dims[0] as u32;
        let dy = self.region_dims[1] as u32;
        VoxelKey::new(
            region,
            [
                (voxel_index % dx) as u16,
                (voxel_index / dx % dy) as u16,
                (voxel_index / (dx * dy)) as u16,
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn geom() -> MapGeometry {
        MapGeometry::new(0.5, [32, 32, 32])
    }

    #[test]
    fn test_voxel_key_at_origin() {
        let g = geom();
        let key = g.voxel_key(WorldPoint::new(0.25, 0.25, 0.25));
        assert_eq!(key.region, RegionCoord::new(0, 0, 0));
        assert_eq!(key.local, [0, 0, 0]);
    }

    #[test]
    fn test_voxel_key_boundary_goes_to_greater_voxel() {
        let g = geom();
        // Exactly on the x boundary between voxels 0 and 1.
        let key = g.voxel_key(WorldPoint::new(0.5, 0.0, 0.0));
        assert_eq!(key.local, [1, 0, 0]);

        // Exactly on a region boundary.
        let key = g.voxel_key(WorldPoint::new(16.0, 0.0, 0.0));
        assert_eq!(key.region, RegionCoord::new(1, 0, 0));
        assert_eq!(key.local, [0, 0, 0]);
    }

    #[test]
    fn test_voxel_key_negative_coordinates_floor() {
        let g = geom();
        let key = g.voxel_key(WorldPoint::new(-0.25, -0.25, -0.25));
        assert_eq!(key.region, RegionCoord::new(-1, -1, -1));
        assert_eq!(key.local, [31, 31, 31]);

        let key = g.voxel_key(WorldPoint::new(-16.0, 0.0, 0.0));
        assert_eq!(key.region, RegionCoord::new(-1, 0, 0));
        assert_eq!(key.local, [0, 0, 0]);
    }

    #[test]
    fn test_voxel_centre_round_trip() {
        let g = geom();
        for &p in &[
            WorldPoint::new(0.1, 0.2, 0.3),
            WorldPoint::new(-3.7, 12.4, -0.01),
            WorldPoint::new(100.0, -250.3, 17.77),
        ] {
            let key = g.voxel_key(p);
            let centre = g.voxel_centre_local(key);
            // The centre must land back in the same voxel.
            assert_eq!(g.voxel_key(centre), key);
            // And lie within half a resolution of the query point per axis.
            for axis in 0..3 {
                assert!((centre.axis(axis) - p.axis(axis)).abs() <= 0.5 * g.resolution() + 1e-12);
            }
        }
    }

    #[test]
    fn test_voxel_centre_values() {
        let g = geom();
        let key = g.voxel_key(WorldPoint::new(0.25, 0.25, 0.25));
        let centre = g.voxel_centre_local(key);
        assert_relative_eq!(centre.x, 0.25);
        assert_relative_eq!(centre.y, 0.25);
        assert_relative_eq!(centre.z, 0.25);
    }

    #[test]
    fn test_voxel_index_layout() {
        let g = MapGeometry::new(1.0, [4, 3, 2]);
        assert_eq!(g.region_voxel_count(), 24);
        let key = VoxelKey::new(RegionCoord::default(), [1, 2, 1]);
        // z * dx * dy + y * dx + x = 1*12 + 2*4 + 1
        assert_eq!(g.voxel_index(key), 21);
    }

    #[test]
    fn test_key_from_index_round_trip() {
        let g = MapGeometry::new(1.0, [4, 3, 2]);
        let region = RegionCoord::new(2, -1, 0);
        for i in 0..g.region_voxel_count() {
            let key = g.key_from_index(region, i);
            assert_eq!(g.voxel_index(key), i);
            assert_eq!(key.region(), region);
        }
    }

    #[test]
    fn test_dense_grid_covers_without_duplicates() {
        use std::collections::HashSet;

        let g = MapGeometry::new(1.0, [2, 2, 2]);
        let mut seen = HashSet::new();
        // One probe point per voxel over a 6x6x6 voxel block straddling the
        // origin: every key distinct, every region/local pair valid.
        for zi in -3..3 {
            for yi in -3..3 {
                for xi in -3..3 {
                    let p = WorldPoint::new(
                        xi as f64 + 0.5,
                        yi as f64 + 0.5,
                        zi as f64 + 0.5,
                    );
                    let key = g.voxel_key(p);
                    assert!(seen.insert(key), "duplicate key {key:?} for {p:?}");
                    for axis in 0..3 {
                        assert!(key.local_axis(axis) < 2);
                    }
                }
            }
        }
        assert_eq!(seen.len(), 6 * 6 * 6);
    }
}
