//! Voxel traversal along a line segment (3D DDA).
//!
//! Amanatides-Woo stepping: track the parametric distance to the next voxel
//! boundary on each axis and repeatedly advance the axis with the smallest
//! one. Produces every voxel the segment intersects, in order, with no
//! repeats and no gaps.
//!
//! The walker knows nothing about maps or storage; it is constructed from
//! map-local endpoints and a [`MapGeometry`] and yields [`VoxelKey`]s for a
//! consumer to act on.

use crate::core::{MapGeometry, VoxelKey, WorldPoint};

/// Iterator over the voxel keys intersected by a line segment.
///
/// Keys before the end voxel are always yielded; the end voxel itself is
/// yielded only when `include_end` is set. A zero-length segment yields the
/// single start voxel, again only under `include_end`.
///
/// When two boundary crossings coincide, the lower axis advances first
/// (x before y before z).
pub struct SegmentWalk {
    dims: [u8; 3],
    current: VoxelKey,
    end: VoxelKey,
    step: [i32; 3],
    t_max: [f64; 3],
    t_delta: [f64; 3],
    include_end: bool,
    done: bool,
}

impl SegmentWalk {
    /// Walk from `start` to `end`, both in map-local meters.
    pub fn new(start: WorldPoint, end: WorldPoint, include_end: bool, geometry: &MapGeometry) -> Self {
        let current = geometry.voxel_key(start);
        let end_key = geometry.voxel_key(end);
        let min_corner = geometry.voxel_min_corner_local(current);
        let resolution = geometry.resolution();
        let direction = end - start;

        let mut step = [0i32; 3];
        let mut t_max = [f64::INFINITY; 3];
        let mut t_delta = [f64::INFINITY; 3];
        for axis in 0..3 {
            let d = direction.axis(axis);
            if d > 0.0 {
                step[axis] = 1;
                t_max[axis] = (min_corner.axis(axis) + resolution - start.axis(axis)) / d;
                t_delta[axis] = resolution / d;
            } else if d < 0.0 {
                step[axis] = -1;
                t_max[axis] = (min_corner.axis(axis) - start.axis(axis)) / d;
                t_delta[axis] = -resolution / d;
            }
        }

        Self {
            dims: geometry.region_dims(),
            current,
            end: end_key,
            step,
            t_max,
            t_delta,
            include_end,
            done: false,
        }
    }

    /// Key of the segment's end voxel.
    #[inline]
    pub fn end_key(&self) -> VoxelKey {
        self.end
    }
}

impl Iterator for SegmentWalk {
    type Item = VoxelKey;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.current == self.end {
            self.done = true;
            return self.include_end.then_some(self.current);
        }

        let result = self.current;

        // Advance the axis whose next boundary crossing is closest; on a
        // tie the lower axis wins.
        let mut axis = 0;
        if self.t_max[1] < self.t_max[axis] {
            axis = 1;
        }
        if self.t_max[2] < self.t_max[axis] {
            axis = 2;
        }

        // The parametric range of the segment is [0, 1]. A next crossing
        // beyond 1 means rounding kept the key from reaching the end voxel
        // exactly; collapse onto it so termination is guaranteed.
        if self.step[axis] == 0 || self.t_max[axis] > 1.0 {
            self.current = self.end;
        } else {
            self.current.step(axis, self.step[axis], self.dims);
            self.t_max[axis] += self.t_delta[axis];
        }

        Some(result)
    }
}
