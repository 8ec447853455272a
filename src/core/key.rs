//! Voxel addressing: region coordinates and voxel keys.
//!
//! Space is tiled by fixed-size regions; a voxel is addressed by the signed
//! integer coordinate of its region plus its local index within that region.
//! This two-level scheme is what lets the map stay sparse and unbounded:
//! only regions that have been touched are ever allocated.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Signed integer coordinate of a region in the region grid.
///
/// Regions tile space with no gaps or overlaps; there is no bounded range
/// beyond what i16 can represent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RegionCoord {
    /// X region index.
    pub x: i16,
    /// Y region index.
    pub y: i16,
    /// Z region index.
    pub z: i16,
}

impl RegionCoord {
    /// Create a new region coordinate.
    #[inline]
    pub fn new(x: i16, y: i16, z: i16) -> Self {
        Self { x, y, z }
    }

    /// Component access by axis index (0 = x, 1 = y, 2 = z).
    #[inline]
    pub fn axis(&self, axis: usize) -> i16 {
        match axis {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// Offset one axis by `delta` regions.
    #[inline]
    pub fn offset_axis(&self, axis: usize, delta: i16) -> Self {
        let mut r = *self;
        match axis {
            0 => r.x = r.x.wrapping_add(delta),
            1 => r.y = r.y.wrapping_add(delta),
            _ => r.z = r.z.wrapping_add(delta),
        }
        r
    }
}

impl Add for RegionCoord {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        RegionCoord::new(
            self.x.wrapping_add(other.x),
            self.y.wrapping_add(other.y),
            self.z.wrapping_add(other.z),
        )
    }
}

impl Sub for RegionCoord {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        RegionCoord::new(
            self.x.wrapping_sub(other.x),
            self.y.wrapping_sub(other.y),
            self.z.wrapping_sub(other.z),
        )
    }
}

/// Key uniquely identifying a voxel anywhere in the grid.
///
/// The key pairs the region coordinate with the voxel's local index inside
/// that region. Local indices are always `< region_voxel_dims` on each axis.
/// Equality is component-wise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VoxelKey {
    /// Coordinate of the containing region.
    pub region: RegionCoord,
    /// Local voxel index within the region, per axis.
    pub local: [u16; 3],
}

impl VoxelKey {
    /// Create a new key from region and local parts.
    #[inline]
    pub fn new(region: RegionCoord, local: [u16; 3]) -> Self {
        Self { region, local }
    }

    /// The containing region's coordinate.
    #[inline]
    pub fn region(&self) -> RegionCoord {
        self.region
    }

    /// Local index on one axis.
    #[inline]
    pub fn local_axis(&self, axis: usize) -> u16 {
        self.local[axis]
    }

    /// Step the key one voxel along `axis` in direction `dir` (+1 or -1),
    /// carrying into the neighbouring region at region boundaries.
    ///
    /// `dims` are the per-region voxel dimensions; local indices stay within
    /// `[0, dims.axis)` after the step.
    #[inline]
    pub fn step(&mut self, axis: usize, dir: i32, dims: [u8; 3]) {
        let extent = dims[axis] as i32;
        let next = self.local[axis] as i32 + dir;
        if next < 0 {
            self.local[axis] = (extent - 1) as u16;
            self.region = self.region.offset_axis(axis, -1);
        } else if next >= extent {
            self.local[axis] = 0;
            self.region = self.region.offset_axis(axis, 1);
        } else {
            self.local[axis] = next as u16;
        }
    }
}
