//! Core types for akasha-map.
//!
//! Fundamental value types shared by every other module:
//! - [`WorldPoint`]: 3D point in the world frame (f64 meters)
//! - [`RegionCoord`]: signed coordinate of a region in the region grid
//! - [`VoxelKey`]: region coordinate + local voxel index
//! - [`MapGeometry`]: resolution and region dimensions with all
//!   world/region/key conversions
//!
//! Everything here is a plain value type; no storage, no state.

pub mod geometry;
pub mod key;
pub mod point;

pub use geometry::MapGeometry;
pub use key::{RegionCoord, VoxelKey};
pub use point::WorldPoint;
