//! # Akasha-Map: Probabilistic 3D Occupancy Mapping
//!
//! A sparse, chunked occupancy map engine for robotics pipelines that turn
//! LiDAR point clouds plus sensor trajectories into a queryable log-odds
//! occupancy field, with optional sub-voxel mean position tracking.
//!
//! ## Features
//!
//! - **Sparse, unbounded grid**: space is tiled into fixed-size regions;
//!   a region's voxel memory is allocated only when a ray first touches it
//! - **Log-odds Bayesian updates**: additive hit/miss evidence with value
//!   clamps, saturation latching and a distinct "unobserved" state
//! - **Exact ray traversal**: Amanatides-Woo 3D DDA visits every voxel a
//!   ray intersects, in order, with no gaps and no repeats
//! - **Sub-voxel means**: each occupied voxel can track the running mean of
//!   its sample positions in 16-bit fixed point
//! - **Write stamps**: monotonic per-chunk, per-layer stamps let background
//!   readers and serialisers detect changes without scanning voxels
//!
//! ## Quick Start
//!
//! ```rust
//! use akasha_map::{MapConfig, OccupancyMap, RayFlags, WorldPoint};
//!
//! // 10 cm voxels, sub-voxel mean tracking on.
//! let config = MapConfig::with_resolution(0.1).with_voxel_mean();
//! let mut map = OccupancyMap::new(&config).unwrap();
//!
//! // Rays are (sensor origin, measured sample) pairs in the world frame.
//! let rays = [
//!     WorldPoint::new(0.0, 0.0, 0.0),
//!     WorldPoint::new(2.0, 1.0, 0.5),
//! ];
//! let accepted = map.integrate_rays(&rays, RayFlags::DEFAULT);
//! assert_eq!(accepted, 1);
//!
//! // Query the sample voxel.
//! let key = map.voxel_key(WorldPoint::new(2.0, 1.0, 0.5));
//! let voxel = map.voxel(key).unwrap();
//! assert!(voxel.is_occupied());
//! ```
//!
//! ## Architecture
//!
//! ```text
//!            (origin, sample) ray pairs
//!                      │
//!                      ▼
//!              ┌───────────────┐    ray filter (clip / reject)
//!              │ OccupancyMap  │───────────────┐
//!              │   (façade)    │◄──────────────┘
//!              └───────┬───────┘
//!                      │ per batch
//!                      ▼
//!            ┌──────────────────┐     ┌──────────────────┐
//!            │ OccupancyRay-    │────►│   SegmentWalk    │
//!            │ Mapper           │◄────│   (3D DDA)       │
//!            └────────┬─────────┘     └──────────────────┘
//!                     │ per voxel: log-odds miss/hit,
//!                     │ sub-voxel mean, stamps
//!                     ▼
//!            ┌──────────────────┐
//!            │    ChunkStore    │──► Chunk { occupancy, mean, ... }
//!            │ (sparse regions) │    allocated on first touch
//!            └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`core`]: fundamental types (WorldPoint, RegionCoord, VoxelKey,
//!   MapGeometry)
//! - [`layout`]: named voxel layers and their byte layouts
//! - [`store`]: sparse chunk storage
//! - [`occupancy`]: log-odds arithmetic
//! - [`walk`]: segment traversal
//! - [`mapper`]: ray integration strategies, flags and filters
//! - [`mean`]: packed sub-voxel mean records
//! - [`map`]: the map façade and voxel handles
//! - [`config`]: construction parameters with YAML round-trips
//!
//! ## Threading
//!
//! A map accepts one writer at a time; callers serialise mutating calls.
//! Concurrent readers are supported through optimistic stamp checks: read
//! the layer's touched stamp, read the voxels, re-read the stamp and retry
//! if it moved. Stamp stores are relaxed; the guarantee is "a changed stamp
//! means at least one write happened since", not a happens-before edge.

pub mod config;
pub mod core;
pub mod error;
pub mod layout;
pub mod map;
pub mod mapper;
pub mod mean;
pub mod occupancy;
pub mod store;
pub mod walk;

// Re-export the main types at the crate root.
pub use crate::config::{MapConfig, MapFlags};
pub use crate::core::{MapGeometry, RegionCoord, VoxelKey, WorldPoint};
pub use crate::error::{MapError, Result};
pub use crate::map::{OccupancyMap, Voxel};
pub use crate::mapper::{
    OccupancyRayMapper, RayFilter, RayFilterFlags, RayFlags, RayMapper, range_clip_filter,
};
pub use crate::mean::VoxelMean;
pub use crate::walk::SegmentWalk;
