//! Ray integration into the map.
//!
//! A [`RayMapper`] consumes batches of (origin, sample) pairs and folds them
//! into voxel layers; [`OccupancyRayMapper`] is the log-odds occupancy
//! implementation. Dispatch over mapper implementations happens once per
//! batch, never per voxel, so the inner integration loop stays monomorphic.
//!
//! [`RayFlags`] select per-batch integration policies and
//! [`RayFilterFlags`] report what an installed [`RayFilter`] did to a ray's
//! endpoints before traversal.

mod filter;
mod occupancy;

pub use filter::range_clip_filter;
pub use occupancy::OccupancyRayMapper;

use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::core::WorldPoint;

/// Per-batch ray integration policy flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RayFlags(u32);

impl RayFlags {
    /// Default behaviour: miss along the ray, hit at the sample.
    pub const DEFAULT: RayFlags = RayFlags(0);
    /// Treat the sample voxel as a miss, never as a hit.
    pub const END_POINT_AS_FREE: RayFlags = RayFlags(1 << 0);
    /// Once a voxel on the path is currently occupied, suppress all further
    /// adjustments for this ray, including the hit.
    pub const STOP_ON_FIRST_OCCUPIED: RayFlags = RayFlags(1 << 1);
    /// Only adjust voxels that are currently occupied (decay mode).
    pub const CLEAR_ONLY: RayFlags = RayFlags(1 << 2);
    /// Skip the miss pass along the ray entirely.
    pub const EXCLUDE_RAY: RayFlags = RayFlags(1 << 3);
    /// Skip the hit pass at the sample entirely.
    pub const EXCLUDE_SAMPLE: RayFlags = RayFlags(1 << 4);

    /// True when every flag in `other` is set in `self`.
    #[inline]
    pub fn contains(self, other: RayFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bit representation.
    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for RayFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, other: Self) -> Self {
        RayFlags(self.0 | other.0)
    }
}

impl BitOrAssign for RayFlags {
    #[inline]
    fn bitor_assign(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitAnd for RayFlags {
    type Output = Self;

    #[inline]
    fn bitand(self, other: Self) -> Self {
        RayFlags(self.0 & other.0)
    }
}

/// Flags a ray filter reports back about endpoint mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RayFilterFlags(u32);

impl RayFilterFlags {
    /// The origin end of the ray was moved.
    pub const CLIPPED_START: RayFilterFlags = RayFilterFlags(1 << 0);
    /// The sample end of the ray was moved; the sample no longer marks a
    /// surface, so it is folded into the miss pass.
    pub const CLIPPED_END: RayFilterFlags = RayFilterFlags(1 << 1);

    /// True when every flag in `other` is set in `self`.
    #[inline]
    pub fn contains(self, other: RayFilterFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RayFilterFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, other: Self) -> Self {
        RayFilterFlags(self.0 | other.0)
    }
}

impl BitOrAssign for RayFilterFlags {
    #[inline]
    fn bitor_assign(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

/// Pluggable ray predicate, invoked before traversal.
///
/// May mutate the endpoints and set [`RayFilterFlags`]; returning false
/// discards the ray (it does not count toward the integrated total).
pub type RayFilter =
    Box<dyn Fn(&mut WorldPoint, &mut WorldPoint, &mut RayFilterFlags) -> bool + Send + Sync>;

/// Capability interface for ray integration strategies.
pub trait RayMapper {
    /// Integrate a batch of rays. `rays` holds consecutive
    /// (origin, sample) pairs; a trailing unpaired element is ignored.
    ///
    /// Returns the number of pairs accepted. Rays rejected by the installed
    /// filter are skipped silently; a fatal allocation failure ends the
    /// batch after the pairs that already integrated.
    fn integrate_rays(&mut self, rays: &[WorldPoint], flags: RayFlags) -> usize;
}
