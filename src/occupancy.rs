//! Log-odds occupancy arithmetic.
//!
//! Voxel occupancy is stored as a 32-bit float log-odds value and updated
//! additively: `L_new = L_old + L_observation`. A hit (ray terminates in the
//! voxel) adds a positive increment, a miss (ray passes through) a negative
//! one. A voxel that has never been observed holds a sentinel distinct from
//! every finite log-odds value; its first observation writes the increment
//! directly rather than accumulating from the sentinel.
//!
//! Value clamps bound the accumulated evidence. When a saturation flag is
//! set, a voxel that reaches the corresponding clamp latches there and
//! ignores all further adjustments.

/// Sentinel for a voxel that has never been observed.
///
/// Negative infinity is outside every permitted clamp range, compares
/// exactly, and cannot be produced by the clamped update arithmetic.
pub const UNOBSERVED_VALUE: f32 = f32::NEG_INFINITY;

/// Convert a probability in (0, 1) to its log-odds value.
#[inline]
pub fn probability_to_value(probability: f64) -> f32 {
    (probability / (1.0 - probability)).ln() as f32
}

/// Convert a log-odds value back to a probability.
#[inline]
pub fn value_to_probability(value: f32) -> f64 {
    let v = value as f64;
    1.0 / (1.0 + (-v).exp())
}

/// True when `value` marks an observed voxel above the occupancy threshold.
#[inline]
pub fn is_occupied_value(value: f32, threshold: f32) -> bool {
    value != UNOBSERVED_VALUE && value > threshold
}

/// Apply a miss (free-space evidence) to an occupancy value.
///
/// `inhibit` suppresses the update entirely: it is set once adjustments stop
/// along a ray, or when a clear-only pass visits a voxel that is not
/// currently occupied. An unobserved voxel takes `miss_value` directly as
/// its first evidence; a voxel at a saturation bound stays latched.
#[inline]
pub fn occupancy_adjust_miss(
    current: f32,
    miss_value: f32,
    voxel_min: f32,
    saturation_min: f32,
    saturation_max: f32,
    inhibit: bool,
) -> f32 {
    if inhibit {
        return current;
    }
    if current == UNOBSERVED_VALUE {
        return miss_value.max(voxel_min);
    }
    if current <= saturation_min || current >= saturation_max {
        return current;
    }
    (current + miss_value).max(voxel_min)
}

/// Apply a hit (occupancy evidence) to an occupancy value.
///
/// Symmetric to [`occupancy_adjust_miss`] with a positive increment and the
/// upper clamp.
#[inline]
pub fn occupancy_adjust_hit(
    current: f32,
    hit_value: f32,
    voxel_max: f32,
    saturation_min: f32,
    saturation_max: f32,
    inhibit: bool,
) -> f32 {
    if inhibit {
        return current;
    }
    if current == UNOBSERVED_VALUE {
        return hit_value.min(voxel_max);
    }
    if current <= saturation_min || current >= saturation_max {
        return current;
    }
    (current + hit_value).min(voxel_max)
}
