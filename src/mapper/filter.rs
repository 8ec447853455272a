//! Stock ray filters.

use crate::core::WorldPoint;

use super::{RayFilter, RayFilterFlags};

/// Build the standard sanity filter for raw sensor rays.
///
/// Rejects rays with non-finite endpoints and clips rays longer than
/// `max_range` back to that length, reporting the clip through
/// [`RayFilterFlags::CLIPPED_END`] so the integration loop treats the
/// clipped sample as free space rather than a surface.
pub fn range_clip_filter(max_range: f64) -> RayFilter {
    Box::new(move |origin: &mut WorldPoint, sample: &mut WorldPoint, flags: &mut RayFilterFlags| {
        if !origin.is_finite() || !sample.is_finite() {
            return false;
        }
        let segment = *sample - *origin;
        let length = segment.length();
        if length > max_range {
            *sample = *origin + segment * (max_range / length);
            *flags |= RayFilterFlags::CLIPPED_END;
        }
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_non_finite() {
        let filter = range_clip_filter(10.0);
        let mut origin = WorldPoint::new(f64::NAN, 0.0, 0.0);
        let mut sample = WorldPoint::new(1.0, 0.0, 0.0);
        let mut flags = RayFilterFlags::default();
        assert!(!filter(&mut origin, &mut sample, &mut flags));
    }

    #[test]
    fn test_passes_short_ray_unchanged() {
        let filter = range_clip_filter(10.0);
        let mut origin = WorldPoint::ZERO;
        let mut sample = WorldPoint::new(3.0, 4.0, 0.0);
        let mut flags = RayFilterFlags::default();
        assert!(filter(&mut origin, &mut sample, &mut flags));
        assert_eq!(sample, WorldPoint::new(3.0, 4.0, 0.0));
        assert!(!flags.contains(RayFilterFlags::CLIPPED_END));
    }

    #[test]
    fn test_clips_long_ray() {
        let filter = range_clip_filter(5.0);
        let mut origin = WorldPoint::ZERO;
        let mut sample = WorldPoint::new(30.0, 40.0, 0.0);
        let mut flags = RayFilterFlags::default();
        assert!(filter(&mut origin, &mut sample, &mut flags));
        assert_relative_eq!(sample.x, 3.0, epsilon = 1e-12);
        assert_relative_eq!(sample.y, 4.0, epsilon = 1e-12);
        assert!(flags.contains(RayFilterFlags::CLIPPED_END));
    }
}
