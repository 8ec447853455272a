//! Sub-voxel mean position tracking.
//!
//! Each voxel in the `mean` layer carries the running mean of the sample
//! positions that hit it, stored as a quantised offset from the voxel centre
//! plus a sample count. The offset range is `[-resolution/2, +resolution/2]`
//! per axis, mapped linearly onto 16-bit signed fixed point, so positional
//! accuracy scales with the voxel resolution rather than with absolute
//! distance from the map origin.

use crate::core::WorldPoint;

/// Byte size of one packed mean record: `i16 x, i16 y, i16 z, u16 pad,
/// u32 count`, little-endian.
pub const VOXEL_MEAN_BYTES: usize = 12;

/// Fixed-point full-scale value: `resolution / 2` maps to this.
const QUANT_SCALE: f64 = i16::MAX as f64;

/// Packed per-voxel mean record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct VoxelMean {
    /// Quantised mean offset from the voxel centre, per axis.
    pub coord: [i16; 3],
    /// Number of samples accumulated into the mean.
    pub count: u32,
}

/// Quantise a metric offset to fixed point. Clamped to full scale, so the
/// reconstructed offset can never leave the voxel.
#[inline]
fn quantise(offset: f64, resolution: f64) -> i16 {
    let half = 0.5 * resolution;
    let q = (offset / half * QUANT_SCALE).round();
    q.clamp(-QUANT_SCALE, QUANT_SCALE) as i16
}

/// Reconstruct a metric offset from fixed point.
#[inline]
fn dequantise(q: i16, resolution: f64) -> f64 {
    q as f64 / QUANT_SCALE * 0.5 * resolution
}

impl VoxelMean {
    /// Decode a record from its little-endian byte representation.
    pub fn decode(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() >= VOXEL_MEAN_BYTES);
        let read_i16 = |at: usize| i16::from_le_bytes([bytes[at], bytes[at + 1]]);
        Self {
            coord: [read_i16(0), read_i16(2), read_i16(4)],
            count: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }

    /// Encode the record into its little-endian byte representation.
    pub fn encode(&self, bytes: &mut [u8]) {
        debug_assert!(bytes.len() >= VOXEL_MEAN_BYTES);
        bytes[0..2].copy_from_slice(&self.coord[0].to_le_bytes());
        bytes[2..4].copy_from_slice(&self.coord[1].to_le_bytes());
        bytes[4..6].copy_from_slice(&self.coord[2].to_le_bytes());
        bytes[6..8].copy_from_slice(&0u16.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.count.to_le_bytes());
    }

    /// Build a record holding a single sample at the given offset from the
    /// voxel centre.
    pub fn from_offset(offset: WorldPoint, resolution: f64) -> Self {
        Self {
            coord: [
                quantise(offset.x, resolution),
                quantise(offset.y, resolution),
                quantise(offset.z, resolution),
            ],
            count: 1,
        }
    }

    /// Reconstruct the mean offset from the voxel centre, in meters.
    pub fn offset(&self, resolution: f64) -> WorldPoint {
        WorldPoint::new(
            dequantise(self.coord[0], resolution),
            dequantise(self.coord[1], resolution),
            dequantise(self.coord[2], resolution),
        )
    }

    /// Fold one new sample offset into the running mean.
    ///
    /// Online arithmetic mean: `d' = (d * n + sample) / (n + 1)`, clamped to
    /// the half-resolution range per axis before re-quantisation. The count
    /// saturates one below `u32::MAX`.
    pub fn with_sample(&self, sample_offset: WorldPoint, resolution: f64) -> Self {
        let half = 0.5 * resolution;
        let n = self.count as f64;
        let old = self.offset(resolution);
        let mut coord = [0i16; 3];
        for axis in 0..3 {
            let updated = (old.axis(axis) * n + sample_offset.axis(axis)) / (n + 1.0);
            coord[axis] = quantise(updated.clamp(-half, half), resolution);
        }
        Self {
            coord,
            count: if self.count < u32::MAX - 1 {
                self.count + 1
            } else {
                self.count
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const RES: f64 = 0.5;

    #[test]
    fn test_encode_decode_round_trip() {
        let mean = VoxelMean {
            coord: [1234, -4321, 32767],
            count: 77,
        };
        let mut bytes = [0u8; VOXEL_MEAN_BYTES];
        mean.encode(&mut bytes);
        assert_eq!(VoxelMean::decode(&bytes), mean);
    }

    #[test]
    fn test_byte_layout_is_little_endian() {
        let mean = VoxelMean {
            coord: [1, 2, 3],
            count: 4,
        };
        let mut bytes = [0xAAu8; VOXEL_MEAN_BYTES];
        mean.encode(&mut bytes);
        assert_eq!(
            bytes,
            [1, 0, 2, 0, 3, 0, 0, 0, 4, 0, 0, 0]
        );
    }

    #[test]
    fn test_quantisation_accuracy() {
        let offset = WorldPoint::new(0.05, -0.20, 0.15);
        let mean = VoxelMean::from_offset(offset, RES);
        let back = mean.offset(RES);
        // Quantisation step is (res/2) / 32767.
        let step = 0.5 * RES / 32767.0;
        for axis in 0..3 {
            assert!((back.axis(axis) - offset.axis(axis)).abs() <= step);
        }
        assert_eq!(mean.count, 1);
    }

    #[test]
    fn test_offset_clamped_to_half_voxel() {
        // An out-of-range offset cannot push the stored mean outside the voxel.
        let mean = VoxelMean::from_offset(WorldPoint::new(10.0, -10.0, 0.0), RES);
        let back = mean.offset(RES);
        assert_relative_eq!(back.x, 0.25);
        assert_relative_eq!(back.y, -0.25);
    }

    #[test]
    fn test_incremental_mean_converges() {
        let mut mean = VoxelMean::default();
        // Alternate two offsets; the mean should settle on their average.
        for i in 0..100 {
            let s = if i % 2 == 0 { 0.1 } else { 0.2 };
            mean = mean.with_sample(WorldPoint::new(s, 0.0, 0.0), RES);
        }
        assert_eq!(mean.count, 100);
        let back = mean.offset(RES);
        assert_relative_eq!(back.x, 0.15, epsilon = 1e-3);
        assert_relative_eq!(back.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_count_saturates() {
        let mean = VoxelMean {
            coord: [0, 0, 0],
            count: u32::MAX - 1,
        };
        let updated = mean.with_sample(WorldPoint::ZERO, RES);
        assert_eq!(updated.count, u32::MAX - 1);
    }
}
