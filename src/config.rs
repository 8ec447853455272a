//! Map configuration.

use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr, BitOrAssign};

use crate::error::{MapError, Result};

/// Feature flags used to augment map construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapFlags(u32);

impl MapFlags {
    /// No special features.
    pub const NONE: MapFlags = MapFlags(0);
    /// Enable sub-voxel mean position tracking.
    pub const VOXEL_MEAN: MapFlags = MapFlags(1 << 0);
    /// Accept chunk compression. Recognised for configuration
    /// compatibility; the compression machinery itself lives outside this
    /// crate and the flag carries no behaviour here.
    pub const COMPRESSED: MapFlags = MapFlags(1 << 1);
    /// Default map creation flags.
    pub const DEFAULT: MapFlags = MapFlags::COMPRESSED;

    /// True when every flag in `other` is set in `self`.
    #[inline]
    pub fn contains(self, other: MapFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// These flags with every flag in `other` cleared.
    #[inline]
    pub fn without(self, other: MapFlags) -> MapFlags {
        MapFlags(self.0 & !other.0)
    }

    /// Raw bit representation.
    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl Default for MapFlags {
    fn default() -> Self {
        MapFlags::DEFAULT
    }
}

impl BitOr for MapFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, other: Self) -> Self {
        MapFlags(self.0 | other.0)
    }
}

impl BitOrAssign for MapFlags {
    #[inline]
    fn bitor_assign(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitAnd for MapFlags {
    type Output = Self;

    #[inline]
    fn bitand(self, other: Self) -> Self {
        MapFlags(self.0 & other.0)
    }
}

/// Map construction parameters.
///
/// Probabilities are converted to log-odds at construction; see the
/// occupancy module. Validation happens in `OccupancyMap::new`, returning
/// [`MapError::InvalidConfiguration`] for out-of-range values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapConfig {
    /// Voxel edge length in meters. Must be positive.
    pub resolution: f64,

    /// Per-region voxel dimensions. Each component at least 1; the total
    /// voxel count per region must fit linear u32 indexing (<= 2^24).
    pub region_voxel_dims: [u8; 3],

    /// Feature flags.
    #[serde(default)]
    pub flags: MapFlags,

    /// Probability contributed by a hit. Must lie in (0.5, 1).
    pub hit_probability: f64,

    /// Probability contributed by a miss. Must lie in (0, 0.5).
    pub miss_probability: f64,

    /// Probability above which a voxel counts as occupied. In (0, 1).
    pub occupancy_threshold_probability: f64,

    /// Optional lower clamp on voxel probability.
    #[serde(default)]
    pub min_node_probability: Option<f64>,

    /// Optional upper clamp on voxel probability.
    #[serde(default)]
    pub max_node_probability: Option<f64>,

    /// Latch voxels that reach the lower clamp.
    #[serde(default)]
    pub saturate_at_min: bool,

    /// Latch voxels that reach the upper clamp.
    #[serde(default)]
    pub saturate_at_max: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            resolution: 0.1,
            region_voxel_dims: [32, 32, 32],
            flags: MapFlags::DEFAULT,
            hit_probability: 0.7,
            miss_probability: 0.4,
            occupancy_threshold_probability: 0.5,
            min_node_probability: None,
            max_node_probability: None,
            saturate_at_min: false,
            saturate_at_max: false,
        }
    }
}

impl MapConfig {
    /// Convenience constructor for the common case.
    pub fn with_resolution(resolution: f64) -> Self {
        Self {
            resolution,
            ..Self::default()
        }
    }

    /// Enable sub-voxel mean tracking.
    pub fn with_voxel_mean(mut self) -> Self {
        self.flags |= MapFlags::VOXEL_MEAN;
        self
    }

    /// Check every parameter; all construction errors surface here.
    pub fn validate(&self) -> Result<()> {
        fn bad(message: String) -> Result<()> {
            Err(MapError::InvalidConfiguration(message))
        }

        if !(self.resolution > 0.0 && self.resolution.is_finite()) {
            return bad(format!("resolution must be positive, got {}", self.resolution));
        }
        if self.region_voxel_dims.iter().any(|&d| d == 0) {
            return bad(format!(
                "region dimensions must be at least 1, got {:?}",
                self.region_voxel_dims
            ));
        }
        let voxel_count = self
            .region_voxel_dims
            .iter()
            .map(|&d| d as u64)
            .product::<u64>();
        if voxel_count > 1 << 24 {
            return bad(format!(
                "region voxel count {voxel_count} exceeds the 2^24 indexing limit"
            ));
        }
        if !(self.hit_probability > 0.5 && self.hit_probability < 1.0) {
            return bad(format!(
                "hit probability must lie in (0.5, 1), got {}",
                self.hit_probability
            ));
        }
        if !(self.miss_probability > 0.0 && self.miss_probability < 0.5) {
            return bad(format!(
                "miss probability must lie in (0, 0.5), got {}",
                self.miss_probability
            ));
        }
        if !(self.occupancy_threshold_probability > 0.0
            && self.occupancy_threshold_probability < 1.0)
        {
            return bad(format!(
                "occupancy threshold must lie in (0, 1), got {}",
                self.occupancy_threshold_probability
            ));
        }
        for (name, clamp) in [
            ("min node probability", self.min_node_probability),
            ("max node probability", self.max_node_probability),
        ] {
            if let Some(p) = clamp
                && !(p > 0.0 && p < 1.0)
            {
                return bad(format!("{name} must lie in (0, 1), got {p}"));
            }
        }
        if let (Some(min), Some(max)) = (self.min_node_probability, self.max_node_probability)
            && min > max
        {
            return bad(format!(
                "contradictory clamps: min probability {min} above max {max}"
            ));
        }
        Ok(())
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml_file(&self, path: &std::path::Path) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }

    /// Serialize to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MapConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.region_voxel_dims, [32, 32, 32]);
        assert!(config.flags.contains(MapFlags::COMPRESSED));
        assert!(!config.flags.contains(MapFlags::VOXEL_MEAN));
    }

    #[test]
    fn test_voxel_mean_builder() {
        let config = MapConfig::with_resolution(0.5).with_voxel_mean();
        assert_eq!(config.resolution, 0.5);
        assert!(config.flags.contains(MapFlags::VOXEL_MEAN));
    }

    #[test]
    fn test_rejects_bad_resolution() {
        let mut config = MapConfig::default();
        config.resolution = 0.0;
        assert!(config.validate().is_err());
        config.resolution = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_dimension() {
        let mut config = MapConfig::default();
        config.region_voxel_dims = [32, 0, 32];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_region() {
        let mut config = MapConfig::default();
        config.region_voxel_dims = [255, 255, 255];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_probabilities() {
        let mut config = MapConfig::default();
        config.hit_probability = 0.5;
        assert!(config.validate().is_err());

        let mut config = MapConfig::default();
        config.miss_probability = 0.6;
        assert!(config.validate().is_err());

        let mut config = MapConfig::default();
        config.min_node_probability = Some(0.9);
        config.max_node_probability = Some(0.1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = MapConfig::with_resolution(0.25).with_voxel_mean();
        let yaml = config.to_yaml().unwrap();
        let parsed = MapConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.resolution, config.resolution);
        assert_eq!(parsed.flags, config.flags);
        assert_eq!(parsed.region_voxel_dims, config.region_voxel_dims);
    }

    #[test]
    fn test_yaml_defaults_for_missing_fields() {
        let yaml = "\
resolution: 0.2
region_voxel_dims: [16, 16, 16]
hit_probability: 0.8
miss_probability: 0.45
occupancy_threshold_probability: 0.5
";
        let config = MapConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.flags, MapFlags::DEFAULT);
        assert_eq!(config.min_node_probability, None);
        assert!(!config.saturate_at_max);
    }
}
