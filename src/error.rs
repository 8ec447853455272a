//! Error types for akasha-map.

use thiserror::Error;

/// Map error type.
///
/// Only fatal conditions surface here. Recoverable anomalies (a missing or
/// mis-sized voxel layer, a ray rejected by the installed filter, arithmetic
/// reaching a value clamp) are absorbed where they occur and never propagate.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("allocation failure: {0}")]
    Allocation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for MapError {
    fn from(e: serde_yaml::Error) -> Self {
        MapError::InvalidConfiguration(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MapError>;
