//! Conversion and meshing settings.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Smallest voxel size accepted by [`Settings::validated`].
pub const MIN_VOXEL_SIZE: f64 = 0.01;

/// Smallest narrow-band half-width (in voxels) accepted by [`Settings::validated`].
pub const MIN_BANDWIDTH: f64 = 1.0;

/// Settings shared by every conversion into and out of a volume.
///
/// One `Settings` value is usually applied to many grids so that they live on
/// compatible lattices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Edge length of a voxel in world units.
    pub voxel_size: f64,

    /// Half-width of the narrow band, in voxels.
    pub bandwidth: f64,

    /// Iso-surface threshold used when meshing (world units).
    pub isovalue: f64,

    /// Mesh simplification aggressiveness in `[0, 1]`.
    pub adaptivity: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            voxel_size: 0.5,
            bandwidth: 1.0,
            isovalue: 0.01,
            adaptivity: 0.1,
        }
    }
}

impl Settings {
    /// Creates settings with the given voxel size and bandwidth, keeping the
    /// default meshing parameters.
    pub fn new(voxel_size: f64, bandwidth: f64) -> Self {
        Self {
            voxel_size,
            bandwidth,
            ..Self::default()
        }
    }

    /// Sets the meshing isovalue.
    #[must_use]
    pub fn with_isovalue(mut self, isovalue: f64) -> Self {
        self.isovalue = isovalue;
        self
    }

    /// Sets the meshing adaptivity.
    #[must_use]
    pub fn with_adaptivity(mut self, adaptivity: f64) -> Self {
        self.adaptivity = adaptivity;
        self
    }

    /// Returns a copy with voxel size and bandwidth raised to their minimums.
    #[must_use]
    pub fn validated(self) -> Self {
        let mut settings = self;
        if !(settings.voxel_size >= MIN_VOXEL_SIZE) {
            log::warn!(
                "voxel size {} below minimum, using {MIN_VOXEL_SIZE}",
                settings.voxel_size
            );
            settings.voxel_size = MIN_VOXEL_SIZE;
        }
        if !(settings.bandwidth >= MIN_BANDWIDTH) {
            log::warn!(
                "bandwidth {} below minimum, using {MIN_BANDWIDTH}",
                settings.bandwidth
            );
            settings.bandwidth = MIN_BANDWIDTH;
        }
        settings.adaptivity = settings.adaptivity.clamp(0.0, 1.0);
        settings
    }

    /// Parses settings from a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Writes settings to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
