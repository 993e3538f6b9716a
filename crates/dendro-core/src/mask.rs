//! Value ranges that turn a grid into a per-voxel weight.

use serde::{Deserialize, Serialize};

/// Maps mask values to a weight in `[0, 1]`.
///
/// Values at or below `min` weigh 0, values at or above `max` weigh 1, with a
/// linear ramp in between. `invert` swaps the two ends. When `min >= max` the
/// range degenerates into a hard threshold at `min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskRange {
    pub min: f64,
    pub max: f64,
    pub invert: bool,
}

impl Default for MaskRange {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            invert: false,
        }
    }
}

impl MaskRange {
    pub fn new(min: f64, max: f64, invert: bool) -> Self {
        Self { min, max, invert }
    }

    /// Weight for a mask value.
    pub fn alpha(&self, value: f64) -> f64 {
        let a = if self.min < self.max {
            ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
        } else if value >= self.min {
            1.0
        } else {
            0.0
        };
        if self.invert {
            1.0 - a
        } else {
            a
        }
    }
}
