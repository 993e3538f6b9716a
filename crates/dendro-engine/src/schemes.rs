//! Finite-difference schemes for Hamilton-Jacobi level-set equations.

use dendro_core::IVec3;

use crate::level_set::{axis_offset, FloatGrid};

/// Spatial discretization of the upwind derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpatialScheme {
    /// First-order one-sided differences.
    #[default]
    FirstBias,
    /// Fifth-order WENO biased differences.
    HjWeno5Bias,
}

/// Time integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemporalScheme {
    /// Forward Euler.
    #[default]
    TvdRk1,
    TvdRk2,
    TvdRk3,
}

impl TemporalScheme {
    /// Number of stages per time step.
    pub fn stages(self) -> usize {
        match self {
            Self::TvdRk1 => 1,
            Self::TvdRk2 => 2,
            Self::TvdRk3 => 3,
        }
    }

    /// Blend weight of the original value after stage `stage` (0-based).
    ///
    /// A stage computes `φ* = φ_prev + dt·L(φ_prev)` and stores
    /// `w·φ0 + (1 − w)·φ*`.
    pub fn stage_weight(self, stage: usize) -> f64 {
        match (self, stage) {
            (Self::TvdRk2, 1) => 0.5,
            (Self::TvdRk3, 1) => 0.75,
            (Self::TvdRk3, 2) => 1.0 / 3.0,
            _ => 0.0,
        }
    }
}

/// One-sided derivatives along each axis: `[(minus, plus); 3]`.
pub fn one_sided(grid: &FloatGrid, ijk: IVec3, scheme: SpatialScheme) -> [(f64, f64); 3] {
    let mut out = [(0.0, 0.0); 3];
    for (axis, slot) in out.iter_mut().enumerate() {
        let o = axis_offset(axis);
        let v = |k: i32| f64::from(grid.get(ijk + o * k));
        *slot = match scheme {
            SpatialScheme::FirstBias => {
                let c = v(0);
                (c - v(-1), v(1) - c)
            }
            SpatialScheme::HjWeno5Bias => {
                let f = [v(-3), v(-2), v(-1), v(0), v(1), v(2), v(3)];
                let minus = weno5(
                    f[1] - f[0],
                    f[2] - f[1],
                    f[3] - f[2],
                    f[4] - f[3],
                    f[5] - f[4],
                );
                let plus = weno5(
                    f[6] - f[5],
                    f[5] - f[4],
                    f[4] - f[3],
                    f[3] - f[2],
                    f[2] - f[1],
                );
                (minus, plus)
            }
        };
    }
    out
}

/// Godunov upwind `|∇φ|²` for a front moving along +normal when `forward`.
pub fn godunov_norm_sqr(forward: bool, derivs: &[(f64, f64); 3]) -> f64 {
    derivs
        .iter()
        .map(|&(m, p)| {
            if forward {
                m.max(0.0).powi(2).max(p.min(0.0).powi(2))
            } else {
                m.min(0.0).powi(2).max(p.max(0.0).powi(2))
            }
        })
        .sum()
}

/// Upwind `|∇φ|` at a voxel for normal speed of sign `forward`.
pub fn upwind_gradient_norm(grid: &FloatGrid, ijk: IVec3, scheme: SpatialScheme, forward: bool) -> f64 {
    godunov_norm_sqr(forward, &one_sided(grid, ijk, scheme)).sqrt()
}

/// Fifth-order WENO reconstruction of a derivative from five differences.
pub fn weno5(v1: f64, v2: f64, v3: f64, v4: f64, v5: f64) -> f64 {
    const C: f64 = 13.0 / 12.0;
    let s1 = C * (v1 - 2.0 * v2 + v3).powi(2) + 0.25 * (v1 - 4.0 * v2 + 3.0 * v3).powi(2);
    let s2 = C * (v2 - 2.0 * v3 + v4).powi(2) + 0.25 * (v2 - v4).powi(2);
    let s3 = C * (v3 - 2.0 * v4 + v5).powi(2) + 0.25 * (3.0 * v3 - 4.0 * v4 + v5).powi(2);

    let max_sq = [v1, v2, v3, v4, v5]
        .iter()
        .fold(0.0_f64, |m, v| m.max(v * v));
    let eps = 1e-6 * max_sq + 1e-99;

    let a1 = 0.1 / (s1 + eps).powi(2);
    let a2 = 0.6 / (s2 + eps).powi(2);
    let a3 = 0.3 / (s3 + eps).powi(2);

    (a1 * (2.0 * v1 - 7.0 * v2 + 11.0 * v3)
        + a2 * (-v2 + 5.0 * v3 + 2.0 * v4)
        + a3 * (2.0 * v3 + 5.0 * v4 - v5))
        / (6.0 * (a1 + a2 + a3))
}
