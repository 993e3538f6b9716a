//! Shape morphing of one level set toward another.

use crate::filter::AlphaMask;
use crate::level_set::FloatGrid;
use crate::schemes::{upwind_gradient_norm, SpatialScheme, TemporalScheme};
use crate::tracker::{rk_step, LevelSetTracker};

/// Largest surface displacement per time step, in voxels.
const CFL: f64 = 0.5;

/// Upper bound on time steps for a single advection call.
const MAX_STEPS: usize = 10_000;

/// Largest change, in voxels, of a near-surface value for a step to count as
/// stationary.
const STATIONARY_MOTION: f32 = 1e-4;

/// Advects a level set so its surface moves toward a target surface.
///
/// The surface moves along its normal with speed `−α·φ_target`: it grows
/// where it lies inside the target and shrinks where it lies outside. The
/// target must share the source's lattice.
#[derive(Debug, Clone, Copy)]
pub struct LevelSetMorphing<'a> {
    target: &'a FloatGrid,
    spatial: SpatialScheme,
    temporal: TemporalScheme,
    tracker: LevelSetTracker,
    grain_size: usize,
    mask: Option<AlphaMask<'a>>,
}

impl<'a> LevelSetMorphing<'a> {
    /// Morphing with HJ-WENO5 upwinding, TVD-RK3 advection and a TVD-RK2 tracker.
    pub fn new(target: &'a FloatGrid, grain_size: usize) -> Self {
        let grain_size = grain_size.max(1);
        Self {
            target,
            spatial: SpatialScheme::HjWeno5Bias,
            temporal: TemporalScheme::TvdRk3,
            tracker: LevelSetTracker::new(
                SpatialScheme::HjWeno5Bias,
                TemporalScheme::TvdRk2,
                1,
                grain_size,
            ),
            grain_size,
            mask: None,
        }
    }

    #[must_use]
    pub fn with_schemes(mut self, spatial: SpatialScheme, temporal: TemporalScheme) -> Self {
        self.spatial = spatial;
        self.temporal = temporal;
        self
    }

    #[must_use]
    pub fn with_tracker(mut self, tracker: LevelSetTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Scales the speed by `mask`.
    #[must_use]
    pub fn with_mask(mut self, mask: AlphaMask<'a>) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Advects `grid` from time `t0` to `t1` and returns the number of steps.
    ///
    /// The speed field does not change over time, so advection ends early
    /// once a step leaves the zero crossing where it was.
    pub fn advect(&self, grid: &mut FloatGrid, t0: f64, t1: f64) -> usize {
        if !(t0 < t1) {
            return 0;
        }
        self.tracker.with_working_band(grid, |grid| {
            let mut t = t0;
            let mut steps = 0;
            while t < t1 {
                if steps == MAX_STEPS {
                    log::warn!("morph stopped after {MAX_STEPS} steps at t={t} of {t1}");
                    break;
                }
                let max_speed = self.max_speed(grid);
                if max_speed <= f64::EPSILON {
                    break;
                }
                let dt = (CFL / max_speed).min(t1 - t);
                let surface: Vec<_> = grid.iter_active().filter(|(_, v)| v.abs() < 1.0).collect();
                self.step(grid, dt);
                t += dt;
                steps += 1;
                let motion = surface
                    .iter()
                    .map(|&(ijk, v)| (grid.get(ijk) - v).abs())
                    .fold(0.0, f32::max);
                if motion < STATIONARY_MOTION {
                    log::debug!("surface stationary at t={t}");
                    break;
                }
            }
            log::debug!("morphed from t={t0} to t={t} in {steps} steps");
            steps
        })
    }

    fn speed(&self, grid: &FloatGrid, ijk: dendro_core::IVec3) -> f64 {
        let alpha = self
            .mask
            .map_or(1.0, |m| m.alpha(grid.index_to_world(ijk)));
        -alpha * f64::from(self.target.get(ijk))
    }

    fn max_speed(&self, grid: &FloatGrid) -> f64 {
        grid.iter_active()
            .map(|(ijk, _)| self.speed(grid, ijk).abs())
            .fold(0.0, f64::max)
    }

    fn step(&self, grid: &mut FloatGrid, dt: f64) {
        let spatial = self.spatial;
        rk_step(grid, self.temporal, dt, self.grain_size, |phi, ijk, _| {
            let speed = self.speed(phi, ijk);
            if speed == 0.0 {
                return 0.0;
            }
            -speed * upwind_gradient_norm(phi, ijk, spatial, speed > 0.0)
        });
        self.tracker.track(grid);
    }
}
