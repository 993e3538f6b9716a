//! Narrow-band maintenance: renormalization and band rebuild.

use std::collections::{HashMap, HashSet};

use dendro_core::{DVec3, IVec3};
use rayon::prelude::*;

use crate::level_set::{axis_offset, FloatGrid, FACE_NEIGHBORS};
use crate::schemes::{upwind_gradient_norm, SpatialScheme, TemporalScheme};

/// Pseudo-time step of the renormalization equation, in voxels.
const RENORM_DT: f64 = 0.3;

/// Narrowest band, in voxels, that filters, tracking and morphing work on.
pub const MIN_WORKING_WIDTH: f32 = 3.0;

/// Keeps a level set a signed distance field inside its narrow band.
///
/// Tracking runs `normalize_count` steps of the reinitialization equation
/// `φ_t + S(φ₀)(|∇φ| − 1) = 0` and then rebuilds the band from the zero
/// crossing out to the half-width, pruning everything beyond it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelSetTracker {
    pub spatial: SpatialScheme,
    pub temporal: TemporalScheme,
    pub normalize_count: usize,
    pub grain_size: usize,
}

impl Default for LevelSetTracker {
    fn default() -> Self {
        Self {
            spatial: SpatialScheme::FirstBias,
            temporal: TemporalScheme::TvdRk1,
            normalize_count: 1,
            grain_size: 1,
        }
    }
}

impl LevelSetTracker {
    pub fn new(
        spatial: SpatialScheme,
        temporal: TemporalScheme,
        normalize_count: usize,
        grain_size: usize,
    ) -> Self {
        Self {
            spatial,
            temporal,
            normalize_count,
            grain_size: grain_size.max(1),
        }
    }

    /// Renormalizes and rebuilds the narrow band.
    pub fn track(&self, grid: &mut FloatGrid) {
        self.with_working_band(grid, |grid| {
            for _ in 0..self.normalize_count {
                self.normalize(grid);
            }
            self.rebuild_band(grid);
        });
    }

    /// Runs `op` on a band at least [`MIN_WORKING_WIDTH`] voxels wide.
    ///
    /// Narrower level sets are widened by a band rebuild first and narrowed
    /// back to their own half-width afterwards.
    pub fn with_working_band<R>(
        &self,
        grid: &mut FloatGrid,
        op: impl FnOnce(&mut FloatGrid) -> R,
    ) -> R {
        let half_width = grid.half_width();
        if !grid.is_level_set() || half_width >= MIN_WORKING_WIDTH {
            return op(grid);
        }
        self.rebuild_band_to(grid, MIN_WORKING_WIDTH);
        let out = op(grid);
        grid.narrow_band(half_width);
        out
    }

    /// One pseudo-time step of the reinitialization equation.
    pub fn normalize(&self, grid: &mut FloatGrid) {
        let spatial = self.spatial;
        rk_step(grid, self.temporal, RENORM_DT, self.grain_size, |phi, ijk, v0| {
            let s = v0 / (v0 * v0 + 1.0).sqrt();
            let norm = upwind_gradient_norm(phi, ijk, spatial, s > 0.0);
            -s * (norm - 1.0)
        });
    }

    /// Recomputes band values as distances to the zero crossing.
    pub fn rebuild_band(&self, grid: &mut FloatGrid) {
        let half_width = grid.half_width();
        self.rebuild_band_to(grid, half_width);
    }

    /// Rebuilds the band out to `half_width`, which becomes the background.
    ///
    /// Voxels next to a sign change get a closest interface point from the
    /// per-axis crossings; those points are then carried outward layer by
    /// layer until the half-width is covered.
    pub fn rebuild_band_to(&self, grid: &mut FloatGrid, half_width: f32) {
        let hw = f64::from(half_width);

        let mut seeds: HashSet<IVec3> = HashSet::new();
        for (ijk, v) in grid.iter_active() {
            let inside = v < 0.0;
            for o in FACE_NEIGHBORS {
                let n = ijk + o;
                if (grid.get(n) < 0.0) != inside {
                    seeds.insert(ijk);
                    seeds.insert(n);
                }
            }
        }
        let mut seeds: Vec<IVec3> = seeds.into_iter().collect();
        seeds.sort_unstable_by_key(|ijk| (ijk.z, ijk.y, ijk.x));

        let source: &FloatGrid = grid;
        let mut closest: HashMap<IVec3, DVec3> = seeds
            .par_iter()
            .with_min_len(self.grain_size)
            .map(|&ijk| (ijk, interface_point(source, ijk)))
            .collect();

        let layers = hw.ceil() as usize + 1;
        let mut frontier = seeds;
        for _ in 0..layers {
            let mut next: HashMap<IVec3, DVec3> = HashMap::new();
            for &v in &frontier {
                let p = closest[&v];
                for o in NEIGHBORS_26 {
                    let n = v + o;
                    if closest.contains_key(&n) {
                        continue;
                    }
                    let d = n.as_dvec3().distance(p);
                    if d >= hw + 1.0 {
                        continue;
                    }
                    next.entry(n)
                        .and_modify(|q| {
                            if d < n.as_dvec3().distance(*q) {
                                *q = p;
                            }
                        })
                        .or_insert(p);
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next.keys().copied().collect();
            frontier.sort_unstable_by_key(|ijk| (ijk.z, ijk.y, ijk.x));
            closest.extend(next);
        }

        let mut voxels: Vec<(IVec3, f32)> = closest
            .iter()
            .map(|(&ijk, &p)| {
                let d = ijk.as_dvec3().distance(p);
                let v = if grid.get(ijk) < 0.0 { -d } else { d };
                (ijk, v as f32)
            })
            .collect();
        voxels.sort_unstable_by_key(|(ijk, _)| (ijk.z, ijk.y, ijk.x));

        let before = grid.active_voxel_count();
        grid.set_active_voxels(voxels);
        grid.narrow_band(half_width);
        log::trace!(
            "rebuilt band: {before} -> {} active voxels",
            grid.active_voxel_count()
        );
    }
}

/// The 26 offsets of the surrounding 3x3x3 block.
const NEIGHBORS_26: [IVec3; 26] = {
    let mut out = [IVec3::ZERO; 26];
    let mut n = 0;
    let mut i = 0;
    while i < 27 {
        let o = IVec3::new(i % 3 - 1, (i / 3) % 3 - 1, i / 9 - 1);
        if !(o.x == 0 && o.y == 0 && o.z == 0) {
            out[n] = o;
            n += 1;
        }
        i += 1;
    }
    out
};

/// Closest zero-crossing point from the per-axis crossings around `ijk`.
fn interface_point(grid: &FloatGrid, ijk: IVec3) -> DVec3 {
    let v = f64::from(grid.get(ijk));
    let center = ijk.as_dvec3();
    if v == 0.0 {
        return center;
    }
    let inside = v < 0.0;

    let mut inv = DVec3::ZERO;
    for axis in 0..3 {
        let o = axis_offset(axis);
        let mut best: Option<(f64, f64)> = None;
        for dir in [-1, 1] {
            let n = f64::from(grid.get(ijk + o * dir));
            if (n < 0.0) != inside {
                let t = v / (v - n);
                if best.map_or(true, |(bt, _)| t < bt) {
                    best = Some((t, f64::from(dir)));
                }
            }
        }
        if let Some((t, dir)) = best {
            let t = t.max(1e-6);
            inv[axis] = dir / t;
        }
    }

    let len_sq = inv.length_squared();
    if len_sq == 0.0 {
        return center;
    }
    // foot of the plane through the axis intercepts
    center + inv / len_sq
}

/// One explicit TVD Runge-Kutta step over the active voxels.
///
/// `rate(stage, ijk, φ₀)` returns `dφ/dt` evaluated on the current stage.
/// Results are clamped to the background.
pub fn rk_step<F>(grid: &mut FloatGrid, temporal: TemporalScheme, dt: f64, grain_size: usize, rate: F)
where
    F: Fn(&FloatGrid, IVec3, f64) -> f64 + Sync,
{
    let phi0 = grid.active_voxels();
    let bg = grid.background();
    let mut stage = grid.clone();

    for s in 0..temporal.stages() {
        let w = temporal.stage_weight(s);
        let prev = &stage;
        let values: Vec<(IVec3, f32)> = phi0
            .par_iter()
            .with_min_len(grain_size.max(1))
            .map(|&(ijk, v0)| {
                let v0 = f64::from(v0);
                let current = f64::from(prev.get(ijk));
                let advanced = current + dt * rate(prev, ijk, v0);
                let v = w * v0 + (1.0 - w) * advanced;
                (ijk, (v as f32).clamp(-bg, bg))
            })
            .collect();
        let mut next = stage.empty_like();
        next.set_active_voxels(values);
        stage = next;
    }

    *grid = stage;
}
