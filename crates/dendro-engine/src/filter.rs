//! Level-set filters: offset and smoothing kernels with optional masking.

use dendro_core::{DVec3, IVec3, MaskRange};
use rayon::prelude::*;

use crate::level_set::{axis_offset, FloatGrid, FACE_NEIGHBORS};
use crate::sampler::sample_world;
use crate::tracker::LevelSetTracker;

/// Largest surface displacement, in voxels, applied between two tracking passes.
const MAX_OFFSET_STEP: f64 = 1.0;

/// Box passes used to approximate a Gaussian.
const GAUSSIAN_BOX_PASSES: usize = 4;

/// A grid sampled in world space and mapped to a weight through a range.
#[derive(Debug, Clone, Copy)]
pub struct AlphaMask<'a> {
    grid: &'a FloatGrid,
    range: MaskRange,
}

impl<'a> AlphaMask<'a> {
    pub fn new(grid: &'a FloatGrid, range: MaskRange) -> Self {
        Self { grid, range }
    }

    /// Weight at a world position. Level-set masks are read in world units.
    pub fn alpha(&self, world: DVec3) -> f64 {
        let mut v = sample_world(self.grid, world);
        if self.grid.is_level_set() {
            v *= self.grid.voxel_size();
        }
        self.range.alpha(v)
    }
}

/// Filters applied in place to a level set, each followed by tracking.
#[derive(Debug, Clone, Copy)]
pub struct LevelSetFilter<'a> {
    tracker: LevelSetTracker,
    grain_size: usize,
    mask: Option<AlphaMask<'a>>,
}

impl<'a> LevelSetFilter<'a> {
    pub fn new(grain_size: usize) -> Self {
        let grain_size = grain_size.max(1);
        Self {
            tracker: LevelSetTracker {
                grain_size,
                ..LevelSetTracker::default()
            },
            grain_size,
            mask: None,
        }
    }

    /// Weights every filter by `mask`.
    #[must_use]
    pub fn with_mask(mut self, mask: AlphaMask<'a>) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn tracker(&self) -> &LevelSetTracker {
        &self.tracker
    }

    /// Adds `amount` voxels to every value. Negative amounts grow the surface.
    pub fn offset(&self, grid: &mut FloatGrid, amount: f64) {
        if amount == 0.0 || !amount.is_finite() {
            return;
        }
        let steps = (amount.abs() / MAX_OFFSET_STEP).ceil().max(1.0) as usize;
        let step = amount / steps as f64;
        self.tracker.with_working_band(grid, |grid| {
            for _ in 0..steps {
                let mut shifted = grid.clone();
                let voxels: Vec<_> = grid
                    .iter_active()
                    .map(|(ijk, v)| (ijk, (f64::from(v) + step) as f32))
                    .collect();
                shifted.set_active_voxels(voxels);
                self.blend(grid, &shifted);
                self.track(grid);
            }
        });
        log::debug!("offset by {amount} voxels in {steps} steps");
    }

    /// Four box passes of half-width `width`.
    pub fn gaussian(&self, grid: &mut FloatGrid, width: usize) {
        self.tracker.with_working_band(grid, |grid| {
            let mut filtered = grid.clone();
            for _ in 0..GAUSSIAN_BOX_PASSES {
                self.box_pass(&mut filtered, width);
            }
            self.blend(grid, &filtered);
            self.track(grid);
        });
    }

    /// One step of discrete Laplacian flow.
    pub fn laplacian(&self, grid: &mut FloatGrid) {
        self.tracker.with_working_band(grid, |grid| {
            let filtered = self.map_voxels(grid, |g, ijk, v| {
                let sum: f64 = FACE_NEIGHBORS
                    .iter()
                    .map(|&o| f64::from(g.get(ijk + o)))
                    .sum();
                let v = f64::from(v);
                v + (sum - 6.0 * v) / 6.0
            });
            self.blend(grid, &filtered);
            self.track(grid);
        });
    }

    /// Mean over a `(2·width + 1)³` block.
    pub fn mean(&self, grid: &mut FloatGrid, width: usize) {
        self.tracker.with_working_band(grid, |grid| {
            let mut filtered = grid.clone();
            self.box_pass(&mut filtered, width);
            self.blend(grid, &filtered);
            self.track(grid);
        });
    }

    /// Median over a `(2·width + 1)³` block.
    pub fn median(&self, grid: &mut FloatGrid, width: usize) {
        let w = width.max(1) as i32;
        self.tracker.with_working_band(grid, |grid| {
            let filtered = self.map_voxels(grid, |g, ijk, _| {
                let mut values = Vec::with_capacity(((2 * w + 1) as usize).pow(3));
                for z in -w..=w {
                    for y in -w..=w {
                        for x in -w..=w {
                            values.push(g.get(ijk + IVec3::new(x, y, z)));
                        }
                    }
                }
                let mid = values.len() / 2;
                let (_, median, _) = values.select_nth_unstable_by(mid, f32::total_cmp);
                f64::from(*median)
            });
            self.blend(grid, &filtered);
            self.track(grid);
        });
    }

    /// Separable mean along x, y and z.
    fn box_pass(&self, grid: &mut FloatGrid, width: usize) {
        let w = width.max(1) as i32;
        let norm = f64::from(2 * w + 1);
        for axis in 0..3 {
            let o = axis_offset(axis);
            let filtered = self.map_voxels(grid, |g, ijk, _| {
                (-w..=w).map(|k| f64::from(g.get(ijk + o * k))).sum::<f64>() / norm
            });
            *grid = filtered;
        }
    }

    /// Applies `kernel` to every active voxel of `grid` into a new grid.
    fn map_voxels<F>(&self, grid: &FloatGrid, kernel: F) -> FloatGrid
    where
        F: Fn(&FloatGrid, IVec3, f32) -> f64 + Sync,
    {
        let voxels = grid.active_voxels();
        let values: Vec<(IVec3, f32)> = voxels
            .par_iter()
            .with_min_len(self.grain_size)
            .map(|&(ijk, v)| (ijk, kernel(grid, ijk, v) as f32))
            .collect();
        let mut out = grid.empty_like();
        out.set_active_voxels(values);
        out
    }

    /// Moves each active voxel of `grid` toward `filtered` by the mask weight.
    fn blend(&self, grid: &mut FloatGrid, filtered: &FloatGrid) {
        let bg = grid.background();
        let source: &FloatGrid = grid;
        let voxels = source.active_voxels();
        let values: Vec<(IVec3, f32)> = voxels
            .par_iter()
            .with_min_len(self.grain_size)
            .map(|&(ijk, v)| {
                let target = filtered.active_value(ijk).unwrap_or_else(|| filtered.get(ijk));
                let alpha = self
                    .mask
                    .map_or(1.0, |m| m.alpha(source.index_to_world(ijk)));
                let v = f64::from(v) + alpha * f64::from(target - v);
                (ijk, (v as f32).clamp(-bg, bg))
            })
            .collect();
        grid.set_active_voxels(values);
    }

    fn track(&self, grid: &mut FloatGrid) {
        if grid.is_level_set() {
            self.tracker.track(grid);
        } else {
            grid.prune(0.0);
        }
    }
}
