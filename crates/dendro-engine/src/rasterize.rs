//! Particle to level-set rasterization.

use std::collections::HashMap;

use dendro_core::{GridTransform, IVec3, ParticleSet};
use rayon::prelude::*;

use crate::level_set::FloatGrid;

/// Spheres smaller than this many voxels are not rasterized.
pub const MIN_RADIUS_VOXELS: f64 = 1.5;

/// Counters reported by [`ParticleRasterizer::rasterize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasterStats {
    pub rasterized: usize,
    pub ignored_small: usize,
}

/// Rasterizes particles as a union of spheres into a level set.
#[derive(Debug, Clone, Copy)]
pub struct ParticleRasterizer {
    grain_size: usize,
}

impl ParticleRasterizer {
    pub fn new(grain_size: usize) -> Self {
        Self {
            grain_size: grain_size.max(1),
        }
    }

    /// Unions every particle sphere into `grid`.
    ///
    /// Values are clamped to the grid's half-width and voxels at or beyond it
    /// stay inactive.
    pub fn rasterize(&self, grid: &mut FloatGrid, particles: &ParticleSet) -> RasterStats {
        let transform = *grid.transform();
        let hw = f64::from(grid.half_width());
        let dx = transform.voxel_size();

        let spheres: Vec<_> = particles.spheres().collect();
        let shells: Vec<Option<Vec<(IVec3, f32)>>> = spheres
            .par_iter()
            .with_min_len(self.grain_size)
            .map(|&(center, radius)| {
                let r = radius / dx;
                (r >= MIN_RADIUS_VOXELS).then(|| sphere_shell(&transform, center, r, hw))
            })
            .collect();

        let mut stats = RasterStats::default();
        let mut field: HashMap<IVec3, f32> = grid.iter_active().collect();
        let existing = !field.is_empty();
        for shell in shells {
            let Some(shell) = shell else {
                stats.ignored_small += 1;
                continue;
            };
            stats.rasterized += 1;
            for (ijk, v) in shell {
                let current = match field.get(&ijk) {
                    Some(&c) => c,
                    None if existing => grid.get(ijk),
                    None => f32::MAX,
                };
                if v < current {
                    field.insert(ijk, v);
                }
            }
        }

        if stats.ignored_small > 0 {
            log::warn!(
                "{} particles smaller than {MIN_RADIUS_VOXELS} voxels were ignored",
                stats.ignored_small
            );
        }

        let mut voxels: Vec<_> = field.into_iter().collect();
        voxels.sort_unstable_by_key(|(ijk, _)| (ijk.z, ijk.y, ijk.x));
        grid.set_active_voxels(voxels);
        grid.prune(0.0);
        log::debug!(
            "rasterized {} particles into {} active voxels",
            stats.rasterized,
            grid.active_voxel_count()
        );
        stats
    }
}

/// Clamped signed distances of one sphere (index units) for all voxels
/// closer than the outer band edge.
fn sphere_shell(
    transform: &GridTransform,
    center_world: dendro_core::DVec3,
    radius: f64,
    hw: f64,
) -> Vec<(IVec3, f32)> {
    let c = transform.world_to_index(center_world);
    let reach = radius + hw;
    let lo = (c - reach).floor().as_ivec3();
    let hi = (c + reach).ceil().as_ivec3();

    let mut out = Vec::new();
    for z in lo.z..=hi.z {
        for y in lo.y..=hi.y {
            for x in lo.x..=hi.x {
                let ijk = IVec3::new(x, y, z);
                let d = ijk.as_dvec3().distance(c) - radius;
                if d < hw {
                    out.push((ijk, d.max(-hw) as f32));
                }
            }
        }
    }
    out
}
