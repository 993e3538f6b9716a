//! Resampling a grid into another grid's index space.

use std::collections::HashSet;

use dendro_core::{DMat4, DVec3, GridTransform, IVec3};
use rayon::prelude::*;

use crate::level_set::FloatGrid;
use crate::sampler::sample_trilinear;

/// Box-samples a source grid through an index-to-index affine map.
///
/// `relative` maps source index coordinates into target index coordinates.
/// Every target voxel near a mapped source voxel is filled by sampling the
/// source at `relative⁻¹ · target`.
#[derive(Debug, Clone, Copy)]
pub struct GridTransformer {
    relative: DMat4,
    grain_size: usize,
}

impl GridTransformer {
    pub fn new(relative: DMat4, grain_size: usize) -> Self {
        Self {
            relative,
            grain_size: grain_size.max(1),
        }
    }

    /// Transformer that carries `source` into the lattice of `target`.
    pub fn between(source: &GridTransform, target: &GridTransform, grain_size: usize) -> Self {
        Self::new(source.relative_to(target), grain_size)
    }

    /// Resamples `source` into `target`, replacing its active voxels.
    ///
    /// Level-set values are rescaled from source voxel units to target voxel
    /// units. Voxels where the source reads its own background stay inactive.
    pub fn transform_grid(&self, source: &FloatGrid, target: &mut FloatGrid) {
        let inverse = self.relative.inverse();
        let source_bg = f64::from(source.background());
        let target_bg = f64::from(target.background());
        let level_set = source.is_level_set();
        let scale = if level_set {
            source.voxel_size() / target.voxel_size()
        } else {
            1.0
        };

        let reach = self
            .relative
            .x_axis
            .truncate()
            .length()
            .max(self.relative.y_axis.truncate().length())
            .max(self.relative.z_axis.truncate().length())
            .ceil() as i32;

        let mut candidates: HashSet<IVec3> = HashSet::new();
        for (ijk, _) in source.iter_active() {
            let center = self.relative.transform_point3(ijk.as_dvec3()).round().as_ivec3();
            for z in -reach..=reach {
                for y in -reach..=reach {
                    for x in -reach..=reach {
                        candidates.insert(center + IVec3::new(x, y, z));
                    }
                }
            }
        }
        let mut candidates: Vec<IVec3> = candidates.into_iter().collect();
        candidates.sort_unstable_by_key(|ijk| (ijk.z, ijk.y, ijk.x));

        let voxels: Vec<(IVec3, f32)> = candidates
            .par_iter()
            .with_min_len(self.grain_size)
            .filter_map(|&ijk| {
                let p = snap_to_lattice(inverse.transform_point3(ijk.as_dvec3()));
                let v = sample_trilinear(source, p);
                if level_set {
                    if v.abs() >= source_bg {
                        return None;
                    }
                    let scaled = v * scale;
                    (scaled.abs() < target_bg).then_some((ijk, scaled as f32))
                } else {
                    ((v - source_bg).abs() > f64::EPSILON).then_some((ijk, v as f32))
                }
            })
            .collect();

        target.set_active_voxels(voxels);
        log::debug!(
            "resampled {} source voxels into {} target voxels",
            source.active_voxel_count(),
            target.active_voxel_count()
        );
    }
}

/// Rounds positions within floating-point noise of a lattice point.
fn snap_to_lattice(p: DVec3) -> DVec3 {
    const SNAP: f64 = 1e-6;
    let r = p.round();
    if (p - r).abs().max_element() < SNAP {
        r
    } else {
        p
    }
}
