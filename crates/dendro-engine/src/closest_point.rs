//! Closest point on the zero crossing of a level set.

use std::collections::HashMap;

use dendro_core::{DVec3, IVec3};
use rayon::prelude::*;

use crate::level_set::{axis_offset, FloatGrid};
use crate::sampler::{gradient_trilinear, sample_trilinear};

/// Edge length, in voxels, of the buckets used to index interface samples.
const BUCKET_SIZE: f64 = 4.0;

/// Newton projection steps applied after the nearest-sample search.
const PROJECTION_STEPS: usize = 3;

/// Nearest-surface-point search over a level set.
///
/// The zero crossing is sampled on every lattice edge with a sign change;
/// queries find the nearest sample and then project onto the interpolated
/// surface.
#[derive(Debug)]
pub struct ClosestSurfacePoint<'a> {
    grid: &'a FloatGrid,
    samples: Vec<DVec3>,
    buckets: HashMap<IVec3, Vec<u32>>,
    /// Inclusive bounds of the occupied buckets.
    bucket_bounds: Option<(IVec3, IVec3)>,
    grain_size: usize,
}

impl<'a> ClosestSurfacePoint<'a> {
    pub fn new(grid: &'a FloatGrid, grain_size: usize) -> Self {
        let mut samples = Vec::new();
        for (ijk, v) in grid.iter_active() {
            let inside = v < 0.0;
            for axis in 0..3 {
                let n = ijk + axis_offset(axis);
                let w = grid.get(n);
                if (w < 0.0) != inside {
                    let t = f64::from(v) / f64::from(v - w);
                    samples.push(ijk.as_dvec3() + axis_offset(axis).as_dvec3() * t);
                }
            }
            // crossings toward inactive neighbours on the negative side
            for axis in 0..3 {
                let n = ijk - axis_offset(axis);
                if grid.is_active(n) {
                    continue;
                }
                let w = grid.get(n);
                if (w < 0.0) != inside {
                    let t = f64::from(v) / f64::from(v - w);
                    samples.push(ijk.as_dvec3() - axis_offset(axis).as_dvec3() * t);
                }
            }
        }

        let mut buckets: HashMap<IVec3, Vec<u32>> = HashMap::new();
        let mut bucket_bounds: Option<(IVec3, IVec3)> = None;
        for (i, s) in samples.iter().enumerate() {
            let b = bucket_of(*s);
            buckets.entry(b).or_default().push(i as u32);
            bucket_bounds = Some(bucket_bounds.map_or((b, b), |(lo, hi)| (lo.min(b), hi.max(b))));
        }
        log::debug!("indexed {} interface samples", samples.len());

        Self {
            grid,
            samples,
            buckets,
            bucket_bounds,
            grain_size: grain_size.max(1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Projects world-space points onto the surface.
    ///
    /// Returns the projected points and the world-space distance from each
    /// query to its projection. Without a surface, points are returned
    /// unchanged with infinite distance.
    pub fn search(&self, points: &[DVec3]) -> (Vec<DVec3>, Vec<f64>) {
        let transform = self.grid.transform();
        points
            .par_iter()
            .with_min_len(self.grain_size)
            .map(|&world| {
                let p = transform.world_to_index(world);
                match self.nearest_sample(p) {
                    Some(s) => {
                        let projected = transform.index_to_world(self.project(s));
                        (projected, world.distance(projected))
                    }
                    None => (world, f64::INFINITY),
                }
            })
            .unzip()
    }

    fn nearest_sample(&self, p: DVec3) -> Option<DVec3> {
        let (lo, hi) = self.bucket_bounds?;
        let home = bucket_of(p);
        // rings closer than the bounds are empty
        let mut ring = (lo - home).max(home - hi).max(IVec3::ZERO).max_element();
        let last_ring = (home - lo).max(hi - home).max_element();
        let mut best: Option<(f64, DVec3)> = None;
        loop {
            for b in shell(home, ring, lo, hi) {
                let Some(ids) = self.buckets.get(&b) else {
                    continue;
                };
                for &i in ids {
                    let s = self.samples[i as usize];
                    let d = s.distance_squared(p);
                    if best.map_or(true, |(bd, _)| d < bd) {
                        best = Some((d, s));
                    }
                }
            }
            // anything in a further ring is at least `ring` buckets away
            if let Some((d, s)) = best {
                let reach = f64::from(ring) * BUCKET_SIZE;
                if d.sqrt() <= reach {
                    return Some(s);
                }
            }
            ring += 1;
            if ring > last_ring {
                return best.map(|(_, s)| s);
            }
        }
    }

    /// Newton steps toward the zero crossing of the interpolated field.
    fn project(&self, start: DVec3) -> DVec3 {
        let mut p = start;
        let mut value = sample_trilinear(self.grid, p);
        for _ in 0..PROJECTION_STEPS {
            let g = gradient_trilinear(self.grid, p);
            let len_sq = g.length_squared();
            if len_sq < 1e-12 || value.abs() < 1e-9 {
                break;
            }
            let candidate = p - g * (value / len_sq);
            let candidate_value = sample_trilinear(self.grid, candidate);
            if candidate_value.abs() >= value.abs() {
                break;
            }
            p = candidate;
            value = candidate_value;
        }
        p
    }
}

fn bucket_of(p: DVec3) -> IVec3 {
    (p / BUCKET_SIZE).floor().as_ivec3()
}

/// Buckets on the surface of the cube of half-size `ring` around `home`
/// that lie within `lo..=hi`.
fn shell(home: IVec3, ring: i32, lo: IVec3, hi: IVec3) -> Vec<IVec3> {
    let from = (lo - home).max(IVec3::splat(-ring));
    let to = (hi - home).min(IVec3::splat(ring));
    let mut out = Vec::new();
    for z in from.z..=to.z {
        for y in from.y..=to.y {
            if z.abs() == ring || y.abs() == ring {
                out.extend((from.x..=to.x).map(|x| home + IVec3::new(x, y, z)));
            } else {
                // only the two x faces of the cube
                for x in [-ring, ring] {
                    if (from.x..=to.x).contains(&x) {
                        out.push(home + IVec3::new(x, y, z));
                    }
                }
            }
        }
    }
    out
}
