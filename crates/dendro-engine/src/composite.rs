//! Boolean composition of co-aligned level sets.

use std::collections::BTreeSet;

use crate::level_set::FloatGrid;

/// Boolean operation applied by [`composite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsgOp {
    Union,
    Intersection,
    /// Removes the second operand from the first.
    Difference,
}

impl CsgOp {
    fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Union => a.min(b),
            Self::Intersection => a.max(b),
            Self::Difference => a.max(-b),
        }
    }
}

/// Combines `b` into `a` in place.
///
/// Both grids must share a lattice; `b` is only read. Results are clamped to
/// `a`'s background and, with `prune`, voxels at the background are made
/// inactive.
pub fn composite(a: &mut FloatGrid, b: &FloatGrid, op: CsgOp, prune: bool) {
    let bg = a.background();
    let keys: BTreeSet<(i32, i32, i32)> = a
        .iter_active()
        .chain(b.iter_active())
        .map(|(ijk, _)| (ijk.z, ijk.y, ijk.x))
        .collect();

    let voxels: Vec<_> = keys
        .into_iter()
        .map(|(z, y, x)| {
            let ijk = dendro_core::IVec3::new(x, y, z);
            let v = op.apply(a.get(ijk), b.get(ijk)).clamp(-bg, bg);
            (ijk, v)
        })
        .collect();

    a.set_active_voxels(voxels);
    if prune {
        a.prune(0.0);
    }
    log::debug!("{op:?} left {} active voxels", a.active_voxel_count());
}

pub fn csg_union(a: &mut FloatGrid, b: &FloatGrid, prune: bool) {
    composite(a, b, CsgOp::Union, prune);
}

pub fn csg_intersection(a: &mut FloatGrid, b: &FloatGrid, prune: bool) {
    composite(a, b, CsgOp::Intersection, prune);
}

pub fn csg_difference(a: &mut FloatGrid, b: &FloatGrid, prune: bool) {
    composite(a, b, CsgOp::Difference, prune);
}
