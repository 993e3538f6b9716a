//! Trilinear sampling and finite-difference gradients.

use dendro_core::{DVec3, IVec3};

use crate::level_set::FloatGrid;

/// Trilinear ("box") sample at a fractional index-space position.
pub fn sample_trilinear(grid: &FloatGrid, p: DVec3) -> f64 {
    let base = p.floor();
    let t = p - base;
    let i = base.as_ivec3();

    let c = |dx: i32, dy: i32, dz: i32| f64::from(grid.get(i + IVec3::new(dx, dy, dz)));
    let x00 = lerp(c(0, 0, 0), c(1, 0, 0), t.x);
    let x10 = lerp(c(0, 1, 0), c(1, 1, 0), t.x);
    let x01 = lerp(c(0, 0, 1), c(1, 0, 1), t.x);
    let x11 = lerp(c(0, 1, 1), c(1, 1, 1), t.x);
    lerp(lerp(x00, x10, t.y), lerp(x01, x11, t.y), t.z)
}

/// Trilinear sample at a world-space position.
pub fn sample_world(grid: &FloatGrid, world: DVec3) -> f64 {
    sample_trilinear(grid, grid.world_to_index(world))
}

/// Central-difference gradient at a voxel, in value units per voxel.
pub fn gradient(grid: &FloatGrid, ijk: IVec3) -> DVec3 {
    let d = |o: IVec3| 0.5 * (f64::from(grid.get(ijk + o)) - f64::from(grid.get(ijk - o)));
    DVec3::new(d(IVec3::X), d(IVec3::Y), d(IVec3::Z))
}

/// Gradient of the trilinear interpolant at a fractional position.
pub fn gradient_trilinear(grid: &FloatGrid, p: DVec3) -> DVec3 {
    const H: f64 = 0.5;
    let d = |o: DVec3| (sample_trilinear(grid, p + o) - sample_trilinear(grid, p - o)) / (2.0 * H);
    DVec3::new(d(DVec3::X * H), d(DVec3::Y * H), d(DVec3::Z * H))
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
