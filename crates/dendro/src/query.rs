//! Closest-point queries against a grid's surface.

use dendro_core::{DVec3, DendroError, Result};
use dendro_engine::ClosestSurfacePoint;

use crate::align::GRAIN_SIZE;
use crate::volume::VolumetricGrid;

/// Projected points and their world-space distances to the query points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClosestPoints {
    pub points: Vec<DVec3>,
    pub distances: Vec<f64>,
}

impl ClosestPoints {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points as `x, y, z` triples.
    pub fn flat_points(&self) -> Vec<f32> {
        self.points
            .iter()
            .flat_map(|p| p.as_vec3().to_array())
            .collect()
    }

    pub fn flat_distances(&self) -> Vec<f32> {
        self.distances.iter().map(|&d| d as f32).collect()
    }
}

/// Nearest-surface search over one grid.
///
/// The search index is built once and can answer several batches.
#[derive(Debug)]
pub struct ClosestPointQuery<'a> {
    search: ClosestSurfacePoint<'a>,
}

impl<'a> ClosestPointQuery<'a> {
    pub fn new(grid: &'a VolumetricGrid) -> Result<Self> {
        let field = grid.field().ok_or(DendroError::EmptyGrid)?;
        Ok(Self {
            search: ClosestSurfacePoint::new(field, GRAIN_SIZE),
        })
    }

    pub fn search(&self, points: &[DVec3]) -> ClosestPoints {
        let (points, distances) = self.search.search(points);
        ClosestPoints { points, distances }
    }

    /// Searches `x, y, z` triples.
    pub fn search_flat(&self, coords: &[f32]) -> Result<ClosestPoints> {
        if coords.len() % 3 != 0 {
            return Err(DendroError::SizeMismatch {
                expected: coords.len() / 3 * 3,
                actual: coords.len(),
            });
        }
        let points: Vec<DVec3> = coords
            .chunks_exact(3)
            .map(|c| DVec3::new(f64::from(c[0]), f64::from(c[1]), f64::from(c[2])))
            .collect();
        Ok(self.search(&points))
    }
}
