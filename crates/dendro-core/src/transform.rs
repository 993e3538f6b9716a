//! Affine index-to-world transforms.

use glam::{DMat4, DVec3, DVec4};
use serde::{Deserialize, Serialize};

use crate::error::{DendroError, Result};

/// Number of values in a flat 4x4 matrix.
pub const MATRIX_LEN: usize = 16;

const AFFINE_EPSILON: f64 = 1e-9;

/// Affine map from integer lattice coordinates to world coordinates.
///
/// Uses glam's column-vector convention: `world = matrix * index`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    matrix: DMat4,
}

impl Default for GridTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl GridTransform {
    pub const IDENTITY: Self = Self {
        matrix: DMat4::IDENTITY,
    };

    /// Uniform scale by `voxel_size`.
    pub fn from_voxel_size(voxel_size: f64) -> Result<Self> {
        if !(voxel_size > 0.0) || !voxel_size.is_finite() {
            return Err(DendroError::InvalidVoxelSize(voxel_size));
        }
        Ok(Self {
            matrix: DMat4::from_scale(DVec3::splat(voxel_size)),
        })
    }

    /// Wraps a matrix, rejecting non-affine or singular ones.
    pub fn from_matrix(matrix: DMat4) -> Result<Self> {
        let row3 = matrix.row(3);
        let affine = (row3 - DVec4::new(0.0, 0.0, 0.0, 1.0)).abs().max_element() < AFFINE_EPSILON;
        let det = matrix.determinant();
        if !affine || !det.is_finite() || det.abs() < AFFINE_EPSILON || !matrix.is_finite() {
            return Err(DendroError::NonInvertibleTransform);
        }
        Ok(Self { matrix })
    }

    /// Parses 16 values laid out like OpenVDB's `Mat4d`.
    ///
    /// That layout is row-major for row vectors (`world = index * M`), so the
    /// translation sits in elements 12, 13 and 14. Read as columns it is the
    /// same matrix in glam's column-vector convention.
    pub fn from_row_major(values: &[f64]) -> Result<Self> {
        let array: [f64; MATRIX_LEN] =
            values
                .try_into()
                .map_err(|_| DendroError::InvalidTransformLength {
                    expected: MATRIX_LEN,
                    actual: values.len(),
                })?;
        Self::from_matrix(DMat4::from_cols_array(&array))
    }

    pub fn matrix(&self) -> DMat4 {
        self.matrix
    }

    /// The 16 values in the layout read by [`GridTransform::from_row_major`].
    pub fn to_row_major(&self) -> [f64; MATRIX_LEN] {
        self.matrix.to_cols_array()
    }

    /// Edge length of a voxel along the first index axis.
    pub fn voxel_size(&self) -> f64 {
        self.matrix.x_axis.truncate().length()
    }

    /// Per-axis voxel lengths.
    pub fn voxel_sizes(&self) -> DVec3 {
        DVec3::new(
            self.matrix.x_axis.truncate().length(),
            self.matrix.y_axis.truncate().length(),
            self.matrix.z_axis.truncate().length(),
        )
    }

    /// Composes `m` after this transform.
    #[must_use]
    pub fn post_mult(&self, m: &GridTransform) -> Self {
        Self {
            matrix: m.matrix * self.matrix,
        }
    }

    /// Map from this transform's index space into `target`'s index space.
    pub fn relative_to(&self, target: &GridTransform) -> DMat4 {
        target.matrix.inverse() * self.matrix
    }

    pub fn index_to_world(&self, index: DVec3) -> DVec3 {
        self.matrix.transform_point3(index)
    }

    pub fn world_to_index(&self, world: DVec3) -> DVec3 {
        self.matrix.inverse().transform_point3(world)
    }
}
