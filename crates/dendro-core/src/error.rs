//! Error types for dendro-rs.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for dendro-rs operations.
#[derive(Error, Debug)]
pub enum DendroError {
    /// A mesh without vertices or faces was supplied for conversion.
    #[error("mesh has no vertices or no faces")]
    InvalidMesh,

    /// An empty particle set was supplied for conversion.
    #[error("particle set is empty")]
    InvalidParticles,

    /// Voxel size must be strictly positive and finite.
    #[error("invalid voxel size {0} (expects > 0)")]
    InvalidVoxelSize(f64),

    /// Bandwidth must be strictly positive and finite.
    #[error("invalid bandwidth {0} (expects > 0)")]
    InvalidBandwidth(f64),

    /// A flat transform array did not hold exactly 16 values.
    #[error("transform needs {expected} values, got {actual}")]
    InvalidTransformLength { expected: usize, actual: usize },

    /// A transform could not be inverted or is not affine.
    #[error("transform is not an invertible affine map")]
    NonInvertibleTransform,

    /// The grid has no field yet (never converted or read).
    #[error("grid holds no volume")]
    EmptyGrid,

    /// A grid file was opened but holds no grid record.
    #[error("no grid stored in '{0}'")]
    NoGridInFile(PathBuf),

    /// A grid file was parsed but its contents are inconsistent.
    #[error("malformed grid file: {0}")]
    MalformedGridFile(String),

    /// Flat array length is not a multiple of the tuple size.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Curve or radius input rejected while building particles.
    #[error("invalid radius input: {0}")]
    InvalidRadius(String),

    /// A handle or argument passed across the C boundary was unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for dendro-rs operations.
pub type Result<T> = std::result::Result<T, DendroError>;
