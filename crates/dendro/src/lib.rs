//! dendro-rs: volumetric modelling with sparse narrow-band level sets.
//!
//! Point clouds, curves and closed meshes are converted into level sets that
//! can be combined, filtered, morphed and turned back into polygon meshes.
//!
//! # Quick Start
//!
//! ```no_run
//! use dendro::*;
//!
//! fn main() -> Result<()> {
//!     initialize();
//!
//!     // A unit sphere sampled at 0.1 with a 3-voxel band
//!     let mut particles = ParticleSet::new();
//!     particles.add(DVec3::ZERO, 1.0);
//!     let mut grid = VolumetricGrid::new();
//!     grid.create_from_points(&particles, 0.1, 3.0)?;
//!
//!     // Grow it by a voxel and mesh it
//!     grid.offset(0.1)?;
//!     grid.update_display()?;
//!
//!     let vertices = grid.vertex_buffer();
//!     let faces = grid.face_buffer();
//!     println!("{} vertices, {} faces", vertices.len() / 3, faces.len() / 4);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`VolumetricGrid`] owns a level set and the mesh last extracted from it
//! - [`AlignmentResampler`] brings a second grid onto a grid's lattice before
//!   boolean and morph operations
//! - [`BufferExporter`] flattens meshes into plain index and coordinate arrays
//! - [`ClosestPointQuery`] projects points onto a grid's surface
//! - [`ffi`] exposes the same operations through a C ABI

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]

pub mod align;
pub mod export;
pub mod ffi;
pub mod query;
pub mod volume;

pub use align::AlignmentResampler;
pub use export::BufferExporter;
pub use query::{ClosestPointQuery, ClosestPoints};
pub use volume::{FilterKind, VolumetricGrid};

// Re-export core types
pub use dendro_core::{
    error::{DendroError, Result},
    mask::MaskRange,
    mesh::{MeshBuffer, INVALID_INDEX},
    particle::{Particle, ParticleSet},
    settings::Settings,
    transform::GridTransform,
    DMat4, DVec3, IVec3, UVec4, Vec3,
};

// Re-export engine types
pub use dendro_engine::{FloatGrid, GridClass};

/// Initializes logging and the volumetric engine.
///
/// Grid construction initializes the engine on its own; call this to also
/// install `env_logger`. Repeated calls are no-ops.
pub fn initialize() {
    dendro_core::state::initialize_with_logging();
    log::info!("dendro-rs initialized");
}

/// Returns whether the engine has been initialized.
pub fn is_initialized() -> bool {
    dendro_core::state::is_initialized()
}

/// Settings used when a caller does not supply its own.
pub fn default_settings() -> Settings {
    dendro_core::state::default_settings()
}
