//! Core value types for dendro-rs.
//!
//! This crate provides the types shared by the engine and the orchestration layer:
//! - [`MeshBuffer`] and [`ParticleSet`] conversion inputs and extraction output
//! - [`GridTransform`] affine index-to-world maps
//! - [`MaskRange`] weights for masked filters and morphs
//! - [`Settings`] and the process-wide engine state

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Lattice indices and counts cross between integer and float types constantly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod mask;
pub mod mesh;
pub mod particle;
pub mod settings;
pub mod state;
pub mod transform;

pub use error::{DendroError, Result};
pub use mask::MaskRange;
pub use mesh::{MeshBuffer, INVALID_INDEX};
pub use particle::{Particle, ParticleSet};
pub use settings::Settings;
pub use transform::GridTransform;

// Re-export glam types for convenience
pub use glam::{DMat4, DVec3, IVec3, UVec4, Vec3};
