//! Sparse narrow-band level-set engine for dendro-rs.
//!
//! This crate implements the volumetric primitives the orchestration layer builds on:
//! - [`FloatGrid`] sparse scalar storage with inferred inside/outside background
//! - Conversion from particles ([`ParticleRasterizer`]) and meshes ([`MeshToVolume`])
//! - Resampling between lattices ([`GridTransformer`]) and boolean [`composite`]s
//! - Band maintenance ([`LevelSetTracker`]), filters ([`LevelSetFilter`]) and morphing
//! - Surface extraction ([`VolumeToMesh`]) and closest-point search
//! - JSON grid files
//!
//! Every tool takes a grain size: the minimum number of voxels (or items)
//! handed to one rayon task.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Lattice indices and counts cross between integer and float types constantly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

pub mod closest_point;
pub mod composite;
pub mod filter;
pub mod io;
pub mod level_set;
pub mod mesh_to_volume;
pub mod morph;
pub mod rasterize;
pub mod sampler;
pub mod schemes;
pub mod tracker;
pub mod transformer;
pub mod volume_to_mesh;

pub use closest_point::ClosestSurfacePoint;
pub use composite::{composite, csg_difference, csg_intersection, csg_union, CsgOp};
pub use filter::{AlphaMask, LevelSetFilter};
pub use level_set::{FloatGrid, GridClass};
pub use mesh_to_volume::MeshToVolume;
pub use morph::LevelSetMorphing;
pub use rasterize::{ParticleRasterizer, RasterStats};
pub use schemes::{SpatialScheme, TemporalScheme};
pub use tracker::LevelSetTracker;
pub use transformer::GridTransformer;
pub use volume_to_mesh::VolumeToMesh;
