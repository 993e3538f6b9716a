//! Volumetric grid: a level set plus its most recently extracted mesh.

use std::path::Path;

use dendro_core::{
    state, DVec3, DendroError, GridTransform, MaskRange, MeshBuffer, ParticleSet, Result,
    Settings, Vec3,
};
use dendro_engine::{
    composite, io, AlphaMask, CsgOp, FloatGrid, GridClass, LevelSetFilter, LevelSetMorphing,
    MeshToVolume, ParticleRasterizer, VolumeToMesh,
};

use crate::align::{AlignmentResampler, GRAIN_SIZE};
use crate::export::BufferExporter;
use crate::query::{ClosestPointQuery, ClosestPoints};

/// Isovalue used to display fog volumes when no isovalue is given.
const FOG_DISPLAY_ISOVALUE: f64 = 0.01;

/// Smoothing kernel applied by [`VolumetricGrid::smooth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    Gaussian,
    #[default]
    Laplacian,
    Mean,
    Median,
}

impl FilterKind {
    /// Maps the numeric codes used across the C boundary.
    ///
    /// Unknown codes select [`FilterKind::Laplacian`].
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Gaussian,
            1 => Self::Laplacian,
            2 => Self::Mean,
            3 => Self::Median,
            other => {
                log::debug!("unknown filter code {other}, using laplacian");
                Self::Laplacian
            }
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Gaussian => 0,
            Self::Laplacian => 1,
            Self::Mean => 2,
            Self::Median => 3,
        }
    }
}

impl From<i32> for FilterKind {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

/// A sparse narrow-band level set with a cached display mesh.
///
/// A grid starts empty and holds a volume once it has been converted from
/// points or a mesh, or read from a file. The mesh cache is only refreshed by
/// [`update_display`](Self::update_display) and its variants; volume edits
/// leave it stale.
///
/// Operations that take a second grid (CSG, masks, blend targets) only read
/// it. Secondary volumes are resampled into a disposable copy aligned with
/// this grid before they are combined.
#[derive(Debug)]
pub struct VolumetricGrid {
    field: Option<FloatGrid>,
    display: MeshBuffer,
}

impl Default for VolumetricGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for VolumetricGrid {
    fn clone(&self) -> Self {
        self.duplicate()
    }
}

impl VolumetricGrid {
    /// Creates an empty grid, initializing the engine on first use.
    pub fn new() -> Self {
        let id = state::register_grid();
        log::trace!("created grid #{id}");
        Self {
            field: None,
            display: MeshBuffer::new(),
        }
    }

    /// Builds a grid from particles with validated settings.
    pub fn from_points(particles: &ParticleSet, settings: &Settings) -> Result<Self> {
        let settings = settings.validated();
        let mut grid = Self::new();
        grid.create_from_points(particles, settings.voxel_size, settings.bandwidth)?;
        Ok(grid)
    }

    /// Builds a grid from a closed mesh with validated settings.
    pub fn from_mesh(mesh: &MeshBuffer, settings: &Settings) -> Result<Self> {
        let settings = settings.validated();
        let mut grid = Self::new();
        grid.create_from_mesh(mesh, settings.voxel_size, settings.bandwidth)?;
        Ok(grid)
    }

    /// Reads the first grid stored in `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut grid = Self::new();
        grid.read(path)?;
        Ok(grid)
    }

    /// Deep copy of the volume and the mesh cache.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        let mut copy = Self::new();
        copy.field.clone_from(&self.field);
        copy.display = self.display.duplicate();
        copy
    }

    // ========================================================================
    // Conversion
    // ========================================================================

    /// Replaces the volume with the signed distance to `mesh`.
    ///
    /// `bandwidth` is the band half-width in voxels. The mesh cache is set to
    /// the source mesh until the next extraction.
    pub fn create_from_mesh(
        &mut self,
        mesh: &MeshBuffer,
        voxel_size: f64,
        bandwidth: f64,
    ) -> Result<()> {
        if !mesh.is_valid() {
            return Err(DendroError::InvalidMesh);
        }
        let transform = GridTransform::from_voxel_size(voxel_size)?;
        check_bandwidth(bandwidth)?;

        let field = MeshToVolume::new(bandwidth, GRAIN_SIZE).convert(mesh, transform)?;
        log::debug!(
            "converted mesh with {} faces into {} active voxels",
            mesh.face_count(),
            field.active_voxel_count()
        );
        self.field = Some(field);
        self.display = mesh.duplicate();
        Ok(())
    }

    /// Replaces the volume with the union of the particle spheres.
    pub fn create_from_points(
        &mut self,
        particles: &ParticleSet,
        voxel_size: f64,
        bandwidth: f64,
    ) -> Result<()> {
        if !particles.is_valid() {
            return Err(DendroError::InvalidParticles);
        }
        let transform = GridTransform::from_voxel_size(voxel_size)?;
        check_bandwidth(bandwidth)?;

        let mut field = FloatGrid::new_level_set(transform, bandwidth as f32);
        let stats = ParticleRasterizer::new(GRAIN_SIZE).rasterize(&mut field, particles);
        log::debug!(
            "rasterized {} particles ({} too small) into {} active voxels",
            stats.rasterized,
            stats.ignored_small,
            field.active_voxel_count()
        );
        self.field = Some(field);
        self.display.clear();
        Ok(())
    }

    /// Flat-array form of [`create_from_points`](Self::create_from_points).
    ///
    /// `coords` holds `x, y, z` triples. A radius count other than the point
    /// count falls back to the mean radius.
    pub fn create_from_flat_points(
        &mut self,
        coords: &[f64],
        radii: &[f64],
        voxel_size: f64,
        bandwidth: f64,
    ) -> Result<()> {
        let particles = ParticleSet::from_flat(coords, radii)?;
        self.create_from_points(&particles, voxel_size, bandwidth)
    }

    /// Flat-array form of [`create_from_mesh`](Self::create_from_mesh).
    ///
    /// `coords` holds `x, y, z` triples and `indices` triangle corner triples.
    pub fn create_from_flat_mesh(
        &mut self,
        coords: &[f32],
        indices: &[i32],
        voxel_size: f64,
        bandwidth: f64,
    ) -> Result<()> {
        let mesh = MeshBuffer::from_flat_triangles(coords, indices)?;
        self.create_from_mesh(&mesh, voxel_size, bandwidth)
    }

    /// Sweeps spheres along polylines.
    ///
    /// Takes one radius for every curve or one radius per curve.
    pub fn create_from_curves(
        &mut self,
        curves: &[Vec<DVec3>],
        radii: &[f64],
        voxel_size: f64,
        bandwidth: f64,
    ) -> Result<()> {
        let particles = ParticleSet::from_polylines(curves, radii)?;
        self.create_from_points(&particles, voxel_size, bandwidth)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Whether the grid holds a volume.
    pub fn is_valid(&self) -> bool {
        self.field.is_some()
    }

    pub fn field(&self) -> Option<&FloatGrid> {
        self.field.as_ref()
    }

    /// The most recently extracted (or converted) mesh.
    pub fn mesh(&self) -> &MeshBuffer {
        &self.display
    }

    pub fn class(&self) -> Option<GridClass> {
        self.field.as_ref().map(FloatGrid::class)
    }

    pub fn transform(&self) -> Option<&GridTransform> {
        self.field.as_ref().map(FloatGrid::transform)
    }

    pub fn voxel_size(&self) -> Option<f64> {
        self.field.as_ref().map(FloatGrid::voxel_size)
    }

    /// Band half-width in voxels.
    pub fn bandwidth(&self) -> Option<f64> {
        self.field
            .as_ref()
            .filter(|f| f.is_level_set())
            .map(|f| f64::from(f.half_width()))
    }

    pub fn active_voxel_count(&self) -> usize {
        self.field.as_ref().map_or(0, FloatGrid::active_voxel_count)
    }

    /// World-space bounds of the mesh cache.
    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        self.display.bounding_box()
    }

    /// Flat vertex buffer of the mesh cache.
    pub fn vertex_buffer(&self) -> Vec<f32> {
        BufferExporter::new(&self.display).vertex_buffer()
    }

    /// Flat, sentinel-first face buffer of the mesh cache.
    pub fn face_buffer(&self) -> Vec<i32> {
        BufferExporter::new(&self.display).face_buffer()
    }

    // ========================================================================
    // Files
    // ========================================================================

    /// Replaces the volume with the first grid stored in `path`.
    ///
    /// On failure the grid is left unchanged.
    pub fn read(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let field = io::read_first_grid(path)?;
        self.field = Some(field);
        self.display.clear();
        Ok(())
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let field = self.require_field()?;
        io::write_grids(path, &[field])
    }

    // ========================================================================
    // Transform
    // ========================================================================

    /// Applies a 4×4 affine matrix after the current transform.
    ///
    /// The values are rows of a matrix acting on row vectors, as in OpenVDB's
    /// `Mat4d`, so a translation goes in elements 12, 13 and 14. Fails without
    /// touching the grid unless `matrix` holds 16 values forming an invertible
    /// affine map.
    pub fn transform_by(&mut self, matrix: &[f64]) -> Result<()> {
        let m = GridTransform::from_row_major(matrix)?;
        let field = self.require_field_mut()?;
        let composed = field.transform().post_mult(&m);
        field.set_transform(composed);
        log::debug!("transformed grid, voxel size now {}", composed.voxel_size());
        Ok(())
    }

    // ========================================================================
    // CSG
    // ========================================================================

    pub fn union(&mut self, other: &VolumetricGrid) -> Result<()> {
        self.combine(other, CsgOp::Union)
    }

    pub fn intersection(&mut self, other: &VolumetricGrid) -> Result<()> {
        self.combine(other, CsgOp::Intersection)
    }

    /// Removes `other` from this grid.
    pub fn difference(&mut self, other: &VolumetricGrid) -> Result<()> {
        self.combine(other, CsgOp::Difference)
    }

    /// Unions every operand that holds a volume.
    pub fn union_all<'g>(
        &mut self,
        others: impl IntoIterator<Item = &'g VolumetricGrid>,
    ) -> Result<()> {
        self.combine_all(others, CsgOp::Union)
    }

    /// Intersects with every operand that holds a volume.
    pub fn intersection_all<'g>(
        &mut self,
        others: impl IntoIterator<Item = &'g VolumetricGrid>,
    ) -> Result<()> {
        self.combine_all(others, CsgOp::Intersection)
    }

    /// Subtracts every operand that holds a volume.
    pub fn difference_all<'g>(
        &mut self,
        others: impl IntoIterator<Item = &'g VolumetricGrid>,
    ) -> Result<()> {
        self.combine_all(others, CsgOp::Difference)
    }

    fn combine_all<'g>(
        &mut self,
        others: impl IntoIterator<Item = &'g VolumetricGrid>,
        op: CsgOp,
    ) -> Result<()> {
        self.require_field()?;
        for (i, other) in others.into_iter().enumerate() {
            if other.is_valid() {
                self.combine(other, op)?;
            } else {
                log::warn!("skipping operand {i} of {op:?}: grid holds no volume");
            }
        }
        Ok(())
    }

    /// A secondary grid without a volume is the empty set.
    fn combine(&mut self, other: &VolumetricGrid, op: CsgOp) -> Result<()> {
        let field = self.require_field_mut()?;
        let Some(secondary) = other.field.as_ref() else {
            if op == CsgOp::Intersection {
                field.clear();
            }
            return Ok(());
        };
        let aligned = AlignmentResampler::new(field).resample(secondary);
        composite(field, &aligned, op, true);
        Ok(())
    }

    // ========================================================================
    // Filters
    // ========================================================================

    /// Moves the surface outward by `amount` world units (inward when negative).
    pub fn offset(&mut self, amount: f64) -> Result<()> {
        let field = self.require_field_mut()?;
        let voxels = -amount / field.voxel_size();
        LevelSetFilter::new(GRAIN_SIZE).offset(field, voxels);
        Ok(())
    }

    /// [`offset`](Self::offset) weighted by `mask` through `range`.
    pub fn offset_masked(
        &mut self,
        amount: f64,
        mask: &VolumetricGrid,
        range: MaskRange,
    ) -> Result<()> {
        let mask = mask.require_field()?;
        let field = Self::require_mut(&mut self.field)?;
        let voxels = -amount / field.voxel_size();
        LevelSetFilter::new(GRAIN_SIZE)
            .with_mask(AlphaMask::new(mask, range))
            .offset(field, voxels);
        Ok(())
    }

    /// Applies `kind` `iterations` times. `width` is ignored by the Laplacian.
    pub fn smooth(&mut self, kind: FilterKind, iterations: usize, width: usize) -> Result<()> {
        let field = self.require_field_mut()?;
        apply_smoothing(&LevelSetFilter::new(GRAIN_SIZE), field, kind, iterations, width);
        Ok(())
    }

    /// [`smooth`](Self::smooth) weighted by `mask` through `range`.
    pub fn smooth_masked(
        &mut self,
        kind: FilterKind,
        iterations: usize,
        width: usize,
        mask: &VolumetricGrid,
        range: MaskRange,
    ) -> Result<()> {
        let mask = mask.require_field()?;
        let field = Self::require_mut(&mut self.field)?;
        let filter = LevelSetFilter::new(GRAIN_SIZE).with_mask(AlphaMask::new(mask, range));
        apply_smoothing(&filter, field, kind, iterations, width);
        Ok(())
    }

    // ========================================================================
    // Morphing
    // ========================================================================

    /// Morphs the surface toward `target`.
    ///
    /// `end` is the full transition time and `position` the fraction of it
    /// already elapsed, so the surface is advected from `position · end` to
    /// `end`. `position` is clamped into `[0, 1]`; a non-positive `end` does
    /// nothing.
    pub fn blend(&mut self, target: &VolumetricGrid, position: f64, end: f64) -> Result<()> {
        self.blend_with(target, position, end, None)
    }

    /// [`blend`](Self::blend) weighted by `mask` through `range`.
    pub fn blend_masked(
        &mut self,
        target: &VolumetricGrid,
        position: f64,
        end: f64,
        mask: &VolumetricGrid,
        range: MaskRange,
    ) -> Result<()> {
        self.blend_with(target, position, end, Some((mask.require_field()?, range)))
    }

    fn blend_with(
        &mut self,
        target: &VolumetricGrid,
        position: f64,
        end: f64,
        mask: Option<(&FloatGrid, MaskRange)>,
    ) -> Result<()> {
        let target = target.require_field()?;
        let field = Self::require_mut(&mut self.field)?;
        if end.is_nan() || end <= 0.0 {
            log::debug!("blend end {end} is not positive, nothing to do");
            return Ok(());
        }
        let position = if position.is_nan() { 0.0 } else { position.clamp(0.0, 1.0) };

        let aligned = AlignmentResampler::new(field).resample(target);
        let mut morph = LevelSetMorphing::new(&aligned, GRAIN_SIZE);
        if let Some((mask, range)) = mask {
            morph = morph.with_mask(AlphaMask::new(mask, range));
        }
        let steps = morph.advect(field, position * end, end);
        log::debug!("blend took {steps} steps");
        Ok(())
    }

    // ========================================================================
    // Extraction
    // ========================================================================

    /// Refreshes the mesh cache with quads at the default isovalue.
    ///
    /// Level sets are meshed at 0 and other grids at 0.01.
    pub fn update_display(&mut self) -> Result<()> {
        let field = self.require_field()?;
        let iso = if field.is_level_set() {
            0.0
        } else {
            FOG_DISPLAY_ISOVALUE
        };
        let mesh = VolumeToMesh::new(iso, 0.0, GRAIN_SIZE).extract(field);
        self.display.replace_with(mesh);
        Ok(())
    }

    /// Refreshes the mesh cache at a world-space isovalue.
    ///
    /// `adaptivity` in `[0, 1]` merges near-planar regions into larger
    /// polygons, producing triangles as well as quads.
    pub fn update_display_with(&mut self, isovalue: f64, adaptivity: f64) -> Result<()> {
        let field = self.require_field()?;
        let iso = if field.is_level_set() {
            isovalue / field.voxel_size()
        } else {
            isovalue
        };
        let mesh = VolumeToMesh::new(iso, adaptivity, GRAIN_SIZE).extract(field);
        self.display.replace_with(mesh);
        Ok(())
    }

    pub fn update_display_with_settings(&mut self, settings: &Settings) -> Result<()> {
        self.update_display_with(settings.isovalue, settings.adaptivity)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Projects world-space points onto the surface.
    pub fn closest_points(&self, points: &[DVec3]) -> Result<ClosestPoints> {
        Ok(ClosestPointQuery::new(self)?.search(points))
    }

    fn require_field(&self) -> Result<&FloatGrid> {
        self.field.as_ref().ok_or(DendroError::EmptyGrid)
    }

    fn require_field_mut(&mut self) -> Result<&mut FloatGrid> {
        Self::require_mut(&mut self.field)
    }

    fn require_mut(field: &mut Option<FloatGrid>) -> Result<&mut FloatGrid> {
        field.as_mut().ok_or(DendroError::EmptyGrid)
    }
}

fn check_bandwidth(bandwidth: f64) -> Result<()> {
    if bandwidth.is_finite() && bandwidth > 0.0 {
        Ok(())
    } else {
        Err(DendroError::InvalidBandwidth(bandwidth))
    }
}

fn apply_smoothing(
    filter: &LevelSetFilter<'_>,
    field: &mut FloatGrid,
    kind: FilterKind,
    iterations: usize,
    width: usize,
) {
    for _ in 0..iterations {
        match kind {
            FilterKind::Gaussian => filter.gaussian(field, width),
            FilterKind::Laplacian => filter.laplacian(field),
            FilterKind::Mean => filter.mean(field, width),
            FilterKind::Median => filter.median(field, width),
        }
    }
    log::debug!("{kind:?} smoothing x{iterations} (width {width})");
}
