//! Bringing a secondary grid onto a primary grid's lattice.

use dendro_core::DMat4;
use dendro_engine::{FloatGrid, GridClass, GridTransformer};

/// Grain size used by every engine call made from the orchestration layer.
pub(crate) const GRAIN_SIZE: usize = 1;

/// Resamples secondary grids into the index space of a primary grid.
///
/// Binary operations (CSG, morphing) need both operands on one lattice. The
/// resampler never touches the secondary grid; it builds a disposable copy
/// that carries the primary's transform and half-width.
#[derive(Debug, Clone, Copy)]
pub struct AlignmentResampler<'a> {
    primary: &'a FloatGrid,
}

impl<'a> AlignmentResampler<'a> {
    pub fn new(primary: &'a FloatGrid) -> Self {
        Self { primary }
    }

    /// Map from `secondary`'s index space into the primary's index space.
    pub fn relative_transform(&self, secondary: &FloatGrid) -> DMat4 {
        secondary.transform().relative_to(self.primary.transform())
    }

    /// Returns `secondary` resampled onto the primary's lattice.
    pub fn resample(&self, secondary: &FloatGrid) -> FloatGrid {
        let mut aligned = match secondary.class() {
            GridClass::LevelSet => {
                FloatGrid::new_level_set(*self.primary.transform(), self.primary.half_width())
            }
            class => {
                let mut grid = FloatGrid::new_fog_volume(*self.primary.transform());
                grid.set_class(class);
                grid.set_background(secondary.background());
                grid
            }
        };
        aligned.set_name(secondary.name());

        GridTransformer::new(self.relative_transform(secondary), GRAIN_SIZE)
            .transform_grid(secondary, &mut aligned);
        log::debug!(
            "aligned {} voxels onto a {} lattice ({} active)",
            secondary.active_voxel_count(),
            self.primary.voxel_size(),
            aligned.active_voxel_count()
        );
        aligned
    }
}
