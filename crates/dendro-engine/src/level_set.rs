//! Sparse narrow-band scalar grid.

use std::collections::BTreeMap;

use dendro_core::{DVec3, GridTransform, IVec3};
use serde::{Deserialize, Serialize};

/// How the values of a grid are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GridClass {
    /// Signed distance to a surface, negative inside.
    #[default]
    LevelSet,
    /// Density field, zero outside.
    FogVolume,
    Unknown,
}

/// A sparse scalar field over an unbounded integer lattice.
///
/// Active values are stored per x-row, keyed by `(z, y)`. For level sets the
/// values are in voxel units and every value is strictly inside
/// `(-background, background)` after pruning. Inactive voxels read as
/// `+background` outside the surface and `-background` inside it; a voxel is
/// inside when the nearest active values on both sides of its x-row are
/// negative.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatGrid {
    name: String,
    class: GridClass,
    background: f32,
    transform: GridTransform,
    rows: BTreeMap<(i32, i32), BTreeMap<i32, f32>>,
    active_count: usize,
}

impl FloatGrid {
    /// Creates an empty level set with a narrow band of `half_width` voxels.
    pub fn new_level_set(transform: GridTransform, half_width: f32) -> Self {
        Self {
            name: String::new(),
            class: GridClass::LevelSet,
            background: half_width,
            transform,
            rows: BTreeMap::new(),
            active_count: 0,
        }
    }

    /// Creates an empty fog volume with a zero background.
    pub fn new_fog_volume(transform: GridTransform) -> Self {
        Self {
            class: GridClass::FogVolume,
            background: 0.0,
            ..Self::new_level_set(transform, 0.0)
        }
    }

    /// Creates an empty grid with the same class, background and transform.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        Self {
            name: self.name.clone(),
            class: self.class,
            background: self.background,
            transform: self.transform,
            rows: BTreeMap::new(),
            active_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn class(&self) -> GridClass {
        self.class
    }

    pub fn set_class(&mut self, class: GridClass) {
        self.class = class;
    }

    pub fn is_level_set(&self) -> bool {
        self.class == GridClass::LevelSet
    }

    /// Value of inactive voxels outside the surface.
    pub fn background(&self) -> f32 {
        self.background
    }

    /// Narrow-band half-width in voxels. Same as the background for level sets.
    pub fn half_width(&self) -> f32 {
        self.background
    }

    pub fn set_background(&mut self, background: f32) {
        self.background = background;
    }

    pub fn transform(&self) -> &GridTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GridTransform) {
        self.transform = transform;
    }

    pub fn voxel_size(&self) -> f64 {
        self.transform.voxel_size()
    }

    pub fn active_voxel_count(&self) -> usize {
        self.active_count
    }

    pub fn is_empty(&self) -> bool {
        self.active_count == 0
    }

    /// Returns the stored value, if the voxel is active.
    pub fn active_value(&self, ijk: IVec3) -> Option<f32> {
        self.rows.get(&(ijk.z, ijk.y))?.get(&ijk.x).copied()
    }

    pub fn is_active(&self, ijk: IVec3) -> bool {
        self.active_value(ijk).is_some()
    }

    /// Value at a voxel, inferring the sign of inactive level-set voxels.
    pub fn get(&self, ijk: IVec3) -> f32 {
        let Some(row) = self.rows.get(&(ijk.z, ijk.y)) else {
            return self.background;
        };
        if let Some(&v) = row.get(&ijk.x) {
            return v;
        }
        if self.class != GridClass::LevelSet {
            return self.background;
        }
        let before = row.range(..ijk.x).next_back().map(|(_, &v)| v);
        let after = row.range(ijk.x + 1..).next().map(|(_, &v)| v);
        match (before, after) {
            (Some(b), Some(a)) if b < 0.0 && a < 0.0 => -self.background,
            _ => self.background,
        }
    }

    /// True when the voxel reads as inside the surface.
    pub fn is_inside(&self, ijk: IVec3) -> bool {
        self.get(ijk) < 0.0
    }

    /// Stores an active value.
    pub fn set(&mut self, ijk: IVec3, value: f32) {
        let row = self.rows.entry((ijk.z, ijk.y)).or_default();
        if row.insert(ijk.x, value).is_none() {
            self.active_count += 1;
        }
    }

    /// Makes a voxel inactive.
    pub fn remove(&mut self, ijk: IVec3) -> Option<f32> {
        let key = (ijk.z, ijk.y);
        let row = self.rows.get_mut(&key)?;
        let removed = row.remove(&ijk.x);
        if row.is_empty() {
            self.rows.remove(&key);
        }
        if removed.is_some() {
            self.active_count -= 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.active_count = 0;
    }

    /// Active voxels in `(z, y, x)` order.
    pub fn iter_active(&self) -> impl Iterator<Item = (IVec3, f32)> + '_ {
        self.rows.iter().flat_map(|(&(z, y), row)| {
            row.iter().map(move |(&x, &v)| (IVec3::new(x, y, z), v))
        })
    }

    /// Collects the active voxels in `(z, y, x)` order.
    pub fn active_voxels(&self) -> Vec<(IVec3, f32)> {
        let mut voxels = Vec::with_capacity(self.active_count);
        voxels.extend(self.iter_active());
        voxels
    }

    /// Replaces all active values.
    pub fn set_active_voxels(&mut self, voxels: impl IntoIterator<Item = (IVec3, f32)>) {
        self.clear();
        for (ijk, v) in voxels {
            self.set(ijk, v);
        }
    }

    /// Index-space bounds of the active voxels.
    pub fn active_bounds(&self) -> Option<(IVec3, IVec3)> {
        let mut iter = self.iter_active();
        let (first, _) = iter.next()?;
        Some(iter.fold((first, first), |(lo, hi), (ijk, _)| (lo.min(ijk), hi.max(ijk))))
    }

    /// World-space bounds of the active voxels.
    pub fn world_bounds(&self) -> Option<(DVec3, DVec3)> {
        let (lo, hi) = self.active_bounds()?;
        let mut min = DVec3::splat(f64::MAX);
        let mut max = DVec3::splat(f64::MIN);
        for corner in 0..8 {
            let c = IVec3::new(
                if corner & 1 == 0 { lo.x } else { hi.x },
                if corner & 2 == 0 { lo.y } else { hi.y },
                if corner & 4 == 0 { lo.z } else { hi.z },
            );
            let w = self.transform.index_to_world(c.as_dvec3());
            min = min.min(w);
            max = max.max(w);
        }
        Some((min, max))
    }

    /// Removes level-set voxels whose magnitude reaches the background.
    ///
    /// Fog volumes drop voxels equal to the background within `tolerance`.
    pub fn prune(&mut self, tolerance: f32) {
        let bg = self.background;
        let level_set = self.is_level_set();
        let before = self.active_count;
        let mut removed = 0;
        self.rows.retain(|_, row| {
            row.retain(|_, v| {
                let keep = if level_set {
                    v.abs() < bg - tolerance
                } else {
                    (*v - bg).abs() > tolerance
                };
                if !keep {
                    removed += 1;
                }
                keep
            });
            !row.is_empty()
        });
        self.active_count -= removed;
        log::trace!("pruned {removed} of {before} voxels");
    }

    /// Makes `half_width` the band and drops level-set voxels at or beyond it.
    ///
    /// A voxel whose neighbour along its x-row has the opposite sign is kept,
    /// clamped just inside the band, so every inactive voxel still reads with
    /// the sign it had. The ends of a row count as outside.
    pub fn narrow_band(&mut self, half_width: f32) {
        self.background = half_width;
        if !self.is_level_set() {
            return;
        }
        let limit = half_width * BAND_EDGE;
        let mut count = 0;
        self.rows.retain(|_, row| {
            let entries: Vec<(i32, f32)> = row.iter().map(|(&x, &v)| (x, v)).collect();
            let negative = |j: Option<usize>| {
                j.and_then(|j| entries.get(j))
                    .map_or(false, |&(_, w)| w < 0.0)
            };
            row.clear();
            for (i, &(x, v)) in entries.iter().enumerate() {
                if v.abs() < half_width {
                    row.insert(x, v);
                    continue;
                }
                let inside = v < 0.0;
                if negative(i.checked_sub(1)) != inside || negative(Some(i + 1)) != inside {
                    row.insert(x, v.clamp(-limit, limit));
                }
            }
            count += row.len();
            !row.is_empty()
        });
        log::trace!("narrowed band to {half_width}: {} -> {count} voxels", self.active_count);
        self.active_count = count;
    }

    /// Position of a voxel center in world space.
    pub fn index_to_world(&self, ijk: IVec3) -> DVec3 {
        self.transform.index_to_world(ijk.as_dvec3())
    }

    pub fn world_to_index(&self, world: DVec3) -> DVec3 {
        self.transform.world_to_index(world)
    }
}

/// Fraction of the half-width that crossing voxels are clamped to.
const BAND_EDGE: f32 = 0.999;

/// The six face-adjacent offsets.
pub const FACE_NEIGHBORS: [IVec3; 6] = [
    IVec3::new(-1, 0, 0),
    IVec3::new(1, 0, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, 0, -1),
    IVec3::new(0, 0, 1),
];

/// Unit offset along axis `axis` (0 = x, 1 = y, 2 = z).
pub fn axis_offset(axis: usize) -> IVec3 {
    match axis {
        0 => IVec3::X,
        1 => IVec3::Y,
        _ => IVec3::Z,
    }
}
