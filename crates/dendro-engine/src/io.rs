//! Grid files.
//!
//! A grid file is a JSON document holding a list of grid records. Each record
//! stores the grid name, class, background, row-major transform and the
//! active voxels.

use std::fs;
use std::path::Path;

use dendro_core::{DendroError, GridTransform, IVec3, Result};
use serde::{Deserialize, Serialize};

use crate::level_set::{FloatGrid, GridClass};

/// Serialized form of one grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRecord {
    pub name: String,
    pub class: GridClass,
    pub background: f32,
    /// Index-to-world matrix, row-major.
    pub transform: Vec<f64>,
    pub coords: Vec<[i32; 3]>,
    pub values: Vec<f32>,
}

/// Serialized form of a grid file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridFile {
    #[serde(default)]
    pub grids: Vec<GridRecord>,
}

impl GridRecord {
    pub fn from_grid(grid: &FloatGrid) -> Self {
        let (coords, values) = grid
            .iter_active()
            .map(|(ijk, v)| (ijk.to_array(), v))
            .unzip();
        Self {
            name: grid.name().to_string(),
            class: grid.class(),
            background: grid.background(),
            transform: grid.transform().to_row_major().to_vec(),
            coords,
            values,
        }
    }

    pub fn into_grid(self) -> Result<FloatGrid> {
        if self.coords.len() != self.values.len() {
            return Err(DendroError::MalformedGridFile(format!(
                "grid '{}' has {} coordinates but {} values",
                self.name,
                self.coords.len(),
                self.values.len()
            )));
        }
        let transform = GridTransform::from_row_major(&self.transform)
            .map_err(|e| DendroError::MalformedGridFile(format!("grid '{}': {e}", self.name)))?;

        let mut grid = match self.class {
            GridClass::LevelSet => FloatGrid::new_level_set(transform, self.background),
            GridClass::FogVolume | GridClass::Unknown => {
                let mut g = FloatGrid::new_fog_volume(transform);
                g.set_class(self.class);
                g.set_background(self.background);
                g
            }
        };
        grid.set_name(self.name);
        grid.set_active_voxels(
            self.coords
                .into_iter()
                .zip(self.values)
                .map(|(c, v)| (IVec3::from_array(c), v)),
        );
        Ok(grid)
    }
}

/// Writes grids to `path`, replacing any existing file.
pub fn write_grids(path: impl AsRef<Path>, grids: &[&FloatGrid]) -> Result<()> {
    let path = path.as_ref();
    let file = GridFile {
        grids: grids.iter().map(|g| GridRecord::from_grid(g)).collect(),
    };
    fs::write(path, serde_json::to_string(&file)?)?;
    log::info!("wrote {} grid(s) to {}", grids.len(), path.display());
    Ok(())
}

/// Reads every grid stored in `path`.
pub fn read_grids(path: impl AsRef<Path>) -> Result<Vec<FloatGrid>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let file: GridFile = serde_json::from_str(&content)?;
    log::info!("read {} grid(s) from {}", file.grids.len(), path.display());
    file.grids.into_iter().map(GridRecord::into_grid).collect()
}

/// Reads the first grid stored in `path`.
pub fn read_first_grid(path: impl AsRef<Path>) -> Result<FloatGrid> {
    let path = path.as_ref();
    read_grids(path)?
        .into_iter()
        .next()
        .ok_or_else(|| DendroError::NoGridInFile(path.to_path_buf()))
}
