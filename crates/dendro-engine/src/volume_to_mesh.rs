//! Iso-surface extraction by dual contouring (surface nets).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use dendro_core::{DVec3, IVec3, MeshBuffer, UVec4, Vec3, INVALID_INDEX};
use rayon::prelude::*;

use crate::level_set::{axis_offset, FloatGrid, GridClass};
use crate::sampler::gradient_trilinear;

/// Loosest normal agreement, as `1 − cos`, accepted at adaptivity 1.
const MAX_NORMAL_SPREAD: f64 = 0.25;

/// Corner pairs of the twelve cell edges.
const CELL_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (0, 2),
    (1, 3),
    (4, 6),
    (5, 7),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

fn corner_offset(k: usize) -> IVec3 {
    IVec3::new((k & 1) as i32, ((k >> 1) & 1) as i32, ((k >> 2) & 1) as i32)
}

/// A cell with a sign change and its dual vertex.
#[derive(Debug, Clone, Copy)]
struct SurfaceCell {
    cell: IVec3,
    inside_mask: u8,
    vertex: DVec3,
}

/// Extracts a polygon mesh from a grid.
///
/// One vertex is placed in every cell whose corners straddle the isovalue, at
/// the mean of its edge crossings, and one quad is emitted per crossing
/// lattice edge. Quads face away from the inside. With `adaptivity > 0`,
/// vertices of 2×2×2 cell blocks whose normals agree are merged, and the
/// collapsed quads become triangles.
#[derive(Debug, Clone, Copy)]
pub struct VolumeToMesh {
    isovalue: f64,
    adaptivity: f64,
    grain_size: usize,
}

impl VolumeToMesh {
    /// `isovalue` is in the grid's value units (voxels for level sets).
    pub fn new(isovalue: f64, adaptivity: f64, grain_size: usize) -> Self {
        Self {
            isovalue,
            adaptivity: adaptivity.clamp(0.0, 1.0),
            grain_size: grain_size.max(1),
        }
    }

    /// Extracts a world-space mesh.
    pub fn extract(&self, grid: &FloatGrid) -> MeshBuffer {
        let iso = self.isovalue;
        let fog = grid.class() == GridClass::FogVolume;
        let inside = move |v: f32| {
            if fog {
                f64::from(v) > iso
            } else {
                f64::from(v) < iso
            }
        };

        let mut candidates: BTreeSet<(i32, i32, i32)> = BTreeSet::new();
        for (ijk, _) in grid.iter_active() {
            for k in 0..8 {
                let c = ijk - corner_offset(k);
                candidates.insert((c.z, c.y, c.x));
            }
        }
        let candidates: Vec<IVec3> = candidates
            .into_iter()
            .map(|(z, y, x)| IVec3::new(x, y, z))
            .collect();

        let cells: Vec<SurfaceCell> = candidates
            .par_iter()
            .with_min_len(self.grain_size)
            .filter_map(|&cell| surface_cell(grid, cell, iso, &inside))
            .collect();

        let index: HashMap<IVec3, u32> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| (c.cell, i as u32))
            .collect();

        let mut faces = Vec::new();
        for c in &cells {
            // lattice edge from corner 0 to corner 1 << axis
            for axis in 0..3 {
                let p_inside = c.inside_mask & 1 != 0;
                let q_inside = c.inside_mask & (1 << (1 << axis)) != 0;
                if p_inside == q_inside {
                    continue;
                }
                let u = axis_offset((axis + 1) % 3);
                let v = axis_offset((axis + 2) % 3);
                let ring = [c.cell - u - v, c.cell - v, c.cell, c.cell - u];
                let Some(ids) = ring
                    .iter()
                    .map(|cell| index.get(cell).copied())
                    .collect::<Option<Vec<u32>>>()
                else {
                    continue;
                };
                let quad = if p_inside {
                    UVec4::new(ids[0], ids[1], ids[2], ids[3])
                } else {
                    UVec4::new(ids[3], ids[2], ids[1], ids[0])
                };
                faces.push(quad);
            }
        }

        let mut positions: Vec<DVec3> = cells.iter().map(|c| c.vertex).collect();
        if self.adaptivity > 0.0 {
            let normals: Vec<DVec3> = positions
                .par_iter()
                .with_min_len(self.grain_size)
                .map(|&p| gradient_trilinear(grid, p).normalize_or_zero())
                .collect();
            let blocks: Vec<IVec3> = cells.iter().map(|c| c.cell.div_euclid(IVec3::splat(2))).collect();
            (positions, faces) = self.simplify(&positions, &normals, &blocks, &faces);
        }

        let transform = grid.transform();
        let vertices: Vec<Vec3> = positions
            .iter()
            .map(|&p| transform.index_to_world(p).as_vec3())
            .collect();
        let mesh = MeshBuffer::from_parts(vertices, faces);
        log::debug!(
            "extracted {} vertices, {} faces ({} triangles) at isovalue {iso}",
            mesh.vertex_count(),
            mesh.face_count(),
            mesh.triangle_count()
        );
        mesh
    }

    /// Merges near-planar vertex clusters and rebuilds the faces.
    fn simplify(
        &self,
        positions: &[DVec3],
        normals: &[DVec3],
        blocks: &[IVec3],
        faces: &[UVec4],
    ) -> (Vec<DVec3>, Vec<UVec4>) {
        let threshold = 1.0 - self.adaptivity * MAX_NORMAL_SPREAD;

        let mut groups: BTreeMap<(i32, i32, i32), Vec<usize>> = BTreeMap::new();
        for (i, b) in blocks.iter().enumerate() {
            groups.entry((b.z, b.y, b.x)).or_default().push(i);
        }

        let mut remap: Vec<usize> = (0..positions.len()).collect();
        let mut merged = positions.to_vec();
        for members in groups.values().filter(|m| m.len() > 1) {
            let mean = members
                .iter()
                .fold(DVec3::ZERO, |acc, &i| acc + normals[i])
                .normalize_or_zero();
            if mean == DVec3::ZERO || members.iter().any(|&i| normals[i].dot(mean) < threshold) {
                continue;
            }
            let center = members.iter().fold(DVec3::ZERO, |acc, &i| acc + positions[i])
                / members.len() as f64;
            let rep = members[0];
            merged[rep] = center;
            for &i in members {
                remap[i] = rep;
            }
        }

        let mut out_faces = Vec::with_capacity(faces.len());
        for face in faces {
            let mut ring: Vec<usize> = Vec::with_capacity(4);
            for &i in &face.to_array() {
                let r = remap[i as usize];
                if ring.last() != Some(&r) {
                    ring.push(r);
                }
            }
            while ring.len() > 1 && ring.first() == ring.last() {
                ring.pop();
            }
            let distinct: BTreeSet<usize> = ring.iter().copied().collect();
            match (ring.len(), distinct.len()) {
                (4, 4) => out_faces.push([ring[0], ring[1], ring[2], ring[3]]),
                (3, 3) => out_faces.push([ring[0], ring[1], ring[2], usize::MAX]),
                _ => {}
            }
        }

        // compact to the referenced vertices, keeping their order
        let mut used = vec![false; merged.len()];
        for f in &out_faces {
            for &i in f.iter().filter(|&&i| i != usize::MAX) {
                used[i] = true;
            }
        }
        let mut new_index = vec![INVALID_INDEX; merged.len()];
        let mut vertices = Vec::new();
        for (i, p) in merged.iter().enumerate() {
            if used[i] {
                new_index[i] = vertices.len() as u32;
                vertices.push(*p);
            }
        }
        let faces = out_faces
            .into_iter()
            .map(|f| {
                let m = |i: usize| if i == usize::MAX { INVALID_INDEX } else { new_index[i] };
                UVec4::new(m(f[0]), m(f[1]), m(f[2]), m(f[3]))
            })
            .collect();
        (vertices, faces)
    }
}

fn surface_cell(
    grid: &FloatGrid,
    cell: IVec3,
    iso: f64,
    inside: &(impl Fn(f32) -> bool + Sync),
) -> Option<SurfaceCell> {
    let mut values = [0.0_f32; 8];
    let mut mask = 0u8;
    for (k, v) in values.iter_mut().enumerate() {
        *v = grid.get(cell + corner_offset(k));
        if inside(*v) {
            mask |= 1 << k;
        }
    }
    if mask == 0 || mask == 0xff {
        return None;
    }

    let mut sum = DVec3::ZERO;
    let mut count = 0.0;
    for &(a, b) in &CELL_EDGES {
        if (mask >> a) & 1 == (mask >> b) & 1 {
            continue;
        }
        let (va, vb) = (f64::from(values[a]), f64::from(values[b]));
        let t = if (vb - va).abs() > f64::EPSILON {
            ((iso - va) / (vb - va)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let pa = corner_offset(a).as_dvec3();
        let pb = corner_offset(b).as_dvec3();
        sum += pa + (pb - pa) * t;
        count += 1.0;
    }

    Some(SurfaceCell {
        cell,
        inside_mask: mask,
        vertex: cell.as_dvec3() + sum / count,
    })
}
