//! Polygon buffer shared by conversion and extraction.

use glam::{UVec4, Vec3};

use crate::error::{DendroError, Result};

/// Marks the unused fourth slot of a triangle face.
pub const INVALID_INDEX: u32 = u32::MAX;

/// A mutable vertex/face container.
///
/// Faces are always four indices wide. Triangles are stored as
/// `[a, b, c, INVALID_INDEX]`; quads use all four slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuffer {
    vertices: Vec<Vec3>,
    faces: Vec<UVec4>,
}

impl MeshBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer from existing vertices and faces.
    pub fn from_parts(vertices: Vec<Vec3>, faces: Vec<UVec4>) -> Self {
        Self { vertices, faces }
    }

    /// Builds a triangle mesh from flat `xyz` coordinates and flat index triples.
    pub fn from_flat_triangles(coords: &[f32], indices: &[i32]) -> Result<Self> {
        if coords.len() % 3 != 0 {
            return Err(DendroError::SizeMismatch {
                expected: coords.len() / 3 * 3,
                actual: coords.len(),
            });
        }
        if indices.len() % 3 != 0 {
            return Err(DendroError::SizeMismatch {
                expected: indices.len() / 3 * 3,
                actual: indices.len(),
            });
        }

        let mut mesh = Self::new();
        mesh.vertices.reserve(coords.len() / 3);
        for c in coords.chunks_exact(3) {
            mesh.add_vertex(Vec3::new(c[0], c[1], c[2]));
        }

        let vertex_count = mesh.vertices.len();
        mesh.faces.reserve(indices.len() / 3);
        for tri in indices.chunks_exact(3) {
            let mut face = [0u32; 3];
            for (slot, &index) in face.iter_mut().zip(tri) {
                match u32::try_from(index) {
                    Ok(i) if (i as usize) < vertex_count => *slot = i,
                    _ => {
                        return Err(DendroError::SizeMismatch {
                            expected: vertex_count,
                            actual: usize::try_from(index).unwrap_or(usize::MAX),
                        })
                    }
                }
            }
            mesh.add_triangle(face[0], face[1], face[2]);
        }
        Ok(mesh)
    }

    /// Appends a vertex and returns its index.
    pub fn add_vertex(&mut self, vertex: Vec3) -> u32 {
        self.vertices.push(vertex);
        (self.vertices.len() - 1) as u32
    }

    /// Appends several vertices.
    pub fn add_vertices(&mut self, vertices: &[Vec3]) {
        self.vertices.extend_from_slice(vertices);
    }

    /// Appends a face (triangle when the fourth slot is [`INVALID_INDEX`]).
    pub fn add_face(&mut self, face: UVec4) {
        self.faces.push(face);
    }

    /// Appends several faces.
    pub fn add_faces(&mut self, faces: &[UVec4]) {
        self.faces.extend_from_slice(faces);
    }

    /// Appends a triangle.
    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.faces.push(UVec4::new(a, b, c, INVALID_INDEX));
    }

    /// Appends a quad.
    pub fn add_quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.faces.push(UVec4::new(a, b, c, d));
    }

    /// Returns a deep copy.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Replaces the contents with those of `other`.
    pub fn replace_with(&mut self, other: MeshBuffer) {
        *self = other;
    }

    /// True when both vertices and faces are present.
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && !self.faces.is_empty()
    }

    /// Removes all vertices and faces.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.faces.clear();
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn faces(&self) -> &[UVec4] {
        &self.faces
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Number of faces whose fourth slot is [`INVALID_INDEX`].
    pub fn triangle_count(&self) -> usize {
        self.faces.iter().filter(|f| f.w == INVALID_INDEX).count()
    }

    /// Vertex coordinates as one flat `xyz` slice.
    pub fn flat_vertices(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Face indices as one flat slice, four per face.
    pub fn flat_faces(&self) -> &[u32] {
        bytemuck::cast_slice(&self.faces)
    }

    /// Applies `f` to every vertex.
    pub fn map_vertices(&mut self, f: impl Fn(Vec3) -> Vec3) {
        for v in &mut self.vertices {
            *v = f(*v);
        }
    }

    /// Axis-aligned bounds of the vertices, `None` when empty.
    pub fn bounding_box(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }

    /// Number of unique undirected edges.
    pub fn edge_count(&self) -> usize {
        let mut edges = std::collections::HashSet::new();
        for face in &self.faces {
            let n = if face.w == INVALID_INDEX { 3 } else { 4 };
            let idx = face.to_array();
            for i in 0..n {
                let a = idx[i];
                let b = idx[(i + 1) % n];
                edges.insert((a.min(b), a.max(b)));
            }
        }
        edges.len()
    }

    /// Euler characteristic `V - E + F`.
    #[allow(clippy::cast_possible_wrap)]
    pub fn euler_characteristic(&self) -> i64 {
        self.vertices.len() as i64 - self.edge_count() as i64 + self.faces.len() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron() -> MeshBuffer {
        let coords = [
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ];
        let indices = [0, 2, 1, 0, 1, 3, 0, 3, 2, 1, 2, 3];
        MeshBuffer::from_flat_triangles(&coords, &indices).unwrap()
    }

    #[test]
    fn test_empty_is_invalid() {
        let mut mesh = MeshBuffer::new();
        assert!(!mesh.is_valid());
        mesh.add_vertex(Vec3::ZERO);
        assert!(!mesh.is_valid());
        mesh.add_triangle(0, 0, 0);
        assert!(mesh.is_valid());
        mesh.clear();
        assert!(!mesh.is_valid());
    }

    #[test]
    fn test_from_flat_triangles() {
        let mesh = tetrahedron();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 4);
        assert_eq!(mesh.triangle_count(), 4);
        assert_eq!(mesh.faces()[0], UVec4::new(0, 2, 1, INVALID_INDEX));
        assert_eq!(mesh.euler_characteristic(), 2);
    }

    #[test]
    fn test_from_flat_rejects_bad_input() {
        assert!(MeshBuffer::from_flat_triangles(&[0.0, 1.0], &[]).is_err());
        assert!(MeshBuffer::from_flat_triangles(&[0.0; 9], &[0, 1]).is_err());
        assert!(MeshBuffer::from_flat_triangles(&[0.0; 9], &[0, 1, 3]).is_err());
        assert!(MeshBuffer::from_flat_triangles(&[0.0; 9], &[0, -1, 2]).is_err());
    }

    #[test]
    fn test_duplicate_is_deep() {
        let mesh = tetrahedron();
        let mut copy = mesh.duplicate();
        copy.add_vertex(Vec3::ONE);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(copy.vertex_count(), 5);
    }

    #[test]
    fn test_flat_views() {
        let mut mesh = MeshBuffer::new();
        mesh.add_vertices(&[Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)]);
        mesh.add_quad(0, 1, 1, 0);
        assert_eq!(mesh.flat_vertices(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(mesh.flat_faces(), &[0, 1, 1, 0]);
    }

    #[test]
    fn test_bounding_box() {
        assert!(MeshBuffer::new().bounding_box().is_none());
        let (lo, hi) = tetrahedron().bounding_box().unwrap();
        assert_eq!(lo, Vec3::ZERO);
        assert_eq!(hi, Vec3::ONE);
    }
}
