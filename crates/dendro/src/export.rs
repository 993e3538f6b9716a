//! Flat buffers for handing meshes across language boundaries.

use dendro_core::{DendroError, MeshBuffer, Result, UVec4, Vec3, INVALID_INDEX};

/// Index written in place of [`INVALID_INDEX`] in face buffers.
pub const EXPORTED_INVALID: i32 = -1;

/// Values per exported face.
pub const FACE_STRIDE: usize = 4;

/// Flattens a mesh into freshly allocated buffers.
///
/// Vertices become `x, y, z` triples. Faces become four indices with the
/// fourth corner first: `[d, a, b, c]`, so a triangle starts with `-1`.
#[derive(Debug, Clone, Copy)]
pub struct BufferExporter<'a> {
    mesh: &'a MeshBuffer,
}

impl<'a> BufferExporter<'a> {
    pub fn new(mesh: &'a MeshBuffer) -> Self {
        Self { mesh }
    }

    pub fn vertex_buffer(&self) -> Vec<f32> {
        self.mesh.flat_vertices().to_vec()
    }

    pub fn face_buffer(&self) -> Vec<i32> {
        let mut out = Vec::with_capacity(self.mesh.face_count() * FACE_STRIDE);
        for face in self.mesh.faces() {
            out.extend([face.w, face.x, face.y, face.z].map(export_index));
        }
        out
    }

    /// Rebuilds a mesh from buffers produced by [`vertex_buffer`](Self::vertex_buffer)
    /// and [`face_buffer`](Self::face_buffer).
    pub fn import(vertices: &[f32], faces: &[i32]) -> Result<MeshBuffer> {
        if vertices.len() % 3 != 0 {
            return Err(DendroError::SizeMismatch {
                expected: vertices.len() / 3 * 3,
                actual: vertices.len(),
            });
        }
        if faces.len() % FACE_STRIDE != 0 {
            return Err(DendroError::SizeMismatch {
                expected: faces.len() / FACE_STRIDE * FACE_STRIDE,
                actual: faces.len(),
            });
        }

        let vertex_count = vertices.len() / 3;
        let to_index = |i: i32| -> Result<u32> {
            match usize::try_from(i) {
                Ok(n) if n < vertex_count => Ok(n as u32),
                _ => Err(DendroError::InvalidMesh),
            }
        };

        let mut mesh = MeshBuffer::new();
        mesh.add_vertices(
            &vertices
                .chunks_exact(3)
                .map(Vec3::from_slice)
                .collect::<Vec<_>>(),
        );
        for f in faces.chunks_exact(FACE_STRIDE) {
            let last = if f[0] == EXPORTED_INVALID {
                INVALID_INDEX
            } else {
                to_index(f[0])?
            };
            mesh.add_face(UVec4::new(to_index(f[1])?, to_index(f[2])?, to_index(f[3])?, last));
        }
        Ok(mesh)
    }
}

fn export_index(i: u32) -> i32 {
    if i == INVALID_INDEX {
        EXPORTED_INVALID
    } else {
        i32::try_from(i).unwrap_or(EXPORTED_INVALID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_mesh() -> MeshBuffer {
        let mut mesh = MeshBuffer::new();
        mesh.add_vertices(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.5, 0.5, 1.0),
        ]);
        mesh.add_quad(0, 1, 2, 3);
        mesh.add_triangle(0, 1, 4);
        mesh
    }

    #[test]
    fn test_vertex_buffer_layout() {
        let mesh = mixed_mesh();
        let buffer = BufferExporter::new(&mesh).vertex_buffer();
        assert_eq!(buffer.len(), 15);
        assert_eq!(&buffer[3..6], &[1.0, 0.0, 0.0]);
        assert_eq!(&buffer[12..], &[0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_face_buffer_is_sentinel_first() {
        let mesh = mixed_mesh();
        let buffer = BufferExporter::new(&mesh).face_buffer();
        assert_eq!(buffer, vec![3, 0, 1, 2, -1, 0, 1, 4]);
    }

    #[test]
    fn test_fresh_buffers_per_call() {
        let mesh = mixed_mesh();
        let exporter = BufferExporter::new(&mesh);
        let a = exporter.face_buffer();
        let b = exporter.face_buffer();
        assert_eq!(a, b);
        assert_ne!(a.as_ptr(), b.as_ptr());
    }

    #[test]
    fn test_empty_mesh_exports_nothing() {
        let mesh = MeshBuffer::new();
        let exporter = BufferExporter::new(&mesh);
        assert!(exporter.vertex_buffer().is_empty());
        assert!(exporter.face_buffer().is_empty());
    }

    #[test]
    fn test_import_restores_mesh() {
        let mesh = mixed_mesh();
        let exporter = BufferExporter::new(&mesh);
        let back =
            BufferExporter::import(&exporter.vertex_buffer(), &exporter.face_buffer()).unwrap();
        assert_eq!(back, mesh);
    }

    #[test]
    fn test_import_rejects_bad_buffers() {
        assert!(matches!(
            BufferExporter::import(&[0.0; 4], &[]),
            Err(DendroError::SizeMismatch { .. })
        ));
        assert!(matches!(
            BufferExporter::import(&[0.0; 3], &[-1, 0, 0]),
            Err(DendroError::SizeMismatch { .. })
        ));
        assert!(matches!(
            BufferExporter::import(&[0.0; 9], &[-1, 0, 1, 5]),
            Err(DendroError::InvalidMesh)
        ));
    }
}
