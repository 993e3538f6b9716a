//! Tests for the C ABI.
//!
//! Every call goes through the exported `extern "C"` functions with raw
//! pointers, the way a foreign host would use the library.

use std::ffi::CString;
use std::ptr;

use dendro::ffi::*;

/// Takes ownership of a buffer returned across the boundary.
fn take_floats(data: *mut f32, size: i32) -> Vec<f32> {
    if data.is_null() {
        assert_eq!(size, 0);
        return Vec::new();
    }
    let values = unsafe { std::slice::from_raw_parts(data, size as usize) }.to_vec();
    unsafe { dendro_free_float_buffer(data, size) };
    values
}

fn take_ints(data: *mut i32, size: i32) -> Vec<i32> {
    if data.is_null() {
        assert_eq!(size, 0);
        return Vec::new();
    }
    let values = unsafe { std::slice::from_raw_parts(data, size as usize) }.to_vec();
    unsafe { dendro_free_int_buffer(data, size) };
    values
}

fn sphere(radius: f64) -> *mut dendro::VolumetricGrid {
    let grid = dendro_create();
    let points = [0.0, 0.0, 0.0];
    let radii = [radius];
    let ok = unsafe {
        dendro_from_points(
            grid,
            points.as_ptr(),
            points.len() as i32,
            radii.as_ptr(),
            radii.len() as i32,
            0.1,
            3.0,
        )
    };
    assert!(ok);
    grid
}

fn mesh_buffers(grid: *mut dendro::VolumetricGrid) -> (Vec<f32>, Vec<i32>) {
    let mut v_size = -1;
    let mut f_size = -1;
    unsafe {
        let vertices = dendro_vertex_buffer(grid, &mut v_size);
        let faces = dendro_face_buffer(grid, &mut f_size);
        (take_floats(vertices, v_size), take_ints(faces, f_size))
    }
}

#[test]
fn test_points_to_mesh() {
    dendro_initialize();
    dendro_initialize();
    assert!(dendro::is_initialized());

    let grid = sphere(1.0);
    unsafe { dendro_to_mesh(grid) };
    let (vertices, faces) = mesh_buffers(grid);

    assert!(!vertices.is_empty());
    assert_eq!(vertices.len() % 3, 0);
    assert!(!faces.is_empty());
    assert_eq!(faces.len() % 4, 0);
    let n = (vertices.len() / 3) as i32;
    // default extraction only yields quads
    assert!(faces.iter().all(|&i| (0..n).contains(&i)));
    for v in vertices.chunks_exact(3) {
        let r = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        assert!((r - 1.0).abs() < 0.1);
    }

    unsafe { dendro_delete(grid) };
}

#[test]
fn test_conversion_failures() {
    let grid = dendro_create();
    unsafe {
        assert!(!dendro_from_points(grid, ptr::null(), 0, ptr::null(), 0, 0.1, 3.0));
        let points = [0.0, 0.0];
        let radii = [1.0];
        assert!(!dendro_from_points(
            grid,
            points.as_ptr(),
            2,
            radii.as_ptr(),
            1,
            0.1,
            3.0
        ));
        assert!(!dendro_from_mesh(grid, ptr::null(), 0, ptr::null(), 0, 0.1, 3.0));

        // nothing to mesh
        dendro_to_mesh(grid);
        let mut size = -1;
        assert!(dendro_vertex_buffer(grid, &mut size).is_null());
        assert_eq!(size, 0);
        dendro_delete(grid);
    }
}

#[test]
fn test_mesh_input() {
    #[rustfmt::skip]
    let vertices: [f32; 24] = [
        -1.0, -1.0, -1.0,   1.0, -1.0, -1.0,   -1.0, 1.0, -1.0,   1.0, 1.0, -1.0,
        -1.0, -1.0,  1.0,   1.0, -1.0,  1.0,   -1.0, 1.0,  1.0,   1.0, 1.0,  1.0,
    ];
    #[rustfmt::skip]
    let faces: [i32; 36] = [
        0, 2, 3, 0, 3, 1,
        4, 5, 7, 4, 7, 6,
        0, 1, 5, 0, 5, 4,
        2, 6, 7, 2, 7, 3,
        0, 4, 6, 0, 6, 2,
        1, 3, 7, 1, 7, 5,
    ];
    let grid = dendro_create();
    unsafe {
        assert!(dendro_from_mesh(
            grid,
            vertices.as_ptr(),
            vertices.len() as i32,
            faces.as_ptr(),
            faces.len() as i32,
            0.1,
            3.0
        ));
    }
    // the cache holds the source mesh until the first extraction
    let (v, f) = mesh_buffers(grid);
    assert_eq!(v, vertices.to_vec());
    assert_eq!(f.len(), 48);
    assert!(f.chunks_exact(4).all(|face| face[0] == -1));
    assert_eq!(&f[..4], &[-1, 0, 2, 3]);

    // an out-of-range index is refused
    let bad = [0, 1, 8];
    unsafe {
        assert!(!dendro_from_mesh(
            grid,
            vertices.as_ptr(),
            vertices.len() as i32,
            bad.as_ptr(),
            3,
            0.1,
            3.0
        ));
        dendro_delete(grid);
    }
}

#[test]
fn test_transform_length() {
    let grid = sphere(1.0);
    let identity = [
        1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0,
    ];
    unsafe {
        dendro_to_mesh(grid);
        let (before, _) = mesh_buffers(grid);

        assert!(!dendro_transform(grid, identity.as_ptr(), 15));
        assert!(!dendro_transform(grid, ptr::null(), 16));
        assert!(dendro_transform(grid, identity.as_ptr(), 16));

        dendro_to_mesh(grid);
        let (after, _) = mesh_buffers(grid);
        assert_eq!(before, after);
        dendro_delete(grid);
    }
}

#[test]
fn test_csg_and_aliasing() {
    let grid = sphere(1.0);
    let other = sphere(0.5);
    unsafe {
        // a grid used as its own operand is copied first
        dendro_difference(grid, grid);
        dendro_to_mesh(grid);
        let (vertices, _) = mesh_buffers(grid);
        assert!(vertices.is_empty());

        dendro_union(grid, other);
        dendro_to_mesh(grid);
        let (vertices, _) = mesh_buffers(grid);
        assert!(!vertices.is_empty());

        dendro_intersection(grid, ptr::null());
        dendro_delete(grid);
        dendro_delete(other);
    }
}

#[test]
fn test_smooth_fallback_kind() {
    let a = sphere(1.0);
    let b = unsafe { dendro_duplicate(a) };
    assert!(!b.is_null());
    unsafe {
        dendro_offset(a, 0.05);
        dendro_offset(b, 0.05);
        dendro_smooth(a, 99, 1, 1);
        dendro_smooth(b, 1, 1, 1);
        dendro_to_mesh(a);
        dendro_to_mesh(b);
    }
    assert_eq!(mesh_buffers(a), mesh_buffers(b));
    unsafe {
        dendro_delete(a);
        dendro_delete(b);
    }
}

#[test]
fn test_masked_operations() {
    let grid = sphere(1.0);
    let mask = sphere(1.0);
    let target = sphere(1.2);
    unsafe {
        dendro_to_mesh(grid);
        let before = mesh_buffers(grid);

        // weights are zero everywhere
        dendro_blend_mask(grid, target, 0.0, 1.0, mask, 100.0, 200.0, false);
        dendro_to_mesh(grid);
        assert_eq!(mesh_buffers(grid), before);

        dendro_smooth_mask(grid, 2, 1, 1, mask, -100.0, -50.0, true);
        dendro_offset_mask(grid, 0.1, mask, -1.0, 1.0, false);
        dendro_blend(grid, target, 0.5, 1.0);
        dendro_to_mesh_settings(grid, 0.0, 0.5);
        let (vertices, faces) = mesh_buffers(grid);
        assert!(!vertices.is_empty());
        assert!(!faces.is_empty());

        dendro_delete(grid);
        dendro_delete(mask);
        dendro_delete(target);
    }
}

#[test]
fn test_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = CString::new(dir.path().join("grid.json").to_str().unwrap()).unwrap();
    let missing = CString::new(dir.path().join("missing.json").to_str().unwrap()).unwrap();

    let grid = sphere(1.0);
    let copy = dendro_create();
    unsafe {
        assert!(dendro_write(grid, path.as_ptr()));
        assert!(!dendro_read(copy, missing.as_ptr()));
        assert!(dendro_read(copy, path.as_ptr()));

        dendro_to_mesh(grid);
        dendro_to_mesh(copy);
        assert_eq!(mesh_buffers(grid), mesh_buffers(copy));

        let empty = dendro_create();
        assert!(!dendro_write(empty, path.as_ptr()));
        dendro_delete(empty);
        dendro_delete(grid);
        dendro_delete(copy);
    }
}

#[test]
fn test_closest_point() {
    let grid = sphere(1.0);
    let queries: [f32; 6] = [0.0, 0.0, 2.5, -0.5, 0.0, 0.0];
    let mut size = 0;
    let points = unsafe { dendro_closest_point(grid, queries.as_ptr(), 6, &mut size) };
    let points = take_floats(points, size);
    let distances =
        unsafe { dendro_closest_point_distances(grid, queries.as_ptr(), 6, &mut size) };
    let distances = take_floats(distances, size);

    assert_eq!(points.len(), 6);
    assert!((points[2] - 1.0).abs() < 0.05);
    assert!((points[3] + 1.0).abs() < 0.05);
    assert_eq!(distances.len(), 2);
    assert!((distances[0] - 1.5).abs() < 0.05);
    assert!((distances[1] - 0.5).abs() < 0.05);

    let empty = dendro_create();
    let result = unsafe { dendro_closest_point(empty, queries.as_ptr(), 6, &mut size) };
    assert!(result.is_null());
    assert_eq!(size, 0);
    unsafe {
        dendro_delete(empty);
        dendro_delete(grid);
    }
}
