//! C ABI.
//!
//! Grids cross the boundary as opaque `VolumetricGrid` pointers created by
//! [`dendro_create`] and released by [`dendro_delete`]. Operations report
//! failure as `false` (or a null buffer with size 0) and log the cause;
//! operations without a result log and leave the grid unchanged.
//!
//! Buffers returned by the export and query functions belong to the caller
//! and must be released with [`dendro_free_float_buffer`] or
//! [`dendro_free_int_buffer`], passing back the size that was reported.
//!
//! Panics are caught at the boundary.

#![allow(unsafe_code)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::too_many_arguments)]

use std::borrow::Cow;
use std::ffi::{c_char, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::ptr;

use dendro_core::{state, DendroError, MaskRange, Result};

use crate::query::ClosestPointQuery;
use crate::volume::{FilterKind, VolumetricGrid};

/// Runs `f`, turning errors and panics into `fallback`.
fn guard<R>(name: &str, fallback: R, f: impl FnOnce() -> Result<R>) -> R {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            log::warn!("{name}: {e}");
            fallback
        }
        Err(_) => {
            log::error!("{name}: panicked");
            fallback
        }
    }
}

unsafe fn grid_ref<'a>(grid: *const VolumetricGrid) -> Result<&'a VolumetricGrid> {
    grid.as_ref()
        .ok_or_else(|| DendroError::InvalidArgument("null grid".into()))
}

unsafe fn grid_mut<'a>(grid: *mut VolumetricGrid) -> Result<&'a mut VolumetricGrid> {
    grid.as_mut()
        .ok_or_else(|| DendroError::InvalidArgument("null grid".into()))
}

/// Borrows a secondary operand, copying it when it is the primary itself.
unsafe fn secondary<'a>(
    primary: *const VolumetricGrid,
    other: *const VolumetricGrid,
) -> Result<Cow<'a, VolumetricGrid>> {
    let other_ref = grid_ref(other)?;
    if ptr::eq(primary, other) {
        Ok(Cow::Owned(other_ref.duplicate()))
    } else {
        Ok(Cow::Borrowed(other_ref))
    }
}

unsafe fn slice<'a, T>(data: *const T, count: i32) -> &'a [T] {
    match usize::try_from(count) {
        Ok(n) if n > 0 && !data.is_null() => std::slice::from_raw_parts(data, n),
        _ => &[],
    }
}

unsafe fn path_arg(path: *const c_char) -> Result<PathBuf> {
    if path.is_null() {
        return Err(DendroError::InvalidArgument("null path".into()));
    }
    let path = CStr::from_ptr(path)
        .to_str()
        .map_err(|e| DendroError::InvalidArgument(format!("path is not UTF-8: {e}")))?;
    Ok(PathBuf::from(path))
}

fn count_arg(value: i32) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// Hands `data` to the caller. Empty buffers are returned as null.
unsafe fn into_raw_buffer<T>(data: Vec<T>, size: *mut i32) -> *mut T {
    let len = i32::try_from(data.len()).ok().filter(|&n| n > 0);
    if !size.is_null() {
        *size = len.unwrap_or(0);
    }
    match len {
        Some(_) => Box::into_raw(data.into_boxed_slice()).cast::<T>(),
        None => ptr::null_mut(),
    }
}

unsafe fn free_raw_buffer<T>(data: *mut T, size: i32) {
    let len = count_arg(size);
    if data.is_null() || len == 0 {
        return;
    }
    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(data, len)));
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Initializes logging and the engine. Repeated calls are no-ops.
#[no_mangle]
pub extern "C" fn dendro_initialize() {
    state::initialize_with_logging();
}

#[no_mangle]
pub extern "C" fn dendro_create() -> *mut VolumetricGrid {
    guard("dendro_create", ptr::null_mut(), || {
        Ok(Box::into_raw(Box::new(VolumetricGrid::new())))
    })
}

#[no_mangle]
pub unsafe extern "C" fn dendro_delete(grid: *mut VolumetricGrid) {
    if !grid.is_null() {
        drop(Box::from_raw(grid));
    }
}

#[no_mangle]
pub unsafe extern "C" fn dendro_duplicate(grid: *const VolumetricGrid) -> *mut VolumetricGrid {
    guard("dendro_duplicate", ptr::null_mut(), || {
        let copy = grid_ref(grid)?.duplicate();
        Ok(Box::into_raw(Box::new(copy)))
    })
}

#[no_mangle]
pub unsafe extern "C" fn dendro_read(grid: *mut VolumetricGrid, filename: *const c_char) -> bool {
    guard("dendro_read", false, || {
        let path = path_arg(filename)?;
        grid_mut(grid)?.read(path)?;
        Ok(true)
    })
}

#[no_mangle]
pub unsafe extern "C" fn dendro_write(
    grid: *const VolumetricGrid,
    filename: *const c_char,
) -> bool {
    guard("dendro_write", false, || {
        let path = path_arg(filename)?;
        grid_ref(grid)?.write(path)?;
        Ok(true)
    })
}

// ============================================================================
// Conversion
// ============================================================================

/// `p_count` and `r_count` are array lengths; points are `x, y, z` triples.
#[no_mangle]
pub unsafe extern "C" fn dendro_from_points(
    grid: *mut VolumetricGrid,
    points: *const f64,
    p_count: i32,
    radii: *const f64,
    r_count: i32,
    voxel_size: f64,
    bandwidth: f64,
) -> bool {
    guard("dendro_from_points", false, || {
        let grid = grid_mut(grid)?;
        grid.create_from_flat_points(
            slice(points, p_count),
            slice(radii, r_count),
            voxel_size,
            bandwidth,
        )?;
        Ok(true)
    })
}

/// `v_count` and `f_count` are array lengths; faces are triangle index triples.
#[no_mangle]
pub unsafe extern "C" fn dendro_from_mesh(
    grid: *mut VolumetricGrid,
    vertices: *const f32,
    v_count: i32,
    faces: *const i32,
    f_count: i32,
    voxel_size: f64,
    bandwidth: f64,
) -> bool {
    guard("dendro_from_mesh", false, || {
        let grid = grid_mut(grid)?;
        grid.create_from_flat_mesh(
            slice(vertices, v_count),
            slice(faces, f_count),
            voxel_size,
            bandwidth,
        )?;
        Ok(true)
    })
}

// ============================================================================
// Extraction and export
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn dendro_to_mesh(grid: *mut VolumetricGrid) {
    guard("dendro_to_mesh", (), || grid_mut(grid)?.update_display());
}

/// `isovalue` is in world units.
#[no_mangle]
pub unsafe extern "C" fn dendro_to_mesh_settings(
    grid: *mut VolumetricGrid,
    isovalue: f64,
    adaptivity: f64,
) {
    guard("dendro_to_mesh_settings", (), || {
        grid_mut(grid)?.update_display_with(isovalue, adaptivity)
    });
}

#[no_mangle]
pub unsafe extern "C" fn dendro_vertex_buffer(
    grid: *const VolumetricGrid,
    size: *mut i32,
) -> *mut f32 {
    let data = guard("dendro_vertex_buffer", Vec::new(), || {
        Ok(grid_ref(grid)?.vertex_buffer())
    });
    into_raw_buffer(data, size)
}

/// Four indices per face, fourth corner first; `-1` marks a triangle.
#[no_mangle]
pub unsafe extern "C" fn dendro_face_buffer(
    grid: *const VolumetricGrid,
    size: *mut i32,
) -> *mut i32 {
    let data = guard("dendro_face_buffer", Vec::new(), || {
        Ok(grid_ref(grid)?.face_buffer())
    });
    into_raw_buffer(data, size)
}

#[no_mangle]
pub unsafe extern "C" fn dendro_free_float_buffer(data: *mut f32, size: i32) {
    free_raw_buffer(data, size);
}

#[no_mangle]
pub unsafe extern "C" fn dendro_free_int_buffer(data: *mut i32, size: i32) {
    free_raw_buffer(data, size);
}

// ============================================================================
// Transform
// ============================================================================

/// Applies a 4×4 matrix in row-vector layout, translation in elements 12-14.
/// Fails unless `m_count` is 16.
#[no_mangle]
pub unsafe extern "C" fn dendro_transform(
    grid: *mut VolumetricGrid,
    matrix: *const f64,
    m_count: i32,
) -> bool {
    guard("dendro_transform", false, || {
        let grid = grid_mut(grid)?;
        grid.transform_by(slice(matrix, m_count))?;
        Ok(true)
    })
}

// ============================================================================
// CSG
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn dendro_union(grid: *mut VolumetricGrid, csg_grid: *const VolumetricGrid) {
    guard("dendro_union", (), || {
        let other = secondary(grid, csg_grid)?;
        grid_mut(grid)?.union(&other)
    });
}

#[no_mangle]
pub unsafe extern "C" fn dendro_difference(
    grid: *mut VolumetricGrid,
    csg_grid: *const VolumetricGrid,
) {
    guard("dendro_difference", (), || {
        let other = secondary(grid, csg_grid)?;
        grid_mut(grid)?.difference(&other)
    });
}

#[no_mangle]
pub unsafe extern "C" fn dendro_intersection(
    grid: *mut VolumetricGrid,
    csg_grid: *const VolumetricGrid,
) {
    guard("dendro_intersection", (), || {
        let other = secondary(grid, csg_grid)?;
        grid_mut(grid)?.intersection(&other)
    });
}

// ============================================================================
// Filters
// ============================================================================

/// Positive amounts grow the surface by `amount` world units.
#[no_mangle]
pub unsafe extern "C" fn dendro_offset(grid: *mut VolumetricGrid, amount: f64) {
    guard("dendro_offset", (), || grid_mut(grid)?.offset(amount));
}

#[no_mangle]
pub unsafe extern "C" fn dendro_offset_mask(
    grid: *mut VolumetricGrid,
    amount: f64,
    mask: *const VolumetricGrid,
    min: f64,
    max: f64,
    invert: bool,
) {
    guard("dendro_offset_mask", (), || {
        let mask = secondary(grid, mask)?;
        grid_mut(grid)?.offset_masked(amount, &mask, MaskRange::new(min, max, invert))
    });
}

/// `kind`: 0 Gaussian, 1 Laplacian, 2 mean, 3 median; anything else is Laplacian.
#[no_mangle]
pub unsafe extern "C" fn dendro_smooth(
    grid: *mut VolumetricGrid,
    kind: i32,
    iterations: i32,
    width: i32,
) {
    guard("dendro_smooth", (), || {
        grid_mut(grid)?.smooth(
            FilterKind::from_code(kind),
            count_arg(iterations),
            count_arg(width),
        )
    });
}

#[no_mangle]
pub unsafe extern "C" fn dendro_smooth_mask(
    grid: *mut VolumetricGrid,
    kind: i32,
    iterations: i32,
    width: i32,
    mask: *const VolumetricGrid,
    min: f64,
    max: f64,
    invert: bool,
) {
    guard("dendro_smooth_mask", (), || {
        let mask = secondary(grid, mask)?;
        grid_mut(grid)?.smooth_masked(
            FilterKind::from_code(kind),
            count_arg(iterations),
            count_arg(width),
            &mask,
            MaskRange::new(min, max, invert),
        )
    });
}

// ============================================================================
// Morphing
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn dendro_blend(
    grid: *mut VolumetricGrid,
    target: *const VolumetricGrid,
    position: f64,
    end: f64,
) {
    guard("dendro_blend", (), || {
        let target = secondary(grid, target)?;
        grid_mut(grid)?.blend(&target, position, end)
    });
}

#[no_mangle]
pub unsafe extern "C" fn dendro_blend_mask(
    grid: *mut VolumetricGrid,
    target: *const VolumetricGrid,
    position: f64,
    end: f64,
    mask: *const VolumetricGrid,
    min: f64,
    max: f64,
    invert: bool,
) {
    guard("dendro_blend_mask", (), || {
        let target = secondary(grid, target)?;
        let mask = secondary(grid, mask)?;
        grid_mut(grid)?.blend_masked(
            &target,
            position,
            end,
            &mask,
            MaskRange::new(min, max, invert),
        )
    });
}

// ============================================================================
// Queries
// ============================================================================

/// Projects `x, y, z` triples onto the surface. `v_count` is the array length.
#[no_mangle]
pub unsafe extern "C" fn dendro_closest_point(
    grid: *const VolumetricGrid,
    points: *const f32,
    v_count: i32,
    r_size: *mut i32,
) -> *mut f32 {
    let data = guard("dendro_closest_point", Vec::new(), || {
        let query = ClosestPointQuery::new(grid_ref(grid)?)?;
        let result = query.search_flat(slice(points, v_count))?;
        Ok(result.flat_points())
    });
    into_raw_buffer(data, r_size)
}

/// World-space distance from each query point to its projection.
#[no_mangle]
pub unsafe extern "C" fn dendro_closest_point_distances(
    grid: *const VolumetricGrid,
    points: *const f32,
    v_count: i32,
    r_size: *mut i32,
) -> *mut f32 {
    let data = guard("dendro_closest_point_distances", Vec::new(), || {
        let query = ClosestPointQuery::new(grid_ref(grid)?)?;
        let result = query.search_flat(slice(points, v_count))?;
        Ok(result.flat_distances())
    });
    into_raw_buffer(data, r_size)
}
