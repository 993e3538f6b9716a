//! Integration tests for `VolumetricGrid` operations.

use dendro::*;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sphere_at(center: DVec3, radius: f64) -> VolumetricGrid {
    let mut particles = ParticleSet::new();
    particles.add(center, radius);
    let mut grid = VolumetricGrid::new();
    grid.create_from_points(&particles, 0.1, 3.0)
        .expect("sphere conversion failed");
    grid
}

fn unit_sphere() -> VolumetricGrid {
    sphere_at(DVec3::ZERO, 1.0)
}

/// Corners and outward triangles of an axis-aligned cube of half-size `half`.
fn cube_buffers(half: f32) -> (Vec<f32>, Vec<i32>) {
    let mut coords = Vec::new();
    for z in [-half, half] {
        for y in [-half, half] {
            for x in [-half, half] {
                coords.extend([x, y, z]);
            }
        }
    }
    let quads = [
        [0, 2, 3, 1],
        [4, 5, 7, 6],
        [0, 1, 5, 4],
        [2, 6, 7, 3],
        [0, 4, 6, 2],
        [1, 3, 7, 5],
    ];
    let mut indices = Vec::new();
    for [a, b, c, d] in quads {
        indices.extend([a, b, c, a, c, d]);
    }
    (coords, indices)
}

fn mean_radius(mesh: &MeshBuffer, center: Vec3) -> f32 {
    let sum: f32 = mesh.vertices().iter().map(|v| v.distance(center)).sum();
    sum / mesh.vertex_count() as f32
}

#[test]
fn test_unit_sphere_scenario() {
    init_logger();
    let mut grid = unit_sphere();
    grid.update_display_with(0.0, 0.0).unwrap();

    let mesh = grid.mesh();
    assert!(mesh.vertex_count() > 0);
    assert!(mesh.face_count() > 0);
    assert_eq!(mesh.euler_characteristic(), 2);
    for v in mesh.vertices() {
        assert!((v.length() - 1.0).abs() <= 0.1, "vertex at radius {}", v.length());
    }
}

#[test]
fn test_default_extraction_is_quads_only() {
    init_logger();
    let mut grid = unit_sphere();
    grid.update_display().unwrap();
    assert!(grid.mesh().is_valid());
    assert_eq!(grid.mesh().triangle_count(), 0);
}

#[test]
fn test_mismatched_radii_use_the_mean() {
    init_logger();
    let coords = [-0.5, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.6, 0.0];
    let radii = [0.3, 0.5];
    let mut grid = VolumetricGrid::new();
    grid.create_from_flat_points(&coords, &radii, 0.1, 3.0).unwrap();
    grid.update_display().unwrap();

    // every sphere has radius 0.4, so the bounds reach 0.9 along x
    let (min, max) = grid.bounding_box().unwrap();
    assert!((max.x - 0.9).abs() < 0.1, "max x {}", max.x);
    assert!((min.x + 0.9).abs() < 0.1, "min x {}", min.x);
    assert!((max.y - 1.0).abs() < 0.1, "max y {}", max.y);
}

#[test]
fn test_transform_with_wrong_length_fails_and_leaves_grid() {
    init_logger();
    let mut grid = unit_sphere();
    let before = grid.field().unwrap().clone();

    let matrix = [0.0; 15];
    assert!(matches!(
        grid.transform_by(&matrix),
        Err(DendroError::InvalidTransformLength {
            expected: 16,
            actual: 15
        })
    ));
    assert_eq!(grid.field().unwrap(), &before);

    // a singular matrix is rejected the same way
    assert!(grid.transform_by(&[0.0; 16]).is_err());
    assert_eq!(grid.field().unwrap(), &before);
}

#[test]
fn test_transforms_compose() {
    init_logger();
    let mut grid = unit_sphere();
    #[rustfmt::skip]
    let shift = [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        2.0, 0.0, 0.0, 1.0,
    ];
    grid.transform_by(&shift).unwrap();
    grid.transform_by(&shift).unwrap();
    grid.update_display().unwrap();
    let center = Vec3::new(4.0, 0.0, 0.0);
    assert!((mean_radius(grid.mesh(), center) - 1.0).abs() < 0.05);

    #[rustfmt::skip]
    let scale = [
        2.0, 0.0, 0.0, 0.0,
        0.0, 2.0, 0.0, 0.0,
        0.0, 0.0, 2.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ];
    grid.transform_by(&scale).unwrap();
    assert!((grid.voxel_size().unwrap() - 0.2).abs() < 1e-12);
}

#[test]
fn test_translation_in_last_row() {
    init_logger();
    let mut grid = unit_sphere();
    #[rustfmt::skip]
    let shift = [
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        2.0, 3.0, 4.0, 1.0,
    ];
    grid.transform_by(&shift).unwrap();
    grid.update_display().unwrap();
    let center = Vec3::new(2.0, 3.0, 4.0);
    assert!((mean_radius(grid.mesh(), center) - 1.0).abs() < 0.05);

    // a translation in the last column is not an affine map in this layout
    #[rustfmt::skip]
    let transposed = [
        1.0, 0.0, 0.0, 2.0,
        0.0, 1.0, 0.0, 3.0,
        0.0, 0.0, 1.0, 4.0,
        0.0, 0.0, 0.0, 1.0,
    ];
    assert!(matches!(
        grid.transform_by(&transposed),
        Err(DendroError::NonInvertibleTransform)
    ));
}

#[test]
fn test_unknown_smoothing_falls_back_to_laplacian() {
    init_logger();
    let mut a = sphere_at(DVec3::ZERO, 1.0);
    let mut bump = ParticleSet::new();
    bump.add(DVec3::new(1.0, 0.0, 0.0), 0.3);
    let mut b = VolumetricGrid::new();
    b.create_from_points(&bump, 0.1, 3.0).unwrap();
    a.union(&b).unwrap();
    let mut c = a.duplicate();

    a.smooth(FilterKind::from_code(99), 1, 1).unwrap();
    c.smooth(FilterKind::from_code(1), 1, 1).unwrap();
    assert_eq!(a.field(), c.field());
}

#[test]
fn test_smoothing_kernels_keep_the_shape() {
    init_logger();
    for kind in [
        FilterKind::Gaussian,
        FilterKind::Laplacian,
        FilterKind::Mean,
        FilterKind::Median,
    ] {
        let mut grid = unit_sphere();
        grid.smooth(kind, 2, 1).unwrap();
        grid.update_display().unwrap();
        let r = mean_radius(grid.mesh(), Vec3::ZERO);
        assert!((r - 1.0).abs() < 0.1, "{kind:?} moved the surface to {r}");
    }
}

/// Radius-3 sphere at the default settings: voxel 0.5, half-width 1.
fn default_settings_sphere() -> VolumetricGrid {
    let mut particles = ParticleSet::new();
    particles.add(DVec3::ZERO, 3.0);
    let grid = VolumetricGrid::from_points(&particles, &Settings::default()).unwrap();
    assert_eq!(grid.bandwidth(), Some(1.0));
    grid
}

fn assert_closed_sphere(grid: &mut VolumetricGrid, label: &str) -> f32 {
    grid.update_display().unwrap();
    let mesh = grid.mesh();
    assert!(mesh.is_valid(), "{label}: no surface");
    assert_eq!(mesh.euler_characteristic(), 2, "{label}");
    let field = grid.field().unwrap();
    assert!(field.is_inside(IVec3::ZERO), "{label}: origin outside");
    assert!(field.half_width() <= 1.0, "{label}");
    mean_radius(grid.mesh(), Vec3::ZERO)
}

#[test]
fn test_filters_at_default_settings() {
    init_logger();
    for kind in [
        FilterKind::Gaussian,
        FilterKind::Laplacian,
        FilterKind::Mean,
        FilterKind::Median,
    ] {
        for iterations in [1, 2] {
            let mut grid = default_settings_sphere();
            grid.smooth(kind, iterations, 1).unwrap();
            let label = format!("{kind:?} x{iterations}");
            let r = assert_closed_sphere(&mut grid, &label);
            // Gaussian passes shrink a sphere this coarse by up to a voxel
            assert!(r > 2.3 && r < 3.2, "{label} moved the surface to {r}");
        }
    }

    let mut grid = default_settings_sphere();
    grid.offset(0.5).unwrap();
    let r = assert_closed_sphere(&mut grid, "offset");
    assert!((r - 3.5).abs() < 0.12, "offset moved the surface to {r}");
}

#[test]
fn test_blend_at_default_settings() {
    init_logger();
    let mut grid = default_settings_sphere();
    let mut particles = ParticleSet::new();
    particles.add(DVec3::ZERO, 4.0);
    let target = VolumetricGrid::from_points(&particles, &Settings::default()).unwrap();
    grid.blend(&target, 0.0, 10.0).unwrap();
    let r = assert_closed_sphere(&mut grid, "blend");
    assert!((r - 4.0).abs() < 0.2, "blend reached {r}");
}

#[test]
fn test_union_with_empty_operands() {
    init_logger();
    let mut a = unit_sphere();
    let before = a.field().unwrap().clone();

    // a grid that never held a volume
    a.union(&VolumetricGrid::new()).unwrap();
    assert_eq!(a.field().unwrap(), &before);

    // a grid whose volume has no voxels left
    let mut empty = sphere_at(DVec3::new(10.0, 0.0, 0.0), 1.0);
    empty.intersection(&unit_sphere()).unwrap();
    assert!(empty.is_valid());
    assert_eq!(empty.active_voxel_count(), 0);
    a.union(&empty).unwrap();
    assert_eq!(a.field().unwrap(), &before);
}

#[test]
fn test_difference_with_itself_is_empty() {
    init_logger();
    let mut a = unit_sphere();
    let copy = a.duplicate();
    a.difference(&copy).unwrap();

    assert!(a.field().unwrap().iter_active().all(|(_, v)| v >= 0.0));
    a.update_display().unwrap();
    assert!(!a.mesh().is_valid());
    // the operand is left alone
    assert!(copy.field().unwrap().is_inside(IVec3::new(0, 0, 0)));
}

#[test]
fn test_csg_across_lattices() {
    init_logger();
    let mut a = unit_sphere();
    let mut particles = ParticleSet::new();
    particles.add(DVec3::new(1.0, 0.0, 0.0), 0.5);
    let mut b = VolumetricGrid::new();
    b.create_from_points(&particles, 0.05, 3.0).unwrap();
    let b_before = b.field().unwrap().clone();

    a.difference(&b).unwrap();
    assert_eq!(b.field().unwrap(), &b_before);
    a.update_display().unwrap();
    let (_, max) = a.bounding_box().unwrap();
    assert!((max.x - 0.5).abs() < 0.1, "max x {}", max.x);
}

#[test]
fn test_csg_lists() {
    init_logger();
    let spheres: Vec<VolumetricGrid> = (0..3)
        .map(|i| sphere_at(DVec3::new(f64::from(i), 0.0, 0.0), 0.6))
        .collect();

    let mut union = VolumetricGrid::new();
    union
        .create_from_points(&ParticleSet::from_points(&[DVec3::ZERO], &[0.6]).unwrap(), 0.1, 3.0)
        .unwrap();
    union.union_all(&spheres).unwrap();
    union.update_display().unwrap();
    let (min, max) = union.bounding_box().unwrap();
    assert!((min.x + 0.6).abs() < 0.1);
    assert!((max.x - 2.6).abs() < 0.1);

    let mut cut = sphere_at(DVec3::new(1.0, 0.0, 0.0), 1.5);
    cut.difference_all([&VolumetricGrid::new(), &spheres[1]]).unwrap();
    assert!(!cut.field().unwrap().is_inside(IVec3::new(10, 0, 0)));

    let mut lens = sphere_at(DVec3::new(0.5, 0.0, 0.0), 0.8);
    lens.intersection_all(&spheres[..2]).unwrap();
    lens.update_display().unwrap();
    assert!(lens.mesh().is_valid());
}

#[test]
fn test_offset_round_trip() {
    init_logger();
    let mut grid = unit_sphere();
    grid.offset(0.1).unwrap();
    grid.update_display().unwrap();
    let grown = mean_radius(grid.mesh(), Vec3::ZERO);
    assert!((grown - 1.1).abs() < 0.05, "grown to {grown}");

    grid.offset(-0.1).unwrap();
    grid.update_display().unwrap();
    let back = mean_radius(grid.mesh(), Vec3::ZERO);
    assert!((back - 1.0).abs() < 0.05, "returned to {back}");
}

#[test]
fn test_masked_offset() {
    init_logger();
    let mask = sphere_at(DVec3::new(1.0, 0.0, 0.0), 0.5);

    // mask values never reach the range, so nothing moves
    let mut frozen = unit_sphere();
    frozen
        .offset_masked(0.2, &mask, MaskRange::new(100.0, 200.0, false))
        .unwrap();
    frozen.update_display().unwrap();
    assert!((mean_radius(frozen.mesh(), Vec3::ZERO) - 1.0).abs() < 0.03);

    // inverted: full weight inside the mask, none far outside it
    let mut local = unit_sphere();
    local
        .offset_masked(0.2, &mask, MaskRange::new(0.0, 0.1, true))
        .unwrap();
    local.update_display().unwrap();
    let (min, max) = local.bounding_box().unwrap();
    assert!(max.x > 1.1, "max x {}", max.x);
    assert!((min.x + 1.0).abs() < 0.1, "min x {}", min.x);
}

#[test]
fn test_masked_smooth_needs_a_mask_volume() {
    init_logger();
    let mut grid = unit_sphere();
    let result = grid.smooth_masked(
        FilterKind::Mean,
        1,
        1,
        &VolumetricGrid::new(),
        MaskRange::default(),
    );
    assert!(matches!(result, Err(DendroError::EmptyGrid)));
}

#[test]
fn test_blend_position_selects_start() {
    init_logger();
    let target = sphere_at(DVec3::ZERO, 1.3);

    let mut full = unit_sphere();
    full.blend(&target, 0.0, 1.0).unwrap();
    let mut late = unit_sphere();
    late.blend(&target, 0.8, 1.0).unwrap();
    let mut done = unit_sphere();
    done.blend(&target, 1.0, 1.0).unwrap();

    full.update_display().unwrap();
    late.update_display().unwrap();
    done.update_display().unwrap();
    let r_full = mean_radius(full.mesh(), Vec3::ZERO);
    let r_late = mean_radius(late.mesh(), Vec3::ZERO);
    let r_done = mean_radius(done.mesh(), Vec3::ZERO);
    assert!(r_full > r_late, "{r_full} vs {r_late}");
    assert!(r_late > r_done - 0.01);
    assert!((r_done - 1.0).abs() < 0.05);
}

#[test]
fn test_blend_masked_with_zero_weight_is_noop() {
    init_logger();
    let target = sphere_at(DVec3::ZERO, 1.3);
    let mask = unit_sphere();
    let mut grid = unit_sphere();
    let before = grid.field().unwrap().clone();
    grid.blend_masked(&target, 0.0, 2.0, &mask, MaskRange::new(100.0, 200.0, false))
        .unwrap();
    assert_eq!(grid.field().unwrap(), &before);
}

#[test]
fn test_alignment_round_trip() {
    init_logger();
    // a wide band keeps coarse-lattice corners inside the source band
    let mut particles = ParticleSet::new();
    particles.add(DVec3::ZERO, 1.0);
    let mut source = VolumetricGrid::new();
    source.create_from_points(&particles, 0.1, 6.0).unwrap();
    let field = source.field().unwrap();

    for ratio in [1.0, 2.0, 0.5] {
        let offset = DMat4::from_translation(DVec3::new(0.013, -0.027, 0.031));
        let lattice = GridTransform::from_voxel_size(0.1 * ratio)
            .unwrap()
            .post_mult(&GridTransform::from_matrix(offset).unwrap());
        let other = FloatGrid::new_level_set(lattice, 3.0);

        let there = AlignmentResampler::new(&other).resample(field);
        let back = AlignmentResampler::new(field).resample(&there);

        let dx = field.voxel_size();
        let mut checked = 0;
        for (ijk, v) in field.iter_active().filter(|(_, v)| v.abs() < 0.5) {
            let error = f64::from(back.get(ijk) - v).abs() * dx;
            assert!(error < 0.03, "ratio {ratio}: error {error} at {ijk}");
            checked += 1;
        }
        assert!(checked > 100);
    }
}

#[test]
fn test_write_read_round_trip() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sphere.json");

    let grid = unit_sphere();
    let copy = grid.duplicate();
    copy.write(&path).unwrap();
    let read = VolumetricGrid::open(&path).unwrap();

    assert!((read.voxel_size().unwrap() - grid.voxel_size().unwrap()).abs() < 1e-12);
    assert!((read.bandwidth().unwrap() - grid.bandwidth().unwrap()).abs() < 1e-6);
    assert_eq!(read.field(), grid.field());
}

#[test]
fn test_read_failures_leave_grid() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.json");
    std::fs::write(&path, r#"{"grids": []}"#).unwrap();

    let mut grid = unit_sphere();
    let before = grid.field().unwrap().clone();
    assert!(matches!(grid.read(&path), Err(DendroError::NoGridInFile(_))));
    assert!(grid.read(dir.path().join("missing.json")).is_err());
    assert_eq!(grid.field().unwrap(), &before);

    assert!(matches!(
        VolumetricGrid::new().write(dir.path().join("nothing.json")),
        Err(DendroError::EmptyGrid)
    ));
}

#[test]
fn test_mesh_conversion() {
    init_logger();
    let (coords, indices) = cube_buffers(1.05);
    let mut grid = VolumetricGrid::new();
    grid.create_from_flat_mesh(&coords, &indices, 0.1, 3.0).unwrap();
    assert_eq!(grid.mesh().vertex_count(), 8);
    assert_eq!(grid.mesh().triangle_count(), 12);

    grid.update_display().unwrap();
    assert_eq!(grid.mesh().euler_characteristic(), 2);
    let (min, max) = grid.bounding_box().unwrap();
    let corner = Vec3::splat(1.05);
    assert!((min + corner).abs().max_element() < 0.1);
    assert!((max - corner).abs().max_element() < 0.1);
}

#[test]
fn test_adaptive_extraction_produces_triangles() {
    init_logger();
    let (coords, indices) = cube_buffers(1.05);
    let mut grid = VolumetricGrid::new();
    grid.create_from_flat_mesh(&coords, &indices, 0.1, 3.0).unwrap();

    grid.update_display_with(0.0, 0.0).unwrap();
    let dense = grid.mesh().vertex_count();
    grid.update_display_with(0.0, 1.0).unwrap();
    let mesh = grid.mesh();
    assert!(mesh.vertex_count() < dense);
    assert!(mesh.triangle_count() > 0);

    // triangles export with the sentinel in front
    let faces = grid.face_buffer();
    let n = grid.mesh().vertex_count() as i32;
    for face in faces.chunks_exact(4) {
        assert!(face[0] == -1 || (0..n).contains(&face[0]));
        assert!(face[1..].iter().all(|i| (0..n).contains(i)));
    }
    assert!(faces.chunks_exact(4).any(|f| f[0] == -1));
}

#[test]
fn test_settings_driven_workflow() {
    init_logger();
    let settings = Settings::new(0.1, 3.0).with_isovalue(0.0).with_adaptivity(0.0);
    let mut particles = ParticleSet::new();
    particles.add(DVec3::ZERO, 1.0);
    let mut grid = VolumetricGrid::from_points(&particles, &settings).unwrap();
    grid.update_display_with_settings(&settings).unwrap();
    assert_eq!(grid.mesh().euler_characteristic(), 2);

    // settings below the minimum are clamped rather than rejected
    let coarse = VolumetricGrid::from_points(&particles, &Settings::new(0.5, 0.2)).unwrap();
    assert_eq!(coarse.bandwidth(), Some(1.0));
}

#[test]
fn test_curves() {
    init_logger();
    let curve = vec![DVec3::new(-1.0, 0.0, 0.0), DVec3::new(1.0, 0.0, 0.0)];
    let mut grid = VolumetricGrid::new();
    grid.create_from_curves(&[curve], &[0.3], 0.1, 3.0).unwrap();
    grid.update_display().unwrap();
    let (min, max) = grid.bounding_box().unwrap();
    assert!((min.x + 1.3).abs() < 0.1);
    assert!((max.x - 1.3).abs() < 0.1);
    assert!((max.y - 0.3).abs() < 0.1);

    assert!(grid.create_from_curves(&[], &[0.3], 0.1, 3.0).is_err());
}

#[test]
fn test_closest_points() {
    init_logger();
    let grid = unit_sphere();
    let result = grid
        .closest_points(&[DVec3::new(0.0, 3.0, 0.0), DVec3::new(0.2, 0.0, 0.0)])
        .unwrap();
    assert!((result.points[0] - DVec3::Y).length() < 0.05);
    assert!((result.points[1] - DVec3::X).length() < 0.05);
    assert!((result.distances[0] - 2.0).abs() < 0.05);
    assert!((result.distances[1] - 0.8).abs() < 0.05);
}
