//! Weighted sphere sets used as rasterization input.

use glam::DVec3;

use crate::error::{DendroError, Result};

/// Fraction of the radius used as spacing when dividing polylines.
const CURVE_SPACING_FACTOR: f64 = 0.25;

/// One sphere: center, radius and velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: DVec3,
    pub radius: f64,
    pub velocity: DVec3,
}

/// An ordered collection of spheres with global radius and velocity scales.
///
/// The scales are applied when the values are read, not when they are stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSet {
    particles: Vec<Particle>,
    radius_scale: f64,
    velocity_scale: f64,
}

impl Default for ParticleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleSet {
    /// Creates an empty set with unit scales.
    pub fn new() -> Self {
        Self::with_scales(1.0, 1.0)
    }

    pub fn with_scales(radius_scale: f64, velocity_scale: f64) -> Self {
        Self {
            particles: Vec::new(),
            radius_scale,
            velocity_scale,
        }
    }

    /// Builds a set from points and radii.
    ///
    /// With one radius per point every particle keeps its own radius. When the
    /// counts differ, the arithmetic mean of all supplied radii is used for
    /// every point.
    pub fn from_points(points: &[DVec3], radii: &[f64]) -> Result<Self> {
        let mut set = Self::new();
        if points.len() == radii.len() {
            for (&p, &r) in points.iter().zip(radii) {
                set.add(p, r);
            }
            return Ok(set);
        }

        if radii.is_empty() {
            return Err(DendroError::InvalidRadius(
                "no radius supplied for points".to_string(),
            ));
        }
        let mean = mean_radius(radii);
        log::warn!(
            "{} radii supplied for {} points, using mean radius {mean}",
            radii.len(),
            points.len()
        );
        for &p in points {
            set.add(p, mean);
        }
        Ok(set)
    }

    /// Builds a set from flat `xyz` coordinates and radii.
    pub fn from_flat(coords: &[f64], radii: &[f64]) -> Result<Self> {
        if coords.len() % 3 != 0 {
            return Err(DendroError::SizeMismatch {
                expected: coords.len() / 3 * 3,
                actual: coords.len(),
            });
        }
        let points: Vec<DVec3> = coords
            .chunks_exact(3)
            .map(|c| DVec3::new(c[0], c[1], c[2]))
            .collect();
        Self::from_points(&points, radii)
    }

    /// Divides polylines into spheres spaced a quarter radius apart.
    ///
    /// Either one radius applies to every curve or one radius is given per
    /// curve. Any other radius count, or a non-positive radius, is rejected.
    pub fn from_polylines(curves: &[Vec<DVec3>], radii: &[f64]) -> Result<Self> {
        if curves.is_empty() || radii.is_empty() {
            return Err(DendroError::InvalidRadius(
                "curves and radii must not be empty".to_string(),
            ));
        }
        if radii.len() != 1 && radii.len() != curves.len() {
            return Err(DendroError::InvalidRadius(format!(
                "{} radii for {} curves",
                radii.len(),
                curves.len()
            )));
        }

        let mut set = Self::new();
        for (i, curve) in curves.iter().enumerate() {
            let radius = if radii.len() == 1 { radii[0] } else { radii[i] };
            if !(radius > 0.0) {
                return Err(DendroError::InvalidRadius(format!(
                    "radius {radius} for curve {i}"
                )));
            }
            for p in divide_polyline(curve, radius * CURVE_SPACING_FACTOR) {
                set.add(p, radius);
            }
        }
        Ok(set)
    }

    /// Appends a particle at rest.
    pub fn add(&mut self, position: DVec3, radius: f64) {
        self.add_with_velocity(position, radius, DVec3::ZERO);
    }

    pub fn add_with_velocity(&mut self, position: DVec3, radius: f64, velocity: DVec3) {
        self.particles.push(Particle {
            position,
            radius,
            velocity,
        });
    }

    /// True when the set holds at least one particle.
    pub fn is_valid(&self) -> bool {
        !self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn position(&self, n: usize) -> DVec3 {
        self.particles[n].position
    }

    /// Scaled radius of particle `n`.
    pub fn radius(&self, n: usize) -> f64 {
        self.radius_scale * self.particles[n].radius
    }

    /// Scaled velocity of particle `n`.
    pub fn velocity(&self, n: usize) -> DVec3 {
        self.velocity_scale * self.particles[n].velocity
    }

    pub fn radius_scale(&self) -> f64 {
        self.radius_scale
    }

    pub fn velocity_scale(&self) -> f64 {
        self.velocity_scale
    }

    /// Iterates `(position, scaled radius)` pairs.
    pub fn spheres(&self) -> impl Iterator<Item = (DVec3, f64)> + '_ {
        self.particles
            .iter()
            .map(move |p| (p.position, self.radius_scale * p.radius))
    }
}

/// Arithmetic mean of the radii.
#[allow(clippy::cast_precision_loss)]
pub fn mean_radius(radii: &[f64]) -> f64 {
    radii.iter().sum::<f64>() / radii.len() as f64
}

/// Points along a polyline at equal arc-length spacing, both ends included.
fn divide_polyline(curve: &[DVec3], spacing: f64) -> Vec<DVec3> {
    let Some(&start) = curve.first() else {
        return Vec::new();
    };
    let mut points = vec![start];
    let mut carried = 0.0;
    for segment in curve.windows(2) {
        let (a, b) = (segment[0], segment[1]);
        let length = a.distance(b);
        if length <= 0.0 {
            continue;
        }
        let mut t = spacing - carried;
        while t <= length {
            points.push(a.lerp(b, t / length));
            t += spacing;
        }
        carried = length - (t - spacing);
    }
    if let Some(&end) = curve.last() {
        if carried > spacing * 1e-6 {
            points.push(end);
        }
    }
    points
}
