//! Implicit surfaces and the half-spaces they bound.
//!
//! Every surface is the zero set of a scalar function `f(x, y, z)`. The
//! negative half-space is `f <= 0` and the positive half-space is `f > 0`, so
//! points lying exactly on a surface are always classified as being on its
//! negative side and membership stays total.
//!
//! The surface module provides:
//! - Axis-aligned and general planes
//! - Infinite cylinders parallel to each coordinate axis
//! - Spheres
//! - Ray intersection parameters and gradients for boundary crossing
//! - Boundary condition tags forwarded to the transport layer

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{GeometryError, Result};

#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn plane_sense() {
        let plane = Surface::new(SurfaceKind::XPlane { x0: 2.0 }).unwrap();
        assert!(plane.evaluate(&Point3::new(1.0, 5.0, -3.0)) < 0.0);
        assert!(plane.evaluate(&Point3::new(3.0, 0.0, 0.0)) > 0.0);
        assert_eq!(plane.sense_of(&Point3::new(2.0, 0.0, 0.0)), Sense::Negative);
    }

    #[test]
    fn general_plane_matches_axis_plane() {
        let general = Surface::new(SurfaceKind::Plane {
            a: 0.0,
            b: 2.0,
            c: 0.0,
            d: 4.0,
        })
        .unwrap();
        let axis = Surface::new(SurfaceKind::YPlane { y0: 2.0 }).unwrap();
        let p = Point3::new(0.3, 3.5, 1.0);
        assert_eq!(general.sense_of(&p), axis.sense_of(&p));
    }

    #[test]
    fn cylinder_intersections() {
        let cyl = Surface::new(SurfaceKind::ZCylinder {
            x0: 0.0,
            y0: 0.0,
            r: 1.0,
        })
        .unwrap();
        let roots: Vec<f64> = cyl
            .intersections(&Point3::new(-3.0, 0.0, 7.0), &Vector3::x())
            .collect();
        assert_eq!(roots.len(), 2);
        assert_relative_eq!(roots[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(roots[1], 4.0, epsilon = 1e-12);

        // a ray parallel to the axis never crosses the cylinder
        let parallel = cyl.intersections(&Point3::new(0.5, 0.0, 0.0), &Vector3::z());
        assert_eq!(parallel.count(), 0);
    }

    #[test]
    fn sphere_gradient_points_outward() {
        let sphere = Surface::new(SurfaceKind::Sphere {
            x0: 1.0,
            y0: 1.0,
            z0: 1.0,
            r: 2.0,
        })
        .unwrap();
        let n = sphere.gradient(&Point3::new(3.0, 1.0, 1.0)).normalize();
        assert_relative_eq!(n, Vector3::x(), epsilon = 1e-12);
    }

    #[test]
    fn non_positive_radius_is_degenerate() {
        let err = Surface::new(SurfaceKind::ZCylinder {
            x0: 0.0,
            y0: 0.0,
            r: 0.0,
        })
        .unwrap_err();
        assert!(matches!(err, GeometryError::DegenerateSurface(_)));

        let err = Surface::new(SurfaceKind::Sphere {
            x0: 0.0,
            y0: 0.0,
            z0: 0.0,
            r: -1.0,
        })
        .unwrap_err();
        assert!(matches!(err, GeometryError::DegenerateSurface(_)));
    }

    #[test]
    fn zero_normal_plane_is_degenerate() {
        let err = Surface::new(SurfaceKind::Plane {
            a: 0.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
        })
        .unwrap_err();
        assert!(matches!(err, GeometryError::DegenerateSurface(_)));
    }

    #[test]
    fn non_finite_parameter_is_degenerate() {
        let err = Surface::new(SurfaceKind::ZPlane { z0: f64::NAN }).unwrap_err();
        assert!(matches!(err, GeometryError::DegenerateSurface(_)));
    }
}

/// Boundary condition carried by a surface.
///
/// The geometry kernel never acts on this tag; it is reported back when a
/// point escapes the model or a ray reaches the surface, so that the transport
/// layer can decide what happens to the particle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryCondition {
    #[default]
    Transmission,
    Vacuum,
    Reflective,
    White,
}

/// Which side of a surface a half-space covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sense {
    /// `f(P) <= 0`, including the surface itself.
    Negative,
    /// `f(P) > 0`.
    Positive,
}

impl Sense {
    pub fn of_value(value: f64) -> Self {
        if value > 0.0 {
            Sense::Positive
        } else {
            Sense::Negative
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Sense::Negative => Sense::Positive,
            Sense::Positive => Sense::Negative,
        }
    }
}

/// Primitive surface kinds and their parameters.
///
/// Planes use the convention `ax + by + cz - d = 0`; cylinders are infinite and
/// parallel to the axis named by the variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceKind {
    XPlane { x0: f64 },
    YPlane { y0: f64 },
    ZPlane { z0: f64 },
    Plane { a: f64, b: f64, c: f64, d: f64 },
    XCylinder { y0: f64, z0: f64, r: f64 },
    YCylinder { x0: f64, z0: f64, r: f64 },
    ZCylinder { x0: f64, y0: f64, r: f64 },
    Sphere { x0: f64, y0: f64, z0: f64, r: f64 },
}

impl SurfaceKind {
    fn parameters(&self) -> Vec<f64> {
        match *self {
            SurfaceKind::XPlane { x0 } => vec![x0],
            SurfaceKind::YPlane { y0 } => vec![y0],
            SurfaceKind::ZPlane { z0 } => vec![z0],
            SurfaceKind::Plane { a, b, c, d } => vec![a, b, c, d],
            SurfaceKind::XCylinder { y0, z0, r } => vec![y0, z0, r],
            SurfaceKind::YCylinder { x0, z0, r } => vec![x0, z0, r],
            SurfaceKind::ZCylinder { x0, y0, r } => vec![x0, y0, r],
            SurfaceKind::Sphere { x0, y0, z0, r } => vec![x0, y0, z0, r],
        }
    }

    fn radius(&self) -> Option<f64> {
        match *self {
            SurfaceKind::XCylinder { r, .. }
            | SurfaceKind::YCylinder { r, .. }
            | SurfaceKind::ZCylinder { r, .. }
            | SurfaceKind::Sphere { r, .. } => Some(r),
            _ => None,
        }
    }
}

/// An immutable implicit surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub kind: SurfaceKind,
    pub name: Option<String>,
    pub boundary: BoundaryCondition,
}

impl Surface {
    /// Creates a surface with a transmission boundary, rejecting malformed
    /// parameters.
    pub fn new(kind: SurfaceKind) -> Result<Self> {
        let surface = Self {
            kind,
            name: None,
            boundary: BoundaryCondition::default(),
        };
        surface.validate()?;
        Ok(surface)
    }

    pub fn with_boundary(mut self, boundary: BoundaryCondition) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if let Some(bad) = self.kind.parameters().iter().find(|v| !v.is_finite()) {
            return Err(GeometryError::DegenerateSurface(format!(
                "{:?} has non-finite parameter {}",
                self.kind, bad
            )));
        }
        if let Some(r) = self.kind.radius() {
            if r <= 0.0 {
                return Err(GeometryError::DegenerateSurface(format!(
                    "radius must be positive, got {}",
                    r
                )));
            }
        }
        if let SurfaceKind::Plane { a, b, c, .. } = self.kind {
            if a == 0.0 && b == 0.0 && c == 0.0 {
                return Err(GeometryError::DegenerateSurface(
                    "plane normal (a, b, c) must not be zero".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Evaluates the implicit function at a point.
    pub fn evaluate(&self, p: &Point3<f64>) -> f64 {
        match self.kind {
            SurfaceKind::XPlane { x0 } => p.x - x0,
            SurfaceKind::YPlane { y0 } => p.y - y0,
            SurfaceKind::ZPlane { z0 } => p.z - z0,
            SurfaceKind::Plane { a, b, c, d } => a * p.x + b * p.y + c * p.z - d,
            SurfaceKind::XCylinder { y0, z0, r } => {
                let (dy, dz) = (p.y - y0, p.z - z0);
                dy * dy + dz * dz - r * r
            }
            SurfaceKind::YCylinder { x0, z0, r } => {
                let (dx, dz) = (p.x - x0, p.z - z0);
                dx * dx + dz * dz - r * r
            }
            SurfaceKind::ZCylinder { x0, y0, r } => {
                let (dx, dy) = (p.x - x0, p.y - y0);
                dx * dx + dy * dy - r * r
            }
            SurfaceKind::Sphere { x0, y0, z0, r } => {
                (p - Point3::new(x0, y0, z0)).norm_squared() - r * r
            }
        }
    }

    /// Gradient of the implicit function, pointing into the positive half-space.
    pub fn gradient(&self, p: &Point3<f64>) -> Vector3<f64> {
        match self.kind {
            SurfaceKind::XPlane { .. } => Vector3::x(),
            SurfaceKind::YPlane { .. } => Vector3::y(),
            SurfaceKind::ZPlane { .. } => Vector3::z(),
            SurfaceKind::Plane { a, b, c, .. } => Vector3::new(a, b, c),
            SurfaceKind::XCylinder { y0, z0, .. } => {
                Vector3::new(0.0, 2.0 * (p.y - y0), 2.0 * (p.z - z0))
            }
            SurfaceKind::YCylinder { x0, z0, .. } => {
                Vector3::new(2.0 * (p.x - x0), 0.0, 2.0 * (p.z - z0))
            }
            SurfaceKind::ZCylinder { x0, y0, .. } => {
                Vector3::new(2.0 * (p.x - x0), 2.0 * (p.y - y0), 0.0)
            }
            SurfaceKind::Sphere { x0, y0, z0, .. } => 2.0 * (p - Point3::new(x0, y0, z0)),
        }
    }

    pub fn sense_of(&self, p: &Point3<f64>) -> Sense {
        Sense::of_value(self.evaluate(p))
    }

    /// Ray parameters `t` (in ascending order, any sign) at which `p + t·d`
    /// lies on the surface.
    pub fn intersections(
        &self,
        p: &Point3<f64>,
        d: &Vector3<f64>,
    ) -> impl Iterator<Item = f64> {
        let roots = match self.kind {
            SurfaceKind::XPlane { x0 } => linear_root(p.x - x0, d.x),
            SurfaceKind::YPlane { y0 } => linear_root(p.y - y0, d.y),
            SurfaceKind::ZPlane { z0 } => linear_root(p.z - z0, d.z),
            SurfaceKind::Plane { a, b, c, d: offset } => linear_root(
                a * p.x + b * p.y + c * p.z - offset,
                a * d.x + b * d.y + c * d.z,
            ),
            SurfaceKind::XCylinder { y0, z0, r } => {
                cylinder_roots(p.y - y0, p.z - z0, d.y, d.z, r)
            }
            SurfaceKind::YCylinder { x0, z0, r } => {
                cylinder_roots(p.x - x0, p.z - z0, d.x, d.z, r)
            }
            SurfaceKind::ZCylinder { x0, y0, r } => {
                cylinder_roots(p.x - x0, p.y - y0, d.x, d.y, r)
            }
            SurfaceKind::Sphere { x0, y0, z0, r } => {
                let offset = p - Point3::new(x0, y0, z0);
                quadratic_roots(
                    d.norm_squared(),
                    offset.dot(d),
                    offset.norm_squared() - r * r,
                )
            }
        };
        roots.into_iter().flatten()
    }
}

/// Root of `f + t·slope = 0`.
fn linear_root(f: f64, slope: f64) -> [Option<f64>; 2] {
    if slope == 0.0 {
        [None, None]
    } else {
        [Some(-f / slope), None]
    }
}

fn cylinder_roots(du: f64, dv: f64, u: f64, v: f64, r: f64) -> [Option<f64>; 2] {
    quadratic_roots(u * u + v * v, du * u + dv * v, du * du + dv * dv - r * r)
}

/// Roots of `a·t² + 2k·t + c = 0`, smaller root first.
fn quadratic_roots(a: f64, k: f64, c: f64) -> [Option<f64>; 2] {
    if a == 0.0 {
        return [None, None];
    }
    let discriminant = k * k - a * c;
    if discriminant < 0.0 {
        return [None, None];
    }
    let root = discriminant.sqrt();
    [Some((-k - root) / a), Some((-k + root) / a)]
}
