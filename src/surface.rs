//! Implicit quadric surfaces bounding CSG cells.
//!
//! Each surface is an implicit function `f(r)`; the positive half-space is
//! `f(r) > 0` and the negative one `f(r) < 0`. Points within
//! [`FP_COINCIDENT`] of the surface are assigned to a side by the direction of
//! travel, so a particle sitting on a surface is placed in the cell it is
//! moving into.

use anyhow::{bail, Result};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::bbox::{Axis, BoundingBox};
use crate::settings::FP_COINCIDENT;


/// The implicit equation of a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SurfaceKind {
    XPlane { x0: f64 },
    YPlane { y0: f64 },
    ZPlane { z0: f64 },
    /// `ax + by + cz = d`
    Plane { a: f64, b: f64, c: f64, d: f64 },
    Sphere { x0: f64, y0: f64, z0: f64, r: f64 },
    XCylinder { y0: f64, z0: f64, r: f64 },
    YCylinder { x0: f64, z0: f64, r: f64 },
    ZCylinder { x0: f64, y0: f64, r: f64 },
}

/// A surface with its user-facing id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub id: i32,
    #[serde(flatten)]
    pub kind: SurfaceKind,
}

impl Surface {
    /// Checks that the coefficients describe a real surface.
    pub fn validate(&self) -> Result<()> {
        let coeffs: Vec<f64> = match self.kind {
            SurfaceKind::XPlane { x0 } => vec![x0],
            SurfaceKind::YPlane { y0 } => vec![y0],
            SurfaceKind::ZPlane { z0 } => vec![z0],
            SurfaceKind::Plane { a, b, c, d } => {
                if a == 0.0 && b == 0.0 && c == 0.0 {
                    bail!("surface {} has a zero plane normal", self.id);
                }
                vec![a, b, c, d]
            }
            SurfaceKind::Sphere { x0, y0, z0, r } => vec![x0, y0, z0, r],
            SurfaceKind::XCylinder { y0, z0, r } => vec![y0, z0, r],
            SurfaceKind::YCylinder { x0, z0, r } => vec![x0, z0, r],
            SurfaceKind::ZCylinder { x0, y0, r } => vec![x0, y0, r],
        };
        if let Some(bad) = coeffs.iter().find(|c| !c.is_finite()) {
            bail!("surface {} has a non-finite coefficient {}", self.id, bad);
        }
        if let Some(r) = self.radius() {
            if r <= 0.0 {
                bail!("surface {} has a non-positive radius {}", self.id, r);
            }
        }
        Ok(())
    }

    fn radius(&self) -> Option<f64> {
        match self.kind {
            SurfaceKind::Sphere { r, .. }
            | SurfaceKind::XCylinder { r, .. }
            | SurfaceKind::YCylinder { r, .. }
            | SurfaceKind::ZCylinder { r, .. } => Some(r),
            _ => None,
        }
    }

    /// Evaluates the implicit function at `r`.
    pub fn evaluate(&self, r: &Point3<f64>) -> f64 {
        match self.kind {
            SurfaceKind::XPlane { x0 } => r.x - x0,
            SurfaceKind::YPlane { y0 } => r.y - y0,
            SurfaceKind::ZPlane { z0 } => r.z - z0,
            SurfaceKind::Plane { a, b, c, d } => a * r.x + b * r.y + c * r.z - d,
            SurfaceKind::Sphere { x0, y0, z0, r: rad } => {
                let x = r.x - x0;
                let y = r.y - y0;
                let z = r.z - z0;
                x * x + y * y + z * z - rad * rad
            }
            SurfaceKind::XCylinder { y0, z0, r: rad } => {
                let y = r.y - y0;
                let z = r.z - z0;
                y * y + z * z - rad * rad
            }
            SurfaceKind::YCylinder { x0, z0, r: rad } => {
                let x = r.x - x0;
                let z = r.z - z0;
                x * x + z * z - rad * rad
            }
            SurfaceKind::ZCylinder { x0, y0, r: rad } => {
                let x = r.x - x0;
                let y = r.y - y0;
                x * x + y * y - rad * rad
            }
        }
    }

    /// Gradient of the implicit function at `r` (not normalised).
    pub fn normal(&self, r: &Point3<f64>) -> Vector3<f64> {
        match self.kind {
            SurfaceKind::XPlane { .. } => Vector3::x(),
            SurfaceKind::YPlane { .. } => Vector3::y(),
            SurfaceKind::ZPlane { .. } => Vector3::z(),
            SurfaceKind::Plane { a, b, c, .. } => Vector3::new(a, b, c),
            SurfaceKind::Sphere { x0, y0, z0, .. } => {
                2.0 * Vector3::new(r.x - x0, r.y - y0, r.z - z0)
            }
            SurfaceKind::XCylinder { y0, z0, .. } => 2.0 * Vector3::new(0.0, r.y - y0, r.z - z0),
            SurfaceKind::YCylinder { x0, z0, .. } => 2.0 * Vector3::new(r.x - x0, 0.0, r.z - z0),
            SurfaceKind::ZCylinder { x0, y0, .. } => 2.0 * Vector3::new(r.x - x0, r.y - y0, 0.0),
        }
    }

    /// Returns true if `r` is on the positive side of the surface.
    ///
    /// On the surface, the side is the one `u` points into; a direction
    /// tangent to the surface counts as the negative side.
    pub fn sense(&self, r: &Point3<f64>, u: &Vector3<f64>) -> bool {
        let f = self.evaluate(r);
        if f.abs() < FP_COINCIDENT {
            u.dot(&self.normal(r)) > 0.0
        } else {
            f > 0.0
        }
    }

    /// Bounding box of the positive (`true`) or negative half-space.
    pub fn bounding_box(&self, positive: bool) -> BoundingBox {
        let inf = BoundingBox::infinite();
        match self.kind {
            SurfaceKind::XPlane { x0 } => half_line(inf, Axis::X, x0, positive),
            SurfaceKind::YPlane { y0 } => half_line(inf, Axis::Y, y0, positive),
            SurfaceKind::ZPlane { z0 } => half_line(inf, Axis::Z, z0, positive),
            SurfaceKind::Plane { a, b, c, d } => {
                // only planes perpendicular to an axis bound anything
                let axis = match (a != 0.0, b != 0.0, c != 0.0) {
                    (true, false, false) => Some((Axis::X, a)),
                    (false, true, false) => Some((Axis::Y, b)),
                    (false, false, true) => Some((Axis::Z, c)),
                    _ => None,
                };
                match axis {
                    Some((axis, n)) => half_line(inf, axis, d / n, positive == (n > 0.0)),
                    None => inf,
                }
            }
            SurfaceKind::Sphere { x0, y0, z0, r } if !positive => BoundingBox::new(
                Point3::new(x0 - r, y0 - r, z0 - r),
                Point3::new(x0 + r, y0 + r, z0 + r),
            ),
            SurfaceKind::XCylinder { y0, z0, r } if !positive => inf
                .with_extent(Axis::Y, y0 - r, y0 + r)
                .with_extent(Axis::Z, z0 - r, z0 + r),
            SurfaceKind::YCylinder { x0, z0, r } if !positive => inf
                .with_extent(Axis::X, x0 - r, x0 + r)
                .with_extent(Axis::Z, z0 - r, z0 + r),
            SurfaceKind::ZCylinder { x0, y0, r } if !positive => inf
                .with_extent(Axis::X, x0 - r, x0 + r)
                .with_extent(Axis::Y, y0 - r, y0 + r),
            _ => inf,
        }
    }
}

/// Restricts `bb` to one side of the plane `axis = at`.
fn half_line(bb: BoundingBox, axis: Axis, at: f64, positive: bool) -> BoundingBox {
    if positive {
        bb.with_extent(axis, at, f64::INFINITY)
    } else {
        bb.with_extent(axis, f64::NEG_INFINITY, at)
    }
}
