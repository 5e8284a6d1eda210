//! Axis-aligned bounding boxes for spatial acceleration structures.
//!
//! Testing containment against arbitrary CSG cells means evaluating every
//! bounding surface. A bounding box gives a cheap conservative stand-in: if a
//! point lies outside a cell's box it cannot lie inside the cell. Boxes may be
//! infinite on either side of any axis, since half-space cells are unbounded.
//!
//! The bounding box module provides:
//! - Union and intersection of boxes (also as `|` and `&`)
//! - Inclusive overlap and point tests
//! - Per-axis extents used by the universe partitioners
//!
//! # Key Components
//!
//! - [`BoundingBox`]: minimum/maximum corner pair
//! - [`Axis`]: axis selector used to stratify universes

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign};

use nalgebra::Point3;
use serde::{Deserialize, Serialize};


/// Cartesian axis selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    /// Component index of this axis in a point or vector.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            "z" => Ok(Axis::Z),
            other => Err(format!("unknown axis '{}', expected one of x, y, z", other)),
        }
    }
}

/// Axis-aligned bounding box.
///
/// **Context**: Cell bounding boxes feed the universe partitioners, which
/// only need each cell's extent along one axis, and the sampling survey,
/// which needs a finite box to draw positions from.
///
/// **How it Works**: Stores minimum and maximum corners. Components may be
/// infinite for unbounded cells. Invariant: `min <= max` componentwise, with
/// the single exception of [`BoundingBox::empty`], the identity of `union`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox {
    /// Creates a box from its corners.
    ///
    /// A component of `min` above its counterpart in `max` is a logic error,
    /// checked in debug builds.
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        debug_assert!(
            min.x <= max.x && min.y <= max.y && min.z <= max.z,
            "invalid bounding box: min {:?} > max {:?}",
            min,
            max
        );
        Self { min, max }
    }

    /// The box spanning all of space.
    pub fn infinite() -> Self {
        Self {
            min: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            max: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
        }
    }

    /// The empty box. Union with it leaves any box unchanged.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Returns a copy of the box with the extent along `axis` replaced.
    pub fn with_extent(mut self, axis: Axis, lo: f64, hi: f64) -> Self {
        let i = axis.index();
        self.min[i] = lo;
        self.max[i] = hi;
        self
    }

    /// The `(lo, hi)` interval covered along `axis`.
    pub fn extent(&self, axis: Axis) -> (f64, f64) {
        let i = axis.index();
        (self.min[i], self.max[i])
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Largest box contained in both boxes. Disjoint boxes give an empty box.
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            min: self.min.sup(&other.min),
            max: self.max.inf(&other.max),
        }
    }

    /// True if the boxes overlap, inclusive on faces.
    pub fn intersects(&self, other: &Self) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    /// True if `point` lies inside or on the box.
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        (0..3).all(|i| self.min[i] <= point[i] && point[i] <= self.max[i])
    }

    /// True if the box contains no points.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| !(self.min[i] <= self.max[i]))
    }

    /// True if every bound is finite.
    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|v| v.is_finite())
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::infinite()
    }
}

impl BitOr for BoundingBox {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(&rhs)
    }
}

impl BitOrAssign for BoundingBox {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(&rhs);
    }
}

impl BitAnd for BoundingBox {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(&rhs)
    }
}

impl BitAndAssign for BoundingBox {
    fn bitand_assign(&mut self, rhs: Self) {
        *self = self.intersection(&rhs);
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}] x [{}, {}] x [{}, {}]",
            self.min.x, self.max.x, self.min.y, self.max.y, self.min.z, self.max.z
        )
    }
}
