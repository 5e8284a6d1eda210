//! Cells: regions of space bounded by surfaces.
//!
//! Universes and partitioners only see cells through the [`Region`] trait,
//! which exposes a bounding box and an exact containment predicate. [`Cell`]
//! is the CSG implementation: the intersection of a list of half-spaces.

use nalgebra::{Point3, Vector3};

use crate::bbox::BoundingBox;
use crate::surface::Surface;


/// What universes and partitioners need to know about a cell.
pub trait Region {
    /// Axis-aligned box enclosing every point of the region.
    fn bounding_box(&self) -> BoundingBox;

    /// Exact containment test. `u` decides points lying on a boundary.
    fn contains(&self, r: &Point3<f64>, u: &Vector3<f64>) -> bool;
}

/// One side of a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Halfspace {
    pub surface: Surface,
    pub positive: bool,
}

impl Halfspace {
    pub fn contains(&self, r: &Point3<f64>, u: &Vector3<f64>) -> bool {
        self.surface.sense(r, u) == self.positive
    }
}

/// A CSG cell: the intersection of its half-spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub id: i32,
    pub universe: i32,
    pub material: Option<i32>,
    pub region: Vec<Halfspace>,
}

impl Cell {
    /// The region as signed surface ids, negative for the negative side.
    pub fn signed_region(&self) -> Vec<i32> {
        self.region
            .iter()
            .map(|h| if h.positive { h.surface.id } else { -h.surface.id })
            .collect()
    }
}

impl Region for Cell {
    fn bounding_box(&self) -> BoundingBox {
        self.region
            .iter()
            .fold(BoundingBox::infinite(), |acc, h| {
                acc & h.surface.bounding_box(h.positive)
            })
    }

    fn contains(&self, r: &Point3<f64>, u: &Vector3<f64>) -> bool {
        self.region.iter().all(|h| h.contains(r, u))
    }
}
