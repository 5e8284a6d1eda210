//! Search acceleration for universes with many cells.
//!
//! A partitioner is a read-only index built once per universe. Given a
//! position and direction it returns a list of candidate cells that must
//! include every cell containing the position; the universe then runs the
//! exact containment test over the candidates only. Returning extra cells
//! costs time, leaving one out silently breaks the geometry.
//!
//! The strategy used by universes is chosen in one place,
//! [`DefaultPartitioner`], so swapping it touches no call sites.

use std::fmt;

use nalgebra::{Point3, Vector3};

use crate::bbox::Axis;
use crate::cell::Region;
pub use crate::plane_partitioner::PlanePartitioner;

/// The partitioner attached to universes by [`crate::geometry::Geometry::finalize`].
pub type DefaultPartitioner = PlanePartitioner;

/// Narrows a universe's cells to the candidates that may contain a point.
///
/// **Context**: `find_cell` runs once per particle per geometric step, so the
/// exact surface tests it performs dominate runtime in universes with many
/// cells. A partitioner trades a one-off build for a short candidate list on
/// every query.
///
/// **How it Works**: Implementations precompute their index from the cell
/// bounding boxes at construction and never mutate it afterwards, so a built
/// partitioner can be shared across threads without locking.
pub trait UniversePartitioner: fmt::Debug + Send + Sync {
    /// Builds the index over `cell_ids`, indices into `cells`.
    fn build<C: Region>(cell_ids: &[usize], cells: &[C], axis: Axis) -> Self
    where
        Self: Sized;

    /// Returns the cells that could contain `r`.
    ///
    /// The list is in declaration order and lists each cell once. `u` only
    /// breaks ties when `r` sits on an internal boundary of the index.
    fn get_cells(&self, r: &Point3<f64>, u: &Vector3<f64>) -> &[usize];
}
