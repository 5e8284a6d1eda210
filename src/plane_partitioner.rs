//! Plane-stratified universe partitioner.
//!
//! Space is cut into slabs along one axis by planes placed at every distinct
//! finite bounding-box extent of the universe's cells. Each slab stores the
//! cells whose extent overlaps it, so a query is a binary search over the
//! planes followed by a slice lookup.

use itertools::Itertools;
use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::bbox::Axis;
use crate::cell::Region;
use crate::partitioner::UniversePartitioner;
use crate::settings::FP_COINCIDENT;


/// Returns true if `a` and `b` are equal up to [`FP_COINCIDENT`], relative to
/// their magnitude and absolute below one.
pub fn coincident(a: f64, b: f64) -> bool {
    (a - b).abs() <= FP_COINCIDENT * a.abs().max(b.abs()).max(1.0)
}

/// Partitioner stratifying space into slabs along one axis.
///
/// **Context**: Most modelled geometries are layered along one principal
/// direction, so the cells a point can be in are largely decided by one
/// coordinate. Cutting along that coordinate only keeps construction linear
/// in the number of cells and queries logarithmic in the number of planes.
///
/// **How it Works**: `planes` holds the distinct finite extents of every cell
/// along `axis`, strictly increasing. A query lands in slab `k`, the range
/// `[planes[k], planes[k + 1])`, or in the slab on either side when it lies
/// within tolerance of a plane. `slabs[k]` lists every cell whose closed
/// extent touches the closed range `[planes[k], planes[k + 1]]`, plus every
/// cell unbounded on both sides. A cell starting at a plane is therefore also
/// listed in the slab below it, so a query snapped onto that plane from just
/// inside the cell still finds it. With fewer than two planes there is a
/// single slab listing every cell.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanePartitioner {
    axis: Axis,
    planes: Vec<f64>,
    slabs: Vec<Vec<usize>>,
}

impl PlanePartitioner {
    /// Builds the partitioner from `(cell, (lo, hi))` extents along `axis`.
    ///
    /// Cells keep the order in which they are given within every slab.
    pub fn from_extents<I>(axis: Axis, extents: I) -> Self
    where
        I: IntoIterator<Item = (usize, (f64, f64))>,
    {
        let extents: Vec<(usize, f64, f64)> = extents
            .into_iter()
            .map(|(cell, (lo, hi))| (cell, lo, hi))
            .collect();

        let mut planes: Vec<f64> = extents
            .iter()
            .flat_map(|&(_, lo, hi)| [lo, hi])
            .filter(|v| v.is_finite())
            .sorted_by(f64::total_cmp)
            .collect();
        planes.dedup_by(|a, b| coincident(*a, *b));

        if planes.len() < 2 {
            debug!(
                axis = %axis,
                cells = extents.len(),
                "no stratification, using a single slab"
            );
            return Self {
                axis,
                planes,
                slabs: vec![extents.iter().map(|&(cell, _, _)| cell).collect()],
            };
        }

        let mut partitioner = Self {
            axis,
            planes,
            slabs: Vec::new(),
        };
        let num_slabs = partitioner.planes.len() - 1;
        let mut slabs = vec![Vec::new(); num_slabs];
        for &(cell, lo, hi) in &extents {
            // NaN or inverted extents carry no usable information
            let (first, last) = if lo <= hi {
                (partitioner.first_slab(lo), partitioner.last_slab(hi))
            } else {
                (0, num_slabs - 1)
            };
            for slab in &mut slabs[first..=last] {
                slab.push(cell);
            }
        }
        partitioner.slabs = slabs;

        debug!(
            axis = %axis,
            cells = extents.len(),
            slabs = num_slabs,
            max_candidates = partitioner.max_candidates(),
            mean_candidates = partitioner.mean_candidates(),
            "built plane partitioner"
        );

        partitioner
    }

    /// First slab listing a cell with lower bound `lo`: the slab below the
    /// plane matching `lo`, or the bottom slab if `lo` is infinite.
    fn first_slab(&self, lo: f64) -> usize {
        let last = self.planes.len() - 2;
        if lo == f64::NEG_INFINITY {
            0
        } else if lo == f64::INFINITY {
            last
        } else {
            self.first_plane_at_or_above(lo).saturating_sub(1).min(last)
        }
    }

    /// Last slab listing a cell with upper bound `hi`: the slab starting at
    /// the plane matching `hi`, or the top slab if `hi` is infinite.
    fn last_slab(&self, hi: f64) -> usize {
        let last = self.planes.len() - 2;
        if hi == f64::NEG_INFINITY {
            0
        } else {
            self.first_plane_at_or_above(hi).min(last)
        }
    }

    /// Index of the first plane not below `x`, treating planes within
    /// tolerance of `x` as equal to it.
    fn first_plane_at_or_above(&self, x: f64) -> usize {
        self.planes
            .partition_point(|&p| p < x && !coincident(p, x))
    }

    /// Slab holding coordinate `x` for a particle moving with axis component `ux`.
    fn locate(&self, x: f64, ux: f64) -> usize {
        let last = self.slabs.len() - 1;
        let i = self.first_plane_at_or_above(x);
        let slab = match self.planes.get(i) {
            Some(&plane) if coincident(plane, x) => {
                // on a plane: moving down selects the slab below
                if ux < 0.0 {
                    i.saturating_sub(1)
                } else {
                    i
                }
            }
            _ => i.saturating_sub(1),
        };
        slab.min(last)
    }

    /// The stratified axis.
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Partition planes in increasing order.
    pub fn planes(&self) -> &[f64] {
        &self.planes
    }

    pub fn num_slabs(&self) -> usize {
        self.slabs.len()
    }

    /// Candidate list of slab `k`.
    ///
    /// # Panics
    /// Panics if `k >= self.num_slabs()`.
    pub fn slab(&self, k: usize) -> &[usize] {
        &self.slabs[k]
    }

    /// Length of the longest candidate list.
    pub fn max_candidates(&self) -> usize {
        self.slabs.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Mean candidate list length over slabs.
    pub fn mean_candidates(&self) -> f64 {
        let total: usize = self.slabs.iter().map(Vec::len).sum();
        total as f64 / self.slabs.len() as f64
    }
}

impl UniversePartitioner for PlanePartitioner {
    fn build<C: Region>(cell_ids: &[usize], cells: &[C], axis: Axis) -> Self {
        Self::from_extents(
            axis,
            cell_ids
                .iter()
                .map(|&i| (i, cells[i].bounding_box().extent(axis))),
        )
    }

    fn get_cells(&self, r: &Point3<f64>, u: &Vector3<f64>) -> &[usize] {
        if self.slabs.len() == 1 {
            return &self.slabs[0];
        }
        let i = self.axis.index();
        &self.slabs[self.locate(r[i], u[i])]
    }
}
