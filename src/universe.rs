//! Universes: collections of cells filling all space at one level.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::bbox::{Axis, BoundingBox};
use crate::cell::{Cell, Region};
use crate::partitioner::{DefaultPartitioner, UniversePartitioner};


/// Where a universe's cells come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryType {
    /// Constructive solid geometry defined by surfaces.
    #[default]
    Csg,
    /// Cells imported from an external CAD model.
    Dag,
}

/// Identity and membership of a universe as written to output files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseRecord {
    pub id: i32,
    pub geom_type: GeometryType,
    /// User ids of the member cells in declaration order.
    pub cells: Vec<i32>,
}

/// A collection of cells filling all space.
///
/// **Context**: The exact cell search tests every member cell's surfaces in
/// turn. For universes with many cells this is the hot path of particle
/// tracking, so a universe may own a partitioner that narrows the search.
///
/// **How it Works**: `cells` holds indices into the model's cell array in
/// declaration order. The partitioner is attached once all cells are known
/// and is dropped if the membership changes afterwards. The universe does not
/// own the cells, so the bounding box is computed from the array passed in on
/// every request.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    pub id: i32,
    cells: Vec<usize>,
    partitioner: Option<Box<DefaultPartitioner>>,
    geom_type: GeometryType,
}

impl Universe {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Appends a cell, invalidating the partitioner.
    pub fn add_cell(&mut self, cell: usize) {
        self.cells.push(cell);
        self.partitioner = None;
    }

    /// Member cells in declaration order.
    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    pub fn geom_type(&self) -> GeometryType {
        self.geom_type
    }

    pub fn set_geom_type(&mut self, geom_type: GeometryType) {
        self.geom_type = geom_type;
    }

    pub fn partitioner(&self) -> Option<&DefaultPartitioner> {
        self.partitioner.as_deref()
    }

    pub fn set_partitioner(&mut self, partitioner: DefaultPartitioner) {
        self.partitioner = Some(Box::new(partitioner));
    }

    pub fn clear_partitioner(&mut self) {
        self.partitioner = None;
    }

    /// Builds the default partitioner over the member cells along `axis`.
    pub fn partition<C: Region>(&mut self, cells: &[C], axis: Axis) {
        let partitioner = DefaultPartitioner::build(&self.cells, cells, axis);
        self.set_partitioner(partitioner);
    }

    /// Union of the member cells' bounding boxes, with `cells` the array the
    /// universe indexes into.
    pub fn bounding_box<C: Region>(&self, cells: &[C]) -> BoundingBox {
        self.cells
            .iter()
            .fold(BoundingBox::empty(), |acc, &i| acc | cells[i].bounding_box())
    }

    /// Cells that may contain `r`: the partitioner's list when one is
    /// attached, every member cell otherwise.
    pub fn candidates(&self, r: &Point3<f64>, u: &Vector3<f64>) -> &[usize] {
        match &self.partitioner {
            Some(partitioner) => partitioner.get_cells(r, u),
            None => &self.cells,
        }
    }

    /// Finds the first candidate cell containing `r`.
    ///
    /// Returns the index of the cell in `cells`, or `None` if no member cell
    /// contains the point; the caller decides whether that means the
    /// particle is lost.
    pub fn find_cell<C: Region>(
        &self,
        cells: &[C],
        r: &Point3<f64>,
        u: &Vector3<f64>,
    ) -> Option<usize> {
        self.candidates(r, u)
            .iter()
            .copied()
            .find(|&i| cells[i].contains(r, u))
    }

    /// Same as [`Universe::find_cell`] but always tests every member cell.
    pub fn find_cell_linear<C: Region>(
        &self,
        cells: &[C],
        r: &Point3<f64>,
        u: &Vector3<f64>,
    ) -> Option<usize> {
        self.cells
            .iter()
            .copied()
            .find(|&i| cells[i].contains(r, u))
    }

    /// Identity and membership for output. The partitioner is not recorded
    /// since it is rebuilt from the cells.
    pub fn record(&self, cells: &[Cell]) -> UniverseRecord {
        UniverseRecord {
            id: self.id,
            geom_type: self.geom_type,
            cells: self.cells.iter().map(|&i| cells[i].id).collect(),
        }
    }
}
