//! The geometry model: surfaces, cells and universes.
//!
//! A [`Geometry`] is built once from a [`GeometryInput`] (usually a TOML
//! file), finalised by attaching partitioners to its larger universes, and is
//! read-only afterwards so it can be shared across sampling threads.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bbox::{Axis, BoundingBox};
use crate::cell::{Cell, Halfspace};
use crate::surface::Surface;
use crate::universe::{GeometryType, Universe, UniverseRecord};


/// Cell description as read from the geometry file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellInput {
    pub id: i32,
    #[serde(default)]
    pub universe: i32,
    #[serde(default)]
    pub material: Option<i32>,
    /// Signed surface ids; negative selects the negative half-space.
    #[serde(default)]
    pub region: Vec<i32>,
}

/// Optional per-universe attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseInput {
    pub id: i32,
    #[serde(default)]
    pub geom_type: GeometryType,
}

/// Geometry file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryInput {
    #[serde(default)]
    pub root: i32,
    #[serde(default)]
    pub surfaces: Vec<Surface>,
    #[serde(default)]
    pub cells: Vec<CellInput>,
    #[serde(default)]
    pub universes: Vec<UniverseInput>,
}

/// A complete geometry model.
#[derive(Debug, Clone)]
pub struct Geometry {
    pub surfaces: Vec<Surface>,
    pub cells: Vec<Cell>,
    pub universes: Vec<Universe>,
    root: usize,
    cell_map: HashMap<i32, usize>,
    universe_map: HashMap<i32, usize>,
}

impl Geometry {
    /// Reads and builds a geometry from a TOML file.
    pub fn from_file(filename: impl AsRef<Path>) -> Result<Geometry> {
        let filename = filename.as_ref();
        let text = fs::read_to_string(filename)
            .with_context(|| format!("reading geometry file {:?}", filename))?;
        let input: GeometryInput = toml::from_str(&text)
            .with_context(|| format!("parsing geometry file {:?}", filename))?;
        let geom = Self::from_input(input)?;
        info!(
            file = %filename.display(),
            surfaces = geom.surfaces.len(),
            cells = geom.cells.len(),
            universes = geom.universes.len(),
            "loaded geometry"
        );
        Ok(geom)
    }

    /// Validates the input and resolves surface and universe ids.
    pub fn from_input(input: GeometryInput) -> Result<Geometry> {
        let mut surface_map = HashMap::new();
        for (i, surface) in input.surfaces.iter().enumerate() {
            surface.validate()?;
            if surface_map.insert(surface.id, i).is_some() {
                bail!("duplicate surface id {}", surface.id);
            }
        }

        let mut cells = Vec::with_capacity(input.cells.len());
        let mut cell_map = HashMap::new();
        let mut universes: Vec<Universe> = Vec::new();
        let mut universe_map = HashMap::new();

        for cell_input in input.cells {
            let index = cells.len();
            if cell_map.insert(cell_input.id, index).is_some() {
                bail!("duplicate cell id {}", cell_input.id);
            }

            let region = cell_input
                .region
                .iter()
                .map(|&signed| {
                    if signed == 0 {
                        bail!("cell {} references surface 0", cell_input.id);
                    }
                    let surface = surface_map.get(&signed.abs()).ok_or_else(|| {
                        anyhow!(
                            "cell {} references unknown surface {}",
                            cell_input.id,
                            signed.abs()
                        )
                    })?;
                    Ok(Halfspace {
                        surface: input.surfaces[*surface].clone(),
                        positive: signed > 0,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let universe = *universe_map.entry(cell_input.universe).or_insert_with(|| {
                universes.push(Universe::new(cell_input.universe));
                universes.len() - 1
            });
            universes[universe].add_cell(index);

            cells.push(Cell {
                id: cell_input.id,
                universe: cell_input.universe,
                material: cell_input.material,
                region,
            });
        }

        for attributes in &input.universes {
            let universe = *universe_map.entry(attributes.id).or_insert_with(|| {
                universes.push(Universe::new(attributes.id));
                universes.len() - 1
            });
            universes[universe].set_geom_type(attributes.geom_type);
        }

        let root = *universe_map
            .get(&input.root)
            .ok_or_else(|| anyhow!("root universe {} is not defined", input.root))?;

        Ok(Geometry {
            surfaces: input.surfaces,
            cells,
            universes,
            root,
            cell_map,
            universe_map,
        })
    }

    /// Attaches a partitioner along `axis` to every CSG universe with at
    /// least `threshold` cells. Must run before the geometry is shared.
    pub fn finalize(&mut self, axis: Axis, threshold: usize) {
        let mut partitioned = 0;
        for universe in &mut self.universes {
            if universe.geom_type() != GeometryType::Csg || universe.cells().len() < threshold {
                universe.clear_partitioner();
                continue;
            }
            universe.partition(&self.cells, axis);
            if let Some(p) = universe.partitioner() {
                debug!(
                    universe = universe.id,
                    cells = universe.cells().len(),
                    slabs = p.num_slabs(),
                    max_candidates = p.max_candidates(),
                    "partitioned universe"
                );
            }
            partitioned += 1;
        }
        info!(
            axis = %axis,
            threshold,
            partitioned,
            universes = self.universes.len(),
            "finalized geometry"
        );
    }

    pub fn root_universe(&self) -> &Universe {
        &self.universes[self.root]
    }

    pub fn universe(&self, id: i32) -> Option<&Universe> {
        self.universe_map.get(&id).map(|&i| &self.universes[i])
    }

    pub fn cell(&self, id: i32) -> Option<&Cell> {
        self.cell_map.get(&id).map(|&i| &self.cells[i])
    }

    /// Bounding box of the root universe.
    pub fn bounding_box(&self) -> BoundingBox {
        self.root_universe().bounding_box(&self.cells)
    }

    /// Index of the root-universe cell containing `r`, if any.
    pub fn find_cell(&self, r: &Point3<f64>, u: &Vector3<f64>) -> Option<usize> {
        self.root_universe().find_cell(&self.cells, r, u)
    }

    /// [`Geometry::find_cell`] without partitioners.
    pub fn find_cell_linear(&self, r: &Point3<f64>, u: &Vector3<f64>) -> Option<usize> {
        self.root_universe().find_cell_linear(&self.cells, r, u)
    }

    /// Output records for every universe.
    pub fn records(&self) -> Vec<UniverseRecord> {
        self.universes.iter().map(|u| u.record(&self.cells)).collect()
    }

    pub fn root_id(&self) -> i32 {
        self.root_universe().id
    }
}
