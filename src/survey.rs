//! Random sampling survey of cell searches.
//!
//! This module exercises the geometry the way particle tracking does: many
//! independent `find_cell` calls on a shared, read-only geometry. Each sample
//! is a uniformly distributed position in a box and an isotropic direction.
//!
//! The survey provides:
//! - Parallel evaluation of the partitioned search with rayon
//! - An optional second pass without partitioners for comparison
//! - Found/lost counts, candidate list lengths and timings
//!
//! Any disagreement between the two passes means a partitioner dropped a
//! cell that contains the sampled point, which is a geometry bug.

use std::fmt;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, UnitSphere};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::bbox::BoundingBox;
use crate::geometry::Geometry;
use crate::settings::Settings;


/// One query: a position and a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub r: Point3<f64>,
    pub u: Vector3<f64>,
}

/// Summary of a survey run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveyResult {
    pub samples: usize,
    pub found: usize,
    pub lost: usize,
    /// Samples where the partitioned and linear searches disagree, `None`
    /// when the linear pass was skipped.
    pub mismatches: Option<usize>,
    /// Mean number of cells tested per query in the root universe.
    pub mean_candidates: f64,
    pub universe_cells: usize,
    pub accelerated_secs: f64,
    pub linear_secs: Option<f64>,
}

impl SurveyResult {
    /// Linear search time over partitioned search time.
    pub fn speedup(&self) -> Option<f64> {
        self.linear_secs
            .filter(|_| self.accelerated_secs > 0.0)
            .map(|linear| linear / self.accelerated_secs)
    }
}

impl fmt::Display for SurveyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Survey:")?;
        writeln!(f, "  - Samples: {}", self.samples)?;
        writeln!(f, "  - Found: {}", self.found)?;
        writeln!(f, "  - Lost: {}", self.lost)?;
        writeln!(
            f,
            "  - Mean Candidates: {:.3} of {} cells",
            self.mean_candidates, self.universe_cells
        )?;
        writeln!(f, "  - Partitioned Search: {:.6} s", self.accelerated_secs)?;
        if let Some(linear) = self.linear_secs {
            writeln!(f, "  - Linear Search: {:.6} s", linear)?;
        }
        if let Some(speedup) = self.speedup() {
            writeln!(f, "  - Speedup: {:.2}x", speedup)?;
        }
        match self.mismatches {
            Some(mismatches) => writeln!(f, "  - Mismatches: {}", mismatches),
            None => writeln!(f, "  - Mismatches: not checked"),
        }
    }
}

/// Sampling survey over the root universe of a geometry.
///
/// **Context**: A partitioner is only correct if it never hides a cell that
/// contains the query point, and only useful if it shortens the search.
/// Sampling many random queries checks both on a real geometry.
///
/// **How it Works**: Positions are drawn uniformly from the sampling box
/// (the settings' `bounds`, or the root universe's bounding box if it is
/// finite) and directions uniformly on the unit sphere. The searches run in
/// parallel over the shared geometry; with `verify` set, every query is
/// repeated without partitioners and the results compared.
pub struct Survey<'a> {
    geom: &'a Geometry,
    bounds: BoundingBox,
    samples: usize,
    seed: Option<u64>,
    verify: bool,
}

impl<'a> Survey<'a> {
    pub fn new(geom: &'a Geometry, settings: &Settings) -> Result<Self> {
        let bounds = match settings.bounds {
            Some(bounds) => bounds,
            None => {
                let bounds = geom.bounding_box();
                if bounds.is_empty() || !bounds.is_finite() {
                    bail!(
                        "root universe {} has bounding box {}; set `bounds` to sample it",
                        geom.root_id(),
                        bounds
                    );
                }
                bounds
            }
        };

        Ok(Self {
            geom,
            bounds,
            samples: settings.samples,
            seed: settings.seed,
            verify: settings.verify,
        })
    }

    /// Draws the survey's queries. Reproducible when a seed is set.
    pub fn samples(&self) -> Vec<Sample> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let extent = self.bounds.max - self.bounds.min;

        (0..self.samples)
            .map(|_| {
                let offset = Vector3::new(
                    rng.random::<f64>() * extent.x,
                    rng.random::<f64>() * extent.y,
                    rng.random::<f64>() * extent.z,
                );
                let [ux, uy, uz]: [f64; 3] = UnitSphere.sample(&mut rng);
                Sample {
                    r: self.bounds.min + offset,
                    u: Vector3::new(ux, uy, uz),
                }
            })
            .collect()
    }

    /// Runs the survey.
    pub fn run(&self) -> SurveyResult {
        let samples = self.samples();
        let root = self.geom.root_universe();
        info!(
            samples = samples.len(),
            bounds = %self.bounds,
            verify = self.verify,
            "running survey"
        );

        let passes = if self.verify { 2 } else { 1 };
        let pb = ProgressBar::new((samples.len() * passes) as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>7}/{len:7} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▇▆▅▄▃▂▁"),
        );
        pb.set_message("queries");

        let (accelerated, accelerated_time) = timed(|| {
            samples
                .par_iter()
                .map(|s| {
                    let cell = self.geom.find_cell(&s.r, &s.u);
                    pb.inc(1);
                    cell
                })
                .collect::<Vec<_>>()
        });

        let linear = self.verify.then(|| {
            timed(|| {
                samples
                    .par_iter()
                    .map(|s| {
                        let cell = self.geom.find_cell_linear(&s.r, &s.u);
                        pb.inc(1);
                        cell
                    })
                    .collect::<Vec<_>>()
            })
        });
        pb.finish_and_clear();

        let candidates: usize = samples
            .par_iter()
            .map(|s| root.candidates(&s.r, &s.u).len())
            .sum();

        let found = accelerated.iter().filter(|c| c.is_some()).count();

        let mismatches = linear.as_ref().map(|(linear, _)| {
            let mismatched: Vec<usize> = accelerated
                .iter()
                .zip(linear)
                .enumerate()
                .filter(|(_, (a, l))| a != l)
                .map(|(i, _)| i)
                .collect();
            for &i in mismatched.iter().take(10) {
                let cell_id = |c: Option<usize>| c.map(|c| self.geom.cells[c].id);
                warn!(
                    r = ?samples[i].r,
                    u = ?samples[i].u,
                    partitioned = ?cell_id(accelerated[i]),
                    linear = ?cell_id(linear[i]),
                    "cell search mismatch"
                );
            }
            mismatched.len()
        });

        SurveyResult {
            samples: samples.len(),
            found,
            lost: samples.len() - found,
            mismatches,
            mean_candidates: candidates as f64 / samples.len().max(1) as f64,
            universe_cells: root.cells().len(),
            accelerated_secs: accelerated_time.as_secs_f64(),
            linear_secs: linear.map(|(_, time)| time.as_secs_f64()),
        }
    }
}

fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let value = f();
    (value, start.elapsed())
}
