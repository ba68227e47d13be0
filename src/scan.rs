//! Grid scans over a model: occupancy census and overlap audit.
//!
//! Both scans sample a square grid of points in a plane of constant `z` and
//! locate each point independently, so rows are distributed over the rayon
//! thread pool. Results are merged in a deterministic order regardless of
//! scheduling.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use nalgebra::Point3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::GeometryError;
use crate::geometry::{CellId, MaterialId, UniverseId};
use crate::resolver::{Occupant, OverlapPolicy, Resolver, ResolverOptions};


/// A square grid of sample points centred on the z-axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Samples along each side.
    pub resolution: usize,
    pub half_width: f64,
    #[serde(default)]
    pub z: f64,
}

impl Grid {
    fn spacing(&self) -> f64 {
        2.0 * self.half_width / self.resolution as f64
    }

    /// Area represented by one sample.
    pub fn cell_area(&self) -> f64 {
        self.spacing() * self.spacing()
    }

    /// Sample points of row `j`, from -x to +x.
    pub fn row(&self, j: usize) -> impl Iterator<Item = Point3<f64>> + '_ {
        let h = self.spacing();
        let y = -self.half_width + (j as f64 + 0.5) * h;
        (0..self.resolution).map(move |i| Point3::new(-self.half_width + (i as f64 + 0.5) * h, y, self.z))
    }
}

/// Classification of one census sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tally {
    Material(MaterialId),
    Void,
    Outside,
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tally::Material(id) => write!(f, "{}", id),
            Tally::Void => write!(f, "void"),
            Tally::Outside => write!(f, "outside"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Census {
    pub counts: BTreeMap<Tally, usize>,
    /// Samples whose location failed.
    pub errors: usize,
    /// Samples located in overlapping cells.
    pub overlaps: usize,
    pub cell_area: f64,
}

impl Census {
    pub fn count(&self, tally: Tally) -> usize {
        self.counts.get(&tally).copied().unwrap_or(0)
    }

    pub fn samples(&self) -> usize {
        self.counts.values().sum::<usize>() + self.errors
    }

    /// Estimated area of everything tallied as `tally`.
    pub fn area(&self, tally: Tally) -> f64 {
        self.count(tally) as f64 * self.cell_area
    }

    fn merge(mut self, other: Census) -> Census {
        for (tally, n) in other.counts {
            *self.counts.entry(tally).or_default() += n;
        }
        self.errors += other.errors;
        self.overlaps += other.overlaps;
        self
    }
}

fn progress_bar(len: usize, message: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.green/blue} {pos:>5}/{len:5} {msg} ETA: {eta_precise}",
    ) {
        pb.set_style(style.progress_chars("█▇▆▅▄▃▂▁"));
    }
    pb.set_message(message.to_string());
    pb
}

/// Locates every grid point and counts what occupies it.
pub fn census(resolver: &Resolver<'_>, grid: &Grid, progress: bool) -> Census {
    let start = Instant::now();
    let pb = progress_bar(grid.resolution, "row", progress);

    let census = (0..grid.resolution)
        .into_par_iter()
        .map(|j| {
            let mut row = Census::default();
            for p in grid.row(j) {
                match resolver.locate(&p) {
                    Ok(location) => {
                        let tally = match location.occupant {
                            Occupant::Material(id) => Tally::Material(id),
                            Occupant::Void => Tally::Void,
                            Occupant::Outside { .. } => Tally::Outside,
                        };
                        *row.counts.entry(tally).or_default() += 1;
                        if !location.overlaps.is_empty() {
                            row.overlaps += 1;
                        }
                    }
                    Err(err) => {
                        warn!("census sample at {:?} failed: {}", p, err);
                        row.errors += 1;
                    }
                }
            }
            pb.inc(1);
            row
        })
        .reduce(Census::default, Census::merge);
    pb.finish_and_clear();

    info!(
        "census of {} samples in {:.2?}",
        grid.resolution * grid.resolution,
        start.elapsed()
    );
    Census {
        cell_area: grid.cell_area(),
        ..census
    }
}

/// A set of cells found to share a part of space.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapReport {
    pub universe: UniverseId,
    pub cells: Vec<CellId>,
    /// One grid point where the overlap occurs.
    pub point: Point3<f64>,
    pub samples: usize,
}

/// Scans the grid for points claimed by more than one cell of a universe.
///
/// The resolver's own overlap policy is overridden so that every overlap is
/// seen; reports are ordered by universe, then cells.
pub fn audit_overlaps(resolver: &Resolver<'_>, grid: &Grid) -> Vec<OverlapReport> {
    let checking = Resolver::new(
        resolver.geometry(),
        ResolverOptions {
            overlap_policy: OverlapPolicy::Warn,
            ..*resolver.options()
        },
    );

    let found: BTreeMap<(UniverseId, Vec<CellId>), OverlapReport> = (0..grid.resolution)
        .into_par_iter()
        .map(|j| {
            let mut row: BTreeMap<(UniverseId, Vec<CellId>), OverlapReport> = BTreeMap::new();
            for p in grid.row(j) {
                let overlaps = match checking.locate(&p) {
                    Ok(location) => location.overlaps,
                    Err(GeometryError::PointNotFound { .. }) => continue,
                    Err(err) => {
                        warn!("audit sample at {:?} failed: {}", p, err);
                        continue;
                    }
                };
                for overlap in overlaps {
                    row.entry((overlap.universe, overlap.cells.clone()))
                        .and_modify(|report| report.samples += 1)
                        .or_insert(OverlapReport {
                            universe: overlap.universe,
                            cells: overlap.cells,
                            point: p,
                            samples: 1,
                        });
                }
            }
            row
        })
        .reduce(BTreeMap::new, |mut accum, row| {
            for (key, report) in row {
                accum
                    .entry(key)
                    .and_modify(|existing| existing.samples += report.samples)
                    .or_insert(report);
            }
            accum
        });

    found.into_values().collect()
}
