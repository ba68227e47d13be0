//! Point location and ray distance through nested universes.
//!
//! The resolver walks from the root universe down to a material-filled leaf
//! cell. At each level it finds the cell containing the point, then either
//! stops (material or void), moves into the cell's local frame and searches
//! the nested universe, or picks the lattice element containing the point and
//! searches the element's universe relative to the element centre. The
//! sequence of levels visited is returned with the result so ray queries can
//! measure distances in every frame at once.

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cell::Fill;
use crate::error::{GeometryError, Result};
use crate::geometry::{CellId, Geometry, LatticeId, MaterialId, SurfaceId, UniverseId};
use crate::lattice::LatticeCoord;
use crate::region::Tolerance;
use crate::surface::BoundaryCondition;


/// How the resolver treats points claimed by more than one cell of a universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Take the first cell in declaration order without checking the rest.
    Ignore,
    /// Take the first cell and report the overlap.
    #[default]
    Warn,
    /// Fail the query with [`GeometryError::AmbiguousRegion`].
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResolverOptions {
    pub overlap_policy: OverlapPolicy,
    pub tolerance: Tolerance,
}

/// What a located point lies in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Occupant {
    Material(MaterialId),
    Void,
    /// The point lies outside the root universe, beyond a tagged surface.
    Outside {
        boundary: BoundaryCondition,
        surface: SurfaceId,
    },
}

/// The lattice element a level descended through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub lattice: LatticeId,
    pub coord: LatticeCoord,
}

/// One step of a descent: the universe searched, the point in that
/// universe's frame, and the cell that contained it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub universe: UniverseId,
    pub point: Point3<f64>,
    pub cell: CellId,
    /// Set when the cell is filled by a lattice.
    pub element: Option<Element>,
}

/// Several cells of one universe containing the located point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    pub universe: UniverseId,
    /// The cell used, followed by the others.
    pub cells: Vec<CellId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub occupant: Occupant,
    /// Levels from the root universe down to the leaf cell.
    pub path: Vec<Level>,
    pub overlaps: Vec<Overlap>,
}

impl Location {
    pub fn material(&self) -> Option<MaterialId> {
        match self.occupant {
            Occupant::Material(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_outside(&self) -> bool {
        matches!(self.occupant, Occupant::Outside { .. })
    }

    /// The material-filled cell the point ended in.
    pub fn leaf_cell(&self) -> Option<CellId> {
        self.path.last().map(|level| level.cell)
    }
}

/// The nearest place along a ray where the located cell changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    /// Infinite when nothing along the ray ever changes.
    pub distance: f64,
    /// The surface crossed, or `None` for a lattice element face.
    pub surface: Option<SurfaceId>,
    /// Index into [`Location::path`] of the level the boundary belongs to.
    pub level: usize,
    pub boundary_condition: BoundaryCondition,
    /// The element entered, when the boundary is a lattice element face.
    pub lattice_neighbor: Option<LatticeCoord>,
}

impl Boundary {
    pub fn is_model_boundary(&self) -> bool {
        self.boundary_condition != BoundaryCondition::Transmission
    }
}

/// Read-only query interface over a [`Geometry`].
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    geometry: &'a Geometry,
    options: ResolverOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(geometry: &'a Geometry, options: ResolverOptions) -> Self {
        Self { geometry, options }
    }

    pub fn geometry(&self) -> &'a Geometry {
        self.geometry
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Finds the material (or void) occupying `p`, given in the root frame.
    pub fn locate(&self, p: &Point3<f64>) -> Result<Location> {
        let geometry = self.geometry;
        let mut path: Vec<Level> = Vec::with_capacity(geometry.max_depth());
        let mut overlaps = Vec::new();
        let mut universe = geometry.root();
        let mut point = *p;
        // lattice the current universe was reached through, until its outer
        // universe has been tried
        let mut via: Option<LatticeId> = None;

        loop {
            let Some(cell_id) = self.find_cell(universe, &point, &mut overlaps)? else {
                if path.is_empty() {
                    return self.outside(p);
                }
                if let Some(outer) = via.and_then(|id| geometry.lattice(id).outer()) {
                    if outer != universe {
                        debug!(
                            "no cell of universe {} contains {:?}, retrying in outer universe {}",
                            universe, point, outer
                        );
                        universe = outer;
                        via = None;
                        continue;
                    }
                }
                return Err(GeometryError::PointNotFound { universe, point });
            };

            let cell = geometry.cell(cell_id);
            let mut level = Level {
                universe,
                point,
                cell: cell_id,
                element: None,
            };
            match cell.fill {
                Fill::Material(material) => {
                    path.push(level);
                    let occupant = match material {
                        Some(id) => Occupant::Material(id),
                        None => Occupant::Void,
                    };
                    return Ok(Location {
                        occupant,
                        path,
                        overlaps,
                    });
                }
                Fill::Universe(next) => {
                    path.push(level);
                    point = cell.to_local(&point);
                    universe = next;
                    via = None;
                }
                Fill::Lattice(lattice_id) => {
                    let lattice = geometry.lattice(lattice_id);
                    let local = cell.to_local(&point);
                    let coord = lattice.element_of(&local);
                    let next = lattice.universe_at(lattice_id, coord, &local)?;
                    level.element = Some(Element {
                        lattice: lattice_id,
                        coord,
                    });
                    path.push(level);
                    point = local - lattice.element_origin(coord).coords;
                    universe = next;
                    via = Some(lattice_id);
                }
            }
            debug!("descended into universe {} at {:?}", universe, point);
        }
    }

    fn find_cell(
        &self,
        universe: UniverseId,
        p: &Point3<f64>,
        overlaps: &mut Vec<Overlap>,
    ) -> Result<Option<CellId>> {
        let geometry = self.geometry;
        if self.options.overlap_policy == OverlapPolicy::Ignore {
            return Ok(geometry.find_cell(universe, p));
        }
        let Some(found) =
            geometry
                .universe(universe)
                .find_cell_checked(p, geometry.cells(), geometry.surfaces())
        else {
            return Ok(None);
        };
        if found.is_ambiguous() {
            let mut cells = vec![found.cell];
            cells.extend(found.overlaps);
            if self.options.overlap_policy == OverlapPolicy::Reject {
                return Err(GeometryError::AmbiguousRegion { universe, cells });
            }
            warn!("cells {:?} of universe {} overlap at {:?}", cells, universe, p);
            overlaps.push(Overlap { universe, cells });
        }
        Ok(Some(found.cell))
    }

    /// Classifies a point no root cell contains.
    fn outside(&self, p: &Point3<f64>) -> Result<Location> {
        let geometry = self.geometry;
        let root = geometry.root();
        let violation = geometry.universe(root).cells().iter().find_map(|id| {
            geometry
                .cell(*id)
                .region
                .boundary_violation(p, geometry.surfaces())
        });
        match violation {
            Some((surface, boundary)) => Ok(Location {
                occupant: Occupant::Outside { boundary, surface },
                path: Vec::new(),
                overlaps: Vec::new(),
            }),
            None => Err(GeometryError::PointNotFound {
                universe: root,
                point: *p,
            }),
        }
    }

    /// Distance from `p` along `d` to the nearest boundary of any level of
    /// the descent through `p`.
    ///
    /// Crossings within the tie tolerance of each other resolve to the
    /// outermost level.
    pub fn distance_to_next_boundary(&self, p: &Point3<f64>, d: &Vector3<f64>) -> Result<Boundary> {
        let location = self.locate(p)?;
        if location.is_outside() {
            return Err(GeometryError::OutsideGeometry { point: *p });
        }
        let geometry = self.geometry;
        let tolerance = &self.options.tolerance;

        let mut nearest = Boundary {
            distance: f64::INFINITY,
            surface: None,
            level: 0,
            boundary_condition: BoundaryCondition::Transmission,
            lattice_neighbor: None,
        };
        let mut consider = |candidate: Boundary| {
            if candidate.distance < nearest.distance - tolerance.tie {
                nearest = candidate;
            }
        };

        let mut direction = *d;
        for (index, level) in location.path.iter().enumerate() {
            if let Some(crossing) =
                geometry.cell_distance(level.cell, &level.point, &direction, tolerance)
            {
                consider(Boundary {
                    distance: crossing.distance,
                    surface: Some(crossing.surface),
                    level: index,
                    boundary_condition: geometry.surface(crossing.surface).boundary,
                    lattice_neighbor: None,
                });
            }
            let cell = geometry.cell(level.cell);
            direction = cell.direction_to_local(&direction);
            if let (Some(element), Some(below)) = (level.element, location.path.get(index + 1)) {
                let (distance, neighbor) = geometry
                    .lattice(element.lattice)
                    .distance_to_element_boundary(element.coord, &below.point, &direction);
                if distance.is_finite() {
                    consider(Boundary {
                        distance,
                        surface: None,
                        level: index,
                        boundary_condition: BoundaryCondition::Transmission,
                        lattice_neighbor: Some(neighbor),
                    });
                }
            }
        }
        debug!("next boundary from {:?} along {:?}: {:?}", p, d, nearest);
        Ok(nearest)
    }

    /// Locates many points in parallel. Results keep the input order.
    pub fn locate_many(&self, points: &[Point3<f64>]) -> Vec<Result<Location>> {
        points.par_iter().map(|p| self.locate(p)).collect()
    }
}
