//! Cells, their fills, and the universes that group them.

use nalgebra::{Point3, Rotation3, Vector3};

use crate::geometry::{CellId, LatticeId, MaterialId, UniverseId};
use crate::region::Region;
use crate::surface::Surface;


/// What occupies a cell's region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fill {
    /// A material, or void when `None`.
    Material(Option<MaterialId>),
    Universe(UniverseId),
    Lattice(LatticeId),
}

impl Fill {
    pub fn material(id: MaterialId) -> Self {
        Fill::Material(Some(id))
    }

    pub fn void() -> Self {
        Fill::Material(None)
    }
}

/// A region of space paired with its fill.
///
/// Container fills see points in the cell's local frame, `R·(P - t)` for
/// translation `t` and rotation `R`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub name: Option<String>,
    pub region: Region,
    pub fill: Fill,
    pub translation: Option<Vector3<f64>>,
    pub rotation: Option<Rotation3<f64>>,
}

impl Cell {
    pub fn new(region: Region, fill: Fill) -> Self {
        Self {
            name: None,
            region,
            fill,
            translation: None,
            rotation: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_translation(mut self, translation: Vector3<f64>) -> Self {
        self.translation = Some(translation);
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation3<f64>) -> Self {
        self.rotation = Some(rotation);
        self
    }

    pub fn contains(&self, p: &Point3<f64>, surfaces: &[Surface]) -> bool {
        self.region.contains(p, surfaces)
    }

    /// Maps a point of the enclosing universe into the fill's frame.
    pub fn to_local(&self, p: &Point3<f64>) -> Point3<f64> {
        let shifted = match self.translation {
            Some(t) => p - t,
            None => *p,
        };
        match self.rotation {
            Some(r) => r * shifted,
            None => shifted,
        }
    }

    pub fn direction_to_local(&self, d: &Vector3<f64>) -> Vector3<f64> {
        match self.rotation {
            Some(r) => r * *d,
            None => *d,
        }
    }
}

/// Result of an exhaustive cell search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellMatch {
    /// The first cell, in declaration order, containing the point.
    pub cell: CellId,
    /// Later cells that also contain it.
    pub overlaps: Vec<CellId>,
}

impl CellMatch {
    pub fn is_ambiguous(&self) -> bool {
        !self.overlaps.is_empty()
    }
}

/// An ordered collection of cells expected not to overlap.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Universe {
    pub name: Option<String>,
    cells: Vec<CellId>,
}

impl Universe {
    pub fn new(cells: Vec<CellId>) -> Self {
        Self { name: None, cells }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    pub(crate) fn push(&mut self, cell: CellId) {
        self.cells.push(cell);
    }

    /// First cell in declaration order whose region contains `p`.
    pub fn find_cell(&self, p: &Point3<f64>, cells: &[Cell], surfaces: &[Surface]) -> Option<CellId> {
        self.cells
            .iter()
            .copied()
            .find(|id| cells[id.index()].contains(p, surfaces))
    }

    /// Like [`Universe::find_cell`], but keeps scanning to report overlapping cells.
    pub fn find_cell_checked(
        &self,
        p: &Point3<f64>,
        cells: &[Cell],
        surfaces: &[Surface],
    ) -> Option<CellMatch> {
        let mut matching = self
            .cells
            .iter()
            .copied()
            .filter(|id| cells[id.index()].contains(p, surfaces));
        let cell = matching.next()?;
        Some(CellMatch {
            cell,
            overlaps: matching.collect(),
        })
    }
}
