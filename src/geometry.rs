//! The geometry arena and its builder.
//!
//! Surfaces, cells, universes and lattices are stored in flat vectors and
//! referred to by typed integer ids handed out in declaration order. A
//! [`GeometryBuilder`] collects the items and checks every reference as it is
//! added; [`GeometryBuilder::build`] then verifies that universe containment
//! is acyclic and freezes everything into an immutable [`Geometry`] that can
//! be shared between threads.

use std::fmt;

use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::cell::{Cell, Fill, Universe};
use crate::containment::ContainmentGraph;
use crate::error::{GeometryError, Result};
use crate::lattice::Lattice;
use crate::region::{Crossing, Tolerance};
use crate::resolver::{Resolver, ResolverOptions};
use crate::surface::{Surface, SurfaceKind};


macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// Position of the item in its arena.
            pub fn index(&self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

arena_id!(
    /// Handle of a surface; surfaces declared earlier have smaller ids.
    SurfaceId
);
arena_id!(CellId);
arena_id!(UniverseId);
arena_id!(LatticeId);

/// Opaque material handle. The geometry never looks inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u32);

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Collects the parts of a model. Items may only refer to items added before
/// them, except through [`GeometryBuilder::push_cell`].
#[derive(Debug, Default)]
pub struct GeometryBuilder {
    surfaces: Vec<Surface>,
    cells: Vec<Cell>,
    universes: Vec<Universe>,
    lattices: Vec<Box<dyn Lattice>>,
}

impl GeometryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_surface(&mut self, surface: Surface) -> SurfaceId {
        self.surfaces.push(surface);
        SurfaceId(self.surfaces.len() - 1)
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    /// Validates and adds a surface with default name and boundary condition.
    pub fn surface(&mut self, kind: SurfaceKind) -> Result<SurfaceId> {
        Ok(self.add_surface(Surface::new(kind)?))
    }

    pub fn add_cell(&mut self, cell: Cell) -> Result<CellId> {
        for id in cell.region.surface_ids() {
            check(id.index(), self.surfaces.len(), "surface")?;
        }
        match cell.fill {
            Fill::Material(_) => {}
            Fill::Universe(id) => check(id.index(), self.universes.len(), "universe")?,
            Fill::Lattice(id) => check(id.index(), self.lattices.len(), "lattice")?,
        }
        self.cells.push(cell);
        Ok(CellId(self.cells.len() - 1))
    }

    pub fn add_universe(&mut self, universe: Universe) -> Result<UniverseId> {
        for id in universe.cells() {
            check(id.index(), self.cells.len(), "cell")?;
        }
        self.universes.push(universe);
        Ok(UniverseId(self.universes.len() - 1))
    }

    /// Appends a cell to an existing universe.
    pub fn push_cell(&mut self, universe: UniverseId, cell: CellId) -> Result<()> {
        check(cell.index(), self.cells.len(), "cell")?;
        check(universe.index(), self.universes.len(), "universe")?;
        self.universes[universe.index()].push(cell);
        Ok(())
    }

    pub fn add_lattice(&mut self, lattice: impl Lattice + 'static) -> Result<LatticeId> {
        for id in lattice.universes() {
            check(id.index(), self.universes.len(), "universe")?;
        }
        self.lattices.push(Box::new(lattice));
        Ok(LatticeId(self.lattices.len() - 1))
    }

    /// Freezes the model with `root` as the outermost universe.
    pub fn build(self, root: UniverseId) -> Result<Geometry> {
        check(root.index(), self.universes.len(), "universe")?;
        let graph = ContainmentGraph::from_model(&self.universes, &self.cells, &self.lattices);
        if let Some(cycle) = graph.find_cycle() {
            return Err(GeometryError::CyclicUniverse { cycle });
        }
        let max_depth = graph.depth(root);
        debug!(
            "built geometry: {} surfaces, {} cells, {} universes, {} lattices, depth {}",
            self.surfaces.len(),
            self.cells.len(),
            self.universes.len(),
            self.lattices.len(),
            max_depth
        );
        Ok(Geometry {
            surfaces: self.surfaces,
            cells: self.cells,
            universes: self.universes,
            lattices: self.lattices,
            root,
            max_depth,
        })
    }
}

fn check(index: usize, len: usize, kind: &'static str) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(GeometryError::UnknownId { kind, id: index })
    }
}

/// An immutable, validated model. Safe to query from many threads at once.
#[derive(Debug)]
pub struct Geometry {
    surfaces: Vec<Surface>,
    cells: Vec<Cell>,
    universes: Vec<Universe>,
    lattices: Vec<Box<dyn Lattice>>,
    root: UniverseId,
    max_depth: usize,
}

impl Geometry {
    pub fn root(&self) -> UniverseId {
        self.root
    }

    /// Number of universe levels on the deepest descent from the root.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn surface(&self, id: SurfaceId) -> &Surface {
        &self.surfaces[id.index()]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.index()]
    }

    pub fn universe(&self, id: UniverseId) -> &Universe {
        &self.universes[id.index()]
    }

    pub fn num_universes(&self) -> usize {
        self.universes.len()
    }

    pub fn lattice(&self, id: LatticeId) -> &dyn Lattice {
        self.lattices[id.index()].as_ref()
    }

    /// First cell of `universe` containing `p`, in the universe's frame.
    pub fn find_cell(&self, universe: UniverseId, p: &Point3<f64>) -> Option<CellId> {
        self.universe(universe)
            .find_cell(p, &self.cells, &self.surfaces)
    }

    /// Distance along `d` to the boundary of one cell's region, in the
    /// frame of the universe holding the cell.
    pub fn cell_distance(
        &self,
        cell: CellId,
        p: &Point3<f64>,
        d: &Vector3<f64>,
        tolerance: &Tolerance,
    ) -> Option<Crossing> {
        self.cell(cell)
            .region
            .distance_to_boundary(p, d, &self.surfaces, tolerance)
    }

    pub fn resolver(&self, options: ResolverOptions) -> Resolver<'_> {
        Resolver::new(self, options)
    }
}
