//! Error taxonomy for geometry construction and queries.
//!
//! Construction errors (`DegenerateSurface`, `MalformedLattice`,
//! `CyclicUniverse`, `UnknownId`) are fatal to the model being built. Query
//! errors (`PointNotFound`, `UnboundedLattice`, `AmbiguousRegion`,
//! `OutsideGeometry`) are local to a single call: the shared model is never
//! modified by a query, so later queries proceed normally.

use nalgebra::Point3;

use crate::geometry::{CellId, LatticeId, UniverseId};

/// Errors raised while building or querying a [`Geometry`](crate::geometry::Geometry).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// A surface primitive was given parameters that do not describe a surface.
    #[error("degenerate surface: {0}")]
    DegenerateSurface(String),

    /// A lattice description has the wrong shape or invalid parameters.
    #[error("malformed lattice: {0}")]
    MalformedLattice(String),

    /// An interior point is not contained by any cell of a universe.
    #[error("no cell of universe {universe} contains point ({}, {}, {})", point.x, point.y, point.z)]
    PointNotFound {
        universe: UniverseId,
        point: Point3<f64>,
    },

    /// A point lies outside every populated lattice element and the lattice
    /// has no outer universe.
    #[error("point ({}, {}, {}) lies outside lattice {lattice}, which has no outer universe", point.x, point.y, point.z)]
    UnboundedLattice {
        lattice: LatticeId,
        point: Point3<f64>,
    },

    /// More than one cell contains a point and the resolver is configured to
    /// reject overlaps.
    #[error("cells {cells:?} of universe {universe} overlap")]
    AmbiguousRegion {
        universe: UniverseId,
        cells: Vec<CellId>,
    },

    /// A universe contains itself, directly or through nested fills.
    #[error("universe {cycle:?} forms a containment cycle")]
    CyclicUniverse { cycle: Vec<UniverseId> },

    /// A handle does not refer to an item of the geometry being built.
    #[error("unknown {kind} id {id}")]
    UnknownId { kind: &'static str, id: usize },

    /// A ray query was made from a point that is outside the root universe.
    #[error("point ({}, {}, {}) is outside the geometry", point.x, point.y, point.z)]
    OutsideGeometry { point: Point3<f64> },
}

impl GeometryError {
    /// True for errors raised while constructing a model rather than querying it.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::DegenerateSurface(_)
                | Self::MalformedLattice(_)
                | Self::CyclicUniverse { .. }
                | Self::UnknownId { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GeometryError>;
