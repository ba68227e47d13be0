//! Constructive solid geometry with nested universes and hexagonal lattices.
//!
//! A model is built from implicit [surfaces](surface), boolean
//! [regions](region) over their half-spaces, [cells](cell) that fill regions
//! with a material, a nested universe or a [lattice], and universes that
//! group cells. [`geometry::GeometryBuilder`] validates the parts and
//! produces an immutable [`geometry::Geometry`]; a [`resolver::Resolver`]
//! then answers "what is at this point" and "how far to the next boundary
//! along this ray".

pub mod assembly;
pub mod cell;
pub mod containment;
pub mod error;
pub mod geometry;
pub mod hex;
pub mod lattice;
pub mod region;
pub mod resolver;
pub mod scan;
pub mod settings;
pub mod surface;

pub use error::{GeometryError, Result};
pub use geometry::{CellId, Geometry, GeometryBuilder, LatticeId, MaterialId, SurfaceId, UniverseId};
pub use resolver::{Location, Occupant, Resolver, ResolverOptions};
