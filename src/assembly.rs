//! Builders for hexagonal fuel assemblies.
//!
//! [`hexagonal_prism`] bounds a lattice with six planes. [`PinAssembly`]
//! assembles a complete model: one fuel pin per lattice element, moderator
//! around the pins and between the lattice and the prism walls.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cell::{Cell, Fill, Universe};
use crate::error::{GeometryError, Result};
use crate::geometry::{Geometry, GeometryBuilder, LatticeId, MaterialId};
use crate::hex::{HexIndex, Orientation};
use crate::lattice::{ring_size, HexLattice, HexLatticeSpec};
use crate::region::Region;
use crate::surface::{BoundaryCondition, Surface, SurfaceKind};

#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn prism(orientation: Orientation) -> (GeometryBuilder, Region) {
        let mut builder = GeometryBuilder::new();
        let region = hexagonal_prism(
            &mut builder,
            2.0,
            orientation,
            [1.0, -1.0],
            BoundaryCondition::Reflective,
        )
        .unwrap();
        (builder, region)
    }

    #[test]
    fn prism_faces() {
        let apothem = 3.0_f64.sqrt();
        let (builder, region) = prism(Orientation::Y);
        let surfaces = builder.surfaces();
        assert_eq!(region.surface_ids().len(), 6);
        // flat sides face east and west, corners point north and south
        assert!(region.contains(&Point3::new(1.0 + apothem - 1e-6, -1.0, 0.0), surfaces));
        assert!(!region.contains(&Point3::new(1.0 + apothem + 1e-6, -1.0, 0.0), surfaces));
        assert!(region.contains(&Point3::new(1.0, -1.0 + 2.0 - 1e-6, 7.0), surfaces));
        assert!(!region.contains(&Point3::new(1.0, -1.0 + 2.0 + 1e-6, 7.0), surfaces));
        assert!(surfaces
            .iter()
            .all(|s| s.boundary == BoundaryCondition::Reflective));

        let (builder, region) = prism(Orientation::X);
        let surfaces = builder.surfaces();
        assert!(region.contains(&Point3::new(1.0, -1.0 + apothem - 1e-6, 0.0), surfaces));
        assert!(!region.contains(&Point3::new(1.0, -1.0 + apothem + 1e-6, 0.0), surfaces));
        assert!(region.contains(&Point3::new(1.0 + 2.0 - 1e-6, -1.0, 0.0), surfaces));
    }

    #[test]
    fn prism_rejects_non_positive_edge() {
        let mut builder = GeometryBuilder::new();
        let err = hexagonal_prism(
            &mut builder,
            0.0,
            Orientation::Y,
            [0.0, 0.0],
            BoundaryCondition::Vacuum,
        )
        .unwrap_err();
        assert!(matches!(err, GeometryError::DegenerateSurface(_)));
    }

    #[test]
    fn pin_materials_follow_ring_order() {
        let model = PinAssembly::default().build().unwrap();
        assert_eq!(model.num_pins(), 37);
        assert_eq!(model.fuel(HexIndex::new(0, 0)), Some(MaterialId(1)));
        assert_eq!(model.fuel(HexIndex::new(3, 0)), Some(MaterialId(37)));
        assert_eq!(model.fuel(HexIndex::new(3, 1)), None);
        assert_relative_eq!(model.edge_length, 4.0 * 1.26, epsilon = 1e-12);
    }

    #[test]
    fn oversized_pin_is_rejected() {
        let assembly = PinAssembly {
            pin_radius: 0.7,
            ..Default::default()
        };
        assert!(matches!(
            assembly.build(),
            Err(GeometryError::MalformedLattice(_))
        ));
    }
}

/// Adds the six side planes of an infinite hexagonal prism and returns the
/// region inside them.
///
/// `orientation` matches the lattice the prism is meant to enclose: for `Y`
/// two flat sides are parallel to the y-axis, for `X` two are parallel to the
/// x-axis.
pub fn hexagonal_prism(
    builder: &mut GeometryBuilder,
    edge_length: f64,
    orientation: Orientation,
    center: [f64; 2],
    boundary: BoundaryCondition,
) -> Result<Region> {
    if !(edge_length.is_finite() && edge_length > 0.0) {
        return Err(GeometryError::DegenerateSurface(format!(
            "hexagonal prism edge length must be positive, got {}",
            edge_length
        )));
    }
    let apothem = edge_length * 3.0_f64.sqrt() / 2.0;
    let offset = match orientation {
        Orientation::Y => 0.0,
        Orientation::X => 30.0,
    };
    let center = Vector2::new(center[0], center[1]);

    let mut region = Region::everywhere();
    for k in 0..6 {
        let angle = (offset + 60.0 * k as f64).to_radians();
        let normal = Vector2::new(angle.cos(), angle.sin());
        let surface = Surface::new(SurfaceKind::Plane {
            a: normal.x,
            b: normal.y,
            c: 0.0,
            d: normal.dot(&center) + apothem,
        })?
        .with_boundary(boundary);
        region = region & Region::negative(builder.add_surface(surface));
    }
    Ok(region)
}

/// Parameters of a single hexagonal assembly of cylindrical fuel pins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinAssembly {
    pub num_rings: usize,
    pub orientation: Orientation,
    pub pitch: f64,
    pub pin_radius: f64,
    /// Condition on the prism walls.
    pub boundary: BoundaryCondition,
}

impl Default for PinAssembly {
    fn default() -> Self {
        Self {
            num_rings: 4,
            orientation: Orientation::Y,
            pitch: 1.26,
            pin_radius: 0.41,
            boundary: BoundaryCondition::Vacuum,
        }
    }
}

/// A built [`PinAssembly`] and the handles needed to interpret queries.
#[derive(Debug)]
pub struct PinAssemblyModel {
    pub geometry: Geometry,
    pub lattice: LatticeId,
    pub moderator: MaterialId,
    pub edge_length: f64,
    fuels: Vec<Vec<MaterialId>>,
}

impl PinAssemblyModel {
    /// Fuel material of the pin at an external lattice index.
    pub fn fuel(&self, index: HexIndex) -> Option<MaterialId> {
        self.fuels.get(index.ring)?.get(index.position).copied()
    }

    pub fn num_pins(&self) -> usize {
        self.fuels.iter().map(Vec::len).sum()
    }
}

impl PinAssembly {
    pub const MODERATOR: MaterialId = MaterialId(0);

    /// Builds the model. Pins get fuel materials `1..=n` in external
    /// `(ring, position)` order; the moderator is material 0.
    pub fn build(&self) -> Result<PinAssemblyModel> {
        if self.num_rings == 0 {
            return Err(GeometryError::MalformedLattice(
                "an assembly needs at least one ring".to_string(),
            ));
        }
        if self.pin_radius >= 0.5 * self.pitch {
            return Err(GeometryError::MalformedLattice(format!(
                "pin radius {} does not fit in pitch {}",
                self.pin_radius, self.pitch
            )));
        }

        let mut builder = GeometryBuilder::new();
        let clad = builder.surface(SurfaceKind::ZCylinder {
            x0: 0.0,
            y0: 0.0,
            r: self.pin_radius,
        })?;

        let mut next_material = 1;
        let mut fuels = Vec::with_capacity(self.num_rings);
        let mut rings = Vec::with_capacity(self.num_rings);
        for ring in 0..self.num_rings {
            let size = ring_size(self.num_rings, ring);
            let mut ring_fuels = Vec::with_capacity(size);
            let mut ring_universes = Vec::with_capacity(size);
            for _ in 0..size {
                let fuel = MaterialId(next_material);
                next_material += 1;
                let inside = builder.add_cell(Cell::new(Region::negative(clad), Fill::material(fuel)))?;
                let outside = builder.add_cell(Cell::new(
                    Region::positive(clad),
                    Fill::material(Self::MODERATOR),
                ))?;
                ring_universes.push(builder.add_universe(Universe::new(vec![inside, outside]))?);
                ring_fuels.push(fuel);
            }
            fuels.push(ring_fuels);
            rings.push(ring_universes);
        }

        let water = builder.add_cell(
            Cell::new(Region::everywhere(), Fill::material(Self::MODERATOR)).named("moderator"),
        )?;
        let outer = builder.add_universe(Universe::new(vec![water]).named("moderator"))?;
        let lattice = builder.add_lattice(HexLattice::new(
            HexLatticeSpec::planar([0.0, 0.0], self.pitch, self.orientation, rings)
                .with_outer(outer)
                .named("assembly"),
        )?)?;

        let edge_length = self.num_rings as f64 * self.pitch;
        let inside = hexagonal_prism(
            &mut builder,
            edge_length,
            self.orientation,
            [0.0, 0.0],
            self.boundary,
        )?;
        let holder = builder.add_cell(Cell::new(inside, Fill::Lattice(lattice)).named("assembly"))?;
        let root = builder.add_universe(Universe::new(vec![holder]).named("root"))?;

        debug!(
            "pin assembly: {} rings, orientation {}, pitch {}, {} pins",
            self.num_rings,
            self.orientation,
            self.pitch,
            next_material - 1
        );
        Ok(PinAssemblyModel {
            geometry: builder.build(root)?,
            lattice,
            moderator: Self::MODERATOR,
            edge_length,
            fuels,
        })
    }
}
