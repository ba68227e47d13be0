//! Regular lattices that map points to nested universes.
//!
//! A lattice tiles its local frame with identical elements. Each element is
//! either bound explicitly to a universe or falls back to the lattice's
//! `outer` universe. The resolver only talks to lattices through the
//! [`Lattice`] trait; [`HexLattice`] is the hexagonal implementation, in 2D or
//! stacked axially into 3D.

use std::fmt;

use nalgebra::{Point3, Vector2, Vector3};

use crate::error::{GeometryError, Result};
use crate::geometry::{LatticeId, UniverseId};
use crate::hex::{self, Axial, HexIndex, Orientation, DIRECTIONS};


/// Address of one lattice element. For hexagonal lattices `(i, j)` is the
/// axial coordinate and `k` the axial layer (always 0 in 2D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LatticeCoord {
    pub i: i32,
    pub j: i32,
    pub k: i32,
}

impl LatticeCoord {
    pub fn planar(axial: Axial) -> Self {
        Self {
            i: axial.a,
            j: axial.b,
            k: 0,
        }
    }

    pub fn axial(&self) -> Axial {
        Axial::new(self.i, self.j)
    }
}

impl fmt::Display for LatticeCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.i, self.j, self.k)
    }
}

/// A regular tiling of space into universe-filled elements.
///
/// Points passed to these methods are in the lattice's own frame, i.e. the
/// frame of the cell the lattice fills.
pub trait Lattice: fmt::Debug + Send + Sync {
    fn name(&self) -> Option<&str>;

    /// Default universe for elements without an explicit binding.
    fn outer(&self) -> Option<UniverseId>;

    /// The element containing `p`, populated or not.
    fn element_of(&self, p: &Point3<f64>) -> LatticeCoord;

    /// The universe explicitly bound to an element, if any.
    fn element_universe(&self, coord: LatticeCoord) -> Option<UniverseId>;

    /// Centre of an element in the lattice frame. Element-local points are
    /// measured from here.
    fn element_origin(&self, coord: LatticeCoord) -> Point3<f64>;

    /// Distance from an element-local point along `d` to the element's
    /// boundary, and the element entered there.
    fn distance_to_element_boundary(
        &self,
        coord: LatticeCoord,
        local: &Point3<f64>,
        d: &Vector3<f64>,
    ) -> (f64, LatticeCoord);

    /// Every universe the lattice refers to, including `outer`.
    fn universes(&self) -> Vec<UniverseId>;

    /// Universe filling an element: the explicit binding, else `outer`.
    fn universe_at(
        &self,
        lattice: LatticeId,
        coord: LatticeCoord,
        p: &Point3<f64>,
    ) -> Result<UniverseId> {
        self.element_universe(coord)
            .or(self.outer())
            .ok_or(GeometryError::UnboundedLattice { lattice, point: *p })
    }
}

/// Universes of a hexagonal lattice, rings listed outermost first.
#[derive(Debug, Clone, PartialEq)]
pub enum LatticeUniverses {
    /// One ring list for a lattice infinite in z.
    Planar(Vec<Vec<UniverseId>>),
    /// One ring list per axial layer, bottom layer first.
    Stacked(Vec<Vec<Vec<UniverseId>>>),
}

/// Unvalidated description of a hexagonal lattice.
///
/// `center` holds two values for a planar lattice and three for a stacked
/// one; `pitch` holds the radial pitch, followed by the axial pitch when
/// stacked.
#[derive(Debug, Clone, PartialEq)]
pub struct HexLatticeSpec {
    pub name: Option<String>,
    pub center: Vec<f64>,
    pub pitch: Vec<f64>,
    pub orientation: Option<Orientation>,
    pub outer: Option<UniverseId>,
    pub universes: LatticeUniverses,
}

impl HexLatticeSpec {
    pub fn planar(
        center: [f64; 2],
        pitch: f64,
        orientation: Orientation,
        rings: Vec<Vec<UniverseId>>,
    ) -> Self {
        Self {
            name: None,
            center: center.to_vec(),
            pitch: vec![pitch],
            orientation: Some(orientation),
            outer: None,
            universes: LatticeUniverses::Planar(rings),
        }
    }

    pub fn with_outer(mut self, outer: UniverseId) -> Self {
        self.outer = Some(outer);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Number of universes ring `ring` (outermost = 0) of a `num_rings` lattice holds.
pub fn ring_size(num_rings: usize, ring: usize) -> usize {
    let distance = num_rings - 1 - ring;
    if distance == 0 {
        1
    } else {
        6 * distance
    }
}

/// A hexagonal lattice.
///
/// Elements are stored densely by axial coordinate, so changing the
/// orientation only changes the Cartesian embedding and the external
/// `(ring, position)` enumeration, never which universe sits at which axial
/// address.
#[derive(Debug, Clone, PartialEq)]
pub struct HexLattice {
    name: Option<String>,
    center: Point3<f64>,
    pitch: f64,
    axial_pitch: Option<f64>,
    orientation: Orientation,
    num_rings: usize,
    num_axial: usize,
    outer: Option<UniverseId>,
    elements: Vec<Option<UniverseId>>,
}

impl HexLattice {
    pub fn new(spec: HexLatticeSpec) -> Result<Self> {
        let orientation = spec.orientation.ok_or_else(|| {
            GeometryError::MalformedLattice("orientation is not set".to_string())
        })?;

        let layers = match spec.universes {
            LatticeUniverses::Planar(rings) => {
                if spec.pitch.len() != 1 || spec.center.len() != 2 {
                    return Err(GeometryError::MalformedLattice(format!(
                        "a planar lattice needs 1 pitch and 2 centre values, got {} and {}",
                        spec.pitch.len(),
                        spec.center.len()
                    )));
                }
                vec![rings]
            }
            LatticeUniverses::Stacked(layers) => {
                if spec.pitch.len() != 2 || spec.center.len() != 3 {
                    return Err(GeometryError::MalformedLattice(format!(
                        "a stacked lattice needs 2 pitch and 3 centre values, got {} and {}",
                        spec.pitch.len(),
                        spec.center.len()
                    )));
                }
                if layers.is_empty() {
                    return Err(GeometryError::MalformedLattice(
                        "a stacked lattice needs at least one axial layer".to_string(),
                    ));
                }
                layers
            }
        };
        if let Some(bad) = spec.pitch.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
            return Err(GeometryError::MalformedLattice(format!(
                "pitch must be positive, got {}",
                bad
            )));
        }
        if spec.center.iter().any(|c| !c.is_finite()) {
            return Err(GeometryError::MalformedLattice(format!(
                "centre {:?} is not finite",
                spec.center
            )));
        }

        let num_rings = layers[0].len();
        for (layer, rings) in layers.iter().enumerate() {
            validate_rings(rings, num_rings, layer)?;
        }

        let mut lattice = Self {
            name: spec.name,
            center: Point3::new(
                spec.center[0],
                spec.center[1],
                spec.center.get(2).copied().unwrap_or(0.0),
            ),
            pitch: spec.pitch[0],
            axial_pitch: spec.pitch.get(1).copied(),
            orientation,
            num_rings,
            num_axial: layers.len(),
            outer: spec.outer,
            elements: Vec::new(),
        };
        lattice.elements = vec![None; lattice.side() * lattice.side() * lattice.num_axial];
        for (layer, rings) in layers.into_iter().enumerate() {
            for (ring, members) in rings.into_iter().enumerate() {
                let distance = num_rings - 1 - ring;
                for (axial, universe) in hex::ring_walk(distance, orientation).zip(members) {
                    let slot = lattice.slot(axial, layer);
                    lattice.elements[slot] = Some(universe);
                }
            }
        }
        Ok(lattice)
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn num_rings(&self) -> usize {
        self.num_rings
    }

    pub fn num_axial(&self) -> usize {
        self.num_axial
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn axial_pitch(&self) -> Option<f64> {
        self.axial_pitch
    }

    pub fn center(&self) -> Point3<f64> {
        self.center
    }

    /// Same axial population and frame, different orientation.
    pub fn reoriented(&self, orientation: Orientation) -> Self {
        Self {
            orientation,
            ..self.clone()
        }
    }

    fn side(&self) -> usize {
        2 * self.num_rings - 1
    }

    fn slot(&self, axial: Axial, layer: usize) -> usize {
        let n = self.num_rings as i32 - 1;
        let side = self.side();
        layer * side * side + (axial.a + n) as usize * side + (axial.b + n) as usize
    }

    fn in_rings(&self, axial: Axial) -> bool {
        axial.distance() < self.num_rings
    }

    /// External index of an axial address, if it lies within the rings.
    pub fn hex_index(&self, axial: Axial) -> Option<HexIndex> {
        if !self.in_rings(axial) {
            return None;
        }
        let (distance, position) = hex::ring_position(axial, self.orientation);
        Some(HexIndex::new(self.num_rings - 1 - distance, position))
    }

    /// Axial address of an external index, if the index exists.
    pub fn axial_of(&self, index: HexIndex) -> Option<Axial> {
        if index.ring >= self.num_rings {
            return None;
        }
        let distance = self.num_rings - 1 - index.ring;
        hex::ring_walk(distance, self.orientation).nth(index.position)
    }

    pub fn universe(&self, index: HexIndex, layer: usize) -> Option<UniverseId> {
        if layer >= self.num_axial {
            return None;
        }
        self.axial_of(index)
            .and_then(|axial| self.elements[self.slot(axial, layer)])
    }

    /// The ring lists of one axial layer in external order, outermost first.
    pub fn rings(&self, layer: usize) -> Vec<Vec<UniverseId>> {
        (0..self.num_rings)
            .map(|ring| {
                let distance = self.num_rings - 1 - ring;
                hex::ring_walk(distance, self.orientation)
                    .filter_map(|axial| self.elements[self.slot(axial, layer)])
                    .collect()
            })
            .collect()
    }
}

fn validate_rings(rings: &[Vec<UniverseId>], num_rings: usize, layer: usize) -> Result<()> {
    if rings.is_empty() {
        return Err(GeometryError::MalformedLattice(
            "a hexagonal lattice needs at least one ring".to_string(),
        ));
    }
    if rings.len() != num_rings {
        return Err(GeometryError::MalformedLattice(format!(
            "axial layer {} has {} rings, the first layer has {}",
            layer,
            rings.len(),
            num_rings
        )));
    }
    for (ring, members) in rings.iter().enumerate() {
        let expected = ring_size(num_rings, ring);
        if members.len() != expected {
            return Err(GeometryError::MalformedLattice(format!(
                "ring {} of layer {} holds {} universes, expected {}",
                ring,
                layer,
                members.len(),
                expected
            )));
        }
    }
    Ok(())
}

impl Lattice for HexLattice {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn outer(&self) -> Option<UniverseId> {
        self.outer
    }

    fn element_of(&self, p: &Point3<f64>) -> LatticeCoord {
        let v = p - self.center;
        let axial = self
            .orientation
            .nearest_axial(Vector2::new(v.x, v.y), self.pitch);
        let k = match self.axial_pitch {
            Some(pz) => hex::to_index((v.z / pz + 0.5 * self.num_axial as f64).floor()),
            None => 0,
        };
        LatticeCoord {
            i: axial.a,
            j: axial.b,
            k,
        }
    }

    fn element_universe(&self, coord: LatticeCoord) -> Option<UniverseId> {
        let axial = coord.axial();
        if coord.k < 0 || coord.k as usize >= self.num_axial || !self.in_rings(axial) {
            return None;
        }
        self.elements[self.slot(axial, coord.k as usize)]
    }

    fn element_origin(&self, coord: LatticeCoord) -> Point3<f64> {
        let offset = self.orientation.to_cartesian(coord.axial(), self.pitch);
        let z = match self.axial_pitch {
            Some(pz) => self.center.z + (coord.k as f64 + 0.5 - 0.5 * self.num_axial as f64) * pz,
            None => 0.0,
        };
        Point3::new(self.center.x + offset.x, self.center.y + offset.y, z)
    }

    fn distance_to_element_boundary(
        &self,
        coord: LatticeCoord,
        local: &Point3<f64>,
        d: &Vector3<f64>,
    ) -> (f64, LatticeCoord) {
        let mut nearest = (f64::INFINITY, coord);
        for (k, step) in DIRECTIONS.iter().enumerate() {
            let n = self.orientation.face_normal(k);
            let projection = n.x * d.x + n.y * d.y;
            if projection <= 0.0 {
                continue;
            }
            let t = ((0.5 * self.pitch - (n.x * local.x + n.y * local.y)) / projection).max(0.0);
            if t < nearest.0 {
                let next = coord.axial() + *step;
                nearest = (
                    t,
                    LatticeCoord {
                        i: next.a,
                        j: next.b,
                        k: coord.k,
                    },
                );
            }
        }
        if let Some(pz) = self.axial_pitch {
            if d.z != 0.0 {
                let (face, dk) = if d.z > 0.0 { (0.5 * pz, 1) } else { (-0.5 * pz, -1) };
                let t = ((face - local.z) / d.z).max(0.0);
                if t < nearest.0 {
                    nearest = (t, LatticeCoord { k: coord.k + dk, ..coord });
                }
            }
        }
        nearest
    }

    fn universes(&self) -> Vec<UniverseId> {
        let mut ids: Vec<UniverseId> = self.elements.iter().flatten().copied().collect();
        ids.extend(self.outer);
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
