//! Hexagonal grid coordinates.
//!
//! Lattice positions are addressed internally by an [`Axial`] pair `(a, b)`.
//! The third cube coordinate `c = -a - b` is implicit. Two further views are
//! derived from the axial address:
//!
//! - the external [`HexIndex`] `(ring, position)`. Rings are counted from
//!   the outside in, ring 0 being the outermost ring of the lattice, and
//!   positions walk each ring clockwise from a start corner that depends on
//!   the orientation;
//! - the Cartesian embedding, `pitch · (a·basis1 + b·basis2)`, whose basis
//!   is rotated by 30° between the two orientations.
//!
//! The six axial unit directions are listed clockwise in [`DIRECTIONS`]. With
//! orientation `y` the first of them points straight up; with orientation `x`
//! the whole embedding is turned 30° clockwise so that the second direction
//! points due east.
//!
//! [`show_indices`] draws the index layout using the same ring walk as point
//! location, so the diagram and the lattice can never disagree.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

use itertools::Itertools;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::error::GeometryError;


const SQRT3_2: f64 = 0.866_025_403_784_438_6;

/// Axial address of a hexagonal cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Axial {
    pub a: i32,
    pub b: i32,
}

/// Axial unit steps, clockwise.
pub const DIRECTIONS: [Axial; 6] = [
    Axial::new(1, 0),
    Axial::new(0, 1),
    Axial::new(-1, 1),
    Axial::new(-1, 0),
    Axial::new(0, -1),
    Axial::new(1, -1),
];

impl Axial {
    pub const ORIGIN: Axial = Axial::new(0, 0);

    pub const fn new(a: i32, b: i32) -> Self {
        Self { a, b }
    }

    /// Number of steps from the origin.
    pub fn distance(&self) -> usize {
        let (a, b) = (i64::from(self.a), i64::from(self.b));
        ((a.abs() + b.abs() + (a + b).abs()) / 2) as usize
    }
}

impl Add for Axial {
    type Output = Axial;

    fn add(self, rhs: Axial) -> Axial {
        Axial::new(self.a + rhs.a, self.b + rhs.b)
    }
}

impl Sub for Axial {
    type Output = Axial;

    fn sub(self, rhs: Axial) -> Axial {
        Axial::new(self.a - rhs.a, self.b - rhs.b)
    }
}

impl Mul<i32> for Axial {
    type Output = Axial;

    fn mul(self, rhs: i32) -> Axial {
        Axial::new(self.a * rhs, self.b * rhs)
    }
}

impl fmt::Display for Axial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.a, self.b)
    }
}

/// Lattice orientation.
///
/// `Y` places two outer sides of the lattice parallel to the y-axis, `X` two
/// outer sides parallel to the x-axis.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    X,
    #[default]
    Y,
}

impl FromStr for Orientation {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x" => Ok(Orientation::X),
            "y" => Ok(Orientation::Y),
            other => Err(GeometryError::MalformedLattice(format!(
                "orientation must be 'x' or 'y', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::X => write!(f, "x"),
            Orientation::Y => write!(f, "y"),
        }
    }
}

impl Orientation {
    /// Index into [`DIRECTIONS`] of the corner where position 0 of every ring lies.
    fn start_direction(self) -> usize {
        match self {
            Orientation::Y => 0,
            Orientation::X => 1,
        }
    }

    /// Cartesian offset of a cell centre from the lattice centre.
    pub fn to_cartesian(self, axial: Axial, pitch: f64) -> Vector2<f64> {
        let (a, b) = (axial.a as f64, axial.b as f64);
        match self {
            Orientation::Y => Vector2::new(b * SQRT3_2, a + 0.5 * b) * pitch,
            Orientation::X => Vector2::new(b + 0.5 * a, a * SQRT3_2) * pitch,
        }
    }

    /// Fractional axial coordinates of a Cartesian offset.
    fn to_fractional(self, v: Vector2<f64>, pitch: f64) -> (f64, f64) {
        let (x, y) = (v.x / pitch, v.y / pitch);
        match self {
            Orientation::Y => {
                let b = x / SQRT3_2;
                (y - 0.5 * b, b)
            }
            Orientation::X => {
                let a = y / SQRT3_2;
                (a, x - 0.5 * a)
            }
        }
    }

    /// Axial address of the cell containing a Cartesian offset.
    pub fn nearest_axial(self, v: Vector2<f64>, pitch: f64) -> Axial {
        let (a, b) = self.to_fractional(v, pitch);
        cube_round(a, b, -a - b)
    }

    /// Unit outward normal of the cell face shared with the neighbour in
    /// direction `DIRECTIONS[k]`.
    pub fn face_normal(self, k: usize) -> Vector2<f64> {
        self.to_cartesian(DIRECTIONS[k % 6], 1.0)
    }
}

/// Rounds fractional cube coordinates to the cell that contains them.
fn cube_round(a: f64, b: f64, c: f64) -> Axial {
    let (mut ra, mut rb, rc) = (a.round(), b.round(), c.round());
    let (da, db, dc) = ((ra - a).abs(), (rb - b).abs(), (rc - c).abs());
    if da > db && da > dc {
        ra = -rb - rc;
    } else if db > dc {
        rb = -ra - rc;
    }
    Axial::new(to_index(ra), to_index(rb))
}

/// Largest magnitude of a computed lattice index. Points further out map to
/// an element on this bound, which lies outside any populated ring.
pub const MAX_INDEX: i32 = 1 << 30;

/// Casts an integral float to an index, clamped to [`MAX_INDEX`]. NaN maps to 0.
pub fn to_index(x: f64) -> i32 {
    let bound = f64::from(MAX_INDEX);
    x.clamp(-bound, bound) as i32
}

/// Cells at hex distance `distance` from the origin, in position order.
///
/// The walk starts at the orientation's start corner and follows the six
/// sides clockwise, `distance` cells per side.
pub fn ring_walk(distance: usize, orientation: Orientation) -> impl Iterator<Item = Axial> {
    let start = orientation.start_direction();
    let d = distance as i32;
    // the centre is a single cell rather than six empty sides
    let (sides, per_side) = if distance == 0 { (1, 1) } else { (6, d) };
    (0..sides).flat_map(move |side| {
        let side_corner = DIRECTIONS[(start + side) % 6] * d;
        let step = DIRECTIONS[(start + side + 2) % 6];
        (0..per_side).map(move |j| side_corner + step * j)
    })
}

/// Inverse of [`ring_walk`]: the distance and position of an axial cell.
pub fn ring_position(axial: Axial, orientation: Orientation) -> (usize, usize) {
    let distance = axial.distance();
    if distance == 0 {
        return (0, 0);
    }
    let start = orientation.start_direction();
    let d = distance as i32;
    for side in 0..6 {
        let side_corner = DIRECTIONS[(start + side) % 6] * d;
        let step = DIRECTIONS[(start + side + 2) % 6];
        let j = (axial - side_corner).distance();
        if j < distance && side_corner + step * j as i32 == axial {
            return (distance, side * distance + j);
        }
    }
    unreachable!("{} lies on ring {} but on none of its sides", axial, distance)
}

/// External `(ring, position)` index of a lattice element. Ring 0 is the
/// outermost ring, ring `num_rings - 1` the centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HexIndex {
    pub ring: usize,
    pub position: usize,
}

impl HexIndex {
    pub fn new(ring: usize, position: usize) -> Self {
        Self { ring, position }
    }
}

impl fmt::Display for HexIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.ring, self.position)
    }
}

/// Text diagram of the `(ring, position)` index of every element of a
/// `num_rings` lattice, laid out at each element's Cartesian slot.
///
/// Orientation `y` gives `4·(num_rings - 1) + 1` rows joined by newlines,
/// orientation `x` gives `2·(num_rings - 1) + 1` rows separated by blank lines.
pub fn show_indices(num_rings: usize, orientation: Orientation) -> String {
    if num_rings == 0 {
        return String::new();
    }
    let n = num_rings as i32 - 1;
    let ring_digits = n.to_string().len();
    let position_digits = (6 * n).to_string().len();
    let width = (ring_digits + position_digits + 3) as i32;

    let mut rows: BTreeMap<i32, Vec<(usize, String)>> = BTreeMap::new();
    for ring in 0..num_rings {
        let distance = num_rings - 1 - ring;
        for (position, axial) in ring_walk(distance, orientation).enumerate() {
            let label = format!(
                "({:>rw$},{:>pw$})",
                ring,
                position,
                rw = ring_digits,
                pw = position_digits
            );
            let (row, column) = match orientation {
                Orientation::Y => (2 * n - (2 * axial.a + axial.b), axial.b + n),
                Orientation::X => (n - axial.a, 2 * axial.b + axial.a + 2 * n),
            };
            rows.entry(row)
                .or_default()
                .push(((column * width) as usize, label));
        }
    }

    let separator = match orientation {
        Orientation::Y => "\n",
        Orientation::X => "\n\n",
    };
    rows.into_values()
        .map(|mut labels| {
            labels.sort();
            let mut line = String::new();
            for (column, label) in labels {
                let pad = column.saturating_sub(line.len());
                line.push_str(&" ".repeat(pad));
                line.push_str(&label);
            }
            line
        })
        .join(separator)
}
