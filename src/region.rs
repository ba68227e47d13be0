//! Boolean regions over surface half-spaces.
//!
//! A [`Region`] is an immutable expression tree whose leaves are half-spaces
//! and whose interior nodes are complement, intersection and union. Leaves
//! refer to surfaces by [`SurfaceId`], so every query takes the surface arena
//! of the owning geometry.
//!
//! # Distance to boundary
//!
//! Crossing a surface only ends a region when it changes the region's overall
//! membership: inside a union, leaving one member while still inside another
//! is not a boundary. [`Region::distance_to_boundary`] therefore collects every
//! ray intersection of every leaf surface, walks them in order and tests the
//! membership of the open interval after each group of (near) simultaneous
//! crossings against the membership the ray started with.

use std::ops::{BitAnd, BitOr, Not};

use nalgebra::{Point3, Vector3};

use crate::geometry::SurfaceId;
use crate::surface::{BoundaryCondition, Sense, Surface};

#[cfg(test)]
mod tests {

    use super::*;
    use crate::surface::SurfaceKind;
    use approx::assert_relative_eq;

    fn arena(kinds: &[SurfaceKind]) -> Vec<Surface> {
        kinds.iter().map(|k| Surface::new(*k).unwrap()).collect()
    }

    fn slab() -> (Vec<Surface>, Region) {
        let surfaces = arena(&[
            SurfaceKind::XPlane { x0: -1.0 },
            SurfaceKind::XPlane { x0: 1.0 },
        ]);
        let region = Region::positive(SurfaceId(0)) & Region::negative(SurfaceId(1));
        (surfaces, region)
    }

    #[test]
    fn intersection_membership() {
        let (surfaces, region) = slab();
        assert!(region.contains(&Point3::new(0.0, 4.0, 4.0), &surfaces));
        assert!(!region.contains(&Point3::new(1.5, 0.0, 0.0), &surfaces));
        // the surface itself belongs to the negative side
        assert!(region.contains(&Point3::new(1.0, 0.0, 0.0), &surfaces));
        assert!(!region.contains(&Point3::new(-1.0, 0.0, 0.0), &surfaces));
    }

    #[test]
    fn complement_and_union() {
        let (surfaces, slab) = slab();
        let outside = !slab.clone();
        assert!(outside.contains(&Point3::new(3.0, 0.0, 0.0), &surfaces));
        assert!(!outside.contains(&Point3::new(0.0, 0.0, 0.0), &surfaces));
        assert_eq!(!outside, slab);

        let either = Region::negative(SurfaceId(0)) | Region::positive(SurfaceId(1));
        assert!(either.contains(&Point3::new(-2.0, 0.0, 0.0), &surfaces));
        assert!(either.contains(&Point3::new(2.0, 0.0, 0.0), &surfaces));
        assert!(!either.contains(&Point3::new(0.0, 0.0, 0.0), &surfaces));
    }

    #[test]
    fn operators_flatten() {
        let a = Region::negative(SurfaceId(0));
        let b = Region::negative(SurfaceId(1));
        let c = Region::negative(SurfaceId(2));
        match a & b & c {
            Region::Intersection(children) => assert_eq!(children.len(), 3),
            other => panic!("unexpected region {:?}", other),
        }
    }

    #[test]
    fn empty_combinators() {
        let surfaces: Vec<Surface> = vec![];
        let p = Point3::origin();
        assert!(Region::everywhere().contains(&p, &surfaces));
        assert!(!Region::Union(vec![]).contains(&p, &surfaces));
    }

    #[test]
    fn distance_out_of_slab() {
        let (surfaces, region) = slab();
        let crossing = region
            .distance_to_boundary(
                &Point3::new(0.25, 0.0, 0.0),
                &Vector3::x(),
                &surfaces,
                &Tolerance::default(),
            )
            .unwrap();
        assert_relative_eq!(crossing.distance, 0.75, epsilon = 1e-12);
        assert_eq!(crossing.surface, SurfaceId(1));
    }

    #[test]
    fn distance_into_region_from_outside() {
        let (surfaces, region) = slab();
        let crossing = region
            .distance_to_boundary(
                &Point3::new(-4.0, 0.0, 0.0),
                &Vector3::x(),
                &surfaces,
                &Tolerance::default(),
            )
            .unwrap();
        assert_relative_eq!(crossing.distance, 3.0, epsilon = 1e-12);
        assert_eq!(crossing.surface, SurfaceId(0));
    }

    #[test]
    fn union_skips_interior_surfaces() {
        // two overlapping disks; the first crossing of the right disk is
        // inside the left one and does not end the union
        let surfaces = arena(&[
            SurfaceKind::ZCylinder {
                x0: 0.0,
                y0: 0.0,
                r: 1.0,
            },
            SurfaceKind::ZCylinder {
                x0: 1.5,
                y0: 0.0,
                r: 1.0,
            },
        ]);
        let region = Region::negative(SurfaceId(0)) | Region::negative(SurfaceId(1));
        let crossing = region
            .distance_to_boundary(
                &Point3::origin(),
                &Vector3::x(),
                &surfaces,
                &Tolerance::default(),
            )
            .unwrap();
        assert_relative_eq!(crossing.distance, 2.5, epsilon = 1e-12);
        assert_eq!(crossing.surface, SurfaceId(1));
    }

    #[test]
    fn simultaneous_crossings_prefer_declaration_order() {
        // both planes pass through x = 1; leaving through the corner
        let surfaces = arena(&[
            SurfaceKind::XPlane { x0: 1.0 },
            SurfaceKind::Plane {
                a: 1.0,
                b: 0.0,
                c: 0.0,
                d: 1.0,
            },
        ]);
        let region = Region::negative(SurfaceId(1)) & Region::negative(SurfaceId(0));
        let crossing = region
            .distance_to_boundary(
                &Point3::origin(),
                &Vector3::x(),
                &surfaces,
                &Tolerance::default(),
            )
            .unwrap();
        assert_relative_eq!(crossing.distance, 1.0, epsilon = 1e-12);
        assert_eq!(crossing.surface, SurfaceId(0));
    }

    #[test]
    fn unbounded_direction_has_no_crossing() {
        let (surfaces, region) = slab();
        let crossing = region.distance_to_boundary(
            &Point3::origin(),
            &Vector3::y(),
            &surfaces,
            &Tolerance::default(),
        );
        assert!(crossing.is_none());
    }

    #[test]
    fn starting_on_surface_moving_out() {
        let (surfaces, region) = slab();
        // on the right face heading right: the ray is outside immediately and
        // never comes back
        let crossing = region.distance_to_boundary(
            &Point3::new(1.0, 0.0, 0.0),
            &Vector3::x(),
            &surfaces,
            &Tolerance::default(),
        );
        assert!(crossing.is_none());

        // on the right face heading left: the far face is the boundary
        let crossing = region
            .distance_to_boundary(
                &Point3::new(1.0, 0.0, 0.0),
                &-Vector3::x(),
                &surfaces,
                &Tolerance::default(),
            )
            .unwrap();
        assert_relative_eq!(crossing.distance, 2.0, epsilon = 1e-12);
        assert_eq!(crossing.surface, SurfaceId(0));
    }

    #[test]
    fn boundary_violation_reports_tag() {
        let surfaces = vec![
            Surface::new(SurfaceKind::Sphere {
                x0: 0.0,
                y0: 0.0,
                z0: 0.0,
                r: 5.0,
            })
            .unwrap()
            .with_boundary(BoundaryCondition::Vacuum),
        ];
        let region = Region::negative(SurfaceId(0));
        assert_eq!(
            region.boundary_violation(&Point3::new(6.0, 0.0, 0.0), &surfaces),
            Some((SurfaceId(0), BoundaryCondition::Vacuum))
        );
        assert_eq!(region.boundary_violation(&Point3::origin(), &surfaces), None);
    }
}

/// Numerical tolerances used by ray queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Intersections at or closer than this distance are treated as the
    /// starting point and ignored.
    pub coincidence: f64,
    /// Crossings whose distances differ by less than this are simultaneous.
    pub tie: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            coincidence: 1e-10,
            tie: 1e-9,
        }
    }
}

/// One side of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Halfspace {
    pub surface: SurfaceId,
    pub sense: Sense,
}

impl Halfspace {
    pub fn contains(&self, p: &Point3<f64>, surfaces: &[Surface]) -> bool {
        surfaces[self.surface.index()].sense_of(p) == self.sense
    }
}

/// The nearest membership-changing crossing along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub distance: f64,
    pub surface: SurfaceId,
}

/// Boolean combination of half-spaces.
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    Halfspace(Halfspace),
    Complement(Box<Region>),
    Intersection(Vec<Region>),
    Union(Vec<Region>),
}

impl From<Halfspace> for Region {
    fn from(halfspace: Halfspace) -> Self {
        Region::Halfspace(halfspace)
    }
}

impl Region {
    /// All of space: the empty intersection.
    pub fn everywhere() -> Self {
        Region::Intersection(Vec::new())
    }

    pub fn negative(surface: SurfaceId) -> Self {
        Halfspace {
            surface,
            sense: Sense::Negative,
        }
        .into()
    }

    pub fn positive(surface: SurfaceId) -> Self {
        Halfspace {
            surface,
            sense: Sense::Positive,
        }
        .into()
    }

    /// Point membership, short-circuiting through the tree.
    pub fn contains(&self, p: &Point3<f64>, surfaces: &[Surface]) -> bool {
        self.evaluate(&|id: SurfaceId| surfaces[id.index()].sense_of(p))
    }

    /// Membership given the sense of the query point with respect to each
    /// surface.
    fn evaluate<F: Fn(SurfaceId) -> Sense>(&self, sense: &F) -> bool {
        match self {
            Region::Halfspace(h) => sense(h.surface) == h.sense,
            Region::Complement(inner) => !inner.evaluate(sense),
            Region::Intersection(children) => children.iter().all(|c| c.evaluate(sense)),
            Region::Union(children) => children.iter().any(|c| c.evaluate(sense)),
        }
    }

    /// Leaf half-spaces in tree order.
    pub fn halfspaces(&self) -> Vec<Halfspace> {
        let mut leaves = Vec::new();
        self.collect_halfspaces(&mut leaves);
        leaves
    }

    fn collect_halfspaces(&self, leaves: &mut Vec<Halfspace>) {
        match self {
            Region::Halfspace(h) => leaves.push(*h),
            Region::Complement(inner) => inner.collect_halfspaces(leaves),
            Region::Intersection(children) | Region::Union(children) => {
                for child in children {
                    child.collect_halfspaces(leaves);
                }
            }
        }
    }

    /// Distinct surfaces referenced by the region, in declaration order.
    pub fn surface_ids(&self) -> Vec<SurfaceId> {
        let mut ids: Vec<SurfaceId> = self.halfspaces().iter().map(|h| h.surface).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// First boundary-tagged half-space that `p` lies outside of.
    ///
    /// Used to report why a point escaped the model.
    pub fn boundary_violation(
        &self,
        p: &Point3<f64>,
        surfaces: &[Surface],
    ) -> Option<(SurfaceId, BoundaryCondition)> {
        self.halfspaces().into_iter().find_map(|h| {
            let surface = &surfaces[h.surface.index()];
            if surface.boundary != BoundaryCondition::Transmission && !h.contains(p, surfaces) {
                Some((h.surface, surface.boundary))
            } else {
                None
            }
        })
    }

    /// Nearest distance along `p + t·d` (t > 0) at which the region's
    /// membership changes, with the surface responsible.
    ///
    /// Returns `None` when the membership never changes along the ray.
    pub fn distance_to_boundary(
        &self,
        p: &Point3<f64>,
        d: &Vector3<f64>,
        surfaces: &[Surface],
        tolerance: &Tolerance,
    ) -> Option<Crossing> {
        let min_t = tolerance.coincidence;
        let mut roots: Vec<(f64, SurfaceId)> = self
            .surface_ids()
            .into_iter()
            .flat_map(|id| {
                surfaces[id.index()]
                    .intersections(p, d)
                    .filter(move |t| *t > min_t)
                    .map(move |t| (t, id))
            })
            .collect();
        if roots.is_empty() {
            return None;
        }
        roots.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        // runs of crossings no further apart than the tie tolerance
        let mut groups: Vec<&[(f64, SurfaceId)]> = Vec::new();
        let mut start = 0;
        for i in 1..=roots.len() {
            if i == roots.len() || roots[i].0 - roots[start].0 > tolerance.tie {
                groups.push(&roots[start..i]);
                start = i;
            }
        }

        let at = |t: f64| p + d * t;
        let mut before_t = 0.5 * roots[0].0;
        let inside = self.contains(&at(before_t), surfaces);

        for (i, group) in groups.iter().enumerate() {
            let first = group[0].0;
            let last = group[group.len() - 1].0;
            let after_t = match groups.get(i + 1) {
                Some(next) => 0.5 * (last + next[0].0),
                None => last + last.max(1.0),
            };
            if self.contains(&at(after_t), surfaces) != inside {
                let q = at(before_t);
                let mut candidates: Vec<SurfaceId> = group.iter().map(|(_, id)| *id).collect();
                candidates.sort_unstable();
                candidates.dedup();
                let surface = candidates
                    .iter()
                    .copied()
                    .find(|&crossed| {
                        self.evaluate(&|id: SurfaceId| {
                            let sense = surfaces[id.index()].sense_of(&q);
                            if id == crossed {
                                sense.flipped()
                            } else {
                                sense
                            }
                        }) != inside
                    })
                    .unwrap_or(candidates[0]);
                return Some(Crossing {
                    distance: first,
                    surface,
                });
            }
            before_t = after_t;
        }
        None
    }
}

impl BitAnd for Region {
    type Output = Region;

    fn bitand(self, rhs: Region) -> Region {
        match (self, rhs) {
            (Region::Intersection(mut lhs), Region::Intersection(rhs)) => {
                lhs.extend(rhs);
                Region::Intersection(lhs)
            }
            (Region::Intersection(mut lhs), rhs) => {
                lhs.push(rhs);
                Region::Intersection(lhs)
            }
            (lhs, Region::Intersection(mut rhs)) => {
                rhs.insert(0, lhs);
                Region::Intersection(rhs)
            }
            (lhs, rhs) => Region::Intersection(vec![lhs, rhs]),
        }
    }
}

impl BitOr for Region {
    type Output = Region;

    fn bitor(self, rhs: Region) -> Region {
        match (self, rhs) {
            (Region::Union(mut lhs), Region::Union(rhs)) => {
                lhs.extend(rhs);
                Region::Union(lhs)
            }
            (Region::Union(mut lhs), rhs) => {
                lhs.push(rhs);
                Region::Union(lhs)
            }
            (lhs, Region::Union(mut rhs)) => {
                rhs.insert(0, lhs);
                Region::Union(rhs)
            }
            (lhs, rhs) => Region::Union(vec![lhs, rhs]),
        }
    }
}

impl Not for Region {
    type Output = Region;

    fn not(self) -> Region {
        match self {
            Region::Complement(inner) => *inner,
            other => Region::Complement(Box::new(other)),
        }
    }
}
