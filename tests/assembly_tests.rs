use approx::assert_relative_eq;
use hexgeom::{
    assembly::PinAssembly,
    cell::{Cell, Fill, Universe},
    hex::{self, HexIndex, Orientation},
    lattice::LatticeCoord,
    region::Region,
    resolver::OverlapPolicy,
    scan::{self, Grid, Tally},
    surface::{BoundaryCondition, SurfaceKind},
    GeometryBuilder, GeometryError, MaterialId, Occupant, ResolverOptions,
};
use nalgebra::{Point3, Vector3};

fn assembly(orientation: Orientation) -> PinAssembly {
    PinAssembly {
        orientation,
        ..Default::default()
    }
}

#[test]
fn every_pin_centre_holds_its_fuel() {
    for orientation in [Orientation::X, Orientation::Y] {
        let config = assembly(orientation);
        let model = config.build().unwrap();
        let resolver = model.geometry.resolver(ResolverOptions::default());
        let mut pins = 0;
        for ring in 0..config.num_rings {
            let distance = config.num_rings - 1 - ring;
            for (position, axial) in hex::ring_walk(distance, orientation).enumerate() {
                let c = orientation.to_cartesian(axial, config.pitch);
                let location = resolver.locate(&Point3::new(c.x, c.y, 1.5)).unwrap();
                assert_eq!(
                    location.material(),
                    model.fuel(HexIndex::new(ring, position)),
                    "pin ({}, {}) under {}",
                    ring,
                    position,
                    orientation
                );
                assert!(location.overlaps.is_empty());
                pins += 1;
            }
        }
        assert_eq!(pins, 18 + 12 + 6 + 1);
    }
}

#[test]
fn centre_and_beyond() {
    let model = PinAssembly::default().build().unwrap();
    let resolver = model.geometry.resolver(ResolverOptions::default());

    let centre = resolver.locate(&Point3::origin()).unwrap();
    assert_eq!(centre.material(), model.fuel(HexIndex::new(3, 0)));
    assert_eq!(centre.path.len(), 2);
    assert_eq!(
        centre.path[0].element.map(|e| e.coord),
        Some(LatticeCoord { i: 0, j: 0, k: 0 })
    );

    // between the outer ring and the prism wall
    let gap = resolver.locate(&Point3::new(4.2, 0.0, 0.0)).unwrap();
    assert_eq!(gap.material(), Some(model.moderator));

    let beyond = resolver.locate(&Point3::new(10.0, 0.0, 0.0)).unwrap();
    match beyond.occupant {
        Occupant::Outside { boundary, .. } => assert_eq!(boundary, BoundaryCondition::Vacuum),
        other => panic!("expected a point outside the assembly, got {:?}", other),
    }
    assert!(matches!(
        resolver.distance_to_next_boundary(&Point3::new(10.0, 0.0, 0.0), &Vector3::x()),
        Err(GeometryError::OutsideGeometry { .. })
    ));
}

#[test]
fn single_ring_assembly() {
    let model = PinAssembly {
        num_rings: 1,
        ..Default::default()
    }
    .build()
    .unwrap();
    assert_eq!(model.num_pins(), 1);
    let resolver = model.geometry.resolver(ResolverOptions::default());
    assert_eq!(
        resolver.locate(&Point3::new(0.1, 0.1, 0.0)).unwrap().material(),
        Some(MaterialId(1))
    );
}

#[test]
fn distances_through_the_assembly() {
    let model = PinAssembly::default().build().unwrap();
    let resolver = model.geometry.resolver(ResolverOptions::default());
    let config = PinAssembly::default();

    // out of the centre pin
    let boundary = resolver
        .distance_to_next_boundary(&Point3::origin(), &Vector3::x())
        .unwrap();
    assert_relative_eq!(boundary.distance, config.pin_radius, epsilon = 1e-12);
    assert_eq!(boundary.level, 1);
    assert!(boundary.surface.is_some());

    // moderator of the centre element, heading for the flat top face
    let boundary = resolver
        .distance_to_next_boundary(&Point3::new(0.0, 0.5, 0.0), &Vector3::y())
        .unwrap();
    assert_relative_eq!(boundary.distance, 0.5 * config.pitch - 0.5, epsilon = 1e-12);
    assert_eq!(boundary.surface, None);
    assert_eq!(boundary.level, 0);
    assert_eq!(
        boundary.lattice_neighbor,
        Some(LatticeCoord { i: 1, j: 0, k: 0 })
    );

    // last stretch to the vacuum wall
    let apothem = model.edge_length * 3.0_f64.sqrt() / 2.0;
    let boundary = resolver
        .distance_to_next_boundary(&Point3::new(4.2, 0.0, 0.0), &Vector3::x())
        .unwrap();
    assert_relative_eq!(boundary.distance, apothem - 4.2, epsilon = 1e-9);
    assert_eq!(boundary.boundary_condition, BoundaryCondition::Vacuum);
    assert!(boundary.is_model_boundary());
}

#[test]
fn rays_walk_boundary_to_boundary() {
    let model = PinAssembly::default().build().unwrap();
    let resolver = model.geometry.resolver(ResolverOptions::default());
    let d = Vector3::new(1.0, 0.3, 0.0).normalize();
    let origin = Point3::new(0.05, 0.0, 0.0);

    let mut travelled = 0.0;
    let mut segments = 0;
    loop {
        let p = origin + d * (travelled + 1e-8);
        let boundary = resolver.distance_to_next_boundary(&p, &d).unwrap();
        assert!(boundary.distance > 0.0);
        travelled += boundary.distance + 1e-8;
        segments += 1;
        if boundary.is_model_boundary() {
            break;
        }
        assert!(segments < 100, "ray never reached the assembly wall");
    }
    // the ray crossed pins and element faces on its way out
    assert!(segments > 3);
    assert!(resolver.locate(&(origin + d * (travelled + 1e-6))).unwrap().is_outside());
}

#[test]
fn overlap_policy_changes_only_ambiguous_points() {
    let mut builder = GeometryBuilder::new();
    let ball = builder
        .surface(SurfaceKind::Sphere {
            x0: 0.0,
            y0: 0.0,
            z0: 0.0,
            r: 1.0,
        })
        .unwrap();
    let wall = builder.surface(SurfaceKind::XPlane { x0: 0.5 }).unwrap();
    let core = builder
        .add_cell(Cell::new(Region::negative(ball), Fill::material(MaterialId(1))))
        .unwrap();
    let left = builder
        .add_cell(Cell::new(Region::negative(wall), Fill::material(MaterialId(2))))
        .unwrap();
    let right = builder
        .add_cell(Cell::new(Region::positive(wall), Fill::void()))
        .unwrap();
    let root = builder
        .add_universe(Universe::new(vec![core, left, right]))
        .unwrap();
    let geometry = builder.build(root).unwrap();

    let options = |overlap_policy| ResolverOptions {
        overlap_policy,
        ..Default::default()
    };
    let p = Point3::new(0.0, 0.0, 0.0);
    let q = Point3::new(0.0, 3.0, 0.0);

    let warn = geometry.resolver(options(OverlapPolicy::Warn));
    assert_eq!(warn.locate(&p).unwrap().overlaps[0].cells, vec![core, left]);
    assert!(warn.locate(&q).unwrap().overlaps.is_empty());

    let reject = geometry.resolver(options(OverlapPolicy::Reject));
    assert!(matches!(
        reject.locate(&p),
        Err(GeometryError::AmbiguousRegion { .. })
    ));
    assert_eq!(reject.locate(&q).unwrap().material(), Some(MaterialId(2)));
    assert_eq!(
        reject.locate(&Point3::new(2.0, 0.0, 0.0)).unwrap().occupant,
        Occupant::Void
    );

    let grid = Grid {
        resolution: 16,
        half_width: 2.0,
        z: 0.0,
    };
    let reports = scan::audit_overlaps(&reject, &grid);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].cells, vec![core, left]);
    assert_eq!(reports[1].cells, vec![core, right]);
}

#[test]
fn census_counts_every_sample() {
    let model = PinAssembly::default().build().unwrap();
    let resolver = model.geometry.resolver(ResolverOptions::default());
    let grid = Grid {
        resolution: 40,
        half_width: 6.0,
        z: 0.0,
    };
    let census = scan::census(&resolver, &grid, false);
    assert_eq!(census.samples(), 1600);
    assert_eq!(census.overlaps, 0);

    // the prism holds 6 equilateral triangles of side edge_length
    let prism_area = 1.5 * 3.0_f64.sqrt() * model.edge_length.powi(2);
    let inside = census.samples() - census.count(Tally::Outside);
    let estimate = inside as f64 * census.cell_area;
    assert_relative_eq!(estimate, prism_area, max_relative = 0.05);
}

#[test]
fn batch_location_in_parallel() {
    let model = PinAssembly::default().build().unwrap();
    let resolver = model.geometry.resolver(ResolverOptions::default());
    let points: Vec<Point3<f64>> = (0..500)
        .map(|i| {
            let t = i as f64 * 0.01;
            Point3::new(5.0 * t.cos() * (t / 5.0), 5.0 * t.sin() * (t / 5.0), 0.0)
        })
        .collect();
    let serial: Vec<_> = points.iter().map(|p| resolver.locate(p)).collect();
    assert_eq!(resolver.locate_many(&points), serial);
}
