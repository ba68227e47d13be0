use anyhow::{ensure, Context, Result};
use clap::Parser;
use itertools::Itertools;
use nalgebra::{Point3, Vector3};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hexgeom::assembly::PinAssemblyModel;
use hexgeom::hex;
use hexgeom::resolver::{Location, Occupant, Resolver};
use hexgeom::scan::{self, Grid};
use hexgeom::settings::{self, CliArgs, Command, Settings};

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let settings = settings::load_config(&args)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .context("parsing log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if args.show_config {
        println!("{}", toml::to_string_pretty(&settings)?);
    }

    match args.command {
        Command::Indices { rings, orientation } => {
            ensure!(rings > 0, "a lattice needs at least one ring");
            println!("{}", hex::show_indices(rings, orientation));
        }
        Command::Locate { x, y, z, .. } => {
            let model = build_model(&settings)?;
            let resolver = model.geometry.resolver(settings.resolver_options());
            let location = resolver.locate(&Point3::new(x, y, z.unwrap_or(0.0)))?;
            print_location(&model, &location);
        }
        Command::Trace {
            x,
            y,
            z,
            u,
            v,
            w,
            max_segments,
            ..
        } => {
            let model = build_model(&settings)?;
            let resolver = model.geometry.resolver(settings.resolver_options());
            trace(
                &resolver,
                Point3::new(x, y, z),
                Vector3::new(u, v, w),
                max_segments,
            )?;
        }
        Command::Census { no_audit, .. } => {
            let model = build_model(&settings)?;
            let resolver = model.geometry.resolver(settings.resolver_options());
            run_census(&resolver, &settings.census, !no_audit);
        }
    }
    Ok(())
}

fn build_model(settings: &Settings) -> Result<PinAssemblyModel> {
    let model = settings
        .assembly
        .build()
        .context("building pin assembly")?;
    info!(
        "{}-ring assembly, orientation {}, {} pins in a prism of edge {:.4}",
        settings.assembly.num_rings,
        settings.assembly.orientation,
        model.num_pins(),
        model.edge_length
    );
    Ok(model)
}

fn describe(occupant: &Occupant) -> String {
    match occupant {
        Occupant::Material(id) => format!("material {}", id),
        Occupant::Void => "void".to_string(),
        Occupant::Outside { boundary, surface } => {
            format!("outside ({:?} boundary on surface {})", boundary, surface)
        }
    }
}

fn print_location(model: &PinAssemblyModel, location: &Location) {
    println!("{}", describe(&location.occupant));
    if location.material() == Some(model.moderator) {
        println!("  (moderator)");
    }
    if !location.path.is_empty() {
        let path = location
            .path
            .iter()
            .map(|level| match level.element {
                Some(element) => format!(
                    "universe {} / cell {} / element {}",
                    level.universe, level.cell, element.coord
                ),
                None => format!("universe {} / cell {}", level.universe, level.cell),
            })
            .join(" > ");
        println!("  path: {}", path);
    }
    for overlap in &location.overlaps {
        println!(
            "  overlap in universe {}: cells {}",
            overlap.universe,
            overlap.cells.iter().join(", ")
        );
    }
}

/// Walks a ray from boundary to boundary until it leaves the model.
fn trace(
    resolver: &Resolver<'_>,
    origin: Point3<f64>,
    direction: Vector3<f64>,
    max_segments: usize,
) -> Result<()> {
    ensure!(direction.norm() > 0.0, "direction must be non-zero");
    let d = direction.normalize();
    // step past each crossing so the next segment starts on the far side
    let nudge = 10.0 * resolver.options().tolerance.tie;

    let mut travelled = 0.0;
    let mut p = origin;
    println!(
        "{:>5} {:>12} {:>12}  {:<24} crossing",
        "seg", "start", "length", "occupant"
    );
    for segment in 0..max_segments {
        let location = resolver.locate(&p)?;
        if location.is_outside() {
            println!("left the geometry after {:.6}", travelled);
            return Ok(());
        }
        let boundary = resolver.distance_to_next_boundary(&p, &d)?;
        let crossing = match (boundary.surface, boundary.lattice_neighbor) {
            (Some(surface), _) => format!("surface {} (level {})", surface, boundary.level),
            (None, Some(next)) => format!("lattice element {} (level {})", next, boundary.level),
            (None, None) => "none".to_string(),
        };
        println!(
            "{:>5} {:>12.6} {:>12.6}  {:<24} {}",
            segment,
            travelled,
            boundary.distance,
            describe(&location.occupant),
            crossing
        );
        if !boundary.distance.is_finite() {
            println!("no further boundary along the ray");
            return Ok(());
        }
        travelled += boundary.distance;
        if boundary.is_model_boundary() {
            println!(
                "reached {:?} boundary after {:.6}",
                boundary.boundary_condition, travelled
            );
            return Ok(());
        }
        p = origin + d * (travelled + nudge);
    }
    println!("trace truncated after {} segments", max_segments);
    Ok(())
}

fn run_census(resolver: &Resolver<'_>, grid: &Grid, audit: bool) {
    let census = scan::census(resolver, grid, true);
    println!("{:<12} {:>10} {:>14}", "occupant", "samples", "area");
    for (tally, count) in &census.counts {
        println!(
            "{:<12} {:>10} {:>14.6}",
            tally.to_string(),
            count,
            census.area(*tally)
        );
    }
    if census.errors > 0 {
        println!("{} samples could not be located", census.errors);
    }
    if audit {
        let reports = scan::audit_overlaps(resolver, grid);
        if reports.is_empty() {
            println!("no overlapping cells found");
        }
        for report in reports {
            println!(
                "universe {}: cells {} overlap in {} samples, e.g. at ({:.4}, {:.4}, {:.4})",
                report.universe,
                report.cells.iter().join(", "),
                report.samples,
                report.point.x,
                report.point.y,
                report.point.z
            );
        }
    }
}
