//! nlframe example - large-deflection cantilever
//!
//! Without arguments a steel cantilever is built in code and compared with
//! its small-displacement counterpart. With a path argument the JSON model
//! definition in that file is analysed instead.
//!
//! Set `NLFRAME_HISTORY=<file>` to also write every converged step as JSON lines.

use std::env;
use std::fs::{self, File};
use std::io::BufWriter;

use anyhow::Context;
use nlframe_solver::prelude::*;

const LENGTH: f64 = 5.0;
const DIVISIONS: usize = 10;

fn cantilever(kind: ElementKind, tip_load: f64) -> anyhow::Result<Model> {
    // 100 x 200 mm solid steel bar
    let section = Section::rectangular(&Material::steel(), 0.1, 0.2);
    let mesh = GlobalMesh::create_line_mesh(DIVISIONS, [0.0, 0.0], [LENGTH, 0.0], kind, section)?;

    let mut model = Model::from_mesh(mesh);
    model.restrain(1, Restraint::fixed())?;
    model.add_nodal_load(NodalLoad::fy(DIVISIONS + 1, tip_load))?;
    model.initialise_solution_parameters(
        SolutionOptions::default()
            .with_increments(20)
            .with_tolerance(1e-3),
    )?;
    Ok(model)
}

fn run(model: &mut Model) -> anyhow::Result<SolutionOutcome> {
    match env::var("NLFRAME_HISTORY") {
        Ok(path) => {
            let file = File::create(&path).with_context(|| format!("creating {}", path))?;
            let mut recorder = JsonLinesRecorder::new(BufWriter::new(file));
            let outcome = model.analyze_with_recorder(&mut recorder)?;
            recorder.into_inner()?;
            Ok(outcome)
        }
        Err(_) => Ok(model.analyze()?),
    }
}

fn print_report(model: &Model) -> anyhow::Result<()> {
    let report = model.report()?;

    println!("Node Displacements:");
    for d in &report.displacements {
        println!(
            "  N{}: DX={:.4}mm, DY={:.4}mm, RZ={:.6}rad",
            d.node,
            d.dx * 1000.0,
            d.dy * 1000.0,
            d.rz
        );
    }

    println!("\nSupport Reactions:");
    for r in &report.reactions {
        println!(
            "  N{}: FX={:.2}kN, FY={:.2}kN, MZ={:.2}kN·m",
            r.node,
            r.fx / 1000.0,
            r.fy / 1000.0,
            r.mz / 1000.0
        );
    }

    println!("\nElement Forces:");
    for f in &report.element_forces {
        println!(
            "  E{}: N={:.2}kN, V={:.2}kN, M1={:.2}kN·m, M2={:.2}kN·m",
            f.element,
            f.axial / 1000.0,
            f.shear / 1000.0,
            f.moment_i / 1000.0,
            f.moment_j / 1000.0
        );
    }

    let s = &report.summary;
    println!("\nSummary:");
    println!("  Converged: {} ({} steps, {} solves)", s.converged, s.steps, s.total_iterations);
    println!("  Load factor: {:.3}", s.load_factor);
    if let Some(node) = s.max_disp_node {
        println!("  Max displacement: {:.4}mm at N{}", s.max_displacement * 1000.0, node);
    }
    if let Some(element) = s.max_moment_element {
        println!("  Max moment: {:.2}kN·m in E{}", s.max_moment / 1000.0, element);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    if let Some(path) = env::args().nth(1) {
        println!("=== nlframe: {} ===\n", path);
        let json = fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
        let mut model = Model::from_json(&json)?;
        let outcome = run(&mut model)?;
        println!("Outcome: {:?}\n", outcome);
        return print_report(&model);
    }

    println!("=== nlframe example: cantilever under a tip load ===\n");

    // PL²/EI = 2 puts the tip well into the large-deflection range
    let section = Section::rectangular(&Material::steel(), 0.1, 0.2);
    let tip_load = -2.0 * section.ei() / (LENGTH * LENGTH);
    let tip = DIVISIONS + 1;

    let mut linear = cantilever(ElementKind::Linear2D, tip_load)?;
    linear.analyze()?.into_result()?;

    let mut nonlinear = cantilever(ElementKind::Izzuddin2D, tip_load)?;
    let outcome = run(&mut nonlinear)?;
    println!("Outcome: {:?}\n", outcome);
    print_report(&nonlinear)?;

    let lin = linear.node_displacement(tip)?;
    let nl = nonlinear.node_displacement(tip)?;
    println!("\n=== Tip displacement comparison ===\n");
    println!("  Linear:    DX={:.4}m, DY={:.4}m", lin.dx, lin.dy);
    println!("  Nonlinear: DX={:.4}m, DY={:.4}m", nl.dx, nl.dy);

    println!("\n  Load factor vs tip DY:");
    for (lambda, dy) in nonlinear.history().load_displacement_curve(tip, Dof::Uy) {
        println!("    {:.2}  {:.4}", lambda, dy);
    }

    println!("\n=== Analysis Complete ===");
    Ok(())
}
