use approx::assert_relative_eq;
use nlframe_solver::prelude::*;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// L = 1, EI = 1, EA = 1e4
const DIVISIONS: usize = 10;
const TIP: usize = DIVISIONS + 1;

fn build_cantilever(kind: ElementKind, tip_load: f64, options: SolutionOptions) -> Model {
    let section = Section::new(1.0, 1.0e4, 1.0);
    let mesh = GlobalMesh::create_line_mesh(DIVISIONS, [0.0, 0.0], [1.0, 0.0], kind, section)
        .unwrap();

    let mut model = Model::from_mesh(mesh);
    model.restrain(1, Restraint::fixed()).unwrap();
    model.add_nodal_load(NodalLoad::fy(TIP, tip_load)).unwrap();
    model.initialise_solution_parameters(options).unwrap();
    model
}

fn run(kind: ElementKind, tip_load: f64, options: SolutionOptions) -> Model {
    let mut model = build_cantilever(kind, tip_load, options);
    let outcome = model.analyze().unwrap();
    assert!(outcome.is_finished(), "{:?} did not finish: {:?}", kind, outcome);
    model
}

#[test]
fn linear_elements_match_closed_form() {
    init_logger();
    // PL³/3EI = 1/3 with P = 1
    for kind in [ElementKind::Linear2D, ElementKind::Basic2D] {
        let model = run(kind, -1.0, SolutionOptions::default().with_increments(10));
        let tip = model.node_displacement(TIP).unwrap();
        assert_relative_eq!(tip.dy, -1.0 / 3.0, max_relative = 1e-9);
        assert_relative_eq!(tip.rz, -0.5, max_relative = 1e-9);
        assert_relative_eq!(tip.dx, 0.0, epsilon = 1e-12);
    }
}

#[test]
fn izzuddin_large_deflection() {
    init_logger();
    // PL²/EI = 1: δv/L ≈ 0.3017, δh/L ≈ 0.0564
    let model = run(
        ElementKind::Izzuddin2D,
        -1.0,
        SolutionOptions::default().with_increments(10),
    );
    let tip = model.node_displacement(TIP).unwrap();

    assert_relative_eq!(tip.dy, -0.3017, max_relative = 0.02);
    assert_relative_eq!(tip.dx, -0.0564, epsilon = 0.003);

    // Stiffening relative to the small-displacement answer
    let linear = -1.0 / 3.0;
    assert!((tip.dy - linear).abs() / linear.abs() > 0.01);
    assert!(tip.dy.abs() < linear.abs());
}

#[test]
fn izzuddin_matches_linear_at_small_load() {
    init_logger();
    let options = SolutionOptions::default()
        .with_increments(2)
        .with_tolerance(1e-10);
    let linear = run(ElementKind::Linear2D, -1e-3, options.clone());
    let nonlinear = run(ElementKind::Izzuddin2D, -1e-3, options);

    let a = linear.node_displacement(TIP).unwrap();
    let b = nonlinear.node_displacement(TIP).unwrap();
    assert_relative_eq!(b.dy, a.dy, max_relative = 1e-3);
    assert_relative_eq!(b.rz, a.rz, max_relative = 1e-3);
}

#[test]
fn single_element_cantilever() {
    init_logger();
    // default tolerance 1e-6 and 20 iterations per step
    let options = SolutionOptions::default().with_increments(10);
    let solve = |kind: ElementKind| {
        let mesh = GlobalMesh::create_line_mesh(
            1,
            [0.0, 0.0],
            [1.0, 0.0],
            kind,
            Section::new(1.0, 1.0e4, 1.0),
        )
        .unwrap();
        let mut model = Model::from_mesh(mesh);
        model.restrain(1, Restraint::fixed()).unwrap();
        model.add_nodal_load(NodalLoad::fy(2, -1.0)).unwrap();
        model.initialise_solution_parameters(options.clone()).unwrap();
        assert!(model.analyze().unwrap().is_finished());
        assert_eq!(model.history().len(), 10);
        model.node_displacement(2).unwrap()
    };

    let linear = solve(ElementKind::Linear2D);
    assert_relative_eq!(linear.dy, -1.0 / 3.0, max_relative = 1e-9);

    let nonlinear = solve(ElementKind::Izzuddin2D);
    assert_relative_eq!(nonlinear.dy, -0.30068, max_relative = 0.01);
    assert!((nonlinear.dy - linear.dy).abs() / linear.dy.abs() > 0.01);
}

#[test]
fn tip_response_grows_monotonically() {
    init_logger();
    let model = run(
        ElementKind::Izzuddin2D,
        -1.0,
        SolutionOptions::default().with_increments(10),
    );

    let curve = model.history().load_displacement_curve(TIP, Dof::Uy);
    assert_eq!(curve.len(), 10);
    assert_relative_eq!(curve[9].0, 1.0, epsilon = 1e-12);
    for pair in curve.windows(2) {
        assert!(pair[1].0 > pair[0].0);
        assert!(pair[1].1 < pair[0].1);
    }
}

#[test]
fn support_reaction_balances_tip_load() {
    init_logger();
    let model = run(
        ElementKind::Izzuddin2D,
        -1.0,
        SolutionOptions::default()
            .with_increments(10)
            .with_tolerance(1e-9),
    );
    let tip = model.node_displacement(TIP).unwrap();
    let root = model.node_reaction(1).unwrap();

    assert_relative_eq!(root.fx, 0.0, epsilon = 1e-6);
    assert_relative_eq!(root.fy, 1.0, epsilon = 1e-6);
    // Lever arm shortens with the horizontal tip movement
    assert_relative_eq!(root.mz, 1.0 + tip.dx, epsilon = 1e-6);
}

#[test]
fn displacement_metric_converges() {
    init_logger();
    let model = run(
        ElementKind::Izzuddin2D,
        -1.0,
        SolutionOptions::default()
            .with_increments(10)
            .with_metric(ConvergenceMetric::Displacement)
            .with_tolerance(1e-8),
    );
    let tip = model.node_displacement(TIP).unwrap();
    assert_relative_eq!(tip.dy, -0.3017, max_relative = 0.02);
}

#[test]
fn explicit_schedule_reaches_its_sum() {
    init_logger();
    let model = run(
        ElementKind::Izzuddin2D,
        -1.0,
        SolutionOptions::default().with_load_increments(vec![0.5, 0.25, 0.25]),
    );
    assert_eq!(model.history().len(), 3);
    assert_relative_eq!(model.load_factor(), 1.0, epsilon = 1e-12);

    let tip = model.node_displacement(TIP).unwrap();
    assert_relative_eq!(tip.dy, -0.3017, max_relative = 0.02);
}

#[test]
fn json_definition_round_trip() {
    init_logger();
    let json = r#"{
        "nodes": [
            {"id": 1, "x": 0.0, "y": 0.0},
            {"id": 2, "x": 0.5, "y": 0.0},
            {"id": 3, "x": 1.0, "y": 0.0}
        ],
        "sections": {"bar": {"e": 1.0, "a": 10000.0, "i": 1.0}},
        "elements": [
            {"id": 1, "kind": "Linear2D", "nodes": [1, 2], "section": "bar"},
            {"id": 2, "kind": "Linear2D", "nodes": [2, 3], "section": "bar"}
        ],
        "restraints": [{"node": 1, "dx": true, "dy": true, "rz": true}],
        "loads": [{"node": 3, "dof": "Uy", "value": -1.0}],
        "options": {"num_increments": 4}
    }"#;

    let mut model = Model::from_json(json).unwrap();
    model.analyze().unwrap().into_result().unwrap();

    let report = model.report().unwrap();
    assert_eq!(report.history.len(), 4);
    assert_eq!(report.displacements.len(), 3);
    assert_relative_eq!(report.displacements[2].dy, -1.0 / 3.0, max_relative = 1e-9);
    assert!(report.summary.converged);
    assert_eq!(report.summary.max_disp_node, Some(3));

    let text = serde_json::to_string(&report).unwrap();
    let back: AnalysisReport = serde_json::from_str(&text).unwrap();
    assert_eq!(back.displacements.len(), 3);
    assert_relative_eq!(back.displacements[2].dy, report.displacements[2].dy, max_relative = 1e-12);
}

#[test]
fn unknown_section_is_rejected() {
    init_logger();
    let json = r#"{
        "nodes": [{"id": 1, "x": 0.0, "y": 0.0}, {"id": 2, "x": 1.0, "y": 0.0}],
        "sections": {},
        "elements": [{"id": 1, "nodes": [1, 2], "section": "missing"}]
    }"#;
    assert!(Model::from_json(json).is_err());
}
