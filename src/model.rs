//! Model - builder and driver around mesh, loads and solution procedure

use std::collections::BTreeMap;

use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::SolutionOptions;
use crate::assembler::Assembler;
use crate::elements::{BeamElement, Dof, ElementKind, Node, Restraint, Section};
use crate::error::{ConfigurationError, NlFrameError, NlFrameResult, PreconditionError};
use crate::loads::{LoadManager, NodalLoad};
use crate::mesh::GlobalMesh;
use crate::record::{History, Recorder, StepSnapshot};
use crate::results::{AnalysisSummary, ElementForces, NodeDisplacement, Reactions};
use crate::solution::{SolutionOutcome, SolutionProcedure};

/// A nonlinear 2D frame model
#[derive(Debug, Clone, Default)]
pub struct Model {
    mesh: GlobalMesh,
    loads: LoadManager,
    assembler: Assembler,
    procedure: SolutionProcedure,
    options: SolutionOptions,
    history: History,
    outcome: Option<SolutionOutcome>,
    prepared: bool,
}

impl Model {
    /// Create a new empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing mesh, e.g. one from [`GlobalMesh::create_line_mesh`]
    pub fn from_mesh(mesh: GlobalMesh) -> Self {
        Self {
            mesh,
            ..Self::default()
        }
    }

    // ========================
    // Model Building Methods
    // ========================

    /// Add a node to the model
    pub fn add_node(&mut self, id: usize, x: f64, y: f64) -> NlFrameResult<()> {
        self.mesh.add_node(Node::new(id, x, y))
    }

    /// Add an element between two existing nodes
    pub fn add_element(
        &mut self,
        id: usize,
        kind: ElementKind,
        nodes: [usize; 2],
        section: Section,
    ) -> NlFrameResult<()> {
        self.mesh.add_element(BeamElement::new(id, kind, nodes, section))
    }

    /// Add a support condition at a node
    pub fn restrain(&mut self, node: usize, restraint: Restraint) -> NlFrameResult<()> {
        self.mesh.restrain(node, restraint)
    }

    pub fn fix_dof(&mut self, node: usize, dof: Dof) -> NlFrameResult<()> {
        self.mesh.fix_dof(node, dof)
    }

    /// Add a total nodal load, applied gradually by the load schedule
    pub fn add_nodal_load(&mut self, load: NodalLoad) -> NlFrameResult<()> {
        if self.prepared {
            return Err(ConfigurationError::InvalidOption(
                "loads must be added before initialise_restraints_n_loads()".to_string(),
            )
            .into());
        }
        self.loads.add_nodal_load(load);
        Ok(())
    }

    /// Freeze restraints, number DOFs, initialise elements and loads
    pub fn initialise_restraints_n_loads(&mut self) -> NlFrameResult<()> {
        if self.prepared {
            return Ok(());
        }

        self.mesh.finalise_restraints();
        let ndofs = self.mesh.number_dofs()?;
        if ndofs == 0 {
            return Err(ConfigurationError::EmptySystem.into());
        }
        self.mesh.initialise_elements()?;
        self.mesh.update_element_states()?;
        self.loads
            .initialise_loads(&mut self.mesh, self.options.schedule())?;

        let corotational = self
            .mesh
            .elements_by_id()
            .filter(|e| e.kind().is_nonlinear())
            .count();
        info!(
            "Model prepared: {} nodes, {} elements ({} corotational), {} active dofs",
            self.mesh.num_nodes(),
            self.mesh.num_elements(),
            corotational,
            ndofs
        );
        self.prepared = true;
        Ok(())
    }

    /// Validate and adopt solution options
    pub fn initialise_solution_parameters(&mut self, options: SolutionOptions) -> NlFrameResult<()> {
        self.procedure.initialise_solution_parameters(options.clone())?;
        self.options = options;
        if self.prepared {
            self.loads
                .initialise_loads(&mut self.mesh, self.options.schedule())?;
        }
        Ok(())
    }

    /// Run the analysis, recording every converged step in [`history`](Self::history)
    pub fn analyze(&mut self) -> NlFrameResult<SolutionOutcome> {
        self.run(None)
    }

    /// Run the analysis and also send each step to `recorder`
    pub fn analyze_with_recorder(&mut self, recorder: &mut dyn Recorder) -> NlFrameResult<SolutionOutcome> {
        self.run(Some(recorder))
    }

    fn run(&mut self, extra: Option<&mut dyn Recorder>) -> NlFrameResult<SolutionOutcome> {
        if self.outcome.is_some() {
            return Err(PreconditionError::NotInitialised.into());
        }
        self.initialise_restraints_n_loads()?;
        if self.procedure.options().is_none() {
            self.procedure
                .initialise_solution_parameters(self.options.clone())?;
        }

        let mut tee = Tee {
            history: &mut self.history,
            extra,
        };
        let outcome = self.procedure.solve(
            &mut self.mesh,
            &mut self.assembler,
            &mut self.loads,
            &mut tee,
        )?;

        self.outcome = Some(outcome);
        Ok(outcome)
    }

    // ========================
    // Result Queries
    // ========================

    pub fn mesh(&self) -> &GlobalMesh {
        &self.mesh
    }

    pub fn options(&self) -> &SolutionOptions {
        &self.options
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn outcome(&self) -> Option<&SolutionOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_analyzed(&self) -> bool {
        self.outcome.is_some()
    }

    /// Load factor of the reported state
    ///
    /// After a divergence this is the factor of the last converged step; the
    /// factor that failed is in [`ConvergenceFailure`](crate::solution::ConvergenceFailure).
    pub fn load_factor(&self) -> f64 {
        if self.is_diverged() {
            return self.history.last().map_or(0.0, |s| s.load_factor);
        }
        self.loads.load_factor()
    }

    /// Displacement of a node in the reported state
    pub fn node_displacement(&self, node: usize) -> NlFrameResult<NodeDisplacement> {
        let n = self.mesh.node(node)?;
        if self.is_diverged() {
            let snapshot = self.snapshot()?;
            return Ok(snapshot
                .node_displacement(node)
                .copied()
                .unwrap_or_else(|| NodeDisplacement::from_array(node, [0.0; 3])));
        }
        Ok(NodeDisplacement::from_array(node, n.displacements()))
    }

    /// Natural forces of an element in the reported state
    pub fn element_forces(&self, element: usize) -> NlFrameResult<ElementForces> {
        let e = self.mesh.element(element)?;
        if self.is_diverged() {
            let snapshot = self.snapshot()?;
            return snapshot
                .element_forces(element)
                .copied()
                .ok_or_else(|| ConfigurationError::ElementNotFound(element).into());
        }
        Ok(ElementForces::from_state(e.id, e.kind(), e.state()?))
    }

    /// Support reactions at every restrained node
    ///
    /// Not available once a step has diverged: the mesh then holds an
    /// unconverged iterate.
    pub fn reactions(&self) -> NlFrameResult<Vec<Reactions>> {
        if let Some(SolutionOutcome::Diverged(f)) = self.outcome {
            return Err(NlFrameError::ConvergenceFailed {
                step: f.step,
                iterations: f.iterations,
                residual_norm: f.residual_norm,
            });
        }
        self.mesh.reactions()
    }

    /// Reaction at one node; zero for an unrestrained node
    pub fn node_reaction(&self, node: usize) -> NlFrameResult<Reactions> {
        self.mesh.node(node)?;
        Ok(self
            .reactions()?
            .into_iter()
            .find(|r| r.node == node)
            .unwrap_or_else(|| Reactions::from_array(node, [0.0; 3])))
    }

    /// Snapshot of the reported state
    ///
    /// This is the current state, except after a divergence where it is the
    /// last converged step, or the unloaded structure if no step converged.
    pub fn snapshot(&self) -> NlFrameResult<StepSnapshot> {
        if self.is_diverged() {
            return match self.history.last() {
                Some(last) => Ok(last.clone()),
                None => self.unloaded_snapshot(),
            };
        }
        StepSnapshot::capture(&self.mesh, self.procedure.step(), self.load_factor(), 0, 0.0)
    }

    fn is_diverged(&self) -> bool {
        matches!(self.outcome, Some(SolutionOutcome::Diverged(_)))
    }

    fn unloaded_snapshot(&self) -> NlFrameResult<StepSnapshot> {
        let displacements = self
            .mesh
            .nodes_by_id()
            .map(|n| NodeDisplacement::from_array(n.id, [0.0; 3]))
            .collect();
        let element_forces = self
            .mesh
            .elements_by_id()
            .map(|e| {
                Ok(ElementForces {
                    element: e.id,
                    kind: e.kind(),
                    axial: 0.0,
                    moment_i: 0.0,
                    moment_j: 0.0,
                    shear: 0.0,
                    length: e.initial_length()?,
                })
            })
            .collect::<NlFrameResult<_>>()?;

        Ok(StepSnapshot {
            step: 0,
            load_factor: 0.0,
            iterations: 0,
            residual_norm: 0.0,
            displacements,
            element_forces,
        })
    }

    /// Get analysis summary
    pub fn summary(&self) -> NlFrameResult<AnalysisSummary> {
        let mut summary = AnalysisSummary {
            num_nodes: self.mesh.num_nodes(),
            num_elements: self.mesh.num_elements(),
            free_dofs: self.mesh.ndofs(),
            ..AnalysisSummary::default()
        };

        match &self.outcome {
            Some(SolutionOutcome::Finished(s)) => {
                summary.converged = true;
                summary.steps = s.steps;
                summary.load_factor = s.load_factor;
                summary.total_iterations = s.total_iterations;
            }
            Some(SolutionOutcome::Diverged(_)) | None => {
                if let Some(last) = self.history.last() {
                    summary.steps = last.step;
                    summary.load_factor = last.load_factor;
                }
                summary.total_iterations = self.history.snapshots().iter().map(|s| s.iterations).sum();
            }
        }

        if self.prepared {
            let snapshot = self.snapshot()?;
            for d in &snapshot.displacements {
                if d.translation_magnitude() > summary.max_displacement {
                    summary.max_displacement = d.translation_magnitude();
                    summary.max_disp_node = Some(d.node);
                }
            }
            for f in &snapshot.element_forces {
                if f.max_moment() > summary.max_moment {
                    summary.max_moment = f.max_moment();
                    summary.max_moment_element = Some(f.element);
                }
            }
        }

        Ok(summary)
    }

    /// Everything a caller needs after an analysis
    pub fn report(&self) -> NlFrameResult<AnalysisReport> {
        let snapshot = self.snapshot()?;
        Ok(AnalysisReport {
            outcome: self.outcome,
            summary: self.summary()?,
            displacements: snapshot.displacements,
            element_forces: snapshot.element_forces,
            reactions: if self.is_diverged() {
                Vec::new()
            } else {
                self.reactions()?
            },
            history: self.history.snapshots().to_vec(),
        })
    }

    // ========================
    // Definitions
    // ========================

    /// Build a model from a serialisable definition
    pub fn from_definition(def: &ModelDefinition) -> NlFrameResult<Self> {
        let mut model = Self::new();

        for n in &def.nodes {
            model.add_node(n.id, n.x, n.y)?;
        }
        for e in &def.elements {
            let section = def.sections.get(&e.section).copied().ok_or_else(|| {
                ConfigurationError::InvalidOption(format!(
                    "element {} references unknown section '{}'",
                    e.id, e.section
                ))
            })?;
            model.add_element(e.id, e.kind, e.nodes, section)?;
        }
        for r in &def.restraints {
            model.restrain(r.node, r.restraint)?;
        }
        for load in &def.loads {
            model.add_nodal_load(*load)?;
        }
        model.initialise_solution_parameters(def.options.clone())?;

        Ok(model)
    }

    /// Parse a JSON model definition
    pub fn from_json(json: &str) -> NlFrameResult<Self> {
        let def: ModelDefinition = serde_json::from_str(json)?;
        Self::from_definition(&def)
    }
}

/// Sends each snapshot to the model history and an optional second recorder
struct Tee<'a, 'b> {
    history: &'a mut History,
    extra: Option<&'b mut dyn Recorder>,
}

impl Recorder for Tee<'_, '_> {
    fn record(&mut self, snapshot: &StepSnapshot) -> NlFrameResult<()> {
        self.history.record(snapshot)?;
        if let Some(extra) = self.extra.as_mut() {
            extra.record(snapshot)?;
        }
        Ok(())
    }
}

/// Node entry of a [`ModelDefinition`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: usize,
    pub x: f64,
    pub y: f64,
}

/// Element entry of a [`ModelDefinition`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDefinition {
    pub id: usize,
    #[serde(default)]
    pub kind: ElementKind,
    pub nodes: [usize; 2],
    /// Key into [`ModelDefinition::sections`]
    pub section: String,
}

/// Restraint entry of a [`ModelDefinition`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RestraintDefinition {
    pub node: usize,
    #[serde(flatten)]
    pub restraint: Restraint,
}

/// Serialisable description of a complete model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub nodes: Vec<NodeDefinition>,
    pub sections: BTreeMap<String, Section>,
    pub elements: Vec<ElementDefinition>,
    #[serde(default)]
    pub restraints: Vec<RestraintDefinition>,
    #[serde(default)]
    pub loads: Vec<NodalLoad>,
    #[serde(default)]
    pub options: SolutionOptions,
}

/// Outcome and results of an analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub outcome: Option<SolutionOutcome>,
    pub summary: AnalysisSummary,
    pub displacements: Vec<NodeDisplacement>,
    pub element_forces: Vec<ElementForces>,
    pub reactions: Vec<Reactions>,
    pub history: Vec<StepSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cantilever(kind: ElementKind, load: f64) -> Model {
        cantilever_with(kind, load, Section::new(1.0, 1.0e4, 1.0))
    }

    fn cantilever_with(kind: ElementKind, load: f64, section: Section) -> Model {
        let mut model = Model::new();
        for i in 0..=4 {
            model.add_node(i + 1, 0.25 * i as f64, 0.0).unwrap();
        }
        for i in 1..=4 {
            model.add_element(i, kind, [i, i + 1], section).unwrap();
        }
        model.restrain(1, Restraint::fixed()).unwrap();
        model.add_nodal_load(NodalLoad::fy(5, load)).unwrap();
        model
    }

    #[test]
    fn test_simple_cantilever() {
        let mut model = cantilever(ElementKind::Linear2D, -1.0);
        model
            .initialise_solution_parameters(SolutionOptions::default().with_increments(2))
            .unwrap();
        model.initialise_restraints_n_loads().unwrap();
        let outcome = model.analyze().unwrap();
        assert!(outcome.is_finished());

        let disp = model.node_displacement(5).unwrap();
        assert_relative_eq!(disp.dy, -1.0 / 3.0, epsilon = 1e-9);

        let rxn = model.node_reaction(1).unwrap();
        assert_relative_eq!(rxn.fy, 1.0, epsilon = 1e-9);
        assert_relative_eq!(rxn.mz, 1.0, epsilon = 1e-9);

        let forces = model.element_forces(1).unwrap();
        assert_relative_eq!(forces.shear, 1.0, epsilon = 1e-9);
        assert_eq!(model.history().len(), 2);
    }

    #[test]
    fn test_diverged_run_reports_last_converged_state() {
        // a single Newton solve cannot balance this load
        let mut model = cantilever(ElementKind::Izzuddin2D, -3.0);
        model
            .initialise_solution_parameters(
                SolutionOptions::default()
                    .with_increments(1)
                    .with_max_iter(1)
                    .with_tolerance(1e-12),
            )
            .unwrap();
        let outcome = model.analyze().unwrap();
        assert!(!outcome.is_finished());
        assert!(model.history().is_empty());

        // the mesh itself holds the rejected iterate
        assert!(model.mesh().node(5).unwrap().displacement(Dof::Uy) < 0.0);

        assert_eq!(model.load_factor(), 0.0);
        assert_eq!(model.node_displacement(5).unwrap().dy, 0.0);
        assert_eq!(model.element_forces(4).unwrap().moment_i, 0.0);
        assert_relative_eq!(model.element_forces(4).unwrap().length, 0.25, epsilon = 1e-12);
        assert!(model.reactions().is_err());

        let summary = model.summary().unwrap();
        assert!(!summary.converged);
        assert_eq!(summary.steps, 0);
        assert_eq!(summary.load_factor, 0.0);
        assert_eq!(summary.max_displacement, 0.0);
        assert_eq!(summary.max_disp_node, None);

        let report = model.report().unwrap();
        assert!(report.displacements.iter().all(|d| d.dy == 0.0 && d.dx == 0.0));
        assert!(report.reactions.is_empty());
    }

    #[test]
    fn test_diverged_run_keeps_earlier_steps() {
        // axially soft bar: one solve is enough at the small first increment
        let mut model = cantilever_with(ElementKind::Izzuddin2D, -3.0, Section::new(1.0, 1.0, 1.0));
        model
            .initialise_solution_parameters(
                SolutionOptions::default()
                    .with_load_increments(vec![0.001, 0.999])
                    .with_max_iter(1)
                    .with_tolerance(3e-4),
            )
            .unwrap();
        let outcome = model.analyze().unwrap();
        let failure = match outcome {
            SolutionOutcome::Diverged(f) => f,
            SolutionOutcome::Finished(_) => panic!("expected divergence"),
        };
        assert_eq!(failure.step, 2);
        assert_eq!(model.history().len(), 1);

        let last = model.history().last().unwrap().clone();
        assert_relative_eq!(model.load_factor(), 0.001, epsilon = 1e-12);
        assert_eq!(last.iterations, 1);
        assert_eq!(model.snapshot().unwrap(), last);
        assert_eq!(
            model.node_displacement(5).unwrap(),
            *last.node_displacement(5).unwrap()
        );

        let summary = model.summary().unwrap();
        assert_eq!(summary.steps, 1);
        let tip = last.node_displacement(5).unwrap().translation_magnitude();
        assert_relative_eq!(summary.max_displacement, tip, epsilon = 1e-15);
    }

    #[test]
    fn test_analyze_runs_only_once() {
        let mut model = cantilever(ElementKind::Linear2D, -1.0);
        model.analyze().unwrap();
        assert!(model.analyze().is_err());
    }

    #[test]
    fn test_loads_after_preparation_rejected() {
        let mut model = cantilever(ElementKind::Linear2D, -1.0);
        model.initialise_restraints_n_loads().unwrap();
        assert!(model.add_nodal_load(NodalLoad::fx(5, 1.0)).is_err());
    }

    #[test]
    fn test_from_json_definition() {
        let json = r#"{
            "nodes": [{"id": 1, "x": 0.0, "y": 0.0}, {"id": 2, "x": 2.0, "y": 0.0}],
            "sections": {"rect": {"e": 1.0, "a": 10000.0, "i": 1.0}},
            "elements": [{"id": 1, "kind": "Linear2D", "nodes": [1, 2], "section": "rect"}],
            "restraints": [{"node": 1, "dx": true, "dy": true, "rz": true}],
            "loads": [{"node": 2, "dof": "Uy", "value": -1.0}],
            "options": {"num_increments": 1}
        }"#;

        let mut model = Model::from_json(json).unwrap();
        model.analyze().unwrap().into_result().unwrap();
        assert_relative_eq!(model.node_displacement(2).unwrap().dy, -8.0 / 3.0, epsilon = 1e-9);

        let report = model.report().unwrap();
        assert!(report.summary.converged);
        assert_eq!(report.history.len(), 1);
        assert_eq!(report.reactions.len(), 1);
    }

    #[test]
    fn test_unknown_section_rejected() {
        let def = ModelDefinition {
            nodes: vec![
                NodeDefinition { id: 1, x: 0.0, y: 0.0 },
                NodeDefinition { id: 2, x: 1.0, y: 0.0 },
            ],
            elements: vec![ElementDefinition {
                id: 1,
                kind: ElementKind::Izzuddin2D,
                nodes: [1, 2],
                section: "missing".to_string(),
            }],
            ..ModelDefinition::default()
        };
        assert!(Model::from_definition(&def).is_err());
    }
}
