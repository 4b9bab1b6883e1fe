//! nlframe-solver - geometrically nonlinear analysis of 2D frames
//!
//! Loads are applied in increments and equilibrium is restored at every
//! increment with Newton-Raphson iterations. Supported:
//! - Corotational beam elements (Izzuddin cubic formulation)
//! - Small-displacement beams (closed-form and Gauss-integrated)
//! - Uniform or explicit load-factor schedules
//! - Residual or displacement-increment convergence checks
//! - Step history in memory or as JSON lines
//!
//! ## Example
//! ```rust
//! use nlframe_solver::prelude::*;
//!
//! let section = Section::new(200e9, 0.01, 8.0e-5);
//! let mut model = Model::from_mesh(
//!     GlobalMesh::create_line_mesh(10, [0.0, 0.0], [5.0, 0.0], ElementKind::Izzuddin2D, section)
//!         .unwrap(),
//! );
//!
//! // Clamp the root
//! model.restrain(1, Restraint::fixed()).unwrap();
//!
//! // Tip load, applied in 10 increments
//! model.add_nodal_load(NodalLoad::fy(11, -10_000.0)).unwrap();
//! model
//!     .initialise_solution_parameters(
//!         SolutionOptions::default()
//!             .with_increments(10)
//!             .with_tolerance(1e-3),
//!     )
//!     .unwrap();
//!
//! // Analyze
//! let outcome = model.analyze().unwrap();
//! assert!(outcome.is_finished());
//!
//! // Get results
//! let tip = model.node_displacement(11).unwrap();
//! assert!(tip.dy < 0.0);
//! ```

pub mod analysis;
pub mod assembler;
pub mod elements;
pub mod error;
pub mod loads;
pub mod math;
pub mod mesh;
pub mod model;
pub mod record;
pub mod results;
pub mod solution;

// Re-export common types
pub mod prelude {
    pub use crate::analysis::{ConvergenceMetric, SolutionOptions};
    pub use crate::assembler::Assembler;
    pub use crate::elements::{
        BeamElement, Dof, ElementKind, Material, NaturalForces, Node, NonlinearTransform,
        Restraint, Section,
    };
    pub use crate::error::{NlFrameError, NlFrameResult};
    pub use crate::loads::{LoadManager, LoadSchedule, NodalLoad};
    pub use crate::mesh::{FrameLayout, GlobalMesh};
    pub use crate::model::{AnalysisReport, Model, ModelDefinition};
    pub use crate::record::{History, JsonLinesRecorder, Recorder, StepSnapshot};
    pub use crate::results::{AnalysisSummary, ElementForces, NodeDisplacement, Reactions};
    pub use crate::solution::{SolutionOutcome, SolutionProcedure, SolutionState};
}
