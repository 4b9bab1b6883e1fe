//! Error types for the nonlinear frame solver

use thiserror::Error;

use crate::elements::Dof;

/// Fatal model set-up problems detected before or while preparing a run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Node {0} already exists in the mesh")]
    DuplicateNode(usize),

    #[error("Element {0} already exists in the mesh")]
    DuplicateElement(usize),

    #[error("Node {0} not found in mesh")]
    NodeNotFound(usize),

    #[error("Element {0} not found in mesh")]
    ElementNotFound(usize),

    #[error("Element {id} has a degenerate chord (length {length:e})")]
    DegenerateElement { id: usize, length: f64 },

    #[error("DOF numbering requested before restraints were finalised")]
    NumberingBeforeRestraints,

    #[error("Restraints are finalised; cannot change {dof:?} of node {node}")]
    RestraintsFinalised { node: usize, dof: Dof },

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Model has no active degrees of freedom")]
    EmptySystem,
}

/// Calls made out of order
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreconditionError {
    #[error("Element {0} queried before initialise()")]
    ElementNotInitialised(usize),

    #[error("Load schedule exhausted after {increments} increments")]
    LoadScheduleExhausted { increments: usize },

    #[error("Active DOFs have not been numbered - call number_dofs() first")]
    NotNumbered,

    #[error("Increment has {found} entries but {expected} DOFs are numbered")]
    IncrementSizeMismatch { expected: usize, found: usize },

    #[error("Solution parameters not initialised")]
    NotInitialised,
}

/// Linear solve failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    #[error("Singular stiffness matrix at load step {step} (condition estimate {condition_estimate:e}) - model may be a mechanism")]
    SingularSystem { step: usize, condition_estimate: f64 },
}

/// Main error type for solver operations
#[derive(Error, Debug)]
pub enum NlFrameError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("Convergence failed at load step {step} after {iterations} iterations (residual {residual_norm:e})")]
    ConvergenceFailed {
        step: usize,
        iterations: usize,
        residual_norm: f64,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for solver operations
pub type NlFrameResult<T> = Result<T, NlFrameError>;
