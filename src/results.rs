//! Result types for nonlinear frame analysis

use serde::{Deserialize, Serialize};

use crate::elements::{ElementKind, ElementState};

/// Displacement results at a node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeDisplacement {
    pub node: usize,
    /// Displacement in X direction
    pub dx: f64,
    /// Displacement in Y direction
    pub dy: f64,
    /// Rotation about Z axis
    pub rz: f64,
}

impl NodeDisplacement {
    /// Create from array [DX, DY, RZ]
    pub fn from_array(node: usize, arr: [f64; 3]) -> Self {
        Self {
            node,
            dx: arr[0],
            dy: arr[1],
            rz: arr[2],
        }
    }

    /// Get translation magnitude
    pub fn translation_magnitude(&self) -> f64 {
        self.dx.hypot(self.dy)
    }
}

/// Reaction forces at a supported node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reactions {
    pub node: usize,
    /// Reaction force in X direction
    pub fx: f64,
    /// Reaction force in Y direction
    pub fy: f64,
    /// Reaction moment about Z axis
    pub mz: f64,
}

impl Reactions {
    /// Create from array [FX, FY, MZ]
    pub fn from_array(node: usize, arr: [f64; 3]) -> Self {
        Self {
            node,
            fx: arr[0],
            fy: arr[1],
            mz: arr[2],
        }
    }

    /// Get total force magnitude
    pub fn force_magnitude(&self) -> f64 {
        self.fx.hypot(self.fy)
    }
}

/// Internal forces in an element, in natural form
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementForces {
    pub element: usize,
    pub kind: ElementKind,
    /// Axial force (positive = tension)
    pub axial: f64,
    /// End moment at node i
    pub moment_i: f64,
    /// End moment at node j
    pub moment_j: f64,
    /// End shear (M1 + M2) / L
    pub shear: f64,
    /// Chord length the forces refer to
    pub length: f64,
}

impl ElementForces {
    pub fn from_state(element: usize, kind: ElementKind, state: &ElementState) -> Self {
        let f = state.natural_forces;
        Self {
            element,
            kind,
            axial: f.n,
            moment_i: f.m1,
            moment_j: f.m2,
            shear: state.shear(),
            length: state.length,
        }
    }

    /// Larger absolute end moment
    pub fn max_moment(&self) -> f64 {
        self.moment_i.abs().max(self.moment_j.abs())
    }
}

/// Summary of an analysis run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// True if every load increment converged
    pub converged: bool,
    /// Converged load steps
    pub steps: usize,
    /// Load factor of the last converged step
    pub load_factor: f64,
    /// Solves over all converged steps
    pub total_iterations: usize,
    /// Maximum translation
    pub max_displacement: f64,
    /// Node with maximum translation
    pub max_disp_node: Option<usize>,
    /// Maximum element end moment
    pub max_moment: f64,
    /// Element with maximum moment
    pub max_moment_element: Option<usize>,
    /// Total number of nodes
    pub num_nodes: usize,
    /// Total number of elements
    pub num_elements: usize,
    /// Active (numbered) DOFs
    pub free_dofs: usize,
}
