//! Nodal loads - forces and moments applied directly to nodes

use serde::{Deserialize, Serialize};

use crate::elements::Dof;

/// Total (unfactored) load on one node DOF
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodalLoad {
    /// Loaded node id
    pub node: usize,
    /// Loaded DOF
    pub dof: Dof,
    /// Magnitude at load factor 1
    pub value: f64,
}

impl NodalLoad {
    pub fn new(node: usize, dof: Dof, value: f64) -> Self {
        Self { node, dof, value }
    }

    /// Create a load in X direction
    pub fn fx(node: usize, value: f64) -> Self {
        Self::new(node, Dof::Ux, value)
    }

    /// Create a load in Y direction
    pub fn fy(node: usize, value: f64) -> Self {
        Self::new(node, Dof::Uy, value)
    }

    /// Create a moment about Z
    pub fn mz(node: usize, value: f64) -> Self {
        Self::new(node, Dof::Rz, value)
    }

    /// Scale the load by a factor
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            value: self.value * factor,
            ..*self
        }
    }
}
