//! Node - a structural joint carrying three planar degrees of freedom

use serde::{Deserialize, Serialize};

/// Number of degrees of freedom per node
pub const NODE_DOFS: usize = 3;

/// A nodal degree of freedom, in canonical numbering order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dof {
    /// Translation along global X
    Ux,
    /// Translation along global Y
    Uy,
    /// Rotation about global Z
    Rz,
}

impl Dof {
    /// All DOFs in canonical order {x, y, rotation}
    pub const ALL: [Dof; NODE_DOFS] = [Dof::Ux, Dof::Uy, Dof::Rz];

    /// Position of this DOF within a node
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Dof::Ux => 0,
            Dof::Uy => 1,
            Dof::Rz => 2,
        }
    }
}

/// A 2D node in the finite element mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Node id, unique within a mesh
    pub id: usize,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,

    /// Restrained (fixed) flag per DOF
    pub(crate) restrained: [bool; NODE_DOFS],
    /// Active flag per DOF; inactive DOFs take no part in assembly
    pub(crate) active: [bool; NODE_DOFS],
    /// Cumulative displacement [DX, DY, RZ]
    pub(crate) displacement: [f64; NODE_DOFS],
    /// Accumulated external load [FX, FY, MZ]
    pub(crate) load: [f64; NODE_DOFS],

    /// Global equation index per DOF, assigned by DOF numbering
    #[serde(skip)]
    pub(crate) equations: [Option<usize>; NODE_DOFS],

    /// Elements framing into this node
    #[serde(skip)]
    pub(crate) connected_elements: Vec<usize>,
}

impl Node {
    /// Create a new node at the given coordinates
    pub fn new(id: usize, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            restrained: [false; NODE_DOFS],
            active: [true; NODE_DOFS],
            displacement: [0.0; NODE_DOFS],
            load: [0.0; NODE_DOFS],
            equations: [None; NODE_DOFS],
            connected_elements: Vec::new(),
        }
    }

    /// Get the initial coordinates
    pub fn coords(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Get the displaced coordinates
    pub fn current_coords(&self) -> [f64; 2] {
        [
            self.x + self.displacement[0],
            self.y + self.displacement[1],
        ]
    }

    /// Calculate distance to another node
    pub fn distance_to(&self, other: &Node) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Cumulative displacements [DX, DY, RZ]
    pub fn displacements(&self) -> [f64; NODE_DOFS] {
        self.displacement
    }

    pub fn displacement(&self, dof: Dof) -> f64 {
        self.displacement[dof.index()]
    }

    /// Accumulated external loads [FX, FY, MZ]
    pub fn loads(&self) -> [f64; NODE_DOFS] {
        self.load
    }

    pub fn load(&self, dof: Dof) -> f64 {
        self.load[dof.index()]
    }

    pub fn is_restrained(&self, dof: Dof) -> bool {
        self.restrained[dof.index()]
    }

    pub fn is_active(&self, dof: Dof) -> bool {
        self.active[dof.index()]
    }

    /// True if the DOF takes part in the global system
    pub fn is_free(&self, dof: Dof) -> bool {
        self.is_active(dof) && !self.is_restrained(dof)
    }

    /// Global equation index, if the DOF has been numbered
    pub fn equation(&self, dof: Dof) -> Option<usize> {
        self.equations[dof.index()]
    }

    /// Equation indices of all three DOFs
    pub fn equations(&self) -> [Option<usize>; NODE_DOFS] {
        self.equations
    }

    /// Ids of the elements connected to this node
    pub fn connected_elements(&self) -> &[usize] {
        &self.connected_elements
    }

    pub(crate) fn fix_dof(&mut self, dof: Dof) {
        self.restrained[dof.index()] = true;
    }

    pub(crate) fn free_dof(&mut self, dof: Dof) {
        self.restrained[dof.index()] = false;
    }

    pub(crate) fn set_active(&mut self, dof: Dof, active: bool) {
        self.active[dof.index()] = active;
    }

    pub(crate) fn add_connected_element(&mut self, element_id: usize) {
        if !self.connected_elements.contains(&element_id) {
            self.connected_elements.push(element_id);
        }
    }

    /// Add a solver correction; restrained and inactive DOFs stay untouched
    pub(crate) fn increment_displacement(&mut self, dof: Dof, delta: f64) {
        if self.is_free(dof) {
            self.displacement[dof.index()] += delta;
        }
    }

    pub(crate) fn add_nodal_load(&mut self, load: f64, dof: Dof) {
        self.load[dof.index()] = load;
    }

    pub(crate) fn increment_nodal_load(&mut self, delta: f64, dof: Dof) {
        self.load[dof.index()] += delta;
    }

    pub(crate) fn clear_nodal_loads(&mut self) {
        self.load = [0.0; NODE_DOFS];
    }
}
