//! Beam element - 2-node planar frame element in three formulations
//!
//! * `Linear2D`: Euler-Bernoulli beam with a fixed transformation taken from
//!   the undeformed chord.
//! * `Basic2D`: same small-displacement kinematics, stiffness integrated
//!   with 2-point Gauss quadrature so that section strains are available.
//! * `Izzuddin2D`: corotational cubic element following the chord through
//!   large rotations; geometric nonlinearity enters through the transform
//!   and the axial-bending coupling of its natural forces.
//!
//! Every kind reports its internal forces as natural forces [N, M1, M2] so
//! downstream consumers do not need to know which formulation produced them.

use serde::{Deserialize, Serialize};

use super::node::Node;
use super::section::Section;
use super::transform::{NaturalDeformations, NaturalForces, NonlinearTransform};
use crate::error::{ConfigurationError, NlFrameResult, PreconditionError};
use crate::math::{
    beam_local_stiffness, beam_strain_displacement, beam_transformation_matrix, gauss_position,
    Mat6, Vec6, GAUSS_POINTS, GAUSS_WEIGHTS,
};

/// Element formulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    /// Small-displacement beam integrated at Gauss points
    Basic2D,
    /// Small-displacement beam with closed-form stiffness
    Linear2D,
    /// Corotational beam with cubic interpolation
    Izzuddin2D,
}

impl ElementKind {
    /// True for formulations whose stiffness depends on the current state
    pub fn is_nonlinear(&self) -> bool {
        matches!(self, ElementKind::Izzuddin2D)
    }
}

impl Default for ElementKind {
    fn default() -> Self {
        ElementKind::Izzuddin2D
    }
}

/// Strain and stress resultants at one Gauss point
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionState {
    /// Distance from node i
    pub x: f64,
    pub axial_strain: f64,
    pub curvature: f64,
    pub axial_force: f64,
    pub moment: f64,
}

/// Everything an element evaluation produces
#[derive(Debug, Clone, PartialEq)]
pub struct ElementState {
    /// Natural deformations [e, θ1, θ2]
    pub deformations: NaturalDeformations,
    /// Natural forces [N, M1, M2]
    pub natural_forces: NaturalForces,
    /// Chord length the forces refer to
    pub length: f64,
    /// End forces in element axes
    pub local_forces: Vec6,
    /// End forces in global axes
    pub global_forces: Vec6,
    /// Tangent stiffness in element axes
    pub local_stiffness: Mat6,
    /// Tangent stiffness in global axes
    pub global_stiffness: Mat6,
    /// Gauss point results (Basic2D only)
    pub sections: Vec<SectionState>,
}

impl ElementState {
    /// Zero state at the reference configuration
    fn empty(length: f64, gauss_points: usize) -> Self {
        Self {
            deformations: NaturalDeformations::default(),
            natural_forces: NaturalForces::default(),
            length,
            local_forces: Vec6::zeros(),
            global_forces: Vec6::zeros(),
            local_stiffness: Mat6::zeros(),
            global_stiffness: Mat6::zeros(),
            sections: vec![SectionState::default(); gauss_points],
        }
    }

    /// End shear V = (M1 + M2) / L
    pub fn shear(&self) -> f64 {
        self.natural_forces.shear(self.length)
    }
}

/// A 2-node planar beam element
#[derive(Debug, Clone)]
pub struct BeamElement {
    /// Element id, unique within a mesh
    pub id: usize,
    kind: ElementKind,
    /// Node ids [i, j]
    nodes: [usize; 2],
    section: Section,

    /// Arena slots of the two nodes, bound at initialisation
    slots: Option<[usize; 2]>,
    /// Reference chord frozen at initialisation
    transform: Option<NonlinearTransform>,
    /// Last stored evaluation
    state: Option<ElementState>,
}

impl BeamElement {
    /// Create a new element between nodes `nodes[0]` and `nodes[1]`
    pub fn new(id: usize, kind: ElementKind, nodes: [usize; 2], section: Section) -> Self {
        Self {
            id,
            kind,
            nodes,
            section,
            slots: None,
            transform: None,
            state: None,
        }
    }

    pub fn basic(id: usize, nodes: [usize; 2], section: Section) -> Self {
        Self::new(id, ElementKind::Basic2D, nodes, section)
    }

    pub fn linear(id: usize, nodes: [usize; 2], section: Section) -> Self {
        Self::new(id, ElementKind::Linear2D, nodes, section)
    }

    pub fn izzuddin(id: usize, nodes: [usize; 2], section: Section) -> Self {
        Self::new(id, ElementKind::Izzuddin2D, nodes, section)
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn node_ids(&self) -> [usize; 2] {
        self.nodes
    }

    pub fn section(&self) -> &Section {
        &self.section
    }

    pub fn is_initialised(&self) -> bool {
        self.transform.is_some()
    }

    /// Bind the element to its nodes and freeze the reference geometry
    ///
    /// `slots` are the arena positions of the two end nodes. Repeated calls
    /// are ignored so the reference chord stays the one seen at the first call.
    pub fn initialise(&mut self, nodes: &[Node], slots: [usize; 2]) -> NlFrameResult<()> {
        if self.transform.is_some() {
            return Ok(());
        }

        for (&id, &slot) in self.nodes.iter().zip(slots.iter()) {
            if nodes.get(slot).map(|n| n.id) != Some(id) {
                return Err(ConfigurationError::NodeNotFound(id).into());
            }
        }

        let transform = NonlinearTransform::new(
            self.id,
            nodes[slots[0]].coords(),
            nodes[slots[1]].coords(),
        )?;

        self.slots = Some(slots);
        self.transform = Some(transform);
        Ok(())
    }

    /// Allocate the state slot, with Gauss point storage for Basic2D
    pub fn initialise_state_containers(&mut self) -> NlFrameResult<()> {
        let transform = self.reference()?;
        let gauss_points = match self.kind {
            ElementKind::Basic2D => GAUSS_POINTS.len(),
            _ => 0,
        };
        self.state = Some(ElementState::empty(transform.initial_length(), gauss_points));
        Ok(())
    }

    fn reference(&self) -> Result<&NonlinearTransform, PreconditionError> {
        self.transform
            .as_ref()
            .ok_or(PreconditionError::ElementNotInitialised(self.id))
    }

    /// Reference chord; fails before `initialise`
    pub fn transform(&self) -> NlFrameResult<&NonlinearTransform> {
        Ok(self.reference()?)
    }

    /// Initial chord length L0
    pub fn initial_length(&self) -> NlFrameResult<f64> {
        Ok(self.reference()?.initial_length())
    }

    /// Gather [ux1, uy1, rz1, ux2, uy2, rz2] from the node arena
    pub fn displacements(&self, nodes: &[Node]) -> NlFrameResult<Vec6> {
        let slots = self
            .slots
            .ok_or(PreconditionError::ElementNotInitialised(self.id))?;

        let mut u = Vec6::zeros();
        for (k, (&slot, &id)) in slots.iter().zip(self.nodes.iter()).enumerate() {
            let node = nodes.get(slot).ok_or(ConfigurationError::NodeNotFound(id))?;
            let d = node.displacements();
            u[3 * k] = d[0];
            u[3 * k + 1] = d[1];
            u[3 * k + 2] = d[2];
        }
        Ok(u)
    }

    /// Global equation numbers of the 6 element DOFs
    pub fn equations(&self, nodes: &[Node]) -> NlFrameResult<[Option<usize>; 6]> {
        let slots = self
            .slots
            .ok_or(PreconditionError::ElementNotInitialised(self.id))?;

        let mut eq = [None; 6];
        for (k, (&slot, &id)) in slots.iter().zip(self.nodes.iter()).enumerate() {
            let node = nodes.get(slot).ok_or(ConfigurationError::NodeNotFound(id))?;
            eq[3 * k..3 * k + 3].copy_from_slice(&node.equations());
        }
        Ok(eq)
    }

    /// Evaluate forces and tangent from the current node displacements
    ///
    /// Pure: the stored state is left untouched, see [`update_state`](Self::update_state).
    pub fn evaluate(&self, nodes: &[Node]) -> NlFrameResult<ElementState> {
        let reference = self.reference()?;
        let u = self.displacements(nodes)?;

        match self.kind {
            ElementKind::Linear2D => Ok(self.evaluate_linear(reference, &u)),
            ElementKind::Basic2D => Ok(self.evaluate_basic(reference, &u)),
            ElementKind::Izzuddin2D => self.evaluate_izzuddin(reference, &u),
        }
    }

    /// Store a state produced by [`evaluate`](Self::evaluate)
    pub fn update_state(&mut self, state: ElementState) {
        self.state = Some(state);
    }

    /// Last stored state
    pub fn state(&self) -> NlFrameResult<&ElementState> {
        Ok(self
            .state
            .as_ref()
            .ok_or(PreconditionError::ElementNotInitialised(self.id))?)
    }

    pub fn global_stiffness(&self) -> NlFrameResult<&Mat6> {
        Ok(&self.state()?.global_stiffness)
    }

    pub fn global_forces(&self) -> NlFrameResult<&Vec6> {
        Ok(&self.state()?.global_forces)
    }

    pub fn local_stiffness(&self) -> NlFrameResult<&Mat6> {
        Ok(&self.state()?.local_stiffness)
    }

    pub fn local_forces(&self) -> NlFrameResult<&Vec6> {
        Ok(&self.state()?.local_forces)
    }

    pub fn natural_forces(&self) -> NlFrameResult<NaturalForces> {
        Ok(self.state()?.natural_forces)
    }

    pub fn natural_deformations(&self) -> NlFrameResult<NaturalDeformations> {
        Ok(self.state()?.deformations)
    }

    /// Small-displacement response shared by Linear2D and Basic2D
    fn small_displacement_state(
        &self,
        reference: &NonlinearTransform,
        u: &Vec6,
        k_local: Mat6,
    ) -> ElementState {
        let l0 = reference.initial_length();
        let t = beam_transformation_matrix(reference.initial_angle());
        let u_local = t * u;
        let f_local = k_local * u_local;

        let chord_rotation = (u_local[4] - u_local[1]) / l0;
        let deformations = NaturalDeformations {
            e: u_local[3] - u_local[0],
            theta1: u_local[2] - chord_rotation,
            theta2: u_local[5] - chord_rotation,
        };

        ElementState {
            deformations,
            natural_forces: NaturalForces::new(f_local[3], f_local[2], f_local[5]),
            length: l0,
            local_forces: f_local,
            global_forces: t.transpose() * f_local,
            local_stiffness: k_local,
            global_stiffness: t.transpose() * k_local * t,
            sections: Vec::new(),
        }
    }

    fn evaluate_linear(&self, reference: &NonlinearTransform, u: &Vec6) -> ElementState {
        let k_local = beam_local_stiffness(
            self.section.ea(),
            self.section.ei(),
            reference.initial_length(),
        );
        self.small_displacement_state(reference, u, k_local)
    }

    fn evaluate_basic(&self, reference: &NonlinearTransform, u: &Vec6) -> ElementState {
        let l0 = reference.initial_length();
        let (ea, ei) = (self.section.ea(), self.section.ei());
        let d = nalgebra::Matrix2::new(ea, 0.0, 0.0, ei);
        let u_local = beam_transformation_matrix(reference.initial_angle()) * u;

        let mut k_local = Mat6::zeros();
        let mut sections = Vec::with_capacity(GAUSS_POINTS.len());
        for (&xi, &w) in GAUSS_POINTS.iter().zip(GAUSS_WEIGHTS.iter()) {
            let x = gauss_position(xi, l0);
            let b = beam_strain_displacement(x, l0);
            k_local += b.transpose() * d * b * (0.5 * l0 * w);

            let strain = b * u_local;
            sections.push(SectionState {
                x,
                axial_strain: strain[0],
                curvature: strain[1],
                axial_force: ea * strain[0],
                moment: ei * strain[1],
            });
        }

        let mut state = self.small_displacement_state(reference, u, k_local);
        state.sections = sections;
        state
    }

    fn evaluate_izzuddin(
        &self,
        reference: &NonlinearTransform,
        u: &Vec6,
    ) -> NlFrameResult<ElementState> {
        let mut transform = *reference;
        transform.update(u)?;

        let l0 = transform.initial_length();
        let (ea, ei) = (self.section.ea(), self.section.ei());
        let d = transform.natural_deformations();
        let (e, t1, t2) = (d.e, d.theta1, d.theta2);

        let n = ea * (e / l0 + (2.0 * t1 * t1 - t1 * t2 + 2.0 * t2 * t2) / 30.0);
        let near = 4.0 * ei / l0 + 2.0 * n * l0 / 15.0;
        let far = 2.0 * ei / l0 - n * l0 / 30.0;
        let natural = NaturalForces::new(n, near * t1 + far * t2, far * t1 + near * t2);

        // k = EA L0 V Vᵀ + bending + N L0 geometric block
        let v = crate::math::Vec3::new(
            1.0 / l0,
            2.0 * t1 / 15.0 - t2 / 30.0,
            -t1 / 30.0 + 2.0 * t2 / 15.0,
        );
        let mut k = v * v.transpose() * (ea * l0);
        let bend = ei / l0;
        let geo = n * l0 / 30.0;
        k[(1, 1)] += 4.0 * bend + 4.0 * geo;
        k[(1, 2)] += 2.0 * bend - geo;
        k[(2, 1)] += 2.0 * bend - geo;
        k[(2, 2)] += 4.0 * bend + 4.0 * geo;

        let global_forces = transform.global_forces(&natural);
        let global_stiffness = transform.tangent(&k, &natural);

        let t = beam_transformation_matrix(transform.angle());
        Ok(ElementState {
            deformations: d,
            natural_forces: natural,
            length: transform.length(),
            local_forces: t * global_forces,
            global_forces,
            local_stiffness: t * global_stiffness * t.transpose(),
            global_stiffness,
            sections: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_nodes(x2: f64, y2: f64) -> Vec<Node> {
        vec![Node::new(1, 0.0, 0.0), Node::new(2, x2, y2)]
    }

    fn section() -> Section {
        Section::new(1.0, 1.0e4, 1.0)
    }

    fn ready(mut el: BeamElement, nodes: &[Node]) -> BeamElement {
        el.initialise(nodes, [0, 1]).unwrap();
        el.initialise_state_containers().unwrap();
        el
    }

    #[test]
    fn test_query_before_initialise_fails() {
        let el = BeamElement::izzuddin(3, [1, 2], section());
        assert!(el.global_stiffness().is_err());
        assert!(el.evaluate(&two_nodes(1.0, 0.0)).is_err());
    }

    #[test]
    fn test_degenerate_element_rejected() {
        let nodes = vec![Node::new(1, 2.0, 2.0), Node::new(2, 2.0, 2.0)];
        let mut el = BeamElement::linear(1, [1, 2], section());
        assert!(el.initialise(&nodes, [0, 1]).is_err());
    }

    #[test]
    fn test_only_corotational_kind_is_nonlinear() {
        assert!(ElementKind::Izzuddin2D.is_nonlinear());
        assert!(!ElementKind::Linear2D.is_nonlinear());
        assert!(!ElementKind::Basic2D.is_nonlinear());
    }

    #[test]
    fn test_initialise_checks_node_slots() {
        let nodes = two_nodes(1.0, 0.0);
        let mut el = BeamElement::linear(1, [1, 2], section());
        assert!(matches!(
            el.initialise(&nodes, [0, 0]),
            Err(crate::error::NlFrameError::Configuration(ConfigurationError::NodeNotFound(2)))
        ));
        assert!(el.initialise(&nodes, [0, 5]).is_err());
        assert!(!el.is_initialised());

        el.initialise(&nodes, [0, 1]).unwrap();
        assert!(el.is_initialised());
    }

    #[test]
    fn test_izzuddin_zero_force_when_undeformed() {
        let nodes = two_nodes(3.0, 4.0);
        let el = ready(BeamElement::izzuddin(1, [1, 2], section()), &nodes);
        let state = el.evaluate(&nodes).unwrap();

        assert!(state.global_forces.norm() < 1e-12);
        assert_relative_eq!(state.natural_forces.n, 0.0, epsilon = 1e-12);
        assert_relative_eq!(state.length, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_izzuddin_matches_linear_at_reference() {
        let nodes = two_nodes(1.0, 1.0);
        let izz = ready(BeamElement::izzuddin(1, [1, 2], section()), &nodes);
        let lin = ready(BeamElement::linear(2, [1, 2], section()), &nodes);

        let ki = izz.evaluate(&nodes).unwrap().global_stiffness;
        let kl = lin.evaluate(&nodes).unwrap().global_stiffness;
        for i in 0..6 {
            for j in 0..6 {
                assert_relative_eq!(ki[(i, j)], kl[(i, j)], epsilon = 1e-8, max_relative = 1e-10);
            }
        }
    }

    #[test]
    fn test_basic_matches_linear() {
        let mut nodes = two_nodes(2.0, 0.5);
        nodes[1].displacement = [0.001, -0.002, 0.003];
        let basic = ready(BeamElement::basic(1, [1, 2], section()), &nodes);
        let lin = ready(BeamElement::linear(2, [1, 2], section()), &nodes);

        let sb = basic.evaluate(&nodes).unwrap();
        let sl = lin.evaluate(&nodes).unwrap();
        for i in 0..6 {
            assert_relative_eq!(sb.global_forces[i], sl.global_forces[i], epsilon = 1e-8);
        }
        assert_eq!(sb.sections.len(), 2);
        assert_relative_eq!(sb.natural_forces.m1, sl.natural_forces.m1, epsilon = 1e-8);
    }

    #[test]
    fn test_basic_reports_uniform_axial_strain() {
        let mut nodes = two_nodes(2.0, 0.0);
        nodes[1].displacement = [0.004, 0.0, 0.0];
        let el = ready(BeamElement::basic(1, [1, 2], section()), &nodes);
        let state = el.evaluate(&nodes).unwrap();

        for s in &state.sections {
            assert_relative_eq!(s.axial_strain, 0.002, epsilon = 1e-12);
            assert_relative_eq!(s.curvature, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_state_containers() {
        let nodes = two_nodes(1.0, 0.0);
        let el = ready(BeamElement::basic(1, [1, 2], section()), &nodes);
        assert_eq!(el.state().unwrap().sections.len(), 2);
        assert_eq!(el.natural_forces().unwrap(), NaturalForces::default());
    }

    #[test]
    fn test_izzuddin_rigid_rotation_is_force_free() {
        let mut nodes = two_nodes(1.0, 0.0);
        let phi: f64 = 0.9;
        nodes[1].displacement = [phi.cos() - 1.0, phi.sin(), phi];
        nodes[0].displacement = [0.0, 0.0, phi];
        let el = ready(BeamElement::izzuddin(1, [1, 2], section()), &nodes);

        let state = el.evaluate(&nodes).unwrap();
        assert!(state.global_forces.norm() < 1e-9);
    }

    #[test]
    fn test_izzuddin_tangent_matches_finite_difference() {
        let mut nodes = two_nodes(1.0, 0.2);
        let u0 = [0.0, 0.0, 0.02, -0.01, 0.15, 0.2];
        let el = ready(BeamElement::izzuddin(1, [1, 2], Section::new(1.0, 100.0, 1.0)), &nodes);

        let mut forces_at = |u: [f64; 6]| {
            nodes[0].displacement = [u[0], u[1], u[2]];
            nodes[1].displacement = [u[3], u[4], u[5]];
            el.evaluate(&nodes).unwrap()
        };

        let kt = forces_at(u0).global_stiffness;
        let h = 1e-7;
        for c in 0..6 {
            let mut up = u0;
            let mut um = u0;
            up[c] += h;
            um[c] -= h;
            let fd = (forces_at(up).global_forces - forces_at(um).global_forces) / (2.0 * h);
            for r in 0..6 {
                assert_relative_eq!(kt[(r, c)], fd[r], epsilon = 1e-4, max_relative = 1e-5);
            }
        }
    }
}
