//! Global mesh - arena of nodes and elements with DOF numbering
//!
//! Nodes and elements live in flat vectors; ids map to arena slots through
//! ordered maps so iteration by ascending id is deterministic. Elements refer
//! to their nodes by id and resolve arena slots once at initialisation.

use std::collections::BTreeMap;

use log::{debug, trace, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::elements::{BeamElement, Dof, ElementKind, ElementState, Node, Restraint, Section};
use crate::error::{ConfigurationError, NlFrameResult, PreconditionError};
use crate::results::Reactions;

/// Parameters of a regular portal frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameLayout {
    pub bays: usize,
    pub floors: usize,
    pub bay_length: f64,
    pub floor_height: f64,
    /// Elements per beam
    pub beam_divisions: usize,
    /// Elements per column per floor
    pub column_divisions: usize,
}

impl FrameLayout {
    /// Nodes on one column line including every vertex
    fn nodes_per_column_line(&self) -> usize {
        self.floors * self.column_divisions + 1
    }

    /// Interior beam nodes of one bay over all floors
    fn nodes_per_full_bay(&self) -> usize {
        self.floors * self.beam_divisions.saturating_sub(1)
    }

    /// Id of the vertex where `column_line` meets `floor`
    pub fn vertex_id(&self, column_line: usize, floor: usize) -> usize {
        1 + floor * self.column_divisions
            + column_line * (self.nodes_per_column_line() + self.nodes_per_full_bay())
    }

    /// Ids of the interior nodes of the beam in `bay` (1-based) at `floor` (1-based)
    fn beam_interior_ids(&self, bay: usize, floor: usize) -> impl Iterator<Item = usize> {
        let start = bay * self.nodes_per_column_line()
            + (bay - 1) * self.nodes_per_full_bay()
            + (floor - 1) * self.beam_divisions.saturating_sub(1);
        (1..self.beam_divisions).map(move |i| start + i)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes_per_column_line() * (self.bays + 1) + self.nodes_per_full_bay() * self.bays
    }

    pub fn num_elements(&self) -> usize {
        (self.nodes_per_column_line() - 1) * (self.bays + 1)
            + self.beam_divisions * self.floors * self.bays
    }
}

/// Nodes, elements and the active-DOF numbering of one structure
#[derive(Debug, Clone, Default)]
pub struct GlobalMesh {
    nodes: Vec<Node>,
    node_index: BTreeMap<usize, usize>,
    elements: Vec<BeamElement>,
    element_index: BTreeMap<usize, usize>,

    /// (node id, dof) -> equation
    dof_table: BTreeMap<(usize, Dof), usize>,
    restraints_finalised: bool,
    numbered: bool,
}

impl GlobalMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Straight line from `p1` to `p2` split into `divisions` elements
    ///
    /// Node and element ids start at 1 and increase from `p1`.
    pub fn create_line_mesh(
        divisions: usize,
        p1: [f64; 2],
        p2: [f64; 2],
        kind: ElementKind,
        section: Section,
    ) -> NlFrameResult<Self> {
        if divisions == 0 {
            return Err(ConfigurationError::InvalidOption(
                "line mesh needs at least one division".to_string(),
            )
            .into());
        }

        let mut mesh = Self::new();
        let dx = (p2[0] - p1[0]) / divisions as f64;
        let dy = (p2[1] - p1[1]) / divisions as f64;

        for i in 0..=divisions {
            mesh.add_node(Node::new(i + 1, p1[0] + i as f64 * dx, p1[1] + i as f64 * dy))?;
        }
        for i in 1..=divisions {
            mesh.add_element(BeamElement::new(i, kind, [i, i + 1], section))?;
        }

        debug!("Line mesh: {} nodes, {} elements", mesh.num_nodes(), mesh.num_elements());
        Ok(mesh)
    }

    /// Portal frame of `bays` x `floors` with fixed column bases
    ///
    /// Each column line is numbered bottom to top, followed by the interior
    /// nodes of the beams to its right, floor by floor.
    pub fn create_frame_mesh(
        layout: &FrameLayout,
        kind: ElementKind,
        section: Section,
    ) -> NlFrameResult<Self> {
        if layout.bays == 0
            || layout.floors == 0
            || layout.beam_divisions == 0
            || layout.column_divisions == 0
        {
            return Err(ConfigurationError::InvalidOption(
                "frame mesh needs at least one bay, floor and division".to_string(),
            )
            .into());
        }

        let mut mesh = Self::new();
        let dx = layout.bay_length / layout.beam_divisions as f64;
        let dy = layout.floor_height / layout.column_divisions as f64;
        let npcl = layout.nodes_per_column_line();

        for line in 0..=layout.bays {
            let x = line as f64 * layout.bay_length;
            let first = layout.vertex_id(line, 0);
            for k in 0..npcl {
                mesh.add_node(Node::new(first + k, x, k as f64 * dy))?;
            }
            if line < layout.bays {
                for floor in 1..=layout.floors {
                    let y = floor as f64 * layout.floor_height;
                    for (k, id) in layout.beam_interior_ids(line + 1, floor).enumerate() {
                        mesh.add_node(Node::new(id, x + (k + 1) as f64 * dx, y))?;
                    }
                }
            }
        }

        let mut element_id = 1;
        for line in 0..=layout.bays {
            let first = layout.vertex_id(line, 0);
            for k in 0..npcl - 1 {
                mesh.add_element(BeamElement::new(
                    element_id,
                    kind,
                    [first + k, first + k + 1],
                    section,
                ))?;
                element_id += 1;
            }
        }
        for bay in 1..=layout.bays {
            for floor in 1..=layout.floors {
                let mut chain = vec![layout.vertex_id(bay - 1, floor)];
                chain.extend(layout.beam_interior_ids(bay, floor));
                chain.push(layout.vertex_id(bay, floor));
                for pair in chain.windows(2) {
                    mesh.add_element(BeamElement::new(element_id, kind, [pair[0], pair[1]], section))?;
                    element_id += 1;
                }
            }
        }

        for line in 0..=layout.bays {
            mesh.restrain(layout.vertex_id(line, 0), Restraint::fixed())?;
        }

        debug!(
            "Frame mesh {}x{}: {} nodes, {} elements",
            layout.bays,
            layout.floors,
            mesh.num_nodes(),
            mesh.num_elements()
        );
        Ok(mesh)
    }

    // ========================
    // Building
    // ========================

    /// Add a node; ids must be unique
    pub fn add_node(&mut self, node: Node) -> NlFrameResult<()> {
        if self.node_index.contains_key(&node.id) {
            return Err(ConfigurationError::DuplicateNode(node.id).into());
        }
        self.node_index.insert(node.id, self.nodes.len());
        self.nodes.push(node);
        self.numbered = false;
        Ok(())
    }

    /// Add an element connecting two existing nodes
    pub fn add_element(&mut self, element: BeamElement) -> NlFrameResult<()> {
        if self.element_index.contains_key(&element.id) {
            return Err(ConfigurationError::DuplicateElement(element.id).into());
        }
        let [i, j] = element.node_ids();
        let si = self.slot(i)?;
        let sj = self.slot(j)?;

        self.nodes[si].add_connected_element(element.id);
        self.nodes[sj].add_connected_element(element.id);
        self.element_index.insert(element.id, self.elements.len());
        self.elements.push(element);
        Ok(())
    }

    fn slot(&self, node: usize) -> Result<usize, ConfigurationError> {
        self.node_index
            .get(&node)
            .copied()
            .ok_or(ConfigurationError::NodeNotFound(node))
    }

    fn check_restraints_open(&self, node: usize, dof: Dof) -> Result<(), ConfigurationError> {
        if self.restraints_finalised {
            return Err(ConfigurationError::RestraintsFinalised { node, dof });
        }
        Ok(())
    }

    /// Apply a fixity pattern to a node
    pub fn restrain(&mut self, node: usize, restraint: Restraint) -> NlFrameResult<()> {
        for dof in restraint.restrained_dofs() {
            self.fix_dof(node, dof)?;
        }
        Ok(())
    }

    pub fn fix_dof(&mut self, node: usize, dof: Dof) -> NlFrameResult<()> {
        self.check_restraints_open(node, dof)?;
        let slot = self.slot(node)?;
        self.nodes[slot].fix_dof(dof);
        Ok(())
    }

    pub fn free_dof(&mut self, node: usize, dof: Dof) -> NlFrameResult<()> {
        self.check_restraints_open(node, dof)?;
        let slot = self.slot(node)?;
        self.nodes[slot].free_dof(dof);
        Ok(())
    }

    /// Remove a DOF from the system without restraining it
    pub fn deactivate_dof(&mut self, node: usize, dof: Dof) -> NlFrameResult<()> {
        self.check_restraints_open(node, dof)?;
        let slot = self.slot(node)?;
        self.nodes[slot].set_active(dof, false);
        Ok(())
    }

    /// Freeze restraints; DOFs of unconnected nodes are deactivated
    pub fn finalise_restraints(&mut self) {
        if self.restraints_finalised {
            return;
        }
        for node in self.nodes.iter_mut() {
            if node.connected_elements().is_empty() {
                warn!("Node {} has no connected elements; deactivating its DOFs", node.id);
                for dof in Dof::ALL {
                    node.set_active(dof, false);
                }
            }
        }
        self.restraints_finalised = true;
    }

    pub fn restraints_finalised(&self) -> bool {
        self.restraints_finalised
    }

    /// Number active unrestrained DOFs by ascending node id, then {Ux, Uy, Rz}
    ///
    /// Returns the number of equations.
    pub fn number_dofs(&mut self) -> NlFrameResult<usize> {
        if !self.restraints_finalised {
            return Err(ConfigurationError::NumberingBeforeRestraints.into());
        }

        self.dof_table.clear();
        let mut next = 0;
        for &slot in self.node_index.values() {
            let node = &mut self.nodes[slot];
            for dof in Dof::ALL {
                let eq = if node.is_free(dof) {
                    self.dof_table.insert((node.id, dof), next);
                    next += 1;
                    Some(next - 1)
                } else {
                    None
                };
                node.equations[dof.index()] = eq;
            }
        }

        self.numbered = true;
        trace!("Numbered {} active DOFs", next);
        Ok(next)
    }

    pub fn is_numbered(&self) -> bool {
        self.numbered
    }

    /// Number of active (numbered) DOFs
    pub fn ndofs(&self) -> usize {
        self.dof_table.len()
    }

    /// Equation assigned to a node DOF
    pub fn equation(&self, node: usize, dof: Dof) -> Option<usize> {
        self.dof_table.get(&(node, dof)).copied()
    }

    /// The numbering table (node id, dof) -> equation
    pub fn dof_table(&self) -> &BTreeMap<(usize, Dof), usize> {
        &self.dof_table
    }

    /// Initialise every element's reference geometry and state slot
    pub fn initialise_elements(&mut self) -> NlFrameResult<()> {
        let nodes = &self.nodes;
        let node_index = &self.node_index;
        let slot = |id: usize| {
            node_index
                .get(&id)
                .copied()
                .ok_or(ConfigurationError::NodeNotFound(id))
        };
        for element in self.elements.iter_mut() {
            let [i, j] = element.node_ids();
            element.initialise(nodes, [slot(i)?, slot(j)?])?;
            element.initialise_state_containers()?;
        }
        Ok(())
    }

    // ========================
    // State updates
    // ========================

    /// Add to the accumulated external load at a node DOF
    pub fn increment_node_load(&mut self, node: usize, dof: Dof, delta: f64) -> NlFrameResult<()> {
        let slot = self.slot(node)?;
        self.nodes[slot].increment_nodal_load(delta, dof);
        Ok(())
    }

    /// Overwrite the external load at a node DOF
    pub fn set_node_load(&mut self, node: usize, dof: Dof, value: f64) -> NlFrameResult<()> {
        let slot = self.slot(node)?;
        self.nodes[slot].add_nodal_load(value, dof);
        Ok(())
    }

    /// Zero the external loads of every node
    pub fn clear_node_loads(&mut self) {
        for node in self.nodes.iter_mut() {
            node.clear_nodal_loads();
        }
    }

    /// Add a displacement correction to a node DOF
    pub fn increment_node_displacement(&mut self, node: usize, dof: Dof, delta: f64) -> NlFrameResult<()> {
        let slot = self.slot(node)?;
        self.nodes[slot].increment_displacement(dof, delta);
        Ok(())
    }

    /// Add a solution increment indexed by equation number into the nodes
    pub(crate) fn distribute_increment(&mut self, du: &[f64]) -> NlFrameResult<()> {
        if !self.numbered {
            return Err(PreconditionError::NotNumbered.into());
        }
        if du.len() != self.ndofs() {
            return Err(PreconditionError::IncrementSizeMismatch {
                expected: self.ndofs(),
                found: du.len(),
            }
            .into());
        }
        for node in self.nodes.iter_mut() {
            for dof in Dof::ALL {
                if let Some(eq) = node.equation(dof) {
                    node.increment_displacement(dof, du[eq]);
                }
            }
        }
        Ok(())
    }

    /// Evaluate every element against the current node displacements
    ///
    /// Evaluations run in parallel over a shared view of the nodes; the
    /// resulting states are stored afterwards in element order.
    pub fn update_element_states(&mut self) -> NlFrameResult<()> {
        let nodes = &self.nodes;
        let states: Vec<ElementState> = self
            .elements
            .par_iter()
            .map(|element| element.evaluate(nodes))
            .collect::<NlFrameResult<_>>()?;

        for (element, state) in self.elements.iter_mut().zip(states) {
            element.update_state(state);
        }
        Ok(())
    }

    // ========================
    // Queries
    // ========================

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn elements(&self) -> &[BeamElement] {
        &self.elements
    }

    /// Nodes by ascending id
    pub fn nodes_by_id(&self) -> impl Iterator<Item = &Node> {
        self.node_index.values().map(move |&slot| &self.nodes[slot])
    }

    /// Elements by ascending id
    pub fn elements_by_id(&self) -> impl Iterator<Item = &BeamElement> {
        self.element_index.values().map(move |&slot| &self.elements[slot])
    }

    pub fn node(&self, id: usize) -> NlFrameResult<&Node> {
        Ok(&self.nodes[self.slot(id)?])
    }

    pub fn element(&self, id: usize) -> NlFrameResult<&BeamElement> {
        let slot = self
            .element_index
            .get(&id)
            .copied()
            .ok_or(ConfigurationError::ElementNotFound(id))?;
        Ok(&self.elements[slot])
    }

    pub fn contains_node(&self, id: usize) -> bool {
        self.node_index.contains_key(&id)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Support reactions from the stored element states
    ///
    /// At every restrained DOF the reaction is the sum of element end forces
    /// minus the external load applied there.
    pub fn reactions(&self) -> NlFrameResult<Vec<Reactions>> {
        if !self.numbered {
            return Err(PreconditionError::NotNumbered.into());
        }

        let mut internal: BTreeMap<usize, [f64; 3]> = BTreeMap::new();
        for element in &self.elements {
            let forces = element.global_forces()?;
            for (k, node) in element.node_ids().into_iter().enumerate() {
                let entry = internal.entry(node).or_insert([0.0; 3]);
                for (d, value) in entry.iter_mut().enumerate() {
                    *value += forces[3 * k + d];
                }
            }
        }

        let reactions = self
            .nodes_by_id()
            .filter(|node| Dof::ALL.iter().any(|&d| node.is_restrained(d)))
            .map(|node| {
                let sum = internal.get(&node.id).copied().unwrap_or([0.0; 3]);
                let mut r = [0.0; 3];
                for dof in Dof::ALL {
                    if node.is_restrained(dof) {
                        r[dof.index()] = sum[dof.index()] - node.load(dof);
                    }
                }
                Reactions::from_array(node.id, r)
            })
            .collect();

        Ok(reactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section() -> Section {
        Section::new(1.0, 1.0e4, 1.0)
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut mesh = GlobalMesh::new();
        mesh.add_node(Node::new(1, 0.0, 0.0)).unwrap();
        mesh.add_node(Node::new(2, 1.0, 0.0)).unwrap();
        assert!(mesh.add_node(Node::new(1, 5.0, 0.0)).is_err());

        mesh.add_element(BeamElement::linear(1, [1, 2], section())).unwrap();
        assert!(mesh.add_element(BeamElement::linear(1, [1, 2], section())).is_err());
        assert!(mesh.add_element(BeamElement::linear(2, [1, 9], section())).is_err());
    }

    #[test]
    fn test_numbering_requires_finalised_restraints() {
        let mut mesh =
            GlobalMesh::create_line_mesh(2, [0.0, 0.0], [2.0, 0.0], ElementKind::Linear2D, section())
                .unwrap();
        assert!(mesh.number_dofs().is_err());
        mesh.finalise_restraints();
        assert_eq!(mesh.number_dofs().unwrap(), 9);
    }

    #[test]
    fn test_restraints_frozen_after_finalise() {
        let mut mesh =
            GlobalMesh::create_line_mesh(1, [0.0, 0.0], [1.0, 0.0], ElementKind::Linear2D, section())
                .unwrap();
        mesh.restrain(1, Restraint::fixed()).unwrap();
        mesh.finalise_restraints();
        let err = mesh.fix_dof(2, Dof::Uy).unwrap_err();
        assert!(err.to_string().contains("finalised"));
    }

    #[test]
    fn test_numbering_order_and_determinism() {
        let mut mesh = GlobalMesh::new();
        // inserted out of id order on purpose
        mesh.add_node(Node::new(3, 2.0, 0.0)).unwrap();
        mesh.add_node(Node::new(1, 0.0, 0.0)).unwrap();
        mesh.add_node(Node::new(2, 1.0, 0.0)).unwrap();
        mesh.add_element(BeamElement::linear(1, [1, 2], section())).unwrap();
        mesh.add_element(BeamElement::linear(2, [2, 3], section())).unwrap();
        mesh.restrain(1, Restraint::pinned()).unwrap();
        mesh.finalise_restraints();

        let n = mesh.number_dofs().unwrap();
        assert_eq!(n, 7);
        assert_eq!(mesh.equation(1, Dof::Rz), Some(0));
        assert_eq!(mesh.equation(2, Dof::Ux), Some(1));
        assert_eq!(mesh.equation(3, Dof::Rz), Some(6));
        assert_eq!(mesh.equation(1, Dof::Ux), None);

        let first = mesh.dof_table().clone();
        mesh.number_dofs().unwrap();
        assert_eq!(&first, mesh.dof_table());
    }

    #[test]
    fn test_orphan_node_deactivated() {
        let mut mesh =
            GlobalMesh::create_line_mesh(1, [0.0, 0.0], [1.0, 0.0], ElementKind::Linear2D, section())
                .unwrap();
        mesh.add_node(Node::new(10, 5.0, 5.0)).unwrap();
        mesh.finalise_restraints();
        assert_eq!(mesh.number_dofs().unwrap(), 6);
        assert!(!mesh.node(10).unwrap().is_active(Dof::Ux));
    }

    #[test]
    fn test_frame_mesh_counts() {
        let layout = FrameLayout {
            bays: 2,
            floors: 3,
            bay_length: 6.0,
            floor_height: 3.0,
            beam_divisions: 4,
            column_divisions: 2,
        };
        let mesh = GlobalMesh::create_frame_mesh(&layout, ElementKind::Izzuddin2D, section()).unwrap();
        assert_eq!(mesh.num_nodes(), layout.num_nodes());
        assert_eq!(mesh.num_elements(), layout.num_elements());

        // top-right vertex sits at the frame corner
        let corner = mesh.node(layout.vertex_id(2, 3)).unwrap();
        assert_eq!(corner.coords(), [12.0, 9.0]);
        assert!(mesh.node(layout.vertex_id(1, 0)).unwrap().is_restrained(Dof::Rz));

        let ids: Vec<usize> = mesh.nodes_by_id().map(|n| n.id).collect();
        assert_eq!(ids, (1..=layout.num_nodes()).collect::<Vec<_>>());
    }

    #[test]
    fn test_frame_layout_without_beam_divisions() {
        let layout = FrameLayout {
            bays: 1,
            floors: 2,
            bay_length: 4.0,
            floor_height: 3.0,
            beam_divisions: 0,
            column_divisions: 1,
        };
        assert_eq!(layout.vertex_id(0, 0), 1);
        assert_eq!(layout.vertex_id(1, 2), 6);
        assert_eq!(layout.num_nodes(), 6);
        assert!(GlobalMesh::create_frame_mesh(&layout, ElementKind::Linear2D, section()).is_err());
    }

    #[test]
    fn test_elements_bind_nodes_in_any_insertion_order() {
        let mut mesh = GlobalMesh::new();
        for (id, x) in [(3, 4.0), (1, 0.0), (2, 1.0)] {
            mesh.add_node(Node::new(id, x, 0.0)).unwrap();
        }
        mesh.add_element(BeamElement::izzuddin(7, [2, 3], section())).unwrap();
        mesh.add_element(BeamElement::izzuddin(4, [1, 2], section())).unwrap();
        mesh.finalise_restraints();
        mesh.number_dofs().unwrap();
        mesh.initialise_elements().unwrap();

        assert_eq!(mesh.element(7).unwrap().initial_length().unwrap(), 3.0);
        assert_eq!(mesh.element(4).unwrap().initial_length().unwrap(), 1.0);
    }

    #[test]
    fn test_increment_size_must_match_numbering() {
        let mut mesh =
            GlobalMesh::create_line_mesh(2, [0.0, 0.0], [2.0, 0.0], ElementKind::Linear2D, section())
                .unwrap();
        mesh.restrain(1, Restraint::fixed()).unwrap();
        assert!(matches!(
            mesh.distribute_increment(&[0.0; 6]),
            Err(crate::error::NlFrameError::Precondition(PreconditionError::NotNumbered))
        ));

        mesh.finalise_restraints();
        assert_eq!(mesh.number_dofs().unwrap(), 6);
        assert!(matches!(
            mesh.distribute_increment(&[0.1; 4]),
            Err(crate::error::NlFrameError::Precondition(
                PreconditionError::IncrementSizeMismatch { expected: 6, found: 4 }
            ))
        ));
        assert_eq!(mesh.node(3).unwrap().displacement(Dof::Uy), 0.0);

        mesh.distribute_increment(&[0.0, 0.0, 0.0, 0.0, 0.5, 0.0]).unwrap();
        assert_eq!(mesh.node(3).unwrap().displacement(Dof::Uy), 0.5);
    }

    #[test]
    fn test_parallel_update_matches_serial() {
        let mut mesh =
            GlobalMesh::create_line_mesh(8, [0.0, 0.0], [4.0, 1.0], ElementKind::Izzuddin2D, section())
                .unwrap();
        mesh.restrain(1, Restraint::fixed()).unwrap();
        mesh.finalise_restraints();
        mesh.number_dofs().unwrap();
        mesh.initialise_elements().unwrap();
        for id in 2..=9 {
            mesh.increment_node_displacement(id, Dof::Uy, 0.01 * id as f64).unwrap();
        }

        mesh.update_element_states().unwrap();
        for element in mesh.elements() {
            let serial = element.evaluate(mesh.nodes()).unwrap();
            assert_eq!(element.state().unwrap(), &serial);
        }
    }
}
