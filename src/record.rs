//! Step records - what the solution procedure reports per converged step

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::elements::Dof;
use crate::error::NlFrameResult;
use crate::mesh::GlobalMesh;
use crate::results::{ElementForces, NodeDisplacement};

/// State of the structure at a converged load step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    /// Load step, 1-based
    pub step: usize,
    /// Cumulative load factor
    pub load_factor: f64,
    /// Linear solves spent on this step
    pub iterations: usize,
    /// Out-of-balance norm at acceptance
    pub residual_norm: f64,
    /// Node displacements by ascending node id
    pub displacements: Vec<NodeDisplacement>,
    /// Element forces by ascending element id
    pub element_forces: Vec<ElementForces>,
}

impl StepSnapshot {
    /// Capture the current mesh state
    pub fn capture(
        mesh: &GlobalMesh,
        step: usize,
        load_factor: f64,
        iterations: usize,
        residual_norm: f64,
    ) -> NlFrameResult<Self> {
        let displacements = mesh
            .nodes_by_id()
            .map(|n| NodeDisplacement::from_array(n.id, n.displacements()))
            .collect();

        let element_forces = mesh
            .elements_by_id()
            .map(|e| Ok(ElementForces::from_state(e.id, e.kind(), e.state()?)))
            .collect::<NlFrameResult<_>>()?;

        Ok(Self {
            step,
            load_factor,
            iterations,
            residual_norm,
            displacements,
            element_forces,
        })
    }

    pub fn node_displacement(&self, node: usize) -> Option<&NodeDisplacement> {
        self.displacements.iter().find(|d| d.node == node)
    }

    pub fn element_forces(&self, element: usize) -> Option<&ElementForces> {
        self.element_forces.iter().find(|f| f.element == element)
    }
}

/// Receives one snapshot per converged step, in step order
pub trait Recorder {
    fn record(&mut self, snapshot: &StepSnapshot) -> NlFrameResult<()>;
}

impl<R: Recorder + ?Sized> Recorder for &mut R {
    fn record(&mut self, snapshot: &StepSnapshot) -> NlFrameResult<()> {
        (**self).record(snapshot)
    }
}

/// In-memory list of snapshots
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    snapshots: Vec<StepSnapshot>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> &[StepSnapshot] {
        &self.snapshots
    }

    pub fn last(&self) -> Option<&StepSnapshot> {
        self.snapshots.last()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Value of one node DOF at every recorded step
    pub fn node_history(&self, node: usize, dof: Dof) -> Vec<f64> {
        self.snapshots
            .iter()
            .filter_map(|s| s.node_displacement(node))
            .map(|d| match dof {
                Dof::Ux => d.dx,
                Dof::Uy => d.dy,
                Dof::Rz => d.rz,
            })
            .collect()
    }

    /// (load factor, displacement) pairs for one node DOF
    pub fn load_displacement_curve(&self, node: usize, dof: Dof) -> Vec<(f64, f64)> {
        self.snapshots
            .iter()
            .map(|s| s.load_factor)
            .zip(self.node_history(node, dof))
            .collect()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

impl Recorder for History {
    fn record(&mut self, snapshot: &StepSnapshot) -> NlFrameResult<()> {
        self.snapshots.push(snapshot.clone());
        Ok(())
    }
}

/// Writes each snapshot as one JSON line
#[derive(Debug)]
pub struct JsonLinesRecorder<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesRecorder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Flush and hand back the writer
    pub fn into_inner(mut self) -> NlFrameResult<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> Recorder for JsonLinesRecorder<W> {
    fn record(&mut self, snapshot: &StepSnapshot) -> NlFrameResult<()> {
        serde_json::to_writer(&mut self.writer, snapshot)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(step: usize, dy: f64) -> StepSnapshot {
        StepSnapshot {
            step,
            load_factor: step as f64 * 0.5,
            iterations: 2,
            residual_norm: 1e-9,
            displacements: vec![
                NodeDisplacement::from_array(1, [0.0; 3]),
                NodeDisplacement::from_array(2, [0.0, dy, 0.0]),
            ],
            element_forces: Vec::new(),
        }
    }

    #[test]
    fn test_history_node_queries() {
        let mut history = History::new();
        history.record(&snapshot(1, -0.1)).unwrap();
        history.record(&snapshot(2, -0.3)).unwrap();

        assert_eq!(history.node_history(2, Dof::Uy), vec![-0.1, -0.3]);
        assert_eq!(
            history.load_displacement_curve(2, Dof::Uy),
            vec![(0.5, -0.1), (1.0, -0.3)]
        );
        assert!(history.node_history(9, Dof::Ux).is_empty());
    }

    #[test]
    fn test_json_lines_output() {
        let mut rec = JsonLinesRecorder::new(Vec::new());
        rec.record(&snapshot(1, -0.1)).unwrap();
        rec.record(&snapshot(2, -0.2)).unwrap();

        let bytes = rec.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let back: StepSnapshot = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(back, snapshot(2, -0.2));
    }
}
