//! Load manager - splits the nodal loads into load increments

use log::debug;
use serde::{Deserialize, Serialize};

use super::nodal_load::NodalLoad;
use crate::elements::Dof;
use crate::error::{ConfigurationError, NlFrameResult, PreconditionError};
use crate::mesh::GlobalMesh;

/// How the total load factor is reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSchedule {
    /// `increments` equal steps up to `max_load_factor`
    Uniform {
        increments: usize,
        max_load_factor: f64,
    },
    /// Given load-factor increments, applied in order
    Explicit(Vec<f64>),
}

impl LoadSchedule {
    pub fn uniform(increments: usize, max_load_factor: f64) -> Self {
        Self::Uniform {
            increments,
            max_load_factor,
        }
    }

    /// Number of increments
    pub fn len(&self) -> usize {
        match self {
            Self::Uniform { increments, .. } => *increments,
            Self::Explicit(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load-factor increment of step `k` (1-based), if the schedule has one
    pub fn increment(&self, k: usize) -> Option<f64> {
        if k == 0 || k > self.len() {
            return None;
        }
        match self {
            Self::Uniform {
                increments,
                max_load_factor,
            } => {
                let n = *increments as f64;
                let k = k as f64;
                Some(max_load_factor * (k / n - (k - 1.0) / n))
            }
            Self::Explicit(list) => list.get(k - 1).copied(),
        }
    }

    /// Load factor after the last increment
    pub fn final_load_factor(&self) -> f64 {
        match self {
            Self::Uniform {
                max_load_factor, ..
            } => *max_load_factor,
            Self::Explicit(list) => list.iter().sum(),
        }
    }
}

impl Default for LoadSchedule {
    fn default() -> Self {
        Self::uniform(10, 1.0)
    }
}

/// Owns the nodal loads and pushes factored increments into the mesh
#[derive(Debug, Clone, Default)]
pub struct LoadManager {
    loads: Vec<NodalLoad>,
    schedule: LoadSchedule,
    /// Increments applied so far
    applied: usize,
    load_factor: f64,
    initialised: bool,
}

impl LoadManager {
    /// Create a new manager with no loads
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a total nodal load
    pub fn add_nodal_load(&mut self, load: NodalLoad) {
        self.loads.push(load);
    }

    /// Register a total load on `node`/`dof`
    pub fn add_load(&mut self, node: usize, dof: Dof, value: f64) {
        self.add_nodal_load(NodalLoad::new(node, dof, value));
    }

    pub fn loads(&self) -> &[NodalLoad] {
        &self.loads
    }

    pub fn schedule(&self) -> &LoadSchedule {
        &self.schedule
    }

    /// Validate load targets and zero their node load slots
    pub fn initialise_loads(
        &mut self,
        mesh: &mut GlobalMesh,
        schedule: LoadSchedule,
    ) -> NlFrameResult<()> {
        if schedule.is_empty() {
            return Err(ConfigurationError::InvalidOption(
                "load schedule has no increments".to_string(),
            )
            .into());
        }

        for load in &self.loads {
            if !mesh.contains_node(load.node) {
                return Err(ConfigurationError::NodeNotFound(load.node).into());
            }
        }
        for load in &self.loads {
            mesh.set_node_load(load.node, load.dof, 0.0)?;
        }

        debug!(
            "{} nodal loads over {} increments (final load factor {})",
            self.loads.len(),
            schedule.len(),
            schedule.final_load_factor()
        );

        self.schedule = schedule;
        self.applied = 0;
        self.load_factor = 0.0;
        self.initialised = true;
        Ok(())
    }

    /// Apply the next load increment; returns the new cumulative load factor
    pub fn increment_loads(&mut self, mesh: &mut GlobalMesh) -> NlFrameResult<f64> {
        if !self.initialised {
            return Err(PreconditionError::NotInitialised.into());
        }

        let step = self.applied + 1;
        let delta = self
            .schedule
            .increment(step)
            .ok_or(PreconditionError::LoadScheduleExhausted {
                increments: self.schedule.len(),
            })?;

        for load in &self.loads {
            mesh.increment_node_load(load.node, load.dof, delta * load.value)?;
        }

        self.applied = step;
        self.load_factor += delta;
        Ok(self.load_factor)
    }

    /// Zero the applied loads and rewind the schedule
    pub fn remove_loads(&mut self, mesh: &mut GlobalMesh) -> NlFrameResult<()> {
        for load in &self.loads {
            mesh.set_node_load(load.node, load.dof, 0.0)?;
        }
        self.applied = 0;
        self.load_factor = 0.0;
        Ok(())
    }

    /// Cumulative load factor
    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Increments applied so far
    pub fn increments_applied(&self) -> usize {
        self.applied
    }

    pub fn is_exhausted(&self) -> bool {
        self.applied >= self.schedule.len()
    }
}
