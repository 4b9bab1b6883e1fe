//! Assembler - global tangent, load and resistance vectors
//!
//! Element tangents are scattered as triplets into a [`SparseMatrixBuilder`],
//! consolidated through CSR and densified for an LU solve. Forces follow the
//! sign convention residual = P - R, so the correction K ΔU = residual moves
//! the structure towards equilibrium.

use log::trace;

use crate::error::{ConfigurationError, NlFrameResult, PreconditionError, SolverError};
use crate::math::{solve_guarded, LinearSolve, Mat, SparseMatrixBuilder, Vec};
use crate::mesh::GlobalMesh;

/// Global system of one mesh
#[derive(Debug, Clone)]
pub struct Assembler {
    ndofs: usize,
    /// Tangent stiffness K
    k: Mat,
    /// External load vector P
    p: Vec,
    /// Resistance (internal force) vector R
    r: Vec,
    /// Out-of-balance force P - R
    residual: Vec,
    /// Last displacement correction ΔU
    du: Vec,
    /// Accumulated displacement U
    u: Vec,
    singularity_threshold: f64,
    condition_estimate: Option<f64>,
    initialised: bool,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            ndofs: 0,
            k: Mat::zeros(0, 0),
            p: Vec::zeros(0),
            r: Vec::zeros(0),
            residual: Vec::zeros(0),
            du: Vec::zeros(0),
            u: Vec::zeros(0),
            singularity_threshold: 1e-12,
            condition_estimate: None,
            initialised: false,
        }
    }

    /// Set the pivot ratio under which the tangent counts as singular
    pub fn with_singularity_threshold(mut self, threshold: f64) -> Self {
        self.singularity_threshold = threshold;
        self
    }

    pub fn set_singularity_threshold(&mut self, threshold: f64) {
        self.singularity_threshold = threshold;
    }

    /// Size every global container to the active-DOF count of `mesh`
    pub fn initialise(&mut self, mesh: &GlobalMesh) -> NlFrameResult<()> {
        if !mesh.is_numbered() {
            return Err(PreconditionError::NotNumbered.into());
        }
        let n = mesh.ndofs();
        if n == 0 {
            return Err(ConfigurationError::EmptySystem.into());
        }

        self.ndofs = n;
        self.k = Mat::zeros(n, n);
        self.p = Vec::zeros(n);
        self.r = Vec::zeros(n);
        self.residual = Vec::zeros(n);
        self.du = Vec::zeros(n);
        self.u = Vec::zeros(n);
        self.condition_estimate = None;
        self.initialised = true;
        Ok(())
    }

    fn check_initialised(&self) -> Result<(), PreconditionError> {
        if self.initialised {
            Ok(())
        } else {
            Err(PreconditionError::NotInitialised)
        }
    }

    /// Assemble the global tangent from the stored element states
    pub fn assemble_stiffness(&mut self, mesh: &GlobalMesh) -> NlFrameResult<()> {
        self.check_initialised()?;

        let mut builder = SparseMatrixBuilder::new(self.ndofs);
        for element in mesh.elements() {
            let dofs = element.equations(mesh.nodes())?;
            builder.add_element_matrix(&dofs, element.global_stiffness()?);
        }

        trace!(
            "Assembled K: {} dofs, {} triplets (sparsity {:.3})",
            self.ndofs,
            builder.nnz(),
            builder.sparsity()
        );
        self.k = builder.to_dense();
        Ok(())
    }

    /// Assemble P from node loads, R from element forces and the residual P - R
    pub fn assemble_residual(&mut self, mesh: &GlobalMesh) -> NlFrameResult<()> {
        self.check_initialised()?;

        self.p.fill(0.0);
        for node in mesh.nodes() {
            for (eq, load) in node.equations().iter().zip(node.loads()) {
                if let Some(eq) = *eq {
                    self.p[eq] += load;
                }
            }
        }

        self.r.fill(0.0);
        for element in mesh.elements() {
            let dofs = element.equations(mesh.nodes())?;
            let forces = element.global_forces()?;
            for (i, eq) in dofs.iter().enumerate() {
                if let Some(eq) = *eq {
                    self.r[eq] += forces[i];
                }
            }
        }

        self.residual = &self.p - &self.r;
        Ok(())
    }

    /// Assemble tangent and residual together
    pub fn assemble(&mut self, mesh: &GlobalMesh) -> NlFrameResult<()> {
        self.assemble_stiffness(mesh)?;
        self.assemble_residual(mesh)
    }

    /// Solve K ΔU = residual
    ///
    /// `step` is only used to label a singular-system error.
    pub fn solve_for_increment(&mut self, step: usize) -> NlFrameResult<()> {
        self.check_initialised()?;

        match solve_guarded(&self.k, &self.residual, self.singularity_threshold) {
            LinearSolve::Solved {
                x,
                condition_estimate,
            } => {
                self.du = x;
                self.condition_estimate = Some(condition_estimate);
                Ok(())
            }
            LinearSolve::Singular { condition_estimate } => {
                self.condition_estimate = Some(condition_estimate);
                Err(SolverError::SingularSystem {
                    step,
                    condition_estimate,
                }
                .into())
            }
        }
    }

    /// Add ΔU into U and into the numbered node DOFs
    pub fn increment_u(&mut self, mesh: &mut GlobalMesh) -> NlFrameResult<()> {
        self.check_initialised()?;
        self.u += &self.du;
        mesh.distribute_increment(self.du.as_slice())
    }

    pub fn ndofs(&self) -> usize {
        self.ndofs
    }

    /// Euclidean norm of the out-of-balance force
    pub fn residual_norm(&self) -> f64 {
        self.residual.norm()
    }

    /// Euclidean norm of the last displacement correction
    pub fn increment_norm(&self) -> f64 {
        self.du.norm()
    }

    /// Pivot ratio of the last factorisation
    pub fn condition_estimate(&self) -> Option<f64> {
        self.condition_estimate
    }

    pub fn stiffness(&self) -> &Mat {
        &self.k
    }

    pub fn load_vector(&self) -> &Vec {
        &self.p
    }

    pub fn resistance(&self) -> &Vec {
        &self.r
    }

    pub fn residual(&self) -> &Vec {
        &self.residual
    }

    pub fn increment(&self) -> &Vec {
        &self.du
    }

    /// Accumulated displacement vector U
    pub fn displacements(&self) -> &Vec {
        &self.u
    }
}
