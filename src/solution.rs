//! Incremental-iterative solution procedure
//!
//! Each load step applies one load increment and then runs Newton-Raphson
//! iterations until the configured convergence metric falls under the
//! tolerance:
//!
//! 1. update element states from the current node displacements
//! 2. assemble the tangent K and the residual P - R
//! 3. check convergence (residual metric)
//! 4. solve K ΔU = P - R and add ΔU to the nodes
//! 5. check convergence (displacement metric)
//!
//! A step that needs more than `max_iterations` solves ends the analysis
//! with [`SolutionOutcome::Diverged`]; there is no automatic step cutting.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::{ConvergenceMetric, SolutionOptions};
use crate::assembler::Assembler;
use crate::error::{ConfigurationError, NlFrameError, NlFrameResult, PreconditionError};
use crate::loads::LoadManager;
use crate::mesh::GlobalMesh;
use crate::record::{Recorder, StepSnapshot};

/// Where the procedure is in its life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolutionState {
    NotStarted,
    ApplyingIncrement,
    Iterating,
    Converged,
    Diverged,
    Finished,
}

/// A load step that ran out of iterations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceFailure {
    pub step: usize,
    pub iterations: usize,
    pub residual_norm: f64,
    pub load_factor: f64,
}

/// Totals of a completed analysis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolutionSummary {
    /// Converged load steps
    pub steps: usize,
    /// Final cumulative load factor
    pub load_factor: f64,
    /// Linear solves over all steps
    pub total_iterations: usize,
}

/// How a call to [`SolutionProcedure::solve`] ended
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SolutionOutcome {
    /// Every load increment converged
    Finished(SolutionSummary),
    /// A load step failed to converge; earlier steps stay recorded
    Diverged(ConvergenceFailure),
}

impl SolutionOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, SolutionOutcome::Finished(_))
    }

    /// Turn a divergence into an error
    pub fn into_result(self) -> NlFrameResult<SolutionSummary> {
        match self {
            SolutionOutcome::Finished(summary) => Ok(summary),
            SolutionOutcome::Diverged(f) => Err(NlFrameError::ConvergenceFailed {
                step: f.step,
                iterations: f.iterations,
                residual_norm: f.residual_norm,
            }),
        }
    }
}

/// Result of iterating one load step
enum StepResult {
    Converged { iterations: usize, residual_norm: f64 },
    Diverged { iterations: usize, residual_norm: f64 },
}

/// Phase timings accumulated over a run
#[derive(Debug, Clone, Default)]
pub struct Timings {
    phases: BTreeMap<&'static str, Duration>,
}

impl Timings {
    fn time<T>(&mut self, phase: &'static str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        *self.phases.entry(phase).or_default() += start.elapsed();
        out
    }

    /// Accumulated time of one phase
    pub fn get(&self, phase: &str) -> Duration {
        self.phases.get(phase).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Duration)> + '_ {
        self.phases.iter().map(|(k, v)| (*k, *v))
    }
}

/// Drives load increments and equilibrium iterations
#[derive(Debug, Clone)]
pub struct SolutionProcedure {
    state: SolutionState,
    options: Option<SolutionOptions>,
    step: usize,
    load_factor: f64,
    total_iterations: usize,
    timings: Timings,
}

impl Default for SolutionProcedure {
    fn default() -> Self {
        Self::new()
    }
}

impl SolutionProcedure {
    pub fn new() -> Self {
        Self {
            state: SolutionState::NotStarted,
            options: None,
            step: 0,
            load_factor: 0.0,
            total_iterations: 0,
            timings: Timings::default(),
        }
    }

    /// Validate and store the options; the procedure is then ready to solve
    pub fn initialise_solution_parameters(
        &mut self,
        options: SolutionOptions,
    ) -> Result<(), ConfigurationError> {
        options.validate()?;
        self.options = Some(options);
        self.state = SolutionState::ApplyingIncrement;
        self.step = 0;
        self.load_factor = 0.0;
        self.total_iterations = 0;
        self.timings = Timings::default();
        Ok(())
    }

    pub fn state(&self) -> SolutionState {
        self.state
    }

    pub fn options(&self) -> Option<&SolutionOptions> {
        self.options.as_ref()
    }

    /// Last load step entered
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Run every remaining load increment of `loads`
    ///
    /// Errors are reserved for fatal conditions (singular tangent, broken
    /// set-up); running out of iterations is reported as an outcome.
    pub fn solve(
        &mut self,
        mesh: &mut GlobalMesh,
        assembler: &mut Assembler,
        loads: &mut LoadManager,
        recorder: &mut dyn Recorder,
    ) -> NlFrameResult<SolutionOutcome> {
        let options = match (&self.options, self.state) {
            (Some(options), SolutionState::ApplyingIncrement) => options.clone(),
            _ => return Err(PreconditionError::NotInitialised.into()),
        };

        if loads.schedule() != &options.schedule() {
            return Err(ConfigurationError::InvalidOption(format!(
                "load manager schedule has {} increments, solution options ask for {}",
                loads.schedule().len(),
                options.increment_count()
            ))
            .into());
        }

        assembler.set_singularity_threshold(options.singularity_threshold);
        assembler.initialise(mesh)?;

        let total_steps = loads.schedule().len();
        info!(
            "Starting analysis: {} dofs, {} elements, {} load increments",
            mesh.ndofs(),
            mesh.num_elements(),
            total_steps
        );

        while !loads.is_exhausted() {
            self.state = SolutionState::ApplyingIncrement;
            self.step += 1;
            self.load_factor = self
                .timings
                .time("load_increment", || loads.increment_loads(mesh))?;

            self.state = SolutionState::Iterating;
            match self.iterate(mesh, assembler, &options)? {
                StepResult::Converged {
                    iterations,
                    residual_norm,
                } => {
                    self.state = SolutionState::Converged;
                    self.total_iterations += iterations;

                    let snapshot = StepSnapshot::capture(
                        mesh,
                        self.step,
                        self.load_factor,
                        iterations,
                        residual_norm,
                    )?;
                    self.timings
                        .time("result_recording", || recorder.record(&snapshot))?;

                    if options.log_frequency > 0 && self.step % options.log_frequency == 0 {
                        info!(
                            "Step {}/{} converged: LF = {:.6}, {} iterations, |G| = {:.3e}",
                            self.step, total_steps, self.load_factor, iterations, residual_norm
                        );
                    }
                }
                StepResult::Diverged {
                    iterations,
                    residual_norm,
                } => {
                    self.state = SolutionState::Diverged;
                    warn!(
                        "Analysis incomplete: step {} did not converge after {} iterations (LF = {:.6}, |G| = {:.3e})",
                        self.step, iterations, self.load_factor, residual_norm
                    );
                    return Ok(SolutionOutcome::Diverged(ConvergenceFailure {
                        step: self.step,
                        iterations,
                        residual_norm,
                        load_factor: self.load_factor,
                    }));
                }
            }
        }

        self.state = SolutionState::Finished;
        info!(
            "Analysis complete: LF = {:.6} after {} steps, {} iterations",
            self.load_factor, self.step, self.total_iterations
        );
        for (phase, elapsed) in self.timings.iter() {
            debug!("  {:<20} {:>10.3} ms", phase, elapsed.as_secs_f64() * 1e3);
        }

        Ok(SolutionOutcome::Finished(SolutionSummary {
            steps: self.step,
            load_factor: self.load_factor,
            total_iterations: self.total_iterations,
        }))
    }

    /// Newton-Raphson loop of one load step
    fn iterate(
        &mut self,
        mesh: &mut GlobalMesh,
        assembler: &mut Assembler,
        options: &SolutionOptions,
    ) -> NlFrameResult<StepResult> {
        let mut solves = 0;

        loop {
            self.timings
                .time("element_state_update", || mesh.update_element_states())?;
            self.timings.time("assembly", || assembler.assemble(mesh))?;
            let residual_norm = assembler.residual_norm();

            debug!(
                "Step {} iteration {}: |G| = {:.6e}",
                self.step, solves, residual_norm
            );

            if options.metric == ConvergenceMetric::Residual && residual_norm < options.tolerance {
                return Ok(StepResult::Converged {
                    iterations: solves,
                    residual_norm,
                });
            }
            if solves >= options.max_iterations {
                return Ok(StepResult::Diverged {
                    iterations: solves,
                    residual_norm,
                });
            }

            let step = self.step;
            self.timings
                .time("solve", || assembler.solve_for_increment(step))?;
            assembler.increment_u(mesh)?;
            solves += 1;

            if options.metric == ConvergenceMetric::Displacement {
                let du = assembler.increment_norm();
                debug!("Step {} iteration {}: |dU| = {:.6e}", self.step, solves, du);
                if du < options.tolerance {
                    // bring element states in line with the accepted displacements
                    mesh.update_element_states()?;
                    assembler.assemble_residual(mesh)?;
                    return Ok(StepResult::Converged {
                        iterations: solves,
                        residual_norm: assembler.residual_norm(),
                    });
                }
            }
        }
    }
}
