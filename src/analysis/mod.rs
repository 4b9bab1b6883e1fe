//! Solution options

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::loads::LoadSchedule;

/// Quantity compared against the tolerance to accept an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceMetric {
    /// Euclidean norm of the out-of-balance force, checked before each solve
    Residual,
    /// Euclidean norm of the last displacement correction, checked after each solve
    Displacement,
}

impl Default for ConvergenceMetric {
    fn default() -> Self {
        Self::Residual
    }
}

/// Options for the incremental-iterative solution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolutionOptions {
    /// Convergence tolerance
    pub tolerance: f64,
    /// Maximum solves per load increment
    pub max_iterations: usize,
    /// Number of uniform load increments
    pub num_increments: usize,
    /// Convergence metric
    pub metric: ConvergenceMetric,
    /// Load factor reached after the last uniform increment
    pub max_load_factor: f64,
    /// Explicit load-factor increments; overrides the uniform schedule
    pub load_increments: Option<Vec<f64>>,
    /// Pivot ratio under which the tangent counts as singular
    pub singularity_threshold: f64,
    /// Log every n-th converged step at info level
    pub log_frequency: usize,
}

impl Default for SolutionOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 20,
            num_increments: 10,
            metric: ConvergenceMetric::Residual,
            max_load_factor: 1.0,
            load_increments: None,
            singularity_threshold: 1e-12,
            log_frequency: 1,
        }
    }
}

impl SolutionOptions {
    /// Set convergence tolerance
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// Set the number of uniform increments
    pub fn with_increments(mut self, n: usize) -> Self {
        self.num_increments = n;
        self
    }

    pub fn with_metric(mut self, metric: ConvergenceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_max_load_factor(mut self, lambda: f64) -> Self {
        self.max_load_factor = lambda;
        self
    }

    /// Use an explicit list of load-factor increments
    pub fn with_load_increments(mut self, increments: Vec<f64>) -> Self {
        self.load_increments = Some(increments);
        self
    }

    pub fn with_singularity_threshold(mut self, threshold: f64) -> Self {
        self.singularity_threshold = threshold;
        self
    }

    pub fn with_log_frequency(mut self, every: usize) -> Self {
        self.log_frequency = every;
        self
    }

    /// Number of load increments the schedule will apply
    pub fn increment_count(&self) -> usize {
        match &self.load_increments {
            Some(list) => list.len(),
            None => self.num_increments,
        }
    }

    /// Load schedule described by these options
    pub fn schedule(&self) -> LoadSchedule {
        match &self.load_increments {
            Some(list) => LoadSchedule::Explicit(list.clone()),
            None => LoadSchedule::Uniform {
                increments: self.num_increments,
                max_load_factor: self.max_load_factor,
            },
        }
    }

    /// Reject options the solution procedure cannot run with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.tolerance > 0.0) || !self.tolerance.is_finite() {
            return Err(ConfigurationError::InvalidOption(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations < 1 {
            return Err(ConfigurationError::InvalidOption(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.increment_count() < 1 {
            return Err(ConfigurationError::InvalidOption(
                "at least one load increment is required".to_string(),
            ));
        }
        if !self.max_load_factor.is_finite() {
            return Err(ConfigurationError::InvalidOption(
                "max_load_factor must be finite".to_string(),
            ));
        }
        if let Some(list) = &self.load_increments {
            if list.iter().any(|d| !d.is_finite()) {
                return Err(ConfigurationError::InvalidOption(
                    "load increments must be finite".to_string(),
                ));
            }
        }
        if self.singularity_threshold < 0.0 {
            return Err(ConfigurationError::InvalidOption(
                "singularity_threshold must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
