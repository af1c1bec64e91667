use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Indicates how the solver terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Every relative residual dropped below the tolerance.
    Converged,

    /// The pass budget ran out before convergence.
    MaxIterations,

    /// Residuals grew past the divergence threshold or became non-finite.
    Diverged,

    /// Stopped early due to an observer action.
    StoppedByObserver,

    /// Stopped because cancellation was requested.
    Cancelled,
}

/// The result of solving one coupled group.
///
/// The registry holds the values reached by the last pass; this carries the
/// convergence diagnostics alongside them.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// How the solver terminated.
    pub status: Status,

    /// Number of completed passes.
    pub iterations: usize,

    /// Relative residual of each coupling variable after the last completed pass.
    pub residuals: IndexMap<String, f64>,

    /// Largest entry of `residuals`, or NaN if no pass completed.
    pub max_residual: f64,

    pub worst_variable: Option<String>,

    /// Relaxation factor in effect at termination.
    pub relaxation_factor: f64,
}

impl Solution {
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.status == Status::Converged
    }
}
