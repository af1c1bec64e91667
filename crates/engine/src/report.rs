use std::{fmt, time::Duration};

use indexmap::IndexMap;
use mda_core::{RegistrySnapshot, Value};
use mda_solvers::gauss_seidel;
use serde::{Deserialize, Serialize};

/// Overall outcome of a run.
///
/// Variants are ordered by severity; a run takes the most severe status of
/// its groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Converged,
    MaxIterationsExceeded,
    Diverged,
    Cancelled,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Converged => "converged",
            Self::MaxIterationsExceeded => "max_iterations_exceeded",
            Self::Diverged => "diverged",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// State of one cycle group at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    /// Not reached because the run stopped earlier.
    Pending,
    /// Trivial group evaluated once.
    Computed,
    Converged,
    MaxIterationsExceeded,
    Diverged,
    Failed,
    Cancelled,
}

impl GroupStatus {
    /// Contribution of this group to the run status; `None` for pending groups.
    #[must_use]
    pub fn run_status(self) -> Option<RunStatus> {
        match self {
            Self::Pending => None,
            Self::Computed | Self::Converged => Some(RunStatus::Converged),
            Self::MaxIterationsExceeded => Some(RunStatus::MaxIterationsExceeded),
            Self::Diverged => Some(RunStatus::Diverged),
            Self::Failed => Some(RunStatus::Failed),
            Self::Cancelled => Some(RunStatus::Cancelled),
        }
    }

    /// Whether the group's values were kept in the registry.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Computed | Self::Converged | Self::MaxIterationsExceeded | Self::Diverged
        )
    }
}

impl From<gauss_seidel::Status> for GroupStatus {
    fn from(status: gauss_seidel::Status) -> Self {
        match status {
            gauss_seidel::Status::Converged => Self::Converged,
            gauss_seidel::Status::MaxIterations => Self::MaxIterationsExceeded,
            gauss_seidel::Status::Diverged => Self::Diverged,
            gauss_seidel::Status::StoppedByObserver | gauss_seidel::Status::Cancelled => {
                Self::Cancelled
            }
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.run_status()) {
            (Self::Computed, _) => f.write_str("computed"),
            (_, Some(status)) => fmt::Display::fmt(&status, f),
            (_, None) => f.write_str("pending"),
        }
    }
}

/// Convergence diagnostics of one cycle group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupReport {
    pub id: usize,

    /// Member disciplines in invocation order.
    pub members: Vec<String>,

    pub coupled: bool,
    pub status: GroupStatus,

    /// Completed passes for coupled groups; one for an evaluated trivial group.
    pub iterations: usize,

    /// Final relative residual per coupling variable.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub residuals: IndexMap<String, f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_residual: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worst_variable: Option<String>,

    /// Relaxation factor in effect when iteration stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relaxation_factor: Option<f64>,
}

impl GroupReport {
    pub(crate) fn pending(id: usize, members: Vec<String>, coupled: bool) -> Self {
        Self {
            id,
            members,
            coupled,
            status: GroupStatus::Pending,
            iterations: 0,
            residuals: IndexMap::new(),
            max_residual: None,
            worst_variable: None,
            relaxation_factor: None,
        }
    }

    pub(crate) fn record(&mut self, solution: gauss_seidel::Solution) {
        self.status = solution.status.into();
        self.iterations = solution.iterations;
        self.residuals = solution.residuals;
        self.max_residual = Some(solution.max_residual).filter(|r| !r.is_nan());
        self.worst_variable = solution.worst_variable;
        self.relaxation_factor = Some(solution.relaxation_factor);
    }

    /// One-line description naming the group, its members and its worst variable.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = format!(
            "group {} ({}) {} after {} iteration(s)",
            self.id,
            self.members.join(", "),
            self.status,
            self.iterations,
        );
        if let (Some(variable), Some(residual)) = (&self.worst_variable, self.max_residual) {
            text.push_str(&format!("; worst residual {residual:.3e} on '{variable}'"));
        }
        text
    }
}

/// Where a failed run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub group: usize,
    pub discipline: Option<String>,
    pub message: String,
}

/// Final state and diagnostics of one run.
///
/// Serializes with serde for export to reporting tools and optimizers, and
/// feeds back into [`RunConfig::warm_start`](crate::RunConfig::warm_start).
///
/// A diverged run may hold non-finite values and residuals. JSON has no
/// representation for them: `serde_json` writes them as `null` and will not
/// read such a document back, so only finite results survive a JSON round
/// trip. Formats with native NaN and infinity support are unaffected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub status: RunStatus,

    /// Registry state at the end of the run.
    pub registry: RegistrySnapshot,

    /// Group reports in execution order.
    pub groups: Vec<GroupReport>,

    /// Human-readable explanation for non-converged runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,

    pub elapsed: Duration,
}

impl RunResult {
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.status == RunStatus::Converged
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.registry.value(name)
    }

    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.registry.scalar(name)
    }

    #[must_use]
    pub fn group(&self, id: usize) -> Option<&GroupReport> {
        self.groups.iter().find(|report| report.id == id)
    }

    /// Sum of Gauss-Seidel passes over all coupled groups.
    #[must_use]
    pub fn total_iterations(&self) -> usize {
        self.groups
            .iter()
            .filter(|report| report.coupled)
            .map(|report| report.iterations)
            .sum()
    }
}

/// Most severe status among the groups; converged when none ran.
pub(crate) fn overall_status(groups: &[GroupReport]) -> RunStatus {
    groups
        .iter()
        .filter_map(|report| report.status.run_status())
        .max()
        .unwrap_or(RunStatus::Converged)
}
