use mda_core::{BuildError, RegistryError};
use mda_solvers::gauss_seidel;
use thiserror::Error;

use crate::{ConfigError, RunResult, RunStatus};

/// Errors returned by a [`RunController`](crate::RunController).
#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid run config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("dependency graph is invalid")]
    Build(#[from] BuildError),

    /// The design point or warm start could not be applied, or an external
    /// input was left undefined. No discipline has run.
    #[error("cannot seed the registry")]
    Seed(#[from] RegistryError),

    /// A discipline failed or timed out. The partial result holds the
    /// registry as of the last completed group.
    #[error("run failed: {}", .result.message.as_deref().unwrap_or("unknown failure"))]
    Failed {
        result: Box<RunResult>,
        #[source]
        source: gauss_seidel::Error,
    },

    /// Strict mode only: a group ended without converging.
    #[error("run did not converge ({})", .result.status)]
    NotConverged { result: Box<RunResult> },
}

impl RunError {
    /// The run result carried by runtime errors.
    #[must_use]
    pub fn result(&self) -> Option<&RunResult> {
        match self {
            Self::Failed { result, .. } | Self::NotConverged { result } => Some(result),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<RunStatus> {
        self.result().map(|result| result.status)
    }
}
