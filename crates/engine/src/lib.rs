//! Run orchestration for multidisciplinary design analyses.
//!
//! A [`RunController`] owns a prebuilt [`DependencyGraph`] and evaluates it
//! at a [`DesignPoint`]:
//!
//! 1. A fresh registry is seeded with declared defaults, then with the
//!    warm-start snapshot (if any), then with the design point.
//! 2. Cycle groups run in topological order. Trivial groups are invoked once;
//!    coupled groups are iterated with [`gauss_seidel`](mda_solvers::gauss_seidel).
//!    With `parallel` set, independent groups of a topological level run
//!    concurrently on private registry partitions.
//! 3. The final registry and per-group diagnostics are returned as a
//!    [`RunResult`].
//!
//! Non-converged groups do not stop a run; downstream groups still run and
//! the result is flagged. Discipline failures stop the run and surface as
//! [`RunError::Failed`], which still carries the partial result.
//!
//! [`DependencyGraph`]: mda_core::DependencyGraph

mod config;
mod controller;
mod design;
mod driver;
mod error;
mod event;
mod report;

pub use config::RunConfig;
pub use controller::{RunController, run_system};
pub use design::{DesignPoint, DesignValue};
pub use error::RunError;
pub use event::{Action, Event};
pub use mda_solvers::gauss_seidel::{Acceleration, Config as ConvergenceConfig, ConfigError};
pub use report::{Failure, GroupReport, GroupStatus, RunResult, RunStatus};
