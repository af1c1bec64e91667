//! Capability traits for cross-solver observers.
//!
//! These traits abstract over the solver-level and run-level event types so
//! one observer can be handed to either [`gauss_seidel::solve`] or
//! [`RunController::run_observed`](mda_engine::RunController::run_observed).
//!
//! # Example
//!
//! ```rust
//! use mda_core::Observer;
//! use mda_observers::traits::{CanStopEarly, HasResidual};
//!
//! struct GoodEnough {
//!     tolerance: f64,
//! }
//!
//! impl<E: HasResidual, A: CanStopEarly> Observer<E, A> for GoodEnough {
//!     fn observe(&mut self, event: &E) -> Option<A> {
//!         (event.residual() < self.tolerance).then(A::stop_early)
//!     }
//! }
//! ```

use mda_engine::Event as RunEvent;
use mda_solvers::gauss_seidel::{self, Action};

/// An event that may describe a completed Gauss-Seidel pass.
pub trait HasPass {
    /// Returns the pass, or `None` for events of another kind.
    fn pass(&self) -> Option<&gauss_seidel::Event>;
}

/// An event that carries a residual value.
pub trait HasResidual {
    /// Returns the largest relative residual for this event.
    ///
    /// Returns `f64::NAN` when the event has no residual.
    fn residual(&self) -> f64;
}

/// An action type that can signal early termination.
pub trait CanStopEarly {
    /// Returns the action that stops the solver early.
    fn stop_early() -> Self;
}

impl HasPass for gauss_seidel::Event {
    fn pass(&self) -> Option<&gauss_seidel::Event> {
        Some(self)
    }
}

impl HasPass for RunEvent {
    fn pass(&self) -> Option<&gauss_seidel::Event> {
        match self {
            RunEvent::Pass(event) => Some(event),
            RunEvent::GroupFinished(_) => None,
        }
    }
}

impl HasResidual for gauss_seidel::Event {
    fn residual(&self) -> f64 {
        self.max_residual
    }
}

impl HasResidual for RunEvent {
    fn residual(&self) -> f64 {
        match self {
            RunEvent::Pass(event) => event.max_residual,
            RunEvent::GroupFinished(report) => report.max_residual.unwrap_or(f64::NAN),
        }
    }
}

impl CanStopEarly for Action {
    fn stop_early() -> Self {
        Self::StopEarly
    }
}
